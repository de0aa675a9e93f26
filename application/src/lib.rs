//! Application layer for herd
//!
//! This crate contains use cases, port definitions, the instance registry,
//! and application configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod registry;
pub mod use_cases;

// Re-export commonly used types
pub use config::{CleanupPolicy, RoutingConfig};
pub use ports::{
    backend::{
        BackendClient, BackendConnector, BackendError, BackendSession, ModelInfo, ProviderInfo,
    },
    delivery::{DeliveryError, DeliveryOutcome, MessageDelivery, NoDelivery},
    event_journal::{EventJournal, JournalEntry, NoEventJournal},
    event_sink::EventSink,
    notice_formatter::NoticeFormatter,
    user_store::{MemoryUserStore, StoreError, UserStateStore},
};
pub use registry::{InstanceRegistry, RegisteredInstance};
pub use use_cases::cleanup::{CleanupReport, CleanupSweep};
pub use use_cases::correlation::SessionCorrelator;
pub use use_cases::delta_assembler::DeltaAssembler;
pub use use_cases::route_event::{EventRouter, RouteOutcome};
pub use use_cases::user_sessions::{UserSessionError, UserSessionService};
