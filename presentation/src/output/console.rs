//! Console output: instance listings and a terminal delivery transport

use async_trait::async_trait;
use colored::Colorize;
use herd_application::{DeliveryError, DeliveryOutcome, MessageDelivery};
use herd_domain::{Instance, InstanceOrigin};
use std::io::Write;
use std::sync::Mutex;

/// Formats instance state for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// One line per instance, with its health.
    pub fn instances(instances: &[(Instance, bool)]) -> String {
        if instances.is_empty() {
            return format!("{}\n", "No backend instances found.".dimmed());
        }

        let mut output = Self::section_header(&format!("Instances ({})", instances.len()));
        for (instance, healthy) in instances {
            output.push_str(&Self::instance_line(instance, *healthy));
            output.push('\n');
        }
        output
    }

    /// A single instance, as printed after a launch.
    pub fn instance_line(instance: &Instance, healthy: bool) -> String {
        let health = if healthy {
            "healthy".green()
        } else {
            "unreachable".red()
        };
        format!(
            "  {} {} {} [{}] {}",
            instance.id.as_str().yellow().bold(),
            instance.base_url,
            instance.working_directory.display(),
            Self::origin(instance.origin),
            health
        )
    }

    fn origin(origin: InstanceOrigin) -> &'static str {
        match origin {
            InstanceOrigin::Configured => "configured",
            InstanceOrigin::Discovered => "discovered",
            InstanceOrigin::Launched => "launched",
        }
    }

    fn section_header(title: &str) -> String {
        format!("{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }
}

/// Delivers messages by printing them, for running without a chat transport.
pub struct ConsoleDelivery<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleDelivery<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleDelivery<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, line: &str) -> Result<(), DeliveryError> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{}", line)
            .and_then(|_| out.flush())
            .map_err(|e| DeliveryError::Rejected(e.to_string()))
    }
}

#[async_trait]
impl<W: Write + Send> MessageDelivery for ConsoleDelivery<W> {
    async fn deliver(&self, user_id: &str, text: &str) -> DeliveryOutcome {
        let line = format!("{} {}\n{}", "to".dimmed(), user_id.cyan().bold(), text);
        self.write(&line).into()
    }

    async fn typing(&self, user_id: &str) {
        let notice = format!("{} is waiting for a reply...", user_id);
        let _ = self.write(&notice.dimmed().to_string());
    }
}
