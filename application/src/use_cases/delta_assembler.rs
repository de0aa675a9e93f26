//! Delta assembler
//!
//! Accumulates streamed assistant text per `(user, instance)` and releases
//! it either when it reaches the flush threshold or when the assistant's
//! message completes. Buffers are ephemeral and never persisted.

use herd_domain::InstanceId;
use std::collections::HashMap;
use std::sync::Mutex;

type BufferKey = (String, InstanceId);

#[derive(Default)]
struct Buffer {
    text: String,
    chars: usize,
}

pub struct DeltaAssembler {
    threshold: usize,
    buffers: Mutex<HashMap<BufferKey, Buffer>>,
}

impl DeltaAssembler {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Append a text fragment.
    ///
    /// Returns the whole buffered text, clearing the buffer, once it holds
    /// at least `threshold` characters.
    pub fn append(&self, user_id: &str, instance_id: &InstanceId, delta: &str) -> Option<String> {
        if delta.is_empty() {
            return None;
        }

        let key = (user_id.to_string(), instance_id.clone());
        let mut buffers = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        let buffer = buffers.entry(key.clone()).or_default();
        buffer.text.push_str(delta);
        buffer.chars += delta.chars().count();

        if buffer.chars >= self.threshold {
            buffers.remove(&key).map(|b| b.text)
        } else {
            None
        }
    }

    /// Release whatever is buffered for the key, threshold or not.
    pub fn complete(&self, user_id: &str, instance_id: &InstanceId) -> Option<String> {
        let key = (user_id.to_string(), instance_id.clone());
        let mut buffers = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        buffers
            .remove(&key)
            .map(|b| b.text)
            .filter(|text| !text.is_empty())
    }

    /// Characters currently buffered for the key.
    pub fn pending(&self, user_id: &str, instance_id: &InstanceId) -> usize {
        let key = (user_id.to_string(), instance_id.clone());
        let buffers = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        buffers.get(&key).map_or(0, |b| b.chars)
    }

    pub fn is_empty(&self) -> bool {
        self.buffers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}
