use tracing::{info, warn};

/// Collects human-readable messages for the caller while also emitting
/// structured `tracing` events. The CLI front-end displays the collected
/// messages; library consumers can ignore them.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    messages: Vec<String>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.messages.push(message);
    }

    pub fn log_warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}
