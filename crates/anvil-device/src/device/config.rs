use std::fmt;
use std::sync::Arc;

use anvil_types::StatusSeverity;

use crate::status::{LogSink, StatusSink};

/// Creation parameters for a [`Device`](super::Device).
#[derive(Clone)]
pub struct DeviceConfig {
    /// Name reported by the `"version.name"` property and in log lines.
    pub name: String,

    /// Sink used whenever the committed device parameters carry no
    /// `statusCallback`.
    ///
    /// `None` drops every message without formatting it.
    pub default_sink: Option<Arc<dyn StatusSink>>,

    /// Least urgent severity still delivered.
    ///
    /// Messages below it are discarded before formatting.
    pub status_threshold: StatusSeverity,
}

impl DeviceConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn with_sink(mut self, sink: impl StatusSink + 'static) -> Self {
        self.default_sink = Some(Arc::new(sink));
        self
    }

    /// Silences the default sink.
    pub fn without_sink(mut self) -> Self {
        self.default_sink = None;
        self
    }

    pub fn with_threshold(mut self, threshold: StatusSeverity) -> Self {
        self.status_threshold = threshold;
        self
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "anvil".to_owned(),
            default_sink: Some(Arc::new(LogSink)),
            status_threshold: StatusSeverity::Debug,
        }
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("name", &self.name)
            .field("default_sink", &self.default_sink.as_ref().map(|_| "<sink>"))
            .field("status_threshold", &self.status_threshold)
            .finish()
    }
}
