//! Status and diagnostics channel.
//!
//! Any component can emit a message without unwinding the call that hit the
//! condition. The device owns one [`StatusChannel`]; its sink is rewired every
//! time the device parameters are committed.

mod format;
mod sink;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use anvil_types::{DataType, StatusCode, StatusSeverity};

use crate::Handle;

pub use format::{formatted_len, FormattedMessage};
pub use sink::{CallbackSink, LogSink, RawStatusCallback, StatusReport, StatusSink};

/// Emits a formatted status message through anything with a
/// `report_status(source, severity, code, args)` method.
///
/// ```rust
/// use anvil_device::{report, Device, DeviceConfig, Handle, StatusCode, StatusSeverity};
///
/// let device = Device::new(DeviceConfig::default());
/// report!(device, Handle::DEVICE, StatusSeverity::Info, StatusCode::NoError, "ready after {} ms", 12);
/// ```
#[macro_export]
macro_rules! report {
    ($target:expr, $source:expr, $severity:expr, $code:expr, $($arg:tt)+) => {
        $target.report_status($source, $severity, $code, format_args!($($arg)+))
    };
}

pub(crate) struct StatusChannel {
    active: RwLock<Option<Arc<dyn StatusSink>>>,
    default_sink: Option<Arc<dyn StatusSink>>,
    threshold: StatusSeverity,
}

impl StatusChannel {
    pub(crate) fn new(default_sink: Option<Arc<dyn StatusSink>>, threshold: StatusSeverity) -> Self {
        Self { active: RwLock::new(default_sink.clone()), default_sink, threshold }
    }

    /// Installs `sink`; `None` silences the channel.
    pub(crate) fn install(&self, sink: Option<Arc<dyn StatusSink>>) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    pub(crate) fn restore_default(&self) {
        self.install(self.default_sink.clone());
    }

    pub(crate) fn emit(
        &self,
        device: Handle,
        source: Handle,
        source_type: DataType,
        severity: StatusSeverity,
        code: StatusCode,
        args: fmt::Arguments<'_>,
    ) {
        if severity > self.threshold {
            return;
        }
        // Clone out of the lock: sinks may re-enter the device.
        let Some(sink) = self.active.read().unwrap_or_else(PoisonError::into_inner).clone() else {
            return;
        };
        let message = match FormattedMessage::format(args) {
            Ok(message) => message,
            Err(_) => {
                log::warn!("dropping status message from {source}: formatting failed");
                return;
            }
        };
        sink.report(&StatusReport { device, source, source_type, severity, code, message: &message });
    }
}
