use std::ffi::{c_char, c_void};

use anvil_types::{DataType, StatusCode, StatusSeverity};

use super::FormattedMessage;
use crate::Handle;

/// One status message as delivered to a sink.
#[derive(Debug, Clone, Copy)]
pub struct StatusReport<'a> {
    pub device: Handle,
    pub source: Handle,
    pub source_type: DataType,
    pub severity: StatusSeverity,
    pub code: StatusCode,
    pub message: &'a FormattedMessage,
}

/// Receiver of status messages.
///
/// Sinks are called synchronously on the reporting thread, with no runtime
/// lock held, so they may call back into the device.
pub trait StatusSink: Send + Sync {
    fn report(&self, report: &StatusReport<'_>);
}

impl<F> StatusSink for F
where
    F: Fn(&StatusReport<'_>) + Send + Sync,
{
    fn report(&self, report: &StatusReport<'_>) {
        self(report)
    }
}

/// Default sink: forwards to the `log` facade under target `anvil::status`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn report(&self, r: &StatusReport<'_>) {
        let level = match r.severity {
            StatusSeverity::FatalError | StatusSeverity::Error => log::Level::Error,
            StatusSeverity::Warning | StatusSeverity::PerformanceWarning => log::Level::Warn,
            StatusSeverity::Info => log::Level::Info,
            StatusSeverity::Debug => log::Level::Debug,
        };
        log::log!(
            target: "anvil::status",
            level,
            "[{}] {} {}: {}",
            r.severity,
            r.source_type,
            r.source,
            r.message.as_str()
        );
    }
}

/// C status callback, as installed through the `statusCallback` device parameter.
pub type RawStatusCallback = unsafe extern "C" fn(
    user_data: *const c_void,
    device: usize,
    source: usize,
    source_type: u32,
    severity: u32,
    code: u32,
    message: *const c_char,
);

/// Sink invoking a [`RawStatusCallback`].
#[derive(Debug)]
pub struct CallbackSink {
    callback: RawStatusCallback,
    user_data: usize,
    device_address: usize,
}

impl CallbackSink {
    /// # Safety
    ///
    /// `callback` must be safe to call from any thread with `user_data` and a
    /// NUL-terminated message that is only valid for the duration of the call.
    pub unsafe fn new(callback: RawStatusCallback, user_data: *const c_void, device_address: usize) -> Self {
        Self { callback, user_data: user_data as usize, device_address }
    }

    fn address_of(&self, handle: Handle) -> usize {
        if handle.is_device() { self.device_address } else { handle.raw() }
    }
}

impl StatusSink for CallbackSink {
    fn report(&self, r: &StatusReport<'_>) {
        // SAFETY: upheld by the contract of `CallbackSink::new`.
        unsafe {
            (self.callback)(
                self.user_data as *const c_void,
                self.address_of(r.device),
                self.address_of(r.source),
                r.source_type.raw(),
                r.severity as u32,
                r.code as u32,
                r.message.as_c_ptr(),
            );
        }
    }
}
