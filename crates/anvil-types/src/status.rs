use std::fmt;

/// Severity of a status message, most severe first.
///
/// `Ord` follows urgency: `FatalError < Error < ... < Debug`, so a threshold
/// check reads `severity <= threshold`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum StatusSeverity {
    /// The runtime cannot continue in a defined state.
    FatalError = 1,
    Error = 2,
    Warning = 3,
    PerformanceWarning = 4,
    Info = 5,
    Debug = 6,
}

impl StatusSeverity {
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(StatusSeverity::FatalError),
            2 => Some(StatusSeverity::Error),
            3 => Some(StatusSeverity::Warning),
            4 => Some(StatusSeverity::PerformanceWarning),
            5 => Some(StatusSeverity::Info),
            6 => Some(StatusSeverity::Debug),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            StatusSeverity::FatalError => "FATAL",
            StatusSeverity::Error => "ERROR",
            StatusSeverity::Warning => "WARNING",
            StatusSeverity::PerformanceWarning => "PERFORMANCE",
            StatusSeverity::Info => "INFO",
            StatusSeverity::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for StatusSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Machine-readable status code accompanying a message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum StatusCode {
    NoError = 0,
    UnknownError = 1,
    InvalidArgument = 2,
    InvalidOperation = 3,
    OutOfMemory = 4,
    UnsupportedDevice = 5,
    VersionMismatch = 6,
}

impl StatusCode {
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(StatusCode::NoError),
            1 => Some(StatusCode::UnknownError),
            2 => Some(StatusCode::InvalidArgument),
            3 => Some(StatusCode::InvalidOperation),
            4 => Some(StatusCode::OutOfMemory),
            5 => Some(StatusCode::UnsupportedDevice),
            6 => Some(StatusCode::VersionMismatch),
            _ => None,
        }
    }
}

/// Blocking behavior requested by `frame_ready` and property queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(u32)]
pub enum WaitMask {
    /// Return immediately with the current state.
    #[default]
    NoWait = 0,
    /// Block until the queried state is available.
    Wait = 1,
}

impl WaitMask {
    /// Any nonzero raw value requests blocking.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        if raw == 0 { WaitMask::NoWait } else { WaitMask::Wait }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_by_urgency() {
        assert!(StatusSeverity::FatalError < StatusSeverity::Warning);
        assert!(StatusSeverity::Warning <= StatusSeverity::Warning);
        assert!(StatusSeverity::Debug > StatusSeverity::Info);
    }

    #[test]
    fn raw_conversions() {
        assert_eq!(StatusSeverity::from_raw(3), Some(StatusSeverity::Warning));
        assert_eq!(StatusSeverity::from_raw(0), None);
        assert_eq!(StatusCode::from_raw(2), Some(StatusCode::InvalidArgument));
        assert_eq!(WaitMask::from_raw(7), WaitMask::Wait);
        assert_eq!(WaitMask::from_raw(0), WaitMask::NoWait);
    }
}
