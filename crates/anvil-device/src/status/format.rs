use std::ffi::c_char;
use std::fmt::{self, Write};

/// A finished status message: UTF-8 text followed by one NUL byte.
///
/// The buffer is sized from a measuring pass before formatting, so the message
/// is never truncated and C callbacks can read it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedMessage {
    text: String,
}

impl FormattedMessage {
    /// Formats `args` in two passes: measure, allocate `len + 1`, write.
    pub fn format(args: fmt::Arguments<'_>) -> Result<Self, fmt::Error> {
        let len = formatted_len(args)?;
        let mut text = String::with_capacity(len + 1);
        text.write_fmt(args)?;
        debug_assert_eq!(text.len(), len, "Display output changed between passes");
        text.push('\0');
        Ok(Self { text })
    }

    /// Message text without the terminator.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text[..self.text.len() - 1]
    }

    /// Length in bytes without the terminator.
    #[inline]
    pub fn len(&self) -> usize {
        self.text.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pointer to the NUL-terminated bytes, valid while `self` lives.
    #[inline]
    pub fn as_c_ptr(&self) -> *const c_char {
        self.text.as_ptr().cast()
    }
}

/// Exact byte length `args` formats to.
pub fn formatted_len(args: fmt::Arguments<'_>) -> Result<usize, fmt::Error> {
    let mut counter = ByteCounter(0);
    counter.write_fmt(args)?;
    Ok(counter.0)
}

struct ByteCounter(usize);

impl Write for ByteCounter {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}
