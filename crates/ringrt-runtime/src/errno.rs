//! Pretty-printing for raw negative-errno results.
//!
//! Operation-failed results travel as plain `i32` all the way to the
//! caller — see `ringrt_core::error` for why no `Result` wraps them. This
//! newtype exists only so benchmark binaries can `{}`-format a failed
//! result without reaching for `libc::strerror` by hand; it is never used
//! for control flow inside the runtime itself.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Errno(pub i32);

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err = std::io::Error::from_raw_os_error(self.0.unsigned_abs() as i32);
        write!(f, "{} ({})", err, self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_negative_errno() {
        let e = Errno(-2); // -ENOENT
        let s = e.to_string();
        assert!(s.contains("-2"));
    }
}
