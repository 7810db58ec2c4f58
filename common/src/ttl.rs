use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

/// A time-to-live as accepted on the command line: a whole number of seconds,
/// optionally suffixed with `s`, `m`, `h` or `d` (`90`, `5m`, `1h`, `1d`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ttl(u64);

impl Ttl {
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseTtlError {
    #[error("expected a duration such as 90, 5m, 1h or 1d")]
    Malformed,
    #[error("the duration must be positive")]
    Zero,
    #[error("the duration is too long")]
    Overflow,
}

impl FromStr for Ttl {
    type Err = ParseTtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, multiplier) = match s.as_bytes().last() {
            Some(b's') => (&s[..s.len() - 1], 1),
            Some(b'm') => (&s[..s.len() - 1], 60),
            Some(b'h') => (&s[..s.len() - 1], 60 * 60),
            Some(b'd') => (&s[..s.len() - 1], 24 * 60 * 60),
            Some(_) => (s, 1),
            None => return Err(ParseTtlError::Malformed),
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseTtlError::Malformed);
        }

        let value: u64 = digits.parse().map_err(|_| ParseTtlError::Overflow)?;
        match value.checked_mul(multiplier) {
            Some(0) => Err(ParseTtlError::Zero),
            Some(secs) => Ok(Self(secs)),
            None => Err(ParseTtlError::Overflow),
        }
    }
}

impl Display for Ttl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0)
    }
}
