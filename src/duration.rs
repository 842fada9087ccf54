//! Human time spans such as `15m` or `24h`.

use std::time::Duration;

use crate::error::DurationError;

/// Parse a span like `5s`, `15m`, `24h` or `7d` into milliseconds.
///
/// The numeric part must be a positive integer immediately followed by one
/// unit letter. Fractions, whitespace and locale digits are rejected.
pub fn parse_duration(text: &str) -> Result<u64, DurationError> {
  let invalid = || DurationError::InvalidDuration(text.to_string());

  let unit = text.chars().last().ok_or_else(invalid)?;
  let digits = &text[..text.len() - unit.len_utf8()];
  if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return Err(invalid());
  }

  let multiplier: u64 = match unit {
    's' => 1_000,
    'm' => 60 * 1_000,
    'h' => 60 * 60 * 1_000,
    'd' => 24 * 60 * 60 * 1_000,
    _ => return Err(invalid()),
  };

  let value: u64 = digits.parse().map_err(|_| invalid())?;
  if value == 0 {
    return Err(invalid());
  }

  value.checked_mul(multiplier).ok_or_else(invalid)
}

/// Same as [`parse_duration`], as a [`Duration`].
pub fn parse_ttl(text: &str) -> Result<Duration, DurationError> {
  parse_duration(text).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_units() {
    assert_eq!(parse_duration("5s"), Ok(5_000));
    assert_eq!(parse_duration("15m"), Ok(900_000));
    assert_eq!(parse_duration("24h"), Ok(86_400_000));
    assert_eq!(parse_duration("2d"), Ok(172_800_000));
  }

  #[test]
  fn test_rejects_malformed() {
    for bad in ["bad", "", "m", "15", "15 m", "1.5h", "-5m", "15M", "15mm", " 15m"] {
      assert_eq!(
        parse_duration(bad),
        Err(DurationError::InvalidDuration(bad.to_string())),
        "{bad:?} should be rejected"
      );
    }
  }

  #[test]
  fn test_rejects_zero() {
    assert!(parse_duration("0s").is_err());
    assert!(parse_duration("000m").is_err());
  }

  #[test]
  fn test_rejects_overflow() {
    assert!(parse_duration("99999999999999999999d").is_err());
    assert!(parse_duration("18446744073709551615d").is_err());
  }

  #[test]
  fn test_parse_ttl() {
    assert_eq!(parse_ttl("15m"), Ok(Duration::from_secs(900)));
  }
}
