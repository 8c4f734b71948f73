//! Invite codes — short, fixed-length, unambiguous group join tokens.
//!
//! Codes are drawn from an alphabet with the easily-confused characters
//! removed (no `0`/`O`, no `1`/`I`/`L`). Global uniqueness is *not* this
//! module's job: the store enforces it with a UNIQUE column constraint and
//! retries generation on collision, bounded by
//! [`MAX_GENERATION_ATTEMPTS`].

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Every invite code has exactly this many characters.
pub const CODE_LEN: usize = 8;

/// Uppercase alphanumerics minus the ambiguous glyphs.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Cap on generate-check-retry iterations before the store gives up with
/// [`Error::InviteCodeExhausted`]. An unbounded loop is a latent
/// availability hazard under contention.
pub const MAX_GENERATION_ATTEMPTS: u32 = 20;

/// A validated invite code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InviteCode(String);

impl InviteCode {
  /// Draw a fresh random code. Uniqueness is checked by the caller.
  pub fn generate() -> Self {
    let mut rng = rand::thread_rng();
    let code = (0..CODE_LEN)
      .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
      .collect();
    Self(code)
  }

  /// Validate a caller-supplied code string. Lowercase input is accepted
  /// and normalised; wrong length or out-of-alphabet characters fail with
  /// [`Error::InvalidInviteCode`].
  pub fn parse(s: &str) -> Result<Self> {
    let normalised: String = s.trim().to_ascii_uppercase();
    if normalised.len() != CODE_LEN {
      return Err(Error::InvalidInviteCode(s.to_owned()));
    }
    if !normalised.bytes().all(|b| ALPHABET.contains(&b)) {
      return Err(Error::InvalidInviteCode(s.to_owned()));
    }
    Ok(Self(normalised))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for InviteCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl TryFrom<String> for InviteCode {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<InviteCode> for String {
  fn from(c: InviteCode) -> Self { c.0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn generated_codes_match_contract() {
    for _ in 0..200 {
      let code = InviteCode::generate();
      assert_eq!(code.as_str().len(), CODE_LEN);
      assert!(code.as_str().bytes().all(|b| ALPHABET.contains(&b)));
    }
  }

  #[test]
  fn parse_normalises_case_and_whitespace() {
    let code = InviteCode::parse("  abcd2345 ").unwrap();
    assert_eq!(code.as_str(), "ABCD2345");
  }

  #[test]
  fn parse_rejects_wrong_length() {
    assert!(InviteCode::parse("ABC").is_err());
    assert!(InviteCode::parse("ABCD23456").is_err());
  }

  #[test]
  fn parse_rejects_ambiguous_characters() {
    // O, 0, 1, I, L are all outside the alphabet.
    assert!(InviteCode::parse("ABCD2340").is_err());
    assert!(InviteCode::parse("ABCD234O").is_err());
    assert!(InviteCode::parse("ABCD234I").is_err());
  }
}
