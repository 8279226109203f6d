//! Strong type definitions for Veil.
//!
//! Tokens and identities are newtypes so a raw `u32` or byte buffer can't be
//! passed where a validated value is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, VeilError};

/// Length of a token in its textual UUID form.
pub const TOKEN_LEN: usize = 36;

/// Offsets of the hyphens in the textual form.
const HYPHENS: [usize; 4] = [8, 13, 18, 23];

/// A 128-bit administrative credential.
///
/// Travels as 36 bytes of hyphenated UUID text; stored as the 16 parsed
/// bytes so comparison is plain byte equality.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Token([u8; 16]);

impl Token {
    /// Create a token from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Generate a random token.
    pub fn generate() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Check the textual form without parsing it.
    ///
    /// Exactly 36 bytes, hyphens at 8/13/18/23, hex digits elsewhere.
    pub fn is_well_formed(text: &[u8]) -> bool {
        if text.len() != TOKEN_LEN {
            return false;
        }

        text.iter().enumerate().all(|(i, &b)| {
            if HYPHENS.contains(&i) {
                b == b'-'
            } else {
                b.is_ascii_hexdigit()
            }
        })
    }

    /// Parse the textual form.
    pub fn parse(text: &[u8]) -> Result<Self> {
        if !Self::is_well_formed(text) {
            return Err(VeilError::InvalidArgument("malformed token".into()));
        }

        let digits: Vec<u8> = text.iter().copied().filter(|&b| b != b'-').collect();
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(&digits, &mut bytes)
            .map_err(|e| VeilError::InvalidArgument(e.to_string()))?;

        Ok(Self(bytes))
    }

    /// Encode to the 36-byte textual form.
    pub fn to_text(&self) -> [u8; TOKEN_LEN] {
        let digits = hex::encode(self.0);
        let digits = digits.as_bytes();

        let mut out = [b'-'; TOKEN_LEN];
        let mut src = 0;
        for (i, slot) in out.iter_mut().enumerate() {
            if HYPHENS.contains(&i) {
                continue;
            }
            *slot = digits[src];
            src += 1;
        }
        out
    }
}

impl std::str::FromStr for Token {
    type Err = VeilError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.as_bytes())
    }
}

// Tokens are credentials: Debug never prints the value.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(..)")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_text();
        // to_text only emits ASCII hex digits and hyphens.
        f.write_str(std::str::from_utf8(&text).map_err(|_| fmt::Error)?)
    }
}

/// A caller identity: the effective user id in the hosting namespace.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity(pub u32);

impl Identity {
    /// The superuser identity.
    pub const ROOT: Self = Self(0);

    pub const fn new(uid: u32) -> Self {
        Self(uid)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Identity {
    fn from(uid: u32) -> Self {
        Self(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

    #[test]
    fn test_token_text_roundtrip() {
        let token: Token = SAMPLE.parse().unwrap();
        assert_eq!(token.to_string(), SAMPLE);
        assert_eq!(token.as_bytes()[0], 0x0f);
        assert_eq!(token.as_bytes()[15], 0x0e);
    }

    #[test]
    fn test_token_uppercase_accepted() {
        let upper = SAMPLE.to_ascii_uppercase();
        let token: Token = upper.parse().unwrap();
        assert_eq!(token, SAMPLE.parse().unwrap());
    }

    #[test]
    fn test_token_malformed() {
        assert!(!Token::is_well_formed(b""));
        assert!(!Token::is_well_formed(&SAMPLE.as_bytes()[..35]));
        assert!(!Token::is_well_formed(b"0f8fad5bd9cb-469f-a165-70867728950e0"));
        assert!(!Token::is_well_formed(b"0f8fad5b-d9cb-469f-a165-70867728950g"));
        assert!(matches!(
            Token::parse(b"not-a-token"),
            Err(VeilError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_token_debug_redacted() {
        let token: Token = SAMPLE.parse().unwrap();
        let debug = format!("{:?}", token);
        assert_eq!(debug, "Token(..)");
        assert!(!debug.contains("0f8f"));
    }

    #[test]
    fn test_generated_tokens_differ() {
        assert_ne!(Token::generate(), Token::generate());
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(Identity::new(1000).to_string(), "1000");
        assert_eq!(format!("{:?}", Identity::ROOT), "Identity(0)");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn text_form_roundtrips(bytes in any::<[u8; 16]>()) {
                let token = Token::from_bytes(bytes);
                let text = token.to_text();
                prop_assert!(Token::is_well_formed(&text));
                prop_assert_eq!(Token::parse(&text).unwrap(), token);
            }

            #[test]
            fn parse_accepts_exactly_well_formed_text(
                text in prop::collection::vec(any::<u8>(), 0..40),
            ) {
                prop_assert_eq!(Token::parse(&text).is_ok(), Token::is_well_formed(&text));
            }

            #[test]
            fn mixed_case_text_parses_to_lowercase_form(
                text in "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
            ) {
                let token = Token::parse(text.as_bytes()).unwrap();
                prop_assert_eq!(token.to_string(), text.to_ascii_lowercase());
            }
        }
    }
}
