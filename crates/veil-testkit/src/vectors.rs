//! Golden control-message vectors.
//!
//! Each vector pins the exact 80-byte encoding of one message, so clients
//! written against the wire layout can be checked byte for byte.

use std::path::Path;

use serde::{Deserialize, Serialize};

use veil_core::{Command, ControlMessage, Identity, UserAddr, TOKEN_LEN};

const TOKEN_A: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";
const TOKEN_B: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

/// A golden test vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: String,
    /// Authenticating token.
    pub token: String,
    /// Operation name as logged.
    pub op: String,
    /// Path address, identity or token argument, if any.
    pub arg: Option<String>,
    /// Expected encoding (hex).
    pub expected: String,
}

impl GoldenVector {
    fn new(name: &str, token: &str, command: Command, expected: &str) -> Self {
        let arg = match &command {
            Command::HiddenAdd { path } | Command::HiddenRemove { path } => {
                Some(format!("{:#x}", path.0))
            }
            Command::IdentityAdd(id) | Command::IdentityRemove(id) => Some(id.to_string()),
            Command::TokenAdd(t) | Command::TokenRemove(t) => {
                Some(String::from_utf8_lossy(t).into_owned())
            }
            Command::Enable | Command::Disable | Command::Flush => None,
        };

        Self {
            name: name.into(),
            token: token.into(),
            op: command.op().name().into(),
            arg,
            expected: expected.into(),
        }
    }

    /// Rebuild the message this vector describes.
    pub fn message(&self) -> Result<ControlMessage, String> {
        let token = text_token(&self.token)?;
        let arg = || {
            self.arg
                .as_deref()
                .ok_or_else(|| format!("{}: missing argument", self.name))
        };

        let command = match self.op.as_str() {
            "enable" => Command::Enable,
            "disable" => Command::Disable,
            "flush" => Command::Flush,
            "hidden-add" => Command::HiddenAdd {
                path: parse_addr(arg()?)?,
            },
            "hidden-remove" => Command::HiddenRemove {
                path: parse_addr(arg()?)?,
            },
            "identity-add" => Command::IdentityAdd(parse_identity(arg()?)?),
            "identity-remove" => Command::IdentityRemove(parse_identity(arg()?)?),
            "token-add" => Command::TokenAdd(text_token(arg()?)?),
            "token-remove" => Command::TokenRemove(text_token(arg()?)?),
            other => return Err(format!("{}: unknown op {}", self.name, other)),
        };

        Ok(ControlMessage::new(token, command))
    }

    /// Check encoding and decoding against the expected bytes.
    pub fn verify(&self) -> Result<(), String> {
        let message = self.message()?;
        let actual = hex::encode(message.encode());
        if actual != self.expected {
            return Err(format!(
                "{}: encoding mismatch\n  expected {}\n  actual   {}",
                self.name, self.expected, actual
            ));
        }

        let bytes = hex::decode(&self.expected).map_err(|e| e.to_string())?;
        let bytes: [u8; veil_core::MESSAGE_SIZE] = bytes
            .try_into()
            .map_err(|_| format!("{}: expected encoding has wrong length", self.name))?;
        let decoded = ControlMessage::decode(&bytes).map_err(|e| e.to_string())?;
        if decoded != message {
            return Err(format!("{}: decoding mismatch", self.name));
        }
        Ok(())
    }
}

fn text_token(s: &str) -> Result<[u8; TOKEN_LEN], String> {
    s.as_bytes()
        .try_into()
        .map_err(|_| format!("token must be {} bytes", TOKEN_LEN))
}

fn parse_addr(s: &str) -> Result<UserAddr, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map(UserAddr)
        .map_err(|e| e.to_string())
}

fn parse_identity(s: &str) -> Result<Identity, String> {
    s.parse::<u32>().map(Identity).map_err(|e| e.to_string())
}

/// All golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector::new(
            "enable",
            TOKEN_A,
            Command::Enable,
            "30663866616435622d643963622d343639662d613136352d373038363737323839353065\
             00000000\
             00000000000000000000000000000000000000000000000000000000000000000000000000000000",
        ),
        GoldenVector::new(
            "disable",
            TOKEN_A,
            Command::Disable,
            "30663866616435622d643963622d343639662d613136352d373038363737323839353065\
             01000000\
             00000000000000000000000000000000000000000000000000000000000000000000000000000000",
        ),
        GoldenVector::new(
            "flush",
            TOKEN_A,
            Command::Flush,
            "30663866616435622d643963622d343639662d613136352d373038363737323839353065\
             02000000\
             00000000000000000000000000000000000000000000000000000000000000000000000000000000",
        ),
        GoldenVector::new(
            "hide a path at the first mapped page",
            TOKEN_A,
            Command::HiddenAdd {
                path: UserAddr(0x1000),
            },
            "30663866616435622d643963622d343639662d613136352d373038363737323839353065\
             03000000\
             00100000000000000000000000000000000000000000000000000000000000000000000000000000",
        ),
        GoldenVector::new(
            "unhide a path at a high address",
            TOKEN_A,
            Command::HiddenRemove {
                path: UserAddr(0x7fff_0000_1000),
            },
            "30663866616435622d643963622d343639662d613136352d373038363737323839353065\
             04000000\
             00100000ff7f00000000000000000000000000000000000000000000000000000000000000000000",
        ),
        GoldenVector::new(
            "exempt uid 1000",
            TOKEN_A,
            Command::IdentityAdd(Identity(1000)),
            "30663866616435622d643963622d343639662d613136352d373038363737323839353065\
             05000000\
             e8030000000000000000000000000000000000000000000000000000000000000000000000000000",
        ),
        GoldenVector::new(
            "unexempt root",
            TOKEN_A,
            Command::IdentityRemove(Identity::ROOT),
            "30663866616435622d643963622d343639662d613136352d373038363737323839353065\
             06000000\
             00000000000000000000000000000000000000000000000000000000000000000000000000000000",
        ),
        GoldenVector::new(
            "add a second token",
            TOKEN_A,
            Command::TokenAdd(*b"7c9e6679-7425-40de-944b-e07fc1f90ae7"),
            "30663866616435622d643963622d343639662d613136352d373038363737323839353065\
             07000000\
             37633965363637392d373432352d343064652d393434622d65303766633166393061653700000000",
        ),
        GoldenVector::new(
            "remove the first token using the second",
            TOKEN_B,
            Command::TokenRemove(*b"0f8fad5b-d9cb-469f-a165-70867728950e"),
            "37633965363637392d373432352d343064652d393434622d653037666331663930616537\
             08000000\
             30663866616435622d643963622d343639662d613136352d37303836373732383935306500000000",
        ),
    ]
}

/// Verify every vector, collecting all failures.
pub fn verify_all_vectors() -> Result<(), Vec<String>> {
    let failures: Vec<String> = all_vectors()
        .iter()
        .filter_map(|v| v.verify().err())
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

/// Write the vectors as pretty JSON.
pub fn write_vectors(path: impl AsRef<Path>, vectors: &[GoldenVector]) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(vectors)?;
    std::fs::write(path, json)
}

/// Read vectors previously written with [`write_vectors`].
pub fn read_vectors(path: impl AsRef<Path>) -> std::io::Result<Vec<GoldenVector>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
