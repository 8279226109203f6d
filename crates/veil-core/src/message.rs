//! Control-message wire format.
//!
//! A control message is a fixed 80-byte little-endian structure with C
//! layout:
//!
//! ```text
//! offset 0   token[36]      textual UUID, not NUL-terminated
//! offset 36  operation u32
//! offset 40  args[40]       union, interpreted per operation:
//!              TOKEN_*    token[36]
//!              HIDDEN_*   u64 caller address of a NUL-terminated path
//!              IDENTITY_* u32 identity
//! ```
//!
//! The operation tag is validated before any of the argument bytes are
//! interpreted.

use bytes::{Buf, BufMut, BytesMut};
use std::fmt;

use crate::error::{Result, VeilError};
use crate::types::{Identity, TOKEN_LEN};

/// Magic option value that marks a generic control call as a Veil message.
pub const CONTROL_KEY: u32 = 0x55aa_00ff;

/// Size of the encoded message.
pub const MESSAGE_SIZE: usize = 80;

/// Offset of the operation code.
pub const OP_OFFSET: usize = TOKEN_LEN;

/// Offset of the argument union (8-byte aligned).
pub const ARGS_OFFSET: usize = 40;

/// Size of the argument union.
pub const ARGS_SIZE: usize = MESSAGE_SIZE - ARGS_OFFSET;

/// An address in the caller's memory. Zero is the null address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserAddr(pub u64);

impl UserAddr {
    pub const NULL: Self = Self(0);

    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// The address `offset` bytes further on, or `None` on overflow.
    pub fn checked_add(&self, offset: u64) -> Option<Self> {
        self.0.checked_add(offset).map(Self)
    }
}

impl fmt::Debug for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserAddr({:#x})", self.0)
    }
}

/// Operation codes, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OpCode {
    Enable = 0,
    Disable = 1,
    Flush = 2,
    HiddenAdd = 3,
    HiddenRemove = 4,
    IdentityAdd = 5,
    IdentityRemove = 6,
    TokenAdd = 7,
    TokenRemove = 8,
}

impl OpCode {
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Enable => "enable",
            OpCode::Disable => "disable",
            OpCode::Flush => "flush",
            OpCode::HiddenAdd => "hidden-add",
            OpCode::HiddenRemove => "hidden-remove",
            OpCode::IdentityAdd => "identity-add",
            OpCode::IdentityRemove => "identity-remove",
            OpCode::TokenAdd => "token-add",
            OpCode::TokenRemove => "token-remove",
        }
    }
}

impl TryFrom<u32> for OpCode {
    type Error = VeilError;

    fn try_from(value: u32) -> Result<Self> {
        Ok(match value {
            0 => OpCode::Enable,
            1 => OpCode::Disable,
            2 => OpCode::Flush,
            3 => OpCode::HiddenAdd,
            4 => OpCode::HiddenRemove,
            5 => OpCode::IdentityAdd,
            6 => OpCode::IdentityRemove,
            7 => OpCode::TokenAdd,
            8 => OpCode::TokenRemove,
            other => {
                return Err(VeilError::InvalidArgument(format!(
                    "unknown operation code {other}"
                )))
            }
        })
    }
}

/// A decoded operation with its argument.
///
/// Token arguments stay as raw text; the token store validates them.
/// Path arguments stay as caller addresses; the dispatcher copies them.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    Enable,
    Disable,
    Flush,
    HiddenAdd { path: UserAddr },
    HiddenRemove { path: UserAddr },
    IdentityAdd(Identity),
    IdentityRemove(Identity),
    TokenAdd([u8; TOKEN_LEN]),
    TokenRemove([u8; TOKEN_LEN]),
}

impl Command {
    pub fn op(&self) -> OpCode {
        match self {
            Command::Enable => OpCode::Enable,
            Command::Disable => OpCode::Disable,
            Command::Flush => OpCode::Flush,
            Command::HiddenAdd { .. } => OpCode::HiddenAdd,
            Command::HiddenRemove { .. } => OpCode::HiddenRemove,
            Command::IdentityAdd(_) => OpCode::IdentityAdd,
            Command::IdentityRemove(_) => OpCode::IdentityRemove,
            Command::TokenAdd(_) => OpCode::TokenAdd,
            Command::TokenRemove(_) => OpCode::TokenRemove,
        }
    }

    fn decode_args(op: OpCode, mut args: &[u8]) -> Self {
        match op {
            OpCode::Enable => Command::Enable,
            OpCode::Disable => Command::Disable,
            OpCode::Flush => Command::Flush,
            OpCode::HiddenAdd => Command::HiddenAdd {
                path: UserAddr(args.get_u64_le()),
            },
            OpCode::HiddenRemove => Command::HiddenRemove {
                path: UserAddr(args.get_u64_le()),
            },
            OpCode::IdentityAdd => Command::IdentityAdd(Identity(args.get_u32_le())),
            OpCode::IdentityRemove => Command::IdentityRemove(Identity(args.get_u32_le())),
            OpCode::TokenAdd => Command::TokenAdd(read_token(&mut args)),
            OpCode::TokenRemove => Command::TokenRemove(read_token(&mut args)),
        }
    }

    fn encode_args(&self, buf: &mut BytesMut) {
        let start = buf.len();
        match self {
            Command::Enable | Command::Disable | Command::Flush => {}
            Command::HiddenAdd { path } | Command::HiddenRemove { path } => {
                buf.put_u64_le(path.0);
            }
            Command::IdentityAdd(id) | Command::IdentityRemove(id) => {
                buf.put_u32_le(id.0);
            }
            Command::TokenAdd(token) | Command::TokenRemove(token) => {
                buf.put_slice(token);
            }
        }
        let written = buf.len() - start;
        buf.put_bytes(0, ARGS_SIZE - written);
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::HiddenAdd { path } | Command::HiddenRemove { path } => {
                write!(f, "{}({:?})", self.op().name(), path)
            }
            Command::IdentityAdd(id) | Command::IdentityRemove(id) => {
                write!(f, "{}({})", self.op().name(), id)
            }
            _ => f.write_str(self.op().name()),
        }
    }
}

/// A decoded control message.
#[derive(Clone, PartialEq, Eq)]
pub struct ControlMessage {
    /// The authenticating token, as raw text.
    pub token: [u8; TOKEN_LEN],
    pub command: Command,
}

impl ControlMessage {
    pub fn new(token: [u8; TOKEN_LEN], command: Command) -> Self {
        Self { token, command }
    }

    /// Decode the fixed-size structure.
    ///
    /// Fails with `InvalidArgument` on an unknown operation code; argument
    /// bytes are not read in that case.
    pub fn decode(bytes: &[u8; MESSAGE_SIZE]) -> Result<Self> {
        let mut buf = &bytes[..];

        let token = read_token(&mut buf);
        let op = OpCode::try_from(buf.get_u32_le())?;

        let args = &bytes[ARGS_OFFSET..];
        let command = Command::decode_args(op, args);

        Ok(Self { token, command })
    }

    /// Encode to the fixed-size structure. Padding bytes are zero.
    pub fn encode(&self) -> [u8; MESSAGE_SIZE] {
        let mut buf = BytesMut::with_capacity(MESSAGE_SIZE);
        buf.put_slice(&self.token);
        buf.put_u32_le(self.command.op().to_u32());
        self.command.encode_args(&mut buf);

        let mut out = [0u8; MESSAGE_SIZE];
        out.copy_from_slice(&buf);
        out
    }
}

impl fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlMessage")
            .field("token", &"..")
            .field("command", &self.command)
            .finish()
    }
}

fn read_token(buf: &mut &[u8]) -> [u8; TOKEN_LEN] {
    let mut token = [0u8; TOKEN_LEN];
    buf.copy_to_slice(&mut token);
    token
}
