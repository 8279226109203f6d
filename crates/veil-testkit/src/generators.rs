//! Proptest generators for property-based testing.

use proptest::prelude::*;

use veil_core::{Command, ControlMessage, Identity, Token, UserAddr, TOKEN_LEN};

/// A single path component: lowercase, digits, dot, dash, underscore.
pub fn component() -> impl Strategy<Value = String> {
    "[a-z0-9._-]{1,12}".prop_filter("not a dot entry", |c| c != "." && c != "..")
}

/// An absolute path of one to `max_depth` components.
pub fn absolute_path(max_depth: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(component(), 1..=max_depth.max(1))
        .prop_map(|parts| format!("/{}", parts.join("/")))
}

/// A directory path and a non-empty set of distinct child names.
pub fn directory(max_children: usize) -> impl Strategy<Value = (String, Vec<String>)> {
    (
        absolute_path(3),
        prop::collection::btree_set(component(), 1..=max_children.max(1)),
    )
        .prop_map(|(dir, names)| (dir, names.into_iter().collect()))
}

/// A random token.
pub fn token() -> impl Strategy<Value = Token> {
    any::<[u8; 16]>().prop_map(Token::from_bytes)
}

/// A random token in wire form.
pub fn token_text() -> impl Strategy<Value = [u8; TOKEN_LEN]> {
    token().prop_map(|t| t.to_text())
}

/// 36 bytes that are not a well-formed token.
pub fn malformed_token() -> impl Strategy<Value = [u8; TOKEN_LEN]> {
    prop::collection::vec(any::<u8>(), TOKEN_LEN)
        .prop_map(|bytes| {
            let mut text = [0u8; TOKEN_LEN];
            text.copy_from_slice(&bytes);
            text
        })
        .prop_filter("must be malformed", |text| !Token::is_well_formed(text))
}

/// Any identity.
pub fn identity() -> impl Strategy<Value = Identity> {
    any::<u32>().prop_map(Identity)
}

/// A caller address.
pub fn user_addr() -> impl Strategy<Value = UserAddr> {
    any::<u64>().prop_map(UserAddr)
}

/// Any command.
pub fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::Enable),
        Just(Command::Disable),
        Just(Command::Flush),
        user_addr().prop_map(|path| Command::HiddenAdd { path }),
        user_addr().prop_map(|path| Command::HiddenRemove { path }),
        identity().prop_map(Command::IdentityAdd),
        identity().prop_map(Command::IdentityRemove),
        token_text().prop_map(Command::TokenAdd),
        token_text().prop_map(Command::TokenRemove),
    ]
}

/// Any control message. The authenticating token may be malformed.
pub fn control_message() -> impl Strategy<Value = ControlMessage> {
    (
        prop_oneof![token_text(), malformed_token()],
        command(),
    )
        .prop_map(|(token, command)| ControlMessage::new(token, command))
}
