//! Token store: the set of credentials accepted on the control channel.
//!
//! An empty store means authentication is disabled, so a freshly loaded
//! engine can be armed by the first well-formed message.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use tracing::debug;

use veil_core::{Result, Token, VeilError};

/// Thread-safe set of valid tokens.
pub struct TokenStore {
    tokens: RwLock<BTreeSet<Token>>,
    limit: usize,
}

impl TokenStore {
    /// Create an empty store holding at most `limit` tokens.
    pub fn new(limit: usize) -> Self {
        Self {
            tokens: RwLock::new(BTreeSet::new()),
            limit,
        }
    }

    /// Check a candidate token.
    ///
    /// Malformed input fails without taking the lock. With no tokens
    /// registered every well-formed candidate passes.
    pub fn verify(&self, candidate: &[u8]) -> bool {
        let token = match Token::parse(candidate) {
            Ok(token) => token,
            Err(_) => {
                debug!("verify: token format invalid");
                return false;
            }
        };

        let tokens = self.tokens.read();
        tokens.is_empty() || tokens.contains(&token)
    }

    /// Register a token.
    pub fn add(&self, candidate: &[u8]) -> Result<()> {
        let token = Token::parse(candidate)?;

        let mut tokens = self.tokens.write();
        if tokens.contains(&token) {
            return Err(VeilError::AlreadyExists("token".into()));
        }
        if tokens.len() >= self.limit {
            return Err(VeilError::OutOfMemory(format!(
                "token store full ({} entries)",
                self.limit
            )));
        }

        tokens.insert(token);
        debug!(count = tokens.len(), "token added");
        Ok(())
    }

    /// Unregister a token.
    pub fn remove(&self, candidate: &[u8]) -> Result<()> {
        let token = Token::parse(candidate)?;

        let mut tokens = self.tokens.write();
        if !tokens.remove(&token) {
            return Err(VeilError::NotFound("token".into()));
        }

        debug!(count = tokens.len(), "token removed");
        Ok(())
    }

    /// Number of registered tokens.
    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    /// Whether authentication is currently disabled.
    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }

    /// Drop every token.
    pub fn clear(&self) {
        self.tokens.write().clear();
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(crate::TableLimits::default().max_tokens)
    }
}
