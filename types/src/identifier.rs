//! Search-input classification: transaction IDs vs. ArNS names.
//!
//! A transaction ID is exactly 43 base64url characters (the unpadded
//! encoding of a 32-byte digest). Anything else that fits the ArNS
//! grammar (1–51 lowercase alphanumerics, hyphens, underscores) is a
//! name. Classification is pure and involves no network activity.

use crate::error::IdentifierError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a base64url-encoded transaction ID.
pub const TX_ID_LEN: usize = 43;

/// Maximum length of an ArNS name.
pub const ARNS_NAME_MAX_LEN: usize = 51;

/// A validated 43-character base64url transaction ID.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(String);

impl TxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated ArNS name (1–51 chars of `[a-z0-9_-]`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArnsName(String);

impl ArnsName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArnsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A classified search input: either a content identifier or a name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    TxId(TxId),
    ArnsName(ArnsName),
}

fn is_tx_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
}

impl Identifier {
    /// Classify a trimmed search input.
    ///
    /// A 43-character base64url string always classifies as a transaction
    /// ID, even when it also happens to fit the name grammar.
    pub fn classify(input: &str) -> Result<Self, IdentifierError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(IdentifierError::Empty);
        }

        if input.len() == TX_ID_LEN && input.chars().all(is_tx_id_char) {
            return Ok(Self::TxId(TxId(input.to_string())));
        }

        if input.chars().all(is_name_char) {
            if input.len() > ARNS_NAME_MAX_LEN {
                return Err(IdentifierError::TooLong);
            }
            return Ok(Self::ArnsName(ArnsName(input.to_string())));
        }

        Err(IdentifierError::InvalidCharacters(input.to_string()))
    }

    /// Whether the input would classify successfully.
    pub fn is_valid_input(input: &str) -> bool {
        Self::classify(input).is_ok()
    }

    /// The raw string form, without classification information.
    pub fn as_str(&self) -> &str {
        match self {
            Self::TxId(id) => id.as_str(),
            Self::ArnsName(name) => name.as_str(),
        }
    }

    /// Whether this identifier is a transaction ID.
    pub fn is_tx_id(&self) -> bool {
        matches!(self, Self::TxId(_))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
