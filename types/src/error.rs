use thiserror::Error;

/// Errors produced while validating user-supplied search input.
///
/// Every variant maps to a message suitable for direct display; input
/// validation happens before any network activity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("enter a transaction ID or name to browse")]
    Empty,

    #[error("names are limited to 51 characters")]
    TooLong,

    #[error("not a valid transaction ID or name: {0}")]
    InvalidCharacters(String),
}
