//! Fundamental types for the Arvex browse pipeline.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: identifiers, content categories, timestamps, and shared errors.

pub mod content;
pub mod error;
pub mod identifier;
pub mod time;
pub mod url;

pub use content::ContentCategory;
pub use error::IdentifierError;
pub use identifier::{ArnsName, Identifier, TxId};
pub use time::Timestamp;

/// The gateway used when discovery fails entirely or no preference is set.
pub const DEFAULT_GATEWAY: &str = "https://turbo-gateway.com";
