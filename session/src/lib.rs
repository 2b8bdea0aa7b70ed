//! Foreground browse session: configuration, orchestration and state.
//!
//! This crate owns everything that runs on the foreground side of the
//! worker boundary. [`Browser`] drives a search end to end: input
//! classification, gateway routing, pre-flight probing, dispatch to the
//! verification worker and event-driven updates of [`BrowseSession`].
//! Retry policy, render-surface mapping, metrics and logging live here
//! too.

pub mod browser;
pub mod config;
pub mod error;
pub mod logging;
pub mod machine;
pub mod metrics;
pub mod render;
pub mod retry;
pub mod state;

pub use browser::Browser;
pub use config::BrowseConfig;
pub use error::SessionError;
pub use logging::{init_logging, LogFormat};
pub use machine::BrowseSession;
pub use metrics::SessionMetrics;
pub use render::{surface_for, RenderSurface, FRAME_SANDBOX};
pub use retry::{RetryController, RetryDecision};
pub use state::{BrowsePhase, SearchStatus, VerificationStats};
