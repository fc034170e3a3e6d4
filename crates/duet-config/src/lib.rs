//! Configuration model for the duet auth stack.
//!
//! # Design
//! - A single serialisable [`AuthConfig`] document describes both identity modes.
//! - Missing identity-provider fields are a valid "delegated mode off" state and
//!   never an error; only malformed values fail validation.
//! - Host-specific collaborators (store, navigation) are injected elsewhere and
//!   are intentionally absent from the document.
#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ENV_PREFIX;
pub use model::{AuthConfig, AuthFlow, DEFAULT_GUEST_ROLE, DelegatedParams, ProviderOverrides};
