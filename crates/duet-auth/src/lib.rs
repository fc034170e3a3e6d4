//! Guest and OIDC session orchestration behind one credential surface.
//!
//! # Design
//! - [`AuthOrchestrator`] is the only type application code talks to; it routes
//!   to [`GuestSession`] or [`DelegatedSession`] depending on the mode resolved
//!   by `init_once`.
//! - The OIDC protocol lives behind [`OidcClient`]; this crate drives it and
//!   persists its tokens through the injected [`duet_store::Store`].
//! - Collaborators travel in an [`AuthContext`] built once at startup.
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

pub mod context;
pub mod delegated;
pub mod error;
pub mod guest;
pub mod init_gate;
pub mod orchestrator;
pub mod provider;
pub mod throttle;

pub use context::{AuthContext, AuthContextBuilder, Navigator, StaticNavigator};
pub use delegated::{
    DEFAULT_MIN_VALIDITY, DEFAULT_REFRESH_WINDOW, DelegatedSession, RefreshPolicy, TokenKeys,
};
pub use error::{AuthError, AuthResult, ProviderError};
pub use guest::GuestSession;
pub use init_gate::InitGate;
pub use orchestrator::{AuthOrchestrator, InitOutcome};
pub use provider::{
    LoginOptions, LogoutOptions, MinValidity, OidcClient, OidcClientFactory, ProviderInitOptions,
    ProviderListener, TokenSet,
};
pub use throttle::{Throttle, ThrottledRun};
