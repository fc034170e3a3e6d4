//! HTTP credential adapter for `reqwest`.
//!
//! # Design
//! - The request hook asks a [`CredentialSource`] for the current credential and
//!   attaches `Authorization: Bearer …` in delegated mode or `guestid: …` in
//!   guest mode; an empty credential attaches nothing.
//! - The response hook turns 401 into `loginRequired` and 403 into
//!   `permissionDenied` on the notification bus, then hands the original error
//!   back to the caller.
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

pub mod client;
pub mod interceptor;

pub use client::AuthenticatedClient;
pub use interceptor::{CredentialInterceptor, CredentialSource, GUEST_HEADER};
