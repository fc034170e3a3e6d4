//! Notification bus for authentication state changes.
//!
//! The bus carries the four auth signals UI code reacts to. Publishing is
//! fire-and-forget: a bus without subscribers drops live delivery but still
//! records the event in a bounded replay ring so late subscribers (a view that
//! mounts after `init` resolved) can catch up with `subscribe(Some(id))`.
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

mod payloads;
mod routing;

pub use payloads::{AuthEvent, DEFAULT_REPLAY_CAPACITY, EventEnvelope, EventId};
pub use routing::{EventBus, EventStream};
