//! compose-core is the message-composition and streaming-ingestion core of a
//! chat front-end.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`suggest`] watches compose-box input for trigger characters (`/`, `#`,
//!   `@`), ranks candidates from a host-supplied provider, and materializes
//!   the user's choice back into the compose line.
//! - [`core`] owns stream-session state and the streaming orchestration that
//!   decodes newline-delimited completion frames into an append-only
//!   assistant buffer.
//! - [`api`] defines the chat request/response payloads exchanged with the
//!   completion endpoint.
//! - [`utils`] holds small input/URL helpers shared by both sides.
//!
//! The host application owns rendering, persistence, credential storage, and
//! settings; it hands this crate candidate lists, a bearer credential, and an
//! endpoint URL, and consumes the events the two engines emit. The two
//! engines never call each other; the host composes them.

pub mod api;
pub mod core;
pub mod suggest;
pub mod utils;
