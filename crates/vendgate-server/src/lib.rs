//! `vendgate` gateway server.
//!
//! Accepts vendor envelopes from internal callers, sanitizes them, checks
//! the caller credential, attaches the vendor identity field, and relays the
//! envelope to the upstream proxy-inventory API. The upstream response is
//! returned verbatim; decrypting it is the client's job.

pub mod config;
pub mod error;
pub mod forwarder;
pub mod routes;
pub mod state;
pub mod upstream;
