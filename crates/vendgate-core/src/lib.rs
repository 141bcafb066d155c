//! Core library for `vendgate`.
//!
//! Contains the vendor envelope model, the AES-CBC envelope codec, the
//! shared secret type, and the inbound payload sanitizer. This crate does no
//! network I/O: the gateway server and the client both build on it.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod sanitize;
pub mod secret;
