//! `vendgate` client.
//!
//! The single entry point surrounding code needs: [`VendorClient::call`]
//! takes a vendor path and a parameter object, and returns the vendor's
//! decrypted result or a [`CallError`]. Envelopes, encryption and gateway
//! error codes never leak past this crate.

pub mod client;
pub mod config;
pub mod error;

pub use client::VendorClient;
pub use config::ClientConfig;
pub use error::CallError;
