//! Middleware modules
//!
//! Contains the credential extractor.

pub mod auth;

pub use auth::ForwardedCredential;
