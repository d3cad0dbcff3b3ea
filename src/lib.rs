// PassGuard — Library root
//
// Re-exports the crypto, store, policy, service, CLI, and gateway modules.

pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod mailer;
pub mod policy;
pub mod service;
pub mod store;

pub use error::{Error, Result};
