//! Common functionality for the Ad+ header-bidding integration.
//!
//! This crate holds the platform-independent pieces used by the Fastly edge
//! host and by tests.
//!
//! # Modules
//!
//! - [`bidder`]: Ad+ bid adapter (validation, request building, response mapping)
//! - [`cookies`]: Cookie parsing and generation utilities
//! - [`error`]: Error types and error handling utilities
//! - [`identity`]: Ad+ user identity submodule (storage, refresh, eids)
//! - [`registry`]: Registration of bidders and identity submodules
//! - [`settings`]: Configuration management and validation
//! - [`test_support`]: Testing utilities and mocks

pub mod bidder;
pub mod cookies;
pub mod error;
pub mod identity;
pub mod registry;
pub mod settings;
pub mod settings_data;
pub mod test_support;
