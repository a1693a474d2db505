//! # deckgen Common Library
//!
//! Shared code for the deckgen workspace:
//! - Common error type
//! - Bootstrap configuration loading and root folder resolution
//! - On-disk layout of stores, backups, media and decks
//! - Tracing initialisation

pub mod config;
pub mod error;
pub mod layout;
pub mod logging;

pub use error::{Error, Result};
pub use layout::RootLayout;
