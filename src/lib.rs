//! Gator - A command-line RSS feed aggregator
//!
//! Users register, add and follow feeds, and `agg` periodically scrapes the
//! feed that has gone longest without a fetch.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod scraper;

pub use commands::{Command, Commands, Handler, State};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use fetcher::Fetcher;
