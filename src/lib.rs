//! Terminal client for a threat-intelligence question-answering service

pub mod api;
pub mod config;
pub mod download;
pub mod error;
pub mod history;
pub mod logging;
pub mod markup;
pub mod query;
pub mod session;
pub mod ui;

pub use error::{Error, Result};
