//! Jira issue paging and check-in annotation for hosted version-control
//! workflows.

pub mod checkin;
pub mod command;
pub mod config;
pub mod error;
pub mod filter;
pub mod jira;
pub mod logging;
pub mod notify;
pub mod query;
pub mod section;
pub mod settings;
pub mod text;

pub use error::{Error, Result};
