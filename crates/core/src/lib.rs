// crates/core/src/lib.rs
//! Core parsing, classification, and redaction for the prompt-vault
//! sync pipeline. Everything in this crate is a pure function over its
//! inputs (plus read-only filesystem access); all store side effects
//! live in the sync crate.

pub mod config;
pub mod discovery;
pub mod error;
pub mod ownership;
pub mod parser;
pub mod redaction;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, ParseError};
pub use types::{ContentBlock, MessageContent, MessageRecord, Project, SessionRecord};
