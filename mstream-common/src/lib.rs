//! # mstream common library
//!
//! Shared code for the mstream services:
//! - Error type
//! - Configuration resolution (CLI/env, TOML, compiled defaults)
//! - Track / playlist data model
//! - Bearer token parsing and the external login-service validator
//! - Database initialization

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
