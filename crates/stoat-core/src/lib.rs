//! Core library for stoat.
//!
//! This crate provides the foundational types and functionality used by the
//! `stoat` CLI and any downstream consumers.
//!
//! # Modules
//!
//! - [`collect`] - Reference collection across managed projects
//! - [`config`] - Configuration loading and management
//! - [`git`] - Git operations for release workflows
//! - [`plugins`] - Plugin capabilities and registry
//! - [`project`] - Managed packages and their release configuration
//! - [`refs`] - Version reference model and pattern matching
//! - [`release`] - The release workflow
//! - [`resolve`] - Target version resolution
//! - [`rewrite`] - Atomic multi-file rewriting
//! - [`validate`] - Consistency checks
//!
//! # Quick Start
//!
//! ```no_run
//! use stoat_core::{Config, ConfigLoader};
//!
//! let config = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! println!("Release branch: {}", config.release.branch);
//! ```
#![deny(unsafe_code)]

pub mod collect;

pub mod config;

pub mod error;

pub mod git;

pub mod plugins;

pub mod project;

pub mod refs;

pub mod release;

pub mod resolve;

pub mod rewrite;

pub mod validate;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use refs::VersionRef;

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
