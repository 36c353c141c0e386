//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the recitation audio core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its configuration type, its
//! logging conventions and the broadcast channel used to publish playback and
//! download events.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
