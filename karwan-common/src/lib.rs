//! # Karwan Common Library
//!
//! Core of the Karwan-e-Tijarat professional directory:
//! - Profile data model and field validation
//! - Phone number normalization
//! - Schema management (creation, column sync, versioned migrations)
//! - Profile persistence and substring search
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod phone;
pub mod validation;

pub use error::{Error, Result};
