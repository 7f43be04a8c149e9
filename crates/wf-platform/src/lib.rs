//! Wyffle Platform
//!
//! Internship applications, derived student records, course-fee payments
//! and student documents, served over axum with MongoDB persistence.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;

pub use config::PlatformConfig;
pub use error::{PlatformError, Result};
