//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`] — domain-level errors
//! - [`digest`] — content digests used to reference step inputs in traces
//! - [`string`] — UTF-8 safe string helpers
//! - [`validation`] — startup configuration issues

pub mod digest;
pub mod error;
pub mod string;
pub mod validation;
