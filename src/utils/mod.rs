//! # Utilities
//!
//! - [`constant`] - Paging defaults and input limits
//! - [`validator`] - Boundary regexes and parsers

pub mod constant;
pub mod validator;
