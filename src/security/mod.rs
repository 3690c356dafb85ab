//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream response received:
//!     → access_control.rs (extension allow-list, when enforced)
//!     → Pass to response shaping, or reject with 403
//! ```
//!
//! # Design Decisions
//! - One relay handler; filtering is configuration, not a second code path
//! - Extension comparison is case-insensitive
//! - Fail closed: a target with no usable extension is rejected

pub mod access_control;

pub use access_control::{extension_of, ExtensionFilter};
