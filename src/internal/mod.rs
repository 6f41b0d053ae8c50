//! Internal helper functions and utilities.
//!
//! Shared implementation details that are not part of the public API.

mod helpers;
mod policy;

pub(crate) use helpers::*;
pub(crate) use policy::*;
