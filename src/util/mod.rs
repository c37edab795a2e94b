//! Internal utilities for bit manipulation and float canonicalisation.
//!
//! This module contains low-level helpers used by the succinct data
//! structures. Most users should not need to use these directly.

pub(crate) mod broadword;
pub(crate) mod float;
pub(crate) mod tables;

#[allow(unused_imports)]
pub(crate) use broadword::{select_in_byte, select_in_word};
