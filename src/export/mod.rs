//! Per-message output: naming, HTML layout, and attachment files.

pub mod attachment;
pub mod document;
pub mod naming;
