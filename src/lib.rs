//! `mboxpdf` — convert MBOX archives into one PDF per message.
//!
//! This crate provides the conversion pipeline: archive discovery, message
//! parsing, output naming and deduplication, bounded-parallel rendering with
//! retry, and attachment extraction. The renderer is pluggable through the
//! traits in [`render`].

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;
