// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

//! Core types and the column-transcription engine for the mcal metacal
//! catalog collation tools.
//!
//! The modules here are pure: they know nothing about files on disk. The
//! `mcal_fits` crate handles I/O, and the `mcal` crate drives the two of
//! them from the command line.

pub mod bands;
pub mod errors;
pub mod mapping;
pub mod names;
#[cfg(feature = "notifications")]
pub mod notify;
pub mod schema;
pub mod table;
pub mod transcribe;

pub use errors::CollateError;
pub use table::Table;
