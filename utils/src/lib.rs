//! Shared infrastructure utilities for Folio.
//!
//! This crate provides cross-cutting utilities that more than one Folio crate
//! needs but that don't belong in the domain-pure `folio-types` crate:
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)

pub mod atomic_write;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write, atomic_write_with_options,
    recover_bak_file, write_json_atomic,
};
