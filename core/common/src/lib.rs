//! Common utilities and types shared across CellCrypt modules.
//!
//! This module provides the error taxonomy and the cipher parameter set
//! used by both the automaton engine and the cipher layer.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{cell_count, CipherParams};
