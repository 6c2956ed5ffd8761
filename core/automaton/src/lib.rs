//! Cellular automaton engine for CellCrypt.
//!
//! This module provides:
//! - A fixed-size binary grid with precomputed Moore-neighborhood adjacency
//! - Fredkin (parity) and Conway stepping with simultaneous update
//! - Bit packing of cell states into key bytes
//! - Seed sources: the fixed seeded generator and brightness-map masks
//!
//! # Determinism
//! Given the same dimensions and seed, a grid goes through the same
//! sequence of states on every run and platform. The cipher layer depends
//! on this to reproduce its keystream.

pub mod bits;
pub mod grid;
pub mod seed;

pub use bits::{pack, pack_truncated, unpack};
pub use grid::{Cell, Grid};
pub use seed::{BrightnessMap, PasscodeRasterizer, Threshold};
