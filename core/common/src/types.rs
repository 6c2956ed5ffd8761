//! Common types used throughout CellCrypt.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default grid width used by the stream cipher.
pub const DEFAULT_WIDTH: usize = 256;

/// Default grid height used by the stream cipher.
pub const DEFAULT_HEIGHT: usize = 256;

/// Default number of Fredkin steps between keystream blocks.
pub const DEFAULT_GENERATIONS_PER_BLOCK: usize = 100;

/// Parameters that fully determine a keystream.
///
/// Encryption and decryption of the same data must use identical values;
/// a mismatch is not detected and simply produces garbage output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    /// Seed for the grid's initial pseudo-random state.
    pub seed: u64,
    /// Grid width in cells.
    #[serde(default = "default_width")]
    pub width: usize,
    /// Grid height in cells.
    #[serde(default = "default_height")]
    pub height: usize,
    /// Fredkin steps run before each keystream block is extracted.
    #[serde(default = "default_generations_per_block")]
    pub generations_per_block: usize,
}

/// Number of cells in a `width` x `height` grid.
///
/// # Errors
/// - `InvalidDimensions` if either side is zero or the product overflows
pub fn cell_count(width: usize, height: usize) -> Result<usize> {
    match width.checked_mul(height) {
        Some(count) if count > 0 => Ok(count),
        _ => Err(Error::InvalidDimensions { width, height }),
    }
}

fn default_width() -> usize {
    DEFAULT_WIDTH
}

fn default_height() -> usize {
    DEFAULT_HEIGHT
}

fn default_generations_per_block() -> usize {
    DEFAULT_GENERATIONS_PER_BLOCK
}

impl CipherParams {
    /// Create parameters with the default 256x256 topology and 100
    /// generations per block.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            generations_per_block: DEFAULT_GENERATIONS_PER_BLOCK,
        }
    }

    /// Set grid dimensions.
    pub fn with_topology(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set generations per block.
    pub fn with_generations_per_block(mut self, generations: usize) -> Self {
        self.generations_per_block = generations;
        self
    }

    /// Check that the parameters describe a usable keystream.
    ///
    /// # Errors
    /// - `InvalidDimensions` if width or height is zero or their product overflows
    /// - `InvalidInput` if generations per block is zero
    pub fn validate(&self) -> Result<()> {
        cell_count(self.width, self.height)?;
        if self.generations_per_block == 0 {
            return Err(Error::InvalidInput(
                "Generations per block must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize parameters to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize parameters from JSON.
    ///
    /// Missing topology fields fall back to the defaults; `seed` is required.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }
}
