//! Sources for a grid's initial state.
//!
//! A grid is seeded either from the fixed pseudo-random generator or from a
//! boolean mask. Masks usually come from a brightness map produced by an
//! external passcode rasterizer; rasterization depends on platform font
//! rendering and is not reproducible across environments.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use cellcrypt_common::{cell_count, Error, Result};

/// The generator used wherever a seed parameter appears.
///
/// ChaCha8 is specified by algorithm, so a given seed yields the same
/// sequence on every platform and crate version.
pub type SeedRng = ChaCha8Rng;

/// Create the fixed generator for `seed`.
pub fn seeded_rng(seed: u64) -> SeedRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Draw `len` cells from the generator; a cell is alive iff its draw
/// exceeds 0.5.
pub fn prng_mask(len: usize, seed: u64) -> Vec<bool> {
    let mut rng = seeded_rng(seed);
    (0..len).map(|_| rng.random::<f64>() > 0.5).collect()
}

/// How a pixel's brightness is turned into a cell state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Threshold {
    /// Alive iff brightness is above the given value.
    Fixed(f32),
    /// Alive iff brightness is below a fresh draw from the seeded generator.
    Seeded(u64),
}

impl Threshold {
    /// Seed used by the passcode path when no threshold is configured.
    pub const DEFAULT_SEED: u64 = 100;
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::Seeded(Self::DEFAULT_SEED)
    }
}

/// Per-pixel brightness in `[0, 1]`, stored in image order (`y * width + x`).
#[derive(Debug, Clone, PartialEq)]
pub struct BrightnessMap {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl BrightnessMap {
    /// Create a brightness map.
    ///
    /// # Errors
    /// - `InvalidDimensions` if width or height is zero or their product
    ///   overflows
    /// - `InvalidInput` if `values.len() != width * height`
    pub fn new(width: usize, height: usize, values: Vec<f32>) -> Result<Self> {
        let count = cell_count(width, height)?;
        if values.len() != count {
            return Err(Error::InvalidInput(format!(
                "Brightness map needs {} values, got {}",
                count,
                values.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Map width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Map height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Brightness at `(x, y)`, if in bounds.
    pub fn brightness(&self, x: usize, y: usize) -> Option<f32> {
        if x < self.width && y < self.height {
            self.values.get(y * self.width + x).copied()
        } else {
            None
        }
    }

    /// Reduce the map to a mask in grid construction order (x outer, y inner).
    pub fn to_mask(&self, threshold: Threshold) -> Vec<bool> {
        let positions = (0..self.width).flat_map(|x| (0..self.height).map(move |y| (x, y)));

        match threshold {
            Threshold::Fixed(limit) => positions
                .map(|(x, y)| self.values[y * self.width + x] > limit)
                .collect(),
            Threshold::Seeded(seed) => {
                let mut rng = seeded_rng(seed);
                positions
                    .map(|(x, y)| {
                        f64::from(self.values[y * self.width + x]) < rng.random::<f64>()
                    })
                    .collect()
            }
        }
    }
}

/// Renders a passcode into a brightness map.
///
/// Implementations are external collaborators (typically font rendering);
/// their output is not guaranteed to be identical across platforms, so
/// passcode-seeded keys should not be expected to interoperate.
pub trait PasscodeRasterizer {
    /// Rasterize `passcode` into a brightness map.
    fn rasterize(&self, passcode: &str) -> Result<BrightnessMap>;
}
