//! Short-message codec.
//!
//! A message is XORed against the first bytes of a grid snapshot and
//! carried as base64 text. The message can be no longer than the key.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;
use zeroize::Zeroizing;

use cellcrypt_automaton::{Grid, PasscodeRasterizer, Threshold};
use cellcrypt_common::{Error, Result};

/// XOR `data` in place with the matching prefix of `key`.
fn xor_with_key(data: &mut [u8], key: &[u8]) -> Result<()> {
    if data.len() > key.len() {
        return Err(Error::InsufficientKey {
            needed: data.len(),
            available: key.len(),
        });
    }
    for (byte, k) in data.iter_mut().zip(key) {
        *byte ^= k;
    }
    Ok(())
}

/// Encode `message` against `key` and render it as base64.
///
/// # Errors
/// - `InsufficientKey` if the message's byte length exceeds `key.len()`
pub fn encode(message: &str, key: &[u8]) -> Result<String> {
    let mut bytes = Zeroizing::new(message.as_bytes().to_vec());
    xor_with_key(&mut bytes, key)?;
    Ok(STANDARD.encode(bytes.as_slice()))
}

/// Decode base64 text produced by [`encode`] with the same key.
///
/// Invalid UTF-8 after decoding is replaced rather than rejected, so a wrong
/// key yields garbage text instead of an error.
///
/// # Errors
/// - `Encoding` if `encoded` is not valid base64
/// - `InsufficientKey` if the decoded length exceeds `key.len()`
pub fn decode(encoded: &str, key: &[u8]) -> Result<String> {
    let mut bytes = Zeroizing::new(
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Encoding(format!("Invalid base64: {}", e)))?,
    );
    xor_with_key(&mut bytes, key)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Grid-backed session for encoding short messages.
///
/// The session seeds a grid (from a rasterized passcode or a PRNG seed),
/// runs a fixed number of Fredkin generations, and then uses the grid's
/// packed state as the key for [`encode`] and [`decode`].
#[derive(Debug)]
pub struct MessageSession {
    generations: u64,
    threshold: Threshold,
    grid: Option<Grid>,
}

impl MessageSession {
    /// Generations run before the grid is used as a key.
    pub const DEFAULT_GENERATIONS: u64 = 100;

    /// Create a session with default generations and threshold.
    pub fn new() -> Self {
        Self {
            generations: Self::DEFAULT_GENERATIONS,
            threshold: Threshold::default(),
            grid: None,
        }
    }

    /// Set the number of generations to run.
    pub fn with_generations(mut self, generations: u64) -> Self {
        self.generations = generations;
        self
    }

    /// Set how rasterized brightness is reduced to cell states.
    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    /// Configured generation count.
    pub fn generations(&self) -> u64 {
        self.generations
    }

    /// Seed the grid from a rasterized passcode and evolve it.
    ///
    /// Rasterizer output is platform dependent, so keys generated this way
    /// are not guaranteed to match across machines.
    pub fn generate<R>(&mut self, passcode: &str, rasterizer: &R) -> Result<()>
    where
        R: PasscodeRasterizer + ?Sized,
    {
        let map = rasterizer.rasterize(passcode)?;
        let grid = Grid::seed_from_brightness(&map, self.threshold)?;
        self.evolve(grid)
    }

    /// Seed the grid from the PRNG and evolve it.
    pub fn generate_from_seed(&mut self, width: usize, height: usize, seed: u64) -> Result<()> {
        let grid = Grid::seed_from_prng(width, height, seed)?;
        self.evolve(grid)
    }

    fn evolve(&mut self, mut grid: Grid) -> Result<()> {
        grid.run_until(self.generations)?;
        debug!(
            width = grid.width(),
            height = grid.height(),
            generation = grid.generation(),
            "Message grid generated"
        );
        self.grid = Some(grid);
        Ok(())
    }

    /// The generated grid, if any.
    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    /// Longest message in bytes the current grid can encode; 0 before
    /// generation.
    pub fn maximum_message_length(&self) -> usize {
        self.grid.as_ref().map_or(0, Grid::key_byte_capacity)
    }

    fn key(&self) -> Result<Zeroizing<Vec<u8>>> {
        let grid = self.grid.as_ref().ok_or(Error::NotInitialized)?;
        Ok(Zeroizing::new(grid.key_bytes()))
    }

    /// Encode a message with the session key.
    ///
    /// # Errors
    /// - `NotInitialized` before the grid has been generated
    /// - `InsufficientKey` if the message is longer than
    ///   [`maximum_message_length`](Self::maximum_message_length)
    pub fn encrypt(&self, message: &str) -> Result<String> {
        encode(message, &self.key()?)
    }

    /// Decode a message with the session key.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        decode(encoded, &self.key()?)
    }
}

impl Default for MessageSession {
    fn default() -> Self {
        Self::new()
    }
}
