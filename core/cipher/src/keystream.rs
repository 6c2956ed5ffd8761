//! Keystream generation from an evolving automaton grid.
//!
//! The grid is advanced by a fixed number of Fredkin steps per block. After
//! each block the whole grid is packed into bytes and emitted from the front
//! until the requested length is reached; the unused tail of the final block
//! is discarded.

use tracing::debug;
use zeroize::Zeroizing;

use cellcrypt_automaton::Grid;
use cellcrypt_common::{CipherParams, Error, Result};

use crate::progress::{CancelToken, Progress, ProgressObserver};

/// A finite, non-restartable keystream of a fixed length.
pub struct Keystream<'a> {
    grid: Grid,
    generations_per_block: usize,
    total: u64,
    written: u64,
    block: Zeroizing<Vec<u8>>,
    observer: Option<&'a mut dyn ProgressObserver>,
    cancel: Option<CancelToken>,
}

impl<'a> Keystream<'a> {
    /// Create a keystream over an already seeded grid.
    ///
    /// # Errors
    /// - `NotInitialized` if the grid has not been built
    /// - `InvalidInput` if `generations_per_block` is zero
    pub fn new(grid: Grid, generations_per_block: usize, length: u64) -> Result<Self> {
        if !grid.is_built() {
            return Err(Error::NotInitialized);
        }
        if generations_per_block == 0 {
            return Err(Error::InvalidInput(
                "Generations per block must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            grid,
            generations_per_block,
            total: length,
            written: 0,
            block: Zeroizing::new(Vec::new()),
            observer: None,
            cancel: None,
        })
    }

    /// Create a keystream over a grid seeded from `params`.
    pub fn from_params(params: &CipherParams, length: u64) -> Result<Self> {
        params.validate()?;
        let grid = Grid::seed_from_prng(params.width, params.height, params.seed)?;
        Self::new(grid, params.generations_per_block, length)
    }

    /// Report progress to `observer` after every block.
    pub fn with_observer(mut self, observer: &'a mut dyn ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Stop with `Cancelled` at the next block boundary once `token` is set.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Total bytes this keystream will emit.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Bytes emitted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Bytes still to emit.
    pub fn remaining(&self) -> u64 {
        self.total - self.written
    }

    /// Whether every requested byte has been emitted.
    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    /// Generation the underlying grid has reached.
    pub fn generation(&self) -> u64 {
        self.grid.generation()
    }

    /// Produce the next block of keystream bytes.
    ///
    /// Returns `Ok(None)` once the requested length has been emitted. A
    /// zero-length keystream returns `Ok(None)` immediately without stepping
    /// the grid.
    ///
    /// # Errors
    /// - `Cancelled` if the cancel token was set before this block
    pub fn next_block(&mut self) -> Result<Option<&[u8]>> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(None);
        }
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            debug!(written = self.written, remaining, "Keystream cancelled");
            return Err(Error::Cancelled);
        }

        self.grid.step_many(self.generations_per_block)?;

        self.block = Zeroizing::new(self.grid.key_bytes());
        let take = usize::try_from(remaining).map_or(self.block.len(), |r| r.min(self.block.len()));
        self.block.truncate(take);
        self.written += take as u64;

        let progress = Progress {
            total: self.total,
            written: self.written,
            remaining: self.remaining(),
        };
        debug!(
            written = progress.written,
            remaining = progress.remaining,
            generation = self.grid.generation(),
            "Keystream block emitted"
        );
        if let Some(observer) = self.observer.as_mut() {
            observer.on_progress(progress);
        }

        Ok(Some(self.block.as_slice()))
    }

    /// Drain the rest of the keystream into a vector.
    pub fn collect_bytes(mut self) -> Result<Vec<u8>> {
        let capacity = usize::try_from(self.remaining()).unwrap_or(0);
        let mut out = Vec::with_capacity(capacity);
        while let Some(block) = self.next_block()? {
            out.extend_from_slice(block);
        }
        Ok(out)
    }
}

/// Generate `length` keystream bytes for `params`.
pub fn keystream_bytes(params: &CipherParams, length: u64) -> Result<Vec<u8>> {
    Keystream::from_params(params, length)?.collect_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params(seed: u64) -> CipherParams {
        CipherParams::new(seed)
            .with_topology(8, 8)
            .with_generations_per_block(1)
    }

    #[test]
    fn test_exact_length() {
        for length in [0u64, 1, 7, 8, 9, 30] {
            let bytes = keystream_bytes(&small_params(42), length).unwrap();
            assert_eq!(bytes.len() as u64, length);
        }
    }

    #[test]
    fn test_deterministic() {
        let a = keystream_bytes(&small_params(42), 100).unwrap();
        let b = keystream_bytes(&small_params(42), 100).unwrap();
        let c = keystream_bytes(&small_params(43), 100).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_blocks_match_stepped_grid() {
        let params = small_params(11).with_generations_per_block(3);
        let bytes = keystream_bytes(&params, 20).unwrap();

        let mut grid = Grid::seed_from_prng(8, 8, 11).unwrap();
        let mut expected = Vec::new();
        for _ in 0..3 {
            grid.step_many(3).unwrap();
            expected.extend(grid.key_bytes());
        }
        expected.truncate(20);

        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_prefix_consistent_across_lengths() {
        let short = keystream_bytes(&small_params(5), 12).unwrap();
        let long = keystream_bytes(&small_params(5), 40).unwrap();
        assert_eq!(&long[..12], &short[..]);
    }

    #[test]
    fn test_zero_length_does_not_step() {
        let mut calls = 0;
        let mut observer = |_: Progress| calls += 1;
        let mut keystream = Keystream::from_params(&small_params(1), 0)
            .unwrap()
            .with_observer(&mut observer);

        assert!(keystream.next_block().unwrap().is_none());
        assert_eq!(keystream.generation(), 0);
        drop(keystream);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_progress_reports() {
        let mut reports = Vec::new();
        let mut observer = |p: Progress| reports.push(p);
        Keystream::from_params(&small_params(3), 20)
            .unwrap()
            .with_observer(&mut observer)
            .collect_bytes()
            .unwrap();

        let written: Vec<u64> = reports.iter().map(|p| p.written).collect();
        assert_eq!(written, vec![8, 16, 20]);
        for p in &reports {
            assert_eq!(p.total, 20);
            assert_eq!(p.written + p.remaining, p.total);
        }
        assert_eq!(reports.last().unwrap().percent_complete(), 100);
    }

    #[test]
    fn test_cancel_stops_at_block_boundary() {
        let token = CancelToken::new();
        let mut keystream = Keystream::from_params(&small_params(3), 64)
            .unwrap()
            .with_cancel_token(token.clone());

        assert_eq!(keystream.next_block().unwrap().unwrap().len(), 8);
        token.cancel();

        assert!(matches!(keystream.next_block(), Err(Error::Cancelled)));
        assert_eq!(keystream.written(), 8);
    }

    #[test]
    fn test_unbuilt_grid_rejected() {
        assert!(matches!(
            Keystream::new(Grid::default(), 1, 10),
            Err(Error::NotInitialized)
        ));
    }

    #[test]
    fn test_zero_generations_rejected() {
        let grid = Grid::build_uniform(4, 4).unwrap();
        assert!(matches!(
            Keystream::new(grid, 0, 10),
            Err(Error::InvalidInput(_))
        ));
    }
}
