//! Two-dimensional binary cellular automaton.
//!
//! Cells live in a flat arena addressed by `x * height + y`. Each cell keeps
//! the arena indices of its Moore neighbors, computed once at construction.
//! Edges do not wrap: corner cells have 3 neighbors, edge cells 5, interior
//! cells 8.

use std::fmt;

use tracing::debug;

use cellcrypt_common::{cell_count, Error, Result};

use crate::bits;
use crate::seed::{prng_mask, BrightnessMap, Threshold};

/// Neighbor offsets, `dx` outer and `dy` inner.
const OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// A single cell of the grid.
#[derive(Debug)]
pub struct Cell {
    x: usize,
    y: usize,
    state: bool,
    next_state: bool,
    neighbors: Vec<usize>,
}

impl Cell {
    fn new(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            state: false,
            next_state: false,
            neighbors: Vec::with_capacity(OFFSETS.len()),
        }
    }

    /// Column of this cell.
    pub fn x(&self) -> usize {
        self.x
    }

    /// Row of this cell.
    pub fn y(&self) -> usize {
        self.y
    }

    /// Whether the cell is alive in the current generation.
    pub fn is_alive(&self) -> bool {
        self.state
    }

    /// Arena indices of this cell's neighbors.
    pub fn neighbors(&self) -> &[usize] {
        &self.neighbors
    }

    fn commit(&mut self) {
        self.state = self.next_state;
        self.next_state = false;
    }
}

/// A fixed-size automaton grid.
///
/// `Grid::default()` is an unbuilt grid with no cells; stepping it fails
/// with `NotInitialized`. Grids are deliberately not `Clone`: a keystream
/// owns its grid for its whole lifetime.
#[derive(Debug, Default)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    generation: u64,
}

impl Grid {
    /// Build a grid with every cell dead and neighbor adjacency wired.
    ///
    /// # Errors
    /// - `InvalidDimensions` if width or height is zero or the cell count
    ///   overflows
    pub fn build_uniform(width: usize, height: usize) -> Result<Self> {
        cell_count(width, height)?;

        let mut cells: Vec<Cell> = (0..width)
            .flat_map(|x| (0..height).map(move |y| Cell::new(x, y)))
            .collect();

        for cell in &mut cells {
            for (dx, dy) in OFFSETS {
                let nx = cell.x.checked_add_signed(dx).filter(|&nx| nx < width);
                let ny = cell.y.checked_add_signed(dy).filter(|&ny| ny < height);
                if let (Some(nx), Some(ny)) = (nx, ny) {
                    cell.neighbors.push(nx * height + ny);
                }
            }
        }

        debug!(width, height, "Grid built");

        Ok(Self {
            width,
            height,
            cells,
            generation: 0,
        })
    }

    /// Build a grid and set initial states from `mask`.
    ///
    /// The mask is read in construction order: `x` outer, `y` inner.
    ///
    /// # Errors
    /// - `InvalidDimensions` if width or height is zero
    /// - `InvalidInput` if `mask.len() != width * height`
    pub fn seed_from_boolean_mask(width: usize, height: usize, mask: &[bool]) -> Result<Self> {
        let mut grid = Self::build_uniform(width, height)?;
        if mask.len() != grid.cells.len() {
            return Err(Error::InvalidInput(format!(
                "Mask needs {} cells, got {}",
                grid.cells.len(),
                mask.len()
            )));
        }
        for (cell, &alive) in grid.cells.iter_mut().zip(mask) {
            cell.state = alive;
        }
        Ok(grid)
    }

    /// Build a grid whose cells are drawn from the seeded generator.
    ///
    /// One `f64` is drawn per cell in construction order; the cell is alive
    /// iff the draw exceeds 0.5.
    pub fn seed_from_prng(width: usize, height: usize, seed: u64) -> Result<Self> {
        let mask = prng_mask(cell_count(width, height)?, seed);
        Self::seed_from_boolean_mask(width, height, &mask)
    }

    /// Build a grid from a rasterized brightness map.
    pub fn seed_from_brightness(map: &BrightnessMap, threshold: Threshold) -> Result<Self> {
        let mask = map.to_mask(threshold);
        Self::seed_from_boolean_mask(map.width(), map.height(), &mask)
    }

    /// Grid width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of completed steps.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the grid has been built.
    pub fn is_built(&self) -> bool {
        !self.cells.is_empty()
    }

    /// Cell at `(x, y)`, if in bounds.
    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        if x < self.width && y < self.height {
            self.cells.get(x * self.height + y)
        } else {
            None
        }
    }

    /// All cells in construction order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Number of living neighbors of the cell at arena index `index`, if
    /// in bounds.
    pub fn living_neighbors(&self, index: usize) -> Option<usize> {
        self.cells.get(index).map(|cell| self.count_living(cell))
    }

    fn count_living(&self, cell: &Cell) -> usize {
        cell.neighbors.iter().filter(|&&n| self.cells[n].state).count()
    }

    /// Number of living cells.
    pub fn population(&self) -> usize {
        self.cells.iter().filter(|c| c.state).count()
    }

    /// Advance one generation under the Fredkin rule: a cell is alive next
    /// generation iff it has an odd number of living neighbors.
    ///
    /// # Errors
    /// - `NotInitialized` if the grid has not been built
    pub fn step(&mut self) -> Result<()> {
        self.apply_rule(|_, living| living % 2 == 1)
    }

    /// Advance one generation under Conway's rule (B3/S23).
    ///
    /// # Errors
    /// - `NotInitialized` if the grid has not been built
    pub fn step_conway(&mut self) -> Result<()> {
        self.apply_rule(|alive, living| matches!((alive, living), (true, 2) | (_, 3)))
    }

    /// Run `n` Fredkin steps.
    pub fn step_many(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    /// Run Fredkin steps until the generation counter reaches `generation`.
    ///
    /// Does nothing if the grid is already at or past that generation.
    pub fn run_until(&mut self, generation: u64) -> Result<()> {
        while self.generation < generation {
            self.step()?;
        }
        Ok(())
    }

    /// Compute every next state from the current generation, then commit
    /// them all at once.
    fn apply_rule<F>(&mut self, rule: F) -> Result<()>
    where
        F: Fn(bool, usize) -> bool,
    {
        if !self.is_built() {
            return Err(Error::NotInitialized);
        }

        for index in 0..self.cells.len() {
            let cell = &self.cells[index];
            let next = rule(cell.state, self.count_living(cell));
            self.cells[index].next_state = next;
        }

        for cell in &mut self.cells {
            cell.commit();
        }
        self.generation += 1;

        Ok(())
    }

    /// Current states in construction order.
    pub fn cell_states(&self) -> Vec<bool> {
        self.cells.iter().map(|c| c.state).collect()
    }

    /// Whole bytes extractable from one generation: `ceil(width * height / 8)`.
    pub fn key_byte_capacity(&self) -> usize {
        bits::byte_len(self.cells.len())
    }

    /// All cell states packed into `key_byte_capacity()` bytes.
    pub fn key_bytes(&self) -> Vec<u8> {
        bits::pack(&self.cell_states())
    }

    /// The first `count` bytes of key material.
    ///
    /// Only whole bytes of cells are used, so `count * 8` cells must exist.
    ///
    /// # Errors
    /// - `InsufficientBits` if the grid has fewer than `count * 8` cells
    pub fn key_bytes_prefix(&self, count: usize) -> Result<Vec<u8>> {
        bits::pack_truncated(&self.cell_states(), count * 8)
    }

    /// Text picture of the grid, one line per row.
    pub fn render(&self, alive: char, dead: char) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let cell = &self.cells[x * self.height + y];
                out.push(if cell.state { alive } else { dead });
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render('#', '.'))
    }
}
