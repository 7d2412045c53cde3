use crate::power::Cell;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grid dimensions in cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: usize,
    pub height: usize,
}

impl Size {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

/// Integer cell coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid dimensions must be at least 1x1, got {width}x{height}")]
    ZeroDimension { width: usize, height: usize },

    #[error("position ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

/// Neighbour offsets: east, west, south, north
const NEIGHBOUR_OFFSETS: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Cell grid with toroidal topology (wraparound edges)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    size: Size,
    /// Row-major flat store, `width * height` entries
    cells: Vec<Cell>,
}

impl Grid {
    /// Build a grid, calling `init` exactly once per position in row-major
    /// order.
    pub fn new<F>(size: Size, mut init: F) -> Result<Self, GridError>
    where
        F: FnMut(Position) -> Cell,
    {
        Self::try_new(size, |pos| Ok::<_, GridError>(init(pos)))
    }

    /// Like [`Grid::new`], but `init` may fail. The first error stops
    /// construction and is returned as is.
    pub fn try_new<F, E>(size: Size, mut init: F) -> Result<Self, E>
    where
        F: FnMut(Position) -> Result<Cell, E>,
        E: From<GridError>,
    {
        if size.width == 0 || size.height == 0 {
            return Err(GridError::ZeroDimension {
                width: size.width,
                height: size.height,
            }
            .into());
        }

        let mut cells = Vec::with_capacity(size.area());
        for y in 0..size.height {
            for x in 0..size.width {
                cells.push(init(Position::new(x, y))?);
            }
        }

        Ok(Self { size, cells })
    }

    /// Grid where every cell is a copy of `cell`
    pub fn filled(size: Size, cell: Cell) -> Result<Self, GridError> {
        Self::new(size, |_| cell)
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Convert 2D coordinates to flat array index
    #[inline]
    fn index(&self, pos: Position) -> Result<usize, GridError> {
        if pos.x >= self.size.width || pos.y >= self.size.height {
            return Err(GridError::OutOfBounds {
                x: pos.x,
                y: pos.y,
                width: self.size.width,
                height: self.size.height,
            });
        }
        Ok(pos.y * self.size.width + pos.x)
    }

    /// Copy of the cell at `pos`. Positions are not wrapped.
    pub fn cell_at(&self, pos: Position) -> Result<Cell, GridError> {
        let idx = self.index(pos)?;
        Ok(self.cells[idx])
    }

    /// Replace the cell at `pos`. The power vector is stored as given.
    pub fn set_cell(&mut self, pos: Position, cell: Cell) -> Result<(), GridError> {
        let idx = self.index(pos)?;
        self.cells[idx] = cell;
        Ok(())
    }

    /// Wrap signed coordinates for toroidal topology
    fn wrap(&self, x: isize, y: isize) -> Position {
        let width = self.size.width as isize;
        let height = self.size.height as isize;
        Position::new(x.rem_euclid(width) as usize, y.rem_euclid(height) as usize)
    }

    /// East, west, south and north neighbours, each wrapped independently.
    ///
    /// On a grid one cell wide the east and west neighbours are `pos`
    /// itself (likewise north/south for a single row); duplicates are kept.
    pub fn neighbours(&self, pos: Position) -> [Position; 4] {
        let x = pos.x as isize;
        let y = pos.y as isize;
        NEIGHBOUR_OFFSETS.map(|(dx, dy)| self.wrap(x + dx, y + dy))
    }

    /// Uniformly random position inside the grid
    pub fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Position {
        Position::new(
            rng.gen_range(0..self.size.width),
            rng.gen_range(0..self.size.height),
        )
    }

    /// Row-major view of all cells
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Iterate over cells with their positions, row-major
    pub fn iter(&self) -> impl Iterator<Item = (Position, &Cell)> + '_ {
        let width = self.size.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(idx, cell)| (Position::new(idx % width, idx / width), cell))
    }
}
