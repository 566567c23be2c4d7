use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::{HEIGHT, Position, Sprite, WIDTH};

/// Failures while building a frame or writing to a grid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({x}, {y}) are out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("Expected a {width}x{height} grid, found {found} cells")]
    Dimensions {
        width: usize,
        height: usize,
        found: usize,
    },
    #[error("Unknown sprite code {code} at ({x}, {y})")]
    UnknownSprite { code: u8, x: usize, y: usize },
    #[error("Invalid grid token '{token}' at ({x}, {y})")]
    InvalidToken { token: String, x: usize, y: usize },
}

/// Fixed-size 2D grid, row-major, `(0, 0)` at the top left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

/// One sampled frame of the visible play area.
pub type SpriteGrid = Grid<Sprite>;

impl<T> Grid<T> {
    /// A `width` x `height` grid where every cell holds `T::default()`.
    ///
    /// # Panics
    ///
    /// Panics if the cell count overflows `usize`.
    pub fn new(width: usize, height: usize) -> Self
    where
        T: Default + Clone,
    {
        Self::from_generator(width, height, |_, _| T::default())
    }

    /// A grid whose cells are produced by `f(x, y)`, row by row.
    ///
    /// # Panics
    ///
    /// Panics if the cell count overflows `usize`.
    pub fn from_generator<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let len = width.checked_mul(height).expect("grid cell count overflows usize");
        let cells = (0..len).map(|i| f(i % width, i / width)).collect();
        Grid {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Flat offset of `(x, y)`, `None` outside the grid.
    #[inline]
    pub fn coords_to_index(&self, x: usize, y: usize) -> Option<usize> {
        self.is_valid(x, y).then(|| y * self.width + x)
    }

    #[inline]
    pub fn is_valid(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        self.coords_to_index(x, y).map(|i| &self.cells[i])
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) -> Result<(), GridError> {
        let index = self
            .coords_to_index(x, y)
            .ok_or_else(|| self.out_of_bounds(x, y))?;
        self.cells[index] = value;
        Ok(())
    }

    /// Cells of row `y`, left to right.
    pub fn row(&self, y: usize) -> Option<&[T]> {
        (y < self.height).then(|| &self.cells[y * self.width..(y + 1) * self.width])
    }

    /// Rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.cells.chunks(self.width.max(1))
    }

    /// Every cell with its `(x, y)`, in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = ((usize, usize), &T)> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| ((i % width, i / width), cell))
    }

    fn out_of_bounds(&self, x: usize, y: usize) -> GridError {
        GridError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        }
    }

    fn checked_index(&self, x: usize, y: usize) -> usize {
        match self.coords_to_index(x, y) {
            Some(index) => index,
            None => panic!("{}", self.out_of_bounds(x, y)),
        }
    }
}

impl Grid<Sprite> {
    /// Builds a frame from raw sprite codes laid out in row-major order.
    ///
    /// The buffer must hold exactly [`WIDTH`] x [`HEIGHT`] codes, and every code
    /// must name a known sprite.
    pub fn from_codes(codes: &[u8]) -> Result<Self, GridError> {
        if codes.len() != WIDTH * HEIGHT {
            return Err(GridError::Dimensions {
                width: WIDTH,
                height: HEIGHT,
                found: codes.len(),
            });
        }
        let mut cells = Vec::with_capacity(codes.len());
        for (index, code) in codes.iter().enumerate() {
            let sprite = Sprite::try_from(*code).map_err(|code| GridError::UnknownSprite {
                code,
                x: index % WIDTH,
                y: index / WIDTH,
            })?;
            cells.push(sprite);
        }
        Ok(Grid {
            width: WIDTH,
            height: HEIGHT,
            cells,
        })
    }

    /// Parses a frame printed as whitespace separated codes, one row per line.
    pub fn parse_codes(text: &str) -> Result<Self, GridError> {
        let mut codes = Vec::with_capacity(WIDTH * HEIGHT);
        for (y, line) in text.trim().lines().enumerate() {
            for (x, token) in line.split_whitespace().enumerate() {
                let code = token.parse::<u8>().map_err(|_| GridError::InvalidToken {
                    token: token.to_string(),
                    x,
                    y,
                })?;
                codes.push(code);
            }
        }
        Self::from_codes(&codes)
    }

    /// An empty frame of the standard size.
    pub fn empty() -> Self {
        Grid::new(WIDTH, HEIGHT)
    }

    /// Row index of the bottom row of the frame.
    #[inline]
    pub fn bottom_row(&self) -> usize {
        self.height.saturating_sub(1)
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    fn index(&self, (x, y): (usize, usize)) -> &T {
        &self.cells[self.checked_index(x, y)]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        let index = self.checked_index(x, y);
        &mut self.cells[index]
    }
}

impl<T> Index<Position> for Grid<T> {
    type Output = T;

    fn index(&self, at: Position) -> &T {
        &self[(at.x, at.y)]
    }
}

impl<T> IndexMut<Position> for Grid<T> {
    fn index_mut(&mut self, at: Position) -> &mut T {
        &mut self[(at.x, at.y)]
    }
}
