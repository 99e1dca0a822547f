use serde::{Deserialize, Serialize};

use crate::world::tile::GridCell;

/// The square tile matrix, indexed `[x][y]`.
///
/// Cells are only ever replaced, never mutated through a shared reference,
/// so a cloned grid is a fully independent snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    cells: Vec<Vec<GridCell>>,
}

impl Grid {
    pub fn filled(side: usize, cell: GridCell) -> Self {
        Grid {
            cells: vec![vec![cell; side]; side],
        }
    }

    /// Build a grid from rows, returning `None` unless the rows form a square.
    pub fn from_rows(rows: Vec<Vec<GridCell>>) -> Option<Self> {
        let side = rows.len();
        if rows.iter().any(|row| row.len() != side) {
            return None;
        }
        Some(Grid { cells: rows })
    }

    /// Copy `source` into a fresh `new_side` grid, shifted by
    /// `floor((new_side - old_side) / 2)` on both axes. Cells that land
    /// outside the new grid are dropped; uncovered cells get `fill`.
    ///
    /// `source` may be ragged; only the cells each row actually holds are
    /// copied.
    pub fn centered_copy(source: &[Vec<GridCell>], new_side: usize, fill: GridCell) -> Grid {
        let mut grid = Grid::filled(new_side, fill);
        let old_side = source.len() as i64;
        let offset = (new_side as i64 - old_side).div_euclid(2);
        for (x, row) in source.iter().enumerate() {
            let nx = x as i64 + offset;
            if nx < 0 || nx >= new_side as i64 {
                continue;
            }
            for (y, cell) in row.iter().enumerate() {
                let ny = y as i64 + offset;
                if ny < 0 || ny >= new_side as i64 {
                    continue;
                }
                grid.cells[nx as usize][ny as usize] = *cell;
            }
        }
        grid
    }

    pub fn side(&self) -> usize {
        self.cells.len()
    }

    pub fn rows(&self) -> &[Vec<GridCell>] {
        &self.cells
    }

    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.side() && y < self.side()
    }

    pub fn get(&self, x: usize, y: usize) -> Option<GridCell> {
        self.cells.get(x).and_then(|row| row.get(y)).copied()
    }

    /// Signed lookup for neighborhood scans; anything off-grid is `None`.
    pub fn tile_id_at(&self, row: i64, col: i64) -> Option<u32> {
        if row < 0 || col < 0 {
            return None;
        }
        self.get(row as usize, col as usize).map(GridCell::tile_id)
    }

    /// Replace a cell, returning the previous value. Out-of-range is a no-op.
    pub fn set(&mut self, x: usize, y: usize, cell: GridCell) -> Option<GridCell> {
        let slot = self.cells.get_mut(x)?.get_mut(y)?;
        Some(std::mem::replace(slot, cell))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, GridCell)> + '_ {
        self.cells.iter().enumerate().flat_map(|(x, row)| {
            row.iter().enumerate().map(move |(y, cell)| (x, y, *cell))
        })
    }

    pub fn count_tile(&self, tile_id: u32) -> usize {
        self.iter().filter(|(_, _, c)| c.tile_id() == tile_id).count()
    }

    pub fn count_tiles_in(&self, tile_ids: &[u32]) -> usize {
        self.iter()
            .filter(|(_, _, c)| tile_ids.contains(&c.tile_id()))
            .count()
    }
}
