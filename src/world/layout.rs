//! Built-in starting layouts, one per canvas multiplier.

use rand::Rng;

use crate::world::grid::Grid;
use crate::world::tile::GridCell;

const LAWN: u32 = 1;
const FARMLAND: u32 = 2;
const SHRUB: u32 = 4;
const GRASS_PATH: u32 = 5;
const STONE: u32 = 6;
const STONE_WORN: u32 = 7;
const LAKE: u32 = 8;
const POND: u32 = 9;
const DORMITORY: u32 = 10;
const STORE: u32 = 11;
const TEACHING: u32 = 12;
const ROAD: u32 = 13;

/// Base tile count every built-in layout is designed for.
pub const LAYOUT_BASE_TILES: usize = 7;

/// The built-in layout for `multiplier`, or `None` when there isn't one.
pub fn default_layout(multiplier: u32, rng: &mut impl Rng) -> Option<Grid> {
    match multiplier {
        1 => Some(layout_1x()),
        2 => Some(layout_2x()),
        4 => Some(layout_4x()),
        8 => Some(layout_8x(rng)),
        _ => None,
    }
}

struct Canvas {
    rows: Vec<Vec<u32>>,
}

impl Canvas {
    fn new(side: usize, fill: u32) -> Self {
        Canvas {
            rows: vec![vec![fill; side]; side],
        }
    }

    fn side(&self) -> usize {
        self.rows.len()
    }

    fn at(&self, x: usize, y: usize) -> u32 {
        self.rows[x][y]
    }

    fn put(&mut self, x: usize, y: usize, id: u32) {
        if x < self.side() && y < self.side() {
            self.rows[x][y] = id;
        }
    }

    /// Write `id` only where the cell still holds `filler`.
    fn put_over(&mut self, x: usize, y: usize, filler: u32, id: u32) {
        if x < self.side() && y < self.side() && self.rows[x][y] == filler {
            self.rows[x][y] = id;
        }
    }

    fn put_all(&mut self, cells: &[(usize, usize, u32)]) {
        for &(x, y, id) in cells {
            self.put(x, y, id);
        }
    }

    fn into_grid(self) -> Grid {
        let rows = self
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(|id| GridCell::new(id, 0)).collect())
            .collect();
        // Canvas is always square.
        Grid::from_rows(rows).unwrap_or_else(|| Grid::filled(0, GridCell::EMPTY))
    }
}

fn layout_1x() -> Grid {
    let rows: [[u32; 7]; 7] = [
        [1, 1, 1, 1, 1, 1, 1],
        [1, 4, 1, 1, 1, 4, 1],
        [1, 1, 10, 13, 12, 1, 1],
        [1, 1, 13, 11, 13, 1, 1],
        [1, 1, 12, 13, 10, 1, 1],
        [1, 4, 1, 1, 1, 4, 1],
        [1, 1, 1, 8, 1, 1, 1],
    ];
    let mut canvas = Canvas::new(7, LAWN);
    for (x, row) in rows.iter().enumerate() {
        for (y, id) in row.iter().enumerate() {
            canvas.put(x, y, *id);
        }
    }
    canvas.into_grid()
}

fn layout_2x() -> Grid {
    let size = 14;
    let mut c = Canvas::new(size, SHRUB);

    // campus block
    c.put_all(&[
        (5, 5, DORMITORY), (5, 6, ROAD), (5, 7, STORE), (5, 8, 15), (5, 9, TEACHING),
        (6, 5, ROAD), (6, 6, STONE), (6, 7, STONE), (6, 8, STONE_WORN), (6, 9, 16),
        (7, 5, TEACHING), (7, 6, STONE), (7, 7, STORE), (7, 8, STONE_WORN), (7, 9, DORMITORY),
        (8, 5, 17), (8, 6, STONE), (8, 7, STONE_WORN), (8, 8, STONE), (8, 9, ROAD),
        (9, 5, DORMITORY), (9, 6, 19), (9, 7, TEACHING), (9, 8, ROAD), (9, 9, STORE),
    ]);

    // water, lower left and upper right
    c.put_all(&[
        (10, 0, LAKE), (10, 1, POND), (10, 2, LAKE), (10, 3, POND),
        (11, 0, POND), (11, 1, LAKE), (11, 2, POND), (11, 3, LAKE),
        (12, 0, LAKE), (12, 1, POND), (12, 2, LAKE),
        (13, 0, POND), (13, 1, LAKE), (13, 2, POND),
        (0, 11, POND), (0, 12, LAKE), (0, 13, POND),
        (1, 10, LAKE), (1, 11, POND), (1, 12, LAKE), (1, 13, POND),
        (2, 11, LAKE), (2, 12, POND), (2, 13, LAKE),
        (3, 12, POND), (3, 13, LAKE),
    ]);

    for i in 0..size {
        let a = [13, 15, 17][i % 3];
        let b = [16, 18, 19][i % 3];
        c.put_over(6, i, SHRUB, a);
        c.put_over(8, i, SHRUB, b);
    }
    for i in 0..size {
        let a = [13, 20, 21][i % 3];
        let b = [22, 23, 14][i % 3];
        c.put_over(i, 6, SHRUB, a);
        c.put_over(i, 8, SHRUB, b);
    }

    // greenery
    c.put_all(&[
        (0, 0, SHRUB), (0, 6, GRASS_PATH), (1, 1, SHRUB), (1, 5, GRASS_PATH),
        (2, 2, SHRUB), (2, 4, GRASS_PATH), (3, 3, SHRUB), (3, 5, GRASS_PATH),
        (4, 4, SHRUB), (4, 6, GRASS_PATH),
        (10, 4, GRASS_PATH), (10, 5, SHRUB), (10, 10, SHRUB), (10, 11, GRASS_PATH),
        (11, 5, GRASS_PATH), (11, 6, SHRUB), (11, 11, SHRUB), (11, 12, GRASS_PATH),
        (12, 6, SHRUB), (12, 7, GRASS_PATH), (12, 12, SHRUB),
        (13, 7, GRASS_PATH), (13, 8, SHRUB), (13, 13, SHRUB),
    ]);

    // fields
    c.put_all(&[
        (0, 3, FARMLAND), (0, 4, FARMLAND), (1, 2, FARMLAND), (1, 3, FARMLAND),
        (2, 0, FARMLAND), (2, 1, FARMLAND),
        (11, 9, FARMLAND), (11, 10, FARMLAND), (12, 9, FARMLAND), (12, 10, FARMLAND),
        (13, 9, FARMLAND), (13, 10, FARMLAND),
    ]);

    // stone plazas
    c.put_all(&[
        (3, 6, STONE), (3, 7, STONE_WORN), (3, 8, STONE),
        (4, 6, STONE_WORN), (4, 7, STONE), (4, 8, STONE_WORN),
        (10, 6, STONE_WORN), (10, 7, STONE), (10, 8, STONE_WORN),
        (11, 7, STONE), (11, 8, STONE_WORN),
    ]);

    c.into_grid()
}

fn alternate(x: usize, y: usize, even: u32, odd: u32) -> u32 {
    if (x + y) % 2 == 0 { even } else { odd }
}

fn layout_4x() -> Grid {
    let size = 28;
    let mut c = Canvas::new(size, SHRUB);
    let s = 10;

    let rows: [(usize, [u32; 9]); 4] = [
        (s, [10, 13, 11, 13, 12, 13, 10, 13, 11]),
        (s + 3, [12, 6, 11, 7, 11, 6, 12, 7, 10]),
        (s + 4, [13, 7, 6, 11, 6, 7, 13, 6, 13]),
        (s + 5, [10, 13, 12, 13, 10, 13, 11, 13, 12]),
    ];
    for (x, ids) in rows {
        for (j, id) in ids.iter().enumerate() {
            c.put(x, s + j, *id);
        }
    }
    for i in (s + 1)..=(s + 2) {
        for j in (s + 1)..=(s + 6) {
            c.put(i, j, if i % 2 == 0 { STONE } else { STONE_WORN });
        }
    }

    for i in 20..size {
        for j in 0..8 {
            if i + j < size + 5 {
                c.put(i, j, alternate(i, j, LAKE, POND));
            }
        }
    }
    for i in 0..8 {
        for j in 20..size {
            if i + j < size + 5 {
                c.put(i, j, alternate(i, j, POND, LAKE));
            }
        }
    }

    let road_a = [13, 15, 17, 19];
    let road_b = [14, 16, 18, 20];
    let road_c = [21, 22, 23, 13];
    for i in 0..size {
        c.put_over(9, i, SHRUB, road_a[i % 4]);
        c.put_over(13, i, SHRUB, road_b[i % 4]);
        c.put_over(18, i, SHRUB, road_c[i % 4]);
    }
    for i in 0..size {
        c.put_over(i, 9, SHRUB, road_a[i % 4]);
        c.put_over(i, 13, SHRUB, road_b[i % 4]);
        c.put_over(i, 18, SHRUB, road_c[i % 4]);
    }

    let plazas = [
        (5..9, STONE, STONE_WORN),
        (19..23, STONE_WORN, STONE),
        (2..5, STONE, STONE_WORN),
        (23..26, STONE_WORN, STONE),
    ];
    for (range, even, odd) in plazas {
        for i in range.clone() {
            for j in range.clone() {
                c.put_over(i, j, SHRUB, alternate(i, j, even, odd));
            }
        }
    }

    for i in (0..size).step_by(3) {
        for j in (0..size).step_by(3) {
            if (i + j) % 6 == 0 {
                c.put_over(i, j, SHRUB, GRASS_PATH);
            }
        }
    }

    let fields = [(0..6, 0..6), (22..size, 22..size), (0..6, 22..size), (22..24, 0..4)];
    for (rows, cols) in fields {
        for i in rows {
            for j in cols.clone() {
                if (i + j) % 2 == 0 {
                    c.put_over(i, j, SHRUB, FARMLAND);
                }
            }
        }
    }

    c.into_grid()
}

fn layout_8x(rng: &mut impl Rng) -> Grid {
    let size = 56;
    let mut c = Canvas::new(size, LAWN);

    let groups = [(20, 20, 8), (5, 5, 6), (45, 5, 6), (5, 45, 6), (45, 45, 6)];
    for (index, (sx, sy, gs)) in groups.into_iter().enumerate() {
        for i in 0..gs {
            for j in 0..gs {
                let (x, y) = (sx + i, sy + j);
                if (i == 1 || i == gs - 2) && (j == 1 || j == gs - 2) {
                    let building = [DORMITORY, STORE, TEACHING][(i + j + index) % 3];
                    c.put(x, y, building);
                } else if i == 0 || i == gs - 1 || j == 0 || j == gs - 1 {
                    c.put(x, y, ROAD);
                } else if i == gs / 2 || j == gs / 2 {
                    c.put(x, y, alternate(x, y, STONE, STONE_WORN));
                }
            }
        }
    }

    let water = [(0, 0), (44, 0), (0, 44), (44, 44)];
    for (index, (sx, sy)) in water.into_iter().enumerate() {
        for i in 0..12 {
            for j in 0..12 {
                let (x, y) = (sx + i, sy + j);
                let id = if (x + y + index) % 2 == 0 { LAKE } else { POND };
                c.put_over(x, y, LAWN, id);
            }
        }
    }

    for row in (0..size).step_by(7) {
        for col in 0..size {
            c.put_over(row, col, LAWN, ROAD);
        }
    }
    for col in (0..size).step_by(7) {
        for row in 0..size {
            c.put_over(row, col, LAWN, ROAD);
        }
    }

    let plazas = [(14, 14, 4), (38, 14, 4), (14, 38, 4), (38, 38, 4), (26, 26, 6)];
    for (px, py, ps) in plazas {
        for i in 0..ps {
            for j in 0..ps {
                let (x, y) = (px + i, py + j);
                c.put_over(x, y, LAWN, alternate(x, y, STONE, STONE_WORN));
            }
        }
    }

    for i in (0..size).step_by(4) {
        for j in (0..size).step_by(4) {
            if c.at(i, j) == LAWN && rng.r#gen::<f64>() > 0.3 {
                c.put(i, j, SHRUB);
            }
        }
    }

    c.into_grid()
}
