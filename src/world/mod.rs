pub mod alpha;
pub mod grid;
pub mod history;
pub mod layout;
pub mod tile;
pub mod viewport;

pub use grid::Grid;
pub use tile::{FillMode, GridCell, MapSize, TileCategory};
