use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::catalog::{TileCatalog, TileValue};
use crate::simulation::ledger::ResourceLedger;
use crate::world::alpha::{self, AlphaSource};
use crate::world::grid::Grid;
use crate::world::history::HistoryLedger;
use crate::world::layout::{self, LAYOUT_BASE_TILES};
use crate::world::tile::{FillMode, GridCell, MapSize};
use crate::world::viewport::{Viewport, ViewportConfig};

/// Lawn, used for fresh grids and for padding after a resize or import.
pub const BASE_CELL: GridCell = GridCell(1, 0);

pub const VALID_MULTIPLIERS: [u32; 4] = [1, 2, 4, 8];

pub const EXPORT_VERSION: &str = "1.0";

/// Coerce anything outside {1, 2, 4, 8} to 1.
pub fn normalize_multiplier(multiplier: u32) -> u32 {
    if VALID_MULTIPLIERS.contains(&multiplier) {
        multiplier
    } else {
        warn!(multiplier, "Invalid canvas size multiplier, using 1");
        1
    }
}

// === Errors ===

#[derive(Debug)]
pub enum MapError {
    Parse(String),
    MissingGrid,
    Serialize(String),
    LayoutUnavailable { multiplier: u32 },
    LayoutSizeMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::Parse(e) => write!(f, "Malformed map data: {}", e),
            MapError::MissingGrid => write!(f, "Map data has no isoMap"),
            MapError::Serialize(e) => write!(f, "Cannot serialize map: {}", e),
            MapError::LayoutUnavailable { multiplier } => {
                write!(f, "No default layout for a {}x canvas", multiplier)
            }
            MapError::LayoutSizeMismatch { expected, actual } => write!(
                f,
                "Default layout is {} tiles wide but the grid is {}",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for MapError {}

// === Serialized forms ===

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapExport<'a> {
    pub iso_map: &'a Grid,
    pub map_size: MapSize,
    pub canvas_size_multiplier: u32,
    pub version: &'static str,
    pub export_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapImport {
    iso_map: Option<Vec<Vec<GridCell>>>,
    #[serde(default)]
    map_size: Option<MapSize>,
    #[serde(default)]
    canvas_size_multiplier: Option<serde_json::Value>,
}

/// Persisted grid state, stored under the `map_state` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapState {
    #[serde(default)]
    pub selected_tile_id: Option<u32>,
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default = "default_pan_x")]
    pub pan_x: f64,
    #[serde(default = "default_pan_y")]
    pub pan_y: f64,
    #[serde(default)]
    pub map_size: MapSize,
    #[serde(default = "default_multiplier")]
    pub canvas_size_multiplier: u32,
    #[serde(default)]
    pub fill_mode: FillMode,
    #[serde(default)]
    pub iso_map: Vec<Vec<GridCell>>,
}

fn default_zoom() -> f64 {
    1.0
}
fn default_pan_x() -> f64 {
    Viewport::default().pan_x
}
fn default_pan_y() -> f64 {
    Viewport::default().pan_y
}
fn default_multiplier() -> u32 {
    1
}

// === Engine ===

/// Owns the grid and keeps the ledger's biodiversity/culture in step with it.
///
/// Every mutation takes the ledger explicitly; nothing else may write cells.
#[derive(Debug, Clone)]
pub struct MapEngine {
    catalog: TileCatalog,
    grid: Grid,
    base_tile_count: usize,
    multiplier: u32,
    history: HistoryLedger,
    viewport: Viewport,
    viewport_config: ViewportConfig,
    map_size: MapSize,
    selected_tile_id: Option<u32>,
    fill_mode: FillMode,
}

impl MapEngine {
    pub fn new(catalog: TileCatalog, base_tile_count: usize, history_cap: usize) -> Self {
        let base_tile_count = base_tile_count.max(1);
        let grid = Grid::filled(base_tile_count, BASE_CELL);
        let mut history = HistoryLedger::new(history_cap);
        history.reset(&grid);
        let viewport_config = ViewportConfig::default();
        let mut viewport = Viewport::default();
        viewport.zoom = viewport_config.fit_zoom(base_tile_count, 1);
        MapEngine {
            catalog,
            grid,
            base_tile_count,
            multiplier: 1,
            history,
            viewport,
            viewport_config,
            map_size: MapSize::default(),
            selected_tile_id: None,
            fill_mode: FillMode::Single,
        }
    }

    pub fn catalog(&self) -> &TileCatalog {
        &self.catalog
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn base_tile_count(&self) -> usize {
        self.base_tile_count
    }

    /// Side length implied by the current multiplier.
    pub fn expected_side(&self) -> usize {
        self.base_tile_count * self.multiplier as usize
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<GridCell> {
        self.grid.get(x, y)
    }

    pub fn map_size(&self) -> MapSize {
        self.map_size
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn selected_tile_id(&self) -> Option<u32> {
        self.selected_tile_id
    }

    pub fn select_tile(&mut self, tile_id: Option<u32>) {
        self.selected_tile_id = tile_id;
    }

    pub fn fill_mode(&self) -> FillMode {
        self.fill_mode
    }

    pub fn set_fill_mode(&mut self, mode: FillMode) {
        self.fill_mode = mode;
    }

    pub fn count_tiles(&self, tile_id: u32) -> usize {
        self.grid.count_tile(tile_id)
    }

    // --- ledger bookkeeping ---

    fn apply_value(ledger: &mut ResourceLedger, value: TileValue, sign: i64) {
        if value.biodiversity != 0 {
            ledger.update_biodiversity(sign * value.biodiversity);
        }
        if value.culture != 0 {
            ledger.update_culture(sign * value.culture);
        }
    }

    /// Replace one cell and move its value contribution. No price, no history.
    fn swap_cell(
        &mut self,
        x: usize,
        y: usize,
        cell: GridCell,
        ledger: &mut ResourceLedger,
    ) -> Option<GridCell> {
        let old = self.grid.set(x, y, cell)?;
        if !old.is_empty() {
            Self::apply_value(ledger, self.catalog.value_of(old.tile_id()), -1);
        }
        if !cell.is_empty() {
            Self::apply_value(ledger, self.catalog.value_of(cell.tile_id()), 1);
        }
        Some(old)
    }

    /// Like `swap_cell`, but also moves the tile's separate effects block.
    fn swap_cell_with_effects(
        &mut self,
        x: usize,
        y: usize,
        cell: GridCell,
        ledger: &mut ResourceLedger,
    ) -> Option<GridCell> {
        let old = self.swap_cell(x, y, cell, ledger)?;
        if !old.is_empty() {
            ledger.apply(self.catalog.effects_of(old.tile_id()).negated());
        }
        if !cell.is_empty() {
            ledger.apply(self.catalog.effects_of(cell.tile_id()));
        }
        Some(old)
    }

    // --- placement ---

    /// Direct single-cell placement. Deducts the new tile's price without a
    /// funds check; out-of-range coordinates are ignored.
    pub fn place_tile(
        &mut self,
        x: usize,
        y: usize,
        tile_id: u32,
        variant: i32,
        ledger: &mut ResourceLedger,
    ) -> bool {
        let cell = GridCell::new(tile_id, variant);
        if self.swap_cell(x, y, cell, ledger).is_none() {
            return false;
        }
        if tile_id > 0
            && let Some(def) = self.catalog.get(tile_id)
        {
            ledger.update_carbon(-def.price);
        }
        self.history.add(&self.grid);
        debug!(x, y, tile_id, variant, "Placed tile");
        true
    }

    /// Place `tile_id` on every listed cell, recording one history entry.
    /// Returns how many cells were in range.
    pub fn batch_place_tiles(
        &mut self,
        cells: &[(usize, usize)],
        tile_id: u32,
        variant: i32,
        ledger: &mut ResourceLedger,
    ) -> usize {
        let cell = GridCell::new(tile_id, variant);
        let changed = cells
            .iter()
            .filter(|&&(x, y)| self.swap_cell_with_effects(x, y, cell, ledger).is_some())
            .count();
        if changed > 0 {
            self.history.add(&self.grid);
        }
        debug!(tile_id, changed, "Batch placed tiles");
        changed
    }

    pub fn batch_clear_tiles(&mut self, cells: &[(usize, usize)], ledger: &mut ResourceLedger) -> usize {
        let changed = cells
            .iter()
            .filter(|&&(x, y)| {
                self.swap_cell_with_effects(x, y, GridCell::EMPTY, ledger)
                    .is_some()
            })
            .count();
        if changed > 0 {
            self.history.add(&self.grid);
        }
        debug!(changed, "Batch cleared tiles");
        changed
    }

    pub fn fill_row(&mut self, row: usize, tile_id: u32, variant: i32, ledger: &mut ResourceLedger) -> usize {
        if row >= self.grid.side() {
            return 0;
        }
        let cells: Vec<_> = (0..self.grid.side()).map(|y| (row, y)).collect();
        self.batch_place_tiles(&cells, tile_id, variant, ledger)
    }

    pub fn fill_column(&mut self, col: usize, tile_id: u32, variant: i32, ledger: &mut ResourceLedger) -> usize {
        if col >= self.grid.side() {
            return 0;
        }
        let cells: Vec<_> = (0..self.grid.side()).map(|x| (x, col)).collect();
        self.batch_place_tiles(&cells, tile_id, variant, ledger)
    }

    /// Place according to the current fill mode: the cell, its row or its column.
    pub fn fill(&mut self, x: usize, y: usize, tile_id: u32, variant: i32, ledger: &mut ResourceLedger) -> bool {
        match self.fill_mode {
            FillMode::Single => self.place_tile(x, y, tile_id, variant, ledger),
            FillMode::Row => self.fill_row(x, tile_id, variant, ledger) > 0,
            FillMode::Column => self.fill_column(y, tile_id, variant, ledger) > 0,
        }
    }

    /// Resync biodiversity and culture from the grid. Carbon is untouched.
    pub fn recalculate_effects(&self, ledger: &mut ResourceLedger) {
        ledger.reset_stats();
        for (_, _, cell) in self.grid.iter() {
            if !cell.is_empty() {
                Self::apply_value(ledger, self.catalog.value_of(cell.tile_id()), 1);
            }
        }
    }

    // --- growth and harvest ---

    /// Turn a grown tile into its growth target if the cell still holds
    /// `source_id`. Not recorded in history.
    pub fn grow_cell(&mut self, x: usize, y: usize, source_id: u32, ledger: &mut ResourceLedger) -> bool {
        let Some(cell) = self.grid.get(x, y) else {
            return false;
        };
        if cell.tile_id() != source_id {
            return false;
        }
        let Some(target) = self
            .catalog
            .get(source_id)
            .and_then(|d| d.growth.as_ref())
            .map(|g| g.target_id)
        else {
            return false;
        };
        self.swap_cell(x, y, GridCell::new(target, cell.variant()), ledger);
        debug!(x, y, from = source_id, to = target, "Tile grew");
        true
    }

    /// Harvest a ripe tile: swap it for its harvest target and credit the
    /// reward to carbon. Returns the reward.
    pub fn harvest(&mut self, x: usize, y: usize, ledger: &mut ResourceLedger) -> Option<i64> {
        let cell = self.grid.get(x, y)?;
        let spec = self.catalog.get(cell.tile_id())?.harvest?;
        self.swap_cell(x, y, GridCell::new(spec.target_id, cell.variant()), ledger);
        ledger.update_carbon(spec.reward);
        self.history.add(&self.grid);
        info!(x, y, reward = spec.reward, "Harvested tile");
        Some(spec.reward)
    }

    // --- history ---

    pub fn undo(&mut self, ledger: &mut ResourceLedger) -> bool {
        match self.history.undo() {
            Some(grid) => {
                self.grid = grid;
                self.recalculate_effects(ledger);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self, ledger: &mut ResourceLedger) -> bool {
        match self.history.redo() {
            Some(grid) => {
                self.grid = grid;
                self.recalculate_effects(ledger);
                true
            }
            None => false,
        }
    }

    // --- structural changes ---

    /// Switch canvas size, re-centring the current content. Returns whether
    /// the multiplier actually changed.
    pub fn set_canvas_size_multiplier(&mut self, multiplier: u32, ledger: &mut ResourceLedger) -> bool {
        let multiplier = normalize_multiplier(multiplier);
        if multiplier == self.multiplier {
            return false;
        }
        let old_side = self.grid.side();
        self.multiplier = multiplier;
        let new_side = self.expected_side();
        self.grid = Grid::centered_copy(self.grid.rows(), new_side, BASE_CELL);
        self.history.reset(&self.grid);
        self.viewport.reset(&self.viewport_config, new_side, multiplier);
        self.recalculate_effects(ledger);
        info!(multiplier, old_side, new_side, "Canvas resized");
        true
    }

    pub fn import_default_layout(&mut self, rng: &mut impl Rng, ledger: &mut ResourceLedger) -> Result<(), MapError> {
        let layout = layout::default_layout(self.multiplier, rng).ok_or(MapError::LayoutUnavailable {
            multiplier: self.multiplier,
        })?;
        if layout.side() != self.expected_side() {
            return Err(MapError::LayoutSizeMismatch {
                expected: self.expected_side(),
                actual: LAYOUT_BASE_TILES * self.multiplier as usize,
            });
        }
        self.grid = layout;
        self.history.reset(&self.grid);
        self.recalculate_effects(ledger);
        info!(multiplier = self.multiplier, "Imported default layout");
        Ok(())
    }

    pub fn export_map(&self) -> Result<String, MapError> {
        let export = MapExport {
            iso_map: &self.grid,
            map_size: self.map_size,
            canvas_size_multiplier: self.multiplier,
            version: EXPORT_VERSION,
            export_time: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        serde_json::to_string_pretty(&export).map_err(|e| MapError::Serialize(e.to_string()))
    }

    /// Replace the grid from an export string. Nothing changes on failure.
    pub fn import_map(&mut self, data: &str, ledger: &mut ResourceLedger) -> Result<(), MapError> {
        let parsed: MapImport = serde_json::from_str(data).map_err(|e| {
            warn!(error = %e, "Rejected map import");
            MapError::Parse(e.to_string())
        })?;
        let rows = parsed.iso_map.ok_or_else(|| {
            warn!("Rejected map import without isoMap");
            MapError::MissingGrid
        })?;

        let imported_multiplier = parsed
            .canvas_size_multiplier
            .and_then(|v| v.as_u64())
            .and_then(|m| u32::try_from(m).ok())
            .filter(|m| VALID_MULTIPLIERS.contains(m));
        let resized = imported_multiplier.is_some_and(|m| m != self.multiplier);
        if let Some(m) = imported_multiplier {
            self.multiplier = m;
        }

        let imported_side = rows.len();
        self.grid = Grid::centered_copy(&rows, self.expected_side(), BASE_CELL);
        if let Some(size) = parsed.map_size {
            self.map_size = size;
        }

        if resized {
            self.history.reset(&self.grid);
            self.viewport
                .reset(&self.viewport_config, self.grid.side(), self.multiplier);
        } else {
            self.history.add(&self.grid);
        }
        self.recalculate_effects(ledger);
        info!(imported_side, side = self.grid.side(), multiplier = self.multiplier, "Imported map");
        Ok(())
    }

    // --- viewport ---

    pub fn min_zoom(&self) -> f64 {
        self.viewport_config.min_zoom(self.grid.side(), self.multiplier)
    }

    pub fn max_zoom(&self) -> f64 {
        self.viewport_config.max_zoom(self.multiplier)
    }

    pub fn compute_fit_zoom(&self) -> f64 {
        self.viewport_config.fit_zoom(self.grid.side(), self.multiplier)
    }

    pub fn zoom_in(&mut self) -> bool {
        self.viewport.zoom_in(&self.viewport_config, self.multiplier)
    }

    pub fn zoom_out(&mut self) -> bool {
        let side = self.grid.side();
        self.viewport.zoom_out(&self.viewport_config, side, self.multiplier)
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.viewport.pan_by(dx, dy);
    }

    pub fn reset_view(&mut self) {
        let side = self.grid.side();
        self.viewport.reset(&self.viewport_config, side, self.multiplier);
        self.selected_tile_id = None;
    }

    /// Pixel hit test against the texture of the tile at `(x, y)`.
    #[allow(clippy::too_many_arguments)]
    pub fn is_opaque_at(
        &self,
        source: &impl AlphaSource,
        x: usize,
        y: usize,
        local_x: f64,
        local_y: f64,
        cell_w: f64,
        cell_h: f64,
        flipped: bool,
    ) -> bool {
        match self.grid.get(x, y) {
            Some(cell) if !cell.is_empty() => alpha::is_opaque_at(
                source,
                cell.tile_id(),
                local_x,
                local_y,
                cell_w,
                cell_h,
                flipped,
            ),
            _ => false,
        }
    }

    // --- persistence ---

    pub fn to_state(&self) -> MapState {
        MapState {
            selected_tile_id: self.selected_tile_id,
            zoom: self.viewport.zoom,
            pan_x: self.viewport.pan_x,
            pan_y: self.viewport.pan_y,
            map_size: self.map_size,
            canvas_size_multiplier: self.multiplier,
            fill_mode: self.fill_mode,
            iso_map: self.grid.rows().to_vec(),
        }
    }

    /// Restore saved state. A grid that is not square at the expected side
    /// is replaced by a fresh base grid. History restarts from the result.
    pub fn restore_state(&mut self, state: MapState, ledger: &mut ResourceLedger) {
        self.multiplier = normalize_multiplier(state.canvas_size_multiplier);
        self.selected_tile_id = state.selected_tile_id;
        self.viewport = Viewport {
            zoom: state.zoom,
            pan_x: state.pan_x,
            pan_y: state.pan_y,
        };
        self.map_size = state.map_size;
        self.fill_mode = state.fill_mode;

        let expected = self.expected_side();
        self.grid = match Grid::from_rows(state.iso_map) {
            Some(grid) if grid.side() == expected => grid,
            _ => {
                warn!(expected, "Saved grid does not match canvas size, reinitializing");
                Grid::filled(expected, BASE_CELL)
            }
        };
        self.history.reset(&self.grid);
        self.recalculate_effects(ledger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::catalog::TileTypeDef;
    use crate::simulation::ledger::Effects;
    use crate::world::alpha::AlphaMask;
    use crate::world::tile::TileCategory;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    fn engine() -> (MapEngine, ResourceLedger) {
        let map = MapEngine::new(TileCatalog::builtin(), 7, 50);
        let mut ledger = ResourceLedger::new();
        map.recalculate_effects(&mut ledger);
        (map, ledger)
    }

    fn def(id: u32, price: i64, bio: i64) -> TileTypeDef {
        TileTypeDef {
            id,
            name: format!("tile {}", id),
            image: String::new(),
            category: TileCategory::Plant,
            price,
            value: TileValue::new(bio, 0),
            effects: None,
            growth: None,
            harvest: None,
            is_final: false,
            hover_hint: None,
            description: String::new(),
        }
    }

    #[test]
    fn new_grid_is_lawn() {
        let (map, ledger) = engine();
        assert_eq!(map.grid().side(), 7);
        assert_eq!(map.count_tiles(1), 49);
        assert_eq!(ledger.biodiversity(), 490);
        assert_eq!(ledger.culture(), 245);
        assert_eq!(ledger.carbon(), 1000);
    }

    #[test]
    fn place_then_read_returns_cell() {
        let (mut map, mut ledger) = engine();
        assert!(map.place_tile(2, 3, 12, 4, &mut ledger));
        assert_eq!(map.cell(2, 3), Some(GridCell::new(12, 4)));
    }

    #[test]
    fn place_out_of_bounds_is_noop() {
        let (mut map, mut ledger) = engine();
        let before = ledger.clone();
        assert!(!map.place_tile(7, 0, 12, 0, &mut ledger));
        assert_eq!(ledger, before);
        assert_eq!(map.history().len(), 1);
    }

    #[test]
    fn replacing_reverses_value_but_not_price() {
        let catalog = TileCatalog::from_defs(vec![def(1, 100, 10), def(2, 50, 5)]).unwrap();
        let mut map = MapEngine::new(catalog, 3, 50);
        let mut ledger = ResourceLedger::new();
        map.batch_clear_tiles(&[(0, 0)], &mut ledger);
        map.recalculate_effects(&mut ledger);
        let bio_base = ledger.biodiversity();

        map.place_tile(0, 0, 1, 0, &mut ledger);
        assert_eq!(ledger.carbon(), 900);
        assert_eq!(ledger.biodiversity(), bio_base + 10);

        map.place_tile(0, 0, 2, 0, &mut ledger);
        assert_eq!(ledger.carbon(), 850);
        assert_eq!(ledger.biodiversity(), bio_base + 5);
    }

    #[test]
    fn recalculation_is_order_invariant() {
        let (mut a, mut la) = engine();
        let (mut b, mut lb) = engine();
        let moves = [(0, 0, 8), (1, 1, 10), (2, 2, 5), (0, 0, 12), (3, 4, 2)];
        for &(x, y, id) in &moves {
            a.place_tile(x, y, id, 0, &mut la);
        }
        for &(x, y, id) in moves.iter().rev() {
            if (x, y) != (0, 0) {
                b.place_tile(x, y, id, 0, &mut lb);
            }
        }
        b.place_tile(0, 0, 12, 0, &mut lb);
        a.recalculate_effects(&mut la);
        b.recalculate_effects(&mut lb);
        assert_eq!(a.grid(), b.grid());
        assert_eq!(la.biodiversity(), lb.biodiversity());
        assert_eq!(la.culture(), lb.culture());

        let expected_bio: i64 = a
            .grid()
            .iter()
            .map(|(_, _, c)| a.catalog().value_of(c.tile_id()).biodiversity)
            .sum();
        assert_eq!(la.biodiversity(), expected_bio);
    }

    #[test]
    fn undo_restores_prior_and_redo_restores_post() {
        let (mut map, mut ledger) = engine();
        let before = map.grid().clone();
        map.place_tile(1, 1, 8, 0, &mut ledger);
        let after = map.grid().clone();

        assert!(map.undo(&mut ledger));
        assert_eq!(map.grid(), &before);
        assert_eq!(ledger.biodiversity(), 490);
        assert!(map.redo(&mut ledger));
        assert_eq!(map.grid(), &after);
        assert!(!map.redo(&mut ledger));
    }

    #[test]
    fn history_keeps_only_cap_entries() {
        let cap = 10;
        let mut map = MapEngine::new(TileCatalog::builtin(), 7, cap);
        let mut ledger = ResourceLedger::new();
        for i in 0..(cap + 5) {
            map.place_tile(i % 7, i / 7, 4, 0, &mut ledger);
        }
        let mut undos = 0;
        while map.undo(&mut ledger) {
            undos += 1;
        }
        assert_eq!(undos, cap - 1);
        assert_eq!(map.history().len(), cap);
    }

    #[test]
    fn batch_place_applies_effects_block_once_per_cell() {
        let mut plaza = def(5, 40, 2);
        plaza.effects = Some(Effects::new(-5, 0, 8));
        let catalog = TileCatalog::from_defs(vec![def(1, 10, 1), plaza]).unwrap();
        let mut map = MapEngine::new(catalog, 3, 50);
        let mut ledger = ResourceLedger::new();
        map.recalculate_effects(&mut ledger);

        let changed = map.batch_place_tiles(&[(0, 0), (0, 1), (9, 9)], 5, 0, &mut ledger);
        assert_eq!(changed, 2);
        // no price on batch placement, effects carbon applied twice
        assert_eq!(ledger.carbon(), 990);
        assert_eq!(ledger.culture(), 16);
        assert_eq!(ledger.biodiversity(), 9 - 2 + 4);
        assert_eq!(map.history().len(), 2);

        map.batch_clear_tiles(&[(0, 0)], &mut ledger);
        assert_eq!(map.cell(0, 0), Some(GridCell::EMPTY));
        assert_eq!(ledger.carbon(), 995);
        assert_eq!(ledger.culture(), 8);
    }

    #[test]
    fn fill_modes_dispatch() {
        let (mut map, mut ledger) = engine();
        map.set_fill_mode(FillMode::Row);
        assert!(map.fill(2, 5, 13, 0, &mut ledger));
        assert_eq!(map.count_tiles(13), 7);
        assert!((0..7).all(|y| map.cell(2, y).map(GridCell::tile_id) == Some(13)));

        map.set_fill_mode(FillMode::Column);
        assert!(map.fill(0, 4, 6, 0, &mut ledger));
        assert!((0..7).all(|x| map.cell(x, 4).map(GridCell::tile_id) == Some(6)));
        assert!(!map.fill(0, 9, 6, 0, &mut ledger));
    }

    #[test]
    fn resize_round_trip_preserves_content() {
        let mut map = MapEngine::new(TileCatalog::builtin(), 8, 50);
        let mut ledger = ResourceLedger::new();
        map.place_tile(0, 0, 10, 0, &mut ledger);
        map.place_tile(7, 7, 8, 0, &mut ledger);
        map.place_tile(3, 5, 4, 0, &mut ledger);
        let original = map.grid().clone();

        assert!(map.set_canvas_size_multiplier(2, &mut ledger));
        assert_eq!(map.grid().side(), 16);
        assert_eq!(map.cell(4, 4), Some(GridCell::new(10, 0)));
        assert_eq!(map.history().len(), 1);

        assert!(map.set_canvas_size_multiplier(1, &mut ledger));
        assert_eq!(map.grid(), &original);
        assert_eq!(ledger.biodiversity(), {
            let mut fresh = ResourceLedger::new();
            map.recalculate_effects(&mut fresh);
            fresh.biodiversity()
        });
    }

    #[test]
    fn invalid_multiplier_coerced_to_one() {
        let (mut map, mut ledger) = engine();
        assert!(map.set_canvas_size_multiplier(4, &mut ledger));
        assert!(map.set_canvas_size_multiplier(3, &mut ledger));
        assert_eq!(map.multiplier(), 1);
        assert_eq!(map.grid().side(), 7);
        assert!(!map.set_canvas_size_multiplier(1, &mut ledger));
    }

    #[test]
    fn export_then_import_restores_grid() {
        let (mut map, mut ledger) = engine();
        map.place_tile(4, 4, 11, 2, &mut ledger);
        let json = map.export_map().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["canvasSizeMultiplier"], 1);
        assert_eq!(value["isoMap"][4][4], serde_json::json!([11, 2]));
        assert!(value["exportTime"].as_str().unwrap().contains('T'));

        let (mut other, mut other_ledger) = engine();
        other.import_map(&json, &mut other_ledger).unwrap();
        assert_eq!(other.grid(), map.grid());
        assert_eq!(other_ledger.biodiversity(), ledger.biodiversity());
        assert!(other.undo(&mut other_ledger));
    }

    #[test]
    fn import_rejects_bad_payloads_without_mutation() {
        let (mut map, mut ledger) = engine();
        map.place_tile(1, 1, 9, 0, &mut ledger);
        let before = map.grid().clone();
        let ledger_before = ledger.clone();

        assert!(matches!(map.import_map("{not json", &mut ledger), Err(MapError::Parse(_))));
        assert!(matches!(
            map.import_map(r#"{"mapSize":{"width":1,"height":1}}"#, &mut ledger),
            Err(MapError::MissingGrid)
        ));
        assert!(map.import_map(r#"{"isoMap":[[[1]]]}"#, &mut ledger).is_err());
        assert_eq!(map.grid(), &before);
        assert_eq!(ledger, ledger_before);
    }

    #[test]
    fn import_recenters_mismatched_size() {
        let (mut map, mut ledger) = engine();
        let small = r#"{"isoMap":[[[8,0],[8,0],[8,0]],[[8,0],[9,0],[8,0]],[[8,0],[8,0],[8,0]]]}"#;
        map.import_map(small, &mut ledger).unwrap();
        assert_eq!(map.grid().side(), 7);
        // offset = floor((7 - 3) / 2) = 2
        assert_eq!(map.cell(3, 3), Some(GridCell::new(9, 0)));
        assert_eq!(map.cell(0, 0), Some(BASE_CELL));

        let doubled = format!(
            r#"{{"isoMap":{},"canvasSizeMultiplier":2}}"#,
            serde_json::to_string(map.grid()).unwrap()
        );
        map.import_map(&doubled, &mut ledger).unwrap();
        assert_eq!(map.multiplier(), 2);
        assert_eq!(map.grid().side(), 14);
        // offset = floor((14 - 7) / 2) = 3
        assert_eq!(map.cell(6, 6), Some(GridCell::new(9, 0)));
        assert!(!map.history().can_undo());
    }

    #[test]
    fn default_layout_replaces_grid_and_resets_history() {
        let (mut map, mut ledger) = engine();
        map.place_tile(0, 0, 8, 0, &mut ledger);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        map.import_default_layout(&mut rng, &mut ledger).unwrap();
        assert_eq!(map.cell(3, 3), Some(GridCell::new(11, 0)));
        assert_eq!(map.history().len(), 1);

        let mut odd = MapEngine::new(TileCatalog::builtin(), 5, 50);
        assert!(matches!(
            odd.import_default_layout(&mut rng, &mut ledger),
            Err(MapError::LayoutSizeMismatch { expected: 5, actual: 7 })
        ));
    }

    #[test]
    fn grow_and_harvest_cycle() {
        let (mut map, mut ledger) = engine();
        map.place_tile(2, 2, 2, 0, &mut ledger);
        let carbon = ledger.carbon();
        let history = map.history().len();

        assert!(!map.grow_cell(2, 2, 4, &mut ledger));
        assert!(map.grow_cell(2, 2, 2, &mut ledger));
        assert_eq!(map.cell(2, 2), Some(GridCell::new(3, 0)));
        assert_eq!(map.history().len(), history);

        assert_eq!(map.harvest(2, 2, &mut ledger), Some(100));
        assert_eq!(map.cell(2, 2), Some(GridCell::new(2, 0)));
        assert_eq!(ledger.carbon(), carbon + 100);
        assert_eq!(map.harvest(2, 2, &mut ledger), None);
        assert_eq!(map.harvest(70, 2, &mut ledger), None);
    }

    #[test]
    fn zoom_controls_respect_limits() {
        let (mut map, _) = engine();
        assert!((map.viewport().zoom - map.compute_fit_zoom()).abs() < 1e-9);
        while map.zoom_in() {}
        assert!((map.viewport().zoom - map.max_zoom()).abs() < 1e-9);
        while map.zoom_out() {}
        assert!((map.viewport().zoom - map.min_zoom()).abs() < 1e-9);

        map.select_tile(Some(4));
        map.pan_by(10.0, 10.0);
        map.reset_view();
        assert_eq!(map.selected_tile_id(), None);
        assert_eq!(map.viewport().pan_x, -100.0);
    }

    #[test]
    fn hit_test_uses_tile_under_cell() {
        let (mut map, mut ledger) = engine();
        map.batch_clear_tiles(&[(1, 1)], &mut ledger);
        let mut masks = HashMap::new();
        masks.insert(1, AlphaMask::new(1, 1, vec![255]).unwrap());
        assert!(map.is_opaque_at(&masks, 0, 0, 0.5, 0.5, 1.0, 1.0, false));
        assert!(!map.is_opaque_at(&masks, 1, 1, 0.5, 0.5, 1.0, 1.0, false));
        assert!(!map.is_opaque_at(&masks, 9, 9, 0.5, 0.5, 1.0, 1.0, false));
    }

    #[test]
    fn state_round_trip_and_mismatch_reinit() {
        let (mut map, mut ledger) = engine();
        map.place_tile(0, 6, 10, 1, &mut ledger);
        map.set_fill_mode(FillMode::Column);
        let state = map.to_state();
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("isoMap").is_some());
        assert!(json.get("canvasSizeMultiplier").is_some());

        let (mut restored, mut restored_ledger) = engine();
        restored.restore_state(state.clone(), &mut restored_ledger);
        assert_eq!(restored.grid(), map.grid());
        assert_eq!(restored.fill_mode(), FillMode::Column);

        let mut broken = state;
        broken.canvas_size_multiplier = 2;
        restored.restore_state(broken, &mut restored_ledger);
        assert_eq!(restored.grid().side(), 14);
        assert_eq!(restored.count_tiles(1), 196);
    }
}
