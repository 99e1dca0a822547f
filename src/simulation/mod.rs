pub mod advisory;
pub mod clock;
pub mod events;
pub mod growth;
pub mod ledger;
pub mod map;
pub mod notice;
pub mod sprites;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::catalog::TileCatalog;
use crate::config::simulation::SimulationConfig;
use crate::persistence::state::{
    load_json, save_json, CLOCK_KEY, EVENTS_KEY, MAP_STATE_KEY, NOTICES_KEY, RESOURCES_KEY,
};
use crate::persistence::store::{StateStore, StoreError};
use crate::simulation::advisory::{AdvisoryBoard, AdvisoryRequest, AdvisoryService, OfflineAdvisory};
use crate::simulation::clock::{ClockState, GameClock};
use crate::simulation::events::{EventScheduler, EventState, ResponseError, ResponseOption, SchedulerConfig};
use crate::simulation::growth::GrowthScheduler;
use crate::simulation::ledger::{ResourceKind, ResourceLedger};
use crate::simulation::map::{MapEngine, MapError, MapState};
use crate::simulation::notice::{NoticeBoard, NoticeState};
use crate::simulation::sprites::{SpriteSimulation, SpriteTick};
use crate::world::tile::FillMode;

/// Result of executing a single session tick.
#[derive(Debug, Default)]
pub struct TickResult {
    pub new_day: Option<u64>,
    pub grown: Vec<(usize, usize)>,
    pub triggered_event: Option<u64>,
    pub auto_response: Option<ResponseOption>,
    pub sprites: SpriteTick,
    pub notices_dismissed: usize,
    pub advisory_refreshed: bool,
    /// Phase timings in ms: [Clock, Growth, Events, Sprites, Notices, Advisory]
    pub phase_timings_ms: [f32; 6],
}

/// Why a player purchase was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseError {
    UnknownTile(u32),
    NotPurchasable(u32),
    Insufficient { price: i64, available: i64 },
}

impl std::fmt::Display for PurchaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurchaseError::UnknownTile(id) => write!(f, "Tile {} is not in the catalog", id),
            PurchaseError::NotPurchasable(id) => write!(f, "Tile {} cannot be bought", id),
            PurchaseError::Insufficient { price, available } => write!(
                f,
                "Not enough carbon credits: need {}, have {}",
                price, available
            ),
        }
    }
}

impl std::error::Error for PurchaseError {}

/// A running city: the grid plus every service that reads or writes it.
pub struct City {
    config: SimulationConfig,
    map: MapEngine,
    ledger: ResourceLedger,
    clock: GameClock,
    growth: GrowthScheduler,
    events: EventScheduler,
    sprites: SpriteSimulation,
    notices: NoticeBoard,
    advisory: AdvisoryBoard,
    advisor: Box<dyn AdvisoryService>,
    rng: ChaCha8Rng,
    last_tick_ms: Option<u64>,
    running: bool,
}

impl std::fmt::Debug for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("City")
            .field("ledger", &self.ledger)
            .field("side", &self.map.grid().side())
            .field("multiplier", &self.map.multiplier())
            .field("clock", &self.clock)
            .field("running", &self.running)
            .finish()
    }
}

impl City {
    pub fn new(config: SimulationConfig, catalog: TileCatalog) -> Self {
        let rng = if config.seed == 0 {
            ChaCha8Rng::from_entropy()
        } else {
            ChaCha8Rng::seed_from_u64(config.seed)
        };
        let map = MapEngine::new(catalog, config.base_tile_count, config.history_cap);
        let mut ledger = ResourceLedger::with_carbon(config.starting_carbon);
        map.recalculate_effects(&mut ledger);

        City {
            clock: GameClock::new(config.day_duration_secs),
            growth: GrowthScheduler::new(),
            events: EventScheduler::new(SchedulerConfig::from(&config)),
            sprites: SpriteSimulation::new(config.sprite_spawn_mode, config.sprite_refresh_interval_ms),
            notices: NoticeBoard::new(),
            advisory: AdvisoryBoard::new(config.advisory_interval_ms),
            advisor: Box::new(OfflineAdvisory),
            rng,
            last_tick_ms: None,
            running: false,
            map,
            ledger,
            config,
        }
    }

    pub fn with_advisor(mut self, advisor: Box<dyn AdvisoryService>) -> Self {
        self.advisor = advisor;
        self
    }

    /// Build a session and restore whatever the store holds. Missing or
    /// malformed blobs keep their defaults.
    pub fn load(config: SimulationConfig, catalog: TileCatalog, store: &impl StateStore) -> Self {
        let mut city = City::new(config, catalog);
        let mut restored = 0;

        if let Some(state) = load_json::<MapState>(store, MAP_STATE_KEY) {
            city.map.restore_state(state, &mut city.ledger);
            restored += 1;
        }
        // A saved ledger already carries event and sprite effects on top of
        // the grid totals.
        if let Some(ledger) = load_json::<ResourceLedger>(store, RESOURCES_KEY) {
            city.ledger = ledger;
            restored += 1;
        }
        if let Some(state) = load_json::<ClockState>(store, CLOCK_KEY) {
            city.clock.restore_state(&state);
            restored += 1;
        }
        if let Some(state) = load_json::<EventState>(store, EVENTS_KEY) {
            city.events.restore_state(state);
            restored += 1;
        }
        if let Some(state) = load_json::<NoticeState>(store, NOTICES_KEY) {
            city.notices.restore_state(state);
            restored += 1;
        }
        let armed = city.growth.rearm_all(&mut city.clock, &city.map);
        info!(restored, growth_timers = armed, "Loaded city state");
        city
    }

    pub fn save(&self, store: &mut impl StateStore) -> Result<(), StoreError> {
        save_json(store, MAP_STATE_KEY, &self.map.to_state())?;
        save_json(store, RESOURCES_KEY, &self.ledger)?;
        save_json(store, CLOCK_KEY, &self.clock.to_state())?;
        save_json(store, EVENTS_KEY, &self.events.to_state())?;
        save_json(store, NOTICES_KEY, &self.notices.to_state())?;
        debug!("Saved city state");
        Ok(())
    }

    // --- accessors ---

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn map(&self) -> &MapEngine {
        &self.map
    }

    /// View and selection changes only; grid edits go through `City`.
    pub fn map_mut(&mut self) -> &mut MapEngine {
        &mut self.map
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut GameClock {
        &mut self.clock
    }

    pub fn growth(&self) -> &GrowthScheduler {
        &self.growth
    }

    pub fn events(&self) -> &EventScheduler {
        &self.events
    }

    pub fn sprites(&self) -> &SpriteSimulation {
        &self.sprites
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut NoticeBoard {
        &mut self.notices
    }

    pub fn advisory(&self) -> &AdvisoryBoard {
        &self.advisory
    }

    pub fn advisory_mut(&mut self) -> &mut AdvisoryBoard {
        &mut self.advisory
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // --- lifecycle ---

    /// Arm every periodic schedule.
    pub fn start(&mut self, now_ms: u64) {
        if self.running {
            return;
        }
        self.running = true;
        self.last_tick_ms = Some(now_ms);
        self.events.start(now_ms);
        self.sprites.start();
        self.advisory.start(now_ms);
        info!(now_ms, "City started");
    }

    /// Disarm every periodic schedule. Event expiry and notice dismissal
    /// keep running on later ticks.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.events.stop();
        self.sprites.stop();
        self.advisory.stop();
        info!("City stopped");
    }

    /// Start over with a fresh grid and starting balance.
    pub fn restart(&mut self, now_ms: u64) {
        let was_running = self.running;
        self.stop();
        self.growth.disarm_all(&mut self.clock);
        let catalog = self.map.catalog().clone();
        self.map = MapEngine::new(catalog, self.config.base_tile_count, self.config.history_cap);
        self.ledger.restart(self.config.starting_carbon);
        self.map.recalculate_effects(&mut self.ledger);
        self.clock.reset();
        self.events.reset();
        self.sprites.clear();
        self.notices = NoticeBoard::new();
        self.advisory.clear();
        info!(starting_carbon = self.config.starting_carbon, "City restarted");
        if was_running {
            self.start(now_ms);
        }
    }

    /// Advance every subsystem: clock, growth, events, sprites, notices,
    /// advisory.
    pub fn tick(&mut self, now_ms: u64) -> TickResult {
        let mut result = TickResult::default();

        if self.running {
            let phase_start = Instant::now();
            let delta_ms = self.last_tick_ms.map_or(0, |last| now_ms.saturating_sub(last));
            let clock_tick = self.clock.tick(delta_ms as f64 / 1000.0);
            if let Some(day) = clock_tick.new_day {
                self.notices
                    .info("New day", &format!("Day {} has begun", day), now_ms);
                result.new_day = Some(day);
            }
            result.phase_timings_ms[0] = phase_start.elapsed().as_secs_f32() * 1000.0;

            let phase_start = Instant::now();
            result.grown = self
                .growth
                .apply_due(&mut self.clock, &mut self.map, &mut self.ledger);
            result.phase_timings_ms[1] = phase_start.elapsed().as_secs_f32() * 1000.0;
        }
        self.last_tick_ms = Some(now_ms);

        let phase_start = Instant::now();
        result.triggered_event =
            self.events
                .tick(now_ms, &mut self.ledger, &mut self.rng, &mut self.notices);
        if self.config.auto_respond
            && let Some(event_id) = result.triggered_event
        {
            result.auto_response = self.auto_respond(event_id, now_ms);
        }
        result.phase_timings_ms[2] = phase_start.elapsed().as_secs_f32() * 1000.0;

        let phase_start = Instant::now();
        result.sprites = self.sprites.tick(
            now_ms,
            self.map.grid(),
            self.map.multiplier(),
            &mut self.ledger,
            &mut self.rng,
        );
        result.phase_timings_ms[3] = phase_start.elapsed().as_secs_f32() * 1000.0;

        let phase_start = Instant::now();
        result.notices_dismissed = self.notices.tick(now_ms);
        result.phase_timings_ms[4] = phase_start.elapsed().as_secs_f32() * 1000.0;

        let phase_start = Instant::now();
        let request = AdvisoryRequest::from_ledger(&self.ledger);
        result.advisory_refreshed = self
            .advisory
            .tick(now_ms, &request, self.advisor.as_mut());
        result.phase_timings_ms[5] = phase_start.elapsed().as_secs_f32() * 1000.0;

        result
    }

    // --- player actions ---

    /// Buy and place a tile, refusing when carbon cannot cover the price.
    /// `Ok(false)` means the coordinates were off the grid.
    pub fn purchase_tile(&mut self, x: usize, y: usize, tile_id: u32, variant: i32) -> Result<bool, PurchaseError> {
        let def = self
            .map
            .catalog()
            .get(tile_id)
            .ok_or(PurchaseError::UnknownTile(tile_id))?;
        if !def.is_purchasable() {
            return Err(PurchaseError::NotPurchasable(tile_id));
        }
        let price = def.price;
        if !self.map.grid().in_bounds(x, y) {
            return Ok(false);
        }
        if !self.ledger.can_afford(ResourceKind::Carbon, price) {
            let available = self.ledger.carbon();
            warn!(tile_id, price, available, "Insufficient carbon for purchase");
            return Err(PurchaseError::Insufficient { price, available });
        }
        Ok(self.place_tile(x, y, tile_id, variant))
    }

    /// Place without a funds check (price is still deducted).
    pub fn place_tile(&mut self, x: usize, y: usize, tile_id: u32, variant: i32) -> bool {
        if !self.map.place_tile(x, y, tile_id, variant, &mut self.ledger) {
            return false;
        }
        self.growth.arm(&mut self.clock, &self.map, x, y);
        true
    }

    fn arm_cells(&mut self, cells: &[(usize, usize)]) {
        for &(x, y) in cells {
            self.growth.arm(&mut self.clock, &self.map, x, y);
        }
    }

    pub fn batch_place_tiles(&mut self, cells: &[(usize, usize)], tile_id: u32, variant: i32) -> usize {
        let placed = self
            .map
            .batch_place_tiles(cells, tile_id, variant, &mut self.ledger);
        self.arm_cells(cells);
        placed
    }

    pub fn batch_clear_tiles(&mut self, cells: &[(usize, usize)]) -> usize {
        let cleared = self.map.batch_clear_tiles(cells, &mut self.ledger);
        for &(x, y) in cells {
            self.growth.disarm(&mut self.clock, x, y);
        }
        cleared
    }

    pub fn fill_row(&mut self, row: usize, tile_id: u32, variant: i32) -> usize {
        let cells: Vec<_> = (0..self.map.grid().side()).map(|y| (row, y)).collect();
        let placed = self.map.fill_row(row, tile_id, variant, &mut self.ledger);
        self.arm_cells(&cells);
        placed
    }

    pub fn fill_column(&mut self, col: usize, tile_id: u32, variant: i32) -> usize {
        let cells: Vec<_> = (0..self.map.grid().side()).map(|x| (x, col)).collect();
        let placed = self.map.fill_column(col, tile_id, variant, &mut self.ledger);
        self.arm_cells(&cells);
        placed
    }

    /// Place according to the map's fill mode.
    pub fn fill(&mut self, x: usize, y: usize, tile_id: u32, variant: i32) -> bool {
        match self.map.fill_mode() {
            FillMode::Single => self.place_tile(x, y, tile_id, variant),
            FillMode::Row => self.fill_row(x, tile_id, variant) > 0,
            FillMode::Column => self.fill_column(y, tile_id, variant) > 0,
        }
    }

    pub fn harvest(&mut self, x: usize, y: usize) -> Option<i64> {
        let reward = self.map.harvest(x, y, &mut self.ledger)?;
        self.growth.arm(&mut self.clock, &self.map, x, y);
        Some(reward)
    }

    pub fn undo(&mut self) -> bool {
        let done = self.map.undo(&mut self.ledger);
        if done {
            self.growth.rearm_all(&mut self.clock, &self.map);
        }
        done
    }

    pub fn redo(&mut self) -> bool {
        let done = self.map.redo(&mut self.ledger);
        if done {
            self.growth.rearm_all(&mut self.clock, &self.map);
        }
        done
    }

    pub fn set_canvas_size_multiplier(&mut self, multiplier: u32) -> bool {
        let changed = self.map.set_canvas_size_multiplier(multiplier, &mut self.ledger);
        if changed {
            self.growth.rearm_all(&mut self.clock, &self.map);
        }
        changed
    }

    pub fn import_map(&mut self, data: &str) -> Result<(), MapError> {
        self.map.import_map(data, &mut self.ledger)?;
        self.growth.rearm_all(&mut self.clock, &self.map);
        Ok(())
    }

    pub fn export_map(&self) -> Result<String, MapError> {
        self.map.export_map()
    }

    pub fn import_default_layout(&mut self) -> Result<(), MapError> {
        self.map
            .import_default_layout(&mut self.rng, &mut self.ledger)?;
        self.growth.rearm_all(&mut self.clock, &self.map);
        Ok(())
    }

    pub fn trigger_event(&mut self, definition_id: &str, now_ms: u64) -> Option<u64> {
        self.events
            .trigger_event(definition_id, now_ms, &mut self.ledger, &mut self.notices)
    }

    pub fn respond_to_event(
        &mut self,
        event_id: u64,
        option_index: usize,
        now_ms: u64,
    ) -> Result<ResponseOption, ResponseError> {
        self.events.respond_to_event(
            event_id,
            option_index,
            now_ms,
            &mut self.ledger,
            &mut self.notices,
        )
    }

    /// Answer an event with its best-scoring option.
    pub fn auto_respond(&mut self, event_id: u64, now_ms: u64) -> Option<ResponseOption> {
        let event = self.events.get(event_id)?;
        if !event.awaiting_response() {
            return None;
        }
        let index = advisory::best_response(&event.response_options)?;
        match self.respond_to_event(event_id, index, now_ms) {
            Ok(option) => {
                info!(event_id, response = %option.text, "Automatically answered event");
                Some(option)
            }
            Err(e) => {
                warn!(event_id, error = %e, "Automatic event response failed");
                None
            }
        }
    }

    /// Fetch a fresh analysis immediately.
    pub fn refresh_advisory(&mut self) {
        let request = AdvisoryRequest::from_ledger(&self.ledger);
        self.advisory.refresh(&request, self.advisor.as_mut());
    }
}
