use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::simulation::SpriteSpawnMode;
use crate::simulation::ledger::{ResourceKind, ResourceLedger};
use crate::world::grid::Grid;

const NEIGHBORS_8: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];
const NEIGHBORS_4: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Aggregate spawns added per call never exceed this.
pub const MAX_AGGREGATE_SPAWNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpriteKind {
    Fox,
    Cat,
    People,
}

/// How a kind populates the grid in scan mode.
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnRule {
    /// One instance per `center` cell whose 8 neighbors are all `neighbor`,
    /// each gated by `chance`.
    Surrounded { center: u32, neighbor: u32, chance: f64 },
    /// Full repopulation on `allowed` cells with a random count in
    /// `min..=max`.
    ValidSpot {
        allowed: Vec<u32>,
        min: usize,
        max: usize,
    },
    /// Only spawned by the aggregate spawner.
    AggregateOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementRule {
    /// Random walkable cell within `radius` of home.
    Roam { radius: usize },
    /// Back and forth between home and one adjacent walkable cell.
    Pace,
}

/// Credited to the ledger when a sprite arrives on `tile_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileReward {
    pub tile_id: u32,
    pub kind: ResourceKind,
    pub amount: i64,
}

/// Population cap for the aggregate spawner, scaled by the canvas multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapRule {
    /// floor(count(tile_id) / per)
    TileCount { tile_id: u32, per: i64 },
    /// floor(balance(kind) / per)
    Resource { kind: ResourceKind, per: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateRule {
    pub probability: f64,
    pub cap: CapRule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpriteDef {
    pub kind: SpriteKind,
    pub frames: usize,
    pub frame_interval_ms: u64,
    /// Idle time between moves, also the length of one move.
    pub move_interval_ms: u64,
    pub spawn: SpawnRule,
    pub movement: MovementRule,
    pub forbidden: Vec<u32>,
    pub rewards: Vec<TileReward>,
    pub aggregate: Option<AggregateRule>,
}

pub fn builtin_sprites() -> Vec<SpriteDef> {
    vec![
        SpriteDef {
            kind: SpriteKind::Fox,
            frames: 5,
            frame_interval_ms: 800,
            move_interval_ms: 2000,
            spawn: SpawnRule::Surrounded {
                center: 1,
                neighbor: 3,
                chance: 0.8,
            },
            movement: MovementRule::Roam { radius: 1 },
            forbidden: (8..=23).collect(),
            rewards: vec![TileReward {
                tile_id: 4,
                kind: ResourceKind::Biodiversity,
                amount: 5,
            }],
            aggregate: Some(AggregateRule {
                probability: 0.3,
                cap: CapRule::TileCount { tile_id: 4, per: 3 },
            }),
        },
        SpriteDef {
            kind: SpriteKind::Cat,
            frames: 5,
            frame_interval_ms: 600,
            move_interval_ms: 3000,
            spawn: SpawnRule::ValidSpot {
                allowed: vec![1, 2],
                min: 1,
                max: 3,
            },
            movement: MovementRule::Pace,
            forbidden: [8, 9].into_iter().chain(13..=23).collect(),
            rewards: Vec::new(),
            aggregate: Some(AggregateRule {
                probability: 0.2,
                cap: CapRule::Resource {
                    kind: ResourceKind::Biodiversity,
                    per: 200,
                },
            }),
        },
        SpriteDef {
            kind: SpriteKind::People,
            frames: 5,
            frame_interval_ms: 600,
            move_interval_ms: 2500,
            spawn: SpawnRule::AggregateOnly,
            movement: MovementRule::Roam { radius: 1 },
            forbidden: vec![1, 2, 3, 4, 8, 9],
            rewards: [10, 11, 12]
                .into_iter()
                .map(|tile_id| TileReward {
                    tile_id,
                    kind: ResourceKind::Culture,
                    amount: 10,
                })
                .collect(),
            aggregate: Some(AggregateRule {
                probability: 1.0,
                cap: CapRule::Resource {
                    kind: ResourceKind::Culture,
                    per: 200,
                },
            }),
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteOrigin {
    Scan,
    Aggregate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveState {
    Idle,
    Moving {
        from: (usize, usize),
        to: (usize, usize),
        started_ms: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub id: u64,
    pub kind: SpriteKind,
    pub origin: SpriteOrigin,
    /// Cell the sprite spawned on; roaming and pacing are relative to it.
    pub home: (usize, usize),
    /// Cell the sprite last came to rest on.
    pub anchor: (usize, usize),
    /// Pacing partner cell, chosen on the first move.
    pub alternate: Option<(usize, usize)>,
    pub state: MoveState,
    /// Interpolated (row, col) for rendering.
    pub position: (f64, f64),
    pub frame: usize,
    last_frame_ms: u64,
    last_move_ms: u64,
}

/// What one sprite pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpriteTick {
    pub spawned: usize,
    pub despawned: usize,
    pub rewards: Vec<TileReward>,
}

/// Decorative agents that live on the grid.
#[derive(Debug)]
pub struct SpriteSimulation {
    defs: Vec<SpriteDef>,
    sprites: Vec<Sprite>,
    next_id: u64,
    mode: SpriteSpawnMode,
    refresh_interval_ms: u64,
    last_refresh_ms: Option<u64>,
    running: bool,
}

impl SpriteSimulation {
    pub fn new(mode: SpriteSpawnMode, refresh_interval_ms: u64) -> Self {
        Self::with_defs(builtin_sprites(), mode, refresh_interval_ms)
    }

    pub fn with_defs(defs: Vec<SpriteDef>, mode: SpriteSpawnMode, refresh_interval_ms: u64) -> Self {
        SpriteSimulation {
            defs,
            sprites: Vec::new(),
            next_id: 1,
            mode,
            refresh_interval_ms: refresh_interval_ms.max(1),
            last_refresh_ms: None,
            running: false,
        }
    }

    pub fn mode(&self) -> SpriteSpawnMode {
        self.mode
    }

    pub fn sprites(&self) -> &[Sprite] {
        &self.sprites
    }

    pub fn count(&self, kind: SpriteKind) -> usize {
        self.sprites.iter().filter(|s| s.kind == kind).count()
    }

    pub fn get(&self, id: u64) -> Option<&Sprite> {
        self.sprites.iter().find(|s| s.id == id)
    }

    pub fn remove(&mut self, id: u64) -> Option<Sprite> {
        let index = self.sprites.iter().position(|s| s.id == id)?;
        Some(self.sprites.remove(index))
    }

    pub fn clear(&mut self) {
        self.sprites.clear();
        self.next_id = 1;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The first refresh happens on the next tick.
    pub fn start(&mut self) {
        self.running = true;
        self.last_refresh_ms = None;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    fn def(&self, kind: SpriteKind) -> Option<&SpriteDef> {
        self.defs.iter().find(|d| d.kind == kind)
    }

    /// Periodic refresh followed by a movement pass.
    pub fn tick(
        &mut self,
        now_ms: u64,
        grid: &Grid,
        multiplier: u32,
        ledger: &mut ResourceLedger,
        rng: &mut impl Rng,
    ) -> SpriteTick {
        let mut report = SpriteTick::default();
        if !self.running {
            return report;
        }
        let due = self
            .last_refresh_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.refresh_interval_ms);
        if due {
            self.last_refresh_ms = Some(now_ms);
            report.spawned = match self.mode {
                SpriteSpawnMode::Scan => self.scan(now_ms, grid, rng),
                SpriteSpawnMode::Aggregate => {
                    self.spawn_aggregate(now_ms, grid, multiplier, ledger, rng)
                }
            };
        }
        let pass = self.update(now_ms, grid, ledger, rng);
        report.despawned = pass.despawned;
        report.rewards = pass.rewards;
        report
    }

    fn spawn(&mut self, kind: SpriteKind, origin: SpriteOrigin, cell: (usize, usize), now_ms: u64) {
        let sprite = Sprite {
            id: self.next_id,
            kind,
            origin,
            home: cell,
            anchor: cell,
            alternate: None,
            state: MoveState::Idle,
            position: (cell.0 as f64, cell.1 as f64),
            frame: 0,
            last_frame_ms: now_ms,
            last_move_ms: now_ms,
        };
        debug!(sprite_id = sprite.id, kind = ?kind, row = cell.0, col = cell.1, "Sprite spawned");
        self.next_id += 1;
        self.sprites.push(sprite);
    }

    /// Neighborhood scan. Returns how many sprites were spawned.
    pub fn scan(&mut self, now_ms: u64, grid: &Grid, rng: &mut impl Rng) -> usize {
        let mut spawned = 0;
        let rules: Vec<(SpriteKind, SpawnRule)> =
            self.defs.iter().map(|d| (d.kind, d.spawn.clone())).collect();

        for (kind, rule) in rules {
            match rule {
                SpawnRule::Surrounded {
                    center,
                    neighbor,
                    chance,
                } => {
                    let anchors: Vec<(usize, usize)> = grid
                        .iter()
                        .filter(|&(x, y, _)| is_surrounded(grid, x, y, center, neighbor))
                        .map(|(x, y, _)| (x, y))
                        .collect();
                    for cell in anchors {
                        let occupied = self
                            .sprites
                            .iter()
                            .any(|s| s.kind == kind && s.origin == SpriteOrigin::Scan && s.home == cell);
                        if !occupied && rng.r#gen::<f64>() < chance {
                            self.spawn(kind, SpriteOrigin::Scan, cell, now_ms);
                            spawned += 1;
                        }
                    }
                }
                SpawnRule::ValidSpot { allowed, min, max } => {
                    self.sprites
                        .retain(|s| !(s.kind == kind && s.origin == SpriteOrigin::Scan));
                    let mut spots: Vec<(usize, usize)> = grid
                        .iter()
                        .filter(|(_, _, c)| allowed.contains(&c.tile_id()))
                        .map(|(x, y, _)| (x, y))
                        .collect();
                    if spots.is_empty() {
                        continue;
                    }
                    let wanted = if max > min {
                        rng.gen_range(min..=max)
                    } else {
                        min
                    };
                    spots.shuffle(rng);
                    for cell in spots.into_iter().take(wanted) {
                        self.spawn(kind, SpriteOrigin::Scan, cell, now_ms);
                        spawned += 1;
                    }
                }
                SpawnRule::AggregateOnly => {}
            }
        }
        spawned
    }

    fn cap_for(&self, rule: &AggregateRule, grid: &Grid, multiplier: u32, ledger: &ResourceLedger) -> usize {
        let base = match rule.cap {
            CapRule::TileCount { tile_id, per } => grid.count_tile(tile_id) as i64 / per.max(1),
            CapRule::Resource { kind, per } => ledger.balance(kind).max(0) / per.max(1),
        };
        base.max(0) as usize * multiplier as usize
    }

    /// Probabilistic spawns capped by resources and tile counts. Returns how
    /// many sprites were added.
    pub fn spawn_aggregate(
        &mut self,
        now_ms: u64,
        grid: &Grid,
        multiplier: u32,
        ledger: &ResourceLedger,
        rng: &mut impl Rng,
    ) -> usize {
        let mut pool: Vec<(SpriteKind, usize)> = Vec::new();
        for def in &self.defs {
            let Some(rule) = def.aggregate else {
                continue;
            };
            let cap = self.cap_for(&rule, grid, multiplier, ledger);
            if rng.r#gen::<f64>() < rule.probability && self.count(def.kind) < cap {
                pool.push((def.kind, cap));
            }
        }

        let attempts = (multiplier as usize).clamp(1, MAX_AGGREGATE_SPAWNS);
        let mut added = 0;
        for _ in 0..attempts {
            let Some(&(kind, cap)) = pool.choose(rng) else {
                break;
            };
            if self.count(kind) >= cap {
                continue;
            }
            let Some(forbidden) = self.def(kind).map(|d| d.forbidden.clone()) else {
                continue;
            };
            if let Some(cell) = random_valid_position(grid, &forbidden, multiplier, rng) {
                self.spawn(kind, SpriteOrigin::Aggregate, cell, now_ms);
                added += 1;
            }
        }
        added
    }

    /// Advance animation and movement, then drop sprites whose anchor no
    /// longer supports them.
    pub fn update(
        &mut self,
        now_ms: u64,
        grid: &Grid,
        ledger: &mut ResourceLedger,
        rng: &mut impl Rng,
    ) -> SpriteTick {
        let mut report = SpriteTick::default();
        let defs = &self.defs;

        for sprite in self.sprites.iter_mut() {
            let Some(def) = defs.iter().find(|d| d.kind == sprite.kind) else {
                continue;
            };

            if def.frames > 0 && now_ms.saturating_sub(sprite.last_frame_ms) >= def.frame_interval_ms {
                sprite.frame = (sprite.frame + 1) % def.frames;
                sprite.last_frame_ms = now_ms;
            }

            match sprite.state {
                MoveState::Idle => {
                    sprite.position = (sprite.anchor.0 as f64, sprite.anchor.1 as f64);
                    if now_ms.saturating_sub(sprite.last_move_ms) >= def.move_interval_ms {
                        let to = choose_target(def, sprite, grid, rng);
                        sprite.state = MoveState::Moving {
                            from: sprite.anchor,
                            to,
                            started_ms: now_ms,
                        };
                    }
                }
                MoveState::Moving {
                    from,
                    to,
                    started_ms,
                } => {
                    let elapsed = now_ms.saturating_sub(started_ms) as f64;
                    let progress = (elapsed / def.move_interval_ms.max(1) as f64).min(1.0);
                    if progress >= 1.0 {
                        if is_walkable(def, sprite.origin, grid, to.0, to.1) {
                            let arrived = to != sprite.anchor;
                            sprite.anchor = to;
                            if arrived {
                                let tile = grid.get(to.0, to.1).map(|c| c.tile_id());
                                for reward in def.rewards.iter().filter(|r| Some(r.tile_id) == tile) {
                                    ledger.update(reward.kind, reward.amount);
                                    report.rewards.push(*reward);
                                }
                            }
                        }
                        sprite.position = (sprite.anchor.0 as f64, sprite.anchor.1 as f64);
                        sprite.state = MoveState::Idle;
                        sprite.last_move_ms = now_ms;
                    } else {
                        sprite.position = (
                            from.0 as f64 + (to.0 as f64 - from.0 as f64) * progress,
                            from.1 as f64 + (to.1 as f64 - from.1 as f64) * progress,
                        );
                    }
                }
            }
        }

        let before = self.sprites.len();
        self.sprites.retain(|s| {
            defs.iter()
                .find(|d| d.kind == s.kind)
                .is_some_and(|d| should_exist(d, s, grid))
        });
        report.despawned = before - self.sprites.len();
        if report.despawned > 0 {
            debug!(count = report.despawned, "Sprites despawned");
        }
        report
    }
}

fn is_surrounded(grid: &Grid, x: usize, y: usize, center: u32, neighbor: u32) -> bool {
    if grid.get(x, y).map(|c| c.tile_id()) != Some(center) {
        return false;
    }
    NEIGHBORS_8
        .iter()
        .all(|(dx, dy)| grid.tile_id_at(x as i64 + dx, y as i64 + dy) == Some(neighbor))
}

fn is_walkable(def: &SpriteDef, origin: SpriteOrigin, grid: &Grid, x: usize, y: usize) -> bool {
    let Some(tile) = grid.get(x, y).map(|c| c.tile_id()) else {
        return false;
    };
    if def.forbidden.contains(&tile) {
        return false;
    }
    match (&def.spawn, origin) {
        (SpawnRule::ValidSpot { allowed, .. }, SpriteOrigin::Scan) => allowed.contains(&tile),
        _ => true,
    }
}

fn should_exist(def: &SpriteDef, sprite: &Sprite, grid: &Grid) -> bool {
    match (&def.spawn, sprite.origin) {
        (SpawnRule::Surrounded { center, neighbor, .. }, SpriteOrigin::Scan) => {
            is_surrounded(grid, sprite.home.0, sprite.home.1, *center, *neighbor)
        }
        _ => is_walkable(def, sprite.origin, grid, sprite.anchor.0, sprite.anchor.1),
    }
}

fn choose_target(def: &SpriteDef, sprite: &mut Sprite, grid: &Grid, rng: &mut impl Rng) -> (usize, usize) {
    match def.movement {
        MovementRule::Roam { radius } => {
            let side = grid.side();
            if side == 0 {
                return sprite.anchor;
            }
            let (hx, hy) = sprite.home;
            let rows = hx.saturating_sub(radius)..=(hx + radius).min(side - 1);
            let candidates: Vec<(usize, usize)> = rows
                .flat_map(|x| {
                    (hy.saturating_sub(radius)..=(hy + radius).min(side - 1)).map(move |y| (x, y))
                })
                .filter(|&(x, y)| is_walkable(def, sprite.origin, grid, x, y))
                .collect();
            candidates.choose(rng).copied().unwrap_or(sprite.anchor)
        }
        MovementRule::Pace => {
            let home = sprite.home;
            let origin = sprite.origin;
            let alternate = *sprite.alternate.get_or_insert_with(|| {
                let spots: Vec<(usize, usize)> = NEIGHBORS_4
                    .iter()
                    .filter_map(|(dx, dy)| {
                        let x = home.0 as i64 + dx;
                        let y = home.1 as i64 + dy;
                        (x >= 0 && y >= 0).then_some((x as usize, y as usize))
                    })
                    .filter(|&(x, y)| is_walkable(def, origin, grid, x, y))
                    .collect();
                spots.choose(rng).copied().unwrap_or(home)
            });
            if sprite.anchor == home { alternate } else { home }
        }
    }
}

/// Random probes first, then a full scan on larger canvases.
pub fn random_valid_position(
    grid: &Grid,
    forbidden: &[u32],
    multiplier: u32,
    rng: &mut impl Rng,
) -> Option<(usize, usize)> {
    let side = grid.side();
    if side == 0 {
        return None;
    }
    let valid = |x: usize, y: usize| {
        grid.get(x, y)
            .is_some_and(|c| !forbidden.contains(&c.tile_id()))
    };

    let attempts = 100 * multiplier.max(1) as usize;
    let mut collected = Vec::new();
    for _ in 0..attempts {
        let x = rng.gen_range(0..side);
        let y = rng.gen_range(0..side);
        if !valid(x, y) {
            continue;
        }
        if multiplier >= 4 {
            collected.push((x, y));
            if collected.len() >= 10 {
                break;
            }
        } else {
            return Some((x, y));
        }
    }
    if let Some(cell) = collected.choose(rng) {
        return Some(*cell);
    }

    if multiplier >= 2 {
        let all: Vec<(usize, usize)> = grid
            .iter()
            .filter(|&(x, y, _)| valid(x, y))
            .map(|(x, y, _)| (x, y))
            .collect();
        return all.choose(rng).copied();
    }
    None
}
