use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

use crate::simulation::clock::GameClock;
use crate::simulation::ledger::ResourceLedger;
use crate::simulation::map::MapEngine;

/// A growth timer that has fired and waits to be applied to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthDue {
    pub x: usize,
    pub y: usize,
    pub source_id: u32,
    pub task_id: u64,
}

/// Growth timers for tiles with a growth descriptor, run as deferred clock
/// tasks. Fired timers land in a queue that `apply_due` drains.
#[derive(Debug, Default)]
pub struct GrowthScheduler {
    pending: HashMap<(usize, usize), u64>,
    due: Rc<RefCell<Vec<GrowthDue>>>,
}

impl GrowthScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_armed(&self, x: usize, y: usize) -> bool {
        self.pending.contains_key(&(x, y))
    }

    /// Start a timer for the tile now at (x, y). Any earlier timer for the
    /// cell is cancelled. Returns whether a timer was started.
    pub fn arm(&mut self, clock: &mut GameClock, map: &MapEngine, x: usize, y: usize) -> bool {
        self.disarm(clock, x, y);
        let Some(cell) = map.cell(x, y) else {
            return false;
        };
        let source_id = cell.tile_id();
        let Some(growth) = map.catalog().get(source_id).and_then(|d| d.growth.as_ref()) else {
            return false;
        };

        let queue = Rc::clone(&self.due);
        let task_id = clock.next_task_id();
        let scheduled = clock.schedule(
            growth.duration_ticks as f64,
            Box::new(move || {
                queue
                    .try_borrow_mut()
                    .map_err(|e| format!("growth queue busy: {}", e))?
                    .push(GrowthDue {
                        x,
                        y,
                        source_id,
                        task_id,
                    });
                Ok(())
            }),
        );
        self.pending.insert((x, y), scheduled);
        debug!(x, y, tile_id = source_id, secs = growth.duration_ticks, "Growth timer armed");
        true
    }

    pub fn disarm(&mut self, clock: &mut GameClock, x: usize, y: usize) -> bool {
        match self.pending.remove(&(x, y)) {
            Some(task_id) => clock.cancel(task_id),
            None => false,
        }
    }

    pub fn disarm_all(&mut self, clock: &mut GameClock) {
        for (_, task_id) in self.pending.drain() {
            clock.cancel(task_id);
        }
        self.due.borrow_mut().clear();
    }

    /// Drop every timer and start fresh ones for each growing tile on the
    /// grid. Returns how many were armed.
    pub fn rearm_all(&mut self, clock: &mut GameClock, map: &MapEngine) -> usize {
        self.disarm_all(clock);
        let growing: Vec<(usize, usize)> = map
            .grid()
            .iter()
            .filter(|(_, _, cell)| {
                map.catalog()
                    .get(cell.tile_id())
                    .is_some_and(|d| d.grows())
            })
            .map(|(x, y, _)| (x, y))
            .collect();
        growing
            .into_iter()
            .filter(|&(x, y)| self.arm(clock, map, x, y))
            .count()
    }

    /// Apply fired timers. Returns the cells that actually grew.
    pub fn apply_due(
        &mut self,
        clock: &mut GameClock,
        map: &mut MapEngine,
        ledger: &mut ResourceLedger,
    ) -> Vec<(usize, usize)> {
        let fired: Vec<GrowthDue> = self.due.borrow_mut().drain(..).collect();
        let mut grown = Vec::new();
        for due in fired {
            // a stale timer from a cell that has since been re-armed
            if self.pending.get(&(due.x, due.y)) != Some(&due.task_id) {
                continue;
            }
            self.pending.remove(&(due.x, due.y));
            if map.grow_cell(due.x, due.y, due.source_id, ledger) {
                grown.push((due.x, due.y));
                self.arm(clock, map, due.x, due.y);
            }
        }
        grown
    }
}
