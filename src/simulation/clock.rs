use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error};

pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 5.0;

pub type DayListener = Box<dyn FnMut(u64) -> Result<(), String>>;
pub type DeferredTask = Box<dyn FnOnce() -> Result<(), String>>;

struct Scheduled {
    due_at: f64,
    task: DeferredTask,
}

/// What one clock tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClockTick {
    /// Simulated seconds added by this tick.
    pub advanced_secs: f64,
    /// New 1-based day when at least one day boundary was crossed.
    pub new_day: Option<u64>,
    pub tasks_run: usize,
    pub failures: usize,
}

/// Persisted clock state, stored under the `clock` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockState {
    pub game_time: f64,
    pub game_speed: f64,
    pub is_paused: bool,
    pub task_id_counter: u64,
    #[serde(default)]
    pub saved_at: Option<String>,
}

/// Simulated time, scaled by a speed multiplier, with day-change listeners and
/// a deferred-task queue keyed on simulated time.
pub struct GameClock {
    game_time: f64,
    speed: f64,
    paused: bool,
    day_duration_secs: f64,
    tasks: BTreeMap<u64, Scheduled>,
    task_id_counter: u64,
    listeners: Vec<(u64, DayListener)>,
    listener_id_counter: u64,
}

impl fmt::Debug for GameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameClock")
            .field("game_time", &self.game_time)
            .field("speed", &self.speed)
            .field("paused", &self.paused)
            .field("day_duration_secs", &self.day_duration_secs)
            .field("pending_tasks", &self.tasks.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl GameClock {
    pub fn new(day_duration_secs: u64) -> Self {
        GameClock {
            game_time: 0.0,
            speed: 1.0,
            paused: false,
            day_duration_secs: day_duration_secs.max(1) as f64,
            tasks: BTreeMap::new(),
            task_id_counter: 0,
            listeners: Vec::new(),
            listener_id_counter: 0,
        }
    }

    pub fn game_time(&self) -> f64 {
        self.game_time
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn day_duration_secs(&self) -> f64 {
        self.day_duration_secs
    }

    /// Clamped to `[MIN_SPEED, MAX_SPEED]`. Returns the applied speed.
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        self.speed = if speed.is_nan() {
            1.0
        } else {
            speed.clamp(MIN_SPEED, MAX_SPEED)
        };
        self.speed
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    fn day_index(&self, time: f64) -> u64 {
        (time / self.day_duration_secs).floor().max(0.0) as u64
    }

    pub fn current_day(&self) -> u64 {
        self.day_index(self.game_time) + 1
    }

    /// `HH:MM`, one simulated second per in-game minute.
    pub fn time_of_day(&self) -> String {
        let minutes = (self.game_time.max(0.0) % self.day_duration_secs).floor() as u64;
        format!("{:02}:{:02}", (minutes / 60) % 24, minutes % 60)
    }

    pub fn add_day_listener(&mut self, listener: DayListener) -> u64 {
        self.listener_id_counter += 1;
        self.listeners.push((self.listener_id_counter, listener));
        self.listener_id_counter
    }

    pub fn remove_day_listener(&mut self, listener_id: u64) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != listener_id);
        self.listeners.len() != before
    }

    /// Run `task` once simulated time reaches now + `delay_secs`.
    pub fn schedule(&mut self, delay_secs: f64, task: DeferredTask) -> u64 {
        self.task_id_counter += 1;
        let due_at = self.game_time + delay_secs.max(0.0);
        self.tasks.insert(self.task_id_counter, Scheduled { due_at, task });
        self.task_id_counter
    }

    /// Id the next `schedule` call will return.
    pub fn next_task_id(&self) -> u64 {
        self.task_id_counter + 1
    }

    pub fn cancel(&mut self, task_id: u64) -> bool {
        self.tasks.remove(&task_id).is_some()
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn clear_tasks(&mut self) {
        self.tasks.clear();
    }

    /// Advance by `wall_delta_secs` of real time.
    pub fn tick(&mut self, wall_delta_secs: f64) -> ClockTick {
        let mut report = ClockTick::default();
        if self.paused || wall_delta_secs <= 0.0 {
            return report;
        }
        let old_time = self.game_time;
        self.game_time += wall_delta_secs * self.speed;
        report.advanced_secs = self.game_time - old_time;

        if self.day_index(self.game_time) > self.day_index(old_time) {
            let day = self.current_day();
            debug!(day, "Day changed");
            for (id, listener) in self.listeners.iter_mut() {
                if let Err(e) = listener(day) {
                    error!(listener_id = *id, day, error = %e, "Day listener failed");
                    report.failures += 1;
                }
            }
            report.new_day = Some(day);
        }

        let due: Vec<u64> = self
            .tasks
            .iter()
            .filter(|(_, s)| s.due_at <= self.game_time)
            .map(|(id, _)| *id)
            .collect();
        let ready: Vec<(u64, Scheduled)> = due
            .into_iter()
            .filter_map(|id| self.tasks.remove(&id).map(|s| (id, s)))
            .collect();
        for (id, scheduled) in ready {
            report.tasks_run += 1;
            if let Err(e) = (scheduled.task)() {
                error!(task_id = id, error = %e, "Deferred task failed");
                report.failures += 1;
            }
        }
        report
    }

    pub fn to_state(&self) -> ClockState {
        ClockState {
            game_time: self.game_time,
            game_speed: self.speed,
            is_paused: self.paused,
            task_id_counter: self.task_id_counter,
            saved_at: Some(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        }
    }

    /// Pending tasks are not persisted; owners re-arm them after a restore.
    pub fn restore_state(&mut self, state: &ClockState) {
        self.game_time = if state.game_time.is_finite() {
            state.game_time.max(0.0)
        } else {
            0.0
        };
        self.set_speed(state.game_speed);
        self.paused = state.is_paused;
        self.task_id_counter = self.task_id_counter.max(state.task_id_counter);
        self.tasks.clear();
    }

    /// Back to day one at normal speed. Listeners stay registered.
    pub fn reset(&mut self) {
        self.game_time = 0.0;
        self.speed = 1.0;
        self.paused = false;
        self.tasks.clear();
    }
}
