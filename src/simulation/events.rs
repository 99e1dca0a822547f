use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::config::simulation::SimulationConfig;
use crate::simulation::ledger::{Effects, ResourceKind, ResourceLedger};

// === Definitions ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Nature,
    Culture,
    Economy,
    Disaster,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCost {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseOption {
    pub text: String,
    pub cost: ResponseCost,
    pub effects: Effects,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: EventCategory,
    pub effects: Effects,
    pub duration_ms: u64,
    /// Independent per-tick trigger chance.
    pub probability: f64,
    pub requires_response: bool,
    pub response_options: Vec<ResponseOption>,
}

pub fn builtin_definitions() -> Vec<EventDefinition> {
    vec![
        EventDefinition {
            id: "eco_restoration",
            name: "Ecological Restoration",
            description: "A campus restoration project boosts biodiversity",
            icon: "🌱",
            category: EventCategory::Nature,
            effects: Effects::new(-25, 20, 5),
            duration_ms: 45_000,
            probability: 0.25,
            requires_response: false,
            response_options: Vec::new(),
        },
        EventDefinition {
            id: "campus_activity",
            name: "Campus Festival",
            description: "A culture festival draws students and staff, culture rises sharply",
            icon: "🎭",
            category: EventCategory::Culture,
            effects: Effects::new(-10, 5, 30),
            duration_ms: 45_000,
            probability: 0.25,
            requires_response: false,
            response_options: Vec::new(),
        },
        EventDefinition {
            id: "green_investment",
            name: "Green Investment",
            description: "A green investment trades short-term spending for long-term gains",
            icon: "💰",
            category: EventCategory::Economy,
            effects: Effects::new(10, 15, 10),
            duration_ms: 60_000,
            probability: 0.2,
            requires_response: false,
            response_options: Vec::new(),
        },
        EventDefinition {
            id: "extreme_weather",
            name: "Extreme Weather",
            description: "A storm hits the campus and damages the environment",
            icon: "⛈️",
            category: EventCategory::Disaster,
            effects: Effects::new(50, -15, -10),
            duration_ms: 60_000,
            probability: 0.15,
            requires_response: true,
            response_options: vec![
                ResponseOption {
                    text: "Emergency response".to_string(),
                    cost: ResponseCost {
                        kind: ResourceKind::Carbon,
                        amount: 120,
                    },
                    effects: Effects::new(-30, -5, -5),
                },
                ResponseOption {
                    text: "Natural recovery".to_string(),
                    cost: ResponseCost {
                        kind: ResourceKind::Carbon,
                        amount: 0,
                    },
                    effects: Effects::new(0, -10, -15),
                },
            ],
        },
        EventDefinition {
            id: "special_visitor",
            name: "Special Visitor",
            description: "A noted ecologist visits and brings new ideas",
            icon: "👨‍🔬",
            category: EventCategory::Special,
            effects: Effects::new(-15, 25, 20),
            duration_ms: 30_000,
            probability: 0.15,
            requires_response: false,
            response_options: Vec::new(),
        },
    ]
}

// === Instances ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    pub id: u64,
    pub definition_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: EventCategory,
    /// Scaled at trigger time; replaced by the chosen response's effects.
    pub effects: Effects,
    pub duration_ms: u64,
    pub requires_response: bool,
    #[serde(default)]
    pub response_options: Vec<ResponseOption>,
    pub start_time: u64,
    pub end_time: u64,
    pub is_active: bool,
    pub is_responded: bool,
}

impl GameEvent {
    pub fn awaiting_response(&self) -> bool {
        self.is_active && self.requires_response && !self.is_responded
    }
}

/// Observer of event transitions. Anything holding its own copy of an event
/// must apply each transition to that copy here.
pub trait EventSink {
    fn event_triggered(&mut self, _event: &GameEvent) {}
    fn event_responded(&mut self, _event: &GameEvent, _option: &ResponseOption) {}
    fn event_ended(&mut self, _event: &GameEvent) {}
}

impl EventSink for () {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    NotFound(u64),
    AlreadyResponded(u64),
    Expired(u64),
    NoResponseRequired(u64),
    UnknownOption { event_id: u64, index: usize },
    Insufficient {
        kind: ResourceKind,
        needed: i64,
        available: i64,
    },
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseError::NotFound(id) => write!(f, "Event {} does not exist", id),
            ResponseError::AlreadyResponded(id) => write!(f, "Event {} was already answered", id),
            ResponseError::Expired(id) => write!(f, "Event {} has expired", id),
            ResponseError::NoResponseRequired(id) => {
                write!(f, "Event {} takes no response", id)
            }
            ResponseError::UnknownOption { event_id, index } => {
                write!(f, "Event {} has no response option {}", event_id, index)
            }
            ResponseError::Insufficient {
                kind,
                needed,
                available,
            } => write!(
                f,
                "Not enough {}: need {}, have {}",
                kind.label(),
                needed,
                available
            ),
        }
    }
}

impl std::error::Error for ResponseError {}

// === Scheduler ===

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    pub interval_ms: u64,
    pub cooldown_ms: u64,
    pub bootstrap_delay_ms: u64,
    pub history_cap: usize,
    pub effect_scale: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            interval_ms: 60_000,
            cooldown_ms: 30_000,
            bootstrap_delay_ms: 5_000,
            history_cap: 50,
            effect_scale: 1.0,
        }
    }
}

impl From<&SimulationConfig> for SchedulerConfig {
    fn from(config: &SimulationConfig) -> Self {
        SchedulerConfig {
            interval_ms: config.event_interval_ms,
            cooldown_ms: config.event_cooldown_ms,
            bootstrap_delay_ms: config.event_bootstrap_delay_ms,
            history_cap: config.event_history_cap,
            effect_scale: config.event_effect_scale,
        }
    }
}

/// Persisted scheduler state, stored under the `events` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventState {
    #[serde(default)]
    pub active_events: Vec<GameEvent>,
    #[serde(default)]
    pub event_history: Vec<GameEvent>,
    #[serde(default)]
    pub event_id_counter: u64,
    #[serde(default)]
    pub last_trigger_time: Option<u64>,
}

#[derive(Debug)]
pub struct EventScheduler {
    definitions: Vec<EventDefinition>,
    config: SchedulerConfig,
    active: Vec<GameEvent>,
    /// Newest first.
    history: VecDeque<GameEvent>,
    id_counter: u64,
    last_trigger_ms: Option<u64>,
    next_tick_ms: Option<u64>,
    bootstrap_at_ms: Option<u64>,
}

impl EventScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_definitions(builtin_definitions(), config)
    }

    pub fn with_definitions(definitions: Vec<EventDefinition>, config: SchedulerConfig) -> Self {
        EventScheduler {
            definitions,
            config,
            active: Vec::new(),
            history: VecDeque::new(),
            id_counter: 0,
            last_trigger_ms: None,
            next_tick_ms: None,
            bootstrap_at_ms: None,
        }
    }

    pub fn definitions(&self) -> &[EventDefinition] {
        &self.definitions
    }

    pub fn active_events(&self) -> &[GameEvent] {
        &self.active
    }

    pub fn history(&self) -> impl Iterator<Item = &GameEvent> {
        self.history.iter()
    }

    pub fn events_requiring_response(&self) -> impl Iterator<Item = &GameEvent> {
        self.active.iter().filter(|e| e.awaiting_response())
    }

    pub fn get(&self, event_id: u64) -> Option<&GameEvent> {
        self.active
            .iter()
            .chain(self.history.iter())
            .find(|e| e.id == event_id)
    }

    pub fn is_running(&self) -> bool {
        self.next_tick_ms.is_some()
    }

    pub fn last_trigger_ms(&self) -> Option<u64> {
        self.last_trigger_ms
    }

    /// Arm the periodic trigger and the one-shot bootstrap attempt.
    pub fn start(&mut self, now_ms: u64) {
        if self.is_running() {
            return;
        }
        self.next_tick_ms = Some(now_ms + self.config.interval_ms);
        self.bootstrap_at_ms = Some(now_ms + self.config.bootstrap_delay_ms);
        info!(interval_ms = self.config.interval_ms, "Event scheduler started");
    }

    pub fn stop(&mut self) {
        if self.next_tick_ms.take().is_some() {
            info!("Event scheduler stopped");
        }
        self.bootstrap_at_ms = None;
    }

    /// End due events, then run the bootstrap and periodic trigger attempts.
    /// Returns the id of any event triggered this tick.
    pub fn tick(
        &mut self,
        now_ms: u64,
        ledger: &mut ResourceLedger,
        rng: &mut impl Rng,
        sink: &mut impl EventSink,
    ) -> Option<u64> {
        let due: Vec<u64> = self
            .active
            .iter()
            .filter(|e| e.end_time <= now_ms)
            .map(|e| e.id)
            .collect();
        for id in due {
            self.end_event(id, sink);
        }

        let mut triggered = None;
        if let Some(at) = self.bootstrap_at_ms
            && now_ms >= at
        {
            self.bootstrap_at_ms = None;
            triggered = self.trigger_random_event(now_ms, ledger, rng, sink);
        }

        if let Some(next) = self.next_tick_ms
            && now_ms >= next
        {
            let interval = self.config.interval_ms.max(1);
            let missed = (now_ms - next) / interval + 1;
            self.next_tick_ms = Some(next + missed * interval);
            if triggered.is_none() {
                triggered = self.trigger_random_event(now_ms, ledger, rng, sink);
            }
        }
        triggered
    }

    /// One trigger attempt: respect the cooldown, roll every definition
    /// independently and pick uniformly among those that pass.
    pub fn trigger_random_event(
        &mut self,
        now_ms: u64,
        ledger: &mut ResourceLedger,
        rng: &mut impl Rng,
        sink: &mut impl EventSink,
    ) -> Option<u64> {
        if let Some(last) = self.last_trigger_ms
            && now_ms.saturating_sub(last) < self.config.cooldown_ms
        {
            debug!(since_last_ms = now_ms.saturating_sub(last), "Event trigger in cooldown");
            return None;
        }

        let candidates: Vec<usize> = self
            .definitions
            .iter()
            .enumerate()
            .filter(|(_, def)| rng.r#gen::<f64>() < def.probability)
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let chosen = candidates[rng.gen_range(0..candidates.len())];
        Some(self.instantiate(chosen, now_ms, ledger, sink))
    }

    /// Trigger a specific definition, bypassing probability and cooldown.
    pub fn trigger_event(
        &mut self,
        definition_id: &str,
        now_ms: u64,
        ledger: &mut ResourceLedger,
        sink: &mut impl EventSink,
    ) -> Option<u64> {
        let index = self.definitions.iter().position(|d| d.id == definition_id)?;
        Some(self.instantiate(index, now_ms, ledger, sink))
    }

    fn instantiate(
        &mut self,
        index: usize,
        now_ms: u64,
        ledger: &mut ResourceLedger,
        sink: &mut impl EventSink,
    ) -> u64 {
        let def = &self.definitions[index];
        self.id_counter += 1;
        let event = GameEvent {
            id: self.id_counter,
            definition_id: def.id.to_string(),
            name: def.name.to_string(),
            description: def.description.to_string(),
            icon: def.icon.to_string(),
            category: def.category,
            effects: def.effects.scaled(self.config.effect_scale),
            duration_ms: def.duration_ms,
            requires_response: def.requires_response,
            response_options: def.response_options.clone(),
            start_time: now_ms,
            end_time: now_ms + def.duration_ms,
            is_active: true,
            is_responded: false,
        };

        ledger.apply(event.effects);
        sink.event_triggered(&event);
        info!(
            event_id = event.id,
            definition = %event.definition_id,
            carbon = event.effects.carbon,
            biodiversity = event.effects.biodiversity,
            culture = event.effects.culture,
            "Event triggered"
        );
        self.last_trigger_ms = Some(now_ms);
        let id = event.id;
        self.active.push(event);
        id
    }

    /// Answer an event that requires a response. On any failure the ledger
    /// and the event are left untouched.
    pub fn respond_to_event(
        &mut self,
        event_id: u64,
        option_index: usize,
        now_ms: u64,
        ledger: &mut ResourceLedger,
        sink: &mut impl EventSink,
    ) -> Result<ResponseOption, ResponseError> {
        let Some(event) = self.active.iter_mut().find(|e| e.id == event_id) else {
            if self.history.iter().any(|e| e.id == event_id) {
                return Err(ResponseError::Expired(event_id));
            }
            return Err(ResponseError::NotFound(event_id));
        };
        if event.is_responded {
            return Err(ResponseError::AlreadyResponded(event_id));
        }
        if now_ms > event.end_time {
            return Err(ResponseError::Expired(event_id));
        }
        if !event.requires_response || event.response_options.is_empty() {
            return Err(ResponseError::NoResponseRequired(event_id));
        }
        let option = event
            .response_options
            .get(option_index)
            .cloned()
            .ok_or(ResponseError::UnknownOption {
                event_id,
                index: option_index,
            })?;

        let kind = option.cost.kind;
        let available = ledger.balance(kind);
        if !ledger.can_afford(kind, option.cost.amount) {
            warn!(
                event_id,
                resource = kind.label(),
                needed = option.cost.amount,
                available,
                "Insufficient resources to respond to event"
            );
            return Err(ResponseError::Insufficient {
                kind,
                needed: option.cost.amount,
                available,
            });
        }

        ledger.update(kind, -option.cost.amount);
        ledger.apply(option.effects);
        event.is_responded = true;
        event.effects = option.effects;
        sink.event_responded(event, &option);
        info!(event_id, response = %option.text, "Event answered");
        Ok(option)
    }

    /// Deactivate an event and move it to history. Returns false if it was
    /// not active.
    pub fn end_event(&mut self, event_id: u64, sink: &mut impl EventSink) -> bool {
        let Some(index) = self.active.iter().position(|e| e.id == event_id) else {
            return false;
        };
        let mut event = self.active.remove(index);
        event.is_active = false;
        sink.event_ended(&event);
        debug!(event_id, "Event ended");
        self.history.push_front(event);
        self.history.truncate(self.config.history_cap.max(1));
        true
    }

    /// Stop and forget every event.
    pub fn reset(&mut self) {
        self.stop();
        self.active.clear();
        self.history.clear();
        self.id_counter = 0;
        self.last_trigger_ms = None;
    }

    pub fn to_state(&self) -> EventState {
        EventState {
            active_events: self.active.clone(),
            event_history: self.history.iter().cloned().collect(),
            event_id_counter: self.id_counter,
            last_trigger_time: self.last_trigger_ms,
        }
    }

    pub fn restore_state(&mut self, state: EventState) {
        let max_id = state
            .active_events
            .iter()
            .chain(state.event_history.iter())
            .map(|e| e.id)
            .max()
            .unwrap_or(0);
        self.active = state.active_events.into_iter().filter(|e| e.is_active).collect();
        self.history = state.event_history.into_iter().collect();
        self.history.truncate(self.config.history_cap.max(1));
        self.id_counter = state.event_id_counter.max(max_id);
        self.last_trigger_ms = state.last_trigger_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[derive(Default)]
    struct Recorder {
        triggered: Vec<u64>,
        responded: Vec<(u64, String)>,
        ended: Vec<u64>,
    }

    impl EventSink for Recorder {
        fn event_triggered(&mut self, event: &GameEvent) {
            self.triggered.push(event.id);
        }
        fn event_responded(&mut self, event: &GameEvent, option: &ResponseOption) {
            self.responded.push((event.id, option.text.clone()));
        }
        fn event_ended(&mut self, event: &GameEvent) {
            self.ended.push(event.id);
        }
    }

    fn certain(id: &'static str, effects: Effects) -> EventDefinition {
        EventDefinition {
            id,
            name: id,
            description: "",
            icon: "",
            category: EventCategory::Special,
            effects,
            duration_ms: 10_000,
            probability: 1.0,
            requires_response: false,
            response_options: Vec::new(),
        }
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn builtin_catalog_has_five_events() {
        let defs = builtin_definitions();
        assert_eq!(defs.len(), 5);
        let weather = defs.iter().find(|d| d.id == "extreme_weather").unwrap();
        assert!(weather.requires_response);
        assert_eq!(weather.response_options[0].cost.amount, 120);
        assert_eq!(weather.response_options[1].effects, Effects::new(0, -10, -15));
    }

    #[test]
    fn trigger_applies_effects_and_notifies() {
        let defs = vec![certain("boost", Effects::new(-10, 4, 6))];
        let mut scheduler = EventScheduler::with_definitions(defs, SchedulerConfig::default());
        let mut ledger = ResourceLedger::new();
        let mut sink = Recorder::default();

        let id = scheduler
            .trigger_random_event(1_000, &mut ledger, &mut rng(), &mut sink)
            .unwrap();
        assert_eq!(ledger.carbon(), 990);
        assert_eq!(ledger.biodiversity(), 4);
        assert_eq!(sink.triggered, vec![id]);
        let event = scheduler.get(id).unwrap();
        assert_eq!(event.end_time, 11_000);
        assert!(event.is_active);
    }

    #[test]
    fn cooldown_blocks_second_trigger() {
        let defs = vec![certain("a", Effects::NONE)];
        let mut scheduler = EventScheduler::with_definitions(defs, SchedulerConfig::default());
        let mut ledger = ResourceLedger::new();
        let mut r = rng();
        assert!(scheduler.trigger_random_event(0, &mut ledger, &mut r, &mut ()).is_some());
        assert!(scheduler.trigger_random_event(29_999, &mut ledger, &mut r, &mut ()).is_none());
        assert!(scheduler.trigger_random_event(30_000, &mut ledger, &mut r, &mut ()).is_some());
    }

    #[test]
    fn zero_probability_never_triggers() {
        let mut def = certain("never", Effects::NONE);
        def.probability = 0.0;
        let mut scheduler = EventScheduler::with_definitions(vec![def], SchedulerConfig::default());
        let mut ledger = ResourceLedger::new();
        let mut r = rng();
        for t in 0..20 {
            assert!(
                scheduler
                    .trigger_random_event(t * 60_000, &mut ledger, &mut r, &mut ())
                    .is_none()
            );
        }
    }

    #[test]
    fn effects_are_scaled_at_trigger() {
        let config = SchedulerConfig {
            effect_scale: 2.0,
            ..SchedulerConfig::default()
        };
        let mut scheduler = EventScheduler::new(config);
        let mut ledger = ResourceLedger::new();
        let id = scheduler
            .trigger_event("eco_restoration", 0, &mut ledger, &mut ())
            .unwrap();
        assert_eq!(scheduler.get(id).unwrap().effects, Effects::new(-50, 40, 10));
        assert_eq!(ledger.carbon(), 950);
    }

    #[test]
    fn bootstrap_fires_once_after_delay() {
        let defs = vec![certain("a", Effects::NONE)];
        let mut scheduler = EventScheduler::with_definitions(defs, SchedulerConfig::default());
        let mut ledger = ResourceLedger::new();
        let mut r = rng();
        scheduler.start(0);
        assert!(scheduler.tick(4_999, &mut ledger, &mut r, &mut ()).is_none());
        assert!(scheduler.tick(5_000, &mut ledger, &mut r, &mut ()).is_some());
        // periodic tick at 60s is past the cooldown
        assert!(scheduler.tick(30_000, &mut ledger, &mut r, &mut ()).is_none());
        assert!(scheduler.tick(60_000, &mut ledger, &mut r, &mut ()).is_some());
        assert!(scheduler.tick(61_000, &mut ledger, &mut r, &mut ()).is_none());
    }

    #[test]
    fn stopped_scheduler_only_ends_events() {
        let defs = vec![certain("a", Effects::NONE)];
        let mut scheduler = EventScheduler::with_definitions(defs, SchedulerConfig::default());
        let mut ledger = ResourceLedger::new();
        let mut sink = Recorder::default();
        let mut r = rng();
        scheduler.start(0);
        scheduler.tick(5_000, &mut ledger, &mut r, &mut sink);
        scheduler.stop();
        assert!(!scheduler.is_running());
        assert!(scheduler.tick(120_000, &mut ledger, &mut r, &mut sink).is_none());
        assert_eq!(sink.triggered.len(), 1);
        assert_eq!(sink.ended, sink.triggered);
    }

    #[test]
    fn events_end_into_capped_history() {
        let config = SchedulerConfig {
            history_cap: 3,
            cooldown_ms: 0,
            ..SchedulerConfig::default()
        };
        let defs = vec![certain("a", Effects::NONE)];
        let mut scheduler = EventScheduler::with_definitions(defs, config);
        let mut ledger = ResourceLedger::new();
        let mut sink = Recorder::default();
        for t in 0..5 {
            scheduler.trigger_event("a", t, &mut ledger, &mut sink);
        }
        scheduler.tick(20_000, &mut ledger, &mut rng(), &mut sink);
        assert!(scheduler.active_events().is_empty());
        let ids: Vec<u64> = scheduler.history().map(|e| e.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
        assert!(scheduler.history().all(|e| !e.is_active));
        assert_eq!(sink.ended.len(), 5);
        assert!(!scheduler.end_event(1, &mut sink));
    }

    #[test]
    fn response_with_insufficient_funds_changes_nothing() {
        let mut scheduler = EventScheduler::new(SchedulerConfig::default());
        let mut ledger = ResourceLedger::with_carbon(50);
        let id = scheduler
            .trigger_event("extreme_weather", 0, &mut ledger, &mut ())
            .unwrap();
        let ledger_before = ledger.clone();
        let event_before = scheduler.get(id).unwrap().clone();
        // 50 + 50 = 100 carbon, option 0 costs 120
        let err = scheduler
            .respond_to_event(id, 0, 1_000, &mut ledger, &mut ())
            .unwrap_err();
        assert_eq!(
            err,
            ResponseError::Insufficient {
                kind: ResourceKind::Carbon,
                needed: 120,
                available: 100
            }
        );
        assert_eq!(ledger, ledger_before);
        assert_eq!(scheduler.get(id).unwrap(), &event_before);
    }

    #[test]
    fn response_deducts_cost_and_overwrites_effects() {
        let mut scheduler = EventScheduler::new(SchedulerConfig::default());
        let mut ledger = ResourceLedger::new();
        let mut sink = Recorder::default();
        let id = scheduler
            .trigger_event("extreme_weather", 0, &mut ledger, &mut sink)
            .unwrap();
        assert_eq!(ledger.carbon(), 1050);
        assert_eq!(ledger.biodiversity(), -15);

        let option = scheduler
            .respond_to_event(id, 0, 1_000, &mut ledger, &mut sink)
            .unwrap();
        assert_eq!(option.text, "Emergency response");
        assert_eq!(ledger.carbon(), 1050 - 120 - 30);
        assert_eq!(ledger.biodiversity(), -20);
        assert_eq!(ledger.culture(), -15);
        let event = scheduler.get(id).unwrap();
        assert!(event.is_responded);
        assert_eq!(event.effects, Effects::new(-30, -5, -5));
        assert_eq!(sink.responded, vec![(id, "Emergency response".to_string())]);

        assert_eq!(
            scheduler.respond_to_event(id, 1, 2_000, &mut ledger, &mut sink),
            Err(ResponseError::AlreadyResponded(id))
        );
    }

    #[test]
    fn response_validation_errors() {
        let mut scheduler = EventScheduler::new(SchedulerConfig::default());
        let mut ledger = ResourceLedger::new();
        let calm = scheduler
            .trigger_event("campus_activity", 0, &mut ledger, &mut ())
            .unwrap();
        let storm = scheduler
            .trigger_event("extreme_weather", 0, &mut ledger, &mut ())
            .unwrap();

        assert_eq!(
            scheduler.respond_to_event(calm, 0, 10, &mut ledger, &mut ()),
            Err(ResponseError::NoResponseRequired(calm))
        );
        assert_eq!(
            scheduler.respond_to_event(storm, 5, 10, &mut ledger, &mut ()),
            Err(ResponseError::UnknownOption {
                event_id: storm,
                index: 5
            })
        );
        assert_eq!(
            scheduler.respond_to_event(storm, 1, 60_001, &mut ledger, &mut ()),
            Err(ResponseError::Expired(storm))
        );
        assert_eq!(
            scheduler.respond_to_event(99, 0, 10, &mut ledger, &mut ()),
            Err(ResponseError::NotFound(99))
        );
    }

    #[test]
    fn state_round_trip_preserves_ids() {
        let mut scheduler = EventScheduler::new(SchedulerConfig::default());
        let mut ledger = ResourceLedger::new();
        scheduler.trigger_event("green_investment", 0, &mut ledger, &mut ());
        scheduler.trigger_event("special_visitor", 0, &mut ledger, &mut ());
        scheduler.end_event(1, &mut ());

        let json = serde_json::to_string(&scheduler.to_state()).unwrap();
        assert!(json.contains("\"activeEvents\""));
        assert!(json.contains("\"definitionId\""));
        let state: EventState = serde_json::from_str(&json).unwrap();

        let mut restored = EventScheduler::new(SchedulerConfig::default());
        restored.restore_state(state);
        assert_eq!(restored.active_events().len(), 1);
        assert_eq!(restored.history().count(), 1);
        let next = restored
            .trigger_event("campus_activity", 100_000, &mut ledger, &mut ())
            .unwrap();
        assert_eq!(next, 3);
    }
}
