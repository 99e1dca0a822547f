use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::simulation::events::{EventSink, GameEvent, ResponseOption};

pub const ACTIVE_CAP: usize = 10;
pub const HISTORY_CAP: usize = 50;
pub const DEFAULT_DURATION_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
    Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: u64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NoticeKind,
    #[serde(default)]
    pub icon: Option<String>,
    pub requires_action: bool,
    pub is_handled: bool,
    pub duration_ms: u64,
    pub timestamp: u64,
    #[serde(default)]
    pub event: Option<GameEvent>,
}

impl Notice {
    fn expired(&self, now_ms: u64) -> bool {
        self.duration_ms > 0
            && !self.requires_action
            && now_ms >= self.timestamp.saturating_add(self.duration_ms)
    }
}

/// Builder for a notice before it gets an id and timestamp.
#[derive(Debug, Clone)]
pub struct NewNotice {
    kind: NoticeKind,
    title: String,
    message: String,
    icon: Option<String>,
    requires_action: bool,
    duration_ms: u64,
    event: Option<GameEvent>,
}

impl NewNotice {
    pub fn new(kind: NoticeKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        NewNotice {
            kind,
            title: title.into(),
            message: message.into(),
            icon: None,
            requires_action: false,
            duration_ms: DEFAULT_DURATION_MS,
            event: None,
        }
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn requires_action(mut self, requires: bool) -> Self {
        self.requires_action = requires;
        self
    }

    /// 0 disables auto-dismiss.
    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn event(mut self, event: GameEvent) -> Self {
        self.event = Some(event);
        self
    }
}

/// Persisted board state, stored under the `notices` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeState {
    #[serde(default)]
    pub notices: Vec<Notice>,
    #[serde(default)]
    pub notice_history: Vec<Notice>,
    #[serde(default)]
    pub notice_id_counter: u64,
}

/// Player-facing notifications: a short active list plus a longer history.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    active: VecDeque<Notice>,
    /// Newest first.
    history: VecDeque<Notice>,
    id_counter: u64,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, draft: NewNotice, now_ms: u64) -> u64 {
        self.id_counter += 1;
        let notice = Notice {
            id: self.id_counter,
            title: draft.title,
            message: draft.message,
            kind: draft.kind,
            icon: draft.icon,
            requires_action: draft.requires_action,
            is_handled: false,
            duration_ms: draft.duration_ms,
            timestamp: now_ms,
            event: draft.event,
        };
        debug!(notice_id = notice.id, kind = ?notice.kind, title = %notice.title, "Notice posted");
        self.active.push_back(notice);
        while self.active.len() > ACTIVE_CAP {
            self.active.pop_front();
        }
        self.id_counter
    }

    pub fn info(&mut self, title: &str, message: &str, now_ms: u64) -> u64 {
        self.push(NewNotice::new(NoticeKind::Info, title, message), now_ms)
    }

    pub fn success(&mut self, title: &str, message: &str, now_ms: u64) -> u64 {
        self.push(NewNotice::new(NoticeKind::Success, title, message), now_ms)
    }

    pub fn warning(&mut self, title: &str, message: &str, now_ms: u64) -> u64 {
        self.push(NewNotice::new(NoticeKind::Warning, title, message), now_ms)
    }

    pub fn error(&mut self, title: &str, message: &str, now_ms: u64) -> u64 {
        self.push(NewNotice::new(NoticeKind::Error, title, message), now_ms)
    }

    pub fn active(&self) -> impl Iterator<Item = &Notice> {
        self.active.iter()
    }

    pub fn history(&self) -> impl Iterator<Item = &Notice> {
        self.history.iter()
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.active.back()
    }

    pub fn unhandled_count(&self) -> usize {
        self.active
            .iter()
            .filter(|n| n.requires_action && !n.is_handled)
            .count()
    }

    /// Move a notice from the active list to history.
    pub fn remove(&mut self, notice_id: u64) -> bool {
        let Some(index) = self.active.iter().position(|n| n.id == notice_id) else {
            return false;
        };
        if let Some(notice) = self.active.remove(index) {
            self.archive(notice);
        }
        true
    }

    fn archive(&mut self, notice: Notice) {
        self.history.push_front(notice);
        self.history.truncate(HISTORY_CAP);
    }

    pub fn mark_handled(&mut self, notice_id: u64) -> bool {
        match self.active.iter_mut().find(|n| n.id == notice_id) {
            Some(notice) => {
                notice.is_handled = true;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        while let Some(notice) = self.active.pop_front() {
            self.archive(notice);
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Auto-dismiss expired notices. Returns how many were dismissed.
    pub fn tick(&mut self, now_ms: u64) -> usize {
        let expired: Vec<u64> = self
            .active
            .iter()
            .filter(|n| n.expired(now_ms))
            .map(|n| n.id)
            .collect();
        for id in &expired {
            self.remove(*id);
        }
        expired.len()
    }

    fn event_copies_mut(&mut self, event_id: u64) -> impl Iterator<Item = &mut GameEvent> {
        self.active
            .iter_mut()
            .chain(self.history.iter_mut())
            .filter_map(|n| n.event.as_mut())
            .filter(move |e| e.id == event_id)
    }

    pub fn to_state(&self) -> NoticeState {
        NoticeState {
            notices: self.active.iter().cloned().collect(),
            notice_history: self.history.iter().cloned().collect(),
            notice_id_counter: self.id_counter,
        }
    }

    pub fn restore_state(&mut self, state: NoticeState) {
        let max_id = state
            .notices
            .iter()
            .chain(state.notice_history.iter())
            .map(|n| n.id)
            .max()
            .unwrap_or(0);
        self.active = state.notices.into_iter().collect();
        while self.active.len() > ACTIVE_CAP {
            self.active.pop_front();
        }
        self.history = state.notice_history.into_iter().collect();
        self.history.truncate(HISTORY_CAP);
        self.id_counter = state.notice_id_counter.max(max_id);
    }
}

impl EventSink for NoticeBoard {
    fn event_triggered(&mut self, event: &GameEvent) {
        let draft = NewNotice::new(
            NoticeKind::Event,
            event.name.clone(),
            format!("{} {}: {}", event.icon, event.name, event.description),
        )
        .icon(event.icon.clone())
        .requires_action(event.requires_response)
        .event(event.clone());
        self.push(draft, event.start_time);
    }

    fn event_responded(&mut self, event: &GameEvent, option: &ResponseOption) {
        for copy in self.event_copies_mut(event.id) {
            copy.is_responded = true;
            copy.effects = option.effects;
        }
        for notice in self.active.iter_mut() {
            if notice.event.as_ref().is_some_and(|e| e.id == event.id) {
                notice.is_handled = true;
            }
        }
    }

    fn event_ended(&mut self, event: &GameEvent) {
        for copy in self.event_copies_mut(event.id) {
            copy.is_active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::events::{EventScheduler, SchedulerConfig};
    use crate::simulation::ledger::{Effects, ResourceLedger};

    #[test]
    fn active_list_is_capped() {
        let mut board = NoticeBoard::new();
        for i in 0..12 {
            board.info("n", &format!("message {}", i), 0);
        }
        assert_eq!(board.active().count(), ACTIVE_CAP);
        assert_eq!(board.active().next().unwrap().message, "message 2");
        assert_eq!(board.latest().unwrap().message, "message 11");
        assert_eq!(board.history().count(), 0);
    }

    #[test]
    fn history_is_newest_first_and_capped() {
        let mut board = NoticeBoard::new();
        for i in 0..60 {
            let id = board.warning("w", &i.to_string(), 0);
            board.remove(id);
        }
        assert_eq!(board.history().count(), HISTORY_CAP);
        assert_eq!(board.history().next().unwrap().message, "59");
    }

    #[test]
    fn auto_dismiss_skips_action_notices() {
        let mut board = NoticeBoard::new();
        board.info("a", "fades", 1_000);
        board.push(
            NewNotice::new(NoticeKind::Warning, "b", "stays").requires_action(true),
            1_000,
        );
        board.push(NewNotice::new(NoticeKind::Info, "c", "sticky").duration_ms(0), 1_000);

        assert_eq!(board.tick(5_999), 0);
        assert_eq!(board.tick(6_000), 1);
        assert_eq!(board.active().count(), 2);
        assert_eq!(board.unhandled_count(), 1);
        assert_eq!(board.history().next().unwrap().message, "fades");
    }

    #[test]
    fn mark_handled_and_clear() {
        let mut board = NoticeBoard::new();
        let id = board.push(
            NewNotice::new(NoticeKind::Error, "x", "y").requires_action(true),
            0,
        );
        assert!(board.mark_handled(id));
        assert_eq!(board.unhandled_count(), 0);
        board.success("ok", "done", 0);
        board.clear();
        assert_eq!(board.active().count(), 0);
        assert_eq!(board.history().count(), 2);
        board.clear_history();
        assert_eq!(board.history().count(), 0);
        assert!(!board.mark_handled(id));
    }

    #[test]
    fn event_copies_follow_scheduler_transitions() {
        let mut scheduler = EventScheduler::new(SchedulerConfig::default());
        let mut ledger = ResourceLedger::new();
        let mut board = NoticeBoard::new();

        let id = scheduler
            .trigger_event("extreme_weather", 0, &mut ledger, &mut board)
            .unwrap();
        let notice = board.latest().unwrap();
        assert_eq!(notice.kind, NoticeKind::Event);
        assert!(notice.requires_action);
        assert_eq!(board.unhandled_count(), 1);

        scheduler
            .respond_to_event(id, 1, 10, &mut ledger, &mut board)
            .unwrap();
        let copy = board.latest().unwrap().event.as_ref().unwrap();
        assert!(copy.is_responded);
        assert_eq!(copy.effects, Effects::new(0, -10, -15));
        assert_eq!(copy, scheduler.get(id).unwrap());
        assert_eq!(board.unhandled_count(), 0);

        board.clear();
        scheduler.end_event(id, &mut board);
        let archived = board.history().next().unwrap().event.as_ref().unwrap();
        assert!(!archived.is_active);
        assert_eq!(archived, scheduler.get(id).unwrap());
    }

    #[test]
    fn state_round_trip() {
        let mut board = NoticeBoard::new();
        board.info("a", "b", 5);
        let gone = board.info("c", "d", 5);
        board.remove(gone);

        let json = serde_json::to_string(&board.to_state()).unwrap();
        assert!(json.contains("\"noticeHistory\""));
        assert!(json.contains("\"type\":\"info\""));
        let mut restored = NoticeBoard::new();
        restored.restore_state(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.active().count(), 1);
        assert_eq!(restored.history().count(), 1);
        assert_eq!(restored.info("e", "f", 6), 3);
    }
}
