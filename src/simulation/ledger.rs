use serde::{Deserialize, Serialize};

pub const DEFAULT_CARBON: i64 = 1000;

// === Resource kinds and deltas ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Carbon,
    Biodiversity,
    Culture,
}

impl ResourceKind {
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Carbon => "carbon",
            ResourceKind::Biodiversity => "biodiversity",
            ResourceKind::Culture => "culture",
        }
    }
}

/// A signed change to all three metrics at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effects {
    #[serde(default)]
    pub carbon: i64,
    #[serde(default)]
    pub biodiversity: i64,
    #[serde(default)]
    pub culture: i64,
}

impl Effects {
    pub const NONE: Effects = Effects {
        carbon: 0,
        biodiversity: 0,
        culture: 0,
    };

    pub fn new(carbon: i64, biodiversity: i64, culture: i64) -> Self {
        Effects {
            carbon,
            biodiversity,
            culture,
        }
    }

    pub fn negated(self) -> Self {
        Effects::new(-self.carbon, -self.biodiversity, -self.culture)
    }

    /// Multiply every component, rounding half away from zero.
    pub fn scaled(self, factor: f64) -> Self {
        let scale = |v: i64| (v as f64 * factor).round() as i64;
        Effects::new(
            scale(self.carbon),
            scale(self.biodiversity),
            scale(self.culture),
        )
    }

    pub fn get(&self, kind: ResourceKind) -> i64 {
        match kind {
            ResourceKind::Carbon => self.carbon,
            ResourceKind::Biodiversity => self.biodiversity,
            ResourceKind::Culture => self.culture,
        }
    }
}

// === Ledger ===

/// The three tracked city metrics. All mutation goes through the `update_*`
/// methods so callers can't bypass the carbon funds hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLedger {
    #[serde(default = "default_carbon")]
    carbon: i64,
    #[serde(default)]
    biodiversity: i64,
    #[serde(default)]
    culture: i64,
}

fn default_carbon() -> i64 {
    DEFAULT_CARBON
}

impl Default for ResourceLedger {
    fn default() -> Self {
        ResourceLedger::with_carbon(DEFAULT_CARBON)
    }
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_carbon(carbon: i64) -> Self {
        ResourceLedger {
            carbon,
            biodiversity: 0,
            culture: 0,
        }
    }

    pub fn carbon(&self) -> i64 {
        self.carbon
    }

    pub fn biodiversity(&self) -> i64 {
        self.biodiversity
    }

    pub fn culture(&self) -> i64 {
        self.culture
    }

    pub fn balance(&self, kind: ResourceKind) -> i64 {
        match kind {
            ResourceKind::Carbon => self.carbon,
            ResourceKind::Biodiversity => self.biodiversity,
            ResourceKind::Culture => self.culture,
        }
    }

    pub fn can_afford(&self, kind: ResourceKind, amount: i64) -> bool {
        self.balance(kind) >= amount
    }

    /// Weighted score: `round((carbon*0.4 + biodiversity*0.3 + culture*0.3) / 10)`,
    /// with halves rounded toward positive infinity.
    pub fn total_score(&self) -> i64 {
        let raw = self.carbon as f64 * 0.4
            + self.biodiversity as f64 * 0.3
            + self.culture as f64 * 0.3;
        (raw / 10.0 + 0.5).floor() as i64
    }

    /// Applies `delta` unconditionally and reports whether the balance is still
    /// non-negative. A `false` return is a hint only; nothing is rolled back.
    pub fn update_carbon(&mut self, delta: i64) -> bool {
        self.carbon += delta;
        self.carbon >= 0
    }

    pub fn update_biodiversity(&mut self, delta: i64) {
        self.biodiversity += delta;
    }

    pub fn update_culture(&mut self, delta: i64) {
        self.culture += delta;
    }

    pub fn update(&mut self, kind: ResourceKind, delta: i64) {
        match kind {
            ResourceKind::Carbon => {
                self.update_carbon(delta);
            }
            ResourceKind::Biodiversity => self.update_biodiversity(delta),
            ResourceKind::Culture => self.update_culture(delta),
        }
    }

    pub fn apply(&mut self, effects: Effects) {
        if effects.carbon != 0 {
            self.update_carbon(effects.carbon);
        }
        if effects.biodiversity != 0 {
            self.update_biodiversity(effects.biodiversity);
        }
        if effects.culture != 0 {
            self.update_culture(effects.culture);
        }
    }

    /// Zero biodiversity and culture. Carbon is left alone; restart flows
    /// reset it separately.
    pub fn reset_stats(&mut self) {
        self.biodiversity = 0;
        self.culture = 0;
    }

    pub fn restart(&mut self, starting_carbon: i64) {
        self.carbon = starting_carbon;
        self.reset_stats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_thousand_carbon() {
        let ledger = ResourceLedger::new();
        assert_eq!(ledger.carbon(), 1000);
        assert_eq!(ledger.biodiversity(), 0);
        assert_eq!(ledger.culture(), 0);
    }

    #[test]
    fn total_score_weights_metrics() {
        let mut ledger = ResourceLedger::new();
        assert_eq!(ledger.total_score(), 40);
        ledger.update_biodiversity(100);
        ledger.update_culture(50);
        // (400 + 30 + 15) / 10 = 44.5 -> 45
        assert_eq!(ledger.total_score(), 45);
    }

    #[test]
    fn update_carbon_applies_even_when_negative() {
        let mut ledger = ResourceLedger::with_carbon(50);
        assert!(!ledger.update_carbon(-80));
        assert_eq!(ledger.carbon(), -30);
        assert!(ledger.update_carbon(30));
        assert_eq!(ledger.carbon(), 0);
    }

    #[test]
    fn reset_stats_keeps_carbon() {
        let mut ledger = ResourceLedger::with_carbon(700);
        ledger.update_biodiversity(12);
        ledger.update_culture(-4);
        ledger.reset_stats();
        assert_eq!(ledger.carbon(), 700);
        assert_eq!(ledger.biodiversity(), 0);
        assert_eq!(ledger.culture(), 0);

        ledger.restart(1000);
        assert_eq!(ledger.carbon(), 1000);
    }

    #[test]
    fn apply_effects_and_balances() {
        let mut ledger = ResourceLedger::new();
        ledger.apply(Effects::new(-25, 20, 5));
        assert_eq!(ledger.balance(ResourceKind::Carbon), 975);
        assert_eq!(ledger.balance(ResourceKind::Biodiversity), 20);
        assert_eq!(ledger.balance(ResourceKind::Culture), 5);
        assert!(ledger.can_afford(ResourceKind::Biodiversity, 20));
        assert!(!ledger.can_afford(ResourceKind::Culture, 6));
    }

    #[test]
    fn effects_scale_and_negate() {
        let e = Effects::new(10, -15, 3);
        assert_eq!(e.scaled(2.0), Effects::new(20, -30, 6));
        assert_eq!(e.scaled(0.5), Effects::new(5, -8, 2));
        assert_eq!(e.negated(), Effects::new(-10, 15, -3));
        assert_eq!(e.get(ResourceKind::Biodiversity), -15);
    }

    #[test]
    fn ledger_json_layout() {
        let ledger: ResourceLedger = serde_json::from_str(r#"{"biodiversity": 3}"#).unwrap();
        assert_eq!(ledger.carbon(), 1000);
        assert_eq!(ledger.biodiversity(), 3);
        let json = serde_json::to_string(&ledger).unwrap();
        assert_eq!(json, r#"{"carbon":1000,"biodiversity":3,"culture":0}"#);
    }
}
