use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::simulation::events::ResponseOption;
use crate::simulation::ledger::ResourceLedger;

pub const LOW_CARBON: i64 = 500;
pub const LOW_BIODIVERSITY: i64 = 50;
pub const LOW_CULTURE: i64 = 50;

// === Wire types ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryRequest {
    pub carbon: i64,
    pub biodiversity: i64,
    pub culture: i64,
    pub total_score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
}

impl AdvisoryRequest {
    pub fn from_ledger(ledger: &ResourceLedger) -> Self {
        AdvisoryRequest {
            carbon: ledger.carbon(),
            biodiversity: ledger.biodiversity(),
            culture: ledger.culture(),
            total_score: ledger.total_score(),
            balance: None,
        }
    }

    pub fn with_balance(mut self, balance: i64) -> Self {
        self.balance = Some(balance);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    #[default]
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryWarning {
    pub level: WarningLevel,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metric: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorySuggestion {
    pub priority: SuggestionPriority,
    pub category: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryReport {
    #[serde(default)]
    pub warnings: Vec<AdvisoryWarning>,
    #[serde(default)]
    pub suggestions: Vec<AdvisorySuggestion>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub trend: Trend,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

impl AdvisoryReport {
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.suggestions.is_empty()
    }

    pub fn warnings_at(&self, level: WarningLevel) -> impl Iterator<Item = &AdvisoryWarning> {
        self.warnings.iter().filter(move |w| w.level == level)
    }

    pub fn suggestions_at(
        &self,
        priority: SuggestionPriority,
    ) -> impl Iterator<Item = &AdvisorySuggestion> {
        self.suggestions.iter().filter(move |s| s.priority == priority)
    }

    pub fn has_critical_warnings(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w.level, WarningLevel::Critical | WarningLevel::High))
    }
}

// === Service ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryError {
    Unavailable,
    Transport(String),
    InvalidResponse(String),
}

impl std::fmt::Display for AdvisoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvisoryError::Unavailable => write!(f, "Advisory service is not configured"),
            AdvisoryError::Transport(e) => write!(f, "Advisory request failed: {}", e),
            AdvisoryError::InvalidResponse(e) => write!(f, "Invalid advisory response: {}", e),
        }
    }
}

impl std::error::Error for AdvisoryError {}

/// Remote analysis of the city's metrics. Transports live outside the core.
pub trait AdvisoryService {
    fn fetch(&mut self, request: &AdvisoryRequest) -> Result<AdvisoryReport, AdvisoryError>;
}

/// A service that is never reachable, so the board always uses local rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineAdvisory;

impl AdvisoryService for OfflineAdvisory {
    fn fetch(&mut self, _request: &AdvisoryRequest) -> Result<AdvisoryReport, AdvisoryError> {
        Err(AdvisoryError::Unavailable)
    }
}

/// Threshold rules used when the service cannot be reached.
pub fn local_advisory(request: &AdvisoryRequest) -> AdvisoryReport {
    let mut report = AdvisoryReport::default();

    if request.carbon < LOW_CARBON {
        report.warnings.push(AdvisoryWarning {
            level: WarningLevel::High,
            kind: "ecology".to_string(),
            title: "Carbon credits running low".to_string(),
            message: format!(
                "Carbon credits are at {}; build more green space",
                request.carbon
            ),
            metric: "carbon".to_string(),
        });
        report.suggestions.push(AdvisorySuggestion {
            priority: SuggestionPriority::High,
            category: "ecology".to_string(),
            title: "Add more greenery".to_string(),
            description: "Plant lawns and shrubs or build ponds to earn carbon credits".to_string(),
            action: "Fill empty plots with green tiles".to_string(),
        });
    }

    if request.biodiversity < LOW_BIODIVERSITY {
        report.warnings.push(AdvisoryWarning {
            level: WarningLevel::Medium,
            kind: "ecology".to_string(),
            title: "Biodiversity is low".to_string(),
            message: format!(
                "Biodiversity is at {}; diversify the landscape",
                request.biodiversity
            ),
            metric: "biodiversity".to_string(),
        });
    }

    if request.culture < LOW_CULTURE {
        report.warnings.push(AdvisoryWarning {
            level: WarningLevel::Medium,
            kind: "humanistic".to_string(),
            title: "Culture is low".to_string(),
            message: format!(
                "Culture is at {}; add campus buildings",
                request.culture
            ),
            metric: "culture".to_string(),
        });
    }

    report.summary = format!(
        "City status: carbon {}, biodiversity {}, culture {}, total score {}",
        request.carbon, request.biodiversity, request.culture, request.total_score
    );
    report.trend = Trend::Stable;
    report.next_steps = vec![
        "Raise carbon credits".to_string(),
        "Increase biodiversity".to_string(),
        "Build cultural facilities".to_string(),
    ];
    report
}

/// Weighted score used to pick an automatic event response.
pub fn response_score(option: &ResponseOption) -> f64 {
    -(option.effects.carbon as f64)
        + 1.2 * option.effects.biodiversity as f64
        + option.effects.culture as f64
        - 0.1 * option.cost.amount as f64
}

/// Index of the highest-scoring option; the first wins ties.
pub fn best_response(options: &[ResponseOption]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, option) in options.iter().enumerate() {
        let score = response_score(option);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

// === Board ===

/// Latest analysis plus its refresh schedule.
#[derive(Debug, Clone)]
pub struct AdvisoryBoard {
    report: AdvisoryReport,
    service_available: bool,
    last_error: Option<String>,
    last_update: Option<String>,
    has_new_analysis: bool,
    interval_ms: u64,
    last_refresh_ms: Option<u64>,
    running: bool,
}

impl AdvisoryBoard {
    pub fn new(interval_ms: u64) -> Self {
        AdvisoryBoard {
            report: AdvisoryReport::default(),
            service_available: true,
            last_error: None,
            last_update: None,
            has_new_analysis: false,
            interval_ms: interval_ms.max(1),
            last_refresh_ms: None,
            running: false,
        }
    }

    pub fn report(&self) -> &AdvisoryReport {
        &self.report
    }

    pub fn service_available(&self) -> bool {
        self.service_available
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_update(&self) -> Option<&str> {
        self.last_update.as_deref()
    }

    pub fn has_new_analysis(&self) -> bool {
        self.has_new_analysis
    }

    /// The player has looked at the latest analysis.
    pub fn mark_seen(&mut self) {
        self.has_new_analysis = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// First automatic refresh happens one interval after `now_ms`.
    pub fn start(&mut self, now_ms: u64) {
        self.running = true;
        self.last_refresh_ms = Some(now_ms);
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Fetch a fresh analysis, falling back to local rules on failure.
    pub fn refresh(&mut self, request: &AdvisoryRequest, service: &mut dyn AdvisoryService) -> &AdvisoryReport {
        let had_previous = self.last_update.is_some() && !self.report.is_empty();
        match service.fetch(request) {
            Ok(report) => {
                self.report = report;
                self.service_available = true;
                self.last_error = None;
                if had_previous {
                    self.has_new_analysis = true;
                }
                debug!(warnings = self.report.warnings.len(), "Advisory updated");
            }
            Err(e) => {
                warn!(error = %e, "Advisory service failed, using local rules");
                self.service_available = false;
                self.last_error = Some(e.to_string());
                self.report = local_advisory(request);
            }
        }
        self.last_update = Some(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true));
        &self.report
    }

    /// Refresh when running and the interval has elapsed. Returns whether a
    /// refresh happened.
    pub fn tick(
        &mut self,
        now_ms: u64,
        request: &AdvisoryRequest,
        service: &mut dyn AdvisoryService,
    ) -> bool {
        if !self.running {
            return false;
        }
        let due = self
            .last_refresh_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.interval_ms);
        if !due {
            return false;
        }
        self.last_refresh_ms = Some(now_ms);
        self.refresh(request, service);
        true
    }

    pub fn clear(&mut self) {
        self.report = AdvisoryReport::default();
        self.last_update = None;
        self.last_error = None;
        self.has_new_analysis = false;
        self.stop();
    }
}
