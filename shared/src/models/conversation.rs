//! Conversation session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DetectionContext, DetectionParseError, LocationContext};
use crate::validation::validate_zipcode;

/// Lifecycle of a recommendation session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    AwaitingDetection,
    AwaitingLocation,
    MenuActive,
    CustomQuestion,
    Terminated,
}

impl SessionState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionState::Terminated)
    }

    /// Menu selections and questions are accepted in these states
    pub fn accepts_turns(&self) -> bool {
        matches!(self, SessionState::MenuActive | SessionState::CustomQuestion)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Init => write!(f, "INIT"),
            SessionState::AwaitingDetection => write!(f, "AWAITING_DETECTION"),
            SessionState::AwaitingLocation => write!(f, "AWAITING_LOCATION"),
            SessionState::MenuActive => write!(f, "MENU_ACTIVE"),
            SessionState::CustomQuestion => write!(f, "CUSTOM_QUESTION"),
            SessionState::Terminated => write!(f, "TERMINATED"),
        }
    }
}

/// Piece of context an action needs before it can run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingContext {
    Detection,
    Location,
}

impl std::fmt::Display for MissingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingContext::Detection => write!(f, "detection"),
            MissingContext::Location => write!(f, "location"),
        }
    }
}

/// The six recommendation menu actions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MenuAction {
    /// 1 - treatment recommendations with product links
    Treatment,
    /// 2 - how the local soil affects the problem and its treatment
    SoilImpact,
    /// 3 - application timing from the forecast
    WeatherTiming,
    /// 4 - monitoring and prevention
    MonitoringPrevention,
    /// 5 - sections 1-4 in one report
    DetailedReport,
    /// 6 - switch to free-text questions
    CustomQuestion,
}

impl MenuAction {
    pub const ALL: [MenuAction; 6] = [
        MenuAction::Treatment,
        MenuAction::SoilImpact,
        MenuAction::WeatherTiming,
        MenuAction::MonitoringPrevention,
        MenuAction::DetailedReport,
        MenuAction::CustomQuestion,
    ];

    pub fn from_selection(selection: u32) -> Option<Self> {
        match selection {
            1 => Some(MenuAction::Treatment),
            2 => Some(MenuAction::SoilImpact),
            3 => Some(MenuAction::WeatherTiming),
            4 => Some(MenuAction::MonitoringPrevention),
            5 => Some(MenuAction::DetailedReport),
            6 => Some(MenuAction::CustomQuestion),
            _ => None,
        }
    }

    pub fn selection(&self) -> u32 {
        match self {
            MenuAction::Treatment => 1,
            MenuAction::SoilImpact => 2,
            MenuAction::WeatherTiming => 3,
            MenuAction::MonitoringPrevention => 4,
            MenuAction::DetailedReport => 5,
            MenuAction::CustomQuestion => 6,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::Treatment => "Treatment Recommendations (with product links)",
            MenuAction::SoilImpact => "Detailed Soil Impact",
            MenuAction::WeatherTiming => "Weather-Based Timing",
            MenuAction::MonitoringPrevention => "Monitoring & Prevention",
            MenuAction::DetailedReport => "Detailed Report (All recommendations)",
            MenuAction::CustomQuestion => "Ask Custom Question",
        }
    }

    /// Context that must be stored before the action may run
    pub fn required_context(&self) -> &'static [MissingContext] {
        &[MissingContext::Detection, MissingContext::Location]
    }
}

/// Menu lines in display order
pub fn menu_options() -> Vec<String> {
    MenuAction::ALL
        .iter()
        .map(|a| format!("{}. {}", a.selection(), a.label()))
        .collect()
}

/// Infestation level volunteered by the user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InfestationLevel {
    Low,
    Moderate,
    Heavy,
}

impl InfestationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfestationLevel::Low => "low",
            InfestationLevel::Moderate => "moderate",
            InfestationLevel::Heavy => "heavy",
        }
    }
}

impl std::fmt::Display for InfestationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One exchange in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// 1-based position in submission order
    pub turn_index: usize,
    pub user_input: String,
    pub response: String,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only record of conversation turns
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return it; earlier entries are never touched
    pub fn record(
        &mut self,
        user_input: impl Into<String>,
        response: impl Into<String>,
    ) -> &HistoryEntry {
        let entry = HistoryEntry {
            turn_index: self.entries.len() + 1,
            user_input: user_input.into(),
            response: response.into(),
            recorded_at: Utc::now(),
        };
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Turn indices must run 1..=N in stored order
    pub fn validate(&self) -> Result<(), StoreError> {
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.turn_index != i + 1 {
                return Err(StoreError::HistoryOrder {
                    position: i + 1,
                    found: entry.turn_index,
                });
            }
        }
        Ok(())
    }
}

/// A stored context that breaks one of the model invariants
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("invalid detection: {0}")]
    Detection(#[from] DetectionParseError),

    #[error("location zip code '{zipcode}': {message}")]
    Location { zipcode: String, message: &'static str },

    #[error("history entry {position} has turn_index {found}")]
    HistoryOrder { position: usize, found: usize },
}

/// Everything a session has learned so far
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecommendationContextStore {
    detection: Option<DetectionContext>,
    location: Option<LocationContext>,
    infestation_level: Option<InfestationLevel>,
    history: ConversationHistory,
}

impl RecommendationContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detection(&self) -> Option<&DetectionContext> {
        self.detection.as_ref()
    }

    pub fn location(&self) -> Option<&LocationContext> {
        self.location.as_ref()
    }

    pub fn infestation_level(&self) -> Option<InfestationLevel> {
        self.infestation_level
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Replace the stored detection; returns the previous one
    pub fn set_detection(&mut self, detection: DetectionContext) -> Option<DetectionContext> {
        self.detection.replace(detection)
    }

    /// Replace the stored location; returns the previous one
    pub fn set_location(&mut self, location: LocationContext) -> Option<LocationContext> {
        self.location.replace(location)
    }

    pub fn set_infestation_level(&mut self, level: InfestationLevel) {
        self.infestation_level = Some(level);
    }

    pub fn record_turn(
        &mut self,
        user_input: impl Into<String>,
        response: impl Into<String>,
    ) -> &HistoryEntry {
        self.history.record(user_input, response)
    }

    /// Checks a store handed back by a client before it is trusted again
    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(detection) = &self.detection {
            detection.validate()?;
        }
        if let Some(location) = &self.location {
            validate_zipcode(&location.zipcode).map_err(|message| StoreError::Location {
                zipcode: location.zipcode.clone(),
                message,
            })?;
        }
        self.history.validate()
    }

    /// First piece of context from `required` that is not stored yet
    pub fn first_missing(&self, required: &[MissingContext]) -> Option<MissingContext> {
        required.iter().copied().find(|piece| match piece {
            MissingContext::Detection => self.detection.is_none(),
            MissingContext::Location => self.location.is_none(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_selection_roundtrip() {
        for action in MenuAction::ALL {
            assert_eq!(MenuAction::from_selection(action.selection()), Some(action));
        }
        assert_eq!(MenuAction::from_selection(0), None);
        assert_eq!(MenuAction::from_selection(7), None);
    }

    #[test]
    fn test_menu_options_are_numbered() {
        let options = menu_options();
        assert_eq!(options.len(), 6);
        assert!(options[0].starts_with("1. Treatment"));
        assert!(options[5].starts_with("6. Ask Custom Question"));
    }

    #[test]
    fn test_history_is_append_only_and_ordered() {
        let mut history = ConversationHistory::new();
        history.record("1", "treatment answer");
        history.record("why now?", "because");
        history.record("3", "timing answer");

        let indices: Vec<usize> = history.entries().iter().map(|e| e.turn_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(history.entries()[1].user_input, "why now?");
        assert!(history.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_tampered_store() {
        let store: RecommendationContextStore = serde_json::from_value(serde_json::json!({
            "detection": null,
            "location": null,
            "infestation_level": null,
            "history": [
                {"turn_index": 9, "user_input": "1", "response": "a", "recorded_at": "2024-05-01T12:00:00Z"}
            ]
        }))
        .unwrap();
        assert_eq!(
            store.validate(),
            Err(StoreError::HistoryOrder { position: 1, found: 9 })
        );

        let mut store = RecommendationContextStore::new();
        let mut detection = DetectionContext::new(
            crate::models::SubjectType::Pest,
            "aphid",
            "tomato",
            crate::models::Severity::Low,
            Some(0.5),
        )
        .unwrap();
        store.set_detection(detection.clone());
        store.record_turn("1", "treatment answer");
        assert!(store.validate().is_ok());

        detection.confidence = Some(7.5);
        store.set_detection(detection.clone());
        assert!(matches!(store.validate(), Err(StoreError::Detection(_))));

        detection.confidence = Some(0.5);
        detection.pest_or_disease = String::new();
        store.set_detection(detection);
        assert!(matches!(store.validate(), Err(StoreError::Detection(_))));
    }

    #[test]
    fn test_first_missing_reports_detection_before_location() {
        let store = RecommendationContextStore::new();
        let all = MenuAction::Treatment.required_context();
        assert_eq!(store.first_missing(all), Some(MissingContext::Detection));
        assert_eq!(
            store.first_missing(&[MissingContext::Location]),
            Some(MissingContext::Location)
        );
    }

    #[test]
    fn test_state_display_matches_protocol_names() {
        assert_eq!(SessionState::MenuActive.to_string(), "MENU_ACTIVE");
        assert!(SessionState::CustomQuestion.accepts_turns());
        assert!(!SessionState::AwaitingLocation.accepts_turns());
    }
}
