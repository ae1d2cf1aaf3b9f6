//! Pest and disease detection models
//!
//! The vision service answers with bullet lines of the form
//! `- **Label**: value`. This module turns that text into an immutable
//! [`DetectionContext`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value used when a plant is healthy and nothing was found
pub const NONE_DETECTED: &str = "none detected";

/// Value used when the plant could not be identified
pub const UNKNOWN_PLANT: &str = "unknown";

/// Raised when the vision service output cannot be turned into a detection
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Could not parse detection result: {0}")]
pub struct DetectionParseError(pub String);

/// Severity reported by the vision service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Moderate,
    High,
    #[default]
    Unknown,
}

impl Severity {
    /// Map a free-form severity word; anything unrecognized is `Unknown`
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        let word = label
            .split(|c: char| !c.is_alphanumeric())
            .find(|w| !w.is_empty())
            .unwrap_or("");
        match word {
            "mild" | "low" | "minor" | "light" => Severity::Low,
            "moderate" | "medium" => Severity::Moderate,
            "severe" | "high" | "heavy" | "critical" => Severity::High,
            _ => Severity::Unknown,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::High => write!(f, "high"),
            Severity::Unknown => write!(f, "unknown"),
        }
    }
}

/// What the image showed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Plant,
    Pest,
}

/// Snapshot of one completed pest/disease identification.
///
/// Never mutated after construction; refinements produce a new value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionContext {
    pub subject_type: SubjectType,
    pub pest_or_disease: String,
    pub plant_type: String,
    pub severity: Severity,
    /// `None` only when the service did not report a score
    pub confidence: Option<f32>,
    pub detected_at: DateTime<Utc>,
}

impl DetectionContext {
    pub fn new(
        subject_type: SubjectType,
        pest_or_disease: impl Into<String>,
        plant_type: impl Into<String>,
        severity: Severity,
        confidence: Option<f32>,
    ) -> Result<Self, DetectionParseError> {
        let context = Self {
            subject_type,
            pest_or_disease: pest_or_disease.into(),
            plant_type: plant_type.into(),
            severity,
            confidence,
            detected_at: Utc::now(),
        };
        context.validate()?;
        Ok(context)
    }

    /// Checks a context that did not come through [`new`](Self::new)
    pub fn validate(&self) -> Result<(), DetectionParseError> {
        if let Some(score) = self.confidence {
            if !(0.0..=1.0).contains(&score) {
                return Err(DetectionParseError(format!(
                    "confidence {} is outside [0, 1]",
                    score
                )));
            }
        }
        if self.pest_or_disease.trim().is_empty() {
            return Err(DetectionParseError(
                "no pest or disease identification".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse the raw text returned by the vision service
    pub fn parse(raw: &str) -> Result<Self, DetectionParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DetectionParseError("empty response".to_string()));
        }
        if raw.to_lowercase().starts_with("unable to identify") {
            return Err(DetectionParseError(
                "the image could not be identified".to_string(),
            ));
        }

        let fields = DetectionFields::from_text(raw);

        let (subject_type, pest_or_disease, plant_type) = if let Some(insect) = fields.insect {
            let plant = fields
                .plant
                .or_else(|| fields.crops.and_then(|c| first_item(&c)))
                .unwrap_or_else(|| UNKNOWN_PLANT.to_string());
            (SubjectType::Pest, insect, plant)
        } else if fields.plant.is_some() || fields.disease.is_some() || fields.health.is_some() {
            let plant = fields.plant.unwrap_or_else(|| UNKNOWN_PLANT.to_string());
            let healthy = fields
                .health
                .as_deref()
                .map(|h| h.to_lowercase().starts_with("healthy"))
                .unwrap_or(false);
            let finding = match fields.disease {
                Some(disease) => disease,
                None if healthy => NONE_DETECTED.to_string(),
                None => {
                    return Err(DetectionParseError(
                        "diseased plant reported without a disease name".to_string(),
                    ))
                }
            };
            (SubjectType::Plant, finding, plant)
        } else {
            return Err(DetectionParseError(
                "no plant species, disease or insect species found".to_string(),
            ));
        };

        let severity = fields
            .severity
            .as_deref()
            .map(Severity::from_label)
            .unwrap_or_default();

        let confidence = match fields.confidence {
            Some(text) => Some(parse_confidence(&text)?),
            None => None,
        };

        Self::new(subject_type, pest_or_disease, plant_type, severity, confidence)
    }

    /// New context with the plant type supplied by the user
    pub fn with_plant_type(&self, plant_type: impl Into<String>) -> Self {
        Self {
            plant_type: plant_type.into(),
            ..self.clone()
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.pest_or_disease == NONE_DETECTED
    }

    pub fn has_known_plant(&self) -> bool {
        self.plant_type != UNKNOWN_PLANT
    }
}

#[derive(Default)]
struct DetectionFields {
    plant: Option<String>,
    health: Option<String>,
    disease: Option<String>,
    severity: Option<String>,
    insect: Option<String>,
    crops: Option<String>,
    confidence: Option<String>,
}

impl DetectionFields {
    fn from_text(text: &str) -> Self {
        let mut fields = DetectionFields::default();
        for line in text.lines() {
            let Some((label, value)) = split_labelled_line(line) else {
                continue;
            };
            let Some(value) = meaningful(value) else {
                continue;
            };
            let slot = match label.as_str() {
                "plant species" | "plant" => &mut fields.plant,
                "health status" => &mut fields.health,
                "disease name" | "disease" => &mut fields.disease,
                "severity level" | "severity" => &mut fields.severity,
                "insect species" | "pest species" => &mut fields.insect,
                "crops affected" => &mut fields.crops,
                "confidence" | "confidence score" => &mut fields.confidence,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        fields
    }
}

/// Split `- **Label**: value` into a lowercase label and the raw value
fn split_labelled_line(line: &str) -> Option<(String, &str)> {
    let line = line.trim().trim_start_matches(['-', '*', '•']).trim_start();
    let (label, value) = line.split_once(':')?;
    let label = label.replace("**", "").trim().to_lowercase();
    if label.is_empty() {
        return None;
    }
    Some((label, value.trim_start_matches("**").trim()))
}

fn meaningful(value: &str) -> Option<String> {
    let value = value.trim().trim_matches('*').trim();
    match value.to_lowercase().as_str() {
        "" | "n/a" | "na" | "none" | "unknown" | "not applicable" => None,
        _ => Some(value.to_string()),
    }
}

fn first_item(list: &str) -> Option<String> {
    list.split([',', ';'])
        .map(str::trim)
        .find(|item| !item.is_empty())
        .map(str::to_string)
}

/// First number in the value, read as a fraction.
///
/// `87%` and a whole `87` are percentages. Anything else above 1 is rejected.
fn parse_confidence(text: &str) -> Result<f32, DetectionParseError> {
    let trimmed = text.trim();
    let unreadable = || DetectionParseError(format!("unreadable confidence '{}'", trimmed));

    let start = trimmed
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(unreadable)?;
    let token = &trimmed[start..];
    let len = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(token.len());
    let number = token[..len].trim_end_matches('.');
    let value: f32 = number.parse().map_err(|_| unreadable())?;
    let percent = token[len..].trim_start().starts_with('%');

    let value = if percent || (value > 1.0 && value <= 100.0 && value.fract() == 0.0) {
        value / 100.0
    } else {
        value
    };
    if !(0.0..=1.0).contains(&value) {
        return Err(DetectionParseError(format!(
            "confidence '{}' is outside [0, 1]",
            trimmed
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEST_RESPONSE: &str = "The image shows an insect.\n\
        - **Insect Species**: Green peach aphid (Myzus persicae)\n\
        - **Classification**: Pest\n\
        - **Crops Affected**: Tomato, pepper, potato\n\
        - **Severity Level**: Severe\n\
        - **Confidence**: 87%";

    const DISEASED_PLANT: &str = "- **Plant Species**: Tomato\n\
        - **Health Status**: Diseased\n\
        - **Disease Name**: Early blight\n\
        - **Severity Level**: Moderate\n\
        - **Confidence**: 0.74";

    #[test]
    fn test_parse_pest_response() {
        let ctx = DetectionContext::parse(PEST_RESPONSE).unwrap();
        assert_eq!(ctx.subject_type, SubjectType::Pest);
        assert_eq!(ctx.pest_or_disease, "Green peach aphid (Myzus persicae)");
        assert_eq!(ctx.plant_type, "Tomato");
        assert_eq!(ctx.severity, Severity::High);
        assert!((ctx.confidence.unwrap() - 0.87).abs() < 1e-6);
    }

    #[test]
    fn test_parse_diseased_plant() {
        let ctx = DetectionContext::parse(DISEASED_PLANT).unwrap();
        assert_eq!(ctx.subject_type, SubjectType::Plant);
        assert_eq!(ctx.pest_or_disease, "Early blight");
        assert_eq!(ctx.plant_type, "Tomato");
        assert_eq!(ctx.severity, Severity::Moderate);
        assert_eq!(ctx.confidence, Some(0.74));
    }

    #[test]
    fn test_healthy_plant_is_none_detected() {
        let ctx = DetectionContext::parse(
            "- **Plant Species**: Basil\n- **Health Status**: Healthy\n- **Disease Name**: N/A",
        )
        .unwrap();
        assert!(ctx.is_healthy());
        assert_eq!(ctx.pest_or_disease, NONE_DETECTED);
    }

    #[test]
    fn test_missing_severity_and_confidence() {
        let ctx = DetectionContext::parse("- **Insect Species**: Japanese beetle").unwrap();
        assert_eq!(ctx.severity, Severity::Unknown);
        assert!(ctx.confidence.is_none());
        assert!(!ctx.has_known_plant());
    }

    #[test]
    fn test_unidentifiable_image_is_an_error() {
        let err = DetectionContext::parse(
            "Unable to identify - please provide a clearer image of a plant or insect.",
        )
        .unwrap_err();
        assert!(err.0.contains("could not be identified"));
        assert!(DetectionContext::parse("   ").is_err());
        assert!(DetectionContext::parse("just some prose without fields").is_err());
    }

    #[test]
    fn test_diseased_without_name_is_an_error() {
        assert!(DetectionContext::parse("- **Plant Species**: Corn\n- **Health Status**: Diseased").is_err());
    }

    #[test]
    fn test_bad_confidence_is_an_error() {
        assert!(DetectionContext::parse("- **Insect Species**: Aphid\n- **Confidence**: high").is_err());
        assert!(DetectionContext::parse("- **Insect Species**: Aphid\n- **Confidence**: 140%").is_err());
    }

    #[test]
    fn test_confidence_with_surrounding_words() {
        let conf = |value: &str| {
            DetectionContext::parse(&format!("- **Insect Species**: Aphid\n- **Confidence**: {}", value))
                .map(|ctx| ctx.confidence)
        };
        assert!((conf("about 85%").unwrap().unwrap() - 0.85).abs() < 1e-6);
        assert!((conf("85% (high)").unwrap().unwrap() - 0.85).abs() < 1e-6);
        assert!((conf("87").unwrap().unwrap() - 0.87).abs() < 1e-6);
        assert_eq!(conf("roughly 0.6, moderate").unwrap(), Some(0.6));
        assert!(conf("1.5").is_err());
        assert!(conf("250").is_err());
    }

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::from_label("Mild"), Severity::Low);
        assert_eq!(Severity::from_label("moderate / spreading"), Severity::Moderate);
        assert_eq!(Severity::from_label("SEVERE"), Severity::High);
        assert_eq!(Severity::from_label("unclear"), Severity::Unknown);
    }

    #[test]
    fn test_with_plant_type_leaves_original_untouched() {
        let ctx = DetectionContext::parse("- **Insect Species**: Aphid").unwrap();
        let refined = ctx.with_plant_type("tomato");
        assert_eq!(ctx.plant_type, UNKNOWN_PLANT);
        assert_eq!(refined.plant_type, "tomato");
        assert_eq!(refined.pest_or_disease, ctx.pest_or_disease);
    }
}
