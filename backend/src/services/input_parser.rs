//! Best-effort extraction of plant, zip code and infestation level from free text
//!
//! Examples:
//! - "zip 94025, heavy aphid infestation on tomato"
//! - "light damage on my okra plants"
//! - "94110"
//!
//! Fields that are not clearly present are left as `None`.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use shared::InfestationLevel;

/// Fields recognized in a user message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedInput {
    pub plant: Option<String>,
    pub zipcode: Option<String>,
    pub infestation_level: Option<InfestationLevel>,
}

impl ParsedInput {
    pub fn is_empty(&self) -> bool {
        self.plant.is_none() && self.zipcode.is_none() && self.infestation_level.is_none()
    }
}

/// Crops recognized by name, singular form
const KNOWN_CROPS: &[&str] = &[
    "alfalfa", "apple", "barley", "basil", "bean", "blueberry", "broccoli", "cabbage",
    "carrot", "cauliflower", "cherry", "citrus", "coffee", "corn", "cotton", "cucumber",
    "eggplant", "garlic", "grape", "kale", "lemon", "lettuce", "maize", "melon", "oat",
    "onion", "orange", "pea", "peach", "pear", "pepper", "potato", "pumpkin", "raspberry",
    "rice", "rose", "soybean", "spinach", "squash", "strawberry", "sunflower", "tomato",
    "watermelon", "wheat", "zucchini",
];

/// Words that can precede "plant(s)" without naming a crop
const NOT_CROPS: &[&str] = &[
    "my", "the", "these", "those", "all", "some", "many", "few", "young", "garden", "house",
    "infested", "damaged", "sick", "affected", "other", "our", "your",
];

fn zipcode_pattern() -> &'static Regex {
    static ZIP: OnceLock<Regex> = OnceLock::new();
    ZIP.get_or_init(|| Regex::new(r"\b(\d{5})\b").expect("valid regex"))
}

fn plant_suffix_pattern() -> &'static Regex {
    static PLANT: OnceLock<Regex> = OnceLock::new();
    PLANT.get_or_init(|| Regex::new(r"\b([a-z]+)\s+plants?\b").expect("valid regex"))
}

/// Parse a free-text message. Never fails; an empty result is valid.
pub fn parse_user_input(text: &str) -> ParsedInput {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    ParsedInput {
        plant: find_plant(&lower, &words),
        zipcode: zipcode_pattern()
            .captures(text)
            .map(|c| c[1].to_string()),
        infestation_level: words.iter().find_map(|w| level_keyword(w)),
    }
}

fn level_keyword(word: &str) -> Option<InfestationLevel> {
    match word {
        "low" | "light" | "minor" | "mild" => Some(InfestationLevel::Low),
        "medium" | "moderate" => Some(InfestationLevel::Moderate),
        "high" | "heavy" | "severe" => Some(InfestationLevel::Heavy),
        _ => None,
    }
}

fn find_plant(lower: &str, words: &[&str]) -> Option<String> {
    if let Some(crop) = words.iter().find_map(|w| known_crop(w)) {
        return Some(crop.to_string());
    }

    plant_suffix_pattern()
        .captures_iter(lower)
        .map(|c| c[1].to_string())
        .find(|w| !NOT_CROPS.contains(&w.as_str()) && level_keyword(w).is_none())
}

/// Match a word against the crop list, accepting regular plurals
fn known_crop(word: &str) -> Option<&'static str> {
    let mut candidates = vec![word.to_string()];
    if let Some(stem) = word.strip_suffix("ies") {
        candidates.push(format!("{}y", stem));
    }
    if let Some(stem) = word.strip_suffix("es") {
        candidates.push(stem.to_string());
    }
    if let Some(stem) = word.strip_suffix('s') {
        candidates.push(stem.to_string());
    }

    candidates
        .iter()
        .find_map(|c| KNOWN_CROPS.iter().copied().find(|crop| crop == c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_extraction() {
        let parsed = parse_user_input("zip 94025, heavy aphid infestation on tomato");
        assert_eq!(parsed.plant.as_deref(), Some("tomato"));
        assert_eq!(parsed.zipcode.as_deref(), Some("94025"));
        assert_eq!(parsed.infestation_level, Some(InfestationLevel::Heavy));
    }

    #[test]
    fn test_plurals_are_singularized() {
        assert_eq!(parse_user_input("my tomatoes").plant.as_deref(), Some("tomato"));
        assert_eq!(parse_user_input("Strawberries!").plant.as_deref(), Some("strawberry"));
        assert_eq!(parse_user_input("bell peppers").plant.as_deref(), Some("pepper"));
    }

    #[test]
    fn test_unknown_crop_named_before_plants() {
        let parsed = parse_user_input("light damage on my okra plants");
        assert_eq!(parsed.plant.as_deref(), Some("okra"));
        assert_eq!(parsed.infestation_level, Some(InfestationLevel::Low));
    }

    #[test]
    fn test_fields_are_not_guessed() {
        let parsed = parse_user_input("what should I do about these bugs?");
        assert!(parsed.is_empty());

        // "yellow" must not read as "low"
        assert!(parse_user_input("yellow leaves").infestation_level.is_none());
        // six digits is not a zip code
        assert!(parse_user_input("order 940251").zipcode.is_none());
        // a level word before "plants" is not a crop
        assert!(parse_user_input("severe plants damage").plant.is_none());
    }

    #[test]
    fn test_zip_plus_four_and_moderate() {
        let parsed = parse_user_input("94025-1234 medium");
        assert_eq!(parsed.zipcode.as_deref(), Some("94025"));
        assert_eq!(parsed.infestation_level, Some(InfestationLevel::Moderate));
        assert!(parsed.plant.is_none());
    }
}
