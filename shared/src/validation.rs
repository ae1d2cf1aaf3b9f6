//! Validation utilities for the Agri Advisor platform

use crate::models::{MenuAction, SoilSample};

/// Maximum accepted length for a free-text question
pub const MAX_QUESTION_LENGTH: usize = 2_000;

// ============================================================================
// Location Validations
// ============================================================================

/// Validate a US zip code (`12345` or `12345-6789`)
pub fn validate_zipcode(zipcode: &str) -> Result<(), &'static str> {
    let zipcode = zipcode.trim();
    let (base, plus_four) = match zipcode.split_once('-') {
        Some((base, ext)) => (base, Some(ext)),
        None => (zipcode, None),
    };
    if base.len() != 5 || !base.chars().all(|c| c.is_ascii_digit()) {
        return Err("Zip code must be 5 digits");
    }
    if let Some(ext) = plus_four {
        if ext.len() != 4 || !ext.chars().all(|c| c.is_ascii_digit()) {
            return Err("Zip+4 extension must be 4 digits");
        }
    }
    Ok(())
}

/// Reduce a validated zip code to its 5-digit form
pub fn normalize_zipcode(zipcode: &str) -> String {
    zipcode.trim().chars().take(5).collect()
}

// ============================================================================
// Soil Validations
// ============================================================================

/// Validate that particle fractions are usable for classification
pub fn validate_soil_fractions(clay: f64, sand: f64, silt: f64) -> Result<(), String> {
    SoilSample::new(clay, sand, silt)
        .validate()
        .map_err(|e| e.to_string())
}

/// Check if a pH value is within the range crops commonly tolerate
pub fn is_typical_crop_ph(ph: f64) -> bool {
    (5.5..=7.5).contains(&ph)
}

// ============================================================================
// Conversation Validations
// ============================================================================

/// Validate a numeric menu selection
pub fn validate_menu_selection(selection: u32) -> Result<MenuAction, &'static str> {
    MenuAction::from_selection(selection).ok_or("Menu selection must be between 1 and 6")
}

/// Validate a free-text question
pub fn validate_question(question: &str) -> Result<(), &'static str> {
    let question = question.trim();
    if question.is_empty() {
        return Err("Question cannot be empty");
    }
    if question.chars().count() > MAX_QUESTION_LENGTH {
        return Err("Question is too long");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_zipcode_valid() {
        assert!(validate_zipcode("94025").is_ok());
        assert!(validate_zipcode(" 02139 ").is_ok());
        assert!(validate_zipcode("94025-1234").is_ok());
    }

    #[test]
    fn test_validate_zipcode_invalid() {
        assert!(validate_zipcode("9402").is_err());
        assert!(validate_zipcode("940255").is_err());
        assert!(validate_zipcode("94O25").is_err());
        assert!(validate_zipcode("94025-12").is_err());
        assert!(validate_zipcode("").is_err());
    }

    #[test]
    fn test_normalize_zipcode() {
        assert_eq!(normalize_zipcode("94025-1234"), "94025");
        assert_eq!(normalize_zipcode(" 02139"), "02139");
    }

    #[test]
    fn test_validate_soil_fractions() {
        assert!(validate_soil_fractions(20.0, 40.0, 40.0).is_ok());
        let err = validate_soil_fractions(20.0, 40.0, 45.0).unwrap_err();
        assert!(err.contains("sum to 100"));
    }

    #[test]
    fn test_typical_crop_ph() {
        assert!(is_typical_crop_ph(6.5));
        assert!(!is_typical_crop_ph(4.8));
        assert!(!is_typical_crop_ph(8.2));
    }

    #[test]
    fn test_validate_menu_selection() {
        assert_eq!(validate_menu_selection(3), Ok(MenuAction::WeatherTiming));
        assert!(validate_menu_selection(0).is_err());
        assert!(validate_menu_selection(9).is_err());
    }

    #[test]
    fn test_validate_question() {
        assert!(validate_question("Can I spray before rain?").is_ok());
        assert!(validate_question("   ").is_err());
        assert!(validate_question(&"a".repeat(MAX_QUESTION_LENGTH + 1)).is_err());
    }
}
