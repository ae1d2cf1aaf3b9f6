//! Tests for the conversation state machine driven by mock collaborators
//! Verifies context gating, partial location handling and history ordering

use agri_advisor::external::mock::{MockCollaborators, MockFailure, SAMPLE_PEST_DETECTION};
use agri_advisor::services::{parse_user_input, ConversationStateMachine};
use agri_advisor::AppError;
use shared::{InfestationLevel, MissingContext, SessionState};

fn started(mocks: &MockCollaborators) -> ConversationStateMachine {
    let mut machine = ConversationStateMachine::new(mocks.collaborators());
    let response = machine.start().unwrap();
    assert_eq!(response.state, SessionState::AwaitingDetection);
    machine
}

// =============================================================================
// Context gating
// =============================================================================

mod context_gating {
    use super::*;

    #[tokio::test]
    async fn menu_before_location_names_location() {
        let mocks = MockCollaborators::new();
        let mut machine = started(&mocks);
        machine.submit_detection(SAMPLE_PEST_DETECTION).await.unwrap();

        let err = machine.submit_menu_selection(1).await.unwrap_err();
        assert!(matches!(err, AppError::ContextMissing(MissingContext::Location)));
        assert!(err.to_string().contains("location"));
        assert_eq!(mocks.nlg.call_count(), 0);
        assert_eq!(mocks.products.call_count(), 0);
    }

    #[tokio::test]
    async fn question_before_detection_names_detection() {
        let mocks = MockCollaborators::new();
        let mut machine = started(&mocks);
        let err = machine.submit_custom_question("What is this bug?").await.unwrap_err();
        assert!(matches!(err, AppError::ContextMissing(MissingContext::Detection)));
    }

    #[tokio::test]
    async fn terminated_session_rejects_every_operation() {
        let mocks = MockCollaborators::new();
        let mut machine = started(&mocks);
        machine.end();

        assert!(machine.submit_detection(SAMPLE_PEST_DETECTION).await.is_err());
        assert!(machine.submit_location("94025").await.is_err());
        assert!(machine.submit_menu_selection(2).await.is_err());
        assert!(machine.submit_custom_question("hello?").await.is_err());
        assert!(machine.start().is_err());
        assert_eq!(machine.state(), SessionState::Terminated);
    }
}

// =============================================================================
// Partial location context
// =============================================================================

mod partial_location {
    use super::*;

    #[tokio::test]
    async fn soil_failure_still_reaches_menu_with_weather() {
        let mocks = MockCollaborators::new();
        let mut machine = started(&mocks);
        machine.submit_detection(SAMPLE_PEST_DETECTION).await.unwrap();
        mocks
            .soil
            .push_err(MockFailure::Unavailable("no map unit at point".to_string()));

        let response = machine.submit_location("94025").await.unwrap();
        assert_eq!(response.state, SessionState::MenuActive);

        let location = machine.store().location().unwrap();
        assert!(location.weather.is_available());
        assert!(!location.soil.is_available());

        let summary = response.summary.unwrap();
        assert!(summary.soil_summary.starts_with("Soil data unavailable"));
        assert!(summary.weather_summary.contains("Menlo Park, CA"));

        // Soil guidance still answers, and says the data is missing
        let soil = machine.submit_menu_selection(2).await.unwrap();
        assert!(soil.message.starts_with("Soil data unavailable"));
    }

    #[tokio::test]
    async fn geocoding_failure_keeps_awaiting_location() {
        let mocks = MockCollaborators::new();
        let mut machine = started(&mocks);
        machine.submit_detection(SAMPLE_PEST_DETECTION).await.unwrap();
        mocks
            .geocoder
            .push_err(MockFailure::Unavailable("no match".to_string()));

        let err = machine.submit_location("99999").await.unwrap_err();
        assert!(matches!(err, AppError::Geocoding { .. }));
        assert_eq!(machine.state(), SessionState::AwaitingLocation);
        assert!(machine.store().location().is_none());
    }
}

// =============================================================================
// History
// =============================================================================

mod history {
    use super::*;

    #[tokio::test]
    async fn history_is_append_only_in_submission_order() {
        let mocks = MockCollaborators::new();
        let mut machine = started(&mocks);
        machine.submit_detection(SAMPLE_PEST_DETECTION).await.unwrap();
        machine.submit_location("94025").await.unwrap();

        machine.submit_menu_selection(3).await.unwrap();
        let first = machine.store().history().entries()[0].clone();

        machine.submit_custom_question("Can I spray before rain?").await.unwrap();
        machine.submit_menu_selection(6).await.unwrap();
        machine.submit_custom_question("Is it safe for bees?").await.unwrap();
        machine.submit_menu_selection(4).await.unwrap();

        let entries = machine.store().history().entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], first);
        let inputs: Vec<&str> = entries.iter().map(|e| e.user_input.as_str()).collect();
        assert_eq!(
            inputs,
            vec!["3", "Can I spray before rain?", "Is it safe for bees?", "4"]
        );
        let indices: Vec<usize> = entries.iter().map(|e| e.turn_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn failed_turns_are_not_recorded() {
        let mocks = MockCollaborators::new();
        let mut machine = started(&mocks);
        machine.submit_detection(SAMPLE_PEST_DETECTION).await.unwrap();
        machine.submit_location("94025").await.unwrap();

        mocks.nlg.push_err(MockFailure::Unavailable("503".to_string()));
        let err = machine.submit_menu_selection(5).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable { .. }));
        assert!(machine.store().history().is_empty());
        assert_eq!(machine.state(), SessionState::MenuActive);
    }

    #[tokio::test]
    async fn custom_question_prompt_carries_context_and_prior_turns() {
        let mocks = MockCollaborators::new();
        let mut machine = started(&mocks);
        machine.submit_detection(SAMPLE_PEST_DETECTION).await.unwrap();
        machine.submit_field_notes("zip 94025, heavy").await.unwrap();
        mocks.nlg.push_ok("Spray at dusk on Friday.".to_string());
        machine.submit_menu_selection(3).await.unwrap();

        machine.submit_custom_question("What about ladybugs?").await.unwrap();
        let prompt = mocks.nlg.calls().last().cloned().unwrap();
        assert!(prompt.contains("Green peach aphid"));
        assert!(prompt.contains("INFESTATION LEVEL: heavy"));
        assert!(prompt.contains("Advisor: "));
        assert!(prompt.contains("USER QUESTION: What about ladybugs?"));
    }
}

// =============================================================================
// Field notes
// =============================================================================

mod field_notes {
    use super::*;

    #[test]
    fn parse_user_input_extracts_all_three_fields() {
        let parsed = parse_user_input("zip 94025, heavy aphid infestation on tomato");
        assert_eq!(parsed.plant.as_deref(), Some("tomato"));
        assert_eq!(parsed.zipcode.as_deref(), Some("94025"));
        assert_eq!(parsed.infestation_level, Some(InfestationLevel::Heavy));
    }

    #[tokio::test]
    async fn notes_with_zip_build_the_location() {
        let mocks = MockCollaborators::new();
        let mut machine = started(&mocks);
        machine.submit_detection(SAMPLE_PEST_DETECTION).await.unwrap();

        let response = machine
            .submit_field_notes("zip 94025, heavy aphid infestation on tomato")
            .await
            .unwrap();
        assert_eq!(response.state, SessionState::MenuActive);
        assert_eq!(mocks.geocoder.calls(), vec!["94025".to_string()]);
        assert_eq!(machine.store().detection().unwrap().plant_type, "tomato");
        assert_eq!(
            machine.store().infestation_level(),
            Some(InfestationLevel::Heavy)
        );
    }
}
