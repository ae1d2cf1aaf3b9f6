//! Conversation state machine
//!
//! Owns one session's [`RecommendationContextStore`] and drives it turn by
//! turn:
//!
//! ```text
//! INIT -> AWAITING_DETECTION -> AWAITING_LOCATION -> MENU_ACTIVE <-> CUSTOM_QUESTION
//!                                                   any state -> TERMINATED
//! ```
//!
//! Every method takes `&mut self`, so a single machine can never see two
//! interleaved turns. Concurrent sessions each own their own machine.

use serde::Serialize;
use shared::{
    menu_options, validate_menu_selection, validate_question, Availability, DetectionContext,
    InfestationLevel, LocationContext, MenuAction, MissingContext, ProductListing,
    RecommendationContextStore, SessionState,
};

use super::input_parser::{parse_user_input, ParsedInput};
use super::location::LocationContextBuilder;
use super::prompts;
use crate::error::{AppError, AppResult};
use crate::external::Collaborators;

/// Results requested per product search unless configured otherwise
pub const DEFAULT_PRODUCT_RESULTS: usize = 2;

/// Greeting shown once the menu becomes available
#[derive(Debug, Clone, Serialize)]
pub struct InitialSummary {
    pub weather_summary: String,
    pub soil_summary: String,
    pub immediate_assessment: Availability<String>,
    pub menu_options: Vec<String>,
}

/// Reply to one session operation
#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub state: SessionState,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<ProductListing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<InitialSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<ParsedInput>,
}

impl TurnResponse {
    fn new(state: SessionState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            products: Vec::new(),
            summary: None,
            extracted: None,
        }
    }
}

/// Per-session conversation driver
pub struct ConversationStateMachine {
    state: SessionState,
    store: RecommendationContextStore,
    collaborators: Collaborators,
    locations: LocationContextBuilder,
    product_results: usize,
}

impl ConversationStateMachine {
    pub fn new(collaborators: Collaborators) -> Self {
        Self::with_store(collaborators, RecommendationContextStore::new(), SessionState::Init)
    }

    /// Continue a session from a store snapshot taken by [`end`](Self::end)
    pub fn resume(
        collaborators: Collaborators,
        store: RecommendationContextStore,
    ) -> AppResult<Self> {
        store.validate()?;
        let state = state_for(&store);
        tracing::info!(%state, turns = store.history().len(), "Session resumed");
        Ok(Self::with_store(collaborators, store, state))
    }

    fn with_store(
        collaborators: Collaborators,
        store: RecommendationContextStore,
        state: SessionState,
    ) -> Self {
        let locations = LocationContextBuilder::new(
            collaborators.geocoder.clone(),
            collaborators.weather.clone(),
            collaborators.soil.clone(),
        );
        Self {
            state,
            store,
            collaborators,
            locations,
            product_results: DEFAULT_PRODUCT_RESULTS,
        }
    }

    pub fn with_product_results(mut self, product_results: usize) -> Self {
        self.product_results = product_results.max(1);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn store(&self) -> &RecommendationContextStore {
        &self.store
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn start(&mut self) -> AppResult<TurnResponse> {
        if self.state != SessionState::Init {
            return Err(self.invalid("start the session"));
        }
        self.transition(SessionState::AwaitingDetection);
        Ok(TurnResponse::new(
            self.state,
            "Upload a photo of the affected plant or insect to begin.",
        ))
    }

    /// Terminate the session and hand back its final store
    pub fn end(&mut self) -> RecommendationContextStore {
        if !self.state.is_terminated() {
            self.transition(SessionState::Terminated);
        }
        self.store.clone()
    }

    // ========================================================================
    // Context submission
    // ========================================================================

    pub async fn submit_image(&mut self, image: &[u8]) -> AppResult<TurnResponse> {
        self.ensure_open("submit an image")?;
        if image.is_empty() {
            return Err(AppError::invalid_input("image", "Image is empty"));
        }
        let raw = self.collaborators.vision.identify(image).await?;
        self.submit_detection(&raw).await
    }

    pub async fn submit_detection(&mut self, raw: &str) -> AppResult<TurnResponse> {
        self.ensure_open("submit a detection")?;
        let detection = DetectionContext::parse(raw)?;
        tracing::info!(
            finding = %detection.pest_or_disease,
            plant = %detection.plant_type,
            severity = %detection.severity,
            "Detection stored"
        );
        self.store.set_detection(detection);
        self.after_context_change().await
    }

    pub async fn submit_location(&mut self, zipcode: &str) -> AppResult<TurnResponse> {
        self.ensure_open("submit a location")?;
        let location = self.locations.build(zipcode).await?;
        self.store.set_location(location);
        self.after_context_change().await
    }

    /// Pull plant, zip code and infestation level out of free text
    pub async fn submit_field_notes(&mut self, text: &str) -> AppResult<TurnResponse> {
        self.ensure_open("submit field notes")?;
        let parsed = parse_user_input(text);
        tracing::debug!(?parsed, "Field notes parsed");

        // Nothing is stored until the zip code, if any, has resolved
        let location = match &parsed.zipcode {
            Some(zipcode) => Some(self.locations.build(zipcode).await?),
            None => None,
        };

        let mut notes = Vec::new();
        if let Some(level) = parsed.infestation_level {
            self.store.set_infestation_level(level);
            notes.push(format!("Infestation level noted as {}.", level));
        }
        if let Some(plant) = &parsed.plant {
            match self.store.detection() {
                Some(detection) => {
                    let note = if detection.has_known_plant()
                        && !detection.plant_type.eq_ignore_ascii_case(plant)
                    {
                        format!("Plant updated from {} to {}.", detection.plant_type, plant)
                    } else {
                        format!("Plant noted as {}.", plant)
                    };
                    let refined = detection.with_plant_type(plant.clone());
                    self.store.set_detection(refined);
                    notes.push(note);
                }
                None => notes.push(format!(
                    "Plant {} noted; upload a photo so it can be attached to a detection.",
                    plant
                )),
            }
        }
        if let Some(location) = location {
            self.store.set_location(location);
        }

        let mut response = self.after_context_change().await?;

        if parsed.is_empty() {
            response.message = format!(
                "I couldn't find a plant, zip code or infestation level in that.\n\n{}",
                response.message
            );
        } else if !notes.is_empty() {
            response.message = format!("{}\n\n{}", notes.join(" "), response.message);
        }
        response.extracted = Some(parsed);
        Ok(response)
    }

    // ========================================================================
    // Menu and questions
    // ========================================================================

    pub async fn submit_menu_selection(&mut self, selection: u32) -> AppResult<TurnResponse> {
        self.ensure_open("select a menu option")?;
        let action = validate_menu_selection(selection)
            .map_err(|msg| AppError::invalid_input("selection", msg))?;
        let (detection, location) = self.require_context(action.required_context())?;

        tracing::info!(selection, ?action, "Menu selection");
        let level = self.store.infestation_level();
        let context = prompts::context_block(&detection, &location, level);

        let (message, products) = match action {
            MenuAction::Treatment => self.treatment(&context, &detection, level, true).await?,
            MenuAction::SoilImpact => (self.soil_impact(&context, &detection, &location).await?, Vec::new()),
            MenuAction::WeatherTiming => {
                (self.weather_timing(&context, &detection, &location).await?, Vec::new())
            }
            MenuAction::MonitoringPrevention => (
                self.generate(&prompts::monitoring_prompt(&context, &detection)).await?,
                Vec::new(),
            ),
            MenuAction::DetailedReport => {
                (self.detailed_report(&context, &detection, &location, level).await?, Vec::new())
            }
            MenuAction::CustomQuestion => {
                self.transition(SessionState::CustomQuestion);
                return Ok(TurnResponse::new(
                    self.state,
                    format!(
                        "What would you like to know about {} on your {}?",
                        detection.pest_or_disease, detection.plant_type
                    ),
                ));
            }
        };

        self.store.record_turn(selection.to_string(), message.clone());
        self.transition(SessionState::MenuActive);

        let mut response = TurnResponse::new(self.state, message);
        response.products = products;
        Ok(response)
    }

    pub async fn submit_custom_question(&mut self, question: &str) -> AppResult<TurnResponse> {
        self.ensure_open("ask a question")?;
        validate_question(question).map_err(|msg| AppError::invalid_input("question", msg))?;
        let (detection, location) = self.require_context(MenuAction::CustomQuestion.required_context())?;

        self.transition(SessionState::CustomQuestion);

        let context = prompts::context_block(&detection, &location, self.store.infestation_level());
        let prompt = prompts::custom_question_prompt(&context, self.store.history(), question);
        let answer = self.generate(&prompt).await?;

        self.store.record_turn(question.trim(), answer.clone());
        self.transition(SessionState::MenuActive);
        Ok(TurnResponse::new(self.state, answer))
    }

    /// Route one line of user text to the matching operation
    pub async fn submit_input(&mut self, text: &str) -> AppResult<TurnResponse> {
        let trimmed = text.trim();
        if matches!(trimmed.to_lowercase().as_str(), "exit" | "quit") {
            self.end();
            return Ok(TurnResponse::new(self.state, "Session ended. Good luck with your crop!"));
        }

        match self.state {
            SessionState::MenuActive | SessionState::CustomQuestion => {
                match trimmed.parse::<i64>() {
                    Ok(number) => match u32::try_from(number) {
                        Ok(selection) => self.submit_menu_selection(selection).await,
                        Err(_) => Err(AppError::invalid_input(
                            "selection",
                            "Menu selection must be between 1 and 6",
                        )),
                    },
                    Err(_) => self.submit_custom_question(trimmed).await,
                }
            }
            _ => self.submit_field_notes(trimmed).await,
        }
    }

    // ========================================================================
    // Menu action bodies
    // ========================================================================

    async fn treatment(
        &self,
        context: &str,
        detection: &DetectionContext,
        level: Option<InfestationLevel>,
        with_products: bool,
    ) -> AppResult<(String, Vec<ProductListing>)> {
        let answer = self
            .generate(&prompts::treatment_prompt(context, detection, level))
            .await?;
        if !with_products {
            return Ok((answer, Vec::new()));
        }

        let products = self.search_products(&answer, detection).await;
        let message = format!("{}{}", answer, prompts::render_product_links(&products));
        let listings = match products {
            Availability::Available { data } => data,
            Availability::Unavailable { .. } => Vec::new(),
        };
        Ok((message, listings))
    }

    async fn search_products(
        &self,
        answer: &str,
        detection: &DetectionContext,
    ) -> Availability<Vec<ProductListing>> {
        let mut listings = Vec::new();
        let mut failure = None;

        for keyword in prompts::product_keywords(answer, detection)
            .iter()
            .take(prompts::MAX_PRODUCT_SEARCHES)
        {
            let query = prompts::product_query(keyword);
            match self
                .collaborators
                .products
                .search(&query, self.product_results)
                .await
            {
                Ok(found) => listings.extend(found),
                Err(e) => {
                    tracing::warn!(%query, error = %e, "Product search failed");
                    failure = Some(e.to_string());
                }
            }
        }

        listings.truncate(prompts::MAX_PRODUCTS_SHOWN);
        match failure {
            Some(reason) if listings.is_empty() => Availability::unavailable(reason),
            _ => Availability::available(listings),
        }
    }

    async fn soil_impact(
        &self,
        context: &str,
        detection: &DetectionContext,
        location: &LocationContext,
    ) -> AppResult<String> {
        let analysis = self
            .generate(&prompts::soil_prompt(context, detection, &location.soil))
            .await?;
        Ok(format!("{}\n\n{}", prompts::soil_display(&location.soil), analysis))
    }

    async fn weather_timing(
        &self,
        context: &str,
        detection: &DetectionContext,
        location: &LocationContext,
    ) -> AppResult<String> {
        let analysis = self
            .generate(&prompts::weather_prompt(context, detection, &location.weather))
            .await?;
        Ok(format!(
            "{}\n\n{}",
            prompts::weather_display(&location.weather),
            analysis
        ))
    }

    async fn detailed_report(
        &self,
        context: &str,
        detection: &DetectionContext,
        location: &LocationContext,
        level: Option<InfestationLevel>,
    ) -> AppResult<String> {
        let (treatment, _) = self.treatment(context, detection, level, false).await?;
        let soil = self.soil_impact(context, detection, location).await?;
        let weather = self.weather_timing(context, detection, location).await?;
        let monitoring = self
            .generate(&prompts::monitoring_prompt(context, detection))
            .await?;
        Ok(prompts::detailed_report(&treatment, &soil, &weather, &monitoring))
    }

    async fn generate(&self, prompt: &str) -> AppResult<String> {
        self.collaborators.nlg.generate(prompt).await
    }

    // ========================================================================
    // State handling
    // ========================================================================

    /// Move forward once both pieces of context are present and greet with the summary
    async fn after_context_change(&mut self) -> AppResult<TurnResponse> {
        let entered_menu = !self.state.accepts_turns();
        if entered_menu {
            self.transition(state_for(&self.store));
        }

        match self.state {
            SessionState::AwaitingDetection => Ok(TurnResponse::new(
                self.state,
                "Location saved. Upload a photo of the affected plant or insect next.",
            )),
            SessionState::AwaitingLocation => {
                let message = match self.store.detection() {
                    Some(d) if d.is_healthy() => format!(
                        "Your {} looks healthy. Enter your zip code for local growing conditions.",
                        d.plant_type
                    ),
                    Some(d) => format!(
                        "Detected {} on {} (severity: {}). Enter your zip code for local weather and soil guidance.",
                        d.pest_or_disease, d.plant_type, d.severity
                    ),
                    None => "Enter your zip code.".to_string(),
                };
                Ok(TurnResponse::new(self.state, message))
            }
            _ => {
                let summary = self.initial_summary().await?;
                let message = prompts::render_initial_summary(
                    &summary.weather_summary,
                    &summary.soil_summary,
                    &summary.immediate_assessment,
                );
                let mut response = TurnResponse::new(self.state, message);
                response.summary = Some(summary);
                Ok(response)
            }
        }
    }

    async fn initial_summary(&self) -> AppResult<InitialSummary> {
        let (detection, location) = self.require_context(&[MissingContext::Detection, MissingContext::Location])?;
        let context = prompts::context_block(&detection, &location, self.store.infestation_level());

        let immediate_assessment = match self
            .generate(&prompts::assessment_prompt(&context, &detection))
            .await
        {
            Ok(text) => Availability::available(text),
            Err(e) => {
                tracing::warn!(error = %e, "Immediate assessment unavailable");
                Availability::unavailable(e.to_string())
            }
        };

        Ok(InitialSummary {
            weather_summary: prompts::weather_summary(&location),
            soil_summary: prompts::soil_summary(&location),
            immediate_assessment,
            menu_options: menu_options(),
        })
    }

    /// Snapshot of the context an action needs, or the first missing piece
    fn require_context(
        &self,
        required: &[MissingContext],
    ) -> AppResult<(DetectionContext, LocationContext)> {
        if let Some(missing) = self.store.first_missing(required) {
            return Err(AppError::ContextMissing(missing));
        }
        match (self.store.detection(), self.store.location()) {
            (Some(d), Some(l)) => Ok((d.clone(), l.clone())),
            (None, _) => Err(AppError::ContextMissing(MissingContext::Detection)),
            (_, None) => Err(AppError::ContextMissing(MissingContext::Location)),
        }
    }

    fn ensure_open(&self, action: &str) -> AppResult<()> {
        match self.state {
            SessionState::Init | SessionState::Terminated => Err(self.invalid(action)),
            _ => Ok(()),
        }
    }

    fn invalid(&self, action: &str) -> AppError {
        AppError::InvalidStateTransition {
            state: self.state,
            action: action.to_string(),
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::info!(from = %self.state, to = %next, "Session state change");
            self.state = next;
        }
    }
}

/// State implied by the context a store holds
fn state_for(store: &RecommendationContextStore) -> SessionState {
    match (store.detection(), store.location()) {
        (None, _) => SessionState::AwaitingDetection,
        (Some(_), None) => SessionState::AwaitingLocation,
        (Some(_), Some(_)) => SessionState::MenuActive,
    }
}
