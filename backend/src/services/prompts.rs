//! Prompt assembly and response rendering for recommendation turns
//!
//! Everything here is a pure function of the stored context so the same
//! store always yields the same prompt.

use shared::{
    get_rainy_days, has_rain_forecast, is_typical_crop_ph, menu_options, Availability,
    ConversationHistory, DetectionContext, InfestationLevel, LocationContext, ProductListing,
    SoilProfile, WeatherSummary, RAIN_LIKELY_PERCENT,
};

/// Product types looked for in a treatment answer, in search priority order
pub const PRODUCT_LEXICON: &[&str] = &[
    "Bt",
    "spinosad",
    "neem oil",
    "pyrethrin",
    "insecticidal soap",
    "copper fungicide",
    "sulfur spray",
    "diatomaceous earth",
    "horticultural oil",
    "bacillus thuringiensis",
];

/// Searches issued per treatment answer
pub const MAX_PRODUCT_SEARCHES: usize = 2;

/// Listings shown under a treatment answer
pub const MAX_PRODUCTS_SHOWN: usize = 4;

const RULE: &str = "----------------------------------------------------------------------";

// ============================================================================
// Context
// ============================================================================

/// Compact context block shared by every generated answer
pub fn context_block(
    detection: &DetectionContext,
    location: &LocationContext,
    level: Option<InfestationLevel>,
) -> String {
    let temperature = match &location.weather {
        Availability::Available { data } => format!(
            "{}°{}, {}",
            data.current.temperature, data.current.temperature_unit, data.current.short_forecast
        ),
        Availability::Unavailable { reason } => format!("unavailable ({})", reason),
    };
    let soil = match &location.soil {
        Availability::Available { data } => format!(
            "{}, {}",
            data.texture,
            data.drainage_class.as_deref().unwrap_or("drainage unknown")
        ),
        Availability::Unavailable { reason } => format!("unavailable ({})", reason),
    };
    let confidence = detection
        .confidence
        .map(|c| format!("{:.0}%", c * 100.0))
        .unwrap_or_else(|| "not reported".to_string());

    format!(
        "ISSUE: {} (severity: {}, confidence: {})\n\
         PLANT: {}\n\
         INFESTATION LEVEL: {}\n\
         LOCATION: {}\n\
         WEATHER: {}\n\
         SOIL: {}",
        detection.pest_or_disease,
        detection.severity,
        confidence,
        detection.plant_type,
        level.map(|l| l.as_str()).unwrap_or("unknown"),
        location.place_name(),
        temperature,
        soil,
    )
}

// ============================================================================
// Initial summary
// ============================================================================

/// Current conditions only; the forecast is reserved for the timing answer
pub fn weather_summary(location: &LocationContext) -> String {
    match &location.weather {
        Availability::Available { data } => {
            let wind = match (&data.current.wind_speed, &data.current.wind_direction) {
                (Some(speed), Some(dir)) => format!("{} {}", speed, dir),
                (Some(speed), None) => speed.clone(),
                _ => "calm".to_string(),
            };
            format!(
                "Location: {}\nCurrent: {}°{}, {}\nWind: {}",
                location.place_name(),
                data.current.temperature,
                data.current.temperature_unit,
                data.current.short_forecast,
                wind
            )
        }
        Availability::Unavailable { reason } => format!("Weather data unavailable: {}", reason),
    }
}

pub fn soil_summary(location: &LocationContext) -> String {
    match &location.soil {
        Availability::Available { data } => {
            let mut lines = vec![
                format!("Soil type: {}", data.soil_name),
                format!("Texture: {}", data.texture),
                format!(
                    "Drainage: {}",
                    data.drainage_class.as_deref().unwrap_or("not reported")
                ),
                format!("Sand: {:.1}%", data.sample.sand_percent),
                format!("Clay: {:.1}%", data.sample.clay_percent),
            ];
            if let Some(ph) = data.chemistry.ph {
                if is_typical_crop_ph(ph) {
                    lines.push(format!("pH: {:.1}", ph));
                } else {
                    lines.push(format!(
                        "pH: {:.1} (outside the 5.5-7.5 range most crops prefer)",
                        ph
                    ));
                }
            }
            lines.join("\n")
        }
        Availability::Unavailable { reason } => format!("Soil data unavailable: {}", reason),
    }
}

pub fn assessment_prompt(context: &str, detection: &DetectionContext) -> String {
    format!(
        "You are an agricultural advisor. Provide a detailed immediate assessment (3-4 sentences).\n\n\
         {context}\n\n\
         Provide:\n\
         1. Urgency: Immediate / Within 24hrs / Monitor closely\n\
         2. Risk Factor: the specific risk {finding} poses to {plant}\n\
         3. One brief action recommendation\n\n\
         Format:\n\
         **Urgency:** [level]\n\
         **Risk Factor:** [specific risk to crop]\n\
         **Action:** [brief recommendation]",
        context = context,
        finding = detection.pest_or_disease,
        plant = detection.plant_type,
    )
}

/// Greeting shown when the menu first becomes available
pub fn render_initial_summary(weather: &str, soil: &str, assessment: &Availability<String>) -> String {
    let assessment = match assessment {
        Availability::Available { data } => data.clone(),
        Availability::Unavailable { reason } => {
            format!("Immediate assessment unavailable: {}", reason)
        }
    };
    format!(
        "{}\n\n{}\n\n{}\n\nWhat would you like to know?\n{}",
        weather,
        soil,
        assessment,
        menu_options().join("\n")
    )
}

// ============================================================================
// Menu actions
// ============================================================================

pub fn treatment_prompt(
    context: &str,
    detection: &DetectionContext,
    level: Option<InfestationLevel>,
) -> String {
    match level {
        None => format!(
            "{context}\n\n\
             Provide brief treatment recommendations for ALL THREE infestation levels.\n\
             For each level, recommend 2-3 specific product types (e.g. \"Bt insecticide\", \"spinosad spray\", \"neem oil concentrate\").\n\n\
             Format:\n\
             **Low Infestation:**\n- Manual removal (if applicable)\n- Product types: [type 1], [type 2]\n\n\
             **Medium Infestation:**\n- Product types: [type 1], [type 2]\n\n\
             **High Infestation:**\n- Product types: [type 1], [type 2]\n\n\
             Mention product types, not brand names.",
            context = context
        ),
        Some(level) => {
            let manual = if level == InfestationLevel::Low {
                "\nInclude manual removal as the first option since the infestation is low.\n"
            } else {
                ""
            };
            format!(
                "{context}\n\n\
                 Provide treatment recommendations for a {level} infestation.\n\
                 Recommend 2-3 specific product types suitable for {plant}.\n\
                 {manual}\n\
                 Answer in 2 short paragraphs. Mention product types, not brand names.",
                context = context,
                level = level.as_str().to_uppercase(),
                plant = detection.plant_type,
                manual = manual,
            )
        }
    }
}

pub fn soil_display(soil: &Availability<SoilProfile>) -> String {
    match soil {
        Availability::Available { data } => {
            let optional = |v: Option<f64>, unit: &str| {
                v.map(|v| format!("{:.1}{}", v, unit))
                    .unwrap_or_else(|| "not reported".to_string())
            };
            format!(
                "Your soil:\n\
                 Name: {}\n\
                 Texture: {} ({})\n\
                 Drainage: {}\n\
                 Sand: {:.1}%\n\
                 Clay: {:.1}%\n\
                 Silt: {:.1}%\n\
                 pH: {}\n\
                 Organic matter: {}\n\
                 Horizon depth: {} to {}",
                data.soil_name,
                data.texture,
                data.texture.drainage_tendency(),
                data.drainage_class.as_deref().unwrap_or("not reported"),
                data.sample.sand_percent,
                data.sample.clay_percent,
                data.sample.silt_percent,
                optional(data.chemistry.ph, ""),
                optional(data.chemistry.organic_matter_percent, "%"),
                optional(data.chemistry.horizon_top_cm, " cm"),
                optional(data.chemistry.horizon_bottom_cm, " cm"),
            )
        }
        Availability::Unavailable { reason } => format!("Soil data unavailable: {}", reason),
    }
}

pub fn soil_prompt(context: &str, detection: &DetectionContext, soil: &Availability<SoilProfile>) -> String {
    let specifics = match soil.as_option() {
        Some(profile) => format!(
            "- Application adjustments needed for {} with {} drainage\n- pH impact on treatment effectiveness",
            profile.texture,
            profile.drainage_class.as_deref().unwrap_or("unknown")
        ),
        None => "- Soil data is unavailable; give general guidance and say so".to_string(),
    };
    format!(
        "The user already sees their soil information.\n\n\
         Provide analysis in 3 short paragraphs:\n\
         Paragraph 1: what this soil means for {plant} cultivation.\n\
         Paragraphs 2-3: how this soil affects treatment of {finding}:\n\
         {specifics}\n\n\
         Context:\n{context}",
        plant = detection.plant_type,
        finding = detection.pest_or_disease,
        specifics = specifics,
        context = context,
    )
}

pub fn weather_display(weather: &Availability<WeatherSummary>) -> String {
    let Availability::Available { data } = weather else {
        return format!(
            "Weather data unavailable: {}",
            weather.reason().unwrap_or("unknown reason")
        );
    };

    let mut out = format!(
        "Current weather:\nTemperature: {}°{}\nConditions: {}\nWind: {} {}\n\n3-day forecast:\n",
        data.current.temperature,
        data.current.temperature_unit,
        data.current.short_forecast,
        data.current.wind_speed.as_deref().unwrap_or("calm"),
        data.current.wind_direction.as_deref().unwrap_or(""),
    );
    for day in &data.forecast {
        let temps = match (day.high, day.low) {
            (Some(h), Some(l)) => format!("{}°/{}°", h, l),
            (Some(h), None) => format!("high {}°", h),
            (None, Some(l)) => format!("low {}°", l),
            (None, None) => "n/a".to_string(),
        };
        let pop = day
            .precipitation_probability
            .map(|p| format!(", {}% chance of rain", p))
            .unwrap_or_default();
        out.push_str(&format!(
            "- {}: {} {}{}\n",
            day.date.format("%a %b %-d"),
            temps,
            day.conditions,
            pop
        ));
    }

    if has_rain_forecast(data) {
        let days: Vec<String> = get_rainy_days(data)
            .iter()
            .map(|d| d.date.format("%a").to_string())
            .collect();
        out.push_str(&format!(
            "\nRain likely (>= {}%) on: {}\n",
            RAIN_LIKELY_PERCENT,
            days.join(", ")
        ));
    }
    out.trim_end().to_string()
}

pub fn weather_prompt(context: &str, detection: &DetectionContext, weather: &Availability<WeatherSummary>) -> String {
    let forecast = match weather.as_option() {
        Some(summary) => summary
            .forecast
            .iter()
            .map(|d| {
                format!(
                    "{}: {}, high {}, rain chance {}",
                    d.date,
                    d.conditions,
                    d.high.map(|h| h.to_string()).unwrap_or_else(|| "n/a".into()),
                    d.precipitation_probability
                        .map(|p| format!("{}%", p))
                        .unwrap_or_else(|| "n/a".into())
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        None => "Forecast unavailable; give general timing guidance and say so".to_string(),
    };
    format!(
        "The user already sees their weather information.\n\n\
         Provide timing guidance in exactly 2 short paragraphs:\n\
         - Best application window in the next 3 days for treating {finding}\n\
         - Why timing matters (rain, temperature, wind)\n\n\
         Forecast:\n{forecast}\n\n\
         Context:\n{context}",
        finding = detection.pest_or_disease,
        forecast = forecast,
        context = context,
    )
}

pub fn monitoring_prompt(context: &str, detection: &DetectionContext) -> String {
    format!(
        "{context}\n\n\
         Provide monitoring and prevention advice in exactly 2 short paragraphs:\n\
         - How often to check {plant}\n\
         - What signs indicate treatment success or failure\n\
         - Prevention tips",
        context = context,
        plant = detection.plant_type,
    )
}

/// Custom questions see every prior turn, oldest first
pub fn custom_question_prompt(context: &str, history: &ConversationHistory, question: &str) -> String {
    let prior = if history.is_empty() {
        String::new()
    } else {
        let turns: Vec<String> = history
            .entries()
            .iter()
            .map(|e| format!("User: {}\nAdvisor: {}", e.user_input, e.response))
            .collect();
        format!("\n\nEARLIER IN THIS CONVERSATION:\n{}", turns.join("\n\n"))
    };
    format!(
        "{context}{prior}\n\n\
         USER QUESTION: {question}\n\n\
         Provide a helpful answer using the context above. Keep it concise, exactly 2 short paragraphs.",
        context = context,
        prior = prior,
        question = question.trim(),
    )
}

// ============================================================================
// Products
// ============================================================================

/// Product types from the lexicon mentioned in a treatment answer,
/// falling back to a query built from the detection
pub fn product_keywords(answer: &str, detection: &DetectionContext) -> Vec<String> {
    let lower = answer.to_lowercase();
    let found: Vec<String> = PRODUCT_LEXICON
        .iter()
        .filter(|k| mentions(&lower, &k.to_lowercase()))
        .map(|k| k.to_string())
        .collect();

    if found.is_empty() {
        vec![format!(
            "{} treatment {}",
            detection.pest_or_disease, detection.plant_type
        )]
    } else {
        found
    }
}

/// Whole-word containment, so "bt" does not match inside "doubt"
fn mentions(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.map_or(false, char::is_alphanumeric) && !after.map_or(false, char::is_alphanumeric)
    })
}

pub fn product_query(keyword: &str) -> String {
    format!("{} organic pesticide", keyword)
}

/// Listing block appended to a treatment answer
pub fn render_product_links(products: &Availability<Vec<ProductListing>>) -> String {
    let mut out = format!("\n\n{}\n\nRecommended products:\n", RULE);
    match products {
        Availability::Available { data } if data.is_empty() => {
            out.push_str("No matching products found.\n");
        }
        Availability::Available { data } => {
            for (i, product) in data.iter().take(MAX_PRODUCTS_SHOWN).enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, product.name));
                let meta: Vec<String> = [
                    product.price.as_ref().map(|p| format!("Price: {}", p)),
                    product.rating.as_ref().map(|r| format!("Rating: {}", r)),
                ]
                .into_iter()
                .flatten()
                .collect();
                if !meta.is_empty() {
                    out.push_str(&format!("   {}\n", meta.join(" | ")));
                }
                out.push_str(&format!("   {}\n", product.url));
            }
        }
        Availability::Unavailable { reason } => {
            out.push_str(&format!("Product links unavailable: {}\n", reason));
        }
    }
    out.trim_end().to_string()
}

// ============================================================================
// Detailed report
// ============================================================================

pub fn detailed_report(treatment: &str, soil: &str, weather: &str, monitoring: &str) -> String {
    let heavy = "=".repeat(RULE.len());
    format!(
        "{heavy}\nCOMPREHENSIVE TREATMENT REPORT\n{heavy}\n\n\
         ## 1. TREATMENT RECOMMENDATIONS\n{treatment}\n\n{rule}\n\n\
         ## 2. SOIL IMPACT ANALYSIS\n{soil}\n\n{rule}\n\n\
         ## 3. WEATHER-BASED TIMING\n{weather}\n\n{rule}\n\n\
         ## 4. MONITORING & PREVENTION\n{monitoring}\n\n{heavy}",
        heavy = heavy,
        rule = RULE,
        treatment = treatment,
        soil = soil,
        weather = weather,
        monitoring = monitoring,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::mock::{sample_coordinates, sample_listing, sample_soil, sample_weather};
    use shared::{Severity, SubjectType};

    fn detection() -> DetectionContext {
        DetectionContext::new(
            SubjectType::Pest,
            "Green peach aphid",
            "tomato",
            Severity::Moderate,
            Some(0.88),
        )
        .unwrap()
    }

    fn location(weather_ok: bool) -> LocationContext {
        let weather = if weather_ok {
            Availability::available(sample_weather())
        } else {
            Availability::unavailable("weather service timed out")
        };
        LocationContext::new(
            "94025",
            sample_coordinates(),
            weather,
            Availability::available(sample_soil()),
        )
    }

    #[test]
    fn test_context_block_marks_unavailable_halves() {
        let block = context_block(&detection(), &location(false), Some(InfestationLevel::Heavy));
        assert!(block.contains("INFESTATION LEVEL: heavy"));
        assert!(block.contains("WEATHER: unavailable (weather service timed out)"));
        assert!(block.contains("SOIL: loam"));
        assert!(block.contains("confidence: 88%"));
        assert!(block.contains("LOCATION: zip 94025"));
    }

    #[test]
    fn test_treatment_prompt_depends_on_level() {
        let d = detection();
        let ctx = context_block(&d, &location(true), None);
        assert!(treatment_prompt(&ctx, &d, None).contains("ALL THREE"));
        let low = treatment_prompt(&ctx, &d, Some(InfestationLevel::Low));
        assert!(low.contains("LOW infestation"));
        assert!(low.contains("manual removal"));
        assert!(!treatment_prompt(&ctx, &d, Some(InfestationLevel::Heavy)).contains("manual removal"));
    }

    #[test]
    fn test_product_keywords() {
        let d = detection();
        let answer = "Use insecticidal soap first, then Neem Oil. Spinosad for heavy pressure.";
        assert_eq!(
            product_keywords(answer, &d),
            vec!["spinosad", "neem oil", "insecticidal soap"]
        );
        assert_eq!(
            product_keywords("No doubt, prune the leaves.", &d),
            vec!["Green peach aphid treatment tomato"]
        );
        assert_eq!(product_keywords("Apply Bt weekly.", &d), vec!["Bt"]);
    }

    #[test]
    fn test_weather_display_flags_rain() {
        let display = weather_display(&Availability::available(sample_weather()));
        assert!(display.contains("3-day forecast"));
        assert!(display.contains("70% chance of rain"));
        assert!(display.contains("Rain likely (>= 50%)"));
    }

    #[test]
    fn test_soil_summary_flags_atypical_ph() {
        let mut loc = location(true);
        assert!(soil_summary(&loc).ends_with("pH: 6.4"));

        let mut soil = sample_soil();
        soil.chemistry.ph = Some(4.8);
        loc.soil = Availability::available(soil);
        assert!(soil_summary(&loc).contains("pH: 4.8 (outside the 5.5-7.5 range"));
    }

    #[test]
    fn test_product_links_rendering() {
        let products = Availability::available(vec![
            sample_listing("Spinosad Spray", "B000BWY3OQ"),
            sample_listing("Neem Oil", "B01N5P4A4M"),
        ]);
        let links = render_product_links(&products);
        assert!(links.contains("1. Spinosad Spray"));
        assert!(links.contains("https://www.amazon.com/dp/B01N5P4A4M"));

        assert!(render_product_links(&Availability::available(vec![]))
            .contains("No matching products found"));
        assert!(render_product_links(&Availability::unavailable("search timed out"))
            .contains("Product links unavailable: search timed out"));
    }

    #[test]
    fn test_custom_question_includes_every_prior_turn() {
        let mut history = ConversationHistory::new();
        for i in 1..=6 {
            history.record(format!("q{}", i), format!("a{}", i));
        }
        let prompt = custom_question_prompt("CTX", &history, "  Is it safe for bees? ");
        assert!(prompt.contains("User: q1\nAdvisor: a1"));
        assert!(prompt.contains("User: q6\nAdvisor: a6"));
        assert!(prompt.find("User: q1").unwrap() < prompt.find("User: q6").unwrap());
        assert!(prompt.contains("USER QUESTION: Is it safe for bees?"));
    }
}
