//! WebAssembly module for the Agri Advisor platform
//!
//! Provides client-side computation for:
//! - Soil texture classification
//! - Soil sample validation
//! - Zip code validation before a session is started

use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Classify a sample into one of the twelve USDA texture classes
#[wasm_bindgen]
pub fn classify_soil_texture(clay: f64, sand: f64, silt: f64) -> Result<String, JsValue> {
    texture_name(clay, sand, silt)
        .map(str::to_string)
        .map_err(|e| JsValue::from_str(&e))
}

/// Drainage tendency of the sample's texture class
#[wasm_bindgen]
pub fn soil_drainage_tendency(clay: f64, sand: f64, silt: f64) -> Result<String, JsValue> {
    classify_texture(&SoilSample::new(clay, sand, silt))
        .map(|class| class.drainage_tendency().to_string())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Validation message for a sample, or `undefined` when it is usable
#[wasm_bindgen]
pub fn validate_soil_sample(clay: f64, sand: f64, silt: f64) -> Option<String> {
    let result = validate_soil_fractions(clay, sand, silt).err();
    if let Some(message) = &result {
        log_warning(message);
    }
    result
}

/// Names of every texture class, in classification order
#[wasm_bindgen]
pub fn texture_class_names() -> js_sys::Array {
    TextureClass::ALL
        .iter()
        .map(|class| JsValue::from_str(class.name()))
        .collect()
}

#[wasm_bindgen]
pub fn is_valid_zipcode(zipcode: &str) -> bool {
    validate_zipcode(zipcode).is_ok()
}

fn texture_name(clay: f64, sand: f64, silt: f64) -> Result<&'static str, String> {
    classify_texture(&SoilSample::new(clay, sand, silt))
        .map(|class| class.name())
        .map_err(|e| e.to_string())
}

fn log_warning(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::warn_1(&JsValue::from_str(message));
    #[cfg(not(target_arch = "wasm32"))]
    let _ = message;
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn texture_class_names_lists_all_twelve() {
        let names = texture_class_names();
        assert_eq!(names.length(), 12);
        assert_eq!(names.get(0).as_string().as_deref(), Some("sand"));
    }

    #[wasm_bindgen_test]
    fn classify_rejects_bad_sums() {
        assert!(classify_soil_texture(30.0, 30.0, 30.0).is_err());
    }
}
