//! Soil models and USDA texture classification

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum allowed deviation of clay + sand + silt from 100, in percentage points
pub const SUM_TOLERANCE: f64 = 0.5;

/// Errors raised by soil sample validation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SoilError {
    #[error("Invalid soil sample: {0}")]
    InvalidSample(String),
}

/// Particle-size fractions of a soil horizon, in percent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SoilSample {
    pub clay_percent: f64,
    pub sand_percent: f64,
    pub silt_percent: f64,
}

impl SoilSample {
    pub fn new(clay_percent: f64, sand_percent: f64, silt_percent: f64) -> Self {
        Self {
            clay_percent,
            sand_percent,
            silt_percent,
        }
    }

    pub fn total(&self) -> f64 {
        self.clay_percent + self.sand_percent + self.silt_percent
    }

    /// Check the sample against the sum-to-100 invariant.
    ///
    /// Out-of-tolerance samples are rejected, never rescaled.
    pub fn validate(&self) -> Result<(), SoilError> {
        let fractions = [
            ("clay", self.clay_percent),
            ("sand", self.sand_percent),
            ("silt", self.silt_percent),
        ];
        for (name, value) in fractions {
            if !value.is_finite() {
                return Err(SoilError::InvalidSample(format!(
                    "{} fraction is not a finite number",
                    name
                )));
            }
            if value < 0.0 {
                return Err(SoilError::InvalidSample(format!(
                    "{} fraction cannot be negative ({})",
                    name, value
                )));
            }
            if value > 100.0 {
                return Err(SoilError::InvalidSample(format!(
                    "{} fraction cannot exceed 100 ({})",
                    name, value
                )));
            }
        }

        let total = self.total();
        if (total - 100.0).abs() > SUM_TOLERANCE {
            return Err(SoilError::InvalidSample(format!(
                "clay + sand + silt must sum to 100 ± {}, got {:.2}",
                SUM_TOLERANCE, total
            )));
        }
        Ok(())
    }
}

/// The twelve USDA soil texture classes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TextureClass {
    Sand,
    LoamySand,
    SandyLoam,
    Loam,
    SiltLoam,
    Silt,
    SandyClayLoam,
    ClayLoam,
    SiltyClayLoam,
    SandyClay,
    SiltyClay,
    Clay,
}

impl TextureClass {
    pub const ALL: [TextureClass; 12] = [
        TextureClass::Sand,
        TextureClass::LoamySand,
        TextureClass::SandyLoam,
        TextureClass::Loam,
        TextureClass::SiltLoam,
        TextureClass::Silt,
        TextureClass::SandyClayLoam,
        TextureClass::ClayLoam,
        TextureClass::SiltyClayLoam,
        TextureClass::SandyClay,
        TextureClass::SiltyClay,
        TextureClass::Clay,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TextureClass::Sand => "sand",
            TextureClass::LoamySand => "loamy sand",
            TextureClass::SandyLoam => "sandy loam",
            TextureClass::Loam => "loam",
            TextureClass::SiltLoam => "silt loam",
            TextureClass::Silt => "silt",
            TextureClass::SandyClayLoam => "sandy clay loam",
            TextureClass::ClayLoam => "clay loam",
            TextureClass::SiltyClayLoam => "silty clay loam",
            TextureClass::SandyClay => "sandy clay",
            TextureClass::SiltyClay => "silty clay",
            TextureClass::Clay => "clay",
        }
    }

    /// Broad drainage tendency used when assembling soil guidance
    pub fn drainage_tendency(&self) -> &'static str {
        match self {
            TextureClass::Sand | TextureClass::LoamySand | TextureClass::SandyLoam => {
                "drains quickly; nutrients and treatments leach readily"
            }
            TextureClass::Loam | TextureClass::SiltLoam | TextureClass::SandyClayLoam => {
                "moderate drainage and retention"
            }
            TextureClass::Silt | TextureClass::ClayLoam | TextureClass::SiltyClayLoam => {
                "slow drainage; prone to crusting and compaction"
            }
            TextureClass::SandyClay | TextureClass::SiltyClay | TextureClass::Clay => {
                "poor drainage; holds water and treatments near the surface"
            }
        }
    }
}

impl std::fmt::Display for TextureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Classify a particle-size sample into a USDA texture class.
///
/// Rules are evaluated in this exact order and the first match wins
/// (c = clay, s = sand, t = silt, all in percent):
///
/// 1. sand: `t + 1.5c <= 15`
/// 2. loamy sand: `t + 2c <= 30`
/// 3. silt: `t >= 80 && c <= 12`
/// 4. sandy clay: `c > 40 && s >= 45`
/// 5. silty clay: `c >= 40 && t > 40`
/// 6. clay: `c >= 40 && s < 45`
/// 7. sandy clay loam: `20 <= c <= 40 && s >= 45 && t < 28`
/// 8. clay loam: `27 <= c < 40 && 20 <= s < 45`
/// 9. silty clay loam: `27 <= c < 40 && s < 20`
/// 10. silt loam: `t >= 50 && c < 27`
/// 11. sandy loam: `(c < 20 && s >= 52) || c < 7`
/// 12. loam: everything else
///
/// Boundaries are inclusive toward the class nearer a triangle corner, so a
/// sample sitting exactly on a shared edge always resolves to one class.
pub fn classify_texture(sample: &SoilSample) -> Result<TextureClass, SoilError> {
    sample.validate()?;

    let c = sample.clay_percent;
    let s = sample.sand_percent;
    let t = sample.silt_percent;

    let class = if t + 1.5 * c <= 15.0 {
        TextureClass::Sand
    } else if t + 2.0 * c <= 30.0 {
        TextureClass::LoamySand
    } else if t >= 80.0 && c <= 12.0 {
        TextureClass::Silt
    } else if c > 40.0 && s >= 45.0 {
        TextureClass::SandyClay
    } else if c >= 40.0 && t > 40.0 {
        TextureClass::SiltyClay
    } else if c >= 40.0 && s < 45.0 {
        TextureClass::Clay
    } else if (20.0..=40.0).contains(&c) && s >= 45.0 && t < 28.0 {
        TextureClass::SandyClayLoam
    } else if (27.0..40.0).contains(&c) && (20.0..45.0).contains(&s) {
        TextureClass::ClayLoam
    } else if (27.0..40.0).contains(&c) && s < 20.0 {
        TextureClass::SiltyClayLoam
    } else if t >= 50.0 && c < 27.0 {
        TextureClass::SiltLoam
    } else if (c < 20.0 && s >= 52.0) || c < 7.0 {
        TextureClass::SandyLoam
    } else {
        TextureClass::Loam
    };

    Ok(class)
}

/// Chemistry attributes of the surface horizon, passed through as reported
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SoilChemistry {
    pub ph: Option<f64>,
    pub organic_matter_percent: Option<f64>,
    pub horizon_top_cm: Option<f64>,
    pub horizon_bottom_cm: Option<f64>,
}

/// Dominant soil at a location together with its derived texture
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoilProfile {
    pub soil_name: String,
    pub component_name: Option<String>,
    pub drainage_class: Option<String>,
    pub sample: SoilSample,
    pub texture: TextureClass,
    pub chemistry: SoilChemistry,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(clay: f64, sand: f64, silt: f64) -> TextureClass {
        classify_texture(&SoilSample::new(clay, sand, silt)).unwrap()
    }

    #[test]
    fn test_class_interiors() {
        assert_eq!(classify(3.0, 92.0, 5.0), TextureClass::Sand);
        assert_eq!(classify(6.0, 82.0, 12.0), TextureClass::LoamySand);
        assert_eq!(classify(10.0, 65.0, 25.0), TextureClass::SandyLoam);
        assert_eq!(classify(18.0, 40.0, 42.0), TextureClass::Loam);
        assert_eq!(classify(15.0, 20.0, 65.0), TextureClass::SiltLoam);
        assert_eq!(classify(5.0, 7.0, 88.0), TextureClass::Silt);
        assert_eq!(classify(27.0, 60.0, 13.0), TextureClass::SandyClayLoam);
        assert_eq!(classify(33.0, 32.0, 35.0), TextureClass::ClayLoam);
        assert_eq!(classify(33.0, 10.0, 57.0), TextureClass::SiltyClayLoam);
        assert_eq!(classify(45.0, 50.0, 5.0), TextureClass::SandyClay);
        assert_eq!(classify(47.0, 6.0, 47.0), TextureClass::SiltyClay);
        assert_eq!(classify(60.0, 20.0, 20.0), TextureClass::Clay);
    }

    #[test]
    fn test_regression_fixed_points() {
        assert_eq!(classify(40.0, 45.0, 15.0), TextureClass::SandyClayLoam);
        assert_eq!(classify(27.0, 20.0, 53.0), TextureClass::ClayLoam);
    }

    #[test]
    fn test_clay_over_clay_loam_on_shared_edge() {
        assert_eq!(classify(40.0, 30.0, 30.0), TextureClass::Clay);
        assert_eq!(classify(39.9, 30.1, 30.0), TextureClass::ClayLoam);
    }

    #[test]
    fn test_silt_corner_edges_inclusive() {
        assert_eq!(classify(12.0, 8.0, 80.0), TextureClass::Silt);
        assert_eq!(classify(12.5, 7.5, 80.0), TextureClass::SiltLoam);
        assert_eq!(classify(10.0, 40.0, 50.0), TextureClass::SiltLoam);
    }

    #[test]
    fn test_sand_corner_edges_inclusive() {
        // exactly on silt + 1.5 * clay = 15
        assert_eq!(classify(4.0, 87.0, 9.0), TextureClass::Sand);
        // exactly on silt + 2 * clay = 30
        assert_eq!(classify(5.0, 75.0, 20.0), TextureClass::LoamySand);
    }

    #[test]
    fn test_within_tolerance_is_accepted() {
        assert!(classify_texture(&SoilSample::new(20.0, 40.0, 40.4)).is_ok());
        assert!(classify_texture(&SoilSample::new(20.0, 40.0, 39.5)).is_ok());
    }

    #[test]
    fn test_rejects_bad_sums() {
        let err = classify_texture(&SoilSample::new(20.0, 40.0, 41.0)).unwrap_err();
        assert!(matches!(err, SoilError::InvalidSample(_)));
        assert!(classify_texture(&SoilSample::new(10.0, 10.0, 10.0)).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_fractions() {
        assert!(classify_texture(&SoilSample::new(-1.0, 51.0, 50.0)).is_err());
        assert!(classify_texture(&SoilSample::new(101.0, -1.0, 0.0)).is_err());
        assert!(classify_texture(&SoilSample::new(f64::NAN, 50.0, 50.0)).is_err());
    }

    #[test]
    fn test_texture_names() {
        assert_eq!(TextureClass::SiltyClayLoam.to_string(), "silty clay loam");
        assert_eq!(TextureClass::ALL.len(), 12);
    }
}
