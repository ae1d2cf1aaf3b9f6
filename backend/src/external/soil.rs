//! USDA Soil Data Access (SSURGO) client
//!
//! Queries the dominant component's surface horizon at a point and derives
//! its texture class. Samples that violate the sum-to-100 invariant are
//! reported as unavailable, never rescaled.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{classify_texture, GpsCoordinates, SoilChemistry, SoilProfile, SoilSample};

use super::{ensure_success, request_error, SoilProvider};
use crate::config::ServiceConfig;
use crate::error::{AppError, AppResult, Upstream};

/// Soil Data Access tabular client
#[derive(Clone)]
pub struct SoilDataAccessClient {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct SdaRequest<'a> {
    query: &'a str,
    format: &'a str,
}

/// SDA returns rows as arrays of (mostly string) cells
#[derive(Debug, Deserialize)]
pub struct SdaResponse {
    #[serde(rename = "Table", default)]
    table: Vec<Vec<Value>>,
}

impl SoilDataAccessClient {
    pub fn new(client: Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }
}

#[async_trait]
impl SoilProvider for SoilDataAccessClient {
    async fn soil_profile(&self, coordinates: GpsCoordinates) -> AppResult<SoilProfile> {
        let query = surface_horizon_query(coordinates);
        tracing::debug!(%coordinates, "Soil Data Access request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&SdaRequest {
                query: &query,
                format: "JSON",
            })
            .send()
            .await
            .map_err(|e| request_error(Upstream::Soil, e))?;

        let data: SdaResponse = ensure_success(Upstream::Soil, response)
            .await?
            .json()
            .await
            .map_err(|e| {
                AppError::SoilDataUnavailable(format!("Failed to parse soil response: {}", e))
            })?;

        profile_from_response(data)
    }
}

/// SQL selecting the surface horizon of the dominant component at a point
pub fn surface_horizon_query(coordinates: GpsCoordinates) -> String {
    format!(
        "SELECT TOP 1 \
            mu.muname AS soil_name, \
            c.compname AS component_name, \
            c.drainagecl AS drainage_class, \
            ch.sandtotal_r AS sand_percent, \
            ch.silttotal_r AS silt_percent, \
            ch.claytotal_r AS clay_percent, \
            ch.ph1to1h2o_r AS ph, \
            ch.om_r AS organic_matter_percent, \
            ch.hzdept_r AS horizon_top_cm, \
            ch.hzdepb_r AS horizon_bottom_cm \
        FROM mapunit AS mu \
        INNER JOIN component AS c ON mu.mukey = c.mukey \
        INNER JOIN chorizon AS ch ON c.cokey = ch.cokey \
        WHERE mu.mukey IN ( \
            SELECT * FROM SDA_Get_Mukey_from_intersection_with_WktWgs84('point({lon} {lat})') \
        ) \
        AND c.comppct_r = (SELECT MAX(c2.comppct_r) FROM component AS c2 WHERE c2.mukey = mu.mukey) \
        AND ch.hzdept_r = 0 \
        ORDER BY c.comppct_r DESC",
        lon = coordinates.longitude,
        lat = coordinates.latitude,
    )
}

/// Build a profile from the first row of an SDA response
pub fn profile_from_response(data: SdaResponse) -> AppResult<SoilProfile> {
    let row = data.table.into_iter().next().ok_or_else(|| {
        AppError::SoilDataUnavailable("no soil survey coverage at this location".to_string())
    })?;

    let text = |i: usize| row.get(i).and_then(cell_text);
    let number = |i: usize| row.get(i).and_then(cell_number);

    let (Some(sand), Some(silt), Some(clay)) = (number(3), number(4), number(5)) else {
        return Err(AppError::SoilDataUnavailable(
            "surface horizon has no particle-size data".to_string(),
        ));
    };

    let sample = SoilSample::new(clay, sand, silt);
    let texture = classify_texture(&sample)
        .map_err(|e| AppError::SoilDataUnavailable(e.to_string()))?;

    Ok(SoilProfile {
        soil_name: text(0).unwrap_or_else(|| "Unnamed map unit".to_string()),
        component_name: text(1),
        drainage_class: text(2),
        sample,
        texture,
        chemistry: SoilChemistry {
            ph: number(6),
            organic_matter_percent: number(7),
            horizon_top_cm: number(8),
            horizon_bottom_cm: number(9),
        },
    })
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() && s != "None" => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn cell_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
