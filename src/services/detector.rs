use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::change::{
    AnalysisWindow, ChangeResult, ChangeThresholds, ImageryDescriptor, ThumbnailParams,
    VisualizationParams,
};

/// Sentinel-2 surface reflectance, harmonized.
pub const SENTINEL2_COLLECTION: &str = "COPERNICUS/S2_SR_HARMONIZED";

/// Pixel scale in meters for the area reduction.
const ANALYSIS_SCALE_METERS: u32 = 10;

/// Land-cover change analysis between two time windows.
#[async_trait]
pub trait ChangeDetector: Send + Sync {
    async fn detect(
        &self,
        geometry: &serde_json::Value,
        baseline: AnalysisWindow,
        recent: AnalysisWindow,
    ) -> Result<ChangeResult, DetectorError>;
}

/// Turns a stored descriptor into a viewable thumbnail URL.
#[async_trait]
pub trait ThumbnailRenderer: Send + Sync {
    async fn render_thumbnail(&self, descriptor: &ImageryDescriptor) -> Result<String, DetectorError>;
}

/// Build the descriptor used to regenerate a composite for one window.
pub fn imagery_descriptor(geometry: &serde_json::Value, window: AnalysisWindow) -> ImageryDescriptor {
    ImageryDescriptor {
        collection: SENTINEL2_COLLECTION.to_string(),
        geometry: geometry.clone(),
        window,
        visualization: VisualizationParams::default(),
        thumbnail: ThumbnailParams::default(),
    }
}

/// Turn the service's reported change area into a [`ChangeResult`].
///
/// An empty reduction (no changed pixels) comes back as null and means zero.
pub fn result_from_area(
    area_sq_meters: Option<f64>,
    thresholds: ChangeThresholds,
    geometry: &serde_json::Value,
    baseline: AnalysisWindow,
    recent: AnalysisWindow,
) -> Result<ChangeResult, DetectorError> {
    let area = area_sq_meters.unwrap_or(0.0);
    if !area.is_finite() || area < 0.0 {
        return Err(DetectorError::InvalidResponse(format!(
            "area_sq_meters out of range: {}",
            area
        )));
    }

    Ok(ChangeResult {
        significant_change_detected: thresholds.is_significant(area),
        area_sq_meters: area,
        before: imagery_descriptor(geometry, baseline),
        after: imagery_descriptor(geometry, recent),
    })
}

fn remote_error(status: StatusCode, body: Option<String>) -> DetectorError {
    DetectorError::Remote {
        status: status.as_u16(),
        message: body.unwrap_or_else(|| "(no body)".to_string()),
    }
}

/// Client for the remote geospatial compute service.
///
/// The service builds cloud-masked median composites for both windows,
/// computes the NDVI delta and returns the area of pixels whose NDVI
/// dropped by more than the threshold.
pub struct GeoComputeClient {
    http: Client,
    base_url: String,
    api_token: String,
    thresholds: ChangeThresholds,
}

#[derive(Serialize)]
struct ChangeAreaRequest<'a> {
    geometry: &'a serde_json::Value,
    collection: &'a str,
    baseline: AnalysisWindow,
    recent: AnalysisWindow,
    ndvi_drop_threshold: f64,
    scale: u32,
}

#[derive(Deserialize)]
struct ChangeAreaResponse {
    #[serde(default)]
    area_sq_meters: Option<f64>,
}

#[derive(Deserialize)]
struct ThumbnailResponse {
    url: String,
}

impl GeoComputeClient {
    pub fn new(
        base_url: &str,
        api_token: &str,
        thresholds: ChangeThresholds,
        timeout: Duration,
    ) -> Result<Self, DetectorError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aoi-watch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            thresholds,
        })
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, DetectorError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(remote_error(status, response.text().await.ok()));
        }

        response.json::<R>().await.map_err(DetectorError::Http)
    }
}

#[async_trait]
impl ChangeDetector for GeoComputeClient {
    async fn detect(
        &self,
        geometry: &serde_json::Value,
        baseline: AnalysisWindow,
        recent: AnalysisWindow,
    ) -> Result<ChangeResult, DetectorError> {
        let request = ChangeAreaRequest {
            geometry,
            collection: SENTINEL2_COLLECTION,
            baseline,
            recent,
            ndvi_drop_threshold: self.thresholds.ndvi_drop,
            scale: ANALYSIS_SCALE_METERS,
        };

        let response: ChangeAreaResponse = self.post_json("/v1/change-area", &request).await?;
        let result = result_from_area(response.area_sq_meters, self.thresholds, geometry, baseline, recent)?;

        tracing::debug!(area_sq_meters = result.area_sq_meters, "Change area computed");
        Ok(result)
    }
}

#[async_trait]
impl ThumbnailRenderer for GeoComputeClient {
    async fn render_thumbnail(&self, descriptor: &ImageryDescriptor) -> Result<String, DetectorError> {
        let response: ThumbnailResponse = self.post_json("/v1/thumbnail", descriptor).await?;
        Ok(response.url)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Compute service returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Unexpected compute service response: {0}")]
    InvalidResponse(String),

    #[error("Change detection timed out after {0:?}")]
    Timeout(Duration),
}
