//! Artifact formats and sidecar metadata
//!
//! Every persisted model is a pair of files: the artifact (the serialized
//! ensemble) and a sidecar JSON. The sidecar is the source of truth for
//! the feature column order and for the artifact's format; the loader
//! dispatches on the declared format and refuses anything unknown rather
//! than sniffing bytes.

use rkyv::Deserialize as _;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use renta_common::{CityKey, ErrorCode, PropertyId, RentaError, Result};
use renta_ml::GradientBoostingRegressor;

use crate::config::ModelConfig;

/// Serialization format of a model artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// serde JSON, the native format
    Json,
    /// rkyv binary, the fallback when JSON encoding is unavailable
    Rkyv,
}

impl ArtifactFormat {
    /// File extension used for artifacts of this format
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Json => "json",
            ArtifactFormat::Rkyv => "bin",
        }
    }

    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactFormat::Json => "json",
            ArtifactFormat::Rkyv => "rkyv",
        }
    }
}

/// Sidecar metadata persisted next to every artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sidecar {
    /// Owning property, for demand models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<String>,
    /// Owning city, for market-demand models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Owning country, for market-demand models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Ordered feature column list the model was trained with
    pub feature_columns: Vec<String>,
    /// Hyperparameters the model was trained with
    pub config: ModelConfig,
    /// Artifact serialization format
    pub format: ArtifactFormat,
    /// RFC 3339 save timestamp; doubles as the cache-invalidation token
    pub saved_at: String,
}

impl Sidecar {
    /// Sidecar for a per-property demand model
    pub fn for_property(
        property: &PropertyId,
        feature_columns: Vec<String>,
        config: ModelConfig,
    ) -> Self {
        Self {
            property_id: Some(property.as_str().to_string()),
            city: None,
            country: None,
            feature_columns,
            config,
            format: ArtifactFormat::Json,
            saved_at: now_rfc3339(),
        }
    }

    /// Sidecar for a city-level market-demand model
    pub fn for_market(key: &CityKey, feature_columns: Vec<String>, config: ModelConfig) -> Self {
        Self {
            property_id: None,
            city: Some(key.city.clone()),
            country: Some(key.country.clone()),
            feature_columns,
            config,
            format: ArtifactFormat::Json,
            saved_at: now_rfc3339(),
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Serialize a model, JSON first with rkyv as the fallback.
///
/// Returns the bytes together with the format that actually got used, so
/// the caller can declare it in the sidecar.
pub(crate) fn encode_model(
    model: &GradientBoostingRegressor,
) -> Result<(Vec<u8>, ArtifactFormat)> {
    match serde_json::to_vec_pretty(model) {
        Ok(bytes) => Ok((bytes, ArtifactFormat::Json)),
        Err(json_err) => {
            renta_common::nonfatal::observe("artifact_json_encode", "model", &json_err);
            let bytes = rkyv::to_bytes::<_, 4096>(model).map_err(|e| {
                RentaError::new(
                    ErrorCode::SerializationFailed,
                    format!("rkyv fallback encoding failed: {}", e),
                )
            })?;
            Ok((bytes.into_vec(), ArtifactFormat::Rkyv))
        }
    }
}

/// Deserialize a model according to the sidecar-declared format.
pub(crate) fn decode_model(
    bytes: &[u8],
    format: ArtifactFormat,
) -> Result<GradientBoostingRegressor> {
    match format {
        ArtifactFormat::Json => serde_json::from_slice(bytes).map_err(|e| {
            RentaError::new(
                ErrorCode::ArtifactCorrupt,
                format!("artifact is not valid JSON for a model: {}", e),
            )
        }),
        ArtifactFormat::Rkyv => {
            let archived = rkyv::check_archived_root::<GradientBoostingRegressor>(bytes)
                .map_err(|e| {
                    RentaError::new(
                        ErrorCode::ArtifactCorrupt,
                        format!("artifact failed rkyv validation: {}", e),
                    )
                })?;
            archived.deserialize(&mut rkyv::Infallible).map_err(|_| {
                RentaError::new(ErrorCode::ArtifactCorrupt, "rkyv deserialization failed")
            })
        }
    }
}
