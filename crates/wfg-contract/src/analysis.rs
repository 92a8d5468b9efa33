use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const REFERENCE_ANALYSIS_PATH: &str = "artifacts/reference_analysis.json";

pub const REQUIRED_ASSET_FIELDS: [&str; 6] = ["asset_id", "type", "sha256", "metadata", "derived_features", "timestamp"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("reference analysis not found at {0}")]
    NotFound(String),
    #[error("reference analysis could not be parsed: {0}")]
    Parse(String),
    #[error("reference analysis lists no assets")]
    Empty,
    #[error("asset #{index} is missing `{field}`")]
    MissingField { index: usize, field: String },
}

impl AnalysisError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            AnalysisError::NotFound(_) => "not_found",
            AnalysisError::Parse(_) => "parse_error",
            AnalysisError::Empty => "empty",
            AnalysisError::MissingField { .. } => "missing_field",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceAnalysis {
    #[serde(default)]
    pub assets: Vec<AnalyzedAsset>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedAsset {
    #[serde(alias = "assetId")]
    pub asset_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(alias = "digest")]
    pub sha256: String,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, alias = "derivedFeatures")]
    pub derived_features: Value,
    /// Producers write ISO strings or epoch numbers; kept as given.
    #[serde(default)]
    pub timestamp: Value,
}

impl ReferenceAnalysis {
    pub fn asset(&self, asset_id: &str) -> Option<&AnalyzedAsset> {
        self.assets.iter().find(|a| a.asset_id == asset_id)
    }
}

pub fn reference_analysis_path(root: &Path) -> PathBuf {
    root.join(REFERENCE_ANALYSIS_PATH)
}

fn field_missing(asset: &Value, field: &str) -> bool {
    let get = |k: &str| asset.get(k).filter(|v| !v.is_null());
    let alias = match field {
        "asset_id" => "assetId",
        "sha256" => "digest",
        "derived_features" => "derivedFeatures",
        other => other,
    };
    get(field).or_else(|| get(alias)).is_none()
}

/// Checks the raw document first so that a missing field is reported by
/// index and name rather than as a generic parse failure.
pub fn parse_reference_analysis(raw: &str) -> Result<ReferenceAnalysis, AnalysisError> {
    let doc: Value = serde_json::from_str(raw).map_err(|e| AnalysisError::Parse(e.to_string()))?;
    let assets = match doc.get("assets") {
        None | Some(Value::Null) => return Err(AnalysisError::Empty),
        Some(Value::Array(a)) => a,
        Some(_) => return Err(AnalysisError::Parse("`assets` must be an array".to_string())),
    };
    if assets.is_empty() {
        return Err(AnalysisError::Empty);
    }
    for (index, asset) in assets.iter().enumerate() {
        if let Some(field) = REQUIRED_ASSET_FIELDS.iter().find(|f| field_missing(asset, f)) {
            return Err(AnalysisError::MissingField {
                index,
                field: field.to_string(),
            });
        }
    }
    serde_json::from_value(doc).map_err(|e| AnalysisError::Parse(e.to_string()))
}

pub fn validate_reference_analysis(root: &Path) -> Result<ReferenceAnalysis, AnalysisError> {
    let path = reference_analysis_path(root);
    if !path.is_file() {
        return Err(AnalysisError::NotFound(path.to_string_lossy().into_owned()));
    }
    let raw = std::fs::read_to_string(&path).map_err(|e| AnalysisError::Parse(e.to_string()))?;
    parse_reference_analysis(&raw)
}
