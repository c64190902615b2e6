use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ProviderStatus {
    Success,
    Failed,
    NotConfigured,
}

/// Label assigned to an upload, either by a provider or by the threshold policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Verdict {
    AiGenerated,
    HumanMade,
    Unknown,
    Error,
    NotApplicable,
    /// Any provider label outside the common vocabulary, upper-cased.
    Other(String),
}

impl Verdict {
    /// Maps a provider's own label onto the common vocabulary.
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "ai" | "ai_generated" | "ai-generated" => Verdict::AiGenerated,
            "human" | "human_made" | "human-made" => Verdict::HumanMade,
            "" | "unknown" => Verdict::Unknown,
            "error" => Verdict::Error,
            "n/a" => Verdict::NotApplicable,
            _ => Verdict::Other(trimmed.to_uppercase()),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::AiGenerated => f.write_str("AI-Generated"),
            Verdict::HumanMade => f.write_str("Human-Made"),
            Verdict::Unknown => f.write_str("Unknown"),
            Verdict::Error => f.write_str("Error"),
            Verdict::NotApplicable => f.write_str("N/A"),
            Verdict::Other(label) => f.write_str(label),
        }
    }
}

impl From<String> for Verdict {
    fn from(value: String) -> Self {
        Verdict::from_label(&value)
    }
}

impl From<Verdict> for String {
    fn from(value: Verdict) -> Self {
        value.to_string()
    }
}

/// Certainty attached to a verdict. Serialized as a bare number or as `"N/A"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    Score(f64),
    NotApplicable,
}

impl Confidence {
    pub fn score(&self) -> Option<f64> {
        match self {
            Confidence::Score(value) => Some(*value),
            Confidence::NotApplicable => None,
        }
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Confidence::Score(value) => serializer.serialize_f64(*value),
            Confidence::NotApplicable => serializer.serialize_str("N/A"),
        }
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(Confidence::Score(value)),
            Raw::Text(text) => match text.trim().parse::<f64>() {
                Ok(value) => Ok(Confidence::Score(value)),
                Err(_) => Ok(Confidence::NotApplicable),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub service: String,
    pub status: ProviderStatus,
    pub verdict: Verdict,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProviderResult {
    pub fn success(service: impl Into<String>, verdict: Verdict, confidence: Confidence) -> Self {
        Self {
            service: service.into(),
            status: ProviderStatus::Success,
            verdict,
            confidence,
            detail: None,
        }
    }

    pub fn failed(service: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            status: ProviderStatus::Failed,
            verdict: Verdict::Error,
            confidence: Confidence::Score(0.0),
            detail: Some(detail.into()),
        }
    }

    pub fn not_configured(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            status: ProviderStatus::NotConfigured,
            verdict: Verdict::NotApplicable,
            confidence: Confidence::Score(0.0),
            detail: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub filename: String,
    pub aggregated_results: Vec<ProviderResult>,
    pub exif_data: String,
    pub google_reverse_search_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_coordinates: Option<GpsCoordinates>,
}
