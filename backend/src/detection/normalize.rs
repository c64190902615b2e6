use shared::{Confidence, Verdict};

use super::{Detection, ProviderError};

/// Probabilities strictly above this are labelled AI-Generated.
pub const AI_PROBABILITY_THRESHOLD: f64 = 0.5;

/// Threshold policy for providers that only report P(AI-generated).
///
/// `p > 0.5` gives AI-Generated with confidence `p`; anything else gives
/// Human-Made with confidence `1 - p`.
pub fn classify_probability(p: f64) -> Result<Detection, ProviderError> {
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(ProviderError::InvalidScore(p));
    }

    let detection = if p > AI_PROBABILITY_THRESHOLD {
        Detection {
            verdict: Verdict::AiGenerated,
            confidence: Confidence::Score(p),
        }
    } else {
        Detection {
            verdict: Verdict::HumanMade,
            confidence: Confidence::Score(1.0 - p),
        }
    };
    Ok(detection)
}

/// Passthrough policy for providers that already return a label and a score.
pub fn passthrough(verdict: Option<&str>, confidence: Option<f64>) -> Detection {
    Detection {
        verdict: verdict.map(Verdict::from_label).unwrap_or(Verdict::Unknown),
        confidence: confidence
            .filter(|c| c.is_finite())
            .map(Confidence::Score)
            .unwrap_or(Confidence::NotApplicable),
    }
}
