//! Risk score extraction from agent analysis text.
//!
//! The risk analyser replies in prose, so the score is recovered with a
//! chain of patterns tried in order of specificity. A pattern only wins with
//! a value in the 0-100 range; out-of-range captures fall through to the
//! next pattern. When no numeric score can be found at all, the wording of
//! the assessment picks a representative score so the pipeline always has a
//! number to classify.

use once_cell::sync::Lazy;
use regex::Regex;

/// Version label attached to model predictions
pub const MODEL_VERSION: &str = "v2.3.1";

/// Feature attribution reported with every prediction
pub const TOP_FEATURE: &str = "general_risk_assessment";

static SCORE_PATTERNS: Lazy<[Regex; 6]> = Lazy::new(|| {
    [
        Regex::new(r"risk\s*score[:\s]*(\d{1,3})(?:\s*/\s*100)?").expect("valid regex"),
        Regex::new(r"score[:\s]*(\d{1,3})\s*/\s*100").expect("valid regex"),
        Regex::new(r"(\d{1,3})\s*(?:out of|/)\s*100").expect("valid regex"),
        Regex::new(r"\*\*risk[:\s]*(\d{1,3})\*\*").expect("valid regex"),
        Regex::new(r"overall\s*risk[:\s]*(\d{1,3})").expect("valid regex"),
        Regex::new(r"assessment[:\s]*(\d{1,3})").expect("valid regex"),
    ]
});

static HIGH_WORDING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(high|critical|severe)\s*(risk)?").expect("valid regex"));
static MEDIUM_WORDING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(medium|moderate)\s*(risk)?").expect("valid regex"));
static LOW_WORDING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(low|minimal)\s*(risk)?").expect("valid regex"));

/// Extract a 0-100 risk score from free-form analysis text
pub fn parse_risk_score(text: &str) -> u8 {
    let lowered = text.to_lowercase();

    for pattern in SCORE_PATTERNS.iter() {
        if let Some(score) = pattern
            .captures(&lowered)
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|score| *score <= 100)
        {
            return score as u8;
        }
    }

    score_from_wording(&lowered)
}

/// Representative score when the text carries no usable number
fn score_from_wording(lowered: &str) -> u8 {
    if HIGH_WORDING.is_match(lowered) {
        85
    } else if MEDIUM_WORDING.is_match(lowered) {
        55
    } else if LOW_WORDING.is_match(lowered) {
        25
    } else {
        50
    }
}

/// Confidence proxy: how far the score sits from the 50-point midpoint,
/// normalized to 0.0 (undecided) through 1.0 (certain either way)
pub fn model_confidence(score: u8) -> f64 {
    (f64::from(score) - 50.0).abs() / 50.0
}
