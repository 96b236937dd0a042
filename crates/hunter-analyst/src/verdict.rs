//! Verdicts, risk levels and parsing of the model reply

use crate::error::{AnalystError, Result};
use crate::persona::Persona;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// Recommendation derived from the score band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Buy,
    Hold,
    Sell,
    /// No verdict could be obtained
    Error,
}

impl Verdict {
    /// Highest score that still means SELL
    pub const SELL_MAX: u8 = 45;
    /// Highest score that still means HOLD
    pub const HOLD_MAX: u8 = 65;

    /// The only verdict consistent with `score`
    pub fn for_score(score: u8) -> Self {
        match score {
            0..=Self::SELL_MAX => Verdict::Sell,
            s if s <= Self::HOLD_MAX => Verdict::Hold,
            _ => Verdict::Buy,
        }
    }

    /// Read a free-form label such as "Strong Buy" or "sell"
    pub fn from_label(label: &str) -> Option<Self> {
        let upper = label.to_uppercase();
        if upper.contains("SELL") {
            Some(Verdict::Sell)
        } else if upper.contains("BUY") {
            Some(Verdict::Buy)
        } else if upper.contains("HOLD") {
            Some(Verdict::Hold)
        } else if upper.contains("ERROR") {
            Some(Verdict::Error)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Buy => "BUY",
            Verdict::Hold => "HOLD",
            Verdict::Sell => "SELL",
            Verdict::Error => "ERROR",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Verdict::Buy => "🟢",
            Verdict::Hold => "🟡",
            Verdict::Sell => "🔴",
            Verdict::Error => "⚠️",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk level, normalised from whatever the model wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Risk {
    Low,
    Medium,
    High,
    Unknown,
}

impl Risk {
    pub fn normalise(label: &str) -> Self {
        let upper = label.trim().to_uppercase();
        if upper.starts_with("LOW") || upper.contains("FAIBLE") {
            Risk::Low
        } else if upper.starts_with("MED") || upper.starts_with("MOD") || upper.contains("MOYEN") {
            Risk::Medium
        } else if upper.starts_with("HIGH")
            || upper.starts_with("VERY HIGH")
            || upper.contains("ELEV")
            || upper.contains("ÉLEV")
        {
            Risk::High
        } else {
            Risk::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Risk::Low => "LOW",
            Risk::Medium => "MEDIUM",
            Risk::High => "HIGH",
            Risk::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persona's verdict on a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub persona: Persona,
    pub verdict: Verdict,
    /// Always within 0..=100
    pub score: u8,
    pub thesis: String,
    pub risk: Risk,
    /// The model's own verdict was missing or contradicted the score band
    pub corrected: bool,
}

impl Analysis {
    /// Placeholder shown in place of a verdict when the call failed
    pub fn error(persona: Persona, message: impl Into<String>) -> Self {
        Self {
            persona,
            verdict: Verdict::Error,
            score: 0,
            thesis: message.into(),
            risk: Risk::High,
            corrected: false,
        }
    }

    pub fn is_error(&self) -> bool {
        self.verdict == Verdict::Error
    }

    /// Parse a model reply, enforcing score/verdict coherence
    pub fn parse(persona: Persona, reply: &str) -> Result<Self> {
        let json = extract_json(reply)
            .ok_or_else(|| AnalystError::InvalidResponse("no JSON object in reply".to_string()))?;
        let value: Value = serde_json::from_str(json)
            .map_err(|e| AnalystError::InvalidResponse(format!("malformed JSON: {e}")))?;
        let Value::Object(object) = value else {
            return Err(AnalystError::InvalidResponse("reply is not a JSON object".to_string()));
        };
        let fields = lowercase_keys(object);

        let score = fields
            .get("score")
            .and_then(parse_score)
            .ok_or_else(|| AnalystError::InvalidResponse("missing or non-numeric score".to_string()))?;

        let band = Verdict::for_score(score);
        let stated = fields
            .get("verdict")
            .and_then(Value::as_str)
            .and_then(Verdict::from_label);

        let corrected = stated != Some(band);
        if corrected {
            warn!(
                %persona,
                score,
                stated = stated.map_or("missing", Verdict::as_str),
                enforced = %band,
                "Verdict disagrees with score band, using the band"
            );
        }

        let thesis = fields
            .get("thesis")
            .and_then(Value::as_str)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "No thesis given.".to_string());

        let risk = fields
            .get("risk")
            .and_then(Value::as_str)
            .map_or(Risk::Unknown, Risk::normalise);

        Ok(Self {
            persona,
            verdict: band,
            score,
            thesis,
            risk,
            corrected,
        })
    }
}

fn lowercase_keys(object: Map<String, Value>) -> Map<String, Value> {
    object
        .into_iter()
        .map(|(k, v)| (k.trim().to_lowercase(), v))
        .collect()
}

/// Score as integer, float or numeric string ("72", "72/100"), clamped to 0..=100
fn parse_score(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let number: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            number.parse::<f64>().ok()?
        }
        _ => return None,
    };

    raw.is_finite().then(|| raw.round().clamp(0.0, 100.0) as u8)
}

/// The JSON object inside a reply: a ```json fence first, else the outermost braces
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bands() {
        assert_eq!(Verdict::for_score(0), Verdict::Sell);
        assert_eq!(Verdict::for_score(45), Verdict::Sell);
        assert_eq!(Verdict::for_score(46), Verdict::Hold);
        assert_eq!(Verdict::for_score(65), Verdict::Hold);
        assert_eq!(Verdict::for_score(66), Verdict::Buy);
        assert_eq!(Verdict::for_score(100), Verdict::Buy);
    }

    #[test]
    fn test_parse_plain_json() {
        let reply = r#"{"verdict": "BUY", "score": 82, "thesis": "Wide moat.", "risk": "LOW"}"#;
        let analysis = Analysis::parse(Persona::Warren, reply).unwrap();

        assert_eq!(analysis.verdict, Verdict::Buy);
        assert_eq!(analysis.score, 82);
        assert_eq!(analysis.thesis, "Wide moat.");
        assert_eq!(analysis.risk, Risk::Low);
        assert!(!analysis.corrected);
    }

    #[test]
    fn test_band_wins_over_stated_verdict() {
        let reply = r#"{"verdict": "SELL", "score": 60, "thesis": "Meh.", "risk": "Medium"}"#;
        let analysis = Analysis::parse(Persona::Jim, reply).unwrap();

        assert_eq!(analysis.verdict, Verdict::Hold);
        assert!(analysis.corrected);
    }

    #[test]
    fn test_fenced_reply_with_prose() {
        let reply = "Sure! Here is my take:\n```json\n{\"Verdict\": \"Strong Buy\", \"Score\": \"91/100\", \"Thesis\": \"Exponential.\", \"Risk\": \"high\"}\n```\nCheers";
        let analysis = Analysis::parse(Persona::Cathie, reply).unwrap();

        assert_eq!(analysis.verdict, Verdict::Buy);
        assert_eq!(analysis.score, 91);
        assert_eq!(analysis.risk, Risk::High);
        assert!(!analysis.corrected);
    }

    #[test]
    fn test_score_clamped_and_rounded() {
        let high = Analysis::parse(Persona::Jim, r#"{"verdict":"BUY","score":140}"#).unwrap();
        assert_eq!(high.score, 100);

        let low = Analysis::parse(Persona::Jim, r#"{"verdict":"SELL","score":-5}"#).unwrap();
        assert_eq!(low.score, 0);

        let float = Analysis::parse(Persona::Jim, r#"{"verdict":"HOLD","score":55.6}"#).unwrap();
        assert_eq!(float.score, 56);
        assert_eq!(float.risk, Risk::Unknown);
        assert_eq!(float.thesis, "No thesis given.");
    }

    #[test]
    fn test_missing_verdict_filled_from_band() {
        let analysis = Analysis::parse(Persona::Warren, r#"{"score": 30}"#).unwrap();
        assert_eq!(analysis.verdict, Verdict::Sell);
        assert!(analysis.corrected);
    }

    #[test]
    fn test_invalid_replies() {
        assert!(Analysis::parse(Persona::Warren, "I cannot help with that").is_err());
        assert!(Analysis::parse(Persona::Warren, r#"{"verdict": "BUY"}"#).is_err());
        assert!(Analysis::parse(Persona::Warren, r#"{"score": "high"}"#).is_err());
        assert!(Analysis::parse(Persona::Warren, "{not json}").is_err());
    }

    #[test]
    fn test_extract_json() {
        assert_eq!(extract_json("x {\"a\":1} y"), Some("{\"a\":1}"));
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), Some("{\"a\":1}"));
        assert_eq!(extract_json("no braces"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_error_placeholder() {
        let analysis = Analysis::error(Persona::Cathie, "Missing API key");
        assert!(analysis.is_error());
        assert_eq!(analysis.score, 0);
        assert_eq!(analysis.risk, Risk::High);
        assert_eq!(analysis.thesis, "Missing API key");
    }

    #[test]
    fn test_risk_normalise() {
        assert_eq!(Risk::normalise("low"), Risk::Low);
        assert_eq!(Risk::normalise("Moderate"), Risk::Medium);
        assert_eq!(Risk::normalise("MEDIUM-HIGH"), Risk::Medium);
        assert_eq!(Risk::normalise("Élevé"), Risk::High);
        assert_eq!(Risk::normalise("?"), Risk::Unknown);
    }
}
