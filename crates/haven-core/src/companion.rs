//! Calming text features around the charts: the daily quote, short
//! aphorisms, headline de-noising and the future-self letter.
//!
//! Every generated feature has a static fallback, so callers always get
//! displayable text; `fallback` tells them which one they got.

use serde::{Deserialize, Serialize};
use serde_json::json;
use time::Date;
use tracing::warn;

use crate::genai::{GenerationRequest, TextGenerator};
use crate::ValidationError;

pub const HEALING_QUOTES: [&str; 6] = [
    "Stretch time out far enough and volatility becomes scenery.",
    "You do not need to watch the market every second.",
    "Long-term trends are more honest than short-term noise.",
    "Staying the course is a return in itself.",
    "Sit still, and watch everything grow.",
    "The seeds of wealth need patience, not screaming.",
];

const WISDOM_FALLBACK: &str = "Water does not race to be first; it seeks to flow without end.";
const LETTER_FALLBACK: &str = "Close your eyes and breathe. Ten years from now I am still here, \
     and the ripples you feel today have long since joined a calm sea.";

const MENTOR_INSTRUCTION: &str = "You are a long-horizon investing mentor. Strip emotional \
     language from financial news and restate it as neutral, factual market description.";
const ZEN_INSTRUCTION: &str = "You are a master of meditation and long-term investing. \
     Your words settle the reader instantly.";
const FUTURE_SELF_INSTRUCTION: &str = "You are the reader's calm future self, ten years on, \
     an elegant long-term investor with the patience of a seasoned value investor.";

const MAX_EMOTION_LEVEL: u8 = 10;

/// Quote of the day, chosen by day of year.
pub fn daily_quote(date: Date) -> &'static str {
    HEALING_QUOTES[usize::from(date.ordinal()) % HEALING_QUOTES.len()]
}

/// Generated or fallback text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanionText {
    pub text: String,
    pub fallback: bool,
}

impl CompanionText {
    fn generated(text: String) -> Self {
        Self {
            text,
            fallback: false,
        }
    }

    fn fallback(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            fallback: true,
        }
    }
}

/// A sensational headline restated calmly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenoisedHeadline {
    pub calm_description: String,
    /// 0 (calm) to 10 (panic).
    pub emotion_level: u8,
    pub mindset_tip: String,
    #[serde(default)]
    pub fallback: bool,
}

impl DenoisedHeadline {
    fn neutral() -> Self {
        Self {
            calm_description: String::from("The market is going through a short-term repricing."),
            emotion_level: 5,
            mindset_tip: String::from("Volatility is the market's normal state. Keep your breathing even."),
            fallback: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDenoised {
    calm_description: String,
    emotion_level: f64,
    mindset_tip: String,
}

pub async fn zen_wisdom(generator: &dyn TextGenerator) -> CompanionText {
    let request = GenerationRequest::new(
        "Write a short steadying verse, 30 to 50 words, for a long-term investor facing market swings.",
    )
    .with_system_instruction(ZEN_INSTRUCTION)
    .with_temperature(0.9);

    match generator.generate(request).await {
        Ok(response) if !response.text.trim().is_empty() => {
            CompanionText::generated(response.text.trim().to_owned())
        }
        Ok(_) => CompanionText::fallback(WISDOM_FALLBACK),
        Err(error) => {
            warn!(code = error.code(), "wisdom generation failed; using fallback");
            CompanionText::fallback(WISDOM_FALLBACK)
        }
    }
}

pub async fn denoise_headline(
    generator: &dyn TextGenerator,
    headline: &str,
) -> Result<DenoisedHeadline, ValidationError> {
    let headline = headline.trim();
    if headline.is_empty() {
        return Err(ValidationError::EmptyText { field: "headline" });
    }

    let request = GenerationRequest::new(format!(
        "Restate this sensational or alarming financial headline as a calm factual description:\n\n\"{headline}\""
    ))
    .with_system_instruction(MENTOR_INSTRUCTION)
    .with_response_schema(json!({
        "type": "OBJECT",
        "properties": {
            "calmDescription": { "type": "STRING" },
            "emotionLevel": { "type": "NUMBER" },
            "mindsetTip": { "type": "STRING" }
        },
        "required": ["calmDescription", "emotionLevel", "mindsetTip"]
    }));

    let response = match generator.generate(request).await {
        Ok(response) => response,
        Err(error) => {
            warn!(code = error.code(), "headline denoise failed; using neutral result");
            return Ok(DenoisedHeadline::neutral());
        }
    };

    match serde_json::from_str::<RawDenoised>(response.text.trim()) {
        Ok(raw) => Ok(DenoisedHeadline {
            calm_description: raw.calm_description,
            emotion_level: clamp_emotion(raw.emotion_level),
            mindset_tip: raw.mindset_tip,
            fallback: false,
        }),
        Err(error) => {
            warn!(%error, "headline denoise response did not parse; using neutral result");
            Ok(DenoisedHeadline::neutral())
        }
    }
}

pub async fn future_letter(
    generator: &dyn TextGenerator,
    message: &str,
) -> Result<CompanionText, ValidationError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ValidationError::EmptyText { field: "message" });
    }

    let request = GenerationRequest::new(format!(
        "My present self wrote you this letter:\n\n\"{message}\"\n\nReply as my future self \
         ten years from now, briefly and warmly."
    ))
    .with_system_instruction(FUTURE_SELF_INSTRUCTION);

    Ok(match generator.generate(request).await {
        Ok(response) if !response.text.trim().is_empty() => {
            CompanionText::generated(response.text.trim().to_owned())
        }
        Ok(_) => CompanionText::fallback(LETTER_FALLBACK),
        Err(error) => {
            warn!(code = error.code(), "future letter generation failed; using fallback");
            CompanionText::fallback(LETTER_FALLBACK)
        }
    })
}

fn clamp_emotion(level: f64) -> u8 {
    if !level.is_finite() {
        return 5;
    }
    level.round().clamp(0.0, f64::from(MAX_EMOTION_LEVEL)) as u8
}
