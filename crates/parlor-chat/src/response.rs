//! Canned reply generation.
//!
//! Maps a user message to a fixed advisory reply by case-insensitive keyword
//! match. No model is invoked. [`ResponseSource`] is the seam a real model
//! would plug into.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;

use crate::types::{Artifact, ArtifactKind};

// =============================================================================
// Reply
// =============================================================================

/// Body and optional artifacts of an assistant reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub content: String,
    pub artifacts: Vec<Artifact>,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            artifacts: vec![],
        }
    }
}

/// Anything that can answer a user message.
pub trait ResponseSource: Send + Sync {
    fn respond(&self, text: &str) -> Reply;
}

// =============================================================================
// Keyword rules
// =============================================================================

const TOMATO_REPLY: &str = "Yellowing leaves with dark spots on tomatoes usually point to early \
blight or septoria leaf spot. Remove affected leaves, avoid overhead watering, and consider a \
copper-based fungicide if it spreads.";

const SOIL_REPLY: &str = "A soil test is the best place to start. Sample several spots at 6 inch \
depth, mix them, and check pH plus nitrogen, phosphorus and potassium. Most vegetables prefer a \
pH between 6.0 and 7.0.";

const CROP_REPLY: &str = "Rotating crop families each season breaks pest and disease cycles. A \
simple plan is to follow heavy feeders like corn with legumes, then root crops.";

const CLARIFY_REPLY: &str = "Could you tell me a bit more about what you're seeing? Details like \
the plant, the symptoms and recent weather help me give better advice.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topic {
    Tomato,
    Soil,
    Crop,
}

struct Rule {
    pattern: Regex,
    topic: Topic,
}

/// Rules are checked in order; the first match wins.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    [
        (r"(?i)tomato", Topic::Tomato),
        (r"(?i)soil", Topic::Soil),
        (r"(?i)crop", Topic::Crop),
    ]
    .into_iter()
    .map(|(p, topic)| Rule {
        pattern: Regex::new(p).expect("Invalid keyword regex"),
        topic,
    })
    .collect()
});

fn classify(text: &str) -> Option<Topic> {
    RULES
        .iter()
        .find(|rule| rule.pattern.is_match(text))
        .map(|rule| rule.topic)
}

// =============================================================================
// ResponseGenerator
// =============================================================================

/// Deterministic keyword-matched responder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseGenerator;

impl ResponseGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Reply text for a user message.
    pub fn generate(&self, text: &str) -> String {
        match classify(text) {
            Some(Topic::Tomato) => TOMATO_REPLY,
            Some(Topic::Soil) => SOIL_REPLY,
            Some(Topic::Crop) => CROP_REPLY,
            None => CLARIFY_REPLY,
        }
        .to_string()
    }
}

impl ResponseSource for ResponseGenerator {
    fn respond(&self, text: &str) -> Reply {
        let content = self.generate(text);
        let artifacts = match classify(text) {
            Some(Topic::Soil) => vec![soil_ph_table()],
            _ => vec![],
        };
        Reply { content, artifacts }
    }
}

fn soil_ph_table() -> Artifact {
    Artifact::new(
        ArtifactKind::Table,
        "Preferred soil pH",
        json!({
            "columns": ["crop", "min_ph", "max_ph"],
            "rows": [
                ["tomato", 6.2, 6.8],
                ["potato", 5.0, 6.0],
                ["lettuce", 6.0, 7.0],
                ["beans", 6.0, 7.5],
            ],
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tomato_keyword_case_insensitive() {
        let responder = ResponseGenerator::new();
        assert_eq!(responder.generate("My TOMATO plants look sick"), TOMATO_REPLY);
        assert_eq!(responder.generate("tomatoes!"), TOMATO_REPLY);
    }

    #[test]
    fn test_soil_and_crop_keywords() {
        let responder = ResponseGenerator::new();
        assert_eq!(responder.generate("How do I test my Soil?"), SOIL_REPLY);
        assert_eq!(responder.generate("crop rotation ideas"), CROP_REPLY);
    }

    #[test]
    fn test_first_rule_wins() {
        let responder = ResponseGenerator::new();
        assert_eq!(responder.generate("soil for tomato crops"), TOMATO_REPLY);
        assert_eq!(responder.generate("crop soil"), SOIL_REPLY);
    }

    #[test]
    fn test_generic_clarifying_reply() {
        let responder = ResponseGenerator::new();
        assert_eq!(responder.generate("hello"), CLARIFY_REPLY);
        assert_eq!(responder.generate(""), CLARIFY_REPLY);
    }

    #[test]
    fn test_deterministic() {
        let responder = ResponseGenerator::new();
        assert_eq!(responder.generate("tomato"), responder.generate("tomato"));
    }

    #[test]
    fn test_soil_reply_carries_table() {
        let reply = ResponseGenerator::new().respond("soil test");
        assert_eq!(reply.artifacts.len(), 1);
        assert_eq!(reply.artifacts[0].kind, ArtifactKind::Table);
        assert_eq!(reply.artifacts[0].payload["rows"][0][0], "tomato");
    }

    #[test]
    fn test_other_replies_have_no_artifacts() {
        let reply = ResponseGenerator::new().respond("tomato");
        assert!(reply.artifacts.is_empty());
        assert_eq!(Reply::text("x").content, "x");
    }
}
