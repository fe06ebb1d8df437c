//! Core types for the persona system.
//!
//! A persona is a named behavioral profile: a system-instruction template
//! plus the weighted matching rules the router scores messages against.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Persona Kind
// ─────────────────────────────────────────────────────────────────

/// The closed set of persona roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersonaKind {
    /// Data analysis and structured breakdowns.
    Analyst,
    /// Writing, ideation, open-ended generation.
    Creative,
    /// Sourcing, literature, evidence gathering.
    Researcher,
    /// Personal finance guidance.
    Advisor,
    /// General guidance; the designated fallback.
    Mentor,
}

impl PersonaKind {
    /// Slug used in config files, CLI args, and result payloads.
    pub fn slug(&self) -> &'static str {
        match self {
            PersonaKind::Analyst => "analyst",
            PersonaKind::Creative => "creative",
            PersonaKind::Researcher => "researcher",
            PersonaKind::Advisor => "advisor",
            PersonaKind::Mentor => "mentor",
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            PersonaKind::Analyst => "Analyst",
            PersonaKind::Creative => "Creative",
            PersonaKind::Researcher => "Researcher",
            PersonaKind::Advisor => "Advisor",
            PersonaKind::Mentor => "Mentor",
        }
    }

    /// All kinds in catalog order.
    pub fn all() -> &'static [PersonaKind] {
        &[
            PersonaKind::Analyst,
            PersonaKind::Creative,
            PersonaKind::Researcher,
            PersonaKind::Advisor,
            PersonaKind::Mentor,
        ]
    }
}

impl fmt::Display for PersonaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for PersonaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "analyst" => Ok(PersonaKind::Analyst),
            "creative" => Ok(PersonaKind::Creative),
            "researcher" => Ok(PersonaKind::Researcher),
            "advisor" => Ok(PersonaKind::Advisor),
            "mentor" => Ok(PersonaKind::Mentor),
            _ => Err(format!(
                "unknown persona '{}'. Valid: analyst, creative, researcher, advisor, mentor",
                s
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Matching Rules
// ─────────────────────────────────────────────────────────────────

/// How a rule's pattern is matched against the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    /// Whole-token match, case-insensitive.
    Keyword,
    /// Substring match, case-insensitive; for multi-word intents.
    Phrase,
}

/// One weighted matching rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRule {
    /// Pattern text, matched case-insensitively.
    pub pattern: String,

    /// Match mode.
    pub kind: RuleKind,

    /// Contribution per hit.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

// ─────────────────────────────────────────────────────────────────
// Persona (loaded from TOML)
// ─────────────────────────────────────────────────────────────────

/// Full persona definition, deserialized from TOML.
///
/// Immutable after load; the catalog hands out shared references only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Which role this definition describes.
    pub kind: PersonaKind,

    /// Semantic version of this definition (e.g. "1.0.0").
    pub version: String,

    /// Short human-readable description.
    pub description: String,

    /// Tie-break multiplier: higher wins when scores are within epsilon.
    #[serde(default)]
    pub priority: u32,

    /// System instruction handed to the model backend.
    pub system_prompt: String,

    /// Ordered matching rules.
    #[serde(default)]
    pub rules: Vec<MatchRule>,
}

impl Persona {
    /// Parse a persona definition from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("invalid persona definition: {}", e))
    }

    pub fn id(&self) -> &'static str {
        self.kind.slug()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
