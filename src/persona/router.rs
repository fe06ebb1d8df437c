//! Persona router — pure scoring over a catalog snapshot.
//!
//! Called on the hot path for every submission; performs no I/O and touches
//! no shared state, so it is safe to call concurrently from every worker.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::Message;

use super::catalog::Catalog;
use super::types::{Persona, RuleKind};

// ─────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────

/// Router tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Minimum normalized score a persona must reach; below this the
    /// catalog default is used with score 0.
    pub min_score: f64,

    /// Scores within this distance of the best are treated as tied and
    /// broken by persona priority.
    pub epsilon: f64,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            min_score: 0.05,
            epsilon: 1e-6,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Scoring Strategy
// ─────────────────────────────────────────────────────────────────

/// Pluggable message-vs-persona scoring.
///
/// Implementations must be pure: same inputs, same score, no side effects.
pub trait ScoringStrategy: Send + Sync {
    /// Score in [0, 1]. `tokens` is the lowercased tokenization of
    /// `content_lower`.
    fn score(&self, persona: &Persona, content_lower: &str, tokens: &[&str]) -> f64;
}

/// Default scorer: weighted sum of rule hits normalized by token count.
pub struct WeightedRuleScorer;

impl ScoringStrategy for WeightedRuleScorer {
    fn score(&self, persona: &Persona, content_lower: &str, tokens: &[&str]) -> f64 {
        if tokens.is_empty() {
            return 0.0;
        }
        let mut raw = 0.0;
        for rule in &persona.rules {
            let pattern = rule.pattern.to_lowercase();
            let hits = match rule.kind {
                RuleKind::Keyword => tokens.iter().filter(|t| **t == pattern).count(),
                RuleKind::Phrase => content_lower.matches(pattern.as_str()).count(),
            };
            raw += rule.weight * hits as f64;
        }
        (raw / tokens.len() as f64).clamp(0.0, 1.0)
    }
}

// ─────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────

/// Outcome of routing one message against one catalog snapshot.
#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub persona: Arc<Persona>,

    /// Normalized match score in [0, 1]; 0 when `fallback` is set.
    pub score: f64,

    /// True when no persona cleared the threshold and the catalog default
    /// was chosen. A normal outcome, not an error.
    pub fallback: bool,

    /// Version of the snapshot the decision was made against.
    pub catalog_version: u64,
}

pub struct PersonaRouter {
    settings: RouterSettings,
    scorer: Box<dyn ScoringStrategy>,
}

impl PersonaRouter {
    pub fn new(settings: RouterSettings) -> Self {
        Self::with_scorer(settings, Box::new(WeightedRuleScorer))
    }

    pub fn with_scorer(settings: RouterSettings, scorer: Box<dyn ScoringStrategy>) -> Self {
        Self { settings, scorer }
    }

    /// Select a persona for the message.
    ///
    /// Deterministic for a fixed (message, snapshot) pair: ties within
    /// epsilon go to the higher priority, then to catalog order.
    pub fn route(&self, message: &Message, catalog: &Catalog) -> RouteDecision {
        let content_lower = message.content.to_lowercase();
        let tokens: Vec<&str> = content_lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let mut best: Option<(&Arc<Persona>, f64)> = None;
        for persona in catalog.all() {
            let score = self.scorer.score(persona, &content_lower, &tokens);
            let replace = match best {
                None => true,
                Some((current, current_score)) => {
                    if score > current_score + self.settings.epsilon {
                        true
                    } else if (score - current_score).abs() <= self.settings.epsilon {
                        persona.priority > current.priority
                    } else {
                        false
                    }
                }
            };
            if replace {
                best = Some((persona, score));
            }
        }

        match best {
            Some((persona, score)) if score >= self.settings.min_score => RouteDecision {
                persona: persona.clone(),
                score,
                fallback: false,
                catalog_version: catalog.version(),
            },
            _ => RouteDecision {
                persona: catalog.default_persona(),
                score: 0.0,
                fallback: true,
                catalog_version: catalog.version(),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::{MatchRule, PersonaCatalog, PersonaKind};

    fn catalog() -> PersonaCatalog {
        PersonaCatalog::load_bundled(PersonaKind::Mentor).unwrap()
    }

    fn route(content: &str) -> RouteDecision {
        let router = PersonaRouter::new(RouterSettings::default());
        let msg = Message::new("c1", "u1", content);
        router.route(&msg, &catalog().snapshot())
    }

    #[test]
    fn test_keyword_routing() {
        let decision = route("please analyze the sales data statistics");
        assert_eq!(decision.persona.kind, PersonaKind::Analyst);
        assert!(!decision.fallback);
        assert!(decision.score > 0.0);
    }

    #[test]
    fn test_phrase_routing() {
        let decision = route("what is the state of the art in compilers");
        assert_eq!(decision.persona.kind, PersonaKind::Researcher);
        assert!(!decision.fallback);
    }

    #[test]
    fn test_fallback_to_default() {
        let decision = route("hello there");
        assert_eq!(decision.persona.kind, PersonaKind::Mentor);
        assert!(decision.fallback);
        assert_eq!(decision.score, 0.0);
    }

    #[test]
    fn test_empty_message_falls_back() {
        let decision = route("");
        assert!(decision.fallback);
    }

    #[test]
    fn test_deterministic() {
        let router = PersonaRouter::new(RouterSettings::default());
        let snap = catalog().snapshot();
        let msg = Message::new("c1", "u1", "how should I invest my savings");
        let first = router.route(&msg, &snap);
        for _ in 0..10 {
            let again = router.route(&msg, &snap);
            assert_eq!(again.persona.kind, first.persona.kind);
            assert_eq!(again.score, first.score);
        }
        assert_eq!(first.persona.kind, PersonaKind::Advisor);
    }

    #[test]
    fn test_score_bounded() {
        // Every token hits a heavy rule; score must still clamp to 1.
        let decision = route("invest invest invest invest");
        assert!(decision.score <= 1.0);
        assert!(decision.score >= 0.0);
    }

    #[test]
    fn test_priority_breaks_ties() {
        let catalog = catalog();
        let mut a = Persona::clone(&catalog.snapshot().resolve(PersonaKind::Analyst).unwrap());
        a.priority = 1;
        a.rules = vec![MatchRule {
            pattern: "ledger".into(),
            kind: RuleKind::Keyword,
            weight: 1.0,
        }];
        let mut b = Persona::clone(&catalog.snapshot().resolve(PersonaKind::Advisor).unwrap());
        b.priority = 5;
        b.rules = vec![MatchRule {
            pattern: "ledger".into(),
            kind: RuleKind::Keyword,
            weight: 1.0,
        }];
        catalog.reload_with(vec![a, b]).unwrap();

        let router = PersonaRouter::new(RouterSettings::default());
        let msg = Message::new("c1", "u1", "ledger");
        let decision = router.route(&msg, &catalog.snapshot());
        assert_eq!(decision.persona.kind, PersonaKind::Advisor);
    }

    #[test]
    fn test_normalization_by_length() {
        let short = route("invest");
        let long = route("invest in a way that is sensible given everything going on lately");
        assert!(short.score > long.score);
    }
}
