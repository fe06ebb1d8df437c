//! Persona definitions, catalog, and routing.

mod catalog;
mod router;
mod types;

pub use catalog::{Catalog, PersonaCatalog};
pub use router::{PersonaRouter, RouteDecision, RouterSettings, ScoringStrategy, WeightedRuleScorer};
pub use types::{MatchRule, Persona, PersonaKind, RuleKind};
