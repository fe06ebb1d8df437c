//! Response assembler.
//!
//! Turns a raw backend output into the final `ExecutionResult`, blending the
//! model's self-reported confidence with the router's match score.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::ModelOutput;
use crate::types::{ExecutionResult, Task};

// ─────────────────────────────────────────────────────────────────
// Confidence Settings
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceSettings {
    /// Weight of the model's self-reported confidence.
    pub model_weight: f64,

    /// Weight of the router's match score.
    pub router_weight: f64,

    /// Stand-in for the model term when the backend reports nothing.
    pub heuristic_default: f64,
}

impl Default for ConfidenceSettings {
    fn default() -> Self {
        Self {
            model_weight: 0.7,
            router_weight: 0.3,
            heuristic_default: 0.5,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Assembler
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    settings: ConfidenceSettings,
}

impl ResponseAssembler {
    pub fn new(settings: ConfidenceSettings) -> Self {
        Self { settings }
    }

    /// Build the final result for a completed task.
    pub fn assemble(
        &self,
        task: &Task,
        output: ModelOutput,
        attempts: u32,
        latency: Duration,
    ) -> ExecutionResult {
        ExecutionResult {
            task_id: task.id,
            persona_id: task.persona.id().to_string(),
            text: output.text,
            confidence: self.blend(output.confidence, task.match_score),
            latency,
            attempts,
        }
    }

    /// Weighted blend of model confidence and router match score, clamped
    /// to [0, 1]. A backend that reports no confidence yields the heuristic
    /// default outright.
    fn blend(&self, model: Option<f64>, match_score: f64) -> f64 {
        let Some(model) = model else {
            return self.settings.heuristic_default.clamp(0.0, 1.0);
        };
        let mw = self.settings.model_weight.max(0.0);
        let rw = self.settings.router_weight.max(0.0);
        let total = mw + rw;
        if total <= f64::EPSILON {
            return self.settings.heuristic_default.clamp(0.0, 1.0);
        }
        let blended = (mw * model + rw * match_score) / total;
        blended.clamp(0.0, 1.0)
    }
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new(ConfidenceSettings::default())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> ResponseAssembler {
        ResponseAssembler::default()
    }

    #[test]
    fn test_blend_weighted_average() {
        let a = assembler();
        // 0.7 * 0.9 + 0.3 * 0.5 = 0.78
        let blended = a.blend(Some(0.9), 0.5);
        assert!((blended - 0.78).abs() < 1e-9);
    }

    #[test]
    fn test_blend_without_model_confidence_uses_default() {
        let a = assembler();
        // Match score is irrelevant when the model reports nothing.
        assert!((a.blend(None, 1.0) - 0.5).abs() < 1e-9);
        assert!((a.blend(None, 0.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_blend_clamped_to_unit_interval() {
        let a = assembler();
        assert!(a.blend(Some(5.0), 5.0) <= 1.0);
        assert!(a.blend(Some(-5.0), -5.0) >= 0.0);
    }

    #[test]
    fn test_zero_weights_fall_back_to_default() {
        let a = ResponseAssembler::new(ConfidenceSettings {
            model_weight: 0.0,
            router_weight: 0.0,
            heuristic_default: 0.4,
        });
        assert!((a.blend(Some(0.9), 0.9) - 0.4).abs() < 1e-9);
    }
}
