//! Recommendations
//!
//! Derives the artifacts attached to every result: chart suggestions,
//! complementary analyses and prioritized actions. All three are pure
//! functions of the execution and the industry tag.

pub mod actions;
pub mod complementary;
pub mod visualizations;

use std::sync::Arc;

use crate::models::analysis::AnalysisResult;
use crate::services::executor::Execution;
use crate::services::registry::CapabilityRegistry;

pub use actions::{ActionContext, ActionRule, ActionRuleSet, RuleScope};
pub use complementary::complementary_suggestions;
pub use visualizations::visualizations;

/// Turns an [`Execution`] into a full [`AnalysisResult`]
#[derive(Debug)]
pub struct RecommendationEngine {
    registry: Arc<CapabilityRegistry>,
    rules: ActionRuleSet,
}

impl RecommendationEngine {
    pub fn new(registry: Arc<CapabilityRegistry>, rules: ActionRuleSet) -> Self {
        Self { registry, rules }
    }

    /// Engine with the built-in action rules
    pub fn builtin(registry: Arc<CapabilityRegistry>) -> Self {
        Self::new(registry, ActionRuleSet::builtin())
    }

    pub fn rules(&self) -> &ActionRuleSet {
        &self.rules
    }

    /// Attach visualizations, complementary analyses and actions
    pub fn recommend(&self, execution: Execution, industry: &str) -> AnalysisResult {
        let visualizations = visualizations(execution.category);
        let complementary =
            complementary_suggestions(&self.registry, &execution.capability_id, industry);
        let actions = self.rules.evaluate(&ActionContext {
            capability_id: &execution.capability_id,
            category: execution.category,
            industry,
            output: &execution.output,
        });

        AnalysisResult {
            model_type: execution.capability_id,
            industry: industry.to_string(),
            result: execution.output.result,
            metrics: execution.output.metrics,
            visualizations,
            complementary,
            actions,
            parameters: execution.parameters,
            fallback: execution.fallback,
        }
    }
}
