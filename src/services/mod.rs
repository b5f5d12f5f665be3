//! Services
//!
//! Analysis pipeline services: capability lookup and resolution, parameter
//! inference, dataset loading, execution, recommendations and the lifecycle
//! coordinator that ties them together.

pub mod executor;
pub mod lifecycle;
pub mod loader;
pub mod parameters;
pub mod recommendations;
pub mod registry;
pub mod resolver;

pub use executor::{AnalysisExecutor, Execution};
pub use lifecycle::AnalysisCoordinator;
pub use loader::{DatasetLoader, FileDatasetLoader};
pub use parameters::ParameterResolver;
pub use recommendations::{ActionRule, ActionRuleSet, RecommendationEngine, RuleScope};
pub use registry::CapabilityRegistry;
pub use resolver::{CapabilityResolver, ResolvedCapability};
