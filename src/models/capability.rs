//! Capability Catalog Models
//!
//! Static metadata describing each analysis capability: identity, category,
//! recognized parameters, applicable industries and complementary links.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ml_analysis_core::Category;

/// Declared value type of a parameter (API description only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Numeric,
    String,
}

/// Whether a parameter must be present once inference has run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    RequiredIfInferable,
    Optional,
}

/// Column role a parameter refers to, used for inference from the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Date,
    Group,
    /// Class label of a classification model
    Label,
    Target,
    Value,
}

/// One recognized parameter of a capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub kind: ParamKind,
    pub requirement: Requirement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ColumnRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSpec {
    /// A column-valued parameter inferred from the dataset
    pub fn column(name: &str, description: &str, role: ColumnRole) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: ParamKind::String,
            requirement: Requirement::RequiredIfInferable,
            role: Some(role),
            default: None,
        }
    }

    /// A numeric parameter with a documented default
    pub fn numeric(name: &str, description: &str, default: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: ParamKind::Numeric,
            requirement: Requirement::Optional,
            role: None,
            default: Some(default.into()),
        }
    }

    /// A string parameter with a documented default
    pub fn text(name: &str, description: &str, default: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: ParamKind::String,
            requirement: Requirement::Optional,
            role: None,
            default: Some(Value::String(default.to_string())),
        }
    }

    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::RequiredIfInferable
    }
}

/// Immutable description of one capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    /// Recognized parameters in declaration order
    pub parameters: Vec<ParameterSpec>,
    pub industries: BTreeSet<String>,
    /// Complementary capability ids in declaration order
    pub complementary: Vec<String>,
}

impl CapabilityDescriptor {
    /// Recognized parameter names in declaration order
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn supports_industry(&self, industry: &str) -> bool {
        self.industries.contains(industry)
    }
}

/// API description of one parameter: `{description, required, type}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterMetadata {
    pub description: String,
    pub required: bool,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl From<&ParameterSpec> for ParameterMetadata {
    fn from(spec: &ParameterSpec) -> Self {
        Self {
            description: spec.description.clone(),
            required: spec.is_required(),
            kind: spec.kind,
            default: spec.default.clone(),
        }
    }
}
