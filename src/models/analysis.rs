//! Analysis Models
//!
//! Request, run state machine and result documents of an analysis.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use ml_analysis_core::{AnalysisError, Category, Parameters};

// ============================================================================
// Industry
// ============================================================================

/// Industry contexts the catalog and recommendation rules know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    Retail,
    Finanzas,
    Salud,
    Manufactura,
    Tecnologia,
    Educacion,
}

impl Industry {
    pub const ALL: [Industry; 6] = [
        Industry::Retail,
        Industry::Finanzas,
        Industry::Salud,
        Industry::Manufactura,
        Industry::Tecnologia,
        Industry::Educacion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Industry::Retail => "retail",
            Industry::Finanzas => "finanzas",
            Industry::Salud => "salud",
            Industry::Manufactura => "manufactura",
            Industry::Tecnologia => "tecnologia",
            Industry::Educacion => "educacion",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Industry::Retail => "Retail",
            Industry::Finanzas => "Finanzas",
            Industry::Salud => "Salud",
            Industry::Manufactura => "Manufactura",
            Industry::Tecnologia => "Tecnología",
            Industry::Educacion => "Educación",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_str() == s)
    }
}

impl std::fmt::Display for Industry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Request
// ============================================================================

/// Location of a dataset the loader can read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetReference {
    pub path: PathBuf,
    /// Original file name; its extension selects the reader
    pub file_name: String,
}

impl DatasetReference {
    pub fn new(path: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_name: file_name.into(),
        }
    }

    /// Reference whose file name is taken from the path itself
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(path, file_name)
    }

    /// Lower-cased file extension, if any
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// One incoming analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Identifier of the uploaded file whose status is reported upstream
    pub file_id: String,
    /// Requested capability id
    pub model_type: String,
    pub industry: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl AnalysisRequest {
    pub fn new(
        file_id: impl Into<String>,
        model_type: impl Into<String>,
        industry: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            model_type: model_type.into(),
            industry: industry.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }
}

// ============================================================================
// Run state machine
// ============================================================================

/// Lifecycle state of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Queued => "queued",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(AnalysisStatus::Queued),
            "processing" => Some(AnalysisStatus::Processing),
            "completed" => Some(AnalysisStatus::Completed),
            "failed" => Some(AnalysisStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of one analysis, owned by the lifecycle coordinator.
///
/// `result_id` is set only in `Completed`, `failure` only in `Failed`, and
/// terminal states reject further transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub analysis_id: String,
    pub file_id: String,
    status: AnalysisStatus,
    result_id: Option<String>,
    failure: Option<AnalysisError>,
}

impl AnalysisRun {
    /// New run in `Queued` with a fresh identifier
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            analysis_id: Uuid::new_v4().to_string(),
            file_id: file_id.into(),
            status: AnalysisStatus::Queued,
            result_id: None,
            failure: None,
        }
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status
    }

    pub fn result_id(&self) -> Option<&str> {
        self.result_id.as_deref()
    }

    pub fn failure(&self) -> Option<&AnalysisError> {
        self.failure.as_ref()
    }

    fn ensure_open(&self, target: AnalysisStatus) -> Result<(), AnalysisError> {
        if self.status.is_terminal() {
            return Err(AnalysisError::orchestration(format!(
                "run {} is already {}; cannot move to {}",
                self.analysis_id, self.status, target
            )));
        }
        Ok(())
    }

    /// Queued → Processing
    pub fn start(&mut self) -> Result<(), AnalysisError> {
        self.ensure_open(AnalysisStatus::Processing)?;
        if self.status != AnalysisStatus::Queued {
            return Err(AnalysisError::orchestration(format!(
                "run {} is already processing",
                self.analysis_id
            )));
        }
        self.status = AnalysisStatus::Processing;
        Ok(())
    }

    /// Processing → Completed
    pub fn complete(&mut self, result_id: impl Into<String>) -> Result<(), AnalysisError> {
        self.ensure_open(AnalysisStatus::Completed)?;
        if self.status != AnalysisStatus::Processing {
            return Err(AnalysisError::orchestration(format!(
                "run {} cannot complete before processing",
                self.analysis_id
            )));
        }
        self.status = AnalysisStatus::Completed;
        self.result_id = Some(result_id.into());
        Ok(())
    }

    /// Queued or Processing → Failed
    pub fn fail(&mut self, reason: AnalysisError) -> Result<(), AnalysisError> {
        self.ensure_open(AnalysisStatus::Failed)?;
        self.status = AnalysisStatus::Failed;
        self.failure = Some(reason);
        Ok(())
    }
}

/// Immediate answer to an accepted request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acceptance {
    pub analysis_id: String,
    pub status: AnalysisStatus,
    pub message: String,
}

impl Acceptance {
    pub fn processing(analysis_id: impl Into<String>) -> Self {
        Self {
            analysis_id: analysis_id.into(),
            status: AnalysisStatus::Processing,
            message: "Análisis iniciado. El procesamiento continúa en segundo plano.".to_string(),
        }
    }
}

// ============================================================================
// Result documents
// ============================================================================

/// Why the fallback capability produced the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The registry does not know the requested id
    UnknownCapability,
    /// Known id whose implementation could not be instantiated
    ImplementationUnavailable(String),
    /// The real implementation failed during computation
    ExecutionFailed(String),
}

impl From<&FallbackReason> for AnalysisError {
    fn from(reason: &FallbackReason) -> Self {
        match reason {
            FallbackReason::UnknownCapability => {
                AnalysisError::CapabilityUnavailable("unknown capability".to_string())
            }
            FallbackReason::ImplementationUnavailable(detail) => {
                AnalysisError::CapabilityUnavailable(detail.clone())
            }
            FallbackReason::ExecutionFailed(detail) => {
                AnalysisError::CapabilityExecution(detail.clone())
            }
        }
    }
}

/// Suggested chart for a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visualization {
    pub kind: String,
    pub title: String,
    pub description: String,
}

impl Visualization {
    pub fn new(kind: &str, title: &str, description: &str) -> Self {
        Self {
            kind: kind.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// Another capability worth running next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplementarySuggestion {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Something to change in the model or data
    Action,
    /// An observation about the result
    Insight,
    /// A further analysis to run
    Analysis,
}

/// Derived action or insight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecommendation {
    pub kind: ActionKind,
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

impl ActionRecommendation {
    pub fn new(
        kind: ActionKind,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            priority,
        }
    }
}

/// Full outcome of an analysis, as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub model_type: String,
    pub industry: String,
    /// Primary document; always has a `summary` string
    pub result: Map<String, Value>,
    /// Flat metric name to number
    pub metrics: Map<String, Value>,
    pub visualizations: Vec<Visualization>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub complementary: Vec<ComplementarySuggestion>,
    pub actions: Vec<ActionRecommendation>,
    /// Parameters after inference and defaults
    pub parameters: Parameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackReason>,
}

impl AnalysisResult {
    pub fn summary(&self) -> Option<&str> {
        self.result.get("summary").and_then(Value::as_str)
    }

    pub fn used_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Document stored as the result body: the primary result with the
    /// derived artifacts attached.
    pub fn to_document(&self) -> Value {
        let mut document = self.result.clone();
        document.insert("visualizations".to_string(), serde_json::json!(self.visualizations));
        if !self.complementary.is_empty() {
            document.insert("complementary".to_string(), serde_json::json!(self.complementary));
        }
        document.insert("actions".to_string(), serde_json::json!(self.actions));
        document.insert("parameters".to_string(), Value::Object(self.parameters.clone()));
        Value::Object(document)
    }
}
