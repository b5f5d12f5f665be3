//! Action Rules
//!
//! Ordered table of independent rules that turn a result into action items.
//! Each rule is scoped to a category, a capability id or every result; it
//! reads metrics and the industry tag and either fires with a fixed
//! priority or stays silent. A missing metric silences the rule.
//!
//! Output order is rule order. New rules are appended with
//! [`ActionRuleSet::with_rule`] without touching existing ones.

use ml_analysis_core::{CapabilityOutput, Category};
use serde_json::Value;

use crate::models::analysis::{ActionKind, ActionRecommendation, Industry, Priority};

/// Inputs a rule may inspect
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub capability_id: &'a str,
    pub category: Option<Category>,
    pub industry: &'a str,
    pub output: &'a CapabilityOutput,
}

impl ActionContext<'_> {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.output.metric(name).filter(|v| v.is_finite())
    }

    pub fn industry(&self) -> Option<Industry> {
        Industry::parse(self.industry)
    }

    pub fn is_fallback(&self) -> bool {
        self.output.result.get("fallback").and_then(Value::as_bool) == Some(true)
    }
}

/// Which results a rule looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleScope {
    Any,
    Category(Category),
    Capability(String),
}

impl RuleScope {
    fn matches(&self, ctx: &ActionContext<'_>) -> bool {
        match self {
            RuleScope::Any => true,
            RuleScope::Category(category) => ctx.category == Some(*category),
            RuleScope::Capability(id) => ctx.capability_id == id,
        }
    }
}

type Evaluate = Box<dyn Fn(&ActionContext<'_>) -> Option<ActionRecommendation> + Send + Sync>;

pub struct ActionRule {
    pub name: String,
    pub scope: RuleScope,
    evaluate: Evaluate,
}

impl ActionRule {
    pub fn new<F>(name: impl Into<String>, scope: RuleScope, evaluate: F) -> Self
    where
        F: Fn(&ActionContext<'_>) -> Option<ActionRecommendation> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            scope,
            evaluate: Box::new(evaluate),
        }
    }

    /// Rule that always fires for its scope
    fn tip(
        name: &str,
        capability_id: &str,
        kind: ActionKind,
        title: &'static str,
        description: &'static str,
        priority: Priority,
    ) -> Self {
        Self::new(name, RuleScope::Capability(capability_id.to_string()), move |_| {
            Some(ActionRecommendation::new(kind, title, description, priority))
        })
    }

    pub fn evaluate(&self, ctx: &ActionContext<'_>) -> Option<ActionRecommendation> {
        if self.scope.matches(ctx) {
            (self.evaluate)(ctx)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for ActionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRule")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct ActionRuleSet {
    rules: Vec<ActionRule>,
}

impl ActionRuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a rule after the existing ones
    pub fn with_rule(mut self, rule: ActionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ActionRule] {
        &self.rules
    }

    /// Fire every rule in order
    pub fn evaluate(&self, ctx: &ActionContext<'_>) -> Vec<ActionRecommendation> {
        self.rules.iter().filter_map(|rule| rule.evaluate(ctx)).collect()
    }

    /// Built-in rules
    pub fn builtin() -> Self {
        let mut set = Self::empty();
        for rule in general_rules()
            .into_iter()
            .chain(time_series_rules())
            .chain(classification_rules())
            .chain(clustering_rules())
            .chain(statistical_rules())
            .chain(regression_rules())
            .chain(dimensionality_rules())
            .chain(capability_tips())
            .chain(industry_rules())
        {
            set = set.with_rule(rule);
        }
        set
    }
}

fn action(title: &str, description: String, priority: Priority) -> Option<ActionRecommendation> {
    Some(ActionRecommendation::new(ActionKind::Action, title, description, priority))
}

fn insight(title: &str, description: String, priority: Priority) -> Option<ActionRecommendation> {
    Some(ActionRecommendation::new(ActionKind::Insight, title, description, priority))
}

// ============================================================================
// Rules
// ============================================================================

fn general_rules() -> Vec<ActionRule> {
    vec![ActionRule::new("fallback_notice", RuleScope::Any, |ctx| {
        if !ctx.is_fallback() {
            return None;
        }
        insight(
            "Resultado con implementación alternativa",
            format!(
                "El modelo '{}' no pudo ejecutarse sobre estos datos. Revise el formato del \
                 archivo y los parámetros antes de tomar decisiones.",
                ctx.capability_id
            ),
            Priority::High,
        )
    })]
}

fn time_series_rules() -> Vec<ActionRule> {
    let scope = || RuleScope::Category(Category::TimeSeries);
    vec![
        ActionRule::new("forecast_error", scope(), |ctx| {
            let mape = ctx.metric("mape")?;
            (mape > 15.0).then_some(())?;
            action(
                "Mejorar precisión del pronóstico",
                format!(
                    "El MAPE es {:.1}%. Considere incluir variables externas o ajustar \
                     estacionalidad.",
                    mape
                ),
                Priority::High,
            )
        }),
        ActionRule::new("residual_structure", scope(), |ctx| {
            let autocorrelation = ctx.metric("residual_autocorrelation")?;
            (autocorrelation.abs() > 0.2).then_some(())?;
            action(
                "Estructura en residuales",
                "Los residuales muestran autocorrelación. Considere ajustar los términos AR o MA \
                 del modelo.".to_string(),
                Priority::Medium,
            )
        }),
        ActionRule::new("forecast_planning", scope(), |ctx| {
            let (title, description) = match ctx.industry()? {
                Industry::Retail => (
                    "Planificación de inventario",
                    "Use el pronóstico para anticipar la demanda y ajustar niveles de inventario \
                     por periodo.",
                ),
                Industry::Finanzas => (
                    "Planificación de flujo de caja",
                    "Incorpore el pronóstico a la proyección de flujo de caja y a los escenarios \
                     de liquidez.",
                ),
                Industry::Manufactura => (
                    "Planificación de producción",
                    "Alinee la capacidad de producción y las compras de materia prima con el \
                     pronóstico.",
                ),
                _ => return None,
            };
            insight(title, description.to_string(), Priority::Medium)
        }),
    ]
}

fn classification_rules() -> Vec<ActionRule> {
    let scope = || RuleScope::Category(Category::Classification);
    vec![
        ActionRule::new("low_accuracy", scope(), |ctx| {
            let accuracy = ctx.metric("accuracy")?;
            (accuracy < 0.7).then_some(())?;
            action(
                "Mejorar precisión del modelo",
                format!(
                    "La precisión actual es {:.1}%. Considere recolectar más datos o ajustar \
                     hiperparámetros.",
                    accuracy * 100.0
                ),
                Priority::High,
            )
        }),
        ActionRule::new("class_imbalance", scope(), |ctx| {
            let share = ctx.metric("min_class_share")?;
            (share < 0.1).then_some(())?;
            action(
                "Corregir desbalance de clases",
                "Los datos muestran un desbalance significativo entre clases. Considere técnicas \
                 de muestreo como SMOTE o ajuste de pesos.".to_string(),
                Priority::Critical,
            )
        }),
        ActionRule::new("classification_industry", scope(), |ctx| match ctx.industry()? {
            Industry::Finanzas => insight(
                "Segmentación de riesgo",
                "Use las probabilidades del clasificador para ordenar clientes por riesgo y \
                 priorizar la revisión manual.".to_string(),
                Priority::High,
            ),
            Industry::Salud => {
                let recall = ctx.metric("recall")?;
                (recall < 0.8).then_some(())?;
                action(
                    "Reducir falsos negativos",
                    format!(
                        "La exhaustividad es {:.1}%. En contextos clínicos un caso no detectado es \
                         costoso; ajuste el umbral de decisión.",
                        recall * 100.0
                    ),
                    Priority::Critical,
                )
            }
            Industry::Educacion => insight(
                "Alerta temprana de estudiantes",
                "Identifique estudiantes con riesgo de abandono para intervenir antes del cierre \
                 del periodo.".to_string(),
                Priority::Medium,
            ),
            _ => None,
        }),
    ]
}

fn clustering_rules() -> Vec<ActionRule> {
    let scope = || RuleScope::Category(Category::Clustering);
    vec![
        ActionRule::new("cluster_cohesion", scope(), |ctx| {
            let silhouette = ctx.metric("silhouette")?;
            (silhouette < 0.25).then_some(())?;
            action(
                "Revisar la separación de los grupos",
                format!(
                    "El coeficiente de silueta es {:.2}. Pruebe otro número de grupos o seleccione \
                     variables más discriminantes.",
                    silhouette
                ),
                Priority::Medium,
            )
        }),
        ActionRule::new("cluster_industry", scope(), |ctx| match ctx.industry()? {
            Industry::Retail => action(
                "Segmentación de clientes",
                "Diseñe campañas y ofertas diferenciadas para cada segmento de clientes \
                 identificado.".to_string(),
                Priority::High,
            ),
            Industry::Salud => insight(
                "Perfiles de pacientes",
                "Los grupos describen perfiles de pacientes; valide su relevancia clínica con el \
                 equipo médico.".to_string(),
                Priority::Medium,
            ),
            Industry::Educacion => insight(
                "Perfiles de estudiantes",
                "Adapte los programas de apoyo académico a los perfiles de estudiantes \
                 encontrados.".to_string(),
                Priority::Medium,
            ),
            _ => None,
        }),
    ]
}

fn statistical_rules() -> Vec<ActionRule> {
    let scope = || RuleScope::Category(Category::Statistical);
    vec![
        ActionRule::new("significance", scope(), |ctx| {
            let p_value = ctx.metric("p_value")?;
            if p_value < 0.05 {
                insight(
                    "Diferencia estadísticamente significativa",
                    format!(
                        "El valor p es {:.4}; las diferencias observadas difícilmente se deben al \
                         azar.",
                        p_value
                    ),
                    Priority::Medium,
                )
            } else {
                insight(
                    "Sin diferencias significativas",
                    format!(
                        "El valor p es {:.4}; no hay evidencia suficiente de diferencias entre \
                         grupos.",
                        p_value
                    ),
                    Priority::Low,
                )
            }
        }),
        ActionRule::new("clinical_validation", scope(), |ctx| {
            (ctx.industry()? == Industry::Salud).then_some(())?;
            let p_value = ctx.metric("p_value")?;
            (p_value < 0.05).then_some(())?;
            action(
                "Validación clínica de resultados",
                "El resultado es significativo en un contexto de salud. Confirme el hallazgo con \
                 un estudio controlado antes de cambiar protocolos.".to_string(),
                Priority::Critical,
            )
        }),
    ]
}

fn regression_rules() -> Vec<ActionRule> {
    let scope = || RuleScope::Category(Category::Regression);
    vec![
        ActionRule::new("relative_error", scope(), |ctx| {
            let rmse = ctx.metric("rmse")?;
            let mean_target = ctx.metric("mean_target")?;
            (mean_target != 0.0).then_some(())?;
            let relative = rmse / mean_target.abs();
            (relative > 0.3).then_some(())?;
            action(
                "Reducir error de predicción",
                format!(
                    "El RMSE relativo es alto ({:.1}%). Considere transformaciones no lineales o \
                     regularización.",
                    relative * 100.0
                ),
                Priority::High,
            )
        }),
        ActionRule::new("weak_fit", scope(), |ctx| {
            let r2 = ctx.metric("r2")?;
            (r2 < 0.5).then_some(())?;
            action(
                "Mejorar ajuste del modelo",
                format!(
                    "El modelo explica el {:.1}% de la varianza. Añada variables explicativas o \
                     pruebe un modelo no lineal.",
                    r2 * 100.0
                ),
                Priority::Medium,
            )
        }),
    ]
}

fn dimensionality_rules() -> Vec<ActionRule> {
    vec![ActionRule::new(
        "variance_coverage",
        RuleScope::Category(Category::DimensionalityReduction),
        |ctx| {
            let explained = ctx.metric("explained_variance_total")?;
            (explained < 0.7).then_some(())?;
            action(
                "Aumentar número de componentes",
                format!(
                    "Los componentes retenidos explican el {:.1}% de la varianza. Considere \
                     conservar más componentes.",
                    explained * 100.0
                ),
                Priority::Medium,
            )
        },
    )]
}

fn capability_tips() -> Vec<ActionRule> {
    vec![
        ActionRule::tip(
            "sarima_seasonal_adjustment",
            "sarima",
            ActionKind::Action,
            "Ajustar componentes estacionales",
            "Considere ajustar los componentes estacionales para mejorar la precisión del modelo",
            Priority::Medium,
        ),
        ActionRule::tip(
            "sarima_anomaly_detection",
            "sarima",
            ActionKind::Analysis,
            "Detección de anomalías",
            "Ejecute un análisis de detección de anomalías para identificar valores atípicos en \
             sus series temporales",
            Priority::High,
        ),
        ActionRule::tip(
            "arima_differencing",
            "arima",
            ActionKind::Action,
            "Ajustar nivel de diferenciación",
            "Considere aumentar el nivel de diferenciación para mejorar la estacionariedad",
            Priority::Medium,
        ),
        ActionRule::tip(
            "arima_forecast_horizon",
            "arima",
            ActionKind::Insight,
            "Horizonte de pronóstico óptimo",
            "La fiabilidad del pronóstico disminuye con el horizonte; priorice los primeros \
             periodos",
            Priority::Low,
        ),
        ActionRule::tip(
            "kmeans_optimal_clusters",
            "kmeans",
            ActionKind::Action,
            "Optimizar número de clusters",
            "Utilice el método del codo o silueta para encontrar el número óptimo de clusters",
            Priority::High,
        ),
        ActionRule::tip(
            "kmeans_feature_scaling",
            "kmeans",
            ActionKind::Action,
            "Escalado de características",
            "Normalice o estandarice las características para mejorar la calidad de los clusters",
            Priority::Medium,
        ),
        ActionRule::tip(
            "random_forest_feature_importance",
            "random_forest",
            ActionKind::Insight,
            "Importancia de características",
            "Analice las características más importantes para entender los factores predictivos \
             clave",
            Priority::High,
        ),
        ActionRule::tip(
            "random_forest_tuning",
            "random_forest",
            ActionKind::Action,
            "Ajuste de hiperparámetros",
            "Optimice los hiperparámetros del modelo para mejorar su rendimiento",
            Priority::Medium,
        ),
    ]
}

fn industry_rules() -> Vec<ActionRule> {
    vec![ActionRule::new("industry_analysis", RuleScope::Any, |ctx| {
        match ctx.industry()? {
            Industry::Retail => Some(ActionRecommendation::new(
                ActionKind::Analysis,
                "Análisis de canasta de compra",
                "Identifique patrones de compra conjunta y reglas de asociación",
                Priority::High,
            )),
            Industry::Finanzas => Some(ActionRecommendation::new(
                ActionKind::Analysis,
                "Evaluación de riesgo",
                "Analice el riesgo y la volatilidad en sus datos financieros",
                Priority::Critical,
            )),
            _ => None,
        }
    })]
}
