//! Built-in Capability Catalog
//!
//! Descriptor definitions for every capability the service ships with,
//! grouped by category. `prophet`, `lstm`, `xgboost`, `svm` and `tsne` are
//! declared without a native implementation and always resolve to the
//! fallback.

use std::collections::BTreeSet;

use ml_analysis_core::Category;

use crate::models::capability::{CapabilityDescriptor, ColumnRole, ParameterSpec};

fn descriptor(
    id: &str,
    name: &str,
    description: &str,
    category: Category,
    parameters: Vec<ParameterSpec>,
    industries: &[&str],
    complementary: &[&str],
) -> CapabilityDescriptor {
    CapabilityDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category,
        parameters,
        industries: industries.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        complementary: complementary.iter().map(|s| s.to_string()).collect(),
    }
}

/// All built-in descriptors in catalog order
pub fn builtin_descriptors() -> Vec<CapabilityDescriptor> {
    let mut descriptors = time_series();
    descriptors.extend(classification());
    descriptors.extend(clustering());
    descriptors.extend(statistical());
    descriptors.extend(regression());
    descriptors.extend(dimensionality());
    descriptors
}

// ============================================================================
// Time series
// ============================================================================

fn series_columns() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::column(
            "target_column",
            "Columna numérica a pronosticar",
            ColumnRole::Target,
        ),
        ParameterSpec::column("date_column", "Columna de fecha de la serie", ColumnRole::Date),
        ParameterSpec::numeric("forecast_steps", "Número de periodos a pronosticar", 12),
    ]
}

fn arima_order() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::numeric("p", "Orden autorregresivo", 1),
        ParameterSpec::numeric("d", "Orden de diferenciación", 1),
        ParameterSpec::numeric("q", "Orden de media móvil", 1),
    ]
}

fn time_series() -> Vec<CapabilityDescriptor> {
    let mut sarima_params = series_columns();
    sarima_params.extend(arima_order());
    sarima_params.extend([
        ParameterSpec::numeric("P", "Orden autorregresivo estacional", 1),
        ParameterSpec::numeric("D", "Orden de diferenciación estacional", 1),
        ParameterSpec::numeric("Q", "Orden de media móvil estacional", 1),
        ParameterSpec::numeric("s", "Longitud del ciclo estacional", 12),
    ]);

    let mut arima_params = series_columns();
    arima_params.extend(arima_order());

    let mut lstm_params = series_columns();
    lstm_params.extend([
        ParameterSpec::numeric("sequence_length", "Longitud de la ventana de entrada", 10),
        ParameterSpec::numeric("epochs", "Épocas de entrenamiento", 50),
    ]);

    let mut smoothing_params = series_columns();
    smoothing_params.extend([
        ParameterSpec::numeric("alpha", "Factor de suavizado del nivel", 0.3),
        ParameterSpec::numeric("beta", "Factor de suavizado de la tendencia", 0.1),
    ]);

    vec![
        descriptor(
            "sarima",
            "SARIMA",
            "Modelo autorregresivo integrado de media móvil con componente estacional",
            Category::TimeSeries,
            sarima_params,
            &["retail", "finanzas", "manufactura", "tecnologia"],
            &["arima", "exponential_smoothing", "prophet", "linear_regression"],
        ),
        descriptor(
            "arima",
            "ARIMA",
            "Modelo autorregresivo integrado de media móvil para series sin estacionalidad marcada",
            Category::TimeSeries,
            arima_params,
            &["retail", "finanzas", "salud", "manufactura", "tecnologia"],
            &["sarima", "exponential_smoothing", "prophet"],
        ),
        descriptor(
            "exponential_smoothing",
            "Suavizado exponencial",
            "Suavizado exponencial doble (Holt) con nivel y tendencia",
            Category::TimeSeries,
            smoothing_params,
            &["retail", "manufactura", "educacion"],
            &["arima", "sarima"],
        ),
        descriptor(
            "prophet",
            "Prophet",
            "Modelo aditivo de tendencia con estacionalidad múltiple",
            Category::TimeSeries,
            series_columns(),
            &["retail", "finanzas", "manufactura", "tecnologia"],
            &["sarima", "arima", "lstm"],
        ),
        descriptor(
            "lstm",
            "LSTM",
            "Red neuronal recurrente para pronóstico de series largas",
            Category::TimeSeries,
            lstm_params,
            &["finanzas", "manufactura", "tecnologia"],
            &["prophet", "sarima"],
        ),
    ]
}

// ============================================================================
// Classification
// ============================================================================

fn classifier_params() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::column(
            "target_column",
            "Columna con la clase a predecir",
            ColumnRole::Label,
        ),
        ParameterSpec::numeric("random_state", "Semilla para la partición y el muestreo", 42),
        ParameterSpec::numeric("test_size", "Proporción de filas reservadas para evaluación", 0.2),
    ]
}

fn classification() -> Vec<CapabilityDescriptor> {
    let mut forest_params = classifier_params();
    forest_params.extend([
        ParameterSpec::numeric("n_estimators", "Número de árboles", 50),
        ParameterSpec::numeric("max_depth", "Profundidad máxima de cada árbol", 8),
    ]);

    let mut logistic_params = classifier_params();
    logistic_params.extend([
        ParameterSpec::numeric("max_iter", "Iteraciones de descenso de gradiente", 300),
        ParameterSpec::numeric("learning_rate", "Tasa de aprendizaje", 0.1),
    ]);

    let mut boosting_params = classifier_params();
    boosting_params.extend([
        ParameterSpec::numeric("n_estimators", "Número de rondas de boosting", 100),
        ParameterSpec::numeric("max_depth", "Profundidad máxima de cada árbol", 6),
        ParameterSpec::numeric("learning_rate", "Tasa de aprendizaje", 0.1),
    ]);

    let mut svm_params = classifier_params();
    svm_params.extend([
        ParameterSpec::text("kernel", "Núcleo: rbf, linear o poly", "rbf"),
        ParameterSpec::numeric("C", "Penalización del margen", 1.0),
    ]);

    vec![
        descriptor(
            "random_forest",
            "Random Forest",
            "Conjunto de árboles de decisión para clasificación con importancia de variables",
            Category::Classification,
            forest_params,
            &["retail", "finanzas", "salud", "tecnologia", "educacion"],
            &["logistic_regression", "pca", "naive_bayes"],
        ),
        descriptor(
            "logistic_regression",
            "Regresión logística",
            "Clasificador lineal con probabilidades calibradas por clase",
            Category::Classification,
            logistic_params,
            &["finanzas", "salud", "educacion"],
            &["random_forest", "naive_bayes"],
        ),
        descriptor(
            "naive_bayes",
            "Naive Bayes",
            "Clasificador bayesiano gaussiano de entrenamiento rápido",
            Category::Classification,
            classifier_params(),
            &["salud", "tecnologia", "educacion"],
            &["logistic_regression", "random_forest"],
        ),
        descriptor(
            "xgboost",
            "XGBoost",
            "Árboles con gradient boosting para clasificación",
            Category::Classification,
            boosting_params,
            &["retail", "finanzas", "tecnologia"],
            &["random_forest", "svm"],
        ),
        descriptor(
            "svm",
            "SVM",
            "Máquina de vectores de soporte con núcleo configurable",
            Category::Classification,
            svm_params,
            &["finanzas", "salud", "tecnologia"],
            &["logistic_regression", "xgboost"],
        ),
    ]
}

// ============================================================================
// Clustering
// ============================================================================

fn clustering() -> Vec<CapabilityDescriptor> {
    vec![
        descriptor(
            "kmeans",
            "K-Means",
            "Agrupamiento por centroides para segmentación",
            Category::Clustering,
            vec![
                ParameterSpec::numeric("n_clusters", "Número de grupos", 3),
                ParameterSpec::numeric("random_state", "Semilla de inicialización", 42),
                ParameterSpec::numeric("max_iter", "Iteraciones máximas", 100),
            ],
            &["retail", "finanzas", "salud", "tecnologia", "educacion"],
            &["pca", "hierarchical", "dbscan", "random_forest"],
        ),
        descriptor(
            "hierarchical",
            "Clustering jerárquico",
            "Agrupamiento aglomerativo con enlace configurable",
            Category::Clustering,
            vec![
                ParameterSpec::numeric("n_clusters", "Número de grupos", 3),
                ParameterSpec::text(
                    "linkage",
                    "Criterio de enlace: average, single o complete",
                    "average",
                ),
            ],
            &["retail", "salud", "educacion"],
            &["kmeans", "pca"],
        ),
        descriptor(
            "dbscan",
            "DBSCAN",
            "Agrupamiento por densidad con detección de ruido",
            Category::Clustering,
            vec![
                ParameterSpec::numeric("eps", "Radio de vecindad en unidades estandarizadas", 0.5),
                ParameterSpec::numeric("min_samples", "Vecinos mínimos de un punto núcleo", 5),
            ],
            &["finanzas", "manufactura", "tecnologia"],
            &["kmeans", "pca"],
        ),
    ]
}

// ============================================================================
// Statistical tests
// ============================================================================

fn group_comparison() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::column("group_column", "Columna que define los grupos", ColumnRole::Group),
        ParameterSpec::column("value_column", "Columna numérica a comparar", ColumnRole::Value),
    ]
}

fn statistical() -> Vec<CapabilityDescriptor> {
    vec![
        descriptor(
            "anova",
            "ANOVA",
            "Análisis de varianza de un factor entre grupos",
            Category::Statistical,
            group_comparison(),
            &["retail", "salud", "manufactura", "educacion"],
            &["t_test", "chi_square", "linear_regression"],
        ),
        descriptor(
            "t_test",
            "Prueba t",
            "Prueba t de Welch entre dos grupos",
            Category::Statistical,
            group_comparison(),
            &["retail", "salud", "educacion"],
            &["anova"],
        ),
        descriptor(
            "chi_square",
            "Chi-cuadrado",
            "Prueba de independencia entre dos variables categóricas",
            Category::Statistical,
            vec![
                ParameterSpec::column(
                    "group_column",
                    "Primera variable categórica",
                    ColumnRole::Group,
                ),
                ParameterSpec::column(
                    "target_column",
                    "Segunda variable categórica",
                    ColumnRole::Label,
                ),
            ],
            &["retail", "salud", "tecnologia", "educacion"],
            &["anova", "logistic_regression"],
        ),
    ]
}

// ============================================================================
// Regression
// ============================================================================

fn regression() -> Vec<CapabilityDescriptor> {
    let target = || {
        ParameterSpec::column("target_column", "Columna numérica a predecir", ColumnRole::Target)
    };

    vec![
        descriptor(
            "linear_regression",
            "Regresión lineal",
            "Mínimos cuadrados ordinarios sobre las columnas numéricas",
            Category::Regression,
            vec![target()],
            &["retail", "finanzas", "manufactura", "educacion"],
            &["polynomial_regression", "ridge_regression", "anova"],
        ),
        descriptor(
            "polynomial_regression",
            "Regresión polinómica",
            "Regresión con términos polinómicos de cada variable",
            Category::Regression,
            vec![
                target(),
                ParameterSpec::numeric("degree", "Grado del polinomio", 2),
            ],
            &["manufactura", "tecnologia"],
            &["linear_regression", "ridge_regression"],
        ),
        descriptor(
            "ridge_regression",
            "Regresión Ridge",
            "Regresión lineal con regularización L2",
            Category::Regression,
            vec![
                target(),
                ParameterSpec::numeric("alpha", "Intensidad de la regularización", 1.0),
            ],
            &["finanzas", "tecnologia"],
            &["linear_regression", "pca"],
        ),
    ]
}

// ============================================================================
// Dimensionality reduction
// ============================================================================

fn dimensionality() -> Vec<CapabilityDescriptor> {
    vec![
        descriptor(
            "pca",
            "PCA",
            "Análisis de componentes principales sobre variables estandarizadas",
            Category::DimensionalityReduction,
            vec![ParameterSpec::numeric("n_components", "Número de componentes", 2)],
            &["finanzas", "salud", "manufactura", "tecnologia"],
            &["kmeans", "random_forest", "tsne"],
        ),
        descriptor(
            "tsne",
            "t-SNE",
            "Proyección no lineal para visualizar vecindades",
            Category::DimensionalityReduction,
            vec![
                ParameterSpec::numeric("n_components", "Número de componentes", 2),
                ParameterSpec::numeric("perplexity", "Vecinos efectivos por punto", 30),
            ],
            &["salud", "tecnologia"],
            &["pca", "kmeans"],
        ),
    ]
}
