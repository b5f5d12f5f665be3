//! Visualization Hints
//!
//! Fixed chart suggestions per capability category.

use ml_analysis_core::Category;

use crate::models::analysis::Visualization;

/// Charts suggested for a category; `None` gets a generic pair
pub fn visualizations(category: Option<Category>) -> Vec<Visualization> {
    let entries: &[(&str, &str, &str)] = match category {
        Some(Category::TimeSeries) => &[
            ("line", "Serie temporal", "Datos históricos y pronóstico a lo largo del tiempo"),
            ("area", "Gráfico de área", "Evolución y acumulación del valor pronosticado"),
            (
                "scatter",
                "Residuales del modelo",
                "Errores de ajuste por periodo para detectar estructura no capturada",
            ),
        ],
        Some(Category::Classification) => &[
            ("heatmap", "Matriz de confusión", "Aciertos y errores por clase real y predicha"),
            ("bar", "Importancia de variables", "Contribución de cada variable a la predicción"),
            ("radar", "Métricas por clase", "Comparación de precisión, exhaustividad y F1"),
        ],
        Some(Category::Clustering) => &[
            (
                "scatter",
                "Gráfico de dispersión por grupo",
                "Observaciones coloreadas según el grupo asignado",
            ),
            ("bar", "Tamaño de los grupos", "Número de observaciones en cada grupo"),
            ("radar", "Perfil de centroides", "Valores medios de cada variable por grupo"),
        ],
        Some(Category::Statistical) => &[
            (
                "boxplot",
                "Diagrama de caja",
                "Distribución de la variable por grupo y valores atípicos",
            ),
            ("bar", "Medias por grupo", "Comparación de medias entre los grupos analizados"),
        ],
        Some(Category::Regression) => &[
            ("scatter", "Valores reales vs. predichos", "Ajuste del modelo sobre cada observación"),
            ("bar", "Coeficientes", "Peso de cada variable en el modelo"),
            ("scatter", "Residuales", "Errores frente a valores predichos"),
        ],
        Some(Category::DimensionalityReduction) => &[
            ("bar", "Varianza explicada", "Proporción de varianza capturada por cada componente"),
            (
                "scatter",
                "Proyección en componentes",
                "Observaciones sobre los dos primeros componentes",
            ),
            ("heatmap", "Mapa de cargas", "Relación entre variables originales y componentes"),
        ],
        None => &[
            ("bar", "Gráfico de barras", "Comparación de categorías discretas"),
            ("pie", "Gráfico circular", "Distribución proporcional de categorías"),
        ],
    };

    entries
        .iter()
        .map(|(kind, title, description)| Visualization::new(kind, title, description))
        .collect()
}
