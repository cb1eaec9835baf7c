use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::data::aggregate::Category;
use crate::data::filter::FilterColumn;
use crate::error::{DashError, Result};

/// Workbook read by the built-in dashboards.
pub const DEFAULT_SOURCE: &str = "contPGT_contPlanilhas.xlsx";

/// Label given to blank `Objetivo` cells on the PGT page.
pub const UNSPECIFIED: &str = "Não especificado";

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// All dashboard pages backed by one workbook source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub source: PathBuf,
    pub pages: Vec<PageConfig>,
}

/// One dashboard page: a sheet, its filter widgets and its charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    /// Short identifier used on the command line.
    pub name: String,
    pub title: String,
    pub sheet: String,
    /// Null-coalescing applied once, right after the sheet is loaded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fill_missing: Vec<FillMissing>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_filter: Option<DateFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<ChartSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillMissing {
    pub column: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    pub column: String,
    #[serde(default)]
    pub optional: bool,
}

/// A summary shown on a page, computed from the filtered rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSpec {
    /// Frequency of each value of one column.
    ValueCounts {
        title: String,
        column: String,
        #[serde(default)]
        total: bool,
    },
    /// Row count per observed pair of values.
    GroupBy {
        title: String,
        columns: [String; 2],
        #[serde(default)]
        total: bool,
    },
    /// Rows per category against a fixed goal.
    Progress {
        title: String,
        column: String,
        target: u64,
        categories: Vec<Category>,
    },
    /// Row count and the sum of one numeric column.
    Totals { title: String, sum_column: String },
    /// One bar per row: label column against a numeric column.
    Series {
        title: String,
        label_column: String,
        value_column: String,
    },
}

impl ChartSpec {
    pub fn title(&self) -> &str {
        match self {
            ChartSpec::ValueCounts { title, .. }
            | ChartSpec::GroupBy { title, .. }
            | ChartSpec::Progress { title, .. }
            | ChartSpec::Totals { title, .. }
            | ChartSpec::Series { title, .. } => title,
        }
    }

    /// Columns the chart reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            ChartSpec::ValueCounts { column, .. } | ChartSpec::Progress { column, .. } => {
                vec![column.as_str()]
            }
            ChartSpec::GroupBy { columns, .. } => vec![columns[0].as_str(), columns[1].as_str()],
            ChartSpec::Totals { sum_column, .. } => vec![sum_column.as_str()],
            ChartSpec::Series {
                label_column,
                value_column,
                ..
            } => vec![label_column.as_str(), value_column.as_str()],
        }
    }
}

impl PageConfig {
    /// Whether `column` is declared optional by one of the page's filters.
    pub fn is_optional(&self, column: &str) -> bool {
        self.filters.iter().any(|f| f.name == column && f.optional)
            || self
                .date_filter
                .as_ref()
                .is_some_and(|d| d.column == column && d.optional)
    }

    pub fn filter(&self, column: &str) -> Option<&FilterColumn> {
        self.filters.iter().find(|f| f.name == column)
    }
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl DashboardConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: DashboardConfig =
            serde_json::from_str(text).map_err(|e| DashError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file. A relative `source` is resolved
    /// against the configuration file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .context("reading dashboard configuration")
            .map_err(|e| DashError::Source {
                path: path.to_path_buf(),
                message: "reading configuration".to_string(),
                source: e,
            })?;
        let mut config = Self::from_json(&text)?;
        if config.source.is_relative() {
            if let Some(dir) = path.parent() {
                config.source = dir.join(&config.source);
            }
        }
        log::debug!(
            "Loaded {} dashboard pages from {}",
            config.pages.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| DashError::Config(e.to_string()))
    }

    pub fn page(&self, name: &str) -> Option<&PageConfig> {
        self.pages.iter().find(|p| p.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pages.is_empty() {
            return Err(DashError::Config("no pages defined".into()));
        }
        let mut names = BTreeSet::new();
        for page in &self.pages {
            if !names.insert(page.name.as_str()) {
                return Err(DashError::Config(format!(
                    "duplicate page name '{}'",
                    page.name
                )));
            }
            let mut filters = BTreeSet::new();
            for f in &page.filters {
                if !filters.insert(f.name.as_str()) {
                    return Err(DashError::Config(format!(
                        "page '{}': column '{}' filtered twice",
                        page.name, f.name
                    )));
                }
            }
            for chart in &page.charts {
                if let ChartSpec::Progress {
                    title,
                    target,
                    categories,
                    ..
                } = chart
                {
                    if *target == 0 {
                        return Err(DashError::Config(format!(
                            "page '{}': progress '{title}' needs a positive target",
                            page.name
                        )));
                    }
                    if categories.is_empty() {
                        return Err(DashError::Config(format!(
                            "page '{}': progress '{title}' has no categories",
                            page.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Built-in dashboards
// ---------------------------------------------------------------------------

impl Default for DashboardConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DashboardConfig {
    /// The document, spreadsheet, legal-opinion and field-report dashboards.
    pub fn builtin() -> Self {
        let s = |v: &str| v.to_string();
        let tipo = "Tipo de documento PGT";

        let pgt = PageConfig {
            name: s("pgt"),
            title: s("Dashboard de Documentos PGT"),
            sheet: s("contPGT"),
            fill_missing: vec![FillMissing {
                column: s("Objetivo"),
                label: s(UNSPECIFIED),
            }],
            filters: vec![
                FilterColumn::new(tipo).with_label("Selecione um tipo de documento:"),
                FilterColumn::new("Assentamento").with_label("Selecione um assentamento:"),
                FilterColumn::new("Nome T1").with_label("Selecione um nome T1:"),
                FilterColumn::new("Objetivo")
                    .optional()
                    .with_label("Selecione um objetivo:"),
            ],
            date_filter: None,
            charts: vec![
                ChartSpec::ValueCounts {
                    title: s("Distribuição por Tipo de Documento"),
                    column: s(tipo),
                    total: false,
                },
                ChartSpec::ValueCounts {
                    title: s("Distribuição por Assentamento"),
                    column: s("Assentamento"),
                    total: false,
                },
                ChartSpec::ValueCounts {
                    title: s("Distribuição por Objetivo"),
                    column: s("Objetivo"),
                    total: false,
                },
                ChartSpec::GroupBy {
                    title: s("Quantidade de documentos por tipo e assentamento"),
                    columns: [s(tipo), s("Assentamento")],
                    total: false,
                },
                ChartSpec::Progress {
                    title: s("Progresso da Solicitação de Documentação Complementar"),
                    column: s(tipo),
                    target: 674,
                    categories: vec![Category::new(
                        "Concluídos",
                        "Solicitação de documentação complementar",
                    )],
                },
            ],
        };

        let planilhas = PageConfig {
            name: s("planilhas"),
            title: s("Dashboard de Planilhas"),
            sheet: s("contPlanilhas"),
            fill_missing: Vec::new(),
            filters: Vec::new(),
            date_filter: None,
            charts: vec![
                ChartSpec::Totals {
                    title: s("Totais"),
                    sum_column: s("Quantidade de Abas"),
                },
                ChartSpec::Series {
                    title: s("Distribuição de Abas por Planilha"),
                    label_column: s("Nome da Planilha"),
                    value_column: s("Quantidade de Abas"),
                },
            ],
        };

        let pareceres = PageConfig {
            name: s("pareceres"),
            title: s("Dashboard de Pareceres"),
            sheet: s("contPareceres"),
            fill_missing: Vec::new(),
            filters: vec![
                FilterColumn::new("Assentamento").with_label("Selecione um assentamento:"),
                FilterColumn::new("Formato").with_label("Selecione um formato:"),
                FilterColumn::new("Andamento").with_label("Selecione um andamento:"),
            ],
            date_filter: None,
            charts: vec![
                ChartSpec::Progress {
                    title: s("Progresso dos Pareceres"),
                    column: s("Andamento"),
                    target: 5861,
                    categories: vec![
                        Category::new("Em elaboração", "Em elaboração"),
                        Category::new("Concluídos", "Concluído"),
                    ],
                },
                ChartSpec::ValueCounts {
                    title: s("Distribuição dos Pareceres por Assentamento"),
                    column: s("Assentamento"),
                    total: false,
                },
                ChartSpec::ValueCounts {
                    title: s("Andamento"),
                    column: s("Andamento"),
                    total: false,
                },
                ChartSpec::GroupBy {
                    title: s("Quantidade de pareceres por formato e andamento"),
                    columns: [s("Formato"), s("Andamento")],
                    total: true,
                },
            ],
        };

        let relatorios = PageConfig {
            name: s("relatorios"),
            title: s("Dashboard de Relatórios de Campo"),
            sheet: s("contRelatorios"),
            fill_missing: Vec::new(),
            filters: vec![
                FilterColumn::new("Técnico").with_label("Selecione um técnico:"),
                FilterColumn::new("Município")
                    .free_text()
                    .with_label("Selecione um município:"),
                FilterColumn::new("Assentamento").with_label("Selecione um assentamento:"),
                FilterColumn::new("Tipo de relatório")
                    .with_label("Selecione um tipo de relatório:"),
                FilterColumn::new("Modalidade")
                    .optional()
                    .with_label("Selecione uma modalidade:"),
            ],
            date_filter: Some(DateFilter {
                column: s("Data"),
                optional: false,
            }),
            charts: vec![
                ChartSpec::ValueCounts {
                    title: s("Relatórios por tipo"),
                    column: s("Tipo de relatório"),
                    total: true,
                },
                ChartSpec::ValueCounts {
                    title: s("Relatórios por técnico"),
                    column: s("Técnico"),
                    total: false,
                },
                ChartSpec::GroupBy {
                    title: s("Relatórios por município e modalidade"),
                    columns: [s("Município"), s("Modalidade")],
                    total: false,
                },
            ],
        };

        DashboardConfig {
            source: PathBuf::from(DEFAULT_SOURCE),
            pages: vec![pgt, planilhas, pareceres, relatorios],
        }
    }
}
