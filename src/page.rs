//! One render cycle of a dashboard page.
//!
//! Everything a page shows is recomputed from the base sheet and a freshly
//! built [`FilterSpec`]; nothing is carried over between cycles.

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::{ChartSpec, DashboardConfig, PageConfig};
use crate::data::aggregate::{
    group_by_count_by, progress_tally, series, totals, value_counts_by, AggregateTable,
    ProgressTally, Totals,
};
use crate::data::filter::{apply, DateRange, FilterColumn, FilterSpec, ALL};
use crate::data::loader::SheetCache;
use crate::data::model::Dataset;
use crate::data::options::{option_lists, OptionList};
use crate::error::{DashError, Result};

/// What a page shows for one set of selections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub name: String,
    pub title: String,
    /// Widget choices, always from the unfiltered sheet.
    pub options: Vec<OptionList>,
    /// `(column, selected value)` per filter widget.
    pub selected: Vec<(String, String)>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Row count of the unfiltered sheet.
    pub base_rows: usize,
    pub rows: Dataset,
    pub charts: Vec<ChartView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartView {
    Counts { title: String, table: AggregateTable },
    Progress { title: String, tally: ProgressTally },
    Totals { title: String, totals: Totals },
    Series { title: String, points: Vec<(String, f64)> },
}

impl ChartView {
    pub fn title(&self) -> &str {
        match self {
            ChartView::Counts { title, .. }
            | ChartView::Progress { title, .. }
            | ChartView::Totals { title, .. }
            | ChartView::Series { title, .. } => title,
        }
    }
}

/// Load-time preprocessing: fill blank cells as the page declares.
pub fn prepare(raw: &Dataset, page: &PageConfig) -> Dataset {
    page.fill_missing
        .iter()
        .fold(raw.clone(), |ds, rule| ds.fill_missing(&rule.column, &rule.label))
}

/// Build the page's filter spec from `(column, value)` selections.
///
/// Filters the user did not touch default to `"Todos"`. Naming a column the
/// page does not filter on, or passing a date window to a page without a
/// date filter, is a configuration error.
pub fn filter_spec(
    page: &PageConfig,
    selections: &[(String, String)],
    window: Option<(NaiveDate, NaiveDate)>,
) -> Result<FilterSpec> {
    let mut spec = FilterSpec::new();
    for column in &page.filters {
        spec.set(column.clone(), ALL);
    }
    for (name, value) in selections {
        let column = page.filter(name).ok_or_else(|| {
            DashError::Config(format!("page '{}' has no filter on '{name}'", page.name))
        })?;
        spec.set(column.clone(), value.as_str());
    }

    if let Some((start, end)) = window {
        let date = page.date_filter.as_ref().ok_or_else(|| {
            DashError::Config(format!("page '{}' has no date filter", page.name))
        })?;
        let mut range = DateRange::new(&date.column, start, end);
        range.optional = date.optional;
        spec = spec.with_date_range(range);
    }
    Ok(spec)
}

/// Run the full pipeline for one page over an already prepared sheet.
///
/// Charts over an optional column the sheet lacks are left out; any other
/// missing column is a schema error.
pub fn render(base: &Dataset, page: &PageConfig, spec: &FilterSpec) -> Result<PageView> {
    let options = option_lists(base, &page.filters)?;
    let rows = apply(base, spec)?;

    let mut charts = Vec::with_capacity(page.charts.len());
    for chart in &page.charts {
        let missing = chart
            .columns()
            .into_iter()
            .find(|c| !rows.has_column(c) && page.is_optional(c));
        if let Some(column) = missing {
            log::info!(
                "page '{}': chart '{}' skipped, optional column '{column}' is absent",
                page.name,
                chart.title()
            );
            continue;
        }
        charts.push(chart_view(&rows, page, chart)?);
    }

    log::debug!(
        "page '{}': {} of {} rows, {} charts",
        page.name,
        rows.len(),
        base.len(),
        charts.len()
    );

    Ok(PageView {
        name: page.name.clone(),
        title: page.title.clone(),
        options,
        selected: page
            .filters
            .iter()
            .map(|f| (f.name.clone(), spec.selected(&f.name).to_string()))
            .collect(),
        date_range: spec.date_range().map(|r| (r.start, r.end)),
        base_rows: base.len(),
        rows,
        charts,
    })
}

/// Render every page of `config` for one set of selections.
///
/// Each page picks up only the selections for its own filters, and the date
/// window only if it has a date filter. A page whose sheet the source does
/// not contain is skipped with a warning.
pub fn render_all(
    config: &DashboardConfig,
    cache: &mut SheetCache,
    selections: &[(String, String)],
    window: Option<(NaiveDate, NaiveDate)>,
) -> Result<Vec<PageView>> {
    let mut views = Vec::with_capacity(config.pages.len());
    for page in &config.pages {
        let raw = match cache.get_or_load(&config.source, &page.sheet) {
            Ok(raw) => raw,
            Err(DashError::Schema(msg)) => {
                log::warn!("page '{}' skipped: {msg}", page.name);
                continue;
            }
            Err(e) => return Err(e),
        };
        let own: Vec<(String, String)> = selections
            .iter()
            .filter(|(col, _)| page.filter(col).is_some())
            .cloned()
            .collect();
        let page_window = window.filter(|_| page.date_filter.is_some());

        let base = prepare(&raw, page);
        let spec = filter_spec(page, &own, page_window)?;
        views.push(render(&base, page, &spec)?);
    }
    Ok(views)
}

/// Compute one chart from filtered rows.
///
/// Grouping columns that are also filters of `page` are keyed the way the
/// filter compares them.
pub fn chart_view(rows: &Dataset, page: &PageConfig, chart: &ChartSpec) -> Result<ChartView> {
    let grouping = |column: &str| {
        page.filter(column)
            .cloned()
            .unwrap_or_else(|| FilterColumn::new(column))
    };
    let view = match chart {
        ChartSpec::ValueCounts {
            title,
            column,
            total,
        } => {
            let table = value_counts_by(rows, &grouping(column.as_str()))?;
            ChartView::Counts {
                title: title.clone(),
                table: if *total { table.with_total() } else { table },
            }
        }
        ChartSpec::GroupBy {
            title,
            columns,
            total,
        } => {
            let table = group_by_count_by(
                rows,
                &grouping(columns[0].as_str()),
                &grouping(columns[1].as_str()),
            )?;
            ChartView::Counts {
                title: title.clone(),
                table: if *total { table.with_total() } else { table },
            }
        }
        ChartSpec::Progress {
            title,
            column,
            target,
            categories,
        } => ChartView::Progress {
            title: title.clone(),
            tally: progress_tally(rows, column, *target, categories)?,
        },
        ChartSpec::Totals { title, sum_column } => ChartView::Totals {
            title: title.clone(),
            totals: totals(rows, sum_column)?,
        },
        ChartSpec::Series {
            title,
            label_column,
            value_column,
        } => ChartView::Series {
            title: title.clone(),
            points: series(rows, label_column, value_column)?,
        },
    };
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DashboardConfig, UNSPECIFIED};
    use crate::data::model::tests::table;
    use crate::data::model::Value;

    fn pgt_sheet(with_objetivo: bool) -> Dataset {
        let mut columns = vec!["Tipo de documento PGT", "Assentamento", "Nome T1"];
        if with_objetivo {
            columns.push("Objetivo");
        }
        let rows: [&[&str]; 4] = [
            &["Solicitação de documentação complementar", "Alegria", "Ana", ""],
            &["Solicitação de documentação complementar", "Bela Vista", "Bruno", "Titulação"],
            &["Ofício", "Alegria", "Ana", "Titulação"],
            &["Ata", "Canaã", "Carla", ""],
        ];
        let rows: Vec<&[&str]> = rows
            .iter()
            .map(|r| if with_objetivo { *r } else { &r[..3] })
            .collect();
        table(&columns, &rows)
    }

    fn pgt_page() -> PageConfig {
        DashboardConfig::builtin().page("pgt").unwrap().clone()
    }

    #[test]
    fn prepare_fills_blank_objetivo() {
        let ds = prepare(&pgt_sheet(true), &pgt_page());
        assert_eq!(
            ds.records[0].get("Objetivo"),
            &Value::String(UNSPECIFIED.to_string())
        );
    }

    #[test]
    fn options_ignore_sibling_selections() {
        let page = pgt_page();
        let base = prepare(&pgt_sheet(true), &page);
        let spec = filter_spec(&page, &[("Assentamento".into(), "Canaã".into())], None).unwrap();
        let view = render(&base, &page, &spec).unwrap();

        assert_eq!(view.rows.len(), 1);
        let tipos = &view.options[0];
        assert_eq!(tipos.column, "Tipo de documento PGT");
        assert_eq!(tipos.choices().len(), 3);
        assert_eq!(view.base_rows, 4);
    }

    #[test]
    fn progress_counts_filtered_rows_against_target() {
        let page = pgt_page();
        let base = prepare(&pgt_sheet(true), &page);
        let view = render(&base, &page, &filter_spec(&page, &[], None).unwrap()).unwrap();

        let tally = view
            .charts
            .iter()
            .find_map(|c| match c {
                ChartView::Progress { tally, .. } => Some(tally),
                _ => None,
            })
            .unwrap();
        assert_eq!(tally.part("Concluídos"), Some(2));
        assert_eq!(tally.remaining, 672);
    }

    #[test]
    fn optional_chart_is_skipped_when_column_absent() {
        let page = pgt_page();
        let base = prepare(&pgt_sheet(false), &page);
        let spec = filter_spec(&page, &[("Objetivo".into(), "Titulação".into())], None).unwrap();
        let view = render(&base, &page, &spec).unwrap();

        assert_eq!(view.rows.len(), 4);
        assert!(view
            .charts
            .iter()
            .all(|c| c.title() != "Distribuição por Objetivo"));
        assert_eq!(view.charts.len(), page.charts.len() - 1);
        assert_eq!(view.options[3].values, [ALL]);
    }

    #[test]
    fn every_selection_defaults_to_wildcard() {
        let page = pgt_page();
        let spec = filter_spec(&page, &[], None).unwrap();
        assert!(spec.is_unconstrained());
        let base = prepare(&pgt_sheet(true), &page);
        let view = render(&base, &page, &spec).unwrap();
        assert!(view.selected.iter().all(|(_, v)| v == ALL));
        assert_eq!(view.rows, base);
    }

    #[test]
    fn unknown_selection_column_is_config_error() {
        let page = pgt_page();
        let err = filter_spec(&page, &[("Formato".into(), "Digital".into())], None).unwrap_err();
        assert!(matches!(err, DashError::Config(_)));
    }

    #[test]
    fn date_window_needs_a_date_filter() {
        let page = pgt_page();
        let d = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        assert!(matches!(
            filter_spec(&page, &[], Some((d, d))),
            Err(DashError::Config(_))
        ));
    }

    #[test]
    fn field_report_page_filters_by_municipality_and_date() {
        let config = DashboardConfig::builtin();
        let page = config.page("relatorios").unwrap();
        let base = table(
            &["Técnico", "Município", "Assentamento", "Tipo de relatório", "Data"],
            &[
                &["Ana", "Marabá", "Alegria", "Vistoria", "15/03/2022"],
                &["Ana", "Maraba", "Alegria", "Vistoria", "01/01/2023"],
                &["Bruno", "Marabá", "Canaã", "Supervisão", "10/10/2022"],
                &["Bruno", "Parauapebas", "Canaã", "Vistoria", "11/10/2022"],
            ],
        );
        let spec = filter_spec(
            page,
            &[("Município".into(), "Maraba".into())],
            Some((
                NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
            )),
        )
        .unwrap();
        let view = render(&base, page, &spec).unwrap();

        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.options[1].values, ["Todos", "Maraba", "Parauapebas"]);
        // Modalidade is optional and absent: its group-by is skipped
        assert_eq!(view.charts.len(), 2);
        match &view.charts[0] {
            ChartView::Counts { table, .. } => {
                assert_eq!(table.get(&["Vistoria"]), Some(1));
                assert_eq!(table.total(), Some(2));
            }
            other => panic!("unexpected chart {other:?}"),
        }
    }

    #[test]
    fn municipality_chart_merges_accent_variants() {
        let config = DashboardConfig::builtin();
        let page = config.page("relatorios").unwrap();
        let base = table(
            &["Técnico", "Município", "Assentamento", "Tipo de relatório", "Modalidade", "Data"],
            &[
                &["Ana", "Marabá", "Alegria", "Vistoria", "Remota", "15/03/2022"],
                &["Ana", "Maraba", "Alegria", "Vistoria", "Remota", "01/01/2023"],
                &["Bruno", "Parauapebas", "Canaã", "Vistoria", "Presencial", "10/10/2022"],
            ],
        );
        let view = render(&base, page, &filter_spec(page, &[], None).unwrap()).unwrap();

        let table = view
            .charts
            .iter()
            .find_map(|c| match c {
                ChartView::Counts { table, .. } if table.columns[0] == "Município" => Some(table),
                _ => None,
            })
            .unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.get(&["Maraba", "Remota"]), Some(2));
    }

    #[test]
    fn planilhas_totals_and_series() {
        let config = DashboardConfig::builtin();
        let page = config.page("planilhas").unwrap();
        let mut base = table(
            &["Nome da Planilha", "Quantidade de Abas"],
            &[&["Cadastro", ""], &["Vistoria", ""]],
        );
        base.records[0].fields.insert("Quantidade de Abas".into(), Value::Integer(4));
        base.records[1].fields.insert("Quantidade de Abas".into(), Value::Integer(2));

        let view = render(&base, page, &FilterSpec::new()).unwrap();
        match &view.charts[0] {
            ChartView::Totals { totals, .. } => {
                assert_eq!(totals.rows, 2);
                assert_eq!(totals.sum, 6.0);
            }
            other => panic!("unexpected chart {other:?}"),
        }
        match &view.charts[1] {
            ChartView::Series { points, .. } => assert_eq!(points.len(), 2),
            other => panic!("unexpected chart {other:?}"),
        }
    }

    #[test]
    fn missing_required_column_fails_render() {
        let config = DashboardConfig::builtin();
        let page = config.page("pareceres").unwrap();
        let base = table(&["Assentamento", "Formato"], &[&["Alegria", "Digital"]]);
        assert!(matches!(
            render(&base, page, &FilterSpec::new()),
            Err(DashError::Schema(_))
        ));
    }
}
