use chrono::NaiveDate;

use sheet_dash::data::aggregate::value_counts;
use sheet_dash::data::filter::apply;
use sheet_dash::data::loader::{load, SheetCache};
use sheet_dash::data::options::option_list;
use sheet_dash::{page, ChartView, DashError, DashboardConfig, DateRange, FilterColumn, FilterSpec, ALL};

const PARECERES: &str = "\
Número,Assentamento,Formato,Andamento
1,Alegria,Digital,Concluído
2,Alegria,Físico,Em elaboração
3,Bela Vista,Digital,Concluído
4,Canaã,Digital,Arquivado
5,Bela Vista,Físico,Concluído
";

const RELATORIOS: &str = "\
Técnico,Município,Assentamento,Tipo de relatório,Data
Ana,São Félix do Xingu,Alegria,Vistoria,15/03/2022
Ana,Sao Felix do Xingu,Alegria,Supervisão,01/01/2023
Bruno,Marabá,Canaã,Vistoria,31/12/2022
Carla,Maraba,Canaã,Vistoria,01/01/2022
";

fn sheet_dir(sheets: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in sheets {
        std::fs::write(dir.path().join(format!("{name}.csv")), contents).unwrap();
    }
    dir
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn pareceres_page_end_to_end() {
    let dir = sheet_dir(&[("contPareceres", PARECERES)]);
    let config = DashboardConfig::builtin();
    let p = config.page("pareceres").unwrap();

    let base = page::prepare(&load(dir.path(), &p.sheet).unwrap(), p);
    let spec = page::filter_spec(p, &[("Formato".into(), "Digital".into())], None).unwrap();
    let view = page::render(&base, p, &spec).unwrap();

    assert_eq!(view.rows.len(), 3);
    assert_eq!(
        view.options[0].values,
        ["Todos", "Alegria", "Bela Vista", "Canaã"]
    );

    let ChartView::Progress { tally, .. } = &view.charts[0] else {
        panic!("first pareceres chart is the progress bar");
    };
    assert_eq!(tally.part("Em elaboração"), Some(0));
    assert_eq!(tally.part("Concluídos"), Some(2));
    assert_eq!(tally.remaining, 5861 - 2);

    let ChartView::Counts { table, .. } = &view.charts[3] else {
        panic!("fourth pareceres chart is the group-by table");
    };
    assert_eq!(table.get(&["Digital", "Concluído"]), Some(2));
    assert_eq!(table.get(&["Digital", "Arquivado"]), Some(1));
    assert_eq!(table.total(), Some(3));
}

#[test]
fn every_permutation_of_filters_gives_the_same_rows() {
    let dir = sheet_dir(&[("contRelatorios", RELATORIOS)]);
    let ds = load(dir.path(), "contRelatorios").unwrap();

    let tecnico = (FilterColumn::new("Técnico"), "Ana");
    let municipio = (FilterColumn::new("Município").free_text(), "Sao Felix do Xingu");
    let tipo = (FilterColumn::new("Tipo de relatório"), "Vistoria");
    let range = DateRange::new("Data", ymd(2022, 1, 1), ymd(2022, 12, 31));

    let orders = [
        [&tecnico, &municipio, &tipo],
        [&tecnico, &tipo, &municipio],
        [&municipio, &tecnico, &tipo],
        [&municipio, &tipo, &tecnico],
        [&tipo, &tecnico, &municipio],
        [&tipo, &municipio, &tecnico],
    ];
    let results: Vec<_> = orders
        .iter()
        .map(|order| {
            let spec = order
                .iter()
                .fold(FilterSpec::new(), |spec, (col, value)| {
                    spec.select(col.clone(), *value)
                })
                .with_date_range(range.clone());
            apply(&ds, &spec).unwrap()
        })
        .collect();

    assert_eq!(results[0].len(), 1);
    assert!(results.iter().all(|r| r == &results[0]));
}

#[test]
fn accent_variants_share_one_option_and_one_filter_result() {
    let dir = sheet_dir(&[("contRelatorios", RELATORIOS)]);
    let ds = load(dir.path(), "contRelatorios").unwrap();
    let municipio = FilterColumn::new("Município").free_text();

    let options = option_list(&ds, &municipio).unwrap();
    assert_eq!(options.values, [ALL, "Maraba", "Sao Felix do Xingu"]);

    for choice in options.choices() {
        let rows = apply(&ds, &FilterSpec::new().select(municipio.clone(), choice.as_str())).unwrap();
        assert_eq!(rows.len(), 2, "{choice}");
    }
}

#[test]
fn malformed_date_surfaces_as_parse_error() {
    let sheet = "Técnico,Data\nAna,15/03/2022\nBruno,2022-03-15\n";
    let dir = sheet_dir(&[("contRelatorios", sheet)]);
    let ds = load(dir.path(), "contRelatorios").unwrap();
    let spec = FilterSpec::new().with_date_range(DateRange::new("Data", ymd(2022, 1, 1), ymd(2022, 12, 31)));

    match apply(&ds, &spec) {
        Err(DashError::Parse { column, value, .. }) => {
            assert_eq!(column, "Data");
            assert_eq!(value, "2022-03-15");
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn pgt_sheet_without_objetivo_still_renders() {
    let sheet = "\
Tipo de documento PGT,Assentamento,Nome T1
Solicitação de documentação complementar,Alegria,T1 Norte
Ofício,Canaã,T1 Sul
";
    let dir = sheet_dir(&[("contPGT", sheet)]);
    let config = DashboardConfig::builtin();
    let p = config.page("pgt").unwrap();

    let base = page::prepare(&load(dir.path(), &p.sheet).unwrap(), p);
    let spec = page::filter_spec(p, &[("Objetivo".into(), "Titulação".into())], None).unwrap();
    let view = page::render(&base, p, &spec).unwrap();

    assert_eq!(view.rows, base);
    assert!(view.charts.iter().all(|c| !c.title().contains("Objetivo")));
}

#[test]
fn status_scenario_counts_and_tally() {
    let sheet = "Status\nConcluído\nConcluído\nEm elaboração\n";
    let dir = sheet_dir(&[("status", sheet)]);
    let ds = load(dir.path(), "status").unwrap();

    let counts = value_counts(&ds, "Status").unwrap();
    assert_eq!(counts.get(&["Concluído"]), Some(2));
    assert_eq!(counts.get(&["Em elaboração"]), Some(1));

    let tally = sheet_dash::data::aggregate::progress_tally(
        &ds,
        "Status",
        10,
        &[
            sheet_dash::Category::new("done", "Concluído"),
            sheet_dash::Category::new("inProgress", "Em elaboração"),
        ],
    )
    .unwrap();
    assert_eq!(tally.remaining, 7);
}

#[test]
fn config_file_drives_a_custom_page() {
    let dir = sheet_dir(&[("contPareceres", PARECERES)]);
    let config_path = dir.path().join("dash.json");
    std::fs::write(
        &config_path,
        r#"{
            "source": ".",
            "pages": [{
                "name": "metas",
                "title": "Metas",
                "sheet": "contPareceres",
                "filters": [{ "name": "Assentamento" }],
                "charts": [{
                    "kind": "progress",
                    "title": "Concluídos",
                    "column": "Andamento",
                    "target": 2,
                    "categories": [{ "label": "ok", "value": "Concluído" }]
                }]
            }]
        }"#,
    )
    .unwrap();

    let config = DashboardConfig::load(&config_path).unwrap();
    let p = config.page("metas").unwrap();
    let mut cache = SheetCache::new();
    let raw = cache.get_or_load(&config.source, &p.sheet).unwrap();
    let view = page::render(&raw, p, &page::filter_spec(p, &[], None).unwrap()).unwrap();

    let ChartView::Progress { tally, .. } = &view.charts[0] else {
        panic!("expected progress chart");
    };
    assert_eq!(tally.achieved(), 3);
    assert_eq!(tally.remaining, 0);
}

#[test]
fn missing_sources_and_sheets_are_distinguished() {
    let dir = sheet_dir(&[("contPGT", "A\n1\n")]);
    assert!(matches!(
        load(&dir.path().join("missing"), "contPGT"),
        Err(DashError::SourceNotFound(_))
    ));
    assert!(matches!(
        load(dir.path(), "contPareceres"),
        Err(DashError::Schema(_))
    ));
}

#[test]
fn all_pages_skip_a_sheet_the_source_lacks() {
    let pgt = "Tipo de documento PGT,Assentamento,Nome T1,Objetivo\nOfício,Alegria,T1 Norte,\n";
    let planilhas = "Nome da Planilha,Quantidade de Abas\nCadastro,3\n";
    let dir = sheet_dir(&[
        ("contPGT", pgt),
        ("contPlanilhas", planilhas),
        ("contPareceres", PARECERES),
    ]);
    let mut config = DashboardConfig::builtin();
    config.source = dir.path().to_path_buf();

    let mut cache = SheetCache::new();
    let selections = [("Formato".to_string(), "Digital".to_string())];
    let views = page::render_all(&config, &mut cache, &selections, None).unwrap();

    let names: Vec<_> = views.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["pgt", "planilhas", "pareceres"]);
    assert_eq!(views[2].rows.len(), 3);
    assert_eq!(views[0].rows.len(), 1);

    config.source = dir.path().join("missing");
    assert!(matches!(
        page::render_all(&config, &mut SheetCache::new(), &[], None),
        Err(DashError::SourceNotFound(_))
    ));
}
