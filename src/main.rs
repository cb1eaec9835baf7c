use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;

use sheet_dash::config::DashboardConfig;
use sheet_dash::data::loader::SheetCache;
use sheet_dash::data::model::DATE_PATTERN;
use sheet_dash::{page, report};

#[derive(Parser)]
#[command(name = "sheet-dash")]
#[command(about = "Filter and summarise dashboard sheets from a workbook")]
struct Args {
    /// Dashboard configuration (JSON); the built-in dashboards when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workbook or sheet directory, overriding the configured source
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Page to render (all pages when omitted)
    #[arg(short, long)]
    page: Option<String>,

    /// Filter selection as COLUMN=VALUE, repeatable
    #[arg(short, long = "filter", value_parser = parse_selection)]
    filters: Vec<(String, String)>,

    /// First day of the date window (dd/mm/yyyy)
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,

    /// Last day of the date window (dd/mm/yyyy)
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,

    /// Rows of the filtered sheet to print
    #[arg(long, default_value = "20")]
    rows: usize,

    /// Emit page views as JSON instead of text
    #[arg(long)]
    json: bool,

    /// List configured pages and exit
    #[arg(long)]
    list_pages: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn parse_selection(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((col, value)) if !col.trim().is_empty() => {
            Ok((col.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected COLUMN=VALUE, got '{s}'")),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DATE_PATTERN).map_err(|e| format!("'{s}': {e} (expected dd/mm/yyyy)"))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DashboardConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => DashboardConfig::builtin(),
    };
    if let Some(source) = &args.source {
        config.source = source.clone();
    }

    if args.dump_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }
    if args.list_pages {
        for p in &config.pages {
            println!("{:<12} {:<16} {}", p.name, p.sheet, p.title);
        }
        return Ok(());
    }

    let window = match (args.from, args.to) {
        (None, None) => None,
        (from, to) => Some((from.unwrap_or(NaiveDate::MIN), to.unwrap_or(NaiveDate::MAX))),
    };

    let mut cache = SheetCache::new();
    let views = match &args.page {
        Some(name) => {
            let Some(p) = config.page(name) else {
                bail!("unknown page '{name}' (try --list-pages)");
            };
            let raw = cache
                .get_or_load(&config.source, &p.sheet)
                .with_context(|| format!("loading sheet for page '{}'", p.name))?;
            let base = page::prepare(&raw, p);
            let spec = page::filter_spec(p, &args.filters, window)?;
            let view = page::render(&base, p, &spec)
                .with_context(|| format!("rendering page '{}'", p.name))?;
            vec![view]
        }
        None => page::render_all(&config, &mut cache, &args.filters, window)
            .context("rendering pages")?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        for view in &views {
            print!("{}", report::render_page(view, args.rows)?);
            println!();
        }
    }
    Ok(())
}
