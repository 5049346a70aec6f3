//! metasift CLI
//!
//! Command-line interface for the catalog search engine:
//! - Inspect how a query parses and compiles
//! - Search and autocomplete against a local database
//! - Import records and list discovered fields

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use metasift::config::{generate_default_config, Config};
use metasift::logging::init_tracing;
use metasift::query::QueryEngine;
use metasift::storage::{
    page_to_csv, translate, CatalogStore, NewEntity, SearchOptions, SearchPage, SortOrder,
    DEFAULT_PAGE_SIZE,
};
use metasift::suggest::Autocomplete;

#[derive(Parser)]
#[command(name = "metasift")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search query engine for a metadata catalog")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations, then environment)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overrides the configured path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format (table, json, csv)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the syntax tree of a query
    Parse {
        query: String,
    },

    /// Print the predicate a query compiles to
    Compile {
        query: String,
    },

    /// Print the SQL condition and bound parameters of a query
    Sql {
        query: String,
    },

    /// Search records
    Search {
        /// Query text; empty matches everything
        #[arg(default_value = "")]
        query: String,
        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: usize,
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
        /// Field to order by
        #[arg(long)]
        sort_by: Option<String>,
        /// asc or desc
        #[arg(long, default_value = "asc")]
        sort_order: SortOrder,
    },

    /// Autocomplete a partial query
    Suggest {
        partial: String,
        /// Cursor byte offset (default: end of input)
        #[arg(long)]
        cursor: Option<usize>,
    },

    /// List discovered fields
    Fields,

    /// Import records from a JSON array or JSON lines file
    Import {
        path: PathBuf,
        /// Validate without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_tracing(&config.logging).map_err(|e| anyhow::anyhow!("{}", e))?;
    let db = cli.db.clone();

    match cli.command {
        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
            return Ok(());
        }

        Commands::Import { path, dry_run } => {
            let records = read_records(&path)?;
            println!("Read {} records from {}", records.len(), path.display());
            if dry_run {
                println!("Dry run, nothing written");
                return Ok(());
            }

            let store = open_store(db.as_deref(), &config)?;
            let imported = store.import_records(&records)?;
            println!("Imported {} records (total: {})", imported, store.count()?);
            return Ok(());
        }

        _ => {}
    }

    let store = open_store(db.as_deref(), &config)?;
    let catalog = Arc::new(store.discover_catalog()?);
    let engine = QueryEngine::new(Arc::clone(&catalog));

    match cli.command {
        Commands::Parse { query } => {
            let ast = engine.parse(&query).map_err(|e| query_error(&query, e))?;
            println!("{}", serde_json::to_string_pretty(&ast)?);
        }

        Commands::Compile { query } => {
            let predicate = engine.compile_str(&query).map_err(|e| query_error(&query, e))?;
            println!("{}", serde_json::to_string_pretty(&predicate)?);
        }

        Commands::Sql { query } => {
            let predicate = engine.compile_str(&query).map_err(|e| query_error(&query, e))?;
            let fragment = translate(&predicate);
            println!("{}", fragment.sql);
            for (i, param) in fragment.params.iter().enumerate() {
                println!("  ?{} = {:?}", i + 1, param);
            }
        }

        Commands::Search {
            query,
            limit,
            offset,
            sort_by,
            sort_order,
        } => {
            let predicate = engine.compile_str(&query).map_err(|e| query_error(&query, e))?;
            let mut options = SearchOptions::default().page(limit, offset);
            if let Some(field) = sort_by {
                options = options.sort(field, sort_order);
            }

            let page = store.search(&catalog, &predicate, &options)?;
            match cli.format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&page)?),
                "csv" => print!("{}", page_to_csv(&page)?),
                _ => print_page(&page),
            }
        }

        Commands::Suggest { partial, cursor } => {
            let cursor = cursor.unwrap_or(partial.len());
            let outcome = Autocomplete::new(config.suggest_options())
                .suggest(&partial, cursor, &catalog, &store)
                .await;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                if outcome.suggestions.is_empty() {
                    println!("No suggestions");
                }
                for s in &outcome.suggestions {
                    println!(
                        "{:<10} {:<30} {:>3}..{:<3} {}",
                        format!("{:?}", s.kind).to_lowercase(),
                        s.completion,
                        s.span.start,
                        s.span.end,
                        s.detail.as_deref().unwrap_or("")
                    );
                }
                if outcome.degraded {
                    eprintln!("(value sampling unavailable)");
                }
            }
        }

        Commands::Fields => {
            if cli.format == "json" {
                let fields: Vec<_> = catalog.fields().collect();
                println!("{}", serde_json::to_string_pretty(&fields)?);
            } else if catalog.is_empty() {
                println!("No fields discovered yet.");
            } else {
                println!("{:<30} {:<10} {:<10} {}", "Name", "Kind", "Global", "Origin");
                println!("{}", "-".repeat(70));
                for def in catalog.fields() {
                    println!(
                        "{:<30} {:<10} {:<10} {}",
                        def.name,
                        def.kind.as_str(),
                        if def.searchable { "yes" } else { "-" },
                        serde_json::to_string(&def.origin)?
                    );
                }
            }
        }

        Commands::Config { .. } | Commands::Import { .. } => {}
    }

    Ok(())
}

fn open_store(db: Option<&Path>, config: &Config) -> Result<CatalogStore> {
    let path = db
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.database.resolved_path());
    CatalogStore::open(&path, config.store_config())
        .with_context(|| format!("opening database {}", path.display()))
}

/// JSON array, or one JSON object per line
fn read_records(path: &Path) -> Result<Vec<NewEntity>> {
    if !path.exists() {
        bail!("File not found: {}", path.display());
    }
    let content = std::fs::read_to_string(path)?;

    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(&content)?);
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", i + 1))
        })
        .collect()
}

/// Point at the offending part of the query
fn query_error(query: &str, err: metasift::query::QueryError) -> anyhow::Error {
    let span = err.span();
    let start = span.start.min(query.len());
    let width = span.end.saturating_sub(span.start).max(1);
    anyhow::anyhow!(
        "{} [{}]\n  {}\n  {}{}",
        err.user_message(),
        err.code(),
        query,
        " ".repeat(query[..start].chars().count()),
        "^".repeat(width)
    )
}

fn print_page(page: &SearchPage) {
    if page.items.is_empty() {
        println!("No matching records");
        return;
    }

    println!("{:<8} {:<40} {}", "ID", "Name", "Description");
    println!("{}", "-".repeat(80));
    for entity in &page.items {
        let description: String = entity
            .description
            .as_deref()
            .unwrap_or("-")
            .chars()
            .take(30)
            .collect();
        println!("{:<8} {:<40} {}", entity.id, entity.name, description);
    }
    println!();
    println!(
        "Showing {}-{} of {}",
        page.offset + 1,
        page.offset + page.items.len(),
        page.total
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::parse_from(["metasift", "search", "genre:drama", "--limit", "5"]);
        match cli.command {
            Commands::Search { query, limit, .. } => {
                assert_eq!(query, "genre:drama");
                assert_eq!(limit, 5);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_read_json_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"name": "Dune", "genre": "Science Fiction"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"name": "Emma", "metadata": {{"pages": 474}}}}"#).unwrap();

        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].attributes["genre"], "Science Fiction");
        assert_eq!(records[1].metadata["pages"], 474);
    }

    #[test]
    fn test_read_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"name": "Dune"}}, {{"name": "Emma"}}]"#).unwrap();

        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "Emma");
    }

    #[test]
    fn test_query_error_caret() {
        let err = QueryEngine::new(Arc::new(metasift::catalog::SchemaCatalog::default()))
            .compile_str("colour:red")
            .unwrap_err();
        let message = query_error("colour:red", err).to_string();
        assert!(message.contains("[invalid_field]"));
        assert!(message.ends_with("^^^^^^"));
    }
}
