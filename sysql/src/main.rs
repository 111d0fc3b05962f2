///
/// sysql CLI - run SQL against the built-in virtual tables
///
/// - sysql query <sql>: print result rows as JSON
/// - sysql columns <sql>: print result column names and inferred types
/// - sysql tables: list registered tables and their attributes
///
/// Configuration is read from --config, else from the platform config
/// directory when present. Logs go to stderr.
///

use clap::{Parser, Subcommand};
use rusqlite::types::Value as SqlValue;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use sysql::{
    ColumnDef, ColumnType, DbManager, ManagerConfig, QueryContext, SqlInternal, TableAttributes,
    TableRegistry, TableRows, VirtualTableContent, default_config_path, get_query_columns_internal,
};

#[derive(Parser)]
#[command(name = "sysql")]
#[command(author, version, about = "SQL over live system state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Comma-delimited table names to leave unattached
    #[arg(long, global = true)]
    disable_tables: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print its rows
    Query {
        /// The SQL to run
        sql: String,

        /// Allow tables to serve cached results
        #[arg(long)]
        cache: bool,
    },

    /// Print the result columns of a query with their types
    Columns {
        /// The SQL to inspect
        sql: String,
    },

    /// List registered tables
    Tables,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .init();

    let config = match load_config(cli.config.as_ref(), cli.disable_tables) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let manager = match install_manager(config) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Query { sql, cache } => run_query(&sql, cache),
        Commands::Columns { sql } => print_columns(manager, &sql),
        Commands::Tables => run_query("SELECT * FROM sysql_tables", false),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>, disabled: Option<String>) -> sysql::Result<ManagerConfig> {
    let mut config = match path {
        Some(path) => ManagerConfig::from_path(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => ManagerConfig::from_path(&path)?,
            _ => ManagerConfig::default(),
        },
    };
    if let Some(disabled) = disabled {
        config = config.with_disabled_tables(disabled);
    }
    Ok(config)
}

fn install_manager(config: ManagerConfig) -> sysql::Result<&'static DbManager> {
    let registry = Arc::new(TableRegistry::new());
    let disabled = config.disabled_set();

    let catalog = Arc::downgrade(&registry);
    registry.register(
        VirtualTableContent::from_fn(
            "sysql_tables",
            vec![
                ColumnDef::new("name", ColumnType::Text),
                ColumnDef::new("attributes", ColumnType::Text),
                ColumnDef::new("disabled", ColumnType::Integer),
            ],
            move |_ctx: &QueryContext| Ok(table_catalog(&catalog, &disabled)),
        )?
        .with_attributes(TableAttributes::UTILITY),
    )?;

    let heap_limit = config.soft_heap_limit;
    registry.register(
        VirtualTableContent::from_fn(
            "sysql_info",
            vec![
                ColumnDef::new("version", ColumnType::Text),
                ColumnDef::new("sqlite_version", ColumnType::Text),
                ColumnDef::new("soft_heap_limit", ColumnType::BigInt),
            ],
            move |_ctx: &QueryContext| {
                Ok(vec![vec![
                    SqlValue::Text(env!("CARGO_PKG_VERSION").to_string()),
                    SqlValue::Text(rusqlite::version().to_string()),
                    SqlValue::Integer(heap_limit),
                ]])
            },
        )?
        .with_attributes(TableAttributes::UTILITY | TableAttributes::CACHEABLE),
    )?;

    debug!(tables = registry.len(), "registered built-in tables");
    DbManager::install(DbManager::new(config, registry))
}

fn table_catalog(
    registry: &Weak<TableRegistry>,
    disabled: &std::collections::HashSet<String>,
) -> TableRows {
    let Some(registry) = registry.upgrade() else {
        return Vec::new();
    };
    registry
        .tables()
        .iter()
        .map(|table| {
            vec![
                SqlValue::Text(table.name().to_string()),
                SqlValue::Text(table.attributes().names().join(",")),
                SqlValue::Integer(disabled.contains(table.name()) as i64),
            ]
        })
        .collect()
}

fn run_query(sql: &str, cache: bool) -> sysql::Result<()> {
    let result = SqlInternal::new(sql, cache)?;
    info!(
        event_based = result.event_based(),
        tables = ?result.tables(),
        rows = result.rows().len(),
        "query finished"
    );

    let rows: Vec<serde_json::Map<String, serde_json::Value>> = result
        .into_rows()
        .into_iter()
        .map(|row| row.into_iter().map(|(k, v)| (k, to_json(v))).collect())
        .collect();
    print_json(&rows)
}

fn print_columns(manager: &DbManager, sql: &str) -> sysql::Result<()> {
    let instance = manager.get()?;
    let columns = get_query_columns_internal(sql, &instance)?;
    print_json(&columns)
}

fn print_json<T: serde::Serialize>(value: &T) -> sysql::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn to_json(value: SqlValue) -> serde_json::Value {
    match value {
        SqlValue::Null => serde_json::Value::Null,
        SqlValue::Integer(i) => serde_json::Value::from(i),
        SqlValue::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        SqlValue::Text(s) => serde_json::Value::String(s),
        SqlValue::Blob(b) => serde_json::Value::String(String::from_utf8_lossy(&b).into_owned()),
    }
}
