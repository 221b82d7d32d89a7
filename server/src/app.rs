//! Core application

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands, SystemCommands};
use crate::core::config::{AppConfig, TableConfig};
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::persist::{KeyValueStore, open_store};
use crate::domain::table::filters::{SqlParams, parse_query};
use crate::domain::table::{
    ColumnSet, CorrectionService, HttpCorrectionService, MemoryRowSource, RowSource,
    TableController, TableRegistry, TableServices,
};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub registry: Arc<TableRegistry>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::System {
                command: system_cmd,
            }) => {
                return Self::handle_system_command(system_cmd);
            }
            Some(Commands::Parse { table, query }) => {
                return Self::parse_command(&cli_config, &table, &query);
            }
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;

        let store = open_store(&storage).context("Failed to open table state store")?;
        tracing::debug!(backend = store.backend_name(), "State store opened");

        let registry = Arc::new(Self::mount_tables(&config, store)?);

        Ok(Self {
            shutdown: ShutdownService::new(),
            config,
            storage,
            registry,
        })
    }

    /// Mount every configured table against the shared collaborators
    fn mount_tables(config: &AppConfig, store: Arc<dyn KeyValueStore>) -> Result<TableRegistry> {
        let correction: Option<Arc<dyn CorrectionService>> = if config.ai.enabled {
            let url = config
                .ai
                .url
                .as_deref()
                .context("ai.url is required when ai.enabled is true")?;
            let service =
                HttpCorrectionService::new(url, Duration::from_secs(config.ai.timeout_secs))
                    .context("Failed to build correction client")?;
            Some(Arc::new(service))
        } else {
            None
        };

        let mut registry = TableRegistry::new();
        for table in &config.tables {
            let rows = Self::row_source(table)?;
            let services = TableServices {
                store: store.clone(),
                correction: correction.clone(),
                rows,
                max_recent_queries: config.queries.max_recent,
            };
            let controller = TableController::mount(&table.id, table.columns.clone(), services)
                .with_context(|| format!("Failed to mount table '{}'", table.id))?;
            registry.insert(controller);
        }

        tracing::debug!(tables = registry.len(), "Tables mounted");
        Ok(registry)
    }

    fn row_source(table: &TableConfig) -> Result<Arc<dyn RowSource>> {
        match &table.rows {
            Some(path) => Ok(Arc::new(MemoryRowSource::from_file(&table.id, path)?)),
            None => Ok(Arc::new(MemoryRowSource::empty())),
        }
    }

    /// Parse a query against a configured table and print the result
    fn parse_command(cli: &CliConfig, table_id: &str, query: &str) -> Result<()> {
        let config = AppConfig::load(cli)?;
        let table = config
            .table(table_id)
            .with_context(|| format!("Table not configured: {}", table_id))?;
        let columns = ColumnSet::new(table.columns.clone())?;

        let result = parse_query(query, columns.columns());
        if !result.errors.is_empty() {
            for error in &result.errors {
                println!("error: {}", error);
            }
            anyhow::bail!("Query is invalid ({} error(s))", result.errors.len());
        }

        let Some(filter) = result.filter else {
            println!("Empty query, no filter");
            return Ok(());
        };

        println!("{}", serde_json::to_string_pretty(&filter)?);

        let mut params = SqlParams::default();
        let clause = filter.to_sql(&mut params);
        println!();
        println!("WHERE {}", clause);
        if !params.values.is_empty() {
            println!("params: {:?}", params.values);
        }
        Ok(())
    }

    fn handle_system_command(cmd: SystemCommands) -> Result<()> {
        match cmd {
            SystemCommands::Prune { yes } => Self::prune_data(yes),
        }
    }

    fn prune_data(skip_confirm: bool) -> Result<()> {
        let data_dir = AppStorage::resolve_data_dir();

        if !data_dir.exists() {
            println!(
                "Nothing to prune. Data directory does not exist: {}",
                data_dir.display()
            );
            return Ok(());
        }

        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);

        println!("This will permanently delete recent queries, saved filters and column layouts:");
        println!("  {}", data_dir.display());
        println!();
        println!("Make sure the server is not running, or it will write the state back on exit.");

        if !skip_confirm {
            print!("\nContinue? [y/N] ");
            std::io::Write::flush(&mut std::io::stdout())?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
                println!("Aborted.");
                return Ok(());
            }
        }

        std::fs::remove_dir_all(&data_dir)
            .with_context(|| format!("Failed to delete data directory: {}", data_dir.display()))?;
        println!("Pruned: {}", data_dir.display());
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        banner::print_banner(&app.config, &app.storage.data_dir().display().to_string());

        let server = ApiServer::new(app);
        server.start().await?;

        tracing::debug!("Server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{AiConfig, QueriesConfig, RewriteConfig, ServerConfig};
    use crate::data::persist::MemoryStore;
    use crate::domain::table::{ColumnDef, ColumnType};

    fn config(tables: Vec<TableConfig>) -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5480,
            },
            ai: AiConfig {
                enabled: false,
                url: None,
                timeout_secs: 30,
            },
            queries: QueriesConfig { max_recent: 10 },
            rewrite: RewriteConfig::default(),
            tables,
            ephemeral: true,
        }
    }

    fn orders(rows: Option<std::path::PathBuf>) -> TableConfig {
        TableConfig {
            id: "orders".to_string(),
            columns: vec![
                ColumnDef::new("id", ColumnType::Number),
                ColumnDef::new("status", ColumnType::String),
            ],
            rows,
        }
    }

    #[test]
    fn test_mount_tables_registers_each_table() {
        let mut customers = orders(None);
        customers.id = "customers".to_string();
        let config = config(vec![orders(None), customers]);

        let registry = CoreApp::mount_tables(&config, Arc::new(MemoryStore::new())).unwrap();
        assert_eq!(registry.ids(), vec!["customers", "orders"]);
        assert!(!registry.get("orders").unwrap().ai_enabled());
    }

    #[test]
    fn test_mount_tables_with_ai_enabled() {
        let mut config = config(vec![orders(None)]);
        config.ai = AiConfig {
            enabled: true,
            url: Some("http://127.0.0.1:9/correct".to_string()),
            timeout_secs: 5,
        };

        let registry = CoreApp::mount_tables(&config, Arc::new(MemoryStore::new())).unwrap();
        assert!(registry.get("orders").unwrap().ai_enabled());
    }

    #[test]
    fn test_mount_tables_fails_on_missing_rows_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(vec![orders(Some(dir.path().join("missing.json")))]);

        let err = CoreApp::mount_tables(&config, Arc::new(MemoryStore::new())).unwrap_err();
        assert!(err.to_string().contains("orders"));
    }

    #[tokio::test]
    async fn test_mount_tables_loads_rows_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.json");
        std::fs::write(&path, r#"[{"id": 1, "status": "open"}, {"id": 2, "status": "closed"}]"#)
            .unwrap();
        let config = config(vec![orders(Some(path))]);

        let registry = CoreApp::mount_tables(&config, Arc::new(MemoryStore::new())).unwrap();
        let table = registry.get("orders").unwrap();
        table.set_query("status = open");
        assert!(table.submit());
        let rows = table.fetch_rows(0, 10).await.unwrap();
        assert_eq!(rows.total, 1);
    }
}
