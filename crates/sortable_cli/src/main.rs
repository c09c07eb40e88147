//! Command-line front end for sortable entries.
//!
//! # Responsibility
//! - Expose admin routes and entry lifecycle operations over one SQLite file.
//! - Print JSON to stdout so output can be piped into other tools.
//!
//! # Invariants
//! - Flags override `SORTABLE_*` environment settings.
//! - Any non-success admin response exits with status 1.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use sortable_core::{
    init_logging, move_item, open_db, reorder_subset, AdminController, ApiRequest, ApiResponse,
    EntryService, NewEntry, SortableConfig, SqliteEntryRepository,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sortable")]
#[command(about = "Manual ordering for collection entries", long_about = None)]
struct Cli {
    /// SQLite database file (overrides SORTABLE_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files (overrides SORTABLE_LOG_DIR)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// trace | debug | info | warn | error (overrides SORTABLE_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List entries of a content type in sort order
    FetchEntries {
        /// Content type uid, e.g. api::product.product
        uid: String,

        /// Attribute returned next to each documentId
        #[arg(long)]
        main_field: String,

        /// Sort-order attribute (defaults to the configured one)
        #[arg(long)]
        sort_order_field: Option<String>,

        /// JSON filter object, e.g. '{"category":"shoes"}'
        #[arg(long)]
        filters: Option<String>,

        #[arg(long)]
        locale: Option<String>,
    },

    /// Persist a new order for a content type
    UpdateSortOrder {
        uid: String,

        /// Document ids in the requested order
        #[arg(long = "ids", value_delimiter = ',', required = true)]
        sorted_document_ids: Vec<String>,

        #[arg(long)]
        sort_order_field: Option<String>,

        /// JSON filter object active while the order was edited
        #[arg(long)]
        filters: Option<String>,

        #[arg(long)]
        locale: Option<String>,
    },

    /// Create an entry, assigning the next sort index
    CreateEntry {
        uid: String,

        /// JSON object with the entry attributes
        #[arg(long, default_value = "{}")]
        data: String,

        #[arg(long)]
        document_id: Option<String>,

        #[arg(long)]
        locale: Option<String>,

        /// Store the entry without a sort index
        #[arg(long, default_value_t = false)]
        unsorted: bool,
    },

    /// Delete an entry without touching other sort indices
    DeleteEntry {
        uid: String,

        #[arg(long)]
        document_id: String,

        #[arg(long)]
        locale: Option<String>,
    },

    /// Reorder a subset inside a full order without touching the database
    ReorderSubset {
        /// Full order, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        full: Vec<String>,

        /// New order of a subset, comma separated
        #[arg(long, value_delimiter = ',')]
        subset: Vec<String>,

        /// Move one item first: `<from>:<to>` positions inside the subset
        #[arg(long = "move")]
        move_item: Option<String>,
    },

    /// Check core wiring
    Ping,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if let Some(log_dir) = &config.log_dir {
        let log_dir = log_dir
            .to_str()
            .context("log directory is not valid UTF-8")?;
        init_logging(config.log_level, log_dir).context("failed to initialize logging")?;
    }

    match cli.cmd {
        Commands::Ping => {
            print_json(&json!({
                "ping": sortable_core::ping(),
                "version": sortable_core::core_version(),
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ReorderSubset {
            full,
            subset,
            move_item: moved,
        } => {
            let subset = match moved.as_deref() {
                Some(spec) => {
                    let (from, to) = parse_move(spec)?;
                    move_item(&subset, from, to)
                }
                None => subset,
            };
            let reordered = reorder_subset(&full, &subset)?;
            print_json(&json!(reordered))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::FetchEntries {
            uid,
            main_field,
            sort_order_field,
            filters,
            locale,
        } => {
            let conn = open_db(&config.db_path)
                .with_context(|| format!("failed to open {}", config.db_path.display()))?;
            let controller = AdminController::new(SqliteEntryRepository::try_new(&conn)?);

            let mut request = ApiRequest::get(format!("/fetch-entries/{uid}"))
                .with_query("mainField", main_field)
                .with_query(
                    "sortOrderField",
                    sort_order_field.unwrap_or(config.sort_order_field),
                );
            if let Some(filters) = filters {
                request = request.with_query("filters", filters);
            }
            if let Some(locale) = locale {
                request = request.with_query("locale", locale);
            }
            respond(controller.dispatch(&request))
        }
        Commands::UpdateSortOrder {
            uid,
            sorted_document_ids,
            sort_order_field,
            filters,
            locale,
        } => {
            let conn = open_db(&config.db_path)
                .with_context(|| format!("failed to open {}", config.db_path.display()))?;
            let controller = AdminController::new(SqliteEntryRepository::try_new(&conn)?);

            let filters = filters
                .map(|raw| serde_json::from_str::<Value>(&raw))
                .transpose()
                .context("--filters is not valid JSON")?;
            let body = json!({
                "data": {
                    "sortOrderField": sort_order_field.unwrap_or(config.sort_order_field),
                    "sortedDocumentIds": sorted_document_ids,
                    "filters": filters,
                    "locale": locale,
                }
            });
            let request = ApiRequest::post(format!("/update-sort-order/{uid}"), body.to_string());
            respond(controller.dispatch(&request))
        }
        Commands::CreateEntry {
            uid,
            data,
            document_id,
            locale,
            unsorted,
        } => {
            let mut data: Map<String, Value> =
                serde_json::from_str(&data).context("--data must be a JSON object")?;
            if !unsorted {
                data.entry(config.sort_order_field.clone())
                    .or_insert(Value::Null);
            }

            let mut entry = NewEntry::new(uid, data);
            if let Some(locale) = locale {
                entry = entry.with_locale(locale);
            }
            if let Some(document_id) = document_id {
                entry = entry.with_document_id(document_id);
            }

            let conn = open_db(&config.db_path)
                .with_context(|| format!("failed to open {}", config.db_path.display()))?;
            let service = EntryService::new(
                SqliteEntryRepository::try_new(&conn)?,
                config.sort_order_field,
            );
            let created = service.create_entry(entry)?;
            print_json(&serde_json::to_value(created)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::DeleteEntry {
            uid,
            document_id,
            locale,
        } => {
            let conn = open_db(&config.db_path)
                .with_context(|| format!("failed to open {}", config.db_path.display()))?;
            let service = EntryService::new(
                SqliteEntryRepository::try_new(&conn)?,
                config.sort_order_field,
            );
            service.delete_entry(&uid, locale.as_deref(), &document_id)?;
            print_json(&json!({ "deleted": document_id }))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(cli: &Cli) -> Result<SortableConfig> {
    let mut config = SortableConfig::from_env()?;
    if let Some(level) = &cli.log_level {
        config.set_log_level(level)?;
    }
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(log_dir) = &cli.log_dir {
        config.log_dir = Some(log_dir.clone());
    }
    Ok(config)
}

fn parse_move(spec: &str) -> Result<(usize, usize)> {
    let Some((from, to)) = spec.split_once(':') else {
        bail!("--move expects `<from>:<to>`, got `{spec}`");
    };
    let from = from.trim().parse().context("invalid --move source")?;
    let to = to.trim().parse().context("invalid --move target")?;
    Ok((from, to))
}

fn respond(response: ApiResponse) -> Result<ExitCode> {
    if let Some(body) = &response.body {
        print_json(body)?;
    }
    if response.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        log::warn!(
            "event=cli_request module=cli status=error http_status={}",
            response.status
        );
        Ok(ExitCode::FAILURE)
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
