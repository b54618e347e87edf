//! live-migrate CLI - online MySQL schema changes.

use clap::{Parser, Subcommand};
use live_migrate::{
    Column, Config, Entangler, MigrateError, Migration, Migrator, Orchestrator, Table,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "live-migrate")]
#[command(about = "Online MySQL schema changes without blocking writes")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a table to a new schema
    Run {
        /// Table to migrate
        #[arg(long)]
        table: String,

        /// Add a column, as NAME:DEFINITION
        #[arg(long, value_name = "NAME:DEF")]
        add_column: Vec<String>,

        /// Change a column definition, as NAME:DEFINITION
        #[arg(long, value_name = "NAME:DEF")]
        change_column: Vec<String>,

        /// Remove a column
        #[arg(long, value_name = "NAME")]
        remove_column: Vec<String>,

        /// Add an index on comma-separated columns
        #[arg(long, value_name = "COLS")]
        add_index: Vec<String>,

        /// Add a unique index on comma-separated columns
        #[arg(long, value_name = "COLS")]
        add_unique_index: Vec<String>,

        /// Remove the index on comma-separated columns
        #[arg(long, value_name = "COLS")]
        remove_index: Vec<String>,

        /// Raw DDL for the shadow table; %s is replaced by its name
        #[arg(long, value_name = "SQL")]
        ddl: Vec<String>,

        /// Override primary key values copied per chunk
        #[arg(long)]
        stride: Option<u64>,

        /// Print the shadow table statements without connecting
        #[arg(long)]
        dry_run: bool,
    },

    /// Find triggers and tables left by earlier runs
    Cleanup {
        /// Drop them instead of only listing them
        #[arg(long)]
        run: bool,
    },

    /// Print trigger DDL for a table without connecting
    PrintDdl {
        /// Origin table
        #[arg(long)]
        table: String,

        /// Comma-separated columns shared with the destination
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Destination table [default: lhmn_<table>]
        #[arg(long)]
        destination: Option<String>,

        /// Primary key column
        #[arg(long, default_value = "id")]
        primary_key: String,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    // Commands that never touch the database run without a config file.
    match &cli.command {
        Commands::PrintDdl {
            table,
            columns,
            destination,
            primary_key,
        } => {
            let statements = trigger_ddl(table, columns, destination.as_deref(), primary_key)?;
            print_statements(&statements, cli.output_json)?;
            return Ok(());
        }
        Commands::Run { dry_run: true, .. } => {
            let migrator = build_migrator(&cli.command)?;
            print_statements(&migrator.statements()?, cli.output_json)?;
            return Ok(());
        }
        _ => {}
    }

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let cancel_token = setup_signal_handler();

    match cli.command {
        Commands::PrintDdl { .. } => unreachable!(), // Handled above
        Commands::Run { stride, .. } => {
            if let Some(stride) = stride {
                if stride == 0 {
                    return Err(MigrateError::Config("--stride must be at least 1".into()));
                }
                config.migration.stride = stride;
            }
            let migrator = build_migrator(&cli.command)?;

            let mut orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.run(&migrator, &cancel_token).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("\nMigration completed!");
                println!("  Table: {}", result.origin);
                println!("  Archived as: {}", result.archive);
                println!("  Columns copied: {}", result.shared_columns.join(", "));
                println!("  Chunks: {}", result.chunks);
                println!("  Duration: {:.2}s", result.duration_seconds);
            }
        }

        Commands::Cleanup { run } => {
            let mut orchestrator = Orchestrator::new(config).await?;
            let statements = orchestrator.cleanup(run).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&statements)?);
            } else if statements.is_empty() {
                println!("Nothing to clean up");
            } else {
                let verb = if run { "Executed" } else { "Would execute" };
                println!("{}:", verb);
                for sql in &statements {
                    println!("  {};", sql);
                }
            }
        }

        Commands::HealthCheck => {
            let mut orchestrator = Orchestrator::new(config).await?;
            orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::json!({ "healthy": true }));
            } else {
                println!("Health Check: HEALTHY");
            }
        }
    }

    Ok(())
}

/// Build the migrator for a `run` command.
fn build_migrator(command: &Commands) -> Result<Migrator, MigrateError> {
    let Commands::Run {
        table,
        add_column,
        change_column,
        remove_column,
        add_index,
        add_unique_index,
        remove_index,
        ddl,
        ..
    } = command
    else {
        return Err(MigrateError::Config("not a run command".into()));
    };

    let mut migrator = Migrator::new(table.as_str())?;
    for spec in add_column {
        let (name, definition) = split_column(spec)?;
        migrator = migrator.add_column(name, definition);
    }
    for spec in change_column {
        let (name, definition) = split_column(spec)?;
        migrator = migrator.change_column(name, definition);
    }
    for name in remove_column {
        migrator = migrator.remove_column(name.as_str());
    }
    for cols in add_index {
        migrator = migrator.add_index(split_list(cols));
    }
    for cols in add_unique_index {
        migrator = migrator.add_unique_index(split_list(cols));
    }
    for cols in remove_index {
        migrator = migrator.remove_index(split_list(cols));
    }
    for statement in ddl {
        migrator = migrator.ddl(statement.as_str());
    }
    Ok(migrator)
}

/// Split `NAME:DEFINITION`.
fn split_column(spec: &str) -> Result<(&str, &str), MigrateError> {
    match spec.split_once(':') {
        Some((name, definition)) if !name.trim().is_empty() && !definition.trim().is_empty() => {
            Ok((name.trim(), definition.trim()))
        }
        _ => Err(MigrateError::Config(format!(
            "expected NAME:DEFINITION, got {:?}",
            spec
        ))),
    }
}

fn split_list(cols: &str) -> Vec<String> {
    cols.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Entangle followed by untangle statements for a table pair.
fn trigger_ddl(
    table: &str,
    columns: &[String],
    destination: Option<&str>,
    primary_key: &str,
) -> Result<Vec<String>, MigrateError> {
    let destination = match destination {
        Some(name) => name.to_string(),
        None => Migrator::new(table)?.destination().to_string(),
    };

    let mut origin = Table::new(table)?.with_primary_key(primary_key);
    let mut dest = Table::new(destination)?.with_primary_key(primary_key);
    for column in columns.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        origin = origin.with_column(column, Column::new(""));
        dest = dest.with_column(column, Column::new(""));
    }

    let migration = Migration::new(origin, dest);
    let entangler = Entangler::new(&migration);
    let mut statements = entangler.entangle()?;
    statements.extend(entangler.untangle()?);
    Ok(statements)
}

fn print_statements(statements: &[String], json: bool) -> Result<(), MigrateError> {
    if json {
        println!("{}", serde_json::to_string_pretty(statements)?);
    } else {
        for sql in statements {
            println!("{};", sql);
        }
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays parseable with --output-json.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
/// A running migration stops between chunks and removes its triggers.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, label) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Stopping after the current chunk...", label);
                    token.cancel();
                }
                Err(e) => eprintln!("Failed to set up {} handler: {}", label, e),
            }
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current chunk...");
            token.cancel();
        }
    });

    cancel_token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_column() {
        assert_eq!(
            split_column("email:varchar(255) not null").unwrap(),
            ("email", "varchar(255) not null")
        );
        assert_eq!(
            split_column("price:decimal(10,2)").unwrap(),
            ("price", "decimal(10,2)")
        );
        assert!(split_column("email").is_err());
        assert!(split_column(":int").is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_trigger_ddl_defaults_destination() {
        let statements =
            trigger_ddl("users", &["id".into(), "name".into()], None, "id").unwrap();
        assert_eq!(statements.len(), 6);
        assert!(statements[0].starts_with("create trigger `lhmt_ins_users`"));
        assert!(statements[0].contains("replace into `lhmn_users` (`id`, `name`)"));
        assert!(statements[3].starts_with("drop trigger if exists"));
    }
}
