//! dbforge CLI - schema migrations, introspection and procedure generation.

use clap::{Parser, Subcommand};
use dbforge::dbgen::DbGen;
use dbforge::schema::LegacySchema;
use dbforge::{Config, Db, DbError, Migrator, Params, Registry, SchemaDefinition};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

/// Conventional exit status after Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "dbforge")]
#[command(about = "Multi-dialect schema migrations and introspection")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "dbforge.yaml")]
    config: PathBuf,

    /// Named connection to use
    #[arg(long, default_value = "default")]
    connection: String,

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
    /// Create the tables of a schema file that do not exist yet
    Migrate {
        /// Schema file (YAML, or line-oriented with --legacy)
        schema: PathBuf,

        /// Read the line-oriented schema format
        #[arg(long)]
        legacy: bool,

        /// Print the DDL instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// List the tables of the connection's schema
    Tables,

    /// Show columns and constraints of a table
    Describe {
        /// Table name, optionally schema-qualified
        table: String,
    },

    /// Generate CRUD stored procedures (MySQL and PostgreSQL)
    Procedures {
        /// Tables to generate for (default: all tables)
        tables: Vec<String>,

        /// Install the procedures instead of printing them
        #[arg(long)]
        apply: bool,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    tokio::select! {
        result = run() => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", e.format_detailed());
                ExitCode::from(e.exit_code())
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

async fn run() -> Result<(), DbError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(DbError::Config)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);
    let registry = Registry::from_config(&config)?;

    match cli.command {
        Commands::Migrate {
            ref schema,
            legacy,
            dry_run,
        } => {
            let mut db = Db::from_registry(&registry, &cli.connection)?;
            if dry_run {
                print_migration_ddl(&db, schema, legacy)?;
                return Ok(());
            }

            let report = if legacy {
                let schema = LegacySchema::load(schema)?;
                Migrator::new(&mut db).apply_legacy(&schema).await?
            } else {
                let schema = SchemaDefinition::load(schema)?;
                Migrator::new(&mut db).apply(&schema).await?
            };

            println!("\nMigration completed!");
            println!("  Created: {}", join_or_none(&report.created));
            println!("  Skipped: {}", join_or_none(&report.skipped));
            println!("  Seed rows: {}", report.seeded_rows);
        }

        Commands::Tables => {
            let mut db = Db::from_registry(&registry, &cli.connection)?;
            let tables = db.get_tables().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                for table in tables {
                    println!("{}", table);
                }
            }
        }

        Commands::Describe { ref table } => {
            let mut db = Db::from_registry(&registry, &cli.connection)?;
            let described = db.describe_table(table).await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&described)?);
            } else {
                println!("{}", described.name);
                for column in &described.columns {
                    println!(
                        "  {} {:?}{}{}{}",
                        column.name,
                        column.data_type_or_default(),
                        if column.is_nullable { " null" } else { "" },
                        if column.is_primary_key { " pk" } else { "" },
                        if column.is_auto_increment { " identity" } else { "" },
                    );
                }
                for constraint in &described.constraints {
                    println!(
                        "  {} {} ({})",
                        constraint.constraint_type(),
                        constraint.name,
                        constraint.columns.join(", ")
                    );
                }
            }
        }

        Commands::Procedures { ref tables, apply } => {
            let mut db = Db::from_registry(&registry, &cli.connection)?;
            let mut generator = DbGen::new(&mut db)?;
            if apply {
                let installed = generator.generate_procedures(tables).await?;
                println!("Installed {} procedure(s)", installed.len());
            } else {
                for procedure in generator.render(tables).await? {
                    println!("-- {}\n{}\n", procedure.name, procedure.sql);
                }
            }
        }

        Commands::HealthCheck => {
            let mut healthy = true;
            println!("Health Check Results:");
            for name in registry.connection_names() {
                let mut db = Db::from_registry(&registry, &name)?;
                let start = Instant::now();
                let outcome = db.scalar("SELECT 1", &Params::new()).await;
                let latency = start.elapsed().as_millis();
                match outcome {
                    Ok(_) => println!("  {} ({}): OK ({}ms)", name, db.driver(), latency),
                    Err(e) => {
                        healthy = false;
                        println!("  {} ({}): FAILED ({}ms)", name, db.driver(), latency);
                        println!("    Error: {}", e);
                    }
                }
            }
            println!(
                "\n  Overall: {}",
                if healthy { "HEALTHY" } else { "UNHEALTHY" }
            );

            if !healthy {
                return Err(DbError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

/// Render the DDL a migration would run, without connecting.
fn print_migration_ddl(db: &Db, path: &Path, legacy: bool) -> Result<(), DbError> {
    if legacy {
        for table in LegacySchema::load(path)?.tables() {
            println!("{};\n", table.go()?);
        }
        return Ok(());
    }

    let schema = SchemaDefinition::load(path)?;
    for table in schema.tables() {
        println!("{};", table.create_sql(db.dialect())?);
        for index in table.index_sql(db.dialect())? {
            println!("{};", index);
        }
        println!();
    }
    Ok(())
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| e.to_string())
}
