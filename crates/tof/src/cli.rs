//! Command-line administration.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use crate::backend::PgBackend;
use crate::class::ModelRegistry;
use crate::config::Config;
use crate::db;
use crate::models::ContentType;
use crate::state::Tof;

/// Translatable object fields administration.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or upgrade tof's tables.
    Migrate,
    /// Check the database and activate every persisted translatable field.
    Check,
    /// Manage languages.
    #[command(subcommand)]
    Language(LanguageCommand),
    /// Manage translatable fields.
    #[command(subcommand)]
    Field(FieldCommand),
}

#[derive(Subcommand, Debug)]
pub enum LanguageCommand {
    /// Add a language.
    Add { iso: String },
    /// List languages.
    List,
    /// Remove a language and every translation stored in it.
    Remove {
        iso: String,
        /// Confirm deletion of the language's translations.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum FieldCommand {
    /// Mark a field translatable.
    Add(FieldArgs),
    /// Unmark a field and delete its translations.
    Remove(FieldArgs),
    /// List translatable fields.
    List,
}

#[derive(Args, Debug)]
pub struct FieldArgs {
    /// Model type as `app_label.model`.
    pub model: String,
    /// Field name.
    pub name: String,
    /// Human-readable field name.
    #[arg(long, default_value = "")]
    pub title: String,
}

impl FieldArgs {
    fn content_type(&self) -> Result<ContentType> {
        self.model
            .parse()
            .with_context(|| format!("invalid model '{}'", self.model))
    }
}

/// Connect, load model definitions and build a handle.
async fn connect(config: &Config) -> Result<(Tof, sqlx::PgPool)> {
    let pool = db::create_pool(config).await?;

    let registry = ModelRegistry::new();
    if config.models_path.exists() {
        registry
            .load_file(&config.models_path)
            .context("failed to load model definitions")?;
    } else {
        warn!(path = %config.models_path.display(), "model definition file not found");
    }

    let backend = Arc::new(PgBackend::new(pool.clone()));
    Ok((Tof::new(backend, registry, config.settings.clone()), pool))
}

/// Run one command.
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Command::Migrate => {
            let pool = db::create_pool(&config).await?;
            db::run_migrations(&pool).await?;
            info!("migrations applied");
        }
        Command::Check => {
            let (tof, pool) = connect(&config).await?;
            if !db::check_health(&pool).await {
                bail!("database is not reachable");
            }
            let args: Vec<String> = std::env::args().collect();
            let report = tof.ready(&args).await?;
            if let Some(reason) = &report.skipped {
                println!("skipped: {reason:?}");
            }
            for id in &report.activated {
                println!("active      {id}");
            }
            for id in &report.unregistered {
                println!("unregistered {id}");
            }
            for id in &report.rejected {
                println!("rejected    {id}");
            }
        }
        Command::Language(command) => {
            let (tof, _) = connect(&config).await?;
            match command {
                LanguageCommand::Add { iso } => {
                    let language = tof.add_language(&iso).await?;
                    println!("{language}");
                }
                LanguageCommand::List => {
                    for language in tof.languages().await? {
                        let state = if language.is_active { "" } else { " (inactive)" };
                        println!("{language}{state}");
                    }
                }
                LanguageCommand::Remove { iso, yes } => {
                    if !yes {
                        bail!("removing '{iso}' deletes all of its translations; pass --yes");
                    }
                    if !tof.remove_language(&iso).await? {
                        bail!("language '{iso}' does not exist");
                    }
                }
            }
        }
        Command::Field(command) => {
            let (tof, _) = connect(&config).await?;
            tof.ready(&[] as &[&str]).await?;
            match command {
                FieldCommand::Add(args) => {
                    let field = tof
                        .add_translatable_field(&args.content_type()?, &args.name, &args.title)
                        .await?;
                    println!("{} ({field})", field.id);
                }
                FieldCommand::Remove(args) => {
                    if !tof
                        .remove_translatable_field(&args.content_type()?, &args.name)
                        .await?
                    {
                        bail!("{}.{} is not translatable", args.model, args.name);
                    }
                }
                FieldCommand::List => {
                    for field in tof.translatable_fields().await? {
                        println!("{}\t{}", field.id, field.title);
                    }
                }
            }
        }
    }
    Ok(())
}
