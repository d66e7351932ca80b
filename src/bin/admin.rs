//! CLI administration tool for qr-redirect.
//!
//! Issues, inspects and deactivates codes directly against PostgreSQL,
//! without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Issue the QR code of chapter 42 with one video sub-code
//! cargo run --bin admin -- code issue-chapter 42 --sub https://videos.example.com/intro
//!
//! # Shorten a URL
//! cargo run --bin admin -- code shorten https://example.com/article --custom my-link
//!
//! # Inspect and deactivate codes
//! cargo run --bin admin -- code show chapter aB3xQ9kPzR
//! cargo run --bin admin -- code children aB3xQ9kPzR
//! cargo run --bin admin -- code deactivate chapter aB3xQ9kPzR
//!
//! # Run the chapter deletion hook
//! cargo run --bin admin -- chapter delete 42
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! Same as the server; `DATABASE_URL` (or the `DB_*` components) is required.
//! `PUBLIC_BASE_URL` controls the printed QR payloads.

use qr_redirect::application::services::{CodeService, CodeTree};
use qr_redirect::config::{self, Config};
use qr_redirect::domain::entities::{Code, Namespace, ResourceRef};
use qr_redirect::domain::repositories::CodeRepository;
use qr_redirect::infrastructure::persistence::PgCodeRepository;
use qr_redirect::server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for managing qr-redirect codes.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Issue, inspect and deactivate codes
    Code {
        #[command(subcommand)]
        action: CodeAction,
    },

    /// Chapter lifecycle hooks
    Chapter {
        #[command(subcommand)]
        action: ChapterAction,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum CodeAction {
    /// Issue the primary QR code of a chapter and its sub-codes
    IssueChapter {
        chapter_id: i64,

        /// Custom primary code (generated if omitted)
        #[arg(short, long)]
        custom: Option<String>,

        /// External URL of a sub-code (repeatable)
        #[arg(long = "sub")]
        sub_urls: Vec<String>,

        /// Internal resource id of a sub-code (repeatable)
        #[arg(long = "sub-resource")]
        sub_resources: Vec<i64>,
    },

    /// Shorten an external URL
    Shorten {
        url: String,

        /// Custom code (generated if omitted)
        #[arg(short, long)]
        custom: Option<String>,
    },

    /// Show a live code
    Show { namespace: Namespace, code: String },

    /// List the sub-codes of a chapter code
    Children { code: String },

    /// Deactivate a code and its sub-codes
    Deactivate {
        namespace: Namespace,
        code: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ChapterAction {
    /// Deactivate every code of a deleted chapter
    Delete {
        chapter_id: i64,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info and code counts
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = config::load_from_env().context("Invalid configuration")?;
    let pool = server::connect_pool(&config).await?;

    match cli.command {
        Commands::Code { action } => handle_code_action(action, &config, &pool).await?,
        Commands::Chapter { action } => handle_chapter_action(action, &config, &pool).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    pool.close().await;
    Ok(())
}

fn code_service(config: &Config, pool: &PgPool) -> Arc<CodeService<dyn CodeRepository>> {
    let repository = Arc::new(PgCodeRepository::new(
        Arc::new(pool.clone()),
        config.reuse_policy,
    ));
    server::build_state(config, repository).code_service
}

/// Dispatches code commands.
async fn handle_code_action(action: CodeAction, config: &Config, pool: &PgPool) -> Result<()> {
    let service = code_service(config, pool);

    match action {
        CodeAction::IssueChapter {
            chapter_id,
            custom,
            sub_urls,
            sub_resources,
        } => {
            let targets = sub_urls
                .into_iter()
                .map(ResourceRef::external)
                .chain(sub_resources.into_iter().map(ResourceRef::internal))
                .collect();

            let tree = service
                .issue_chapter_codes(chapter_id, custom, targets)
                .await
                .context("Failed to issue chapter codes")?;

            println!("{}", "✅ Chapter codes issued".green().bold());
            println!();
            print_tree(&service, &tree);
        }
        CodeAction::Shorten { url, custom } => {
            let code = service
                .shorten_url(&url, custom)
                .await
                .context("Failed to shorten URL")?;

            println!("{}", "✅ Short link created".green().bold());
            println!();
            print_code(&service, &code, "  ");
        }
        CodeAction::Show { namespace, code } => {
            let code = service.get_code(namespace, &code).await?;
            print_code(&service, &code, "  ");
        }
        CodeAction::Children { code } => {
            let tree = service.list_children(&code).await?;
            print_tree(&service, &tree);
        }
        CodeAction::Deactivate {
            namespace,
            code,
            yes,
        } => {
            let live = service.get_code(namespace, &code).await?;
            print_code(&service, &live, "  ");
            println!();

            if !yes && !confirm("Deactivate this code and all of its sub-codes?")? {
                println!("{}", "❌ Cancelled".red());
                return Ok(());
            }

            let affected = service.deactivate(namespace, &code).await?;
            println!(
                "{} {}",
                "✅ Deactivated codes:".green().bold(),
                affected.to_string().bright_white().bold()
            );
        }
    }

    Ok(())
}

/// Dispatches chapter lifecycle commands.
async fn handle_chapter_action(
    action: ChapterAction,
    config: &Config,
    pool: &PgPool,
) -> Result<()> {
    let service = code_service(config, pool);

    match action {
        ChapterAction::Delete { chapter_id, yes } => {
            let trees = service.list_chapter_codes(chapter_id).await?;
            if trees.is_empty() {
                println!("{}", "  No live codes for this chapter".yellow());
                return Ok(());
            }

            for tree in &trees {
                print_tree(&service, tree);
            }
            println!();

            if !yes && !confirm("Deactivate all codes of this chapter?")? {
                println!("{}", "❌ Cancelled".red());
                return Ok(());
            }

            let affected = service.deactivate_chapter(chapter_id).await?;
            println!(
                "{} {}",
                "✅ Deactivated codes:".green().bold(),
                affected.to_string().bright_white().bold()
            );
        }
    }

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;
            println!("  PostgreSQL: {}", version.bright_white());
            println!();

            let counts: Vec<(String, i64, i64)> = sqlx::query_as(
                r#"
                SELECT namespace,
                       COUNT(*) FILTER (WHERE deactivated_at IS NULL),
                       COUNT(*) FILTER (WHERE deactivated_at IS NOT NULL)
                FROM codes
                GROUP BY namespace
                ORDER BY namespace
                "#,
            )
            .fetch_all(pool)
            .await?;

            println!(
                "  {:<10} {:>10} {:>12}",
                "Namespace".bright_white().bold(),
                "Live".bright_white().bold(),
                "Deactivated".bright_white().bold()
            );
            for (namespace, live, deactivated) in counts {
                println!(
                    "  {:<10} {:>10} {:>12}",
                    namespace.cyan(),
                    live.to_string().bright_green(),
                    deactivated.to_string().bright_black()
                );
            }
            println!();
        }
    }

    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

fn print_code(service: &CodeService<dyn CodeRepository>, code: &Code, indent: &str) {
    let target = match &code.target {
        ResourceRef::Internal { resource_id } => format!("resource #{resource_id}"),
        ResourceRef::External { url } => url.clone(),
    };

    println!(
        "{indent}{} {} {}",
        code.value.bright_yellow().bold(),
        format!("[{} {}]", code.namespace, code.kind.as_str()).bright_black(),
        target.cyan()
    );
    println!("{indent}  {}", service.public_url(code).bright_white());
}

fn print_tree(service: &CodeService<dyn CodeRepository>, tree: &CodeTree) {
    print_code(service, &tree.primary, "  ");
    if tree.children.is_empty() {
        println!("    {}", "no sub-codes".bright_black());
    }
    for child in &tree.children {
        print_code(service, child, "    ");
    }
}
