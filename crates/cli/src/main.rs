use anchormark_engine::{Direction, Document, EngineError, ReconcileOutcome, ToggleOutcome};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

mod scan;
mod watch;
mod workspace;

use workspace::Workspace;

#[derive(Parser)]
#[command(name = "anchormark")]
#[command(about = "Line bookmarks that stay attached to your code", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root; file arguments are relative to it
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Engine config file (default: <root>/anchormark.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add or remove the bookmark on a line
    Toggle(LineArgs),

    /// Bookmark a line without writing marker text
    Mark(LineArgs),

    /// Reconcile stored bookmarks with the current contents of files
    Sync(SyncArgs),

    /// Reconcile every file that carries markers or bookmarks
    Scan,

    /// List all bookmarks
    List(ListArgs),

    /// Print the next bookmarked line after LINE, wrapping at the end
    Next(LineArgs),

    /// Print the previous bookmarked line before LINE, wrapping at the start
    Prev(LineArgs),

    /// Remove every bookmark and marker comment from a file
    Clear(FileArgs),

    /// Forget every bookmark in the workspace
    #[command(name = "clear-all")]
    ClearAll,

    /// Watch the workspace and reconcile files as they change
    Watch,
}

#[derive(Args)]
struct LineArgs {
    /// File path, relative to the workspace root
    file: PathBuf,

    /// Line number (1-based)
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    line: u64,
}

impl LineArgs {
    fn zero_based_line(&self) -> usize {
        usize::try_from(self.line - 1).unwrap_or(usize::MAX)
    }
}

#[derive(Args)]
struct FileArgs {
    /// File path, relative to the workspace root
    file: PathBuf,
}

#[derive(Args)]
struct SyncArgs {
    /// Files to reconcile
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Print one JSON summary per file
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Missing-context errors become a logged no-op
fn or_skip<T>(result: anchormark_engine::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(EngineError::InvalidLine { line, line_count }) => {
            warn!(
                "Line {} is past the end of the file ({line_count} lines); nothing to do",
                line + 1
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON consumers
    let json_output = match &cli.command {
        Commands::List(args) => args.json,
        Commands::Sync(args) => args.json,
        _ => false,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let workspace = Workspace::open(&cli.root, cli.config.as_deref()).await?;
    let result = run(&workspace, cli.command).await;
    workspace.close().await?;
    result
}

async fn run(workspace: &Workspace, command: Commands) -> Result<()> {
    match command {
        Commands::Toggle(args) => toggle(workspace, args).await,
        Commands::Mark(args) => mark(workspace, args).await,
        Commands::Sync(args) => sync(workspace, args).await,
        Commands::Scan => scan(workspace).await,
        Commands::List(args) => list(workspace, args).await,
        Commands::Next(args) => navigate(workspace, args, Direction::Next).await,
        Commands::Prev(args) => navigate(workspace, args, Direction::Previous).await,
        Commands::Clear(args) => clear(workspace, args).await,
        Commands::ClearAll => {
            workspace.session().clear_all().await?;
            println!("cleared all bookmarks");
            Ok(())
        }
        Commands::Watch => watch::run(workspace).await,
    }
}

async fn toggle(workspace: &Workspace, args: LineArgs) -> Result<()> {
    let mut doc = workspace.load(&args.file).await?;
    let line = args.zero_based_line();
    let Some(outcome) = or_skip(workspace.session().toggle(&mut doc, line).await)? else {
        return Ok(());
    };
    workspace.save(&doc).await?;
    let path = doc.file_path().to_string();
    workspace.reconcile(doc).await?;

    match outcome {
        ToggleOutcome::Added { marker, line } => {
            println!("added {marker} at {path}:{}", line + 1);
        }
        ToggleOutcome::Removed { markers, line } => {
            println!("removed {} from {path}:{}", markers.join(" "), line + 1);
        }
    }
    Ok(())
}

async fn mark(workspace: &Workspace, args: LineArgs) -> Result<()> {
    let doc = workspace.load(&args.file).await?;
    let line = args.zero_based_line();
    let Some(placed) = or_skip(workspace.session().place_explicit(&doc, line).await)? else {
        return Ok(());
    };
    match placed {
        Some(record) => println!(
            "marked {}:{} as {}",
            record.file_path,
            record.line_number + 1,
            record.marker
        ),
        None => println!("{}:{} already has a bookmark", doc.file_path(), line + 1),
    }
    Ok(())
}

async fn sync(workspace: &Workspace, args: SyncArgs) -> Result<()> {
    for file in &args.files {
        let doc = workspace.load(file).await?;
        let update = match workspace.reconcile(doc).await? {
            ReconcileOutcome::Completed(update) => update,
            ReconcileOutcome::Coalesced => continue,
        };
        if args.json {
            println!("{}", serde_json::to_string(&update)?);
        } else {
            println!(
                "{}: {} bookmarks (+{} -{} ~{})",
                update.file_path, update.bookmarks, update.added, update.removed, update.moved
            );
        }
    }
    Ok(())
}

async fn scan(workspace: &Workspace) -> Result<()> {
    let root = workspace.root().to_path_buf();
    let marked = tokio::task::spawn_blocking(move || scan::marked_files(&root))
        .await
        .context("Workspace scan failed")?;

    let mut files: BTreeSet<String> = marked.into_iter().collect();
    files.extend(
        workspace
            .session()
            .list()
            .await
            .into_iter()
            .map(|record| record.file_path),
    );

    let mut bookmarks = 0;
    for file in &files {
        let doc = match workspace.load(Path::new(file)).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("{e:#}");
                continue;
            }
        };
        if let ReconcileOutcome::Completed(update) = workspace.reconcile(doc).await? {
            bookmarks += update.bookmarks;
        }
    }
    info!("Scan finished");
    println!("reconciled {} files, {bookmarks} bookmarks", files.len());
    Ok(())
}

async fn list(workspace: &Workspace, args: ListArgs) -> Result<()> {
    let records = workspace.session().list().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("no bookmarks");
        return Ok(());
    }
    for record in records {
        println!(
            "{}:{}\t{}\t{}",
            record.file_path,
            record.line_number + 1,
            record.marker,
            record.cached_label.unwrap_or_default()
        );
    }
    Ok(())
}

async fn navigate(workspace: &Workspace, args: LineArgs, direction: Direction) -> Result<()> {
    let doc = workspace.load(&args.file).await?;
    let from = args.zero_based_line();
    match workspace.session().navigate(&doc, from, direction).await? {
        Some(line) => println!("{}", line + 1),
        None => info!("No other bookmark in {}", doc.file_path()),
    }
    Ok(())
}

async fn clear(workspace: &Workspace, args: FileArgs) -> Result<()> {
    let mut doc = workspace.load(&args.file).await?;
    let removed = workspace.session().clear_file(&mut doc).await?;
    workspace.save(&doc).await?;
    println!("cleared {removed} bookmarks from {}", doc.file_path());
    Ok(())
}
