//! `zettel` command line front end.
//!
//! # Responsibility
//! - Wire configuration, logging and the core batch operations together.
//! - Render progress and run summaries on the terminal.
//!
//! All note semantics live in `zettel_core`; this binary only formats output.

use clap::{Parser, Subcommand};
use log::error;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use zettel_core::exchange::ItemOutcome;
use zettel_core::model::kind::Enumerated;
use zettel_core::model::timestamp;
use zettel_core::{
    init_from_config, verify_migration, ExportCriteria, Exporter, Importer, MergeStrategy,
    Migrator, NoteKind, NoteRepository, Parsed, ProgressEvent, RestoreOutcome,
    SqliteNoteRepository, StoreMaintenance, ZettelConfig,
};

/// Zettelkasten note store maintenance tool.
#[derive(Parser, Debug)]
#[command(name = "zettel")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Database file (overrides ZETTELKASTEN_DATABASE_PATH)
    #[arg(short = 'D', long, global = true)]
    database: Option<PathBuf>,

    /// Print one line per processed item
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export notes to a directory of markdown files
    Export {
        /// Target directory
        output: PathBuf,
        /// Only notes carrying this tag
        #[arg(long, conflicts_with_all = ["kind", "search", "timestamped", "since"])]
        tag: Option<String>,
        /// Only notes of this type
        #[arg(long, conflicts_with_all = ["search", "timestamped", "since"])]
        kind: Option<String>,
        /// Only notes matching this text
        #[arg(long, conflicts_with_all = ["timestamped", "since"])]
        search: Option<String>,
        /// Write into a new `<prefix>_<timestamp>` directory below OUTPUT
        #[arg(long, value_name = "PREFIX", conflicts_with = "since")]
        timestamped: Option<String>,
        /// Only notes updated at or after this ISO-8601 time
        #[arg(long)]
        since: Option<String>,
    },
    /// Import a directory of markdown files
    Import {
        input: PathBuf,
        /// Replace notes that already exist
        #[arg(short, long)]
        update: bool,
    },
    /// Merge several export directories
    Merge {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
        /// newest | oldest | largest | first
        #[arg(short, long, default_value = "newest")]
        strategy: MergeStrategy,
    },
    /// Restore the store from an export directory
    Restore {
        input: PathBuf,
        /// Delete every stored note first
        #[arg(long)]
        clear: bool,
        /// Skip the confirmation prompt for --clear
        #[arg(short, long)]
        yes: bool,
    },
    /// Migrate a markdown note directory into the store
    Migrate {
        input: PathBuf,
        /// Snapshot directory for source files and database
        #[arg(long)]
        backup_dir: Option<PathBuf>,
        /// Skip the verification pass
        #[arg(long)]
        skip_verify: bool,
        /// Write the migration report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Compare the store with a markdown directory
    Verify { input: PathBuf },
    /// Show store statistics
    Stats,
    /// List stored links whose target is missing
    ValidateLinks,
    /// Write an online backup of the database
    Backup { output: PathBuf },
    /// Reclaim space and check integrity
    Optimize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(message) => {
            error!("event=cli_exit module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    let base = std::env::current_dir().map_err(|err| err.to_string())?;
    let mut config = ZettelConfig::from_env()
        .map_err(|err| err.to_string())?
        .resolve_paths(&base);
    if let Some(database) = cli.database {
        config.db_path = if database.is_relative() {
            base.join(database)
        } else {
            database
        };
    }
    init_from_config(&config)?;

    let mut repo = SqliteNoteRepository::open(&config.db_path).map_err(|err| err.to_string())?;
    let verbose = cli.verbose;

    match cli.command {
        Commands::Export {
            output,
            tag,
            kind,
            search,
            timestamped,
            since,
        } => {
            let mut exporter = Exporter::new(&repo).with_progress(printer(verbose));
            let criteria = match (tag, kind, search) {
                (Some(tag), _, _) => Some(ExportCriteria::Tag(tag)),
                (_, Some(kind), _) => Some(ExportCriteria::Kind(parse_kind(&kind)?)),
                (_, _, Some(text)) => Some(ExportCriteria::Search(text)),
                _ => None,
            };
            if let Some(since) = since {
                let since = timestamp::parse_iso(&since)
                    .ok_or_else(|| format!("cannot parse --since `{since}`"))?;
                let (dir, metadata) = exporter
                    .create_incremental_export(&output, since)
                    .map_err(|err| err.to_string())?;
                println!(
                    "Exported {} notes ({} failed) to {}",
                    metadata.notes_exported,
                    metadata.failed,
                    dir.display()
                );
                return Ok(exit_code(metadata.failed == 0));
            }
            let (dir, stats) = match (criteria, timestamped) {
                (Some(criteria), _) => (
                    output.clone(),
                    exporter
                        .export_by_criteria(&output, &criteria)
                        .map_err(|err| err.to_string())?,
                ),
                (None, Some(prefix)) => exporter
                    .create_timestamped_export(&output, &prefix)
                    .map_err(|err| err.to_string())?,
                (None, None) => (
                    output.clone(),
                    exporter
                        .export_all(&output, config.export_batch_size)
                        .map_err(|err| err.to_string())?,
                ),
            };
            println!(
                "Exported {}/{} notes ({} failed) to {}",
                stats.exported,
                stats.total_notes,
                stats.failed,
                dir.display()
            );
            print_warnings(&stats.warnings);
            Ok(exit_code(stats.failed == 0))
        }
        Commands::Import { input, update } => {
            let stats = Importer::new(&mut repo)
                .with_progress(printer(verbose))
                .import_directory(&input, update, config.import_batch_size)
                .map_err(|err| err.to_string())?;
            println!(
                "Imported: {}  Updated: {}  Skipped: {}  Failed: {}",
                stats.imported, stats.updated, stats.skipped, stats.failed
            );
            print_warnings(&stats.warnings);
            Ok(exit_code(stats.failed == 0))
        }
        Commands::Merge { dirs, strategy } => {
            let stats = Importer::new(&mut repo)
                .with_progress(printer(verbose))
                .merge(&dirs, strategy)
                .map_err(|err| err.to_string())?;
            println!(
                "Files: {}  Unique notes: {}  Conflicts: {}  Imported: {}  Failed: {}",
                stats.total_files, stats.unique_notes, stats.conflicts, stats.imported, stats.failed
            );
            print_warnings(&stats.warnings);
            Ok(exit_code(stats.failed == 0))
        }
        Commands::Restore { input, clear, yes } => {
            let outcome = Importer::new(&mut repo)
                .with_progress(printer(verbose))
                .restore_from_export(&input, clear, config.import_batch_size, |count| {
                    yes || confirm(&format!("This will DELETE all {count} existing notes. Continue?"))
                })
                .map_err(|err| err.to_string())?;
            match outcome {
                RestoreOutcome::Cancelled => {
                    println!("Restore cancelled");
                    Ok(ExitCode::FAILURE)
                }
                RestoreOutcome::Completed(report) => {
                    if let Some(metadata) = report.metadata.as_ref() {
                        println!("Export dated {}", metadata.export_date);
                    }
                    println!(
                        "Cleared: {}  Imported: {}  Updated: {}  Failed: {}  Notes with broken links: {}",
                        report.cleared,
                        report.import.imported,
                        report.import.updated,
                        report.import.failed,
                        report.broken_links.len()
                    );
                    print_warnings(&report.import.warnings);
                    Ok(exit_code(report.success()))
                }
            }
        }
        Commands::Migrate {
            input,
            backup_dir,
            skip_verify,
            report: report_path,
        } => {
            let mut migrator = Migrator::new(&input, &mut repo).with_progress(printer(verbose));
            if let Some(backup_dir) = backup_dir {
                migrator = migrator.with_backup_dir(backup_dir);
            }
            let report = migrator.run(!skip_verify).map_err(|err| err.to_string())?;
            println!(
                "Total: {}  Successful: {}  Failed: {}  Success rate: {:.1}%",
                report.total_files,
                report.successful,
                report.failed,
                report.success_rate()
            );
            print_warnings(&report.warnings);
            for failure in &report.errors {
                println!("  ! {}: {}", failure.file, failure.error);
            }
            if let Some(path) = report_path {
                report.save(&path).map_err(|err| err.to_string())?;
                println!("Report saved to {}", path.display());
            }
            Ok(exit_code(report.is_success()))
        }
        Commands::Verify { input } => {
            let mut observer = printer(verbose);
            let verification = verify_migration(&input, &repo, &mut observer)
                .map_err(|err| err.to_string())?;
            if verification.is_clean() {
                println!("Verification passed");
            } else {
                println!("Verification found {} issues", verification.issues.len());
                for issue in &verification.issues {
                    println!("  - {issue}");
                }
            }
            Ok(exit_code(verification.is_clean()))
        }
        Commands::Stats => {
            let stats = repo.get_statistics().map_err(|err| err.to_string())?;
            println!("Storage:     {}", stats.storage_type);
            println!("Total notes: {}", stats.total_notes);
            println!("Total tags:  {}", stats.total_tags);
            println!("Total links: {}", stats.total_links);
            for (kind, count) in &stats.notes_by_type {
                println!("  {kind}: {count}");
            }
            for tag in repo.get_tags().map_err(|err| err.to_string())? {
                println!("  #{} ({})", tag.name, tag.count);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::ValidateLinks => {
            let broken = Importer::new(&mut repo)
                .with_progress(printer(verbose))
                .validate_links()
                .map_err(|err| err.to_string())?;
            if broken.is_empty() {
                println!("All links are valid");
            }
            for (id, targets) in &broken {
                println!("  {id} -> {}", targets.join(", "));
            }
            Ok(exit_code(broken.is_empty()))
        }
        Commands::Backup { output } => {
            repo.backup(&output).map_err(|err| err.to_string())?;
            println!("Backup written to {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Optimize => {
            repo.optimize().map_err(|err| err.to_string())?;
            let healthy = repo.verify_integrity().map_err(|err| err.to_string())?;
            println!("Optimized; integrity {}", if healthy { "ok" } else { "FAILED" });
            Ok(exit_code(healthy))
        }
    }
}

fn parse_kind(raw: &str) -> Result<NoteKind, String> {
    match NoteKind::parse(raw) {
        Parsed::Known(kind) => Ok(kind),
        Parsed::Unknown(value) => Err(format!("unknown note type `{value}`")),
    }
}

/// Progress observer that prints stage totals, and items when verbose.
fn printer(verbose: bool) -> impl FnMut(ProgressEvent) {
    move |event| match event {
        ProgressEvent::Started { stage, total } => println!("{stage}: {total} items"),
        ProgressEvent::Item {
            stage,
            label,
            outcome,
        } => {
            if verbose || outcome == ItemOutcome::Failed {
                println!("  [{stage}] {label}: {}", outcome.as_str());
            }
        }
        ProgressEvent::Finished { .. } => {}
    }
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!("Warnings ({}):", warnings.len());
    for warning in warnings.iter().take(5) {
        println!("  - {warning}");
    }
    if warnings.len() > 5 {
        println!("  ... and {} more", warnings.len() - 5);
    }
}

fn confirm(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
