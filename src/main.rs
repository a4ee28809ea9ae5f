use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::debug;
use spacetally::config::{Overrides, Settings};
use spacetally::crawler::Depth;
use spacetally::deletion::{DeleteSummary, Outcome};
use spacetally::descriptor::{
    display_name, find_preview, read_descriptor_named, ContentType, DescriptorCache,
};
use spacetally::export::{render_text, text_dump, write_csv};
use spacetally::model::{ResultModel, SortKey};
use spacetally::size::{compute_size, format_size, total_size};
use spacetally::worker::ScanWorker;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Number of failed deletions listed before the rest is summarized.
const FAILURE_LIST_LIMIT: usize = 5;

#[derive(Parser)]
#[command(name = "spacetally")]
#[command(version)]
#[command(about = "Measure folder sizes, browse them sorted, and delete what you don't need")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv for more)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Read settings from this file instead of the default location
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a folder and print its size breakdown
    Scan {
        /// Folder to analyze (default: configured root or the Steam workshop folder)
        root: Option<PathBuf>,

        /// Number of levels to list below the root
        #[arg(short = 'd', long, value_name = "N", conflicts_with = "unlimited")]
        depth: Option<usize>,

        /// List every level
        #[arg(long)]
        unlimited: bool,

        /// List files as well as folders
        #[arg(long)]
        files: bool,

        /// Hide entries smaller than this (e.g. 100MB, 1GB)
        #[arg(long, value_name = "SIZE")]
        min_size: Option<String>,

        /// Sort key applied within each folder
        #[arg(long, value_enum)]
        sort: Option<SortArg>,

        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "tree")]
        format: Format,

        /// Append descriptor titles to folder names
        #[arg(long)]
        titles: bool,

        /// Only list folders whose descriptor declares this type (flat list)
        #[arg(long = "type", value_enum, value_name = "TYPE")]
        content_type: Option<TypeArg>,
    },

    /// Delete files or folders immediately (no recycle bin, no undo)
    Delete {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Ask before deleting
        #[arg(long)]
        confirm: bool,

        /// Scan this folder again once the deletion is done
        #[arg(long, value_name = "ROOT")]
        rescan: Option<PathBuf>,
    },

    /// Print the combined size of the given paths
    Size {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Show descriptor metadata and preview file of a folder
    Info { dir: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Size,
    Percentage,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortKey::Name,
            SortArg::Size => SortKey::Size,
            SortArg::Percentage => SortKey::Percentage,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TypeArg {
    Scene,
    Video,
    Web,
    Application,
}

impl From<TypeArg> for ContentType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Scene => ContentType::Scene,
            TypeArg::Video => ContentType::Video,
            TypeArg::Web => ContentType::Web,
            TypeArg::Application => ContentType::Application,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Sorted, filtered hierarchy with sizes and percentages
    Tree,
    /// CSV of every scanned entry
    Csv,
    /// Indented plain-text listing in discovery order
    Text,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Ok(Settings::load_from(path)?),
        None => Ok(Settings::load()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut settings = load_settings(cli.config.as_deref())?;
    let worker = ScanWorker::new();

    match cli.command {
        Commands::Scan {
            root,
            depth,
            unlimited,
            files,
            min_size,
            sort,
            asc,
            format,
            titles,
            content_type,
        } => {
            let max_depth = match (unlimited, depth) {
                (true, _) => Some(Depth::Unlimited),
                (false, Some(n)) => Some(Depth::levels(n).context("--depth must be at least 1")?),
                (false, None) => None,
            };
            settings.apply_overrides(Overrides {
                root_path: root,
                max_depth,
                include_files: files.then_some(true),
                min_size,
                sort_key: sort.map(SortKey::from),
                descending: asc.then_some(false),
            });
            run_scan(&worker, &settings, format, titles, content_type.map(ContentType::from))
        }
        Commands::Delete {
            paths,
            confirm,
            rescan,
        } => run_delete(&worker, &settings, paths, confirm, rescan),
        Commands::Size { paths } => {
            println!("{}", format_size(total_size(&paths)));
            Ok(())
        }
        Commands::Info { dir } => run_info(&settings, &dir),
    }
}

fn scan_into_model(worker: &ScanWorker, settings: &Settings, root: PathBuf) -> Result<ResultModel> {
    let min_size = settings.min_size_bytes()?;
    let result = worker
        .start_scan(root.clone(), settings.scan_options())?
        .wait_with(|progress| {
            debug!(
                "visited {} dirs, {} entries ({})",
                progress.visited_dirs,
                progress.emitted_nodes,
                progress.current_dir.display()
            )
        })
        .with_context(|| format!("scan of {} failed", root.display()))?;

    let mut model = ResultModel::new();
    model.set_sort(settings.sort_spec());
    model.set_min_size(min_size);
    model.replace(result);
    Ok(model)
}

fn run_scan(
    worker: &ScanWorker,
    settings: &Settings,
    format: Format,
    titles: bool,
    content_type: Option<ContentType>,
) -> Result<()> {
    let root = settings
        .resolve_root()
        .context("no folder given and no Steam workshop folder found")?;
    let model = scan_into_model(worker, settings, root)?;
    let Some(result) = model.current() else {
        return Ok(());
    };

    match format {
        Format::Csv => {
            write_csv(io::stdout().lock(), &result.nodes)?;
        }
        Format::Text => {
            print!("{}", text_dump(&result.nodes));
        }
        Format::Tree => {
            let cache = DescriptorCache::new(&settings.descriptor_file);
            if titles || content_type.is_some() {
                cache.prefetch(&result.nodes);
            }

            let view = match content_type {
                Some(kind) => model.view_where(|node| cache.has_type(node, kind)),
                None => model.view(),
            };
            if view.is_empty() {
                println!(
                    "No entries of at least {} found.",
                    format_size(model.min_size())
                );
                return Ok(());
            }

            print!(
                "{}",
                render_text(&view, |row| {
                    let descriptor = if titles { cache.get(&row.path) } else { None };
                    display_name(&row.name, row.kind, descriptor.as_ref())
                })
            );

            let filter_note = if model.min_size() > 0 {
                format!(" (filter: at least {})", format_size(model.min_size()))
            } else {
                String::new()
            };
            println!(
                "{} items{} | total: {}",
                view.len(),
                filter_note,
                format_size(result.root_size)
            );
        }
    }
    Ok(())
}

fn confirm_deletion(paths: &[PathBuf]) -> Result<bool> {
    println!(
        "About to permanently delete {} item(s), {}:",
        paths.len(),
        format_size(total_size(paths))
    );
    for path in paths {
        println!("  {}", path.display());
    }
    print!("Proceed? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_outcomes(outcomes: &[Outcome]) {
    let summary = DeleteSummary::of(outcomes);
    if !summary.has_failures() {
        println!("{} item(s) deleted", summary.succeeded);
        return;
    }

    println!(
        "Deleted {} item(s), {} failed:",
        summary.succeeded, summary.failed
    );
    let failures: Vec<_> = outcomes.iter().filter(|o| !o.success).collect();
    for outcome in failures.iter().take(FAILURE_LIST_LIMIT) {
        println!(
            "  {}: {}",
            outcome.path.display(),
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    if failures.len() > FAILURE_LIST_LIMIT {
        println!("  ... and {} more", failures.len() - FAILURE_LIST_LIMIT);
    }
}

fn run_delete(
    worker: &ScanWorker,
    settings: &Settings,
    paths: Vec<PathBuf>,
    confirm: bool,
    rescan: Option<PathBuf>,
) -> Result<()> {
    if confirm && !confirm_deletion(&paths)? {
        println!("Nothing deleted.");
        return Ok(());
    }

    let outcomes = worker.start_delete(paths)?.wait()?;
    print_outcomes(&outcomes);
    let summary = DeleteSummary::of(&outcomes);

    if let Some(root) = rescan {
        if summary.succeeded > 0 {
            let model = scan_into_model(worker, settings, root)?;
            println!(
                "Rescanned: {} entries, total {}",
                model.filter(0).len(),
                format_size(model.root_size())
            );
        }
    }

    if summary.has_failures() {
        bail!("{} of {} deletions failed", summary.failed, outcomes.len());
    }
    Ok(())
}

fn run_info(settings: &Settings, dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }

    println!("{}", dir.display());
    println!("Size: {}", format_size(compute_size(dir)));

    match read_descriptor_named(dir, &settings.descriptor_file) {
        Some(descriptor) => {
            println!("Title: {}", descriptor.title);
            if descriptor.kind != ContentType::Unknown {
                println!("Type: {} {}", descriptor.kind.icon(), descriptor.kind);
            }
            if !descriptor.description.is_empty() {
                println!("Description: {}", descriptor.description);
            }
            if !descriptor.tags.is_empty() {
                println!("Tags: {}", descriptor.tags.join(", "));
            }
            if let Some(url) = descriptor.workshop_url() {
                println!("Workshop: {}", url);
            }
        }
        None => println!("No {} found", settings.descriptor_file),
    }

    match find_preview(dir) {
        Some(preview) => println!("Preview: {} ({:?})", preview.path.display(), preview.kind),
        None => println!("Preview: none"),
    }
    Ok(())
}
