use clap::{Args, Parser, Subcommand};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mbert_locator::collector::JsonLocationsCollector;
use mbert_locator::config::{load_requests, ExcludeSpec, RequestSpec};
use mbert_locator::discovery::find_source_files;
use mbert_locator::error::{LocatorError, Result};
use mbert_locator::git_changes;
use mbert_locator::location::MBertLocationFactory;
use mbert_locator::request::{FileRequest, LocateOutcome, SelectionMode};
use mbert_locator::source::JavaSourceParser;
use mbert_locator::sqlite;

#[derive(Parser)]
#[command(name = "mbert-locator")]
#[command(about = "Selects mutation locations for MBERT-style masking in Java sources")]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate the elements to mask in one or more Java files
    Locate(LocateArgs),
}

#[derive(Args)]
struct LocateArgs {
    /// Java file to process (repeatable)
    #[arg(short, long)]
    file: Vec<PathBuf>,

    /// Process every Java file under this folder
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Only mutate these methods (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    methods: Vec<String>,

    /// Only mutate these lines (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    lines: Vec<usize>,

    /// Methods of the exclusion request (comma separated)
    #[arg(long, value_delimiter = ',')]
    exclude_methods: Vec<String>,

    /// Lines of the exclusion request (comma separated)
    #[arg(long, value_delimiter = ',')]
    exclude_lines: Vec<usize>,

    /// Maximum number of locations per file (per run with --continue-ids)
    #[arg(short, long)]
    tokens: Option<usize>,

    /// Number mutant ids across all files instead of restarting at 0 per file
    #[arg(long)]
    continue_ids: bool,

    /// Order in which candidate elements are visited
    #[arg(long, value_enum, default_value_t = SelectionMode::Ordered)]
    mode: SelectionMode,

    /// Seed for the random selection mode
    #[arg(long)]
    seed: Option<u64>,

    /// JSON file with per-file requests
    #[arg(short, long)]
    requests: Option<PathBuf>,

    /// Restrict to Java files and lines changed since this git revision
    #[arg(long, value_name = "REV")]
    changed_since: Option<String>,

    /// Where to write the JSON report
    #[arg(short, long, default_value = "locations.json")]
    output: PathBuf,

    /// Optional path to SQLite database file (default: locations.db)
    #[arg(long, value_name = "PATH")]
    sqlite: Option<Option<PathBuf>>,
}

impl LocateArgs {
    fn exclude_spec(&self) -> Option<ExcludeSpec> {
        if self.exclude_methods.is_empty() && self.exclude_lines.is_empty() {
            return None;
        }
        Some(ExcludeSpec {
            methods: self.exclude_methods.clone(),
            lines: self.exclude_lines.clone(),
        })
    }

    fn spec_for(&self, file_path: String, lines: Vec<usize>) -> RequestSpec {
        RequestSpec {
            file_path,
            methods: self.methods.clone(),
            lines,
            exclude: self.exclude_spec(),
        }
    }

    async fn collect_requests(&self) -> Result<Vec<RequestSpec>> {
        let mut specs = Vec::new();

        if let Some(ref path) = self.requests {
            specs.extend(load_requests(path)?);
        }

        for file in &self.file {
            specs.push(self.spec_for(file.to_string_lossy().to_string(), self.lines.clone()));
        }

        if let Some(ref dir) = self.dir {
            for file in find_source_files(dir)? {
                specs.push(self.spec_for(file.to_string_lossy().to_string(), self.lines.clone()));
            }
        }

        if let Some(ref revision) = self.changed_since {
            let here = Path::new(".");
            for file in git_changes::changed_files(here, revision).await? {
                let touched = git_changes::lines_touched(here, &file, revision).await?;
                if touched.is_empty() {
                    debug!(file = %file, "no added lines, skipping");
                    continue;
                }
                specs.push(self.spec_for(file, touched));
            }
        }

        Ok(specs)
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

type Located = (String, Result<(JsonLocationsCollector, LocateOutcome)>);

fn locate_file(
    parser: &JavaSourceParser,
    request: &mut FileRequest,
    number_of_tokens: Option<usize>,
    selection_mode: SelectionMode,
) -> Located {
    let file_path = request.file_path().to_string();
    let factory = MBertLocationFactory::new();
    let mut collector = JsonLocationsCollector::new();

    let located = request
        .locate_tokens(parser, &factory, &mut collector, number_of_tokens, selection_mode)
        .map(|outcome| {
            debug!(request = %request, ?outcome, "request done");
            (collector, outcome)
        });
    (file_path, located)
}

/// Runs the requests one after the other, each continuing the mutant ids
/// where the previous one stopped.
fn locate_in_sequence(
    parser: &JavaSourceParser,
    requests: Vec<FileRequest>,
    number_of_tokens: Option<usize>,
    selection_mode: SelectionMode,
) -> Vec<Located> {
    let mut next_mutant_id = 0;
    requests
        .into_iter()
        .map(|mut request| {
            request.set_next_mutant_id(next_mutant_id);
            let located = locate_file(parser, &mut request, number_of_tokens, selection_mode);
            next_mutant_id = request.next_mutant_id();
            located
        })
        .collect()
}

fn join_error(e: tokio::task::JoinError) -> LocatorError {
    LocatorError::Other(anyhow::anyhow!("locate task failed: {}", e))
}

async fn run_locate(args: LocateArgs) -> Result<()> {
    if args.seed.is_some() && args.mode != SelectionMode::Random {
        return Err(LocatorError::InvalidInput(
            "--seed only applies to --mode random".to_string(),
        ));
    }

    let db_path = match args.sqlite {
        Some(Some(ref path)) => {
            let mut full_path = PathBuf::from("db");
            full_path.push(path);
            Some(full_path)
        }
        Some(None) => Some(PathBuf::from("db/locations.db")),
        None => None,
    };

    let specs = args.collect_requests().await?;
    if specs.is_empty() {
        return Err(LocatorError::InvalidInput(
            "Nothing to process: provide --file, --dir, --requests or --changed-since".to_string(),
        ));
    }
    info!(files = specs.len(), mode = args.mode.as_str(), "locating mutation points");

    let tokens = args.tokens;
    let mode = args.mode;
    let parser = Arc::new(JavaSourceParser::new()?);
    let requests: Vec<FileRequest> = specs
        .into_iter()
        .map(|spec| spec.into_file_request(args.seed))
        .collect();

    let results: Vec<Located> = if args.continue_ids {
        let parser = Arc::clone(&parser);
        tokio::task::spawn_blocking(move || locate_in_sequence(&parser, requests, tokens, mode))
            .await
            .map_err(join_error)?
    } else {
        let tasks = requests.into_iter().map(|mut request| {
            let parser = Arc::clone(&parser);
            tokio::task::spawn_blocking(move || locate_file(&parser, &mut request, tokens, mode))
        });
        join_all(tasks)
            .await
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(join_error)?
    };

    let mut collector = JsonLocationsCollector::new();
    let mut skipped = 0;
    for (file_path, located) in results {
        match located {
            Ok((file_collector, LocateOutcome::Aborted(reason))) => {
                debug!(file = %file_path, ?reason, "file skipped");
                skipped += 1;
                collector.merge(file_collector);
            }
            Ok((file_collector, _)) => collector.merge(file_collector),
            Err(e) => {
                warn!(file = %file_path, "could not process file: {}", e);
                skipped += 1;
            }
        }
    }

    collector.write_json(&args.output)?;

    if let Some(ref path) = db_path {
        sqlite::check_db(path)?;
        let run_id = sqlite::store_run(path, mode.as_str())?;
        let stored = sqlite::store_locations(path, run_id, &collector)?;
        info!(run_id, stored, "SQLite option: run saved");
    }

    info!(
        locations = collector.location_count(),
        unhandled = collector.unhandled_count(),
        skipped,
        "done"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Locate(args) => run_locate(args).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SOURCE: &str = "class A {\n    int f(int n) {\n        int m = n + 1;\n        return m;\n    }\n}\n";

    fn requests(dir: &Path) -> Vec<FileRequest> {
        ["A.java", "B.java"]
            .iter()
            .map(|name| {
                let path = dir.join(name);
                fs::write(&path, SOURCE).unwrap();
                FileRequest::new(path.to_string_lossy().to_string(), vec![], [])
            })
            .collect()
    }

    fn mutant_ids(results: Vec<Located>) -> Vec<Vec<usize>> {
        results
            .into_iter()
            .map(|(_, located)| {
                let (collector, _) = located.unwrap();
                let ids: Vec<usize> = collector.locations().map(|l| l.mutant_id).collect();
                ids
            })
            .collect()
    }

    #[test]
    fn test_sequence_continues_mutant_ids_across_files() {
        let temp_dir = tempdir().unwrap();
        let parser = JavaSourceParser::new().unwrap();

        let results = locate_in_sequence(&parser, requests(temp_dir.path()), None, SelectionMode::Ordered);

        assert_eq!(mutant_ids(results), vec![vec![0, 5], vec![10, 15]]);
    }

    #[test]
    fn test_sequence_quota_spans_the_run() {
        let temp_dir = tempdir().unwrap();
        let parser = JavaSourceParser::new().unwrap();

        let results = locate_in_sequence(&parser, requests(temp_dir.path()), Some(3), SelectionMode::Ordered);

        assert_eq!(mutant_ids(results), vec![vec![0, 5], vec![10]]);
    }

    #[test]
    fn test_single_files_start_at_zero() {
        let temp_dir = tempdir().unwrap();
        let parser = JavaSourceParser::new().unwrap();

        let results: Vec<Located> = requests(temp_dir.path())
            .into_iter()
            .map(|mut request| locate_file(&parser, &mut request, None, SelectionMode::Ordered))
            .collect();

        assert_eq!(mutant_ids(results), vec![vec![0, 5], vec![0, 5]]);
    }
}
