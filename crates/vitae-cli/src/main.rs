use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use vitae_core::{
    AppConfig, ExitCode, Freshness, IdentifierMap, OrcidId, VitaeError, YearFilter, extract_data,
    extract_publications,
};
use vitae_science::formats::{self, RenderContext, bibtex, json, latex};
use vitae_science::sources::{DoiContentSource, OrcidApiSource};
use vitae_science::{RecordSource, ScienceError, enrich};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "vitae",
    about = "Turn an ORCID record into publication and profile fragments for a CV",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: $VITAE_CONFIG or ~/.config/vitae/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    log: LogArgs,
}

#[derive(Args)]
struct LogArgs {
    /// Default log level when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Categorized publication list.
    Publications(RunArgs),

    /// Biography, affiliations, fundings and identifiers.
    Data(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// ORCID iD, bare or as an orcid.org URL.
    #[arg(long, required_unless_present = "key", conflicts_with = "key")]
    orcid: Option<String>,

    /// Institutional key resolved through --mapping-db.
    #[arg(long, requires = "mapping_db")]
    key: Option<String>,

    /// SQLite database with the orcid_mapping table.
    #[arg(long)]
    mapping_db: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Latex)]
    format: Format,

    /// Year filter: `2020`, `2018-2022` or `all`. Publications only.
    #[arg(long)]
    year: Option<String>,

    /// Fill missing publication fields from DOI metadata.
    #[arg(long)]
    enrich: bool,

    /// Refetch from the ORCID API even when the cache is fresh.
    #[arg(long, conflicts_with = "no_fetch")]
    force_fetch: bool,

    /// Never contact the ORCID API; use the cache, stale or not.
    #[arg(long)]
    no_fetch: bool,

    /// Directory holding the record cache.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    output_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Latex,
    Json,
    Bibtex,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Self::Latex => "tex",
            Self::Json => "json",
            Self::Bibtex => "bib",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Document {
    Publications,
    Data,
}

impl Document {
    fn file_stem(self) -> &'static str {
        match self {
            Self::Publications => "orcid-publications",
            Self::Data => "orcid-data",
        }
    }
}

// ─── Entry Point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                process_exit(ExitCode::InvalidArgs)
            } else {
                std::process::ExitCode::SUCCESS
            };
        }
    };

    if let Err(e) = init_logging(&cli.log) {
        eprintln!("Error: {e:#}");
        return process_exit(ExitCode::InvalidArgs);
    }

    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            error!(error = %format!("{e:#}"), code = code as i32, "run failed");
            eprintln!("Error: {e:#}");
            process_exit(code)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    let (document, args) = match cli.command {
        Commands::Publications(args) => (Document::Publications, args),
        Commands::Data(args) => (Document::Data, args),
    };

    if document == Document::Data && args.format == Format::Bibtex {
        return Err(VitaeError::Config("bibtex output is only available for publications".into()).into());
    }
    let orcid = resolve_orcid(&args)?;

    let data_dir = args.data_dir.clone().unwrap_or_else(default_data_dir);
    let source = OrcidApiSource::new(&config, &data_dir)?.with_offline(args.no_fetch);
    let freshness = if args.force_fetch {
        Freshness::ForceRefresh
    } else {
        Freshness::UseCacheIfPresent
    };
    let record = source.get_record(&orcid, freshness).await?;

    let ctx = RenderContext {
        orcid: &orcid,
        generated_at: Utc::now(),
        author_limit: config.output.author_limit,
    };

    let rendered = match document {
        Document::Publications => {
            let filter = YearFilter::parse(args.year.as_deref());
            let mut entries = extract_publications(&record, &filter);
            info!(orcid = %orcid, count = entries.len(), year = %filter, "extracted publications");

            if args.enrich {
                let doi_source = DoiContentSource::new(&config.enrich)?;
                let report = enrich(&mut entries, &doi_source).await;
                if report.unenriched() > 0 {
                    eprintln!("{} entries unenriched", report.unenriched());
                }
            }

            let groups = formats::assemble(&entries, ctx.author_limit);
            match args.format {
                Format::Latex => non_empty(latex::render_publications(&groups, &ctx)),
                Format::Json => json::render_publications(&groups, &ctx, config.output.json_indent)?,
                Format::Bibtex => non_empty(bibtex::render_publications(&groups, &ctx)),
            }
        }
        Document::Data => {
            let filter = YearFilter::parse(args.year.as_deref());
            if filter.is_bounded() {
                warn!(year = %filter, "--year applies to publications only, ignoring");
            }
            if args.enrich {
                warn!("--enrich applies to publications only, ignoring");
            }
            let groups = extract_data(&record, &filter);
            info!(orcid = %orcid, sections = groups.len(), "extracted profile data");
            match args.format {
                Format::Json => json::render_data(&groups, &ctx, config.output.json_indent)?,
                _ => non_empty(latex::render_data(&groups, &ctx)),
            }
        }
    };

    match rendered {
        Some(content) => {
            let path = write_output(&args.output_dir, document, args.format, &content)?;
            println!("{}", path.display());
        }
        None => {
            warn!(orcid = %orcid, document = document.file_stem(), "nothing to write");
            eprintln!("No entries found for {orcid}; no file written.");
        }
    }
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn resolve_orcid(args: &RunArgs) -> Result<OrcidId> {
    if let Some(raw) = &args.orcid {
        return Ok(OrcidId::parse(raw)?);
    }
    match (&args.key, &args.mapping_db) {
        (Some(key), Some(db_path)) => {
            let map = IdentifierMap::open(db_path)?;
            let id = map.resolve(key)?;
            info!(key = %key, orcid = %id, "resolved key");
            Ok(id)
        }
        _ => Err(VitaeError::Config("either --orcid or --key with --mapping-db is required".into()).into()),
    }
}

fn default_data_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("vitae")
}

fn non_empty(content: String) -> Option<String> {
    (!content.is_empty()).then_some(content)
}

fn write_output(dir: &Path, document: Document, format: Format, content: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("{}.{}", document.file_stem(), format.extension()));
    std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(e) = err.downcast_ref::<VitaeError>() {
        return e.exit_code();
    }
    if let Some(e) = err.downcast_ref::<ScienceError>() {
        return e.exit_code();
    }
    ExitCode::GeneralError
}

fn process_exit(code: ExitCode) -> std::process::ExitCode {
    std::process::ExitCode::from(code as u8)
}

// ─── Logging ────────────────────────────────────────────────────────────────

fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .with_context(|| format!("invalid --log-level {:?}", args.log_level))?;

    let (writer, ansi) = match &args.log_file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .ok();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("vitae").chain(args.iter().copied()))
    }

    fn run_args(cli: Cli) -> RunArgs {
        match cli.command {
            Commands::Publications(args) | Commands::Data(args) => args,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_publications_run() {
        let cli = parse(&[
            "--log-json",
            "publications",
            "--orcid",
            "0000-0002-1825-0097",
            "--format",
            "bibtex",
            "--year",
            "2018-2022",
            "--enrich",
            "--output-dir",
            "out",
        ])
        .unwrap();
        assert!(cli.log.log_json);
        let args = run_args(cli);
        assert_eq!(args.format, Format::Bibtex);
        assert_eq!(args.year.as_deref(), Some("2018-2022"));
        assert!(args.enrich);
    }

    #[test]
    fn rejects_conflicting_flags() {
        assert!(parse(&["data", "--output-dir", "out"]).is_err());
        assert!(parse(&["data", "--key", "123", "--output-dir", "out"]).is_err());
        assert!(
            parse(&[
                "data",
                "--orcid",
                "0000-0002-1825-0097",
                "--force-fetch",
                "--no-fetch",
                "--output-dir",
                "out"
            ])
            .is_err()
        );
        assert!(parse(&["data", "--orcid", "0000-0002-1825-0097", "--key", "1", "--output-dir", "o"]).is_err());
    }

    #[test]
    fn resolves_orcid_from_url() {
        let cli = parse(&[
            "data",
            "--orcid",
            "https://orcid.org/0000-0002-1825-0097",
            "--output-dir",
            "out",
        ])
        .unwrap();
        let id = resolve_orcid(&run_args(cli)).unwrap();
        assert_eq!(id.as_str(), "0000-0002-1825-0097");
    }

    #[test]
    fn missing_mapping_db_is_invalid_args() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("absent.db");
        let cli = parse(&[
            "data",
            "--key",
            "123",
            "--mapping-db",
            db.to_str().unwrap(),
            "--output-dir",
            "out",
        ])
        .unwrap();
        let err = resolve_orcid(&run_args(cli)).unwrap_err();
        assert_eq!(exit_code_for(&err), ExitCode::InvalidArgs);
    }

    #[test]
    fn exit_codes_follow_error_taxonomy() {
        let unavailable: anyhow::Error = ScienceError::Core(VitaeError::RecordUnavailable("x".into())).into();
        assert_eq!(exit_code_for(&unavailable), ExitCode::RecordUnavailable);
        let unmapped: anyhow::Error = VitaeError::UnmappedKey("k".into()).into();
        assert_eq!(exit_code_for(&unmapped), ExitCode::UnmappedKey);
        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), ExitCode::GeneralError);
    }

    #[test]
    fn output_file_names() {
        let dir = TempDir::new().unwrap();
        let path = write_output(dir.path(), Document::Publications, Format::Bibtex, "@misc{}").unwrap();
        assert_eq!(path, dir.path().join("orcid-publications.bib"));
        let path = write_output(&dir.path().join("nested"), Document::Data, Format::Json, "{}").unwrap();
        assert!(path.ends_with("nested/orcid-data.json"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{}");
    }

    #[tokio::test]
    async fn data_with_bibtex_is_rejected_before_fetching() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let cli = parse(&[
            "data",
            "--orcid",
            "0000-0002-1825-0097",
            "--format",
            "bibtex",
            "--no-fetch",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
        ])
        .unwrap();
        let err = run(cli).await.unwrap_err();
        assert_eq!(exit_code_for(&err), ExitCode::InvalidArgs);
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn offline_without_cache_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let cli = parse(&[
            "publications",
            "--orcid",
            "0000-0002-1825-0097",
            "--no-fetch",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
        ])
        .unwrap();
        let err = run(cli).await.unwrap_err();
        assert_eq!(exit_code_for(&err), ExitCode::RecordUnavailable);
        assert!(!out.exists());
    }
}
