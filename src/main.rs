//! `bookdesc`: scan FictionBook2 files into a sharded CSV catalog.

mod error;
mod sources;

use crate::error::{ErrorKind, Result};
use crate::sources::Input;
use bookdesc_catalog::{Catalog, CatalogOptions};
use bookdesc_config::Config;
use bookdesc_extract::{Extractor, FileInfo, Limits};
use bookdesc_storage::BackendRegistry;
use clap::{ArgAction, Parser};
use exn::ResultExt;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Catalog directory; any other path is written as a single CSV file
    output: PathBuf,
    /// FB2 files, or directories to search for them
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Configuration file [default: config.toml in the platform config directory]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Storage backend for shard indexes, overriding the configuration
    #[arg(long, value_name = "NAME")]
    backend: Option<String>,
    /// Skip the MD5 digest
    #[arg(long)]
    no_md5: bool,
    /// More logging; repeat for even more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// What happened to the inputs of one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Summary {
    /// Books stored in the catalog
    added: usize,
    /// FB2 files without a usable `<description>`
    empty: usize,
    /// Files that are not FB2
    skipped: usize,
    /// Files that could not be read or stored
    failed: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());
    let level = config.as_ref().ok().and_then(|config| config.level_filter().ok()).unwrap_or(LevelFilter::INFO);
    init_logging(level, cli.verbose);

    let result = config.or_raise(|| ErrorKind::Config).and_then(|config| run(&cli, &config));
    match result {
        Ok(summary) => {
            tracing::info!(
                added = summary.added,
                empty = summary.empty,
                skipped = summary.skipped,
                failed = summary.failed,
                "done"
            );
            ExitCode::SUCCESS
        },
        Err(err) => {
            tracing::error!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

/// `RUST_LOG` wins; otherwise the configured level, raised once per `-v`.
fn init_logging(level: LevelFilter, verbose: u8) {
    let level = match verbose {
        0 => level,
        1 => level.max(LevelFilter::DEBUG),
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

fn run(cli: &Cli, config: &Config) -> Result<Summary> {
    let extractor = Extractor::new()
        .with_buffer_size(config.buffer_size)
        .or_raise(|| ErrorKind::Config)?
        .with_md5(config.md5 && !cli.no_md5)
        .with_limits(Limits { annotation: config.annotation_limit, metatext: config.metatext_limit });
    let options = CatalogOptions {
        backend: cli.backend.clone().unwrap_or_else(|| config.backend.clone()),
        csv_extension: config.csv_extension.clone(),
        index_extension: config.index_extension.clone(),
    };
    let mut catalog =
        Catalog::open(&cli.output, options, BackendRegistry::with_defaults()).or_raise(|| ErrorKind::Config)?;

    let mut summary = Summary::default();
    for root in &cli.inputs {
        let inputs = match sources::discover(root) {
            Ok(inputs) => inputs,
            Err(err) => {
                tracing::warn!(path = %root.display(), %err, "skipping input");
                summary.failed += 1;
                continue;
            },
        };
        for input in inputs {
            process(&extractor, &mut catalog, &input, &mut summary);
        }
    }

    let catalog_error = || ErrorKind::Catalog(cli.output.clone());
    catalog.build_all_csvs().or_raise(catalog_error)?;
    catalog.close().or_raise(catalog_error)?;
    Ok(summary)
}

/// Extract one input and store it. Failures are logged and counted, never
/// returned: one bad file must not stop the batch.
#[tracing::instrument(skip_all, fields(path = %input.path.display()))]
fn process(extractor: &Extractor, catalog: &mut Catalog, input: &Input, summary: &mut Summary) {
    if input.is_zip() {
        tracing::debug!("zip archives are not searched");
        summary.skipped += 1;
        return;
    }
    if !input.is_fb2() {
        tracing::trace!("not an FB2 file");
        summary.skipped += 1;
        return;
    }
    let file = match input.open() {
        Ok(file) => file,
        Err(err) => {
            tracing::warn!(%err, "cannot open input");
            summary.failed += 1;
            return;
        },
    };
    let info = FileInfo::new(input.path.to_string_lossy(), input.size, input.modified);
    match extractor.extract(file, info) {
        Ok(Some(book)) => match catalog.put(&book) {
            Ok(()) => summary.added += 1,
            Err(err) => {
                tracing::warn!(err = ?err, "cannot store book");
                summary.failed += 1;
            },
        },
        Ok(None) => {
            tracing::debug!("no description found");
            summary.empty += 1;
        },
        Err(err) => {
            tracing::warn!(err = ?err, "cannot read input");
            summary.failed += 1;
        },
    }
}
