use anyhow::{Context, Result};
use clap::Parser;
use domain_db::{
    checkpoint::Checkpoint,
    cve_sources::cvelist,
    db::{
        self,
        loader::{self, RowSink},
        models::RowSet,
        PgSink,
    },
    pipeline,
};
use dotenvy::dotenv;
use env_logger::Env;
use lazy_static::lazy_static;
use std::borrow::Cow;
use std::path::PathBuf;

mod configuration;

use crate::configuration::{DatabaseSettings, EtlSettings};

fn main() -> Result<()> {
    let opts = Opts::parse();

    dotenv().ok();

    // Setup logger
    {
        #[cfg(debug_assertions)]
        let default_env_filter = "debug";
        #[cfg(not(debug_assertions))]
        let default_env_filter = "info";

        let env = Env::default().default_filter_or(default_env_filter);
        env_logger::Builder::from_env(env)
            .try_init()
            .context("Failed to setup logger")?;
    }

    let settings = {
        let mut settings = EtlSettings::try_from_env().context("Invalid CVE_* settings")?;
        if let Some(data_dir) = opts.data_dir {
            settings.data_dir = data_dir;
        }
        settings
    };

    // Repository
    let repository = {
        let db_settings = DatabaseSettings::try_from_env().context("Invalid DB_* settings")?;

        db::PostgresRepository::new(&db_settings.connection_string())
            .context("Cannot connect to database")?
    };

    // Check for migrations
    {
        if repository.any_pending_migrations()? {
            if opts.migrate {
                repository.run_pending_migrations()?;
                log::info!("Migration successfully")
            } else {
                log::error!("Migration needed");
                std::process::exit(1)
            }
        }
    }

    let checkpoint = Checkpoint::at(&settings.checkpoint_path);
    let _lock = checkpoint.lock().context("Cannot start the run")?;

    let mut conn = repository.connection()?;
    let loaded = run(&settings, &checkpoint, &mut PgSink::new(&mut conn))?;

    log::info!("{}", report_message(loaded));

    Ok(())
}

#[derive(Parser)]
#[command(author, version = version(), about)]
struct Opts {
    /// Migrate database
    #[arg(short = 'm', long = "migrate")]
    migrate: bool,

    /// Directory holding the CVE JSON 5 records, overrides CVE_DATA_DIR
    #[arg(short = 'd', long = "data")]
    data_dir: Option<PathBuf>,
}

/// Resumes from the staged checkpoint when there is one, otherwise stages a
/// fresh transformation, then writes every row through `sink`. The checkpoint
/// is cleared only once the whole load succeeded.
fn run<S: RowSink>(settings: &EtlSettings, checkpoint: &Checkpoint, sink: &mut S) -> Result<usize> {
    let rows = if checkpoint.exists() {
        checkpoint
            .load()
            .with_context(|| format!("Cannot resume from {}", checkpoint.path().display()))?
    } else {
        stage(settings, checkpoint)?
    };

    if rows.is_empty() {
        return Ok(0);
    }

    match loader::load(sink, &rows, settings.batch_size) {
        Ok(report) => {
            checkpoint.clear()?;
            Ok(report.submitted)
        }
        Err(e) => {
            log::error!(
                "load failed, {} is kept for the next run: {:#}",
                checkpoint.path().display(),
                e
            );
            Err(e)
        }
    }
}

/// Discovers, transforms and stages every record under the data directory.
fn stage(settings: &EtlSettings, checkpoint: &Checkpoint) -> Result<RowSet> {
    log::info!(
        "importing {} (v{}) records from {} ...",
        cvelist::SOURCE_NAME,
        cvelist::VERSION,
        settings.data_dir.display()
    );

    let paths = cvelist::discover(&settings.data_dir)?;
    let mut rows = pipeline::transform_all(&paths, &settings.pipeline())?;

    let duplicates = rows.dedup();
    if duplicates > 0 {
        log::warn!("dropped {} rows with repeated identifiers", duplicates);
    }

    if !rows.is_empty() {
        checkpoint
            .save(&rows)
            .context("Cannot stage transformed rows")?;
    }

    Ok(rows)
}

fn report_message(num_records: usize) -> Cow<'static, str> {
    if num_records == 0 {
        Cow::Borrowed("No records to load")
    } else {
        Cow::Owned(format!("{num_records} rows loaded"))
    }
}

fn version() -> &'static str {
    #[cfg(debug_assertions)]
    lazy_static! {
        static ref VERSION: String = format!("{}+dev", env!("CARGO_PKG_VERSION"));
    }

    #[cfg(not(debug_assertions))]
    lazy_static! {
        static ref VERSION: String = env!("CARGO_PKG_VERSION").to_string();
    }
    &VERSION
}
