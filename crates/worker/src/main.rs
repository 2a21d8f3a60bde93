use anyhow::Context;
use clap::Parser;
use reprisk_core::engine::RiskEngine;
use reprisk_core::scoring::ScoringConfig;
use reprisk_core::snapshot::SnapshotManager;
use reprisk_core::source::error::SourceUnavailableError;
use reprisk_core::source::memory::InMemorySignalSource;
use reprisk_core::source::postgres::PgSignalSource;
use reprisk_core::source::SignalSource;
use reprisk_core::storage::lock::ScoreDateLock;
use reprisk_core::storage::memory::InMemorySnapshotStore;
use reprisk_core::storage::runs::{RunStatus, ScoreRunRecord};
use reprisk_core::storage::snapshots::PgSnapshotStore;
use reprisk_core::storage::SnapshotStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod run;

#[derive(Debug, Parser)]
#[command(name = "reprisk_worker")]
struct Args {
    /// Score date (YYYY-MM-DD). Defaults to the latest date whose market data has landed.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Score a single entity instead of every tracked one.
    #[arg(long)]
    entity_id: Option<i64>,

    /// Also recompute this many days before the score date, oldest first.
    #[arg(long, default_value_t = 0)]
    backfill_days: u32,

    /// Score from a JSON signal fixture instead of Postgres. Nothing is persisted.
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Do everything except writing to the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = reprisk_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let config = ScoringConfig::from_env()?;

    let as_of_date = reprisk_core::time::scoring_date::resolve_as_of_date(
        args.as_of_date.as_deref(),
        chrono::Utc::now(),
    )?;
    let dates = reprisk_core::time::scoring_date::backfill_dates(as_of_date, args.backfill_days);

    if let Some(path) = &args.fixture {
        let source: Arc<dyn SignalSource> = Arc::new(InMemorySignalSource::from_json_file(path)?);
        let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::default());
        let manager = SnapshotManager::new(RiskEngine::new(source, config)?, store);

        for date in dates {
            let outcome = run::score_date(&manager, date, args.entity_id, args.dry_run).await?;
            tracing::info!(
                %date,
                fixture = %path.display(),
                scored = outcome.scored,
                failed = outcome.failed,
                "fixture run finished"
            );
        }
        return Ok(());
    }

    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    reprisk_core::storage::migrate(&pool).await?;

    let source: Arc<dyn SignalSource> = Arc::new(PgSignalSource::new(pool.clone()));
    let store: Arc<dyn SnapshotStore> = Arc::new(PgSnapshotStore::new(pool.clone()));
    let manager = SnapshotManager::new(RiskEngine::new(source, config)?, store);

    for date in dates {
        if args.dry_run {
            let outcome = run::score_date(&manager, date, args.entity_id, true).await?;
            tracing::info!(
                %date,
                dry_run = true,
                scored = outcome.scored,
                failed = outcome.failed,
                "worker run finished (dry-run)"
            );
            continue;
        }

        let Some(lock) = ScoreDateLock::try_acquire(&pool, date).await? else {
            tracing::warn!(%date, "score date lock not acquired; another run in progress");
            continue;
        };

        let result = run::score_date(&manager, date, args.entity_id, false).await;
        let recorded = record_outcome(&pool, date, result).await;

        if let Err(err) = lock.release().await {
            tracing::warn!(%date, error = %err, "score date lock release failed");
        }
        recorded?;
    }

    Ok(())
}

async fn record_outcome(
    pool: &sqlx::PgPool,
    date: chrono::NaiveDate,
    result: anyhow::Result<run::DateOutcome>,
) -> anyhow::Result<()> {
    let (status, scored, failed, error) = match &result {
        Ok(outcome) if outcome.failed == 0 => (RunStatus::Success, outcome.scored, 0, None),
        Ok(outcome) => (
            RunStatus::Partial,
            outcome.scored,
            outcome.failed,
            outcome.first_error.clone(),
        ),
        Err(err) => (RunStatus::Error, 0, 0, Some(format!("{err:#}"))),
    };

    let record = ScoreRunRecord {
        as_of_date: date,
        source: "postgres",
        status,
        entities_scored: scored,
        entities_failed: failed,
        error: error.as_deref(),
    };

    let run_id = reprisk_core::storage::runs::record_score_run(pool, &record).await?;

    match &result {
        Ok(_) => {
            tracing::info!(
                %date,
                %run_id,
                status = record.status.as_str(),
                scored = record.entities_scored,
                failed = record.entities_failed,
                "score run finished"
            );
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(err);
            if let Some(diag) = err.downcast_ref::<SourceUnavailableError>() {
                tracing::error!(
                    %date,
                    %run_id,
                    source = diag.source,
                    stage = diag.stage,
                    "signal source unavailable; no snapshots written"
                );
            } else {
                tracing::error!(%date, %run_id, error = %err, "score run failed");
            }
        }
    }

    Ok(())
}

fn init_sentry(settings: &reprisk_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
