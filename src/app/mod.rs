pub mod config;
mod error;
mod logging;
pub mod scheduler;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::adapters::hooks::CustomizationHooks;
use crate::adapters::oioi_client::OioiHttpClient;
use crate::adapters::snapshot_file::FileSnapshotSource;

pub use error::AppError;

pub fn run() -> Result<(), AppError> {
    let _ = dotenvy::dotenv();

    logging::init()?;

    let config = config::AppConfig::from_env()?;

    tracing::info!(
        api_url = %config.api_url,
        partner_identifier = %config.partner_identifier,
        snapshot_path = %config.snapshot_path,
        station_sync_interval_s = config.station_sync_interval_s,
        status_sync_interval_s = config.status_sync_interval_s,
        cdr_sync_interval_s = config.cdr_sync_interval_s,
        "application bootstrap initialized"
    );

    run_with_config(config)
}

pub fn run_with_config(config: config::AppConfig) -> Result<(), AppError> {
    let client = OioiHttpClient::new(
        &config.api_url,
        &config.api_key,
        Duration::from_secs(config.request_timeout_s),
    )
    .map_err(AppError::runtime)?;

    let source = FileSnapshotSource::new(&config.snapshot_path);
    let sync = Arc::new(scheduler::SyncScheduler::new(
        source,
        Arc::new(client),
        CustomizationHooks::default(),
        config.partner_identifier.clone(),
    ));

    sync.set_station_push_enabled(!config.disable_station_push);
    sync.set_status_push_enabled(!config.disable_status_push);
    sync.set_cdr_push_enabled(!config.disable_cdr_push);

    let intervals = scheduler::StreamIntervals {
        stations: Duration::from_secs(config.station_sync_interval_s),
        statuses: Duration::from_secs(config.status_sync_interval_s),
        records: Duration::from_secs(config.cdr_sync_interval_s),
    };
    let stop_flag = Arc::new(AtomicBool::new(false));
    let handles = scheduler::start_streams(sync, intervals, stop_flag);

    tracing::info!("sync streams started");

    for handle in handles {
        if handle.join().is_err() {
            return Err(AppError::runtime("sync stream panicked"));
        }
    }

    Ok(())
}
