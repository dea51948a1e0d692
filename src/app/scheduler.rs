use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::adapters::hooks::CustomizationHooks;
use crate::adapters::oioi_client::{ClientError, OioiApi, OioiResponse};
use crate::domain::diff::{diff_records, diff_stations, diff_statuses};
use crate::domain::session::ChargeDetailRecord;
use crate::domain::snapshot::{RoamingSnapshot, SnapshotSource};
use crate::domain::station::Station;
use crate::domain::status::ConnectorStatus;

const BACKOFF_BASE: Duration = Duration::from_secs(10);
const BACKOFF_CAP: Duration = Duration::from_secs(900);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStream {
    Stations,
    ConnectorStatus,
    ChargeDetailRecords,
}

impl SyncStream {
    pub fn label(self) -> &'static str {
        match self {
            Self::Stations => "stations",
            Self::ConnectorStatus => "connector-status",
            Self::ChargeDetailRecords => "charge-detail-records",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushFailure {
    pub entity_id: String,
    // None when the request never left the adapter (encoding/caller error).
    pub code: Option<u32>,
    pub message: String,
    pub retryable: bool,
    pub retry_after: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamRunReport {
    pub attempted: usize,
    pub pushed: usize,
    pub failures: Vec<PushFailure>,
}

#[derive(Debug, PartialEq)]
pub enum RunDecision {
    Completed(StreamRunReport),
    Disabled,
    AlreadyRunning,
    BackedOff,
    SnapshotUnavailable(String),
}

struct StreamInner<T> {
    acknowledged: HashMap<String, T>,
    consecutive_failed_runs: u32,
    not_before: Option<Instant>,
}

struct StreamState<T> {
    enabled: AtomicBool,
    inner: Mutex<StreamInner<T>>,
}

impl<T> StreamState<T> {
    fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            inner: Mutex::new(StreamInner {
                acknowledged: HashMap::new(),
                consecutive_failed_runs: 0,
                not_before: None,
            }),
        }
    }
}

pub struct SyncScheduler<S: SnapshotSource, A: OioiApi> {
    source: S,
    client: Arc<A>,
    hooks: CustomizationHooks,
    partner_identifier: String,
    stations: StreamState<Station>,
    statuses: StreamState<ConnectorStatus>,
    records: StreamState<ChargeDetailRecord>,
}

impl<S: SnapshotSource, A: OioiApi> SyncScheduler<S, A> {
    pub fn new(
        source: S,
        client: Arc<A>,
        hooks: CustomizationHooks,
        partner_identifier: impl Into<String>,
    ) -> Self {
        Self {
            source,
            client,
            hooks,
            partner_identifier: partner_identifier.into(),
            stations: StreamState::new(),
            statuses: StreamState::new(),
            records: StreamState::new(),
        }
    }

    pub fn set_station_push_enabled(&self, enabled: bool) {
        self.stations.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn set_status_push_enabled(&self, enabled: bool) {
        self.statuses.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn set_cdr_push_enabled(&self, enabled: bool) {
        self.records.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn run_once(&self, stream: SyncStream) -> RunDecision {
        match stream {
            SyncStream::Stations => self.run_stations_once(),
            SyncStream::ConnectorStatus => self.run_statuses_once(),
            SyncStream::ChargeDetailRecords => self.run_records_once(),
        }
    }

    pub fn run_stations_once(&self) -> RunDecision {
        let mut inner = match begin_run(&self.stations) {
            Ok(guard) => guard,
            Err(decision) => return decision,
        };
        let snapshot = match self.load_snapshot() {
            Ok(snapshot) => snapshot,
            Err(decision) => return decision,
        };

        let diff = diff_stations(&snapshot.stations, &inner.acknowledged);
        let mut report = StreamRunReport {
            attempted: diff.changed.len(),
            ..StreamRunReport::default()
        };

        for station in diff.changed {
            let partner_identifier = self
                .hooks
                .partner_id_for_station(&station, &self.partner_identifier);
            let result = self.client.station_post(&station, &partner_identifier);

            match push_failure(SyncStream::Stations, &station.id, &result) {
                None => {
                    report.pushed += 1;
                    inner.acknowledged.insert(station.id.clone(), station);
                }
                Some(failure) => report.failures.push(failure),
            }
        }

        finish_run(&mut inner, SyncStream::Stations, report)
    }

    pub fn run_statuses_once(&self) -> RunDecision {
        let mut inner = match begin_run(&self.statuses) {
            Ok(guard) => guard,
            Err(decision) => return decision,
        };
        let snapshot = match self.load_snapshot() {
            Ok(snapshot) => snapshot,
            Err(decision) => return decision,
        };

        let diff = diff_statuses(&snapshot.statuses, &inner.acknowledged);
        for (connector_id, error) in &diff.rejected {
            tracing::warn!(
                stream = SyncStream::ConnectorStatus.label(),
                connector_id = %connector_id,
                error = %error,
                "status delta rejected"
            );
        }

        let mut report = StreamRunReport {
            attempted: diff.changed.len(),
            ..StreamRunReport::default()
        };

        for update in diff.changed {
            let partner_identifier = self
                .hooks
                .partner_id_for_connector(&update.connector_id, &self.partner_identifier);
            let result = self.client.connector_post_status(
                &update.connector_id,
                &partner_identifier,
                update.new.status,
            );

            match push_failure(SyncStream::ConnectorStatus, &update.connector_id, &result) {
                None => {
                    report.pushed += 1;
                    inner.acknowledged.insert(
                        update.connector_id.clone(),
                        ConnectorStatus {
                            connector_id: update.connector_id,
                            status: update.new.status,
                            timestamp: update.new.timestamp,
                        },
                    );
                }
                Some(failure) => report.failures.push(failure),
            }
        }

        finish_run(&mut inner, SyncStream::ConnectorStatus, report)
    }

    pub fn run_records_once(&self) -> RunDecision {
        let mut inner = match begin_run(&self.records) {
            Ok(guard) => guard,
            Err(decision) => return decision,
        };
        let snapshot = match self.load_snapshot() {
            Ok(snapshot) => snapshot,
            Err(decision) => return decision,
        };

        let diff = diff_records(&snapshot.records, &inner.acknowledged);
        let mut report = StreamRunReport {
            attempted: diff.changed.len(),
            ..StreamRunReport::default()
        };

        for record in diff.changed {
            let submitted = if record.partner_identifier.is_none() {
                let mut with_partner = record.clone();
                with_partner.partner_identifier = Some(self.partner_identifier.clone());
                with_partner
            } else {
                record.clone()
            };
            let result = self.client.session_post(&submitted);

            match push_failure(SyncStream::ChargeDetailRecords, &record.session_id, &result) {
                None => {
                    report.pushed += 1;
                    // Acknowledge the record as it appears in the snapshot,
                    // so the next diff compares like with like.
                    inner.acknowledged.insert(record.session_id.clone(), record);
                }
                Some(failure) => report.failures.push(failure),
            }
        }

        finish_run(&mut inner, SyncStream::ChargeDetailRecords, report)
    }

    fn load_snapshot(&self) -> Result<RoamingSnapshot, RunDecision> {
        self.source.snapshot().map_err(|error| {
            tracing::warn!(error = %error, "snapshot load failed");
            RunDecision::SnapshotUnavailable(error.to_string())
        })
    }
}

fn begin_run<T>(state: &StreamState<T>) -> Result<MutexGuard<'_, StreamInner<T>>, RunDecision> {
    if !state.enabled.load(Ordering::Relaxed) {
        return Err(RunDecision::Disabled);
    }

    let inner = match state.inner.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => return Err(RunDecision::AlreadyRunning),
    };

    if let Some(not_before) = inner.not_before
        && Instant::now() < not_before
    {
        return Err(RunDecision::BackedOff);
    }

    Ok(inner)
}

fn push_failure(
    stream: SyncStream,
    entity_id: &str,
    result: &Result<OioiResponse, ClientError>,
) -> Option<PushFailure> {
    let failure = match result {
        Ok(response) if response.is_success() => return None,
        Ok(response) => PushFailure {
            entity_id: entity_id.to_string(),
            code: Some(response.code),
            message: response.message.clone(),
            retryable: response.outcome.is_retryable(),
            retry_after: response.retry_after,
        },
        Err(error) => PushFailure {
            entity_id: entity_id.to_string(),
            code: None,
            message: error.to_string(),
            retryable: false,
            retry_after: None,
        },
    };

    tracing::warn!(
        stream = stream.label(),
        entity_id = %failure.entity_id,
        code = failure.code,
        message = %failure.message,
        "push failed"
    );

    Some(failure)
}

fn finish_run<T>(
    inner: &mut StreamInner<T>,
    stream: SyncStream,
    report: StreamRunReport,
) -> RunDecision {
    let retryable = report.failures.iter().any(|failure| failure.retryable);

    if retryable {
        inner.consecutive_failed_runs += 1;
        let hint = report
            .failures
            .iter()
            .filter_map(|failure| failure.retry_after)
            .max();
        let delay = hint.unwrap_or_else(|| exponential_backoff(inner.consecutive_failed_runs));
        inner.not_before = Some(Instant::now() + delay);
        tracing::warn!(
            stream = stream.label(),
            delay_s = delay.as_secs(),
            "stream backing off after retryable failures"
        );
    } else {
        inner.consecutive_failed_runs = 0;
        inner.not_before = None;
    }

    tracing::info!(
        stream = stream.label(),
        attempted = report.attempted,
        pushed = report.pushed,
        failed = report.failures.len(),
        "sync run completed"
    );

    RunDecision::Completed(report)
}

fn exponential_backoff(consecutive_failed_runs: u32) -> Duration {
    let doublings = consecutive_failed_runs.saturating_sub(1).min(16);
    (BACKOFF_BASE * (1_u32 << doublings)).min(BACKOFF_CAP)
}

#[derive(Debug, Clone, Copy)]
pub struct StreamIntervals {
    pub stations: Duration,
    pub statuses: Duration,
    pub records: Duration,
}

pub fn start_streams<S: SnapshotSource, A: OioiApi>(
    scheduler: Arc<SyncScheduler<S, A>>,
    intervals: StreamIntervals,
    stop_flag: Arc<AtomicBool>,
) -> Vec<JoinHandle<()>> {
    vec![
        spawn_stream_loop(
            Arc::clone(&scheduler),
            SyncStream::Stations,
            intervals.stations,
            Arc::clone(&stop_flag),
        ),
        spawn_stream_loop(
            Arc::clone(&scheduler),
            SyncStream::ConnectorStatus,
            intervals.statuses,
            Arc::clone(&stop_flag),
        ),
        spawn_stream_loop(
            scheduler,
            SyncStream::ChargeDetailRecords,
            intervals.records,
            stop_flag,
        ),
    ]
}

fn spawn_stream_loop<S: SnapshotSource, A: OioiApi>(
    scheduler: Arc<SyncScheduler<S, A>>,
    stream: SyncStream,
    interval: Duration,
    stop_flag: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while !stop_flag.load(Ordering::Relaxed) {
            match scheduler.run_once(stream) {
                RunDecision::AlreadyRunning => {
                    tracing::warn!(
                        stream = stream.label(),
                        "previous run still in progress, skipping this fire"
                    );
                }
                RunDecision::Disabled | RunDecision::BackedOff => {
                    tracing::debug!(stream = stream.label(), "run skipped");
                }
                RunDecision::Completed(_) | RunDecision::SnapshotUnavailable(_) => {}
            }
            wait_for_next_tick(interval, &stop_flag);
        }
    })
}

fn wait_for_next_tick(interval: Duration, stop_flag: &AtomicBool) {
    let deadline = Instant::now() + interval;
    while !stop_flag.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(200)));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Condvar, Mutex};
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::{RunDecision, SyncScheduler, exponential_backoff};
    use crate::adapters::hooks::CustomizationHooks;
    use crate::adapters::oioi_client::{
        ClientError, CustomData, OioiApi, OioiResponse,
    };
    use crate::adapters::result_code::classify;
    use crate::domain::session::{ChargeDetailRecord, Identification, IdentifierType, TimeInterval};
    use crate::domain::snapshot::{RoamingSnapshot, SnapshotError, SnapshotSource};
    use crate::domain::station::{Connector, ConnectorType, Station, StationDraft};
    use crate::domain::status::{ConnectorStatus, ConnectorStatusType};

    struct FakeSource {
        snapshot: Mutex<Result<RoamingSnapshot, String>>,
    }

    impl FakeSource {
        fn with(snapshot: RoamingSnapshot) -> Self {
            Self {
                snapshot: Mutex::new(Ok(snapshot)),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                snapshot: Mutex::new(Err(message.to_string())),
            }
        }

        fn set(&self, snapshot: RoamingSnapshot) {
            *self.snapshot.lock().expect("snapshot lock") = Ok(snapshot);
        }
    }

    impl SnapshotSource for Arc<FakeSource> {
        fn snapshot(&self) -> Result<RoamingSnapshot, SnapshotError> {
            self.as_ref()
                .snapshot
                .lock()
                .expect("snapshot lock")
                .clone()
                .map_err(SnapshotError::Read)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Call {
        StationPost(String, String),
        StatusPost(String, ConnectorStatusType),
        SessionPost(String, Option<String>),
    }

    #[derive(Default)]
    struct ScriptedClient {
        calls: Mutex<Vec<Call>>,
        // entity id -> (code, retry-after)
        failures: Mutex<std::collections::HashMap<String, (u32, Option<Duration>)>>,
    }

    impl ScriptedClient {
        fn fail_entity(&self, entity_id: &str, code: u32, retry_after: Option<Duration>) {
            self.failures
                .lock()
                .expect("failures lock")
                .insert(entity_id.to_string(), (code, retry_after));
        }

        fn respond(&self, operation: &str, entity_id: &str) -> OioiResponse {
            let (code, retry_after) = self
                .failures
                .lock()
                .expect("failures lock")
                .get(entity_id)
                .copied()
                .unwrap_or((0, None));
            let message = if code == 0 { "Success." } else { "failed" };

            OioiResponse {
                operation: operation.to_string(),
                correlation_id: "test".to_string(),
                code,
                message: message.to_string(),
                outcome: classify(code),
                timestamp: Utc::now(),
                retry_after,
                custom_data: CustomData::default(),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    impl OioiApi for ScriptedClient {
        fn station_post(
            &self,
            station: &Station,
            partner_identifier: &str,
        ) -> Result<OioiResponse, ClientError> {
            self.calls.lock().expect("calls lock").push(Call::StationPost(
                station.id.clone(),
                partner_identifier.to_string(),
            ));
            Ok(self.respond("station-post", &station.id))
        }

        fn connector_post_status(
            &self,
            connector_id: &str,
            _partner_identifier: &str,
            status: ConnectorStatusType,
        ) -> Result<OioiResponse, ClientError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(Call::StatusPost(connector_id.to_string(), status));
            Ok(self.respond("connector-post-status", connector_id))
        }

        fn session_post(&self, record: &ChargeDetailRecord) -> Result<OioiResponse, ClientError> {
            self.calls.lock().expect("calls lock").push(Call::SessionPost(
                record.session_id.clone(),
                record.partner_identifier.clone(),
            ));
            Ok(self.respond("session-post", &record.session_id))
        }

        fn rfid_verify(&self, rfid: &str) -> Result<OioiResponse, ClientError> {
            Ok(self.respond("rfid-verify", rfid))
        }
    }

    fn station(id: &str) -> Station {
        StationDraft {
            id: id.to_string(),
            name: format!("Station {id}"),
            operator_id: "DE*8PS".to_string(),
            connectors: vec![Connector {
                id: format!("{id}*1"),
                connector_type: ConnectorType::Type2,
                speed_kw: 22.0,
            }],
            ..StationDraft::default()
        }
        .build()
        .expect("draft must build")
    }

    fn status(connector_id: &str, value: ConnectorStatusType, seconds: i64) -> ConnectorStatus {
        ConnectorStatus {
            connector_id: connector_id.to_string(),
            status: value,
            timestamp: Utc.timestamp_opt(seconds, 0).single().expect("valid time"),
        }
    }

    fn record(session_id: &str) -> ChargeDetailRecord {
        ChargeDetailRecord::new(
            session_id,
            Identification {
                identifier: "CAFEBABE".to_string(),
                identifier_type: IdentifierType::Rfid,
                token: None,
            },
            "DE*8PS*E1",
            TimeInterval::new(
                Utc.timestamp_opt(1_000, 0).single().expect("valid time"),
                Some(Utc.timestamp_opt(2_000, 0).single().expect("valid time")),
            )
            .expect("interval must build"),
            None,
            Some(5.0),
            None,
        )
        .expect("record must build")
    }

    fn scheduler(
        snapshot: RoamingSnapshot,
    ) -> (
        Arc<FakeSource>,
        Arc<ScriptedClient>,
        SyncScheduler<Arc<FakeSource>, ScriptedClient>,
    ) {
        let source = Arc::new(FakeSource::with(snapshot));
        let client = Arc::new(ScriptedClient::default());
        let scheduler = SyncScheduler::new(
            Arc::clone(&source),
            Arc::clone(&client),
            CustomizationHooks::default(),
            "partner-1",
        );
        (source, client, scheduler)
    }

    fn completed(decision: RunDecision) -> super::StreamRunReport {
        match decision {
            RunDecision::Completed(report) => report,
            other => panic!("expected a completed run, got {other:?}"),
        }
    }

    #[test]
    fn second_run_without_changes_pushes_nothing() {
        let snapshot = RoamingSnapshot {
            stations: vec![station("DE*8PS*S1"), station("DE*8PS*S2")],
            ..RoamingSnapshot::default()
        };
        let (_source, client, scheduler) = scheduler(snapshot);

        let first = completed(scheduler.run_stations_once());
        assert_eq!(first.attempted, 2);
        assert_eq!(first.pushed, 2);

        let second = completed(scheduler.run_stations_once());
        assert_eq!(second.attempted, 0);
        assert_eq!(client.calls().len(), 2);
    }

    #[test]
    fn per_entity_failure_does_not_abort_the_remaining_entities() {
        let snapshot = RoamingSnapshot {
            stations: vec![station("DE*8PS*S1"), station("DE*8PS*S2")],
            ..RoamingSnapshot::default()
        };
        let (_source, client, scheduler) = scheduler(snapshot);
        client.fail_entity("DE*8PS*S1", 310, None);

        let report = completed(scheduler.run_stations_once());

        assert_eq!(report.attempted, 2);
        assert_eq!(report.pushed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].entity_id, "DE*8PS*S1");
        assert!(!report.failures[0].retryable);

        // Only the failed station is re-attempted next cycle.
        let second = completed(scheduler.run_stations_once());
        assert_eq!(second.attempted, 1);
    }

    #[test]
    fn status_transition_is_pushed_once_and_acknowledged() {
        let snapshot = RoamingSnapshot {
            statuses: vec![status("DE*8PS*E123456", ConnectorStatusType::Available, 1_000)],
            ..RoamingSnapshot::default()
        };
        let (source, client, scheduler) = scheduler(snapshot);

        let first = completed(scheduler.run_statuses_once());
        assert_eq!(first.pushed, 1);

        source.set(RoamingSnapshot {
            statuses: vec![status("DE*8PS*E123456", ConnectorStatusType::Occupied, 1_060)],
            ..RoamingSnapshot::default()
        });

        let second = completed(scheduler.run_statuses_once());
        assert_eq!(second.pushed, 1);

        let third = completed(scheduler.run_statuses_once());
        assert_eq!(third.attempted, 0);

        assert_eq!(
            client.calls(),
            vec![
                Call::StatusPost("DE*8PS*E123456".to_string(), ConnectorStatusType::Available),
                Call::StatusPost("DE*8PS*E123456".to_string(), ConnectorStatusType::Occupied),
            ]
        );
    }

    #[test]
    fn records_without_partner_identifier_get_the_default() {
        let snapshot = RoamingSnapshot {
            records: vec![record("S-1")],
            ..RoamingSnapshot::default()
        };
        let (_source, client, scheduler) = scheduler(snapshot);

        completed(scheduler.run_records_once());

        assert_eq!(
            client.calls(),
            vec![Call::SessionPost(
                "S-1".to_string(),
                Some("partner-1".to_string())
            )]
        );

        // The acknowledged copy matches the snapshot, so nothing re-sends.
        let second = completed(scheduler.run_records_once());
        assert_eq!(second.attempted, 0);
    }

    #[test]
    fn disabled_stream_is_skipped_at_run_time() {
        let snapshot = RoamingSnapshot {
            statuses: vec![status("DE*8PS*E1", ConnectorStatusType::Available, 1_000)],
            ..RoamingSnapshot::default()
        };
        let (_source, client, scheduler) = scheduler(snapshot);

        scheduler.set_status_push_enabled(false);
        assert_eq!(scheduler.run_statuses_once(), RunDecision::Disabled);
        assert!(client.calls().is_empty());

        scheduler.set_status_push_enabled(true);
        let report = completed(scheduler.run_statuses_once());
        assert_eq!(report.pushed, 1);
    }

    #[test]
    fn retryable_failure_backs_off_the_next_cycle() {
        let snapshot = RoamingSnapshot {
            stations: vec![station("DE*8PS*S1")],
            ..RoamingSnapshot::default()
        };
        let (_source, client, scheduler) = scheduler(snapshot);
        client.fail_entity("DE*8PS*S1", 403, Some(Duration::from_secs(60)));

        let report = completed(scheduler.run_stations_once());
        assert!(report.failures[0].retryable);
        assert_eq!(report.failures[0].retry_after, Some(Duration::from_secs(60)));

        assert_eq!(scheduler.run_stations_once(), RunDecision::BackedOff);
    }

    #[test]
    fn permanent_failure_does_not_back_off() {
        let snapshot = RoamingSnapshot {
            stations: vec![station("DE*8PS*S1")],
            ..RoamingSnapshot::default()
        };
        let (_source, client, scheduler) = scheduler(snapshot);
        client.fail_entity("DE*8PS*S1", 240, None);

        completed(scheduler.run_stations_once());
        let second = scheduler.run_stations_once();

        assert_eq!(completed(second).attempted, 1);
    }

    #[test]
    fn snapshot_failure_surfaces_as_a_decision_not_a_panic() {
        let source = Arc::new(FakeSource::failing("disk on fire"));
        let client = Arc::new(ScriptedClient::default());
        let scheduler = SyncScheduler::new(
            Arc::clone(&source),
            Arc::clone(&client),
            CustomizationHooks::default(),
            "partner-1",
        );

        match scheduler.run_stations_once() {
            RunDecision::SnapshotUnavailable(message) => {
                assert!(message.contains("disk on fire"));
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        assert_eq!(exponential_backoff(1), Duration::from_secs(10));
        assert_eq!(exponential_backoff(2), Duration::from_secs(20));
        assert_eq!(exponential_backoff(4), Duration::from_secs(80));
        assert_eq!(exponential_backoff(10), Duration::from_secs(900));
        assert_eq!(exponential_backoff(32), Duration::from_secs(900));
    }

    // Client that parks inside the first status post until released, so a
    // test can observe an in-flight run.
    struct BlockingClient {
        entered: Arc<(Mutex<bool>, Condvar)>,
        release: Arc<(Mutex<bool>, Condvar)>,
        status_calls: AtomicUsize,
    }

    impl BlockingClient {
        fn new() -> Self {
            Self {
                entered: Arc::new((Mutex::new(false), Condvar::new())),
                release: Arc::new((Mutex::new(false), Condvar::new())),
                status_calls: AtomicUsize::new(0),
            }
        }

        fn wait_until_entered(&self) {
            let (lock, condvar) = &*self.entered;
            let mut entered = lock.lock().expect("entered lock");
            while !*entered {
                entered = condvar.wait(entered).expect("entered wait");
            }
        }

        fn release_all(&self) {
            let (lock, condvar) = &*self.release;
            *lock.lock().expect("release lock") = true;
            condvar.notify_all();
        }

        fn ok(&self, operation: &str) -> OioiResponse {
            OioiResponse {
                operation: operation.to_string(),
                correlation_id: "test".to_string(),
                code: 0,
                message: "Success.".to_string(),
                outcome: classify(0),
                timestamp: Utc::now(),
                retry_after: None,
                custom_data: CustomData::default(),
            }
        }
    }

    impl OioiApi for BlockingClient {
        fn station_post(
            &self,
            _station: &Station,
            _partner_identifier: &str,
        ) -> Result<OioiResponse, ClientError> {
            Ok(self.ok("station-post"))
        }

        fn connector_post_status(
            &self,
            _connector_id: &str,
            _partner_identifier: &str,
            _status: ConnectorStatusType,
        ) -> Result<OioiResponse, ClientError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);

            {
                let (lock, condvar) = &*self.entered;
                *lock.lock().expect("entered lock") = true;
                condvar.notify_all();
            }

            let (lock, condvar) = &*self.release;
            let mut released = lock.lock().expect("release lock");
            while !*released {
                released = condvar.wait(released).expect("release wait");
            }

            Ok(self.ok("connector-post-status"))
        }

        fn session_post(&self, _record: &ChargeDetailRecord) -> Result<OioiResponse, ClientError> {
            Ok(self.ok("session-post"))
        }

        fn rfid_verify(&self, _rfid: &str) -> Result<OioiResponse, ClientError> {
            Ok(self.ok("rfid-verify"))
        }
    }

    #[test]
    fn overlapping_fires_run_at_most_one_cycle_per_stream() {
        let snapshot = RoamingSnapshot {
            stations: vec![station("DE*8PS*S1")],
            statuses: vec![status("DE*8PS*E1", ConnectorStatusType::Available, 1_000)],
            ..RoamingSnapshot::default()
        };
        let source = Arc::new(FakeSource::with(snapshot));
        let client = Arc::new(BlockingClient::new());
        let scheduler = Arc::new(SyncScheduler::new(
            Arc::clone(&source),
            Arc::clone(&client),
            CustomizationHooks::default(),
            "partner-1",
        ));

        let background = {
            let scheduler = Arc::clone(&scheduler);
            std::thread::spawn(move || scheduler.run_statuses_once())
        };

        client.wait_until_entered();

        // Second fire for the same stream is refused while the first is
        // mid-flight; an independent stream still runs.
        assert_eq!(scheduler.run_statuses_once(), RunDecision::AlreadyRunning);
        let stations = completed(scheduler.run_stations_once());
        assert_eq!(stations.pushed, 1);

        client.release_all();
        let report = completed(background.join().expect("background run must finish"));
        assert_eq!(report.pushed, 1);
        assert_eq!(client.status_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn partner_id_hooks_select_the_identifier_per_entity() {
        let snapshot = RoamingSnapshot {
            stations: vec![station("DE*8PS*S1")],
            ..RoamingSnapshot::default()
        };
        let source = Arc::new(FakeSource::with(snapshot));
        let client = Arc::new(ScriptedClient::default());
        let hooks = CustomizationHooks {
            station_partner_id: Some(Arc::new(|station: &Station| {
                Some(format!("mapped-{}", station.id))
            })),
            ..CustomizationHooks::default()
        };
        let scheduler = SyncScheduler::new(Arc::clone(&source), Arc::clone(&client), hooks, "partner-1");

        completed(scheduler.run_stations_once());

        assert_eq!(
            client.calls(),
            vec![Call::StationPost(
                "DE*8PS*S1".to_string(),
                "mapped-DE*8PS*S1".to_string()
            )]
        );
    }

    #[test]
    fn all_changed_entities_are_submitted_regardless_of_order() {
        let snapshot = RoamingSnapshot {
            stations: vec![
                station("DE*8PS*S3"),
                station("DE*8PS*S1"),
                station("DE*8PS*S2"),
            ],
            ..RoamingSnapshot::default()
        };
        let (_source, client, scheduler) = scheduler(snapshot);

        completed(scheduler.run_stations_once());

        let pushed: HashSet<String> = client
            .calls()
            .into_iter()
            .map(|call| match call {
                Call::StationPost(id, _) => id,
                other => panic!("unexpected call: {other:?}"),
            })
            .collect();
        assert_eq!(
            pushed,
            HashSet::from([
                "DE*8PS*S1".to_string(),
                "DE*8PS*S2".to_string(),
                "DE*8PS*S3".to_string(),
            ])
        );
    }
}
