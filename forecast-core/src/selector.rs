use std::fmt;
use tracing::{info, warn};

use crate::{
    error::{FetchError, ForecastError, StoreError},
    fetcher::ForecastSource,
    model::{ForecastRequest, ForecastResponse},
    store::{SaveOutcome, SnapshotId, SnapshotStore},
};

/// Why the live endpoint was not used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    Offline,
    FetchFailed(FetchError),
}

impl FallbackReason {
    /// The headline plus, for a failed fetch, its classified cause.
    pub fn summary(&self) -> String {
        match self {
            FallbackReason::Offline => self.to_string(),
            FallbackReason::FetchFailed(err) => format!("{self} ({err})"),
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Offline => f.write_str("Offline mode requested"),
            FallbackReason::FetchFailed(_) => f.write_str("Network error or API down"),
        }
    }
}

/// The authoritative response for this run and where it came from.
#[derive(Debug)]
pub enum Selection {
    Live {
        response: ForecastResponse,
        saved: Result<SaveOutcome, StoreError>,
    },
    Fallback {
        response: ForecastResponse,
        snapshot: SnapshotId,
        reason: FallbackReason,
    },
}

impl Selection {
    pub fn response(&self) -> &ForecastResponse {
        match self {
            Selection::Live { response, .. } | Selection::Fallback { response, .. } => response,
        }
    }

    pub fn into_response(self) -> ForecastResponse {
        match self {
            Selection::Live { response, .. } | Selection::Fallback { response, .. } => response,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Selection::Live { .. })
    }
}

/// Intermediate state before the hourly check; `Err` is the fatal state.
enum Stage {
    Live(ForecastResponse),
    Fallback(FallbackReason),
}

/// Chooses between the live endpoint and the newest snapshot.
#[derive(Debug)]
pub struct ResponseSelector<'a> {
    source: &'a dyn ForecastSource,
    store: &'a SnapshotStore,
}

impl<'a> ResponseSelector<'a> {
    pub fn new(source: &'a dyn ForecastSource, store: &'a SnapshotStore) -> Self {
        Self { source, store }
    }

    pub async fn select(
        &self,
        request: &ForecastRequest,
        offline: bool,
    ) -> Result<Selection, ForecastError> {
        let stage = if offline {
            info!("offline mode requested, skipping fetch");
            Stage::Fallback(FallbackReason::Offline)
        } else {
            match self.source.fetch(request).await {
                Ok(response) => Stage::Live(response),
                Err(e) => {
                    warn!(error = %e, "fetch failed, falling back to newest backup");
                    Stage::Fallback(FallbackReason::FetchFailed(e))
                }
            }
        };

        match stage {
            Stage::Live(response) => {
                require_hourly(&response)?;
                let saved = self.store.save(&response);
                if let Err(e) = &saved {
                    warn!(error = %e, "could not save backup");
                }
                Ok(Selection::Live { response, saved })
            }
            Stage::Fallback(reason) => {
                let snapshot = match self.store.latest() {
                    Ok(snapshot) => snapshot,
                    Err(source) => {
                        warn!(error = %source, "no usable backup");
                        return Err(ForecastError::NoBackup { reason, source });
                    }
                };
                require_hourly(&snapshot.response)?;
                info!(snapshot = %snapshot.id, "using cached forecast");
                Ok(Selection::Fallback {
                    response: snapshot.response,
                    snapshot: snapshot.id,
                    reason,
                })
            }
        }
    }
}

fn require_hourly(response: &ForecastResponse) -> Result<(), ForecastError> {
    match response.hourly() {
        Some(_) => Ok(()),
        None => Err(ForecastError::MissingData("response has no 'hourly' section".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::{
        collections::BTreeMap,
        fs,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    #[derive(Debug)]
    struct FakeSource {
        result: Result<ForecastResponse, FetchError>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn ok(response: ForecastResponse) -> Self {
            Self { result: Ok(response), calls: AtomicUsize::new(0) }
        }

        fn failing(err: FetchError) -> Self {
            Self { result: Err(err), calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ForecastSource for FakeSource {
        async fn fetch(&self, _: &ForecastRequest) -> Result<ForecastResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn request() -> ForecastRequest {
        ForecastRequest {
            latitude: 52.23,
            longitude: 21.01,
            hourly: vec!["temperature_2m".into()],
            models: "best_match".into(),
            timezone: "Europe/Warsaw".into(),
            extras: BTreeMap::new(),
            timeout: Duration::from_secs(1),
        }
    }

    fn forecast(temp: f64) -> ForecastResponse {
        ForecastResponse::from_value(json!({
            "hourly_units": {"time": "unixtime", "temperature_2m": "°C"},
            "hourly": {"time": [0], "temperature_2m": [temp]}
        }))
        .unwrap()
    }

    fn new_year() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn live_response_is_saved() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().join("backups"));
        let source = FakeSource::ok(forecast(4.0));

        let selection = ResponseSelector::new(&source, &store).select(&request(), false).await.unwrap();

        assert!(selection.is_live());
        assert!(matches!(selection, Selection::Live { saved: Ok(SaveOutcome::Created(_)), .. }));
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.latest().unwrap().response, forecast(4.0));
    }

    #[tokio::test]
    async fn unchanged_live_response_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        store.save_at(&forecast(4.0), new_year()).unwrap();
        let source = FakeSource::ok(forecast(4.0));

        let selection = ResponseSelector::new(&source, &store).select(&request(), false).await.unwrap();

        assert!(matches!(selection, Selection::Live { saved: Ok(SaveOutcome::Unchanged(_)), .. }));
        assert_eq!(store.list().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_to_latest_without_saving() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        store.save_at(&forecast(1.0), new_year()).unwrap();
        store.save_at(&forecast(2.0), new_year() + chrono::Duration::hours(1)).unwrap();
        let source = FakeSource::failing(FetchError::network("connection refused"));

        let selection = ResponseSelector::new(&source, &store).select(&request(), false).await.unwrap();

        assert_eq!(selection.response(), &store.latest().unwrap().response);
        assert_eq!(store.list().len(), 2);
        match selection {
            Selection::Fallback { reason: FallbackReason::FetchFailed(FetchError::Network { .. }), .. } => {}
            other => panic!("unexpected selection: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_parameter_is_recovered_by_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        store.save_at(&forecast(1.0), new_year()).unwrap();
        let source = FakeSource::failing(FetchError::InvalidParameter {
            parameter: "xyz".into(),
            query_key: Some("hourly".into()),
        });

        let selection = ResponseSelector::new(&source, &store).select(&request(), false).await.unwrap();

        let Selection::Fallback { reason, .. } = selection else { panic!("expected fallback") };
        assert_eq!(reason.to_string(), "Network error or API down");
        assert!(matches!(reason, FallbackReason::FetchFailed(FetchError::InvalidParameter { ref parameter, .. }) if parameter == "xyz"));
    }

    #[tokio::test]
    async fn fetch_failure_with_empty_store_is_no_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().join("absent"));
        let source = FakeSource::failing(FetchError::Api { reason: "down".into() });

        let err = ResponseSelector::new(&source, &store).select(&request(), false).await.unwrap_err();

        assert!(matches!(
            err,
            ForecastError::NoBackup { source: StoreError::NotFound(_), .. }
        ));
    }

    #[tokio::test]
    async fn offline_skips_fetch_and_returns_snapshot_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        store.save_at(&forecast(7.5), new_year()).unwrap();
        let source = FakeSource::ok(forecast(99.0));

        let selection = ResponseSelector::new(&source, &store).select(&request(), true).await.unwrap();

        assert_eq!(source.calls(), 0);
        assert_eq!(store.list().len(), 1);
        match selection {
            Selection::Fallback { response, snapshot, reason } => {
                assert_eq!(response, forecast(7.5));
                assert_eq!(snapshot.file_name(), "forecast_20240101_000000.json");
                assert_eq!(reason, FallbackReason::Offline);
            }
            other => panic!("unexpected selection: {other:?}"),
        }
    }

    #[tokio::test]
    async fn live_response_without_hourly_is_missing_data_and_not_saved() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let bare = ForecastResponse::from_value(json!({"latitude": 52.0})).unwrap();
        let source = FakeSource::ok(bare);

        let err = ResponseSelector::new(&source, &store).select(&request(), false).await.unwrap_err();

        assert!(matches!(err, ForecastError::MissingData(_)));
        assert!(store.list().is_empty());
    }

    #[tokio::test]
    async fn snapshot_without_hourly_is_missing_data() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("forecast_20240101_000000.json"), br#"{"latitude":52.0}"#).unwrap();
        let store = SnapshotStore::new(tmp.path());
        let source = FakeSource::ok(forecast(1.0));

        let err = ResponseSelector::new(&source, &store).select(&request(), true).await.unwrap_err();

        assert!(matches!(err, ForecastError::MissingData(_)));
    }

    #[tokio::test]
    async fn corrupt_latest_is_no_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        store.save_at(&forecast(1.0), new_year()).unwrap();
        fs::write(tmp.path().join("forecast_20240102_000000.json"), b"not json").unwrap();
        let source = FakeSource::failing(FetchError::network("dns"));

        let err = ResponseSelector::new(&source, &store).select(&request(), false).await.unwrap_err();

        assert!(matches!(
            err,
            ForecastError::NoBackup { source: StoreError::Corrupt { .. }, .. }
        ));
    }

    #[tokio::test]
    async fn no_backup_error_keeps_the_fetch_diagnostic() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().join("absent"));
        let source = FakeSource::failing(FetchError::InvalidParameter {
            parameter: "xyz".into(),
            query_key: Some("hourly".into()),
        });

        let err = ResponseSelector::new(&source, &store).select(&request(), false).await.unwrap_err();

        let msg = format!("{:#}", anyhow::Error::from(err));
        assert!(msg.contains("Network error or API down"), "{msg}");
        assert!(msg.contains("'xyz'"), "{msg}");
        assert!(msg.contains("No backups available"), "{msg}");
    }

    #[tokio::test]
    async fn offline_with_empty_store_says_offline() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let source = FakeSource::ok(forecast(1.0));

        let err = ResponseSelector::new(&source, &store).select(&request(), true).await.unwrap_err();

        assert!(matches!(err, ForecastError::NoBackup { reason: FallbackReason::Offline, .. }));
        assert!(err.to_string().starts_with("Offline mode requested. No usable backup"));
        assert_eq!(source.calls(), 0);
    }
}
