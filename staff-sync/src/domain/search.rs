use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use shared::types::{EmploymentStatus, StaffRecord};
use tokio::sync::Mutex;

use crate::domain::cache::LocalCache;
use crate::domain::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::domain::client::StaffApi;
use crate::error::StaffSyncError;

/// Free-text query plus an optional employment-status filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    query: String,
    needle: String,
    employment_status: Option<EmploymentStatus>,
}

impl SearchCriteria {
    pub fn new(query: impl AsRef<str>, employment_status: Option<EmploymentStatus>) -> Self {
        let query = query.as_ref().trim().to_owned();
        Self {
            needle: query.to_lowercase(),
            query,
            employment_status,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn employment_status(&self) -> Option<EmploymentStatus> {
        self.employment_status
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.employment_status.is_none()
    }

    /// Query-string parameters for the search endpoint; empty criteria are omitted.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(2);
        if !self.query.is_empty() {
            params.push(("q", self.query.clone()));
        }
        if let Some(status) = self.employment_status {
            params.push(("employment_status", status.to_string()));
        }
        params
    }

    /// Local filtering rule: case-insensitive substring match on name, phone or
    /// national insurance number, and an exact employment-status match when one is set.
    pub fn matches(&self, record: &StaffRecord) -> bool {
        let query_matches = self.needle.is_empty()
            || [
                &record.firstname,
                &record.lastname,
                &record.telephone_number,
                &record.national_insurance_number,
            ]
            .iter()
            .any(|field| !field.is_empty() && field.to_lowercase().contains(&self.needle));

        let status_matches = self
            .employment_status
            .is_none_or(|wanted| record.employment_status == Some(wanted));

        query_matches && status_matches
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Criteria were empty; the filtered view shows every cached record.
    Cleared { matches: usize },
    /// The server's result set is the filtered view.
    Remote { matches: usize },
    /// Remote search failed; the view was filtered locally and `cause` should be shown.
    Fallback {
        matches: usize,
        cause: StaffSyncError,
    },
    /// A newer search started before this one finished; nothing was applied.
    Superseded,
}

impl SearchOutcome {
    pub fn degraded(&self) -> Option<&StaffSyncError> {
        match self {
            Self::Fallback { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Runs server-side search and falls back to local filtering over the cache.
///
/// Each call takes a ticket; only the holder of the latest ticket may write the
/// filtered view, so a slow response cannot overwrite a newer one.
pub struct SearchCoordinator {
    api: Arc<dyn StaffApi>,
    cache: Arc<Mutex<LocalCache>>,
    breaker: Mutex<CircuitBreaker>,
    latest_ticket: AtomicU64,
}

impl SearchCoordinator {
    pub fn new(
        api: Arc<dyn StaffApi>,
        cache: Arc<Mutex<LocalCache>>,
        breaker: CircuitBreakerConfig,
    ) -> Self {
        Self {
            api,
            cache,
            breaker: Mutex::new(CircuitBreaker::new(breaker)),
            latest_ticket: AtomicU64::new(0),
        }
    }

    #[tracing::instrument(
        skip(self, criteria),
        fields(query = criteria.query(), status = ?criteria.employment_status())
    )]
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<SearchOutcome, StaffSyncError> {
        let ticket = self.next_ticket();

        if criteria.is_empty() {
            return Ok(self.clear_with(ticket).await);
        }

        let allowed = self.breaker.lock().await.allow_request();
        let remote = if allowed {
            self.api.search_staff(criteria).await
        } else {
            Err(StaffSyncError::SearchUnavailable)
        };

        match remote {
            Ok(records) => {
                self.breaker.lock().await.record_success();

                let mut cache = self.cache.lock().await;
                if !self.is_current(ticket) {
                    tracing::debug!(ticket, "Discarding superseded remote search result");
                    return Ok(SearchOutcome::Superseded);
                }
                let matches = cache.set_filtered(records);
                tracing::debug!(matches, "Applied remote search result");
                Ok(SearchOutcome::Remote { matches })
            }
            Err(cause) if cause.degrades_search() => {
                if allowed {
                    self.breaker.lock().await.record_failure();
                }
                tracing::warn!(
                    error = %cause,
                    "Remote search failed, falling back to local filtering"
                );

                let mut cache = self.cache.lock().await;
                if !self.is_current(ticket) {
                    tracing::debug!(ticket, "Discarding superseded local search result");
                    return Ok(SearchOutcome::Superseded);
                }
                let matches = cache.apply_filter(|record| criteria.matches(record));
                Ok(SearchOutcome::Fallback { matches, cause })
            }
            Err(e) => Err(e),
        }
    }

    /// Shows every cached record again and invalidates in-flight searches.
    pub async fn clear(&self) -> SearchOutcome {
        let ticket = self.next_ticket();
        self.clear_with(ticket).await
    }

    async fn clear_with(&self, ticket: u64) -> SearchOutcome {
        let mut cache = self.cache.lock().await;
        if !self.is_current(ticket) {
            return SearchOutcome::Superseded;
        }
        cache.clear_filter();
        SearchOutcome::Cleared {
            matches: cache.len(),
        }
    }

    fn next_ticket(&self) -> u64 {
        self.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.latest_ticket.load(Ordering::SeqCst) == ticket
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use shared::responses::{ApiAck, DashboardSummary};
    use shared::types::StaffId;

    use super::*;
    use crate::domain::client::{Download, MockStaffApi};
    use crate::domain::payload::StaffPayload;

    fn record(id: i64, firstname: &str, lastname: &str, status: &str) -> StaffRecord {
        serde_json::from_value(json!({
            "id": id,
            "firstname": firstname,
            "lastname": lastname,
            "telephone_number": format!("0770090{id:04}"),
            "national_insurance_number": format!("QQ{id:06}C"),
            "employment_status": status,
        }))
        .unwrap()
    }

    fn scenario_records() -> Vec<StaffRecord> {
        vec![
            record(1, "Ann", "Lee", "Full-time"),
            record(2, "Bo", "Tan", "Part-time"),
        ]
    }

    async fn cache_with(records: Vec<StaffRecord>) -> Arc<Mutex<LocalCache>> {
        let cache = Arc::new(Mutex::new(LocalCache::new()));
        cache.lock().await.replace_all(records);
        cache
    }

    fn coordinator(
        api: impl StaffApi + 'static,
        cache: Arc<Mutex<LocalCache>>,
    ) -> SearchCoordinator {
        SearchCoordinator::new(Arc::new(api), cache, CircuitBreakerConfig::default())
    }

    async fn filtered_ids(cache: &Arc<Mutex<LocalCache>>) -> Vec<StaffId> {
        cache
            .lock()
            .await
            .filtered()
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }

    fn server_down() -> StaffSyncError {
        StaffSyncError::Server {
            status: 500,
            message: "Internal server error".into(),
        }
    }

    // Local filtering rule

    #[test]
    fn empty_criteria_match_everything() {
        let criteria = SearchCriteria::new("   ", None);
        assert!(criteria.is_empty());
        let records = scenario_records();
        let kept: Vec<_> = records.iter().filter(|r| criteria.matches(r)).collect();
        assert_eq!(kept.len(), records.len());
    }

    #[test]
    fn query_is_case_insensitive_substring() {
        let criteria = SearchCriteria::new("smith", None);
        assert!(criteria.matches(&record(1, "Al", "Smithson", "Contract")));
        assert!(criteria.matches(&record(2, "SMITHY", "Brown", "Contract")));
        assert!(!criteria.matches(&record(3, "Al", "Jones", "Contract")));
    }

    #[test]
    fn query_matches_phone_and_national_insurance_number() {
        let target = record(12, "Al", "Jones", "Contract");
        assert!(SearchCriteria::new("0770090", None).matches(&target));
        assert!(SearchCriteria::new("qq000012", None).matches(&target));
    }

    #[test]
    fn status_filter_excludes_other_statuses_even_when_query_matches() {
        let criteria = SearchCriteria::new("a", Some(EmploymentStatus::PartTime));
        assert!(!criteria.matches(&record(1, "Ann", "Lee", "Full-time")));
        assert!(criteria.matches(&record(2, "Bo", "Tan", "Part-time")));
    }

    #[test]
    fn missing_fields_never_match() {
        let bare: StaffRecord = serde_json::from_value(json!({ "id": 9 })).unwrap();
        assert!(!SearchCriteria::new("a", None).matches(&bare));
        assert!(!SearchCriteria::new("", Some(EmploymentStatus::Intern)).matches(&bare));
    }

    #[test]
    fn query_params_skip_empty_values() {
        assert!(SearchCriteria::default().query_params().is_empty());
        assert_eq!(
            SearchCriteria::new(" lee ", Some(EmploymentStatus::FullTime)).query_params(),
            vec![("q", "lee".to_owned()), ("employment_status", "Full-time".to_owned())]
        );
    }

    // Coordinator

    #[tokio::test]
    async fn empty_criteria_clear_without_remote_call() {
        let cache = cache_with(scenario_records()).await;
        cache.lock().await.apply_filter(|r| r.firstname == "Ann");

        let search = coordinator(MockStaffApi::new(), cache.clone());
        let outcome = search.search(&SearchCriteria::default()).await.unwrap();

        assert_eq!(outcome, SearchOutcome::Cleared { matches: 2 });
        assert_eq!(filtered_ids(&cache).await.len(), 2);
    }

    #[tokio::test]
    async fn remote_result_replaces_view_in_server_order() {
        let cache = cache_with(scenario_records()).await;
        let mut api = MockStaffApi::new();
        api.expect_search_staff()
            .withf(|criteria| criteria.query() == "o")
            .times(1)
            .returning(|_| {
                Ok(vec![
                    record(2, "Bo", "Tan", "Part-time"),
                    record(1, "Ann", "Lee", "Full-time"),
                ])
            });

        let search = coordinator(api, cache.clone());
        let outcome = search.search(&SearchCriteria::new("o", None)).await.unwrap();

        assert_eq!(outcome, SearchOutcome::Remote { matches: 2 });
        assert_eq!(
            filtered_ids(&cache).await,
            vec![StaffId::from(2), StaffId::from(1)]
        );
    }

    #[tokio::test]
    async fn remote_result_shows_server_copies_and_new_records() {
        let cache = cache_with(vec![record(1, "Ann", "Lee", "Full-time")]).await;
        let mut api = MockStaffApi::new();
        api.expect_search_staff().times(1).returning(|_| {
            Ok(vec![
                record(1, "Annabel", "Lee", "Full-time"),
                record(7, "Zed", "Ali", "Intern"),
            ])
        });

        let search = coordinator(api, cache.clone());
        let outcome = search.search(&SearchCriteria::new("a", None)).await.unwrap();

        assert_eq!(outcome, SearchOutcome::Remote { matches: 2 });
        let names: Vec<_> = cache
            .lock()
            .await
            .filtered()
            .iter()
            .map(|r| r.firstname.clone())
            .collect();
        assert_eq!(names, vec!["Annabel", "Zed"]);
    }

    #[tokio::test]
    async fn remote_result_is_shown_before_first_refresh() {
        let cache = Arc::new(Mutex::new(LocalCache::new()));
        let mut api = MockStaffApi::new();
        api.expect_search_staff()
            .returning(|_| Ok(vec![record(2, "Bo", "Tan", "Part-time")]));

        let search = coordinator(api, cache.clone());
        let outcome = search.search(&SearchCriteria::new("bo", None)).await.unwrap();

        assert_eq!(outcome, SearchOutcome::Remote { matches: 1 });
        assert_eq!(filtered_ids(&cache).await, vec![StaffId::from(2)]);
    }

    #[tokio::test]
    async fn failed_remote_search_falls_back_to_substring_filter() {
        let cache = cache_with(scenario_records()).await;
        let mut api = MockStaffApi::new();
        api.expect_search_staff()
            .returning(|_| Err(StaffSyncError::Transport("connection refused".into())));

        let search = coordinator(api, cache.clone());
        let outcome = search.search(&SearchCriteria::new("an", None)).await.unwrap();

        assert_eq!(
            outcome.degraded(),
            Some(&StaffSyncError::Transport("connection refused".into()))
        );
        // "Ann" and "Tan" both contain "an"
        assert_eq!(
            filtered_ids(&cache).await,
            vec![StaffId::from(1), StaffId::from(2)]
        );
    }

    #[tokio::test]
    async fn fallback_applies_status_filter() {
        let cache = cache_with(scenario_records()).await;
        let mut api = MockStaffApi::new();
        api.expect_search_staff().returning(|_| Err(server_down()));

        let search = coordinator(api, cache.clone());
        let outcome = search
            .search(&SearchCriteria::new("", Some(EmploymentStatus::PartTime)))
            .await
            .unwrap();

        assert!(matches!(outcome, SearchOutcome::Fallback { matches: 1, .. }));
        assert_eq!(filtered_ids(&cache).await, vec![StaffId::from(2)]);
    }

    #[tokio::test]
    async fn expired_session_is_propagated_without_fallback() {
        let cache = cache_with(scenario_records()).await;
        cache.lock().await.apply_filter(|r| r.firstname == "Bo");
        let mut api = MockStaffApi::new();
        api.expect_search_staff()
            .returning(|_| Err(StaffSyncError::SessionExpired));

        let search = coordinator(api, cache.clone());
        let err = search.search(&SearchCriteria::new("ann", None)).await.unwrap_err();

        assert_eq!(err, StaffSyncError::SessionExpired);
        assert_eq!(filtered_ids(&cache).await, vec![StaffId::from(2)]);
    }

    #[tokio::test]
    async fn open_breaker_skips_remote_search() {
        let cache = cache_with(scenario_records()).await;
        let mut api = MockStaffApi::new();
        api.expect_search_staff()
            .times(2)
            .returning(|_| Err(server_down()));

        let search = SearchCoordinator::new(
            Arc::new(api),
            cache.clone(),
            CircuitBreakerConfig {
                failure_threshold: 2,
                cooldown_secs: 60,
            },
        );
        let criteria = SearchCriteria::new("lee", None);
        search.search(&criteria).await.unwrap();
        search.search(&criteria).await.unwrap();
        let outcome = search.search(&criteria).await.unwrap();

        assert_eq!(
            outcome,
            SearchOutcome::Fallback {
                matches: 1,
                cause: StaffSyncError::SearchUnavailable,
            }
        );
    }

    /// Search backend whose latency depends on the query, for overlapping searches.
    struct SlowSearchApi;

    #[async_trait]
    impl StaffApi for SlowSearchApi {
        async fn list_staff(&self) -> Result<Vec<StaffRecord>, StaffSyncError> {
            unreachable!()
        }
        async fn get_staff(&self, _id: &StaffId) -> Result<StaffRecord, StaffSyncError> {
            unreachable!()
        }
        async fn search_staff(
            &self,
            criteria: &SearchCriteria,
        ) -> Result<Vec<StaffRecord>, StaffSyncError> {
            let (delay, records) = match criteria.query() {
                "ann" => (100, vec![record(1, "Ann", "Lee", "Full-time")]),
                _ => (10, vec![record(2, "Bo", "Tan", "Part-time")]),
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(records)
        }
        async fn create_staff(&self, _payload: StaffPayload) -> Result<ApiAck, StaffSyncError> {
            unreachable!()
        }
        async fn update_staff(
            &self,
            _id: &StaffId,
            _payload: StaffPayload,
        ) -> Result<ApiAck, StaffSyncError> {
            unreachable!()
        }
        async fn delete_staff(&self, _id: &StaffId) -> Result<ApiAck, StaffSyncError> {
            unreachable!()
        }
        async fn export_staff(&self) -> Result<Download, StaffSyncError> {
            unreachable!()
        }
        async fn download_proof_of_id(&self, _id: &StaffId) -> Result<Download, StaffSyncError> {
            unreachable!()
        }
        async fn dashboard(&self) -> Result<DashboardSummary, StaffSyncError> {
            unreachable!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_does_not_overwrite_newer_search() {
        let cache = cache_with(scenario_records()).await;
        let search = coordinator(SlowSearchApi, cache.clone());

        let slow = SearchCriteria::new("ann", None);
        let fast = SearchCriteria::new("bo", None);
        let (first, second) = tokio::join!(search.search(&slow), search.search(&fast));

        assert_eq!(first.unwrap(), SearchOutcome::Superseded);
        assert_eq!(second.unwrap(), SearchOutcome::Remote { matches: 1 });
        assert_eq!(filtered_ids(&cache).await, vec![StaffId::from(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_invalidates_in_flight_search() {
        let cache = cache_with(scenario_records()).await;
        let search = coordinator(SlowSearchApi, cache.clone());

        let slow = SearchCriteria::new("ann", None);
        let (first, cleared) = tokio::join!(search.search(&slow), search.clear());

        assert_eq!(first.unwrap(), SearchOutcome::Superseded);
        assert_eq!(cleared, SearchOutcome::Cleared { matches: 2 });
        assert_eq!(filtered_ids(&cache).await.len(), 2);
    }
}
