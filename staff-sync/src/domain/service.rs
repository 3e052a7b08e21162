use std::sync::Arc;

use shared::responses::{ApiAck, DashboardSummary};
use shared::types::{StaffDraft, StaffId, StaffRecord};
use tokio::sync::Mutex;

use crate::domain::cache::LocalCache;
use crate::domain::circuit_breaker::CircuitBreakerConfig;
use crate::domain::client::{Download, StaffApi};
use crate::domain::mutation::MutationPipeline;
use crate::domain::payload::Document;
use crate::domain::search::{SearchCoordinator, SearchCriteria, SearchOutcome};
use crate::error::StaffSyncError;

const EXPORT_FILENAME: &str = "staff_list.xlsx";

/// Entry point for staff screens: keeps the cache in step with the API across
/// listing, search and mutations.
pub struct StaffDirectory {
    api: Arc<dyn StaffApi>,
    cache: Arc<Mutex<LocalCache>>,
    search: SearchCoordinator,
    mutations: MutationPipeline,
}

impl StaffDirectory {
    pub fn new(api: Arc<dyn StaffApi>, search_breaker: CircuitBreakerConfig) -> Self {
        let cache = Arc::new(Mutex::new(LocalCache::new()));
        Self {
            search: SearchCoordinator::new(api.clone(), cache.clone(), search_breaker),
            mutations: MutationPipeline::new(api.clone(), cache.clone()),
            api,
            cache,
        }
    }

    /// Re-lists every record. On failure the cache keeps its previous contents.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Result<usize, StaffSyncError> {
        let records = self.api.list_staff().await?;
        let count = self.cache.lock().await.replace_all(records);
        tracing::debug!(count, "Staff cache refreshed");
        Ok(count)
    }

    pub async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, StaffSyncError> {
        self.search.search(criteria).await
    }

    pub async fn clear_search(&self) -> SearchOutcome {
        self.search.clear().await
    }

    pub async fn create(
        &self,
        draft: StaffDraft,
        document: Option<Document>,
    ) -> Result<ApiAck, StaffSyncError> {
        let ack = self.mutations.create(draft, document).await?;
        self.refresh_after_commit().await;
        Ok(ack)
    }

    pub async fn update(
        &self,
        id: StaffId,
        draft: StaffDraft,
        document: Option<Document>,
    ) -> Result<ApiAck, StaffSyncError> {
        let ack = self.mutations.update(id, draft, document).await?;
        self.refresh_after_commit().await;
        Ok(ack)
    }

    pub async fn delete(&self, id: StaffId) -> Result<ApiAck, StaffSyncError> {
        self.mutations.delete(id).await
    }

    pub async fn fetch(&self, id: &StaffId) -> Result<StaffRecord, StaffSyncError> {
        self.api.get_staff(id).await
    }

    pub async fn export_excel(&self) -> Result<Download, StaffSyncError> {
        let mut download = self.api.export_staff().await?;
        download
            .filename
            .get_or_insert_with(|| EXPORT_FILENAME.to_owned());
        Ok(download)
    }

    /// Downloads the identity document; without a server filename one is built from the
    /// cached name, e.g. `Mary_Ann_Lee_id_proof`.
    pub async fn download_proof_of_id(&self, id: &StaffId) -> Result<Download, StaffSyncError> {
        let mut download = self.api.download_proof_of_id(id).await?;
        if download.filename.is_none() {
            let name = self
                .cache
                .lock()
                .await
                .get(id)
                .map(|record| format!("{}_{}", record.firstname, record.lastname))
                .unwrap_or_else(|| format!("staff_{id}"));
            let name: Vec<&str> = name.split_whitespace().collect();
            download.filename = Some(format!("{}_id_proof", name.join("_")));
        }
        Ok(download)
    }

    /// Company overview. The staff list it carries is informational and does not touch
    /// the cache.
    pub async fn dashboard(&self) -> Result<DashboardSummary, StaffSyncError> {
        let summary = self.api.dashboard().await?;
        tracing::debug!(total_staff = summary.total_staff, "Dashboard loaded");
        Ok(summary)
    }

    pub async fn records(&self) -> Vec<StaffRecord> {
        self.cache.lock().await.all().to_vec()
    }

    pub async fn filtered(&self) -> Vec<StaffRecord> {
        self.cache
            .lock()
            .await
            .filtered()
            .into_iter()
            .cloned()
            .collect()
    }

    async fn refresh_after_commit(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(
                error = %e,
                "Mutation committed but the staff list could not be refreshed"
            );
        }
    }
}
