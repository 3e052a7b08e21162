use std::sync::Arc;

use shared::responses::ApiAck;
use shared::types::{StaffDraft, StaffId};
use tokio::sync::Mutex;

use crate::domain::cache::LocalCache;
use crate::domain::client::StaffApi;
use crate::domain::mutation_state::{
    CommittedMutation, IdleMutation, InFlightMutation, MutationKind,
};
use crate::domain::payload::{Document, StaffPayload, validate_draft};
use crate::error::StaffSyncError;

/// Applies create, update and delete against the remote store.
///
/// Nothing is written to the cache before the server confirms. Only a committed
/// delete touches the cache directly; after create or update the caller re-lists.
/// No retries: a failure is returned as-is and all state is left unchanged.
pub struct MutationPipeline {
    api: Arc<dyn StaffApi>,
    cache: Arc<Mutex<LocalCache>>,
}

impl MutationPipeline {
    pub fn new(api: Arc<dyn StaffApi>, cache: Arc<Mutex<LocalCache>>) -> Self {
        Self { api, cache }
    }

    #[tracing::instrument(skip_all, fields(with_document = document.is_some()))]
    pub async fn create(
        &self,
        draft: StaffDraft,
        document: Option<Document>,
    ) -> Result<ApiAck, StaffSyncError> {
        validate_draft(&draft)?;

        let in_flight = IdleMutation::new(MutationKind::Create).dispatch();
        let result = self
            .api
            .create_staff(StaffPayload::new(draft, document))
            .await;

        let committed = settle(in_flight, result)?;
        Ok(committed.into_ack())
    }

    #[tracing::instrument(skip(self, draft, document), fields(with_document = document.is_some()))]
    pub async fn update(
        &self,
        id: StaffId,
        draft: StaffDraft,
        document: Option<Document>,
    ) -> Result<ApiAck, StaffSyncError> {
        validate_draft(&draft)?;

        let in_flight = IdleMutation::new(MutationKind::Update(id.clone())).dispatch();
        let result = self
            .api
            .update_staff(&id, StaffPayload::new(draft, document))
            .await;

        let committed = settle(in_flight, result)?;
        Ok(committed.into_ack())
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: StaffId) -> Result<ApiAck, StaffSyncError> {
        let in_flight = IdleMutation::new(MutationKind::Delete(id.clone())).dispatch();
        let result = self.api.delete_staff(&id).await;

        let committed = settle(in_flight, result)?;
        let removed = self.cache.lock().await.remove(&id);
        if !removed {
            tracing::debug!(%id, "Deleted record was not cached");
        }
        Ok(committed.into_ack())
    }
}

fn settle(
    in_flight: InFlightMutation,
    result: Result<ApiAck, StaffSyncError>,
) -> Result<CommittedMutation, StaffSyncError> {
    match result {
        Ok(ack) => {
            let committed = in_flight.commit(ack);
            tracing::info!(
                mutation = committed.kind().label(),
                target = ?committed.kind().target(),
                ack_message = committed.ack().message.as_deref(),
                "Staff mutation committed"
            );
            Ok(committed)
        }
        Err(e) => {
            let failed = in_flight.fail(e);
            tracing::warn!(
                mutation = failed.kind().label(),
                target = ?failed.kind().target(),
                error = %failed.error(),
                "Staff mutation failed"
            );
            Err(failed.into_error())
        }
    }
}
