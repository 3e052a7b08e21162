use async_trait::async_trait;
use shared::responses::{ApiAck, DashboardSummary, LoginResponse};
use shared::types::{StaffId, StaffRecord};

use crate::domain::account::{LoginRequest, NewAccount, PasswordReset};
use crate::domain::payload::StaffPayload;
use crate::domain::search::SearchCriteria;
use crate::error::StaffSyncError;

/// Binary body passed through from the API, with the server-suggested filename if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// Remote staff store. Listing and search results are already normalized.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait]
pub trait StaffApi: Send + Sync {
    async fn list_staff(&self) -> Result<Vec<StaffRecord>, StaffSyncError>;
    async fn get_staff(&self, id: &StaffId) -> Result<StaffRecord, StaffSyncError>;
    async fn search_staff(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<StaffRecord>, StaffSyncError>;
    async fn create_staff(&self, payload: StaffPayload) -> Result<ApiAck, StaffSyncError>;
    async fn update_staff(
        &self,
        id: &StaffId,
        payload: StaffPayload,
    ) -> Result<ApiAck, StaffSyncError>;
    async fn delete_staff(&self, id: &StaffId) -> Result<ApiAck, StaffSyncError>;
    async fn export_staff(&self) -> Result<Download, StaffSyncError>;
    async fn download_proof_of_id(&self, id: &StaffId) -> Result<Download, StaffSyncError>;
    async fn dashboard(&self) -> Result<DashboardSummary, StaffSyncError>;
}

/// Session lifecycle and credential recovery endpoints.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn register(&self, account: &NewAccount) -> Result<ApiAck, StaffSyncError>;
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, StaffSyncError>;
    async fn logout(&self) -> Result<ApiAck, StaffSyncError>;
    async fn forgot_password(&self, email: &str) -> Result<ApiAck, StaffSyncError>;
    async fn reset_password(&self, reset: &PasswordReset) -> Result<ApiAck, StaffSyncError>;
}
