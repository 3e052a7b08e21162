use std::sync::Arc;

use serde::Serialize;
use shared::responses::{AccountInfo, ApiAck};

use crate::domain::client::AccountApi;
use crate::domain::session::{Credential, SessionGuard};
use crate::error::StaffSyncError;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub company_name: String,
    pub firstname: String,
    pub lastname: String,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub account: NewAccount,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordReset {
    pub email: String,
    pub code: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ResetRequest {
    pub reset: PasswordReset,
    pub confirm_password: String,
}

/// Registration, login/logout and password recovery, with the form checks the API
/// would otherwise reject.
pub struct AccountService {
    api: Arc<dyn AccountApi>,
    session: Arc<dyn SessionGuard>,
}

impl AccountService {
    pub fn new(api: Arc<dyn AccountApi>, session: Arc<dyn SessionGuard>) -> Self {
        Self { api, session }
    }

    #[tracing::instrument(skip_all, fields(email = %request.account.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<ApiAck, StaffSyncError> {
        check_password(&request.account.password, &request.confirm_password)?;
        self.api.register(&request.account).await
    }

    /// Logs in and stores the issued token in the session.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AccountInfo, StaffSyncError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(StaffSyncError::Validation(
                "Email and password are required".to_owned(),
            ));
        }

        let response = self
            .api
            .login(&LoginRequest {
                email: email.trim().to_owned(),
                password: password.to_owned(),
            })
            .await?;

        if response.access_token.trim().is_empty() {
            return Err(StaffSyncError::Transport(
                "Login response did not include an access token".to_owned(),
            ));
        }

        self.session.set(Credential::new(response.access_token));
        tracing::info!("Logged in");
        Ok(response.boss_info.unwrap_or_default())
    }

    /// Ends the session. The local credential is cleared even if the API call fails.
    pub async fn logout(&self) -> Result<(), StaffSyncError> {
        let result = self.api.logout().await;
        self.session.clear();
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Logout request failed, session cleared locally");
                Err(e)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<ApiAck, StaffSyncError> {
        if email.trim().is_empty() {
            return Err(StaffSyncError::Validation("Email is required".to_owned()));
        }
        self.api.forgot_password(email.trim()).await
    }

    #[tracing::instrument(skip_all, fields(email = %request.reset.email))]
    pub async fn reset_password(&self, request: ResetRequest) -> Result<ApiAck, StaffSyncError> {
        check_password(&request.reset.password, &request.confirm_password)?;
        if request.reset.code.trim().is_empty() {
            return Err(StaffSyncError::Validation(
                "Verification code is required".to_owned(),
            ));
        }
        self.api.reset_password(&request.reset).await
    }
}

fn check_password(password: &str, confirm: &str) -> Result<(), StaffSyncError> {
    if password != confirm {
        return Err(StaffSyncError::Validation(
            "Passwords do not match".to_owned(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(StaffSyncError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}
