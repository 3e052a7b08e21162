use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opentelemetry::global;
use opentelemetry::propagation::Injector;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::responses::{ApiAck, DashboardSummary, ErrorBody, LoginResponse};
use shared::types::{StaffId, StaffRecord};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::ClientConfig;
use crate::domain::account::{LoginRequest, NewAccount, PasswordReset};
use crate::domain::client::{AccountApi, Download, StaffApi};
use crate::domain::normalizer::{normalize_dashboard, normalize_list, normalize_one};
use crate::domain::payload::{DOCUMENT_FIELD, Document, StaffPayload};
use crate::domain::search::SearchCriteria;
use crate::domain::session::SessionGuard;
use crate::error::StaffSyncError;

/// How a route treats credentials and a 401 answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Carries the bearer token; 401 means the session expired.
    Authenticated,
    /// The login endpoint; 401 means the credentials were wrong.
    Login,
    /// Registration and password recovery; no token is sent.
    Public,
}

/// HTTP client for the staff API, with read retries, bearer authorization and
/// OpenTelemetry trace propagation.
pub struct HttpStaffClient {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionGuard>,
    read_retries: u32,
}

impl HttpStaffClient {
    pub fn new(
        config: &ClientConfig,
        session: Arc<dyn SessionGuard>,
    ) -> Result<Self, StaffSyncError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| StaffSyncError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            session,
            read_retries: config.read_retries.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        let base_url = &self.base_url;
        format!("{base_url}{path}")
    }

    fn authorize(&self, builder: RequestBuilder, route: Route) -> RequestBuilder {
        let mut headers = header::HeaderMap::new();
        let cx = tracing::Span::current().context();
        global::get_text_map_propagator(|propagator| {
            propagator.inject_context(&cx, &mut HeaderMapInjector(&mut headers));
        });

        let builder = builder.headers(headers);
        match (route, self.session.get()) {
            (Route::Authenticated, Some(credential)) => builder.bearer_auth(credential.token()),
            _ => builder,
        }
    }

    /// Sends once; mutations, search and account calls use this.
    async fn send(
        &self,
        route: Route,
        builder: RequestBuilder,
    ) -> Result<Response, StaffSyncError> {
        let response = self
            .authorize(builder, route)
            .send()
            .await
            .map_err(|e| StaffSyncError::Transport(format!("Request failed: {e}")))?;
        self.check(route, response).await
    }

    /// Sends an idempotent read, retrying connection-level failures with backoff.
    async fn send_read<F>(&self, build: F) -> Result<Response, StaffSyncError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 1..=self.read_retries {
            match self.authorize(build(), Route::Authenticated).send().await {
                Ok(response) => {
                    tracing::debug!(status = %response.status(), attempt, "Staff API responded");
                    return self.check(Route::Authenticated, response).await;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_retries = self.read_retries,
                        error = %e,
                        "Request to staff API failed, retrying"
                    );
                    last_err = Some(e);
                    if attempt < self.read_retries {
                        tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt - 1)))
                            .await;
                    }
                }
            }
        }

        let reason = last_err.map_or_else(|| "no attempt made".to_owned(), |e| e.to_string());
        Err(StaffSyncError::Transport(format!(
            "Failed to reach staff API after {} attempts: {reason}",
            self.read_retries
        )))
    }

    async fn check(&self, route: Route, response: Response) -> Result<Response, StaffSyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let error = error_for_status(route, status, &body);
        if matches!(error, StaffSyncError::SessionExpired) {
            self.session.clear();
        }
        tracing::warn!(%status, error = %error, "Staff API returned an error");
        Err(error)
    }
}

/// Maps a non-success response to the error taxonomy.
///
/// The message comes from the body's `message` or `error` field when present.
pub fn error_for_status(route: Route, status: StatusCode, body: &[u8]) -> StaffSyncError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            )
        });

    match (status, route) {
        (StatusCode::UNAUTHORIZED, Route::Authenticated) => StaffSyncError::SessionExpired,
        (StatusCode::UNAUTHORIZED, Route::Login) => StaffSyncError::InvalidCredentials(message),
        _ => StaffSyncError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

/// Extracts the filename from a `Content-Disposition` header, dropping any directories.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| {
            let (key, raw) = part.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("filename")
                .then(|| raw.trim().trim_matches('"'))
        })
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
}

async fn read_body(response: Response) -> Result<Vec<u8>, StaffSyncError> {
    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|e| StaffSyncError::Transport(format!("Failed to read response body: {e}")))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StaffSyncError> {
    let body = read_body(response).await?;
    serde_json::from_slice(&body)
        .map_err(|e| StaffSyncError::Transport(format!("Failed to deserialize response: {e}")))
}

/// Acknowledgements are informational; an empty or odd body still means success.
async fn read_ack(response: Response) -> Result<ApiAck, StaffSyncError> {
    let body = read_body(response).await?;
    Ok(serde_json::from_slice(&body).unwrap_or_default())
}

async fn read_download(response: Response) -> Result<Download, StaffSyncError> {
    let filename = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(filename_from_disposition);
    let bytes = read_body(response).await?;
    Ok(Download { filename, bytes })
}

fn multipart_form(
    fields: Vec<(&'static str, String)>,
    document: Document,
) -> Result<Form, StaffSyncError> {
    let filename = document.filename().to_owned();
    let content_type = document.content_type();
    let part = Part::bytes(document.into_bytes())
        .file_name(filename)
        .mime_str(content_type)
        .map_err(|e| StaffSyncError::Validation(format!("Invalid document type: {e}")))?;

    let form = fields
        .into_iter()
        .fold(Form::new(), |form, (name, value)| form.text(name, value));
    Ok(form.part(DOCUMENT_FIELD, part))
}

/// Adapter to inject OpenTelemetry trace context into HTTP request headers.
struct HeaderMapInjector<'a>(&'a mut header::HeaderMap);

impl Injector for HeaderMapInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let Ok(name) = header::HeaderName::from_bytes(key.as_bytes())
            && let Ok(val) = header::HeaderValue::from_str(&value)
        {
            self.0.insert(name, val);
        }
    }
}

#[async_trait]
impl StaffApi for HttpStaffClient {
    #[tracing::instrument(skip(self))]
    async fn list_staff(&self) -> Result<Vec<StaffRecord>, StaffSyncError> {
        let url = self.url("/api/staff");
        let response = self.send_read(|| self.client.get(&url)).await?;
        let body: Value = read_json(response).await?;
        Ok(normalize_list(body))
    }

    #[tracing::instrument(skip(self))]
    async fn get_staff(&self, id: &StaffId) -> Result<StaffRecord, StaffSyncError> {
        let url = self.url(&format!("/api/staff/{id}"));
        let response = self.send_read(|| self.client.get(&url)).await?;
        let body: Value = read_json(response).await?;
        normalize_one(body).ok_or_else(|| {
            StaffSyncError::Transport("Unexpected staff record response format".to_owned())
        })
    }

    #[tracing::instrument(skip(self))]
    async fn search_staff(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<StaffRecord>, StaffSyncError> {
        let builder = self
            .client
            .get(self.url("/api/staff/search"))
            .query(&criteria.query_params());
        let response = self.send(Route::Authenticated, builder).await?;
        let body: Value = read_json(response).await?;
        Ok(normalize_list(body))
    }

    #[tracing::instrument(skip_all, fields(with_document = payload.has_document()))]
    async fn create_staff(&self, payload: StaffPayload) -> Result<ApiAck, StaffSyncError> {
        let builder = self.client.post(self.url("/api/staff"));
        let builder = match payload {
            StaffPayload::Structured(draft) => builder.json(&draft),
            StaffPayload::Multipart { fields, document } => {
                builder.multipart(multipart_form(fields, document)?)
            }
        };
        read_ack(self.send(Route::Authenticated, builder).await?).await
    }

    #[tracing::instrument(skip(self, payload), fields(with_document = payload.has_document()))]
    async fn update_staff(
        &self,
        id: &StaffId,
        payload: StaffPayload,
    ) -> Result<ApiAck, StaffSyncError> {
        let builder = match payload {
            StaffPayload::Structured(draft) => self
                .client
                .put(self.url(&format!("/api/staff/{id}")))
                .json(&draft),
            StaffPayload::Multipart { fields, document } => self
                .client
                .put(self.url(&format!("/api/staff/{id}/update-with-file")))
                .multipart(multipart_form(fields, document)?),
        };
        read_ack(self.send(Route::Authenticated, builder).await?).await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_staff(&self, id: &StaffId) -> Result<ApiAck, StaffSyncError> {
        let builder = self.client.delete(self.url(&format!("/api/staff/{id}")));
        read_ack(self.send(Route::Authenticated, builder).await?).await
    }

    #[tracing::instrument(skip(self))]
    async fn export_staff(&self) -> Result<Download, StaffSyncError> {
        let url = self.url("/api/staff/download");
        read_download(self.send_read(|| self.client.get(&url)).await?).await
    }

    #[tracing::instrument(skip(self))]
    async fn download_proof_of_id(&self, id: &StaffId) -> Result<Download, StaffSyncError> {
        let url = self.url(&format!("/api/staff/{id}/download-id"));
        read_download(self.send_read(|| self.client.get(&url)).await?).await
    }

    #[tracing::instrument(skip(self))]
    async fn dashboard(&self) -> Result<DashboardSummary, StaffSyncError> {
        let url = self.url("/api/dashboard");
        let response = self.send_read(|| self.client.get(&url)).await?;
        let body: Value = read_json(response).await?;
        Ok(normalize_dashboard(body))
    }
}

#[async_trait]
impl AccountApi for HttpStaffClient {
    #[tracing::instrument(skip_all)]
    async fn register(&self, account: &NewAccount) -> Result<ApiAck, StaffSyncError> {
        let builder = self.client.post(self.url("/api/register")).json(account);
        read_ack(self.send(Route::Public, builder).await?).await
    }

    #[tracing::instrument(skip_all)]
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, StaffSyncError> {
        let builder = self.client.post(self.url("/api/login")).json(request);
        read_json(self.send(Route::Login, builder).await?).await
    }

    #[tracing::instrument(skip(self))]
    async fn logout(&self) -> Result<ApiAck, StaffSyncError> {
        let builder = self.client.post(self.url("/api/logout"));
        read_ack(self.send(Route::Authenticated, builder).await?).await
    }

    #[tracing::instrument(skip(self))]
    async fn forgot_password(&self, email: &str) -> Result<ApiAck, StaffSyncError> {
        let builder = self
            .client
            .post(self.url("/api/forgot-password"))
            .json(&serde_json::json!({ "email": email }));
        read_ack(self.send(Route::Public, builder).await?).await
    }

    #[tracing::instrument(skip_all)]
    async fn reset_password(&self, reset: &PasswordReset) -> Result<ApiAck, StaffSyncError> {
        let builder = self.client.post(self.url("/api/reset-password")).json(reset);
        read_ack(self.send(Route::Public, builder).await?).await
    }
}
