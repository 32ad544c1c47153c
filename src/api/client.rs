use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::AuthGate;
use crate::config::ClientSettings;
use crate::error::{ApiError, AppError, AppResult};
use crate::telemetry::MetricsSnapshot;

use super::types::{CreateTestRequest, LoadTest};

const TESTS: &str = "loadtests";

/// Bearer-authenticated client for the test management endpoints.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    settings: ClientSettings,
    auth: Arc<dyn AuthGate>,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(settings: &ClientSettings, auth: Arc<dyn AuthGate>) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|source| AppError::api(ApiError::BuildClient { source }))?;
        Ok(Self {
            client,
            settings: settings.clone(),
            auth,
        })
    }

    /// `GET /api/v1/loadtests`
    ///
    /// # Errors
    ///
    /// Returns an error on a missing or rejected credential, a non-2xx
    /// status, or an undecodable body.
    pub async fn list_tests(&self) -> AppResult<Vec<LoadTest>> {
        let url = self.endpoint(&[TESTS])?;
        let response = self.send("list tests", self.client.get(url)).await?;
        decode("list tests", response).await
    }

    /// `GET /api/v1/loadtests/{id}`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::list_tests`].
    pub async fn get_test(&self, id: &str) -> AppResult<LoadTest> {
        let url = self.endpoint(&[TESTS, id])?;
        let response = self.send("load test", self.client.get(url)).await?;
        decode("load test", response).await
    }

    /// `POST /api/v1/loadtests`, after local validation.
    ///
    /// # Errors
    ///
    /// Returns a validation error without contacting the service when the
    /// request is incomplete; otherwise see [`ApiClient::list_tests`].
    pub async fn create_test(&self, request: &CreateTestRequest) -> AppResult<LoadTest> {
        request.validate().map_err(AppError::validation)?;
        let url = self.endpoint(&[TESTS])?;
        let response = self
            .send("create test", self.client.post(url).json(request))
            .await?;
        decode("create test", response).await
    }

    /// `POST /api/v1/loadtests/{id}/stop`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::list_tests`].
    pub async fn stop_test(&self, id: &str) -> AppResult<()> {
        let url = self.endpoint(&[TESTS, id, "stop"])?;
        self.send("stop test", self.client.post(url)).await?;
        Ok(())
    }

    /// `GET /api/v1/loadtests/{id}/metrics`: one static snapshot.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::list_tests`].
    pub async fn get_metrics_snapshot(&self, test_id: &str) -> AppResult<MetricsSnapshot> {
        let url = self.endpoint(&[TESTS, test_id, "metrics"])?;
        let response = self.send("fetch metrics", self.client.get(url)).await?;
        decode("fetch metrics", response).await
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        self.settings.api_url(segments).ok_or_else(|| {
            AppError::api(ApiError::InvalidEndpoint {
                url: self.settings.base_url.to_string(),
            })
        })
    }

    async fn send(&self, context: &'static str, request: RequestBuilder) -> AppResult<Response> {
        let token = self
            .auth
            .get()
            .ok_or_else(|| AppError::api(ApiError::MissingCredential))?;
        let response = request.bearer_auth(token).send().await.map_err(|err| {
            AppError::api(ApiError::Request {
                context,
                source: err.without_url(),
            })
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.auth.invalidate();
            return Err(AppError::api(ApiError::Unauthorized));
        }
        if !status.is_success() {
            return Err(AppError::api(ApiError::Status {
                context,
                status: status.as_u16(),
            }));
        }
        tracing::debug!("{} -> {}", context, status);
        Ok(response)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.settings.base_url.as_str())
            .finish_non_exhaustive()
    }
}

async fn decode<T: DeserializeOwned>(context: &'static str, response: Response) -> AppResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|source| AppError::api(ApiError::Decode { context, source }))
}
