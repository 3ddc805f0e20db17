use reqwest::Client;
use reqwest::header::{
    ACCEPT_ENCODING, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT,
};
use serde::Serialize;
use std::borrow::Cow;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::errors::{UpstreamError, classify_upstream_error, extract_error_message_from_body};
use crate::models::CompletionResponse;
use crate::utils::to_salvo_status;

#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: Client,
    config: Config,
}

impl UpstreamClient {
    pub fn new(config: Config) -> Result<Self, String> {
        let client = Client::builder()
            .build()
            .map_err(|error| format!("failed to initialize upstream HTTP client: {error}"))?;
        Ok(Self { client, config })
    }

    /// Non-streaming completion, used by the connection self-test.
    pub async fn completion<T: Serialize + ?Sized>(
        &self,
        body: &T,
        request_id: &str,
    ) -> Result<CompletionResponse, UpstreamError> {
        let response = self
            .send_request(
                body,
                request_id,
                Some(Duration::from_secs(self.config.request_timeout)),
                "non_stream",
            )
            .await?;

        let status = response.status();
        let content_type = response_content_type(&response);
        let bytes = response.bytes().await.map_err(|error| UpstreamError {
            status: salvo::http::StatusCode::BAD_GATEWAY,
            message: classify_upstream_error(&format!(
                "failed to read upstream response body (status: {status}, content-type: {content_type}): {error}"
            )),
        })?;

        decode_json_body::<CompletionResponse>(status, &content_type, &bytes)
    }

    /// Opens the streaming completion call and hands back the raw response so
    /// the relay can consume its body incrementally. Nothing is buffered here.
    pub async fn completion_stream<T: Serialize + ?Sized>(
        &self,
        body: &T,
        request_id: &str,
    ) -> Result<reqwest::Response, UpstreamError> {
        let stream_timeout = self.config.stream_request_timeout.map(Duration::from_secs);
        self.send_request(body, request_id, stream_timeout, "stream")
            .await
    }

    async fn send_request<T: Serialize + ?Sized>(
        &self,
        body: &T,
        request_id: &str,
        timeout: Option<Duration>,
        request_kind: &'static str,
    ) -> Result<reqwest::Response, UpstreamError> {
        let url = format!(
            "{}/completions",
            self.config.openai_base_url.trim_end_matches('/')
        );

        let mut request_builder = self
            .client
            .post(&url)
            .headers(build_upstream_headers(&self.config, request_id))
            .json(body);

        if let Some(duration) = timeout {
            request_builder = request_builder.timeout(duration);
        }

        debug!(
            phase = "upstream_request_start",
            request_kind,
            request_id,
            url = %url,
            timeout_secs = ?timeout.map(|value| value.as_secs()),
            "Sending upstream completion request"
        );

        let request_started = Instant::now();
        let response = request_builder.send().await.map_err(|error| {
            log_send_stage_error(&error, request_kind, request_id, request_started.elapsed());
            UpstreamError {
                status: salvo::http::StatusCode::BAD_GATEWAY,
                message: classify_upstream_error(&format!("upstream request failed: {error}")),
            }
        })?;

        debug!(
            phase = "upstream_response_headers",
            request_kind,
            request_id,
            status = %response.status(),
            content_type = %response_content_type(&response),
            elapsed_ms = request_started.elapsed().as_millis() as u64,
            "Received upstream response headers"
        );

        if response.status().is_success() {
            return Ok(response);
        }

        handle_http_error_response(response, request_kind, request_id).await
    }
}

const BODY_PREVIEW_LIMIT: usize = 1024;

async fn handle_http_error_response(
    response: reqwest::Response,
    request_kind: &str,
    request_id: &str,
) -> Result<reqwest::Response, UpstreamError> {
    let upstream_status = response.status();
    let status = to_salvo_status(upstream_status);
    let content_type = response_content_type(&response);

    let text = match response.text().await {
        Ok(value) => value,
        Err(error) => {
            warn!(
                phase = "upstream_error_body_read_failed",
                request_kind,
                request_id,
                upstream_status = %upstream_status,
                "Failed to read upstream error response body: {error}"
            );
            String::new()
        }
    };

    warn!(
        phase = "upstream_http_error",
        request_kind,
        request_id,
        status = %status,
        upstream_status = %upstream_status,
        content_type = %content_type,
        body_preview = %preview_text(&text, BODY_PREVIEW_LIMIT),
        "Upstream returned non-success status"
    );

    Err(UpstreamError {
        status,
        message: classify_upstream_error(&extract_error_message_from_body(&text)),
    })
}

fn decode_json_body<T: serde::de::DeserializeOwned>(
    status: reqwest::StatusCode,
    content_type: &str,
    body: &[u8],
) -> Result<T, UpstreamError> {
    serde_json::from_slice::<T>(body).map_err(|error| {
        let body_preview = preview_text(&String::from_utf8_lossy(body), BODY_PREVIEW_LIMIT).into_owned();
        UpstreamError {
            status: salvo::http::StatusCode::BAD_GATEWAY,
            message: classify_upstream_error(&format!(
                "failed to parse upstream JSON response (status: {status}, content-type: {content_type}, body-preview: {body_preview}): {error}"
            )),
        }
    })
}

fn preview_text(text: &str, limit: usize) -> Cow<'_, str> {
    let mut iterator = text.chars();
    let preview: String = iterator.by_ref().take(limit).collect();
    if iterator.next().is_none() {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{preview}...(truncated)"))
    }
}

fn log_send_stage_error(
    error: &reqwest::Error,
    request_kind: &str,
    request_id: &str,
    elapsed: Duration,
) {
    if error.is_timeout() {
        error!(
            phase = "upstream_connect_timeout",
            request_kind,
            request_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "Upstream timeout before response headers"
        );
        return;
    }

    if error.is_connect() {
        error!(
            phase = "upstream_connect_error",
            request_kind,
            request_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "Upstream connection failed before response headers: {error}"
        );
        return;
    }

    error!(
        phase = "upstream_request_error",
        request_kind,
        request_id,
        elapsed_ms = elapsed.as_millis() as u64,
        "Upstream request failed before response headers: {error}"
    );
}

fn response_content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| "<missing>".to_string())
}

fn build_upstream_headers(config: &Config, request_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers.insert(USER_AGENT, HeaderValue::from_static("recipe-relay/0.1.0"));

    if let Ok(auth_value) = HeaderValue::from_str(&format!("Bearer {}", config.openai_api_key)) {
        headers.insert(AUTHORIZATION, auth_value);
    }

    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert("x-request-id", value);
    }

    headers
}
