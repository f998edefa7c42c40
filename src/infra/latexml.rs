use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use tracing::warn;

use crate::application::render::{ConversionClient, ConversionError};

use super::error::InfraError;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// [`ConversionClient`] that POSTs to LaTeXML daemons over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConversionClient {
    client: Client,
}

impl HttpConversionClient {
    pub fn new() -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn user_agent() -> &'static str {
        concat!("latexml-render/", env!("CARGO_PKG_VERSION"))
    }

    async fn send(&self, host: &str, body: &str, timeout: Duration) -> Result<String, ConversionError> {
        let response = self
            .client
            .post(host)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body.to_owned())
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| classify(host, &err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConversionError::transport(host, format!("HTTP status {status}")));
        }

        response.text().await.map_err(|err| classify(host, &err))
    }
}

#[async_trait]
impl ConversionClient for HttpConversionClient {
    async fn request(
        &self,
        host: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<String, ConversionError> {
        let started_at = Instant::now();
        let result = self.send(host, body, timeout).await;

        match &result {
            Ok(_) => {}
            Err(ConversionError::Timeout { .. }) => warn!(
                target = "infra::latexml",
                op = "latexml::request",
                result = "error",
                error_code = "timeout",
                host,
                post = %body,
                timeout_ms = timeout.as_millis() as u64,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "LaTeXML request timed out"
            ),
            Err(ConversionError::Transport { detail, .. }) => warn!(
                target = "infra::latexml",
                op = "latexml::request",
                result = "error",
                error_code = "no_response",
                host,
                post = %body,
                error = %detail,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "LaTeXML request failed"
            ),
        }

        result
    }
}

fn classify(host: &str, err: &reqwest::Error) -> ConversionError {
    if err.is_timeout() {
        ConversionError::timeout(host)
    } else {
        ConversionError::transport(host, err.to_string())
    }
}
