//! JSON-over-HTTP storage gateway.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::RequestId,
    error::{ApiError, ApiException},
    protocol::{DepositResponse, StatusResponse, StoredRequest},
};
use url::Url;

use crate::{FileUpload, Session, StorageGateway};

pub const FILE_NAME_HEADER: &str = "x-file-name";
const AUTH_SCHEME: &str = "Signature";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

pub struct HttpStorageGateway {
    http: Client,
    base_url: Url,
}

impl HttpStorageGateway {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("invalid gateway url: {base_url}"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(anyhow!("gateway url must start with http:// or https://"));
        }
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("gateway url cannot carry a path: {base_url}"));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build gateway http client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorization(session: &Session) -> Result<String> {
        let signature = session
            .signer()
            .sign(session.address().as_bytes())
            .context("failed to sign gateway request")?;
        Ok(format!(
            "{AUTH_SCHEME} {}:{}",
            session.address(),
            STANDARD.encode(signature)
        ))
    }

    fn authorized(&self, request: RequestBuilder, session: &Session) -> Result<RequestBuilder> {
        Ok(request.header(header::AUTHORIZATION, Self::authorization(session)?))
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        let res = request.send().await.context("gateway request failed")?;
        if res.status().is_success() {
            return Ok(res);
        }

        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        match serde_json::from_str::<ApiError>(&body) {
            Ok(api_error) => Err(ApiException::from(api_error).into()),
            Err(_) => Err(anyhow!("gateway returned HTTP {status}")),
        }
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let res = Self::send(request).await?;
        res.json::<T>()
            .await
            .context("gateway response did not match the expected shape")
    }
}

#[async_trait]
impl StorageGateway for HttpStorageGateway {
    async fn has_deposit(&self, session: &Session) -> Result<bool> {
        let request = self.authorized(
            self.http.get(self.endpoint(&["deposits", session.address()])),
            session,
        )?;
        let body: DepositResponse = Self::send_json(request).await?;
        Ok(body.has_deposit)
    }

    async fn add_deposit(&self, session: &Session) -> Result<()> {
        let request = self.authorized(
            self.http.post(self.endpoint(&["deposits", session.address()])),
            session,
        )?;
        Self::send(request).await?;
        Ok(())
    }

    async fn store(&self, session: &Session, file: FileUpload) -> Result<StoredRequest> {
        let mime_type = file
            .mime_type
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        let request = self.authorized(
            self.http
                .post(self.endpoint(&["upload"]))
                .header(FILE_NAME_HEADER, file.name)
                .header(header::CONTENT_TYPE, mime_type)
                .body(file.bytes),
            session,
        )?;
        Self::send_json(request).await
    }

    async fn status(&self, session: &Session, request_id: &RequestId) -> Result<StatusResponse> {
        let request = self.authorized(
            self.http
                .get(self.endpoint(&["storagerequest", request_id.as_str()])),
            session,
        )?;
        Self::send_json(request).await
    }

    async fn release_deposits(&self, session: &Session) -> Result<()> {
        let request = self.authorized(
            self.http
                .post(self.endpoint(&["deposits", session.address(), "release"])),
            session,
        )?;
        Self::send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
