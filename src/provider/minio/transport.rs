//! # S3 Transport Without Certificate Verification
//!
//! `aws-sdk-s3` HTTP client backed by `reqwest`, used when a connection sets
//! `tls.insecure`. The SDK still signs, retries and times out each request; only
//! the wire exchange goes through a client that accepts any server certificate.

use aws_smithy_runtime_api::client::http::{
    HttpClient, HttpConnector, HttpConnectorFuture, HttpConnectorSettings, SharedHttpConnector,
};
use aws_smithy_runtime_api::client::orchestrator::{HttpRequest, HttpResponse};
use aws_smithy_runtime_api::client::result::ConnectorError;
use aws_smithy_runtime_api::client::runtime_components::RuntimeComponents;
use aws_smithy_runtime_api::http::StatusCode;
use aws_smithy_types::body::SdkBody;
use std::time::Duration;

/// Request headers `reqwest` derives from the body itself
const BODY_DERIVED_HEADERS: &[&str] = &["content-length"];

#[derive(Debug, Clone)]
pub struct InsecureHttpClient {
    http: reqwest::Client,
}

impl InsecureHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { http })
    }

    fn prepare(&self, request: &HttpRequest) -> Result<reqwest::RequestBuilder, ConnectorError> {
        let method = reqwest::Method::from_bytes(request.method().as_bytes())
            .map_err(|e| ConnectorError::other(e.into(), None))?;
        let body = request.body().bytes().ok_or_else(|| {
            ConnectorError::other("streaming request bodies are not supported".into(), None)
        })?;

        let mut builder = self.http.request(method, request.uri());
        for (name, value) in request.headers().iter() {
            if BODY_DERIVED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                continue;
            }
            builder = builder.header(name, value);
        }
        Ok(builder.body(body.to_vec()))
    }
}

impl HttpClient for InsecureHttpClient {
    fn http_connector(
        &self,
        _settings: &HttpConnectorSettings,
        _components: &RuntimeComponents,
    ) -> SharedHttpConnector {
        SharedHttpConnector::new(self.clone())
    }
}

impl HttpConnector for InsecureHttpClient {
    fn call(&self, request: HttpRequest) -> HttpConnectorFuture {
        let prepared = self.prepare(&request);
        HttpConnectorFuture::new(async move {
            let response = prepared?.send().await.map_err(connector_error)?;
            into_sdk_response(response).await
        })
    }
}

async fn into_sdk_response(response: reqwest::Response) -> Result<HttpResponse, ConnectorError> {
    let status = StatusCode::try_from(response.status().as_u16())
        .map_err(|e| ConnectorError::other(e.into(), None))?;
    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_owned(), v.to_owned()))
        })
        .collect();
    let body = response.bytes().await.map_err(connector_error)?;

    let mut sdk_response = HttpResponse::new(status, SdkBody::from(body.to_vec()));
    for (name, value) in headers {
        sdk_response
            .headers_mut()
            .try_append(name, value)
            .map_err(|e| ConnectorError::other(e.into(), None))?;
    }
    Ok(sdk_response)
}

fn connector_error(err: reqwest::Error) -> ConnectorError {
    if err.is_timeout() {
        ConnectorError::timeout(err.into())
    } else if err.is_connect() {
        ConnectorError::io(err.into())
    } else {
        ConnectorError::other(err.into(), None)
    }
}
