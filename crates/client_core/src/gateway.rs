//! Transport gateway: every call to the article service goes through here.

use std::{
    error::Error as _,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Client, Method, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::ArticleId,
    error::ErrorBody,
    protocol::{Article, ArticleWrite, Health, SearchHit, LIST_LIMIT, LIST_OFFSET, SEARCH_LIMIT},
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::{ClientSettings, SettingsError},
    error::GatewayError,
};

/// Successful outcome of a call. `Empty` is returned for 204 and zero-length bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Value(T),
    Empty,
}

impl<T> Reply<T> {
    pub fn into_value(self) -> Result<T, GatewayError> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Empty => Err(GatewayError::decode("expected a response body, got none")),
        }
    }
}

#[async_trait]
pub trait ArticleApi: Send + Sync {
    async fn list_articles(&self) -> Result<Vec<Article>, GatewayError>;
    async fn get_article(&self, id: ArticleId) -> Result<Article, GatewayError>;
    async fn create_article(&self, body: &ArticleWrite) -> Result<Article, GatewayError>;
    async fn update_article(
        &self,
        id: ArticleId,
        body: &ArticleWrite,
    ) -> Result<Article, GatewayError>;
    async fn delete_article(&self, id: ArticleId) -> Result<(), GatewayError>;
    async fn search_articles(&self, query: &str) -> Result<Vec<SearchHit>, GatewayError>;
    async fn health(&self) -> Result<Health, GatewayError>;
}

pub struct HttpGateway {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpGateway {
    pub fn new(settings: &ClientSettings) -> Result<Self, SettingsError> {
        settings.base_url()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|source| SettingsError::HttpClient { source })?;

        Ok(Self {
            http,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            timeout: settings.request_timeout(),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|err| GatewayError::network(format!("invalid request url: {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Issues one request and maps it to exactly one terminal outcome.
    /// The timer covers sending and reading the body; on expiry the
    /// in-flight request is dropped, which aborts it.
    pub async fn call<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Reply<T>, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path, query)?;
        let started = Instant::now();
        debug!(%method, path, "issuing request");

        let mut request = self.http.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let exchange = async move {
            let response = request
                .send()
                .await
                .map_err(|err| GatewayError::network(describe_transport_error(&err)))?;
            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|err| GatewayError::network(describe_transport_error(&err)))?;
            Ok::<_, GatewayError>((status, bytes))
        };

        let outcome = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok((status, bytes))) => decode_reply(status, &bytes),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(GatewayError::Timeout {
                after: self.timeout,
            }),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => debug!(%method, path, elapsed_ms, "request completed"),
            Err(err) => warn!(%method, path, elapsed_ms, error = %err, "request failed"),
        }
        outcome
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        self.call::<T, ()>(Method::GET, path, query, None)
            .await?
            .into_value()
    }
}

fn decode_reply<T: DeserializeOwned>(
    status: StatusCode,
    bytes: &[u8],
) -> Result<Reply<T>, GatewayError> {
    if !status.is_success() {
        let body = ErrorBody::from_bytes(bytes);
        let message = if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.message()
        };
        return Err(GatewayError::Http {
            status: status.as_u16(),
            message,
        });
    }

    if status == StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Reply::Empty);
    }

    serde_json::from_slice(bytes)
        .map(Reply::Value)
        .map_err(|err| GatewayError::decode(err.to_string()))
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl ArticleApi for HttpGateway {
    async fn list_articles(&self) -> Result<Vec<Article>, GatewayError> {
        self.get(
            "/articles",
            &[
                ("limit", LIST_LIMIT.to_string()),
                ("offset", LIST_OFFSET.to_string()),
            ],
        )
        .await
    }

    async fn get_article(&self, id: ArticleId) -> Result<Article, GatewayError> {
        self.get(&format!("/articles/{id}"), &[]).await
    }

    async fn create_article(&self, body: &ArticleWrite) -> Result<Article, GatewayError> {
        self.call(Method::POST, "/articles", &[], Some(body))
            .await?
            .into_value()
    }

    async fn update_article(
        &self,
        id: ArticleId,
        body: &ArticleWrite,
    ) -> Result<Article, GatewayError> {
        self.call(Method::PUT, &format!("/articles/{id}"), &[], Some(body))
            .await?
            .into_value()
    }

    async fn delete_article(&self, id: ArticleId) -> Result<(), GatewayError> {
        self.call::<serde_json::Value, ()>(Method::DELETE, &format!("/articles/{id}"), &[], None)
            .await
            .map(|_| ())
    }

    async fn search_articles(&self, query: &str) -> Result<Vec<SearchHit>, GatewayError> {
        self.get(
            "/articles/search",
            &[("q", query.to_string()), ("limit", SEARCH_LIMIT.to_string())],
        )
        .await
    }

    async fn health(&self) -> Result<Health, GatewayError> {
        self.get("/health", &[]).await
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
