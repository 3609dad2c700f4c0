use std::future::Future;
use std::time::Duration;

use anyhow::{Context, anyhow};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::query::QueryState;
use crate::session::Session;
use crate::task::{Task, TaskPage};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request {method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {reason}")]
    Status {
        method: Method,
        url: String,
        status: u16,
        reason: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Network-level failure, as opposed to the server rejecting the request
    /// or sending something unreadable.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The three task endpoints the views consume.
pub trait TaskApi {
    fn list_user_tasks(
        &self,
        user_id: &str,
        query: &QueryState,
    ) -> impl Future<Output = Result<TaskPage, ApiError>>;

    fn get_task(&self, task_id: &str) -> impl Future<Output = Result<Task, ApiError>>;

    fn patch_task(
        &self,
        task_id: &str,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<Task, ApiError>>;
}

#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    base: Url,
}

impl HttpTaskApi {
    /// Builds a client whose every request carries the session cookie.
    #[instrument(skip(session), fields(has_cookie = session.cookie.is_some()))]
    pub fn new(base_url: &str, session: &Session, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(base_url.trim())
            .with_context(|| format!("invalid API base URL: {base_url}"))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("API base URL cannot carry a path: {base_url}"));
        }

        let mut headers = HeaderMap::new();
        if let Some(cookie) = session.cookie.as_deref() {
            let mut value = HeaderValue::from_str(cookie)
                .context("session cookie contains characters not allowed in a header")?;
            value.set_sensitive(true);
            headers.insert(header::COOKIE, value);
        } else {
            warn!("no session cookie configured; requests are unauthenticated");
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("failed building HTTP client for task API")?;

        debug!(base = %base, timeout_secs = timeout.as_secs(), "task API client ready");
        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        debug!(method = %method, url = %url, "sending request");

        let response = request.send().await.map_err(|source| ApiError::Transport {
            method: method.clone(),
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                method,
                url: url.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response.text().await.map_err(|source| ApiError::Transport {
            method: method.clone(),
            url: url.to_string(),
            source,
        })?;
        debug!(status = status.as_u16(), bytes = body.len(), "response received");

        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

impl TaskApi for HttpTaskApi {
    #[instrument(skip(self, query), fields(query = %query))]
    async fn list_user_tasks(
        &self,
        user_id: &str,
        query: &QueryState,
    ) -> Result<TaskPage, ApiError> {
        let mut url = self.endpoint(&["tasks", "user", user_id]);
        let qs = query.to_query_string();
        if !qs.is_empty() {
            url.set_query(Some(&qs));
        }
        let request = self.client.get(url.clone());
        self.send(Method::GET, url, request).await
    }

    #[instrument(skip(self))]
    async fn get_task(&self, task_id: &str) -> Result<Task, ApiError> {
        let url = self.endpoint(&["tasks", task_id]);
        let request = self.client.get(url.clone());
        self.send(Method::GET, url, request).await
    }

    #[instrument(skip(self, payload))]
    async fn patch_task(
        &self,
        task_id: &str,
        payload: &serde_json::Value,
    ) -> Result<Task, ApiError> {
        let url = self.endpoint(&["tasks", task_id]);
        // `.json()` sets Content-Type: application/json.
        let request = self.client.patch(url.clone()).json(payload);
        self.send(Method::PATCH, url, request).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::HttpTaskApi;
    use crate::session::Session;

    fn api(base: &str) -> HttpTaskApi {
        HttpTaskApi::new(base, &Session::default(), Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn endpoints_append_to_base_path() {
        let api = api("http://localhost:3000/api/");
        assert_eq!(
            api.endpoint(&["tasks", "user", "123"]).as_str(),
            "http://localhost:3000/api/tasks/user/123"
        );

        let api = self::api("http://localhost:3000");
        assert_eq!(
            api.endpoint(&["tasks", "a b/c"]).as_str(),
            "http://localhost:3000/tasks/a%20b%2Fc"
        );
    }

    #[test]
    fn rejects_non_hierarchical_base() {
        let err = HttpTaskApi::new(
            "mailto:someone@example.com",
            &Session::default(),
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot carry a path"));
    }

    #[test]
    fn rejects_cookie_with_newline() {
        let session = Session {
            user_id: None,
            cookie: Some("a=b\nc".to_string()),
        };
        assert!(HttpTaskApi::new("http://localhost", &session, Duration::from_secs(5)).is_err());
    }
}
