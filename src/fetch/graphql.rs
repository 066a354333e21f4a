//! GraphQL-backed fetch session.
//!
//! A session is a reqwest client with its own cookie jar. Connecting performs
//! a warm-up page visit so the jar picks up whatever clearance and CSRF
//! cookies the site hands out; every fetch then posts the question query
//! from inside that session.
//!
//! # Error classification
//!
//! | Condition | Error |
//! |-----------|-------|
//! | Warm-up transport error or non-2xx | `Connect` |
//! | HTTP 401 / 403 on the query | `SessionLost` (clearance expired) |
//! | Connection-level transport error | `SessionLost` |
//! | Timeout | `Item` |
//! | HTTP 429, 5xx, other non-2xx | `Item` |
//! | Undecodable response body | `Item` |
//! | `data.question` is `null` | no data (`Ok(None)`) |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use super::{FetchError, FetchSession, RawPayload, SessionFactory};
use crate::user_agent;

/// Default site root.
pub const DEFAULT_BASE_URL: &str = "https://leetcode.com/";

/// Problem page visited to establish the session.
pub const DEFAULT_WARMUP_SLUG: &str = "two-sum";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const READ_TIMEOUT_SECS: u64 = 60;

/// Query sent for every identifier.
pub const QUESTION_QUERY: &str = r"
query questionData($titleSlug: String!) {
  question(titleSlug: $titleSlug) {
    questionId
    questionFrontendId
    title
    titleSlug
    difficulty
    content
    topicTags {
      name
      slug
    }
    stats
    similarQuestions
    hints
    categoryTitle
    isPaidOnly
  }
}
";

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<QuestionData>,
}

#[derive(Debug, Deserialize)]
struct QuestionData {
    #[serde(default)]
    question: Option<RawPayload>,
}

/// Builds [`GraphqlSession`]s against a site root.
#[derive(Debug, Clone)]
pub struct GraphqlSessionFactory {
    base_url: Url,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl GraphqlSessionFactory {
    /// Creates a factory for the given site root (e.g. `https://leetcode.com/`).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Connect`] if `base_url` is not a valid base URL.
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| FetchError::connect(format!("invalid base URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::connect(format!(
                "base URL '{base_url}' cannot be a base"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
        })
    }

    /// Overrides the client timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Returns the site root.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn join(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|e| FetchError::connect(format!("cannot build URL for '{path}': {e}")))
    }
}

#[async_trait]
impl SessionFactory for GraphqlSessionFactory {
    fn name(&self) -> &str {
        "graphql"
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn connect(&self) -> Result<Box<dyn FetchSession>, FetchError> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(user_agent::session_user_agent())
            .connect_timeout(self.connect_timeout)
            .timeout(self.read_timeout)
            .build()
            .map_err(|e| FetchError::connect(format!("client build failed: {e}")))?;

        let warmup_url = self.join(&format!("problems/{DEFAULT_WARMUP_SLUG}/"))?;
        let response = client
            .get(warmup_url.clone())
            .send()
            .await
            .map_err(|e| FetchError::connect(format!("warm-up request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::connect(format!(
                "warm-up returned HTTP {} for {warmup_url}",
                status.as_u16()
            )));
        }
        debug!(status = status.as_u16(), "warm-up passed");

        Ok(Box::new(GraphqlSession {
            client,
            jar,
            base_url: self.base_url.clone(),
            endpoint: self.join("graphql")?,
        }))
    }
}

/// One warmed-up client and its cookie jar.
#[derive(Debug)]
pub struct GraphqlSession {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
    endpoint: Url,
}

impl GraphqlSession {
    fn csrf_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        let cookies = header.to_str().ok()?;
        cookies.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == "csrftoken").then(|| value.to_string())
        })
    }
}

#[async_trait]
impl FetchSession for GraphqlSession {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch(&mut self, identifier: &str) -> Result<Option<RawPayload>, FetchError> {
        let referer = self
            .base_url
            .join(&format!("problems/{identifier}/"))
            .map_err(|e| FetchError::item(identifier, format!("invalid identifier: {e}")))?;

        let body = json!({
            "query": QUESTION_QUERY,
            "variables": { "titleSlug": identifier },
        });

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("Referer", referer.as_str())
            .json(&body);
        if let Some(token) = self.csrf_token() {
            request = request.header("x-csrftoken", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(identifier, &e))?;

        let status = response.status();
        if let Some(error) = classify_status(identifier, status) {
            return Err(error);
        }

        let parsed: GraphqlResponse = response
            .json()
            .await
            .map_err(|e| classify_transport_error(identifier, &e))?;

        Ok(parsed.data.and_then(|data| data.question))
    }
}

fn classify_transport_error(identifier: &str, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() || error.is_decode() {
        FetchError::item(identifier, error.to_string())
    } else {
        FetchError::session_lost(identifier, error.to_string())
    }
}

fn classify_status(identifier: &str, status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }
    let reason = format!("HTTP {}", status.as_u16());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Some(FetchError::session_lost(identifier, reason))
        }
        _ => Some(FetchError::item(identifier, reason)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::FailureDisposition;

    #[test]
    fn test_factory_normalizes_base_path() {
        let factory = GraphqlSessionFactory::new("http://localhost:8080/mirror").unwrap();
        assert_eq!(factory.base_url().as_str(), "http://localhost:8080/mirror/");
        assert_eq!(
            factory.join("graphql").unwrap().as_str(),
            "http://localhost:8080/mirror/graphql"
        );
    }

    #[test]
    fn test_factory_rejects_invalid_base() {
        let error = GraphqlSessionFactory::new("not a url").unwrap_err();
        assert_eq!(error.disposition(), FailureDisposition::RetryConnect);
    }

    #[test]
    fn test_status_forbidden_is_session_fatal() {
        let error = classify_status("two-sum", StatusCode::FORBIDDEN).unwrap();
        assert!(error.is_session_fatal());
    }

    #[test]
    fn test_status_server_error_is_soft() {
        let error = classify_status("two-sum", StatusCode::SERVICE_UNAVAILABLE).unwrap();
        assert_eq!(error.disposition(), FailureDisposition::SoftFailure);

        let error = classify_status("two-sum", StatusCode::TOO_MANY_REQUESTS).unwrap();
        assert_eq!(error.disposition(), FailureDisposition::SoftFailure);
    }

    #[test]
    fn test_status_ok_is_not_an_error() {
        assert!(classify_status("two-sum", StatusCode::OK).is_none());
    }

    #[test]
    fn test_query_requests_all_record_fields() {
        for field in [
            "questionFrontendId",
            "content",
            "topicTags",
            "stats",
            "similarQuestions",
            "hints",
            "categoryTitle",
        ] {
            assert!(QUESTION_QUERY.contains(field), "query missing {field}");
        }
    }
}
