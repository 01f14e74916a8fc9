//! Remote score backend: a course's Ed Karma server reached over HTTP.
//!
//! Failures are classified here, at the transport boundary:
//! - host unreachable or `404` -> [`KarmaError::ServerUnavailable`]
//! - `403` -> [`KarmaError::ServerUnauthorised`]
//! - any other unexpected status or an unreadable body -> [`KarmaError::Unknown`]

use async_trait::async_trait;
use edkarma_core::wire::{ScoresResponse, ScoresUpdateRef, SummaryRecord, API_KEY_HEADER};
use edkarma_core::{
    ContributionId, CourseId, KarmaError, RemoteConnector, ScoreBackend, ScoreEntry, ScoreMap,
    Scores, Summary,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Create the shared HTTP client. No request deadline is imposed beyond
/// the transport's own.
pub fn create_client() -> Result<Client, KarmaError> {
    Client::builder()
        .user_agent(concat!("edkarma/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| KarmaError::unknown(format!("http client: {e}")))
}

/// Hands out [`ServerStorage`] instances that share one connection pool.
#[derive(Clone)]
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    pub fn new() -> Result<Self, KarmaError> {
        Ok(Self::with_client(create_client()?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl RemoteConnector for HttpConnector {
    fn connect(
        &self,
        course_id: CourseId,
        base_url: &str,
        api_key: &str,
    ) -> Result<Box<dyn ScoreBackend>, KarmaError> {
        Ok(Box::new(ServerStorage::new(
            self.client.clone(),
            course_id,
            base_url,
            api_key,
        )))
    }
}

/// Score backend bound to one course's server url and API key.
pub struct ServerStorage {
    client: Client,
    course_id: CourseId,
    base_url: String,
    api_key: String,
}

impl ServerStorage {
    pub fn new(client: Client, course_id: CourseId, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            course_id,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, KarmaError> {
        let res = self
            .client
            .get(self.url(endpoint))
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        let res = expect_status(res, StatusCode::OK)?;
        res.json::<T>()
            .await
            .map_err(|e| KarmaError::unknown(format!("malformed response from {endpoint}: {e}")))
    }

    async fn put<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<(), KarmaError> {
        let res = self
            .client
            .put(self.url(endpoint))
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        expect_status(res, StatusCode::NO_CONTENT)?;
        Ok(())
    }
}

fn transport_error(e: reqwest::Error) -> KarmaError {
    KarmaError::ServerUnavailable(e.to_string())
}

fn expect_status(res: Response, expected: StatusCode) -> Result<Response, KarmaError> {
    let status = res.status();
    if status == expected {
        return Ok(res);
    }
    tracing::debug!(url = %res.url(), %status, "karma server rejected request");
    Err(match status {
        StatusCode::FORBIDDEN => KarmaError::ServerUnauthorised,
        StatusCode::NOT_FOUND => KarmaError::ServerUnavailable(format!("{} returned {status}", res.url())),
        other => KarmaError::unknown(format!("unexpected status {other}")),
    })
}

/// A missing list is an empty map, not an error.
fn key_by_id(list: Option<Vec<ScoreEntry>>) -> ScoreMap {
    list.unwrap_or_default().into_iter().map(|e| (e.id, e)).collect()
}

fn join_ids(ids: &[ContributionId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl ScoreBackend for ServerStorage {
    // GET /scores
    async fn get_scores(
        &self,
        post_ids: &[ContributionId],
        reply_ids: &[ContributionId],
    ) -> Result<Scores, KarmaError> {
        let query = [("posts", join_ids(post_ids)), ("replies", join_ids(reply_ids))];
        let res: ScoresResponse = self.get("/scores", &query).await?;

        Ok(Scores {
            posts: key_by_id(res.posts),
            replies: key_by_id(res.replies),
        })
    }

    // PUT /scores
    async fn update_scores(&self, posts: &ScoreMap, replies: &ScoreMap) -> Result<(), KarmaError> {
        tracing::debug!(
            course_id = self.course_id,
            posts = posts.len(),
            replies = replies.len(),
            "pushing scores to server"
        );
        self.put("/scores", &ScoresUpdateRef { posts, replies }).await
    }

    // GET /summary
    async fn get_summary(&self) -> Result<Summary, KarmaError> {
        let rows: Vec<SummaryRecord> = self.get("/summary", &[]).await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.user_id, r.into()))
            .collect())
    }
}
