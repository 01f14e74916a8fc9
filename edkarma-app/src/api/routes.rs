use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use edkarma_core::wire::{ScoresResponse, ScoresUpdate, SummaryRecord, API_KEY_HEADER};
use edkarma_core::{ScoreEntry, ScoreKind, ScoreRepository};

use crate::api::dto::{parse_ids, ScoresQuery};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn ScoreRepository>,
    /// API key -> user name.
    pub api_keys: BTreeMap<String, String>,
}

impl AppState {
    fn authorise(&self, headers: &HeaderMap) -> Result<String, StatusCode> {
        let key = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        match self.api_keys.get(key) {
            Some(user) => Ok(user.clone()),
            None => {
                tracing::warn!("rejected request with unknown API key");
                Err(StatusCode::FORBIDDEN)
            }
        }
    }
}

pub async fn get_scores(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<ScoresQuery>,
) -> Result<Json<ScoresResponse>, StatusCode> {
    st.authorise(&headers)?;
    let posts = parse_ids(q.posts.as_deref()).map_err(|_| StatusCode::BAD_REQUEST)?;
    let replies = parse_ids(q.replies.as_deref()).map_err(|_| StatusCode::BAD_REQUEST)?;

    let mut res = ScoresResponse::default();
    if let Some(ids) = posts {
        res.posts = Some(fetch(&*st.repo, ScoreKind::Post, &ids).await?);
    }
    if let Some(ids) = replies {
        res.replies = Some(fetch(&*st.repo, ScoreKind::Reply, &ids).await?);
    }
    Ok(Json(res))
}

pub async fn put_scores(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    let user = st.authorise(&headers)?;
    let update: ScoresUpdate = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(%user, error = %e, "rejected malformed score update");
        StatusCode::BAD_REQUEST
    })?;

    for (kind, map) in [(ScoreKind::Post, update.posts), (ScoreKind::Reply, update.replies)] {
        let Some(map) = map.filter(|m| !m.is_empty()) else {
            continue;
        };
        let entries: Vec<ScoreEntry> = map.into_values().collect();
        for e in &entries {
            tracing::info!(
                %user,
                table = kind.table(),
                id = e.id,
                user_id = e.user_id,
                user_name = %e.user_name,
                karma = e.karma,
                "writing score"
            );
        }
        st.repo
            .upsert(kind, &entries)
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn summary(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SummaryRecord>>, StatusCode> {
    st.authorise(&headers)?;
    let rows = st
        .repo
        .summary()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(rows.into_iter().map(SummaryRecord::from).collect()))
}

async fn fetch(
    repo: &dyn ScoreRepository,
    kind: ScoreKind,
    ids: &[i64],
) -> Result<Vec<ScoreEntry>, StatusCode> {
    repo.fetch(kind, ids)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
