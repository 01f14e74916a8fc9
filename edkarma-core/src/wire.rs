//! JSON bodies exchanged with an Ed Karma server.

use crate::{ScoreEntry, ScoreMap, SummaryRow, UserId};
use serde::{Deserialize, Serialize};

/// Header carrying the caller's API key on every request.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// `GET /scores` response. A list is omitted when it was not requested.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoresResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<Vec<ScoreEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<ScoreEntry>>,
}

/// `PUT /scores` body as sent by the client.
#[derive(Debug, Serialize)]
pub struct ScoresUpdateRef<'a> {
    pub posts: &'a ScoreMap,
    pub replies: &'a ScoreMap,
}

/// `PUT /scores` body as received by the server.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ScoresUpdate {
    #[serde(default)]
    pub posts: Option<ScoreMap>,
    #[serde(default)]
    pub replies: Option<ScoreMap>,
}

/// One `GET /summary` row.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub user_id: UserId,
    pub user_name: String,
    pub posts: u32,
    pub replies: u32,
    pub karma: i64,
}

impl From<SummaryRecord> for SummaryRow {
    fn from(r: SummaryRecord) -> Self {
        SummaryRow {
            id: r.user_id,
            name: r.user_name,
            posts: r.posts,
            replies: r.replies,
            karma: r.karma,
        }
    }
}

impl From<SummaryRow> for SummaryRecord {
    fn from(r: SummaryRow) -> Self {
        SummaryRecord {
            user_id: r.id,
            user_name: r.name,
            posts: r.posts,
            replies: r.replies,
            karma: r.karma,
        }
    }
}
