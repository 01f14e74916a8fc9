use crate::{
    ContributionId, CourseId, CourseRecord, KarmaError, ScoreEntry, ScoreMap, Scores, Summary,
    SummaryRow,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

pub mod memory;
pub use memory::*;

/// Row store underneath the local backend, one row per course.
#[async_trait]
pub trait CourseTable: Send + Sync {
    async fn load_all(&self) -> Result<BTreeMap<CourseId, CourseRecord>, KarmaError>;
    async fn load(&self, id: CourseId) -> Result<Option<CourseRecord>, KarmaError>;
    async fn store(&self, record: CourseRecord) -> Result<(), KarmaError>;
}

/// Score operations served by whichever backend a course is configured for.
#[async_trait]
pub trait ScoreBackend: Send + Sync {
    async fn get_scores(
        &self,
        post_ids: &[ContributionId],
        reply_ids: &[ContributionId],
    ) -> Result<Scores, KarmaError>;
    async fn update_scores(&self, posts: &ScoreMap, replies: &ScoreMap) -> Result<(), KarmaError>;
    async fn get_summary(&self) -> Result<Summary, KarmaError>;
}

/// Builds a remote backend bound to one course's server settings.
pub trait RemoteConnector: Send + Sync {
    fn connect(
        &self,
        course_id: CourseId,
        base_url: &str,
        api_key: &str,
    ) -> Result<Box<dyn ScoreBackend>, KarmaError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScoreKind {
    Post,
    Reply,
}

impl ScoreKind {
    pub fn table(&self) -> &'static str {
        match self {
            ScoreKind::Post => "posts",
            ScoreKind::Reply => "replies",
        }
    }
}

/// Server-side persistence behind the karma HTTP API.
#[async_trait]
pub trait ScoreRepository: Send + Sync {
    async fn fetch(&self, kind: ScoreKind, ids: &[ContributionId]) -> Result<Vec<ScoreEntry>, KarmaError>;
    async fn upsert(&self, kind: ScoreKind, entries: &[ScoreEntry]) -> Result<(), KarmaError>;
    async fn summary(&self) -> Result<Vec<SummaryRow>, KarmaError>;
}
