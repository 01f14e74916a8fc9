//! Local backend: course rows kept in the device-synchronized table.
//!
//! Every mutation is a read-modify-write of a single row with no
//! transaction around it, so concurrent writers to the same course
//! resolve as last-write-wins.

use crate::repo::{CourseTable, ScoreBackend};
use crate::{
    summarize, ContributionId, Course, CourseId, CourseRecord, CourseStatus, KarmaError, ScoreMap,
    Scores, StorageType, Summary,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct SyncStorage {
    table: Arc<dyn CourseTable>,
}

impl SyncStorage {
    pub fn new(table: Arc<dyn CourseTable>) -> Self {
        Self { table }
    }

    /// Score operations for a single course.
    pub fn scoped(&self, course_id: CourseId) -> LocalScores {
        LocalScores {
            storage: self.clone(),
            course_id,
        }
    }

    // Courses
    pub async fn get_all_courses(&self) -> Result<BTreeMap<CourseId, Course>, KarmaError> {
        let rows = self.table.load_all().await?;
        Ok(rows.into_iter().map(|(id, r)| (id, r.course())).collect())
    }

    pub async fn get_course_details(&self, course_id: CourseId) -> Result<Option<Course>, KarmaError> {
        Ok(self.table.load(course_id).await?.map(|r| r.course()))
    }

    pub async fn set_course_info(
        &self,
        course_id: CourseId,
        code: &str,
        name: &str,
        status: CourseStatus,
    ) -> Result<(), KarmaError> {
        let mut row = self.load_or_create(course_id).await?;
        row.code = code.to_string();
        row.name = name.to_string();
        row.status = status;
        self.table.store(row).await
    }

    /// Switching to local keeps any server url/key previously saved.
    pub async fn set_course_settings(
        &self,
        course_id: CourseId,
        storage_type: StorageType,
        base_url: &str,
        api_key: &str,
    ) -> Result<(), KarmaError> {
        let mut row = self.load_or_create(course_id).await?;
        let storage = &mut row.settings.storage;
        storage.kind = storage_type;
        if storage_type == StorageType::Server {
            storage.base_url = base_url.to_string();
            storage.api_key = api_key.to_string();
        }
        self.table.store(row).await
    }

    // Scores
    pub async fn get_all_scores(&self, course_id: CourseId) -> Result<Scores, KarmaError> {
        Ok(self
            .table
            .load(course_id)
            .await?
            .map(|r| r.scores)
            .unwrap_or_default())
    }

    pub async fn clear_scores(&self, course_id: CourseId) -> Result<(), KarmaError> {
        let Some(mut row) = self.table.load(course_id).await? else {
            return Ok(());
        };
        row.scores.clear();
        self.table.store(row).await
    }

    /// Removes what a resync pushed. Entries rewritten since the push
    /// was read are kept for the next resync.
    pub async fn forget_synced(&self, course_id: CourseId, pushed: &Scores) -> Result<(), KarmaError> {
        let Some(mut row) = self.table.load(course_id).await? else {
            return Ok(());
        };
        if row.scores.forget(pushed) == 0 {
            return Ok(());
        }
        self.table.store(row).await
    }

    async fn load_or_create(&self, course_id: CourseId) -> Result<CourseRecord, KarmaError> {
        Ok(self
            .table
            .load(course_id)
            .await?
            .unwrap_or_else(|| CourseRecord::new(course_id)))
    }
}

/// The local backend bound to one course.
pub struct LocalScores {
    storage: SyncStorage,
    course_id: CourseId,
}

#[async_trait]
impl ScoreBackend for LocalScores {
    async fn get_scores(
        &self,
        post_ids: &[ContributionId],
        reply_ids: &[ContributionId],
    ) -> Result<Scores, KarmaError> {
        let all = self.storage.get_all_scores(self.course_id).await?;
        Ok(all.select(post_ids, reply_ids))
    }

    async fn update_scores(&self, posts: &ScoreMap, replies: &ScoreMap) -> Result<(), KarmaError> {
        let mut row = self.storage.load_or_create(self.course_id).await?;
        row.scores.merge(posts, replies);
        self.storage.table.store(row).await
    }

    async fn get_summary(&self) -> Result<Summary, KarmaError> {
        let all = self.storage.get_all_scores(self.course_id).await?;
        Ok(summarize(&all))
    }
}
