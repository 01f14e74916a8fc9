use crate::repo::{CourseTable, RemoteConnector, ScoreBackend};
use crate::sync::SyncStorage;
use crate::{
    ContributionId, Course, CourseId, CourseStatus, KarmaError, ScoreEntry, ScoreMap, Scores,
    StorageSettings, StorageType, Summary, UserId,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

/// Which backend serves a course's scores, resolved fresh per operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActiveBackend {
    Local,
    Remote { base_url: String, api_key: String },
}

impl From<&StorageSettings> for ActiveBackend {
    fn from(s: &StorageSettings) -> Self {
        match s.kind {
            StorageType::Local => ActiveBackend::Local,
            StorageType::Server => ActiveBackend::Remote {
                base_url: s.base_url.clone(),
                api_key: s.api_key.clone(),
            },
        }
    }
}

/// Entry point for every caller. Course metadata and settings always live
/// in local storage; scores go wherever the course's settings point.
#[derive(Clone)]
pub struct StoreRouter {
    local: SyncStorage,
    connector: Arc<dyn RemoteConnector>,
}

impl StoreRouter {
    pub fn new(table: Arc<dyn CourseTable>, connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            local: SyncStorage::new(table),
            connector,
        }
    }

    pub fn local(&self) -> &SyncStorage {
        &self.local
    }

    // Courses
    pub async fn get_all_courses(&self) -> Result<BTreeMap<CourseId, Course>, KarmaError> {
        self.local.get_all_courses().await
    }

    pub async fn get_course_details(&self, course_id: CourseId) -> Result<Option<Course>, KarmaError> {
        self.local.get_course_details(course_id).await
    }

    pub async fn set_course_info(
        &self,
        course_id: CourseId,
        code: &str,
        name: &str,
        status: CourseStatus,
    ) -> Result<(), KarmaError> {
        self.local.set_course_info(course_id, code, name, status).await
    }

    pub async fn set_course_settings(
        &self,
        course_id: CourseId,
        storage_type: StorageType,
        base_url: &str,
        api_key: &str,
    ) -> Result<(), KarmaError> {
        if storage_type == StorageType::Server {
            validate_base_url(base_url)?;
        }
        self.local
            .set_course_settings(course_id, storage_type, base_url, api_key)
            .await
    }

    // Scores
    pub async fn get_scores(
        &self,
        course_id: CourseId,
        post_ids: &[ContributionId],
        reply_ids: &[ContributionId],
    ) -> Result<Scores, KarmaError> {
        let backend = self.backend_for(course_id).await?;
        backend.get_scores(post_ids, reply_ids).await
    }

    pub async fn update_scores(
        &self,
        course_id: CourseId,
        posts: &ScoreMap,
        replies: &ScoreMap,
    ) -> Result<(), KarmaError> {
        let active = self.resolve(course_id).await?;
        let result = match &active {
            ActiveBackend::Local => {
                return self.local.scoped(course_id).update_scores(posts, replies).await;
            }
            ActiveBackend::Remote { base_url, api_key } => {
                match self.connector.connect(course_id, base_url, api_key) {
                    Ok(remote) => remote.update_scores(posts, replies).await,
                    Err(e) => Err(e),
                }
            }
        };
        let Err(err) = result else {
            return Ok(());
        };

        tracing::warn!(course_id, error = %err, "remote write failed, saving scores locally");
        self.local.scoped(course_id).update_scores(posts, replies).await?;
        Err(err.into_saved_locally())
    }

    pub async fn update_post(
        &self,
        course_id: CourseId,
        post_id: ContributionId,
        user_id: UserId,
        user_name: &str,
        karma: i64,
    ) -> Result<(), KarmaError> {
        let posts = ScoreMap::from([(post_id, ScoreEntry::new(post_id, user_id, user_name, karma))]);
        self.update_scores(course_id, &posts, &ScoreMap::new()).await
    }

    pub async fn update_reply(
        &self,
        course_id: CourseId,
        reply_id: ContributionId,
        user_id: UserId,
        user_name: &str,
        karma: i64,
    ) -> Result<(), KarmaError> {
        let replies = ScoreMap::from([(reply_id, ScoreEntry::new(reply_id, user_id, user_name, karma))]);
        self.update_scores(course_id, &ScoreMap::new(), &replies).await
    }

    // Summary
    pub async fn get_summary(&self, course_id: CourseId) -> Result<Summary, KarmaError> {
        let backend = self.backend_for(course_id).await?;
        backend.get_summary().await
    }

    // Resync
    /// Pushes every locally held score to the course's server, then drops
    /// the pushed entries locally. Nothing is dropped unless the push
    /// succeeded.
    pub async fn sync_to_server(&self, course_id: CourseId) -> Result<(), KarmaError> {
        let ActiveBackend::Remote { base_url, api_key } = self.resolve(course_id).await? else {
            return Err(KarmaError::CannotSyncLocalStorage(course_id));
        };

        let scores = self.local.get_all_scores(course_id).await?;
        let remote = self.connector.connect(course_id, &base_url, &api_key)?;
        remote.update_scores(&scores.posts, &scores.replies).await?;
        self.local.forget_synced(course_id, &scores).await?;

        tracing::info!(course_id, entries = scores.len(), "synced local scores to server");
        Ok(())
    }

    pub async fn resolve(&self, course_id: CourseId) -> Result<ActiveBackend, KarmaError> {
        let active = self
            .local
            .get_course_details(course_id)
            .await?
            .map(|c| ActiveBackend::from(&c.settings.storage))
            .unwrap_or(ActiveBackend::Local);
        Ok(active)
    }

    async fn backend_for(
        &self,
        course_id: CourseId,
    ) -> Result<Box<dyn ScoreBackend>, KarmaError> {
        let active = self.resolve(course_id).await?;
        tracing::debug!(course_id, backend = active_label(&active), "resolved backend");
        match &active {
            ActiveBackend::Local => Ok(Box::new(self.local.scoped(course_id))),
            ActiveBackend::Remote { base_url, api_key } => {
                self.connector.connect(course_id, base_url, api_key)
            }
        }
    }
}

fn active_label(active: &ActiveBackend) -> &str {
    match active {
        ActiveBackend::Local => "local",
        ActiveBackend::Remote { base_url, .. } => base_url,
    }
}

/// Server storage needs an absolute http(s) url.
pub fn validate_base_url(base_url: &str) -> Result<(), KarmaError> {
    let url = Url::parse(base_url)
        .map_err(|e| KarmaError::Invalid(format!("base url `{base_url}`: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(KarmaError::Invalid(format!(
            "base url must use http or https, not `{other}`"
        ))),
    }
}
