use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type CourseId = i64;
pub type ContributionId = i64;
pub type UserId = i64;

pub type ScoreMap = BTreeMap<ContributionId, ScoreEntry>;
pub type Summary = BTreeMap<UserId, SummaryRow>;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Active,
    #[default]
    Archived,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    #[default]
    Local,
    Server,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    #[serde(rename = "type")]
    pub kind: StorageType,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseSettings {
    pub storage: StorageSettings,
}

/// Course metadata and storage settings, without its scores.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
    pub id: CourseId,
    pub code: String,
    pub name: String,
    pub status: CourseStatus,
    pub settings: CourseSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub id: ContributionId,
    pub user_id: UserId,
    pub user_name: String,
    pub karma: i64,
}

impl ScoreEntry {
    pub fn new(id: ContributionId, user_id: UserId, user_name: impl Into<String>, karma: i64) -> Self {
        Self {
            id,
            user_id,
            user_name: user_name.into(),
            karma,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scores {
    #[serde(default)]
    pub posts: ScoreMap,
    #[serde(default)]
    pub replies: ScoreMap,
}

impl Scores {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.replies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.posts.len() + self.replies.len()
    }

    /// Upserts the given entries; ids not mentioned are left untouched.
    pub fn merge(&mut self, posts: &ScoreMap, replies: &ScoreMap) {
        for (id, entry) in posts {
            self.posts.insert(*id, entry.clone());
        }
        for (id, entry) in replies {
            self.replies.insert(*id, entry.clone());
        }
    }

    /// Recorded entries for the requested ids; unknown ids are omitted.
    pub fn select(&self, post_ids: &[ContributionId], reply_ids: &[ContributionId]) -> Scores {
        let pick = |map: &ScoreMap, ids: &[ContributionId]| -> ScoreMap {
            ids.iter()
                .filter_map(|id| map.get(id).map(|e| (*id, e.clone())))
                .collect()
        };
        Scores {
            posts: pick(&self.posts, post_ids),
            replies: pick(&self.replies, reply_ids),
        }
    }

    /// Drops the entries of `pushed` that are still stored unchanged.
    /// Returns how many were dropped.
    pub fn forget(&mut self, pushed: &Scores) -> usize {
        fn drop_same(map: &mut ScoreMap, pushed: &ScoreMap) -> usize {
            let before = map.len();
            map.retain(|id, e| pushed.get(id) != Some(e));
            before - map.len()
        }
        drop_same(&mut self.posts, &pushed.posts) + drop_same(&mut self.replies, &pushed.replies)
    }

    pub fn clear(&mut self) {
        self.posts.clear();
        self.replies.clear();
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryRow {
    pub id: UserId,
    pub name: String,
    pub posts: u32,
    pub replies: u32,
    pub karma: i64,
}

/// One persisted row of the local course table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseRecord {
    pub id: CourseId,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: CourseStatus,
    #[serde(default)]
    pub settings: CourseSettings,
    #[serde(default)]
    pub scores: Scores,
}

impl CourseRecord {
    /// Row created the first time a write touches an unseen course.
    pub fn new(id: CourseId) -> Self {
        Self {
            id,
            code: String::new(),
            name: String::new(),
            status: CourseStatus::Archived,
            settings: CourseSettings::default(),
            scores: Scores::default(),
        }
    }

    pub fn course(&self) -> Course {
        Course {
            id: self.id,
            code: self.code.clone(),
            name: self.name.clone(),
            status: self.status,
            settings: self.settings.clone(),
        }
    }
}
