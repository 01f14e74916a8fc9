use crate::repo::{CourseTable, ScoreKind, ScoreRepository};
use crate::{summarize, ContributionId, CourseId, CourseRecord, KarmaError, ScoreEntry, ScoreMap, Scores, SummaryRow};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-process course table.
#[derive(Default)]
pub struct MemoryTable {
    rows: RwLock<BTreeMap<CourseId, CourseRecord>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: impl IntoIterator<Item = CourseRecord>) -> Self {
        Self {
            rows: RwLock::new(rows.into_iter().map(|r| (r.id, r)).collect()),
        }
    }
}

#[async_trait]
impl CourseTable for MemoryTable {
    async fn load_all(&self) -> Result<BTreeMap<CourseId, CourseRecord>, KarmaError> {
        Ok(self.rows.read().clone())
    }

    async fn load(&self, id: CourseId) -> Result<Option<CourseRecord>, KarmaError> {
        Ok(self.rows.read().get(&id).cloned())
    }

    async fn store(&self, record: CourseRecord) -> Result<(), KarmaError> {
        self.rows.write().insert(record.id, record);
        Ok(())
    }
}

/// In-process score repository for the karma server.
#[derive(Default)]
pub struct MemoryScoreRepo {
    scores: RwLock<Scores>,
}

impl MemoryScoreRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

fn map_for(scores: &Scores, kind: ScoreKind) -> &ScoreMap {
    match kind {
        ScoreKind::Post => &scores.posts,
        ScoreKind::Reply => &scores.replies,
    }
}

#[async_trait]
impl ScoreRepository for MemoryScoreRepo {
    async fn fetch(&self, kind: ScoreKind, ids: &[ContributionId]) -> Result<Vec<ScoreEntry>, KarmaError> {
        let s = self.scores.read();
        let map = map_for(&s, kind);
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    async fn upsert(&self, kind: ScoreKind, entries: &[ScoreEntry]) -> Result<(), KarmaError> {
        let mut s = self.scores.write();
        let map = match kind {
            ScoreKind::Post => &mut s.posts,
            ScoreKind::Reply => &mut s.replies,
        };
        for e in entries {
            map.insert(e.id, e.clone());
        }
        Ok(())
    }

    async fn summary(&self) -> Result<Vec<SummaryRow>, KarmaError> {
        Ok(summarize(&self.scores.read()).into_values().collect())
    }
}
