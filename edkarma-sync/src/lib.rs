use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edkarma_core::{CourseId, CourseRecord, CourseTable, KarmaError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tokio::task;

pub mod paths;

const FILE_VERSION: u32 = 1;

#[derive(Clone, Serialize, Deserialize)]
struct FileImage {
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    courses: BTreeMap<CourseId, CourseRecord>,
}

#[derive(Clone)]
struct State {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    courses: BTreeMap<CourseId, CourseRecord>,
}

impl State {
    fn new_empty() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            courses: BTreeMap::new(),
        }
    }

    fn to_image(&self) -> FileImage {
        FileImage {
            version: FILE_VERSION,
            created_at: self.created_at,
            updated_at: self.updated_at,
            courses: self.courses.clone(),
        }
    }

    fn from_image(img: FileImage) -> Self {
        Self {
            created_at: img.created_at,
            updated_at: img.updated_at,
            courses: img.courses,
        }
    }
}

/// Course table persisted as a single JSON document.
///
/// Rows are held in memory and the whole document is rewritten on every
/// store: written to a temp file, then moved over the original, with a
/// timestamped copy kept in the backups directory. A store only becomes
/// visible to readers once its document is on disk.
pub struct JsonTable {
    path: PathBuf,
    backups_dir: PathBuf,
    max_backups: usize,
    state: RwLock<State>,
    // Held from snapshot until the file is replaced, so documents land in
    // the same order their stores were applied.
    writer: Mutex<()>,
}

impl JsonTable {
    pub async fn open_default() -> Result<Self, KarmaError> {
        let (file, backups) = paths::default_table_file();
        Self::open_with(file, backups, 10).await
    }

    pub async fn open_with(
        path: PathBuf,
        backups_dir: PathBuf,
        max_backups: usize,
    ) -> Result<Self, KarmaError> {
        ensure_parent_dirs(&path)?;
        ensure_dir(&backups_dir)?;
        let max_backups = max_backups.max(1);
        let state = load_or_init(&path, &backups_dir, max_backups).await?;
        tracing::debug!(path = %path.display(), courses = state.courses.len(), "opened course table");
        Ok(Self {
            path,
            backups_dir,
            max_backups,
            state: RwLock::new(state),
            writer: Mutex::new(()),
        })
    }

    async fn persist(&self, img: FileImage) -> Result<(), KarmaError> {
        let path = self.path.clone();
        let backups = self.backups_dir.clone();
        let keep = self.max_backups;

        task::spawn_blocking(move || write_with_backup(&path, &backups, keep, &img))
            .await
            .map_err(KarmaError::sync)?
            .map_err(KarmaError::sync)
    }
}

fn ensure_parent_dirs(path: &Path) -> Result<(), KarmaError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<(), KarmaError> {
    fs::create_dir_all(path).map_err(KarmaError::sync)
}

async fn load_or_init(path: &Path, backups_dir: &Path, keep: usize) -> Result<State, KarmaError> {
    if path.exists() {
        let p = path.to_path_buf();
        let img: FileImage = task::spawn_blocking(move || {
            let buf = fs::read_to_string(&p)?;
            let v = serde_json::from_str::<FileImage>(&buf)?;
            Ok::<FileImage, std::io::Error>(v)
        })
        .await
        .map_err(KarmaError::sync)
        .and_then(|r| r.map_err(KarmaError::sync))?;
        Ok(State::from_image(img))
    } else {
        let st = State::new_empty();
        write_with_backup(path, backups_dir, keep, &st.to_image()).map_err(KarmaError::sync)?;
        Ok(st)
    }
}

/// Only a failure to replace the table file is an error; the backup copy
/// is best effort.
fn write_with_backup(
    path: &Path,
    backups_dir: &Path,
    max_backups: usize,
    img: &FileImage,
) -> Result<(), std::io::Error> {
    let json = serde_json::to_vec_pretty(img)?;
    write_atomic(path, &json)?;

    if let Err(e) = write_backup(backups_dir, max_backups, &json) {
        tracing::warn!(dir = %backups_dir.display(), error = %e, "could not back up course table");
    }
    Ok(())
}

fn write_atomic(path: &Path, json: &[u8]) -> Result<(), std::io::Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(json)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn write_backup(backups_dir: &Path, max_backups: usize, json: &[u8]) -> Result<(), std::io::Error> {
    let ts = Utc::now().format("%Y%m%d-%H%M%S%.3f");
    write_atomic(&backups_dir.join(format!("courses-{ts}.json")), json)?;
    rotate_backups(backups_dir, max_backups)
}

fn rotate_backups(dir: &Path, keep: usize) -> Result<(), std::io::Error> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    // Names embed the timestamp, so lexical order is age order.
    entries.sort_by_key(|e| e.file_name());
    if entries.len() > keep {
        for e in &entries[0..entries.len() - keep] {
            if let Err(err) = fs::remove_file(e.path()) {
                tracing::warn!(file = %e.path().display(), error = %err, "could not remove old backup");
            }
        }
    }
    Ok(())
}

#[async_trait]
impl CourseTable for JsonTable {
    async fn load_all(&self) -> Result<BTreeMap<CourseId, CourseRecord>, KarmaError> {
        Ok(self.state.read().courses.clone())
    }

    async fn load(&self, id: CourseId) -> Result<Option<CourseRecord>, KarmaError> {
        Ok(self.state.read().courses.get(&id).cloned())
    }

    async fn store(&self, record: CourseRecord) -> Result<(), KarmaError> {
        let _writing = self.writer.lock().await;
        let mut next = self.state.read().clone();
        next.courses.insert(record.id, record);
        next.updated_at = Utc::now();

        self.persist(next.to_image()).await?;
        *self.state.write() = next;
        Ok(())
    }
}
