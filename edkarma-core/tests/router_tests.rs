use async_trait::async_trait;
use edkarma_core::{
    ContributionId, CourseId, CourseRecord, CourseStatus, CourseTable, ErrorKind, KarmaError,
    MemoryTable, RemoteConnector, ScoreBackend, ScoreEntry, ScoreMap, Scores, StorageSettings,
    StorageType, StoreRouter, Summary, SyncStorage,
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const COURSE: CourseId = 42;

#[derive(Default)]
struct FakeServer {
    scores: RwLock<Scores>,
    fail_with: Mutex<Option<ErrorKind>>,
    connects: AtomicUsize,
    writes: AtomicUsize,
    /// Local storage written to while a push is in flight.
    write_during_push: Mutex<Option<SyncStorage>>,
}

impl FakeServer {
    fn failing(kind: ErrorKind) -> Arc<Self> {
        let s = Arc::new(Self::default());
        *s.fail_with.lock() = Some(kind);
        s
    }

    fn recover(&self) {
        *self.fail_with.lock() = None;
    }

    fn check(&self) -> Result<(), KarmaError> {
        match *self.fail_with.lock() {
            None => Ok(()),
            Some(ErrorKind::ServerUnavailable) => Err(KarmaError::ServerUnavailable("refused".into())),
            Some(ErrorKind::ServerUnauthorised) => Err(KarmaError::ServerUnauthorised),
            Some(_) => Err(KarmaError::unknown("status 500")),
        }
    }
}

struct FakeRemote(Arc<FakeServer>);

#[async_trait]
impl ScoreBackend for FakeRemote {
    async fn get_scores(&self, post_ids: &[ContributionId], reply_ids: &[ContributionId]) -> Result<Scores, KarmaError> {
        self.0.check()?;
        Ok(self.0.scores.read().select(post_ids, reply_ids))
    }

    async fn update_scores(&self, posts: &ScoreMap, replies: &ScoreMap) -> Result<(), KarmaError> {
        self.0.check()?;
        let local = self.0.write_during_push.lock().take();
        if let Some(local) = local {
            let late = ScoreMap::from([(99, entry(99, 12, 1))]);
            local.scoped(COURSE).update_scores(&late, &ScoreMap::new()).await?;
        }
        self.0.writes.fetch_add(1, Ordering::SeqCst);
        self.0.scores.write().merge(posts, replies);
        Ok(())
    }

    async fn get_summary(&self) -> Result<Summary, KarmaError> {
        self.0.check()?;
        Ok(edkarma_core::summarize(&self.0.scores.read()))
    }
}

struct FakeConnector(Arc<FakeServer>);

impl RemoteConnector for FakeConnector {
    fn connect(&self, _course_id: CourseId, base_url: &str, api_key: &str) -> Result<Box<dyn ScoreBackend>, KarmaError> {
        assert_eq!(base_url, "https://karma.example.edu");
        assert_eq!(api_key, "secret");
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeRemote(self.0.clone())))
    }
}

fn router(server: &Arc<FakeServer>) -> StoreRouter {
    StoreRouter::new(Arc::new(MemoryTable::new()), Arc::new(FakeConnector(server.clone())))
}

async fn server_course(r: &StoreRouter) {
    r.set_course_info(COURSE, "COMP1511", "Programming Fundamentals", CourseStatus::Active)
        .await
        .unwrap();
    r.set_course_settings(COURSE, StorageType::Server, "https://karma.example.edu", "secret")
        .await
        .unwrap();
}

fn entry(id: ContributionId, user_id: i64, karma: i64) -> ScoreEntry {
    ScoreEntry::new(id, user_id, format!("user{user_id}"), karma)
}

#[tokio::test]
async fn local_course_never_connects_to_server() {
    let server = Arc::new(FakeServer::default());
    let r = router(&server);
    r.set_course_info(COURSE, "COMP1511", "Fundamentals", CourseStatus::Active).await.unwrap();

    r.update_post(COURSE, 5, 10, "Ada", 3).await.unwrap();
    r.update_reply(COURSE, 6, 11, "Bob", 2).await.unwrap();
    let scores = r.get_scores(COURSE, &[5], &[6]).await.unwrap();
    r.get_summary(COURSE).await.unwrap();

    assert_eq!(scores.posts[&5], ScoreEntry::new(5, 10, "Ada", 3));
    assert_eq!(scores.replies[&6], ScoreEntry::new(6, 11, "Bob", 2));
    assert_eq!(server.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_course_resolves_to_local_storage() {
    let server = Arc::new(FakeServer::default());
    let r = router(&server);

    let scores = r.get_scores(7, &[1], &[2]).await.unwrap();

    assert!(scores.is_empty());
    assert!(r.get_course_details(7).await.unwrap().is_none());
    assert_eq!(server.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn local_round_trip() {
    let server = Arc::new(FakeServer::default());
    let r = router(&server);
    let posts = ScoreMap::from([(5, entry(5, 10, 4))]);

    r.update_scores(COURSE, &posts, &ScoreMap::new()).await.unwrap();
    let got = r.get_scores(COURSE, &[5], &[]).await.unwrap();

    assert_eq!(got, Scores { posts, replies: ScoreMap::new() });
}

#[tokio::test]
async fn server_course_reads_and_writes_remotely() {
    let server = Arc::new(FakeServer::default());
    let r = router(&server);
    server_course(&r).await;

    r.update_post(COURSE, 1, 10, "Ada", 5).await.unwrap();
    let got = r.get_scores(COURSE, &[1], &[]).await.unwrap();

    assert_eq!(got.posts[&1].karma, 5);
    assert!(r.local().get_all_scores(COURSE).await.unwrap().is_empty());
    assert_eq!(server.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_remote_write_is_saved_locally() {
    let server = FakeServer::failing(ErrorKind::ServerUnavailable);
    let r = router(&server);
    server_course(&r).await;

    let err = r.update_post(COURSE, 1, 10, "Ada", 5).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ServerUnavailableSavedLocally);
    let local = r.local().get_all_scores(COURSE).await.unwrap();
    assert_eq!(local.posts[&1], ScoreEntry::new(1, 10, "Ada", 5));
}

#[tokio::test]
async fn unauthorised_remote_write_is_saved_locally() {
    let server = FakeServer::failing(ErrorKind::ServerUnauthorised);
    let r = router(&server);
    server_course(&r).await;

    let err = r.update_reply(COURSE, 9, 10, "Ada", 1).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ServerUnauthorisedSavedLocally);
    assert!(err.kind().as_str().ends_with("-saved-locally"));
    assert_eq!(r.local().get_all_scores(COURSE).await.unwrap().replies.len(), 1);
}

#[tokio::test]
async fn other_remote_failures_become_unknown_after_local_save() {
    let server = FakeServer::failing(ErrorKind::Unknown);
    let r = router(&server);
    server_course(&r).await;

    let err = r.update_post(COURSE, 3, 10, "Ada", 2).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert_eq!(r.local().get_all_scores(COURSE).await.unwrap().posts.len(), 1);
}

#[tokio::test]
async fn failed_remote_read_propagates_without_fallback() {
    let server = FakeServer::failing(ErrorKind::ServerUnavailable);
    let r = router(&server);
    server_course(&r).await;

    let err = r.get_scores(COURSE, &[1], &[]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ServerUnavailable);
}

#[tokio::test]
async fn sync_pushes_local_scores_then_clears_them() {
    let server = FakeServer::failing(ErrorKind::ServerUnavailable);
    let r = router(&server);
    server_course(&r).await;
    let _ = r.update_post(COURSE, 1, 10, "Ada", 5).await;
    let _ = r.update_reply(COURSE, 2, 11, "Bob", 3).await;

    server.recover();
    r.sync_to_server(COURSE).await.unwrap();

    assert!(r.local().get_all_scores(COURSE).await.unwrap().is_empty());
    let remote = server.scores.read().clone();
    assert_eq!(remote.posts[&1].karma, 5);
    assert_eq!(remote.replies[&2].karma, 3);
}

#[tokio::test]
async fn sync_twice_is_idempotent() {
    let server = FakeServer::failing(ErrorKind::ServerUnavailable);
    let r = router(&server);
    server_course(&r).await;
    let _ = r.update_post(COURSE, 1, 10, "Ada", 5).await;
    server.recover();

    r.sync_to_server(COURSE).await.unwrap();
    let after_first = server.scores.read().clone();
    r.sync_to_server(COURSE).await.unwrap();

    assert_eq!(*server.scores.read(), after_first);
    assert!(r.local().get_all_scores(COURSE).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_sync_keeps_local_scores() {
    let server = FakeServer::failing(ErrorKind::ServerUnavailable);
    let r = router(&server);
    server_course(&r).await;
    let _ = r.update_post(COURSE, 1, 10, "Ada", 5).await;

    let err = r.sync_to_server(COURSE).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ServerUnavailable);
    assert_eq!(r.local().get_all_scores(COURSE).await.unwrap().posts.len(), 1);
}

#[tokio::test]
async fn sync_on_local_course_is_rejected_without_network() {
    let server = Arc::new(FakeServer::default());
    let r = router(&server);
    r.set_course_info(COURSE, "COMP1511", "Fundamentals", CourseStatus::Active).await.unwrap();

    let err = r.sync_to_server(COURSE).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CannotSyncLocalStorage);
    assert_eq!(server.connects.load(Ordering::SeqCst), 0);
    assert_eq!(server.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn settings_change_applies_to_next_operation() {
    let server = Arc::new(FakeServer::default());
    let r = router(&server);
    server_course(&r).await;
    r.update_post(COURSE, 1, 10, "Ada", 5).await.unwrap();

    r.set_course_settings(COURSE, StorageType::Local, "", "").await.unwrap();
    let got = r.get_scores(COURSE, &[1], &[]).await.unwrap();

    assert!(got.is_empty());
    let course = r.get_course_details(COURSE).await.unwrap().unwrap();
    assert_eq!(course.settings.storage.base_url, "https://karma.example.edu");
}

#[tokio::test]
async fn server_settings_require_http_url() {
    let server = Arc::new(FakeServer::default());
    let r = router(&server);

    let err = r
        .set_course_settings(COURSE, StorageType::Server, "ftp://karma.example.edu", "secret")
        .await
        .unwrap_err();

    assert!(matches!(err, KarmaError::Invalid(_)));
    assert!(r.get_course_details(COURSE).await.unwrap().is_none());
}

#[tokio::test]
async fn sync_keeps_scores_written_during_the_push() {
    let server = FakeServer::failing(ErrorKind::ServerUnavailable);
    let r = router(&server);
    server_course(&r).await;
    let _ = r.update_post(COURSE, 1, 10, "Ada", 5).await;
    server.recover();
    *server.write_during_push.lock() = Some(r.local().clone());

    r.sync_to_server(COURSE).await.unwrap();

    let local = r.local().get_all_scores(COURSE).await.unwrap();
    assert_eq!(local.posts.keys().copied().collect::<Vec<_>>(), vec![99]);
    assert_eq!(server.scores.read().posts[&1].karma, 5);
}

/// Rows can be read but every store fails.
struct ReadOnlyTable(MemoryTable);

#[async_trait]
impl CourseTable for ReadOnlyTable {
    async fn load_all(&self) -> Result<BTreeMap<CourseId, CourseRecord>, KarmaError> {
        self.0.load_all().await
    }
    async fn load(&self, id: CourseId) -> Result<Option<CourseRecord>, KarmaError> {
        self.0.load(id).await
    }
    async fn store(&self, _record: CourseRecord) -> Result<(), KarmaError> {
        Err(KarmaError::sync("quota exceeded"))
    }
}

fn server_row() -> CourseRecord {
    let mut row = CourseRecord::new(COURSE);
    row.settings.storage = StorageSettings {
        kind: StorageType::Server,
        base_url: "https://karma.example.edu".into(),
        api_key: "secret".into(),
    };
    row
}

#[tokio::test]
async fn failed_fallback_write_reports_sync_unavailable() {
    let server = FakeServer::failing(ErrorKind::ServerUnavailable);
    let table = ReadOnlyTable(MemoryTable::with_rows([server_row()]));
    let r = StoreRouter::new(Arc::new(table), Arc::new(FakeConnector(server.clone())));

    let err = r.update_post(COURSE, 1, 10, "Ada", 5).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SyncUnavailable);
    assert_eq!(server.connects.load(Ordering::SeqCst), 1);
    assert!(r.local().get_all_scores(COURSE).await.unwrap().is_empty());
}

struct UnreachableConnector;

impl RemoteConnector for UnreachableConnector {
    fn connect(&self, _course_id: CourseId, _base_url: &str, _api_key: &str) -> Result<Box<dyn ScoreBackend>, KarmaError> {
        Err(KarmaError::ServerUnavailable("no route to host".into()))
    }
}

#[tokio::test]
async fn connector_failure_falls_back_to_local_storage() {
    let table = MemoryTable::with_rows([server_row()]);
    let r = StoreRouter::new(Arc::new(table), Arc::new(UnreachableConnector));

    let err = r.update_reply(COURSE, 4, 10, "Ada", 2).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ServerUnavailableSavedLocally);
    let local = r.local().get_all_scores(COURSE).await.unwrap();
    assert_eq!(local.replies[&4], ScoreEntry::new(4, 10, "Ada", 2));
}
