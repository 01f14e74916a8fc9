use edkarma_core::{ScoreEntry, ScoreKind, ScoreRepository};
use edkarma_sqlite::SqliteScoreRepo;

#[tokio::test]
async fn upsert_then_fetch_by_kind() {
    let repo = SqliteScoreRepo::open_memory().await.unwrap();
    repo.upsert(ScoreKind::Post, &[ScoreEntry::new(1, 10, "Ada", 3), ScoreEntry::new(2, 11, "Bob", 1)])
        .await
        .unwrap();
    repo.upsert(ScoreKind::Reply, &[ScoreEntry::new(1, 12, "Cy", 5)])
        .await
        .unwrap();

    let posts = repo.fetch(ScoreKind::Post, &[1, 2, 3]).await.unwrap();
    let replies = repo.fetch(ScoreKind::Reply, &[1]).await.unwrap();

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0], ScoreEntry::new(1, 10, "Ada", 3));
    assert_eq!(replies, vec![ScoreEntry::new(1, 12, "Cy", 5)]);
    assert!(repo.fetch(ScoreKind::Post, &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn upsert_replaces_existing_entry() {
    let repo = SqliteScoreRepo::open_memory().await.unwrap();
    repo.upsert(ScoreKind::Post, &[ScoreEntry::new(1, 10, "Ada", 3)]).await.unwrap();

    repo.upsert(ScoreKind::Post, &[ScoreEntry::new(1, 10, "Ada", 0)]).await.unwrap();

    let posts = repo.fetch(ScoreKind::Post, &[1]).await.unwrap();
    assert_eq!(posts[0].karma, 0);
}

#[tokio::test]
async fn summary_groups_awarded_entries_by_user() {
    let repo = SqliteScoreRepo::open_memory().await.unwrap();
    repo.upsert(ScoreKind::Post, &[ScoreEntry::new(1, 10, "Ada", 0), ScoreEntry::new(2, 11, "Bob", 4)])
        .await
        .unwrap();
    repo.upsert(ScoreKind::Reply, &[ScoreEntry::new(3, 10, "Ada", 3), ScoreEntry::new(4, 11, "Bob", 1)])
        .await
        .unwrap();

    let rows = repo.summary().await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].id, rows[0].posts, rows[0].replies, rows[0].karma), (10, 0, 1, 3));
    assert_eq!((rows[1].id, rows[1].posts, rows[1].replies, rows[1].karma), (11, 1, 1, 5));
}

#[tokio::test]
async fn file_database_is_created_and_reopened() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("karma.sqlite3");

    {
        let repo = SqliteScoreRepo::open_file(&path).await.unwrap();
        repo.upsert(ScoreKind::Reply, &[ScoreEntry::new(9, 10, "Ada", 2)]).await.unwrap();
    }
    let repo = SqliteScoreRepo::open_file(&path).await.unwrap();

    assert_eq!(repo.fetch(ScoreKind::Reply, &[9]).await.unwrap().len(), 1);
}
