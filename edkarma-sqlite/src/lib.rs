use edkarma_core::{ContributionId, KarmaError, ScoreEntry, ScoreKind, ScoreRepository, SummaryRow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

#[derive(Debug)]
pub struct SqliteScoreRepo {
    pool: SqlitePool,
}

impl SqliteScoreRepo {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self, KarmaError> {
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|e| storage("sqlite connect", e))?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    /// Each in-memory connection is its own database, so the pool is
    /// limited to one.
    pub async fn open_memory() -> Result<Self, KarmaError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| storage("sqlite connect", e))?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    async fn ensure_schema(&self) -> Result<(), KarmaError> {
        const STMT: &str = r#"
        CREATE TABLE IF NOT EXISTS posts (
          id         INTEGER PRIMARY KEY,
          user_id    INTEGER NOT NULL,
          user_name  TEXT    NOT NULL,
          karma      INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS replies (
          id         INTEGER PRIMARY KEY,
          user_id    INTEGER NOT NULL,
          user_name  TEXT    NOT NULL,
          karma      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_user ON posts (user_id);
        CREATE INDEX IF NOT EXISTS idx_replies_user ON replies (user_id);
        "#;

        // Execute statements one by one for compatibility.
        for chunk in STMT.split(';') {
            let sql = chunk.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| storage("sqlite schema", e))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ScoreRepository for SqliteScoreRepo {
    async fn fetch(&self, kind: ScoreKind, ids: &[ContributionId]) -> Result<Vec<ScoreEntry>, KarmaError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!(
            "SELECT id,user_id,user_name,karma FROM {} WHERE id IN ({placeholders}) ORDER BY id ASC",
            kind.table()
        );
        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(*id);
        }
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage("read scores", e))?;
        Ok(rows
            .into_iter()
            .map(|row| ScoreEntry {
                id: row.get::<i64, _>("id"),
                user_id: row.get::<i64, _>("user_id"),
                user_name: row.get::<String, _>("user_name"),
                karma: row.get::<i64, _>("karma"),
            })
            .collect())
    }

    async fn upsert(&self, kind: ScoreKind, entries: &[ScoreEntry]) -> Result<(), KarmaError> {
        let sql = format!(
            "INSERT OR REPLACE INTO {} (id,user_id,user_name,karma) VALUES (?,?,?,?)",
            kind.table()
        );
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage("tx", e))?;
        for e in entries {
            sqlx::query(&sql)
                .bind(e.id)
                .bind(e.user_id)
                .bind(&e.user_name)
                .bind(e.karma)
                .execute(&mut *tx)
                .await
                .map_err(|err| storage("write scores", err))?;
        }
        tx.commit().await.map_err(|e| storage("tx commit", e))
    }

    async fn summary(&self) -> Result<Vec<SummaryRow>, KarmaError> {
        let rows = sqlx::query(
            r#"
            SELECT   user_id, user_name, SUM(posts) AS posts,
                     SUM(replies) AS replies, SUM(karma) AS karma
            FROM     ( SELECT user_id, user_name, 1 AS posts, 0 AS replies, karma FROM posts
                       UNION ALL
                       SELECT user_id, user_name, 0 AS posts, 1 AS replies, karma FROM replies )
            WHERE    karma > 0
            GROUP BY user_id
            ORDER BY user_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("summary", e))?;

        Ok(rows
            .into_iter()
            .map(|row| SummaryRow {
                id: row.get::<i64, _>("user_id"),
                name: row.get::<String, _>("user_name"),
                posts: row.get::<i64, _>("posts") as u32,
                replies: row.get::<i64, _>("replies") as u32,
                karma: row.get::<i64, _>("karma"),
            })
            .collect())
    }
}

// ===== Helpers =====
fn storage(what: &str, e: sqlx::Error) -> KarmaError {
    tracing::error!(error = %e, "{what} failed");
    KarmaError::unknown(format!("{what}: {e}"))
}
