//! SQLite persistence for both the forbidden-word lexicon and the
//! sensitive-word index.
//!
//! Tables:
//! - forbidden_words: global lexicon rows (word, decomposition, created_at)
//! - sensitive_words: one row per (phrase, model_id) with its embedding blob
//! - user_sensitive_words: user → sensitive word links

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, Transaction};
use std::collections::HashSet;
use tracing::info;
use wordguard_core::{Error, ForbiddenWord, Result, SensitiveWord, WordId};
use wordguard_lexicon::LexiconStore;
use wordguard_similarity::{decode_embedding, encode_embedding, SensitiveWordStore, Unlink, UnlinkedWord};

/// Bound parameters per `IN (...)` lookup
const LOOKUP_CHUNK: usize = 500;

fn db_err(e: sqlx::Error) -> Error {
    Error::store(e.to_string())
}

// Fixed-width UTC timestamps so string order matches time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::store(format!("invalid created_at '{}': {}", raw, e)))
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `database_url` and create the schema.
    ///
    /// In-memory databases get a single pinned connection so every query sees
    /// the same database.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let in_memory = database_url.contains(":memory:");
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = options.connect(database_url).await.map_err(db_err)?;
        let store = Self::new(pool);
        store.migrate().await?;

        info!("Connected to database {}", database_url);
        Ok(store)
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS forbidden_words (
                word TEXT PRIMARY KEY,
                decomposed_word TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_forbidden_words_created_at
                ON forbidden_words(created_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sensitive_words (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phrase TEXT NOT NULL,
                embedding BLOB NOT NULL,
                model_id TEXT NOT NULL,
                UNIQUE (phrase, model_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_sensitive_words (
                user_id TEXT NOT NULL,
                word_id INTEGER NOT NULL REFERENCES sensitive_words(id),
                PRIMARY KEY (user_id, word_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    fn forbidden_from_row(row: &SqliteRow) -> Result<ForbiddenWord> {
        let word: String = row.try_get("word").map_err(db_err)?;
        let decomposed: String = row.try_get("decomposed_word").map_err(db_err)?;
        let created_at: String = row.try_get("created_at").map_err(db_err)?;

        Ok(ForbiddenWord::new(word, decomposed).with_created_at(parse_timestamp(&created_at)?))
    }

    fn sensitive_from_row(row: &SqliteRow) -> Result<SensitiveWord> {
        let blob: Vec<u8> = row.try_get("embedding").map_err(db_err)?;

        Ok(SensitiveWord {
            word_id: row.try_get("id").map_err(db_err)?,
            phrase: row.try_get("phrase").map_err(db_err)?,
            embedding: decode_embedding(&blob)?,
            model_id: row.try_get("model_id").map_err(db_err)?,
        })
    }

    /// Drop one link and cascade to the word row inside `tx`
    async fn unlink_in(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: &str,
        word_id: WordId,
    ) -> Result<Unlink> {
        let removed = sqlx::query(
            "DELETE FROM user_sensitive_words WHERE user_id = ? AND word_id = ?",
        )
        .bind(user_id)
        .bind(word_id)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        if removed == 0 {
            return Ok(Unlink::NotLinked);
        }

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_sensitive_words WHERE word_id = ?")
                .bind(word_id)
                .fetch_one(&mut **tx)
                .await
                .map_err(db_err)?;

        if remaining == 0 {
            sqlx::query("DELETE FROM sensitive_words WHERE id = ?")
                .bind(word_id)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }

        Ok(Unlink::Unlinked {
            word_deleted: remaining == 0,
        })
    }
}

#[async_trait]
impl LexiconStore for SqliteStore {
    async fn load_all(&self) -> Result<Vec<ForbiddenWord>> {
        let rows = sqlx::query(
            r#"
            SELECT word, decomposed_word, created_at
            FROM forbidden_words
            ORDER BY created_at, rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::forbidden_from_row).collect()
    }

    async fn find_existing(&self, words: &[String]) -> Result<HashSet<String>> {
        let mut existing = HashSet::new();

        for chunk in words.chunks(LOOKUP_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT word FROM forbidden_words WHERE word IN (");
            {
                let mut separated = builder.separated(", ");
                for word in chunk {
                    separated.push_bind(word.as_str());
                }
                separated.push_unseparated(")");
            }

            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
            for row in rows {
                existing.insert(row.try_get::<String, _>("word").map_err(db_err)?);
            }
        }

        Ok(existing)
    }

    async fn insert(&self, word: &ForbiddenWord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO forbidden_words (word, decomposed_word, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&word.word)
        .bind(&word.decomposed_word)
        .bind(format_timestamp(&word.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, word: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM forbidden_words WHERE word = ?")
            .bind(word)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            DELETE FROM forbidden_words
            WHERE created_at >= ? AND created_at < ?
            RETURNING word
            "#,
        )
        .bind(format_timestamp(&from))
        .bind(format_timestamp(&to))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("word").map_err(db_err))
            .collect()
    }

    async fn contains(&self, word: &str) -> Result<bool> {
        let found = sqlx::query("SELECT 1 FROM forbidden_words WHERE word = ?")
            .bind(word)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl SensitiveWordStore for SqliteStore {
    async fn find_word(&self, phrase: &str, model_id: &str) -> Result<Option<WordId>> {
        sqlx::query_scalar::<_, WordId>("SELECT id FROM sensitive_words WHERE phrase = ? AND model_id = ?")
            .bind(phrase)
            .bind(model_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn create_word(
        &self,
        phrase: &str,
        embedding: &[f32],
        model_id: &str,
    ) -> Result<WordId> {
        let result = sqlx::query(
            "INSERT INTO sensitive_words (phrase, embedding, model_id) VALUES (?, ?, ?)",
        )
        .bind(phrase)
        .bind(encode_embedding(embedding))
        .bind(model_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.last_insert_rowid())
    }

    async fn link(&self, user_id: &str, word_id: WordId) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO user_sensitive_words (user_id, word_id) VALUES (?, ?)",
        )
        .bind(user_id)
        .bind(word_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn words_for_user(&self, user_id: &str, model_id: &str) -> Result<Vec<SensitiveWord>> {
        let rows = sqlx::query(
            r#"
            SELECT w.id, w.phrase, w.embedding, w.model_id
            FROM user_sensitive_words u
            JOIN sensitive_words w ON w.id = u.word_id
            WHERE u.user_id = ? AND w.model_id = ?
            ORDER BY w.id
            "#,
        )
        .bind(user_id)
        .bind(model_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::sensitive_from_row).collect()
    }

    async fn phrases_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT w.phrase
            FROM user_sensitive_words u
            JOIN sensitive_words w ON w.id = u.word_id
            WHERE u.user_id = ?
            ORDER BY w.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn unlink(&self, user_id: &str, word_id: WordId) -> Result<Unlink> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let outcome = Self::unlink_in(&mut tx, user_id, word_id).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(outcome)
    }

    async fn unlink_all(&self, user_id: &str) -> Result<Vec<UnlinkedWord>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let linked: Vec<(WordId, String)> = sqlx::query_as(
            r#"
            SELECT w.id, w.phrase
            FROM user_sensitive_words u
            JOIN sensitive_words w ON w.id = u.word_id
            WHERE u.user_id = ?
            ORDER BY w.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        let mut removed = Vec::with_capacity(linked.len());
        for (word_id, phrase) in linked {
            if let Unlink::Unlinked { word_deleted } =
                Self::unlink_in(&mut tx, user_id, word_id).await?
            {
                removed.push(UnlinkedWord {
                    phrase,
                    word_deleted,
                });
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:", 1).await.unwrap()
    }

    #[tokio::test]
    async fn test_lexicon_rows_persist() {
        let store = store().await;
        let word = ForbiddenWord::new("바보", "ㅂㅏㅂㅗ");
        store.insert(&word).await.unwrap();

        let rows = store.load_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].word, "바보");
        assert_eq!(rows[0].decomposed_word, "ㅂㅏㅂㅗ");
        assert!(store.contains("바보").await.unwrap());

        assert!(store.insert(&word).await.is_err());
    }

    #[tokio::test]
    async fn test_find_existing_subset() {
        let store = store().await;
        store.insert(&ForbiddenWord::new("a", "a")).await.unwrap();
        store.insert(&ForbiddenWord::new("b", "b")).await.unwrap();

        let candidates = vec!["a".to_string(), "c".to_string()];
        let existing = store.find_existing(&candidates).await.unwrap();
        assert_eq!(existing, HashSet::from(["a".to_string()]));
    }

    #[tokio::test]
    async fn test_delete_by_range_is_half_open() {
        let store = store().await;
        let base = Utc::now();
        store
            .insert(&ForbiddenWord::new("old", "").with_created_at(base - Duration::days(2)))
            .await
            .unwrap();
        store
            .insert(&ForbiddenWord::new("edge", "").with_created_at(base))
            .await
            .unwrap();
        store
            .insert(&ForbiddenWord::new("inside", "").with_created_at(base - Duration::hours(1)))
            .await
            .unwrap();

        let deleted = store
            .delete_created_between(base - Duration::days(1), base)
            .await
            .unwrap();
        assert_eq!(deleted, vec!["inside".to_string()]);
        assert_eq!(store.load_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sensitive_words_cascade() {
        let store = store().await;
        let id = store.create_word("주소", &[0.5, -1.25], "m").await.unwrap();
        assert_eq!(store.find_word("주소", "m").await.unwrap(), Some(id));

        assert!(store.link("alice", id).await.unwrap());
        assert!(!store.link("alice", id).await.unwrap());
        assert!(store.link("bob", id).await.unwrap());

        let words = store.words_for_user("alice", "m").await.unwrap();
        assert_eq!(words[0].embedding, vec![0.5, -1.25]);
        assert!(store.words_for_user("alice", "other").await.unwrap().is_empty());

        assert_eq!(
            store.unlink("alice", id).await.unwrap(),
            Unlink::Unlinked {
                word_deleted: false
            }
        );
        assert_eq!(store.unlink("alice", id).await.unwrap(), Unlink::NotLinked);

        let removed = store.unlink_all("bob").await.unwrap();
        assert_eq!(
            removed,
            vec![UnlinkedWord {
                phrase: "주소".to_string(),
                word_deleted: true
            }]
        );
        assert_eq!(store.find_word("주소", "m").await.unwrap(), None);
    }
}
