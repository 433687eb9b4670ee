//! SQLite implementation of the Ledger trait.
//!
//! The persistent backend: a ledger opened on an existing file loads every
//! post stored before. Calls run on `tokio::task::spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use hydra_core::{Blake3Hash, Post, PostContent, PostHeader, PostId};

use crate::error::{LedgerError, Result};
use crate::migration;
use crate::traits::Ledger;

const POST_COLUMNS: &str = "identity, subject, timestamp, parent_id, mime_type, digest,
                            content_size, content_kind, content, file_path";

/// SQLite-based ledger.
///
/// Thread-safe via internal Mutex.
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open a ledger database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path.as_ref())?;
        migration::migrate(&mut conn)?;
        tracing::debug!(path = %path.as_ref().display(), "ledger opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite ledger.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| LedgerError::LockPoisoned)?;
            f(&conn)
        })
        .await
        .map_err(|e| LedgerError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

fn blob_to_id(bytes: Vec<u8>, column: &str) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| LedgerError::InvalidData(format!("{} is not 32 bytes", column)))
}

fn row_to_post(row: &rusqlite::Row<'_>) -> Result<Post> {
    let identity: Vec<u8> = row.get("identity")?;
    let parent_id: Option<Vec<u8>> = row.get("parent_id")?;
    let digest: Vec<u8> = row.get("digest")?;
    let content_kind: String = row.get("content_kind")?;
    let content: Option<Vec<u8>> = row.get("content")?;
    let file_path: Option<String> = row.get("file_path")?;

    let header = PostHeader {
        identity: PostId::from_bytes(blob_to_id(identity, "identity")?),
        subject: row.get("subject")?,
        timestamp: row.get("timestamp")?,
        parent_id: parent_id
            .map(|p| blob_to_id(p, "parent_id").map(PostId::from_bytes))
            .transpose()?,
        mime_type: row.get("mime_type")?,
        digest: Blake3Hash::from_bytes(blob_to_id(digest, "digest")?),
        content_size: row.get::<_, i64>("content_size")? as u64,
    };

    if let Some(bytes) = &content {
        if content_kind != "file" && bytes.len() as u64 != header.content_size {
            return Err(LedgerError::InvalidData(format!(
                "post {} holds {} content bytes, header says {}",
                header.identity,
                bytes.len(),
                header.content_size
            )));
        }
    }

    let content = match (content_kind.as_str(), content, file_path) {
        ("string", Some(bytes), _) => PostContent::Text(
            String::from_utf8(bytes)
                .map_err(|_| LedgerError::InvalidData("string content is not UTF-8".into()))?,
        ),
        ("frame", Some(bytes), _) => PostContent::Data(Bytes::from(bytes)),
        ("file", _, Some(path)) => PostContent::File(PathBuf::from(path)),
        (kind, _, _) => {
            return Err(LedgerError::InvalidData(format!(
                "post {} has unusable content of kind '{}'",
                header.identity, kind
            )))
        }
    };

    Ok(Post::restore(header, content))
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn store(&self, post: Post) -> Result<u64> {
        self.with_conn(move |conn| {
            let identity = post.identity().as_bytes().to_vec();

            let existing: Option<i64> = conn
                .query_row(
                    "SELECT position FROM posts WHERE identity = ?1",
                    params![identity],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(position) = existing {
                return Ok(position as u64);
            }

            let position: i64 =
                conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;

            let (content, file_path): (Option<&[u8]>, Option<&str>) = match post.content() {
                PostContent::Text(text) => (Some(text.as_bytes()), None),
                PostContent::Data(data) => (Some(data.as_ref()), None),
                PostContent::File(path) => {
                    let path = path.to_str().ok_or_else(|| {
                        LedgerError::InvalidData(format!(
                            "file path {} is not UTF-8",
                            path.display()
                        ))
                    })?;
                    (None, Some(path))
                }
            };

            let header = post.header();
            conn.execute(
                "INSERT INTO posts (
                    position, identity, subject, timestamp, parent_id, mime_type,
                    digest, content_size, content_kind, content, file_path
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    position,
                    identity,
                    header.subject,
                    header.timestamp,
                    header.parent_id.as_ref().map(|p| p.as_bytes().as_slice()),
                    header.mime_type,
                    header.digest.as_bytes().as_slice(),
                    header.content_size as i64,
                    post.content().kind(),
                    content,
                    file_path,
                ],
            )?;

            Ok(position as u64)
        })
        .await
    }

    async fn fetch(&self, index: u64) -> Result<Option<Post>> {
        let Ok(position) = i64::try_from(index) else {
            return Ok(None);
        };
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM posts WHERE position = ?1",
                POST_COLUMNS
            ))?;
            let mut rows = stmt.query(params![position])?;
            match rows.next()? {
                Some(row) => row_to_post(row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn index(&self, identity: &PostId) -> Result<Option<u64>> {
        let identity = *identity;
        self.with_conn(move |conn| {
            let position: Option<i64> = conn
                .query_row(
                    "SELECT position FROM posts WHERE identity = ?1",
                    params![identity.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(position.map(|p| p as u64))
        })
        .await
    }

    async fn size(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_post(n: u32) -> Post {
        Post::builder(format!("post {}", n))
            .timestamp(1_700_000_000_000 + n as i64)
            .text(format!("body {}", n))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_store_and_fetch() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let first = make_post(1);
        let reply = Post::builder("re: post 1")
            .parent(*first.identity())
            .mime_type("application/octet-stream")
            .data(vec![1u8, 2, 3])
            .build()
            .unwrap();

        assert_eq!(ledger.store(first.clone()).await.unwrap(), 0);
        assert_eq!(ledger.store(reply.clone()).await.unwrap(), 1);
        assert_eq!(ledger.size().await.unwrap(), 2);

        assert_eq!(ledger.fetch(0).await.unwrap().unwrap(), first);
        assert_eq!(ledger.fetch(1).await.unwrap().unwrap(), reply);
        assert!(ledger.fetch(2).await.unwrap().is_none());
        assert!(ledger.fetch(u64::MAX).await.unwrap().is_none());

        assert_eq!(ledger.index(reply.identity()).await.unwrap(), Some(1));
        assert_eq!(ledger.index(&PostId::from_bytes([0; 32])).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sqlite_store_is_idempotent() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let post = make_post(1);
        assert_eq!(ledger.store(post.clone()).await.unwrap(), 0);
        assert_eq!(ledger.store(post).await.unwrap(), 0);
        assert_eq!(ledger.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_rejects_truncated_content() {
        let ledger = SqliteLedger::open_memory().unwrap();
        ledger.store(make_post(1)).await.unwrap();
        ledger
            .with_conn(|conn| {
                conn.execute("UPDATE posts SET content = X'00' WHERE position = 0", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let result = ledger.fetch(0).await;
        assert!(matches!(result, Err(LedgerError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");
        let content_path = dir.path().join("content.bin");
        let mut file = std::fs::File::create(&content_path).unwrap();
        file.write_all(&[7u8; 2048]).unwrap();
        drop(file);

        let file_post = Post::builder("attachment")
            .mime_type("application/octet-stream")
            .file(&content_path)
            .build()
            .unwrap();
        {
            let ledger = SqliteLedger::open(&db_path).unwrap();
            ledger.store(make_post(0)).await.unwrap();
            ledger.store(file_post.clone()).await.unwrap();
        }

        let ledger = SqliteLedger::open(&db_path).unwrap();
        assert_eq!(ledger.size().await.unwrap(), 2);
        let restored = ledger.fetch(1).await.unwrap().unwrap();
        assert_eq!(restored, file_post);
        assert!(restored.is_file_backed());
        assert_eq!(restored.fetch(2040, 100).unwrap().len(), 8);

        // New posts continue after the loaded ones.
        assert_eq!(ledger.store(make_post(2)).await.unwrap(), 2);
    }
}
