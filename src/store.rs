use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use thiserror::Error;

/// Repository-level errors. The trait below stays free of any
/// driver-specific error type so other backends can implement it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Query(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub first_name: String,
    pub last_name: String,
}

impl Author {
    /// Display string used everywhere the API serializes an author.
    pub fn display(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct BlogPost {
    pub id: String,
    pub author: Author,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
}

/// Insert payload. `created` falls back to the insert time.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author: Author,
    pub title: String,
    pub content: String,
    pub created: Option<DateTime<Utc>>,
}

/// Field-level partial update. Absent fields keep their stored values.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub author: Option<Author>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

/// Store-agnostic CRUD surface for blog posts. Ids are assigned on insert
/// and never change afterwards.
pub trait PostRepository: Send + Sync {
    fn insert_many(&self, posts: &[NewPost]) -> Result<Vec<String>, StoreError>;
    fn find_all(&self) -> Result<Vec<BlogPost>, StoreError>;
    fn find_by_id(&self, id: &str) -> Result<Option<BlogPost>, StoreError>;
    fn find_one(&self) -> Result<Option<BlogPost>, StoreError>;
    fn count(&self) -> Result<u64, StoreError>;
    /// Returns false when no record matches `id`. Nothing is written in
    /// that case.
    fn update_by_id(&self, id: &str, patch: &PostPatch) -> Result<bool, StoreError>;
    /// Succeeds whether or not the record exists.
    fn delete_by_id(&self, id: &str) -> Result<(), StoreError>;
    /// Removes every record. Test-only teardown.
    fn drop_all(&self) -> Result<(), StoreError>;
}

pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

const POST_COLUMNS: &str = "id, author_first_name, author_last_name, title, content, created";

impl SqliteRepository {
    pub fn new(conn: Connection) -> Self {
        SqliteRepository { conn: Mutex::new(conn) }
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlogPost> {
    let created: String = row.get(5)?;
    let created = created.parse::<DateTime<Utc>>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(BlogPost {
        id: row.get(0)?,
        author: Author {
            first_name: row.get(1)?,
            last_name: row.get(2)?,
        },
        title: row.get(3)?,
        content: row.get(4)?,
        created,
    })
}

impl PostRepository for SqliteRepository {
    fn insert_many(&self, posts: &[NewPost]) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(posts.len());
        for post in posts {
            let id = uuid::Uuid::new_v4().to_string();
            let created = post.created.unwrap_or_else(Utc::now).to_rfc3339();
            tx.execute(
                "INSERT INTO posts (id, author_first_name, author_last_name, title, content, created) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, post.author.first_name, post.author.last_name, post.title, post.content, created],
            )?;
            ids.push(id);
        }
        tx.commit()?;
        Ok(ids)
    }

    fn find_all(&self) -> Result<Vec<BlogPost>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created DESC"
        ))?;
        let posts = stmt
            .query_map([], row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<BlogPost>, StoreError> {
        let conn = self.conn();
        let post = conn
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                [id],
                row_to_post,
            )
            .optional()?;
        Ok(post)
    }

    fn find_one(&self) -> Result<Option<BlogPost>, StoreError> {
        let conn = self.conn();
        let post = conn
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts LIMIT 1"),
                [],
                row_to_post,
            )
            .optional()?;
        Ok(post)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    fn update_by_id(&self, id: &str, patch: &PostPatch) -> Result<bool, StoreError> {
        let current = match self.find_by_id(id)? {
            Some(post) => post,
            None => return Ok(false),
        };

        let author = patch.author.as_ref().unwrap_or(&current.author);
        let title = patch.title.as_deref().unwrap_or(&current.title);
        let content = patch.content.as_deref().unwrap_or(&current.content);
        let created = patch.created.unwrap_or(current.created).to_rfc3339();

        let conn = self.conn();
        conn.execute(
            "UPDATE posts SET author_first_name = ?1, author_last_name = ?2, title = ?3, content = ?4, created = ?5 WHERE id = ?6",
            rusqlite::params![author.first_name, author.last_name, title, content, created, id],
        )?;
        Ok(true)
    }

    fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
        Ok(())
    }

    fn drop_all(&self) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute("DELETE FROM posts", [])?;
        Ok(())
    }
}
