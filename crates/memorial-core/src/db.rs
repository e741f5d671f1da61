use crate::{
    credential::OwnerCredential,
    post::{Post, PostContent, PublicPost},
    store::ResourceStore,
    MemorialError, MemorialResult, ResourceType,
};
use chrono::{DateTime, Utc};
use rand::{thread_rng, Rng};
use sqlite::{Connection, State, Statement};
use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

const DB_NAME: &str = "memorial.db";
pub const POSTS_TABLE: &str = "posts";

const SELECT_COLUMNS: &str =
    "id, kind, created_at, author, owner_credential, title, video_reference, body, image_url";

pub fn setup_tables(conn: &Connection) -> MemorialResult<()> {
    let statement = format!(
        "
        CREATE TABLE IF NOT EXISTS {POSTS_TABLE}
        (seq INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        author TEXT NOT NULL,
        owner_credential TEXT NOT NULL,
        title TEXT,
        video_reference TEXT,
        body TEXT,
        image_url TEXT,
        UNIQUE (kind, id));
    "
    );

    conn.execute(statement)?;

    // databases written before pictures could be attached lack the column
    if !query_table_info(conn, POSTS_TABLE)?
        .iter()
        .any(|column| column == "image_url")
    {
        tracing::info!("adding image_url column to {POSTS_TABLE}");
        conn.execute(format!("ALTER TABLE {POSTS_TABLE} ADD COLUMN image_url TEXT;"))?;
    }

    Ok(())
}

/// Column names of `table_name`, in declaration order.
pub fn query_table_info(conn: &Connection, table_name: &str) -> MemorialResult<Vec<String>> {
    let statement = format!("PRAGMA table_info({table_name});");

    let mut stmt = conn.prepare(statement)?;
    let mut columns = Vec::new();
    while let State::Row = stmt.next()? {
        columns.push(stmt.read::<String, _>("name")?);
    }

    Ok(columns)
}

/// Posts backed by a sqlite file. Insertion order is kept by the `seq`
/// column, so newest-first is `ORDER BY seq DESC`.
pub struct SqliteStore {
    conn: Connection,
    retention: Option<NonZeroUsize>,
}

impl SqliteStore {
    /// path - Can be either a complete file path(with .db suffix) or
    ///        a directory name which will then be appended with default
    ///        db name.
    pub fn open(path: &Path, retention: Option<NonZeroUsize>) -> MemorialResult<Self> {
        let db_path = resolve_db_path(path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| MemorialError::storage(e.to_string()))?;
            }
        }
        tracing::debug!("opening sqlite store at {:?}", db_path);
        let conn = sqlite::open(&db_path)?;
        setup_tables(&conn)?;
        Ok(Self { conn, retention })
    }

    /// Drop everything beyond the newest `cap` posts of `kind`.
    fn enforce_retention(&self, kind: ResourceType, cap: NonZeroUsize) -> MemorialResult<()> {
        let statement = format!(
            "DELETE FROM {POSTS_TABLE} WHERE kind = :kind AND seq NOT IN \
            (SELECT seq FROM {POSTS_TABLE} WHERE kind = :kind ORDER BY seq DESC LIMIT :cap)"
        );
        let cap = i64::try_from(cap.get()).map_err(|e| MemorialError::storage(e.to_string()))?;
        let mut stmt = self.conn.prepare(statement)?;
        stmt.bind((":kind", kind.collection()))?;
        stmt.bind((":cap", cap))?;
        run_to_completion(&mut stmt)?;
        let dropped = self.conn.change_count();
        if dropped > 0 {
            tracing::debug!("retention dropped {dropped} {kind}");
        }
        Ok(())
    }
}

impl ResourceStore for SqliteStore {
    fn append(&mut self, post: Post) -> MemorialResult<()> {
        let statement = format!(
            "INSERT INTO {POSTS_TABLE} \
            (kind, id, created_at, author, owner_credential, title, video_reference, body, image_url) \
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        let (title, video_reference, body, image_url) = match &post.content {
            PostContent::Clip {
                title,
                video_reference,
            } => (Some(title.as_str()), Some(video_reference.as_str()), None, None),
            PostContent::Message { body, image_url } => {
                (None, None, Some(body.as_str()), image_url.as_deref())
            }
        };
        let kind = post.kind();
        let created_at = post.created_at.to_rfc3339();

        let mut stmt = self.conn.prepare(statement)?;
        stmt.bind((1, kind.collection()))?;
        stmt.bind((2, post.id.as_str()))?;
        stmt.bind((3, created_at.as_str()))?;
        stmt.bind((4, post.author_display_name.as_str()))?;
        stmt.bind((5, post.owner_credential.as_str()))?;
        stmt.bind((6, title))?;
        stmt.bind((7, video_reference))?;
        stmt.bind((8, body))?;
        stmt.bind((9, image_url))?;
        run_to_completion(&mut stmt)?;

        if let Some(cap) = self.retention {
            self.enforce_retention(kind, cap)?;
        }
        Ok(())
    }

    fn list(&self, kind: ResourceType) -> MemorialResult<Vec<PublicPost>> {
        let statement = format!(
            "SELECT {SELECT_COLUMNS} FROM {POSTS_TABLE} WHERE kind = ? ORDER BY seq DESC"
        );
        let mut stmt = self.conn.prepare(statement)?;
        stmt.bind((1, kind.collection()))?;

        let mut posts = Vec::new();
        while let State::Row = stmt.next()? {
            posts.push(parse_sqlite_row(&stmt)?.public());
        }
        Ok(posts)
    }

    fn find_by_id(&self, kind: ResourceType, id: &str) -> MemorialResult<Post> {
        let statement =
            format!("SELECT {SELECT_COLUMNS} FROM {POSTS_TABLE} WHERE kind = ? AND id = ?");
        let mut stmt = self.conn.prepare(statement)?;
        stmt.bind((1, kind.collection()))?;
        stmt.bind((2, id))?;

        match stmt.next()? {
            State::Row => parse_sqlite_row(&stmt),
            State::Done => Err(MemorialError::not_found(kind, id)),
        }
    }

    fn remove(&mut self, kind: ResourceType, id: &str) -> MemorialResult<()> {
        let statement = format!("DELETE FROM {POSTS_TABLE} WHERE kind = ? AND id = ?");
        let mut stmt = self.conn.prepare(statement)?;
        stmt.bind((1, kind.collection()))?;
        stmt.bind((2, id))?;
        run_to_completion(&mut stmt)?;

        if self.conn.change_count() == 0 {
            return Err(MemorialError::not_found(kind, id));
        }
        Ok(())
    }

    fn attach_image(&mut self, id: &str, image_url: String) -> MemorialResult<()> {
        let kind = ResourceType::Message;
        let statement =
            format!("UPDATE {POSTS_TABLE} SET image_url = ? WHERE kind = ? AND id = ?");
        let mut stmt = self.conn.prepare(statement)?;
        stmt.bind((1, image_url.as_str()))?;
        stmt.bind((2, kind.collection()))?;
        stmt.bind((3, id))?;
        run_to_completion(&mut stmt)?;

        if self.conn.change_count() == 0 {
            return Err(MemorialError::not_found(kind, id));
        }
        Ok(())
    }

    fn max_id(&self) -> MemorialResult<i64> {
        let statement =
            format!("SELECT COALESCE(MAX(CAST(id AS INTEGER)), 0) AS max_id FROM {POSTS_TABLE}");
        let mut stmt = self.conn.prepare(statement)?;
        match stmt.next()? {
            State::Row => Ok(stmt.read::<i64, _>("max_id")?),
            State::Done => Ok(0),
        }
    }
}

fn run_to_completion(stmt: &mut Statement<'_>) -> MemorialResult<()> {
    while let State::Row = stmt.next()? {}
    Ok(())
}

fn parse_sqlite_row(stmt: &Statement<'_>) -> MemorialResult<Post> {
    let kind: ResourceType = stmt.read::<String, _>("kind")?.parse()?;
    let created_at = stmt.read::<String, _>("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| MemorialError::storage(format!("bad created_at in db: {e}")))?
        .with_timezone(&Utc);

    let content = match kind {
        ResourceType::Clip => PostContent::Clip {
            title: stmt.read::<Option<String>, _>("title")?.unwrap_or_default(),
            video_reference: stmt
                .read::<Option<String>, _>("video_reference")?
                .unwrap_or_default(),
        },
        ResourceType::Message => PostContent::Message {
            body: stmt.read::<Option<String>, _>("body")?.unwrap_or_default(),
            image_url: stmt.read::<Option<String>, _>("image_url")?,
        },
    };

    Ok(Post {
        id: stmt.read::<String, _>("id")?,
        created_at,
        author_display_name: stmt.read::<String, _>("author")?,
        owner_credential: OwnerCredential::from_stored(
            stmt.read::<String, _>("owner_credential")?,
        ),
        content,
    })
}

fn resolve_db_path(path: &Path) -> PathBuf {
    if path.is_dir() || !path.to_string_lossy().ends_with(".db") {
        path.join(DB_NAME)
    } else {
        path.to_path_buf()
    }
}

/// Generates a random db name with four 16-bit fields, such that when generating
/// random numbers, the range of each 16 bit field is 0-65536. Hence,
/// each random db name is `prefix-xxxxx-xxxxx-xxxxx-xxxxx.db`
/// The generated digits are padded with zeroes to ensure standardised
/// length of each field.
pub fn generate_random_db_name() -> String {
    let mut buffer = [0u16; 4];
    thread_rng().fill(&mut buffer);
    let mut result = buffer
        .into_iter()
        .map(|val| format!("{:05}", val))
        .collect::<Vec<String>>()
        .join("-");
    result.insert_str(0, "memorial-");
    result.push_str(".db");
    result
}

pub fn generate_temp_db() -> PathBuf {
    std::env::temp_dir().join(generate_random_db_name())
}
