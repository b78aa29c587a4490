use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::{CoreError, CoreResult},
    model::{Classification, ExamType, Message, MessageBody, MessageSender, Paper, Room, RoomStatus, Summary},
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id BLOB PRIMARY KEY,
    token TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    alias TEXT NOT NULL,
    eligible BOOLEAN NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rooms (
    id BLOB PRIMARY KEY,
    title TEXT NOT NULL,
    subject TEXT NOT NULL,
    semester INTEGER NOT NULL,
    year INTEGER NOT NULL,
    exam_type TEXT NOT NULL,
    created_by BLOB NOT NULL,
    created_by_name TEXT NOT NULL,
    status TEXT NOT NULL,
    document_url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    ended_at TEXT
);

CREATE TABLE IF NOT EXISTS messages (
    id BLOB PRIMARY KEY,
    room_id BLOB NOT NULL REFERENCES rooms(id),
    seq INTEGER NOT NULL,
    sender_id BLOB,
    sender_name TEXT,
    kind TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (room_id, seq)
);

CREATE TABLE IF NOT EXISTS summaries (
    id BLOB PRIMARY KEY,
    room_id BLOB NOT NULL UNIQUE REFERENCES rooms(id),
    content TEXT NOT NULL,
    generated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS papers (
    id BLOB PRIMARY KEY,
    title TEXT NOT NULL,
    subject TEXT NOT NULL,
    semester INTEGER NOT NULL,
    year INTEGER NOT NULL,
    exam_type TEXT NOT NULL,
    file_url TEXT NOT NULL,
    uploaded_by BLOB NOT NULL,
    uploaded_by_name TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// Opens a pool and creates the schema. `sqlite::memory:` needs `max_connections == 1`,
/// otherwise every connection sees its own empty database.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
pub(crate) struct RoomRow {
    id: Uuid,
    title: String,
    subject: String,
    semester: u8,
    year: i32,
    exam_type: ExamType,
    created_by: Uuid,
    created_by_name: String,
    status: RoomStatus,
    document_url: String,
    created_at: OffsetDateTime,
    ended_at: Option<OffsetDateTime>,
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Room {
            id: row.id,
            title: row.title,
            classification: Classification {
                subject: row.subject,
                semester: row.semester,
                year: row.year,
                exam_type: row.exam_type,
            },
            created_by: row.created_by,
            created_by_name: row.created_by_name,
            status: row.status,
            document_url: row.document_url,
            created_at: row.created_at,
            ended_at: row.ended_at,
        }
    }
}

pub(crate) const ROOM_COLUMNS: &str = "id,title,subject,semester,year,exam_type,created_by,created_by_name,status,document_url,created_at,ended_at";

pub(crate) async fn insert_room(pool: &SqlitePool, room: &Room) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO rooms (id,title,subject,semester,year,exam_type,created_by,created_by_name,status,document_url,created_at,ended_at) VALUES (?,?,?,?,?,?,?,?,?,?,?,?)",
    )
    .bind(room.id)
    .bind(&room.title)
    .bind(&room.classification.subject)
    .bind(room.classification.semester)
    .bind(room.classification.year)
    .bind(room.classification.exam_type)
    .bind(room.created_by)
    .bind(&room.created_by_name)
    .bind(room.status)
    .bind(&room.document_url)
    .bind(room.created_at)
    .bind(room.ended_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn fetch_room(pool: &SqlitePool, id: Uuid) -> Result<Option<Room>, sqlx::Error> {
    let row: Option<RoomRow> = sqlx::query_as(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id=?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Room::from))
}

pub(crate) async fn mark_room_ended(pool: &SqlitePool, id: Uuid, ended_at: OffsetDateTime) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE rooms SET status=?, ended_at=? WHERE id=?")
        .bind(RoomStatus::Ended)
        .bind(ended_at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
pub(crate) struct RoomCountRow {
    #[sqlx(flatten)]
    room: RoomRow,
    message_count: i64,
}

pub(crate) async fn fetch_room_listing(pool: &SqlitePool) -> Result<Vec<(Room, i64)>, sqlx::Error> {
    let rows: Vec<RoomCountRow> = sqlx::query_as(&format!(
        "SELECT {ROOM_COLUMNS}, (SELECT COUNT(*) FROM messages m WHERE m.room_id = rooms.id) AS message_count \
         FROM rooms ORDER BY created_at DESC, rowid DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (Room::from(row.room), row.message_count))
        .collect())
}

#[derive(sqlx::FromRow)]
pub(crate) struct MessageRow {
    id: Uuid,
    room_id: Uuid,
    seq: i64,
    sender_id: Option<Uuid>,
    sender_name: Option<String>,
    kind: String,
    content: String,
    created_at: OffsetDateTime,
}

impl TryFrom<MessageRow> for Message {
    type Error = CoreError;

    fn try_from(row: MessageRow) -> CoreResult<Self> {
        let body = match row.kind.as_str() {
            "text" => MessageBody::Text(row.content),
            "image" => MessageBody::Image(row.content),
            other => return Err(CoreError::Corrupt(format!("message {} has kind {other}", row.id))),
        };
        let sender = match (row.sender_id, row.sender_name) {
            (Some(id), Some(name)) => Some(MessageSender { id, name }),
            _ => None,
        };

        Ok(Message {
            id: row.id,
            room_id: row.room_id,
            sender,
            body,
            seq: row.seq,
            created_at: row.created_at,
        })
    }
}

pub(crate) async fn insert_message(pool: &SqlitePool, msg: &Message) -> Result<(), sqlx::Error> {
    let kind = if msg.body.is_image() { "image" } else { "text" };
    sqlx::query(
        "INSERT INTO messages (id,room_id,seq,sender_id,sender_name,kind,content,created_at) VALUES (?,?,?,?,?,?,?,?)",
    )
    .bind(msg.id)
    .bind(msg.room_id)
    .bind(msg.seq)
    .bind(msg.sender.as_ref().map(|s| s.id))
    .bind(msg.sender.as_ref().map(|s| s.name.as_str()))
    .bind(kind)
    .bind(msg.body.content())
    .bind(msg.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn fetch_messages(pool: &SqlitePool, room_id: Uuid) -> CoreResult<Vec<Message>> {
    let rows: Vec<MessageRow> = sqlx::query_as(
        "SELECT id,room_id,seq,sender_id,sender_name,kind,content,created_at FROM messages \
         WHERE room_id=? ORDER BY seq, created_at, rowid",
    )
    .bind(room_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Message::try_from).collect()
}

pub(crate) async fn last_seq(pool: &SqlitePool, room_id: Uuid) -> Result<i64, sqlx::Error> {
    let (last,): (Option<i64>,) = sqlx::query_as("SELECT MAX(seq) FROM messages WHERE room_id=?")
        .bind(room_id)
        .fetch_one(pool)
        .await?;
    Ok(last.unwrap_or(0))
}

pub(crate) async fn insert_summary(pool: &SqlitePool, summary: &Summary) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO summaries (id,room_id,content,generated_at) VALUES (?,?,?,?)")
        .bind(summary.id)
        .bind(summary.room_id)
        .bind(&summary.content)
        .bind(summary.generated_at)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn fetch_summary(pool: &SqlitePool, room_id: Uuid) -> Result<Option<Summary>, sqlx::Error> {
    let row: Option<(Uuid, Uuid, String, OffsetDateTime)> =
        sqlx::query_as("SELECT id,room_id,content,generated_at FROM summaries WHERE room_id=?")
            .bind(room_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|(id, room_id, content, generated_at)| Summary {
        id,
        room_id,
        content,
        generated_at,
    }))
}

/// Every summary paired with the room it was produced from, newest first.
pub(crate) async fn fetch_summaries(pool: &SqlitePool) -> Result<Vec<(Summary, Room)>, sqlx::Error> {
    let summaries: Vec<(Uuid, Uuid, String, OffsetDateTime)> =
        sqlx::query_as("SELECT id,room_id,content,generated_at FROM summaries ORDER BY generated_at DESC")
            .fetch_all(pool)
            .await?;

    let mut out = Vec::with_capacity(summaries.len());
    for (id, room_id, content, generated_at) in summaries {
        let Some(room) = fetch_room(pool, room_id).await? else {
            continue;
        };
        out.push((
            Summary {
                id,
                room_id,
                content,
                generated_at,
            },
            room,
        ));
    }
    Ok(out)
}

#[derive(sqlx::FromRow)]
pub(crate) struct PaperRow {
    id: Uuid,
    title: String,
    subject: String,
    semester: u8,
    year: i32,
    exam_type: ExamType,
    file_url: String,
    uploaded_by: Uuid,
    uploaded_by_name: String,
    created_at: OffsetDateTime,
}

impl From<PaperRow> for Paper {
    fn from(row: PaperRow) -> Self {
        Paper {
            id: row.id,
            title: row.title,
            classification: Classification {
                subject: row.subject,
                semester: row.semester,
                year: row.year,
                exam_type: row.exam_type,
            },
            file_url: row.file_url,
            uploaded_by: row.uploaded_by,
            uploaded_by_name: row.uploaded_by_name,
            created_at: row.created_at,
        }
    }
}

pub(crate) async fn insert_paper(pool: &SqlitePool, paper: &Paper) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO papers (id,title,subject,semester,year,exam_type,file_url,uploaded_by,uploaded_by_name,created_at) VALUES (?,?,?,?,?,?,?,?,?,?)",
    )
    .bind(paper.id)
    .bind(&paper.title)
    .bind(&paper.classification.subject)
    .bind(paper.classification.semester)
    .bind(paper.classification.year)
    .bind(paper.classification.exam_type)
    .bind(paper.file_url.as_str())
    .bind(paper.uploaded_by)
    .bind(&paper.uploaded_by_name)
    .bind(paper.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn fetch_papers(pool: &SqlitePool, semester: Option<u8>) -> Result<Vec<Paper>, sqlx::Error> {
    let rows: Vec<PaperRow> = sqlx::query_as(
        "SELECT id,title,subject,semester,year,exam_type,file_url,uploaded_by,uploaded_by_name,created_at \
         FROM papers WHERE (?1 IS NULL OR semester = ?1) ORDER BY created_at DESC, rowid DESC",
    )
    .bind(semester)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Paper::from).collect())
}
