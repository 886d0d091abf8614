//! Relational metadata store: documents, chat sessions, messages.
//!
//! Thin sqlx wrappers over SQLite. All reads and writes are scoped by user
//! id so one user can never touch another's rows. Vector data never lives
//! here — only the metadata the UI and pipeline need.

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{ChatSession, Document, Message};

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

// ============ Documents ============

pub async fn create_document(
    pool: &SqlitePool,
    user_id: &str,
    chat_session_id: Option<&str>,
    name: &str,
    doc_type: &str,
    source: &str,
    chunk_count: i64,
) -> Result<Document> {
    let ts = now();
    let doc = Document {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        chat_session_id: chat_session_id.map(str::to_string),
        name: name.to_string(),
        doc_type: doc_type.to_string(),
        source: source.to_string(),
        summary: None,
        chunk_count,
        created_at: ts,
        updated_at: ts,
    };

    sqlx::query(
        r#"
        INSERT INTO documents (id, user_id, chat_session_id, name, doc_type, source, summary, chunk_count, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.user_id)
    .bind(&doc.chat_session_id)
    .bind(&doc.name)
    .bind(&doc.doc_type)
    .bind(&doc.source)
    .bind(doc.chunk_count)
    .bind(doc.created_at)
    .bind(doc.updated_at)
    .execute(pool)
    .await?;

    Ok(doc)
}

pub async fn list_documents(pool: &SqlitePool, user_id: &str) -> Result<Vec<Document>> {
    let docs = sqlx::query_as::<_, Document>(
        "SELECT * FROM documents WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(docs)
}

pub async fn find_document(
    pool: &SqlitePool,
    user_id: &str,
    id: &str,
) -> Result<Option<Document>> {
    let doc = sqlx::query_as::<_, Document>(
        "SELECT * FROM documents WHERE id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(doc)
}

pub async fn list_session_documents(
    pool: &SqlitePool,
    chat_session_id: &str,
) -> Result<Vec<Document>> {
    let docs = sqlx::query_as::<_, Document>(
        "SELECT * FROM documents WHERE chat_session_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(chat_session_id)
    .fetch_all(pool)
    .await?;
    Ok(docs)
}

pub async fn count_documents(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn update_document_summary(pool: &SqlitePool, id: &str, summary: &str) -> Result<()> {
    sqlx::query("UPDATE documents SET summary = ?, updated_at = ? WHERE id = ?")
        .bind(summary)
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Attach a document to a chat session, verifying ownership first.
pub async fn attach_document_to_session(
    pool: &SqlitePool,
    user_id: &str,
    id: &str,
    chat_session_id: &str,
) -> Result<Option<Document>> {
    let updated = sqlx::query(
        "UPDATE documents SET chat_session_id = ?, updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(chat_session_id)
    .bind(now())
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Ok(None);
    }
    find_document(pool, user_id, id).await
}

pub async fn delete_document(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ============ Chat sessions ============

pub async fn create_chat_session(
    pool: &SqlitePool,
    user_id: &str,
    title: Option<&str>,
) -> Result<ChatSession> {
    let ts = now();
    let session = ChatSession {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        title: Some(title.unwrap_or("New Chat").to_string()),
        created_at: ts,
        updated_at: ts,
    };

    sqlx::query(
        "INSERT INTO chat_sessions (id, user_id, title, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&session.id)
    .bind(&session.user_id)
    .bind(&session.title)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(pool)
    .await?;

    tracing::info!(session_id = %session.id, "created chat session");
    Ok(session)
}

pub async fn find_chat_session(
    pool: &SqlitePool,
    user_id: &str,
    id: &str,
) -> Result<Option<ChatSession>> {
    let session = sqlx::query_as::<_, ChatSession>(
        "SELECT * FROM chat_sessions WHERE id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(session)
}

/// Resume the given session if it exists and belongs to the user, otherwise
/// create a fresh one.
pub async fn get_or_create_chat_session(
    pool: &SqlitePool,
    user_id: &str,
    session_id: Option<&str>,
    title: Option<&str>,
) -> Result<ChatSession> {
    if let Some(id) = session_id {
        if let Some(existing) = find_chat_session(pool, user_id, id).await? {
            return Ok(existing);
        }
    }
    create_chat_session(pool, user_id, title).await
}

pub async fn list_chat_sessions(pool: &SqlitePool, user_id: &str) -> Result<Vec<ChatSession>> {
    let sessions = sqlx::query_as::<_, ChatSession>(
        "SELECT * FROM chat_sessions WHERE user_id = ? ORDER BY updated_at DESC, rowid DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(sessions)
}

/// Delete a session, its messages, and detach its documents. The documents
/// themselves (and their vectors) survive.
pub async fn delete_chat_session(pool: &SqlitePool, user_id: &str, id: &str) -> Result<bool> {
    let Some(_session) = find_chat_session(pool, user_id, id).await? else {
        return Ok(false);
    };

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM messages WHERE chat_session_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE documents SET chat_session_id = NULL WHERE chat_session_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chat_sessions WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(true)
}

// ============ Messages ============

/// Append a message to a session and bump the session's `updated_at`.
pub async fn save_message(
    pool: &SqlitePool,
    chat_session_id: &str,
    role: &str,
    content: &str,
    document_id: Option<&str>,
) -> Result<Message> {
    let ts = now();
    let message = Message {
        id: Uuid::new_v4().to_string(),
        chat_session_id: chat_session_id.to_string(),
        document_id: document_id.map(str::to_string),
        role: role.to_string(),
        content: content.to_string(),
        created_at: ts,
    };

    sqlx::query(
        r#"
        INSERT INTO messages (id, chat_session_id, document_id, role, content, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&message.id)
    .bind(&message.chat_session_id)
    .bind(&message.document_id)
    .bind(&message.role)
    .bind(&message.content)
    .bind(message.created_at)
    .execute(pool)
    .await?;

    sqlx::query("UPDATE chat_sessions SET updated_at = ? WHERE id = ?")
        .bind(ts)
        .bind(chat_session_id)
        .execute(pool)
        .await?;

    Ok(message)
}

pub async fn list_messages(pool: &SqlitePool, chat_session_id: &str) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
        "SELECT * FROM messages WHERE chat_session_id = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(chat_session_id)
    .fetch_all(pool)
    .await?;
    Ok(messages)
}
