//! Integration tests for the metadata store against a real SQLite database.
//!
//! The vector store and OpenAI paths need live services and are covered by
//! unit tests of their pure halves instead.

use sqlx::SqlitePool;
use tempfile::TempDir;

use askdocs::answer::LlmClient;
use askdocs::collection::CollectionManager;
use askdocs::config::Config;
use askdocs::embedding::EmbeddingClient;
use askdocs::ingest::{self, IngestRequest};
use askdocs::{db, migrate, store};

async fn test_pool() -> (TempDir, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("data").join("test.sqlite");
    let pool = db::connect(&db_path).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    (tmp, pool)
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let (_tmp, pool) = test_pool().await;
    migrate::run_migrations(&pool).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
}

#[tokio::test]
async fn document_round_trip() {
    let (_tmp, pool) = test_pool().await;

    let created = store::create_document(
        &pool,
        "alice",
        None,
        "report.pdf",
        "pdf",
        "report.pdf",
        12,
    )
    .await
    .unwrap();
    assert_eq!(created.chunk_count, 12);
    assert!(created.summary.is_none());
    assert_eq!(created.created_at, created.updated_at);

    let found = store::find_document(&pool, "alice", &created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "report.pdf");
    assert_eq!(found.doc_type, "pdf");

    let listed = store::list_documents(&pool, "alice").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(store::count_documents(&pool, "alice").await.unwrap(), 1);
}

#[tokio::test]
async fn documents_are_scoped_per_user() {
    let (_tmp, pool) = test_pool().await;

    let doc = store::create_document(&pool, "alice", None, "a", "text", "text_input", 1)
        .await
        .unwrap();

    assert!(store::find_document(&pool, "bob", &doc.id)
        .await
        .unwrap()
        .is_none());
    assert!(store::list_documents(&pool, "bob").await.unwrap().is_empty());
    assert_eq!(store::count_documents(&pool, "bob").await.unwrap(), 0);
}

#[tokio::test]
async fn summary_update_is_visible() {
    let (_tmp, pool) = test_pool().await;

    let doc = store::create_document(&pool, "alice", None, "a", "text", "text_input", 1)
        .await
        .unwrap();
    store::update_document_summary(&pool, &doc.id, "A short summary.")
        .await
        .unwrap();

    let found = store::find_document(&pool, "alice", &doc.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.summary.as_deref(), Some("A short summary."));
}

#[tokio::test]
async fn attach_document_requires_ownership() {
    let (_tmp, pool) = test_pool().await;

    let session = store::create_chat_session(&pool, "alice", None).await.unwrap();
    let doc = store::create_document(&pool, "alice", None, "a", "text", "text_input", 1)
        .await
        .unwrap();

    // Wrong user cannot attach.
    assert!(
        store::attach_document_to_session(&pool, "bob", &doc.id, &session.id)
            .await
            .unwrap()
            .is_none()
    );

    let attached = store::attach_document_to_session(&pool, "alice", &doc.id, &session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(attached.chat_session_id.as_deref(), Some(session.id.as_str()));

    let in_session = store::list_session_documents(&pool, &session.id)
        .await
        .unwrap();
    assert_eq!(in_session.len(), 1);
}

#[tokio::test]
async fn get_or_create_resumes_own_sessions_only() {
    let (_tmp, pool) = test_pool().await;

    let session = store::create_chat_session(&pool, "alice", Some("Research"))
        .await
        .unwrap();
    assert_eq!(session.title.as_deref(), Some("Research"));

    // Same user with the id resumes it.
    let resumed = store::get_or_create_chat_session(&pool, "alice", Some(&session.id), None)
        .await
        .unwrap();
    assert_eq!(resumed.id, session.id);

    // Another user with the same id gets a fresh session.
    let other = store::get_or_create_chat_session(&pool, "bob", Some(&session.id), None)
        .await
        .unwrap();
    assert_ne!(other.id, session.id);
    assert_eq!(other.user_id, "bob");

    // An unknown id also gets a fresh session with the default title.
    let fresh = store::get_or_create_chat_session(&pool, "alice", Some("no-such-id"), None)
        .await
        .unwrap();
    assert_ne!(fresh.id, session.id);
    assert_eq!(fresh.title.as_deref(), Some("New Chat"));
}

#[tokio::test]
async fn saving_a_message_bumps_the_session() {
    let (_tmp, pool) = test_pool().await;

    let session = store::create_chat_session(&pool, "alice", None).await.unwrap();

    // Age the session so the bump is observable at second granularity.
    sqlx::query("UPDATE chat_sessions SET updated_at = 0 WHERE id = ?")
        .bind(&session.id)
        .execute(&pool)
        .await
        .unwrap();

    store::save_message(&pool, &session.id, "user", "hello", None)
        .await
        .unwrap();

    let bumped = store::find_chat_session(&pool, "alice", &session.id)
        .await
        .unwrap()
        .unwrap();
    assert!(bumped.updated_at > 0);
}

#[tokio::test]
async fn messages_come_back_in_order() {
    let (_tmp, pool) = test_pool().await;

    let session = store::create_chat_session(&pool, "alice", None).await.unwrap();
    store::save_message(&pool, &session.id, "user", "first", None)
        .await
        .unwrap();
    store::save_message(&pool, &session.id, "assistant", "second", Some("doc-1"))
        .await
        .unwrap();
    store::save_message(&pool, &session.id, "user", "third", None)
        .await
        .unwrap();

    let messages = store::list_messages(&pool, &session.id).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
    assert_eq!(messages[1].document_id.as_deref(), Some("doc-1"));
}

#[tokio::test]
async fn deleting_a_session_detaches_documents_and_drops_messages() {
    let (_tmp, pool) = test_pool().await;

    let session = store::create_chat_session(&pool, "alice", None).await.unwrap();
    let doc = store::create_document(
        &pool,
        "alice",
        Some(&session.id),
        "a",
        "text",
        "text_input",
        1,
    )
    .await
    .unwrap();
    store::save_message(&pool, &session.id, "user", "hello", None)
        .await
        .unwrap();

    assert!(store::delete_chat_session(&pool, "alice", &session.id)
        .await
        .unwrap());

    assert!(store::find_chat_session(&pool, "alice", &session.id)
        .await
        .unwrap()
        .is_none());
    assert!(store::list_messages(&pool, &session.id)
        .await
        .unwrap()
        .is_empty());

    // The document survives, detached.
    let survivor = store::find_document(&pool, "alice", &doc.id)
        .await
        .unwrap()
        .unwrap();
    assert!(survivor.chat_session_id.is_none());
}

#[tokio::test]
async fn deleting_someone_elses_session_is_a_no_op() {
    let (_tmp, pool) = test_pool().await;

    let session = store::create_chat_session(&pool, "alice", None).await.unwrap();
    assert!(!store::delete_chat_session(&pool, "bob", &session.id)
        .await
        .unwrap());
    assert!(store::find_chat_session(&pool, "alice", &session.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn ingestion_rejects_documents_past_the_cap() {
    let (_tmp, pool) = test_pool().await;

    // Client construction is offline; the cap check runs before any
    // embedding or vector-store call.
    let config = Config::from_vars(|key| match key {
        "OPENAI_API_KEY" => Some("sk-test".to_string()),
        _ => None,
    })
    .unwrap();
    let embedder = EmbeddingClient::new(&config).unwrap();
    let collections = CollectionManager::new(&config, embedder).unwrap();
    let llm = LlmClient::new(&config).unwrap();

    for i in 0..5 {
        store::create_document(
            &pool,
            "alice",
            None,
            &format!("doc-{}", i),
            "text",
            "text_input",
            1,
        )
        .await
        .unwrap();
    }

    let request = IngestRequest {
        text_content: Some("one document too many".to_string()),
        ..Default::default()
    };
    let err = ingest::ingest(&pool, &collections, &llm, "alice", request)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("limit reached"));

    // The rejected request must not have written a sixth row.
    assert_eq!(store::count_documents(&pool, "alice").await.unwrap(), 5);
}

#[tokio::test]
async fn deleting_a_document_removes_the_row() {
    let (_tmp, pool) = test_pool().await;

    let doc = store::create_document(&pool, "alice", None, "a", "text", "text_input", 1)
        .await
        .unwrap();
    store::delete_document(&pool, &doc.id).await.unwrap();

    assert!(store::find_document(&pool, "alice", &doc.id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(store::count_documents(&pool, "alice").await.unwrap(), 0);
}
