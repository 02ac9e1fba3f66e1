// Integration tests for authctx
//
// Drives a `ContextAdapter` over in-memory contexts laid out with PascalCase
// storage columns (User, Session, Key tables with foreign keys to User), and
// checks both the adapter results and the rows left in storage.

use std::sync::Arc;

use serde_json::json;

use authctx::{
    AdapterError, AdapterFactory, AdapterOptions, AuthAdapter, AuthContexts, ColumnMap, ColumnMaps,
    ContextAdapter, Entity, ErrorCode, KeySchema, Row, SessionSchema, UserCreationMode, UserSchema,
};
use authctx_core::ContextError;
use authctx_memory::{MemoryConnection, TableDefinition};
use authctx_test_utils::{generate_key, generate_session, generate_user, test_adapter, Database};

// ─── Fixtures ─────────────────────────────────────────────────────

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

fn connection() -> MemoryConnection {
    MemoryConnection::new([
        TableDefinition::new("User").primary_key("Id"),
        TableDefinition::new("Session")
            .primary_key("Id")
            .references("UserId", "User", "Id"),
        TableDefinition::new("Key")
            .primary_key("Id")
            .references("UserId", "User", "Id"),
    ])
}

fn contexts(conn: &MemoryConnection) -> AuthContexts {
    AuthContexts::new(
        Arc::new(conn.context("User")),
        Arc::new(conn.context("Session")),
        Arc::new(conn.context("Key")),
    )
}

/// Storage layout used throughout: PascalCase columns plus a `Country`
/// session attribute and a `Username` user attribute.
fn columns() -> ColumnMaps {
    ColumnMaps {
        user: ColumnMap::new(Entity::User, [("id", "Id"), ("username", "Username")]).unwrap(),
        session: ColumnMap::new(
            Entity::Session,
            [
                ("id", "Id"),
                ("user_id", "UserId"),
                ("active_expires", "ActiveExpires"),
                ("idle_expires", "IdleExpires"),
                ("country", "Country"),
            ],
        )
        .unwrap(),
        key: ColumnMap::from_convention(Entity::Key, authctx::NamingConvention::PascalCase),
    }
}

fn adapter_with(conn: &MemoryConnection, mode: UserCreationMode) -> ContextAdapter {
    AdapterFactory::new(contexts(conn))
        .columns(columns())
        .options(AdapterOptions {
            debug_logs: false,
            user_creation: mode,
        })
        .connection(Arc::new(conn.clone()))
        .build()
        .unwrap()
}

fn adapter(conn: &MemoryConnection) -> ContextAdapter {
    adapter_with(conn, UserCreationMode::Transactional)
}

fn database(conn: &MemoryConnection) -> Database {
    Database::new(
        Arc::new(conn.context("User")),
        Arc::new(conn.context("Session")),
        Arc::new(conn.context("Key")),
        columns(),
    )
}

// ─── Conformance ──────────────────────────────────────────────────

#[tokio::test]
async fn test_conformance_transactional() {
    authctx_core::env::init_logger();
    let conn = connection();
    let report = test_adapter(&adapter(&conn), &database(&conn)).await.unwrap();
    assert_eq!(report.passed.len(), 21);
}

#[tokio::test]
async fn test_conformance_sequential() {
    let conn = connection();
    let adapter = adapter_with(&conn, UserCreationMode::Sequential);
    test_adapter(&adapter, &database(&conn)).await.unwrap();
}

#[tokio::test]
async fn test_conformance_identity_columns() {
    let conn = MemoryConnection::new([
        TableDefinition::new("auth_user").primary_key("id"),
        TableDefinition::new("auth_session")
            .primary_key("id")
            .references("user_id", "auth_user", "id"),
        TableDefinition::new("auth_key")
            .primary_key("id")
            .references("user_id", "auth_user", "id"),
    ]);
    let adapter = AdapterFactory::new(AuthContexts::new(
        Arc::new(conn.context("auth_user")),
        Arc::new(conn.context("auth_session")),
        Arc::new(conn.context("auth_key")),
    ))
    .connection(Arc::new(conn.clone()))
    .build()
    .unwrap();
    let db = Database::new(
        Arc::new(conn.context("auth_user")),
        Arc::new(conn.context("auth_session")),
        Arc::new(conn.context("auth_key")),
        ColumnMaps::default(),
    );
    test_adapter(&adapter, &db).await.unwrap();
}

// ─── Users ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_user_then_get_user() {
    let conn = connection();
    let adapter = adapter(&conn);
    let user = UserSchema::new("u1").with_attribute("username", "alice");

    adapter.set_user(user.clone(), None).await.unwrap();

    assert_eq!(adapter.get_user("u1").await.unwrap(), Some(user));
    let tables = conn.snapshot().await;
    let stored = &tables["User"][0];
    assert_eq!(serde_json::Value::Object(stored.clone()), json!({"Id": "u1", "Username": "alice"}));
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let conn = connection();
    let adapter = adapter(&conn);
    assert!(adapter.get_user("nope").await.unwrap().is_none());
    assert!(adapter.get_session("nope").await.unwrap().is_none());
    assert!(adapter.get_key("nope").await.unwrap().is_none());
    assert!(adapter.get_sessions_by_user_id("nope").await.unwrap().is_empty());
    assert!(adapter.get_keys_by_user_id("nope").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_key_rolls_back_user() {
    let conn = connection();
    let adapter = adapter(&conn);
    adapter
        .set_user(UserSchema::new("u1"), Some(KeySchema::new("username:alice", "u1")))
        .await
        .unwrap();

    let err = adapter
        .set_user(UserSchema::new("u2"), Some(KeySchema::new("username:alice", "u2")))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::AuthDuplicateKeyId));
    assert!(adapter.get_user("u2").await.unwrap().is_none());
    assert_eq!(conn.row_count("User").await, 1);
    assert_eq!(conn.row_count("Key").await, 1);
    let key = adapter.get_key("username:alice").await.unwrap().unwrap();
    assert_eq!(key.user_id, "u1");
}

#[tokio::test]
async fn test_duplicate_key_error_keeps_cause() {
    let conn = connection();
    let adapter = adapter(&conn);
    adapter
        .set_user(UserSchema::new("u1"), Some(KeySchema::new("k1", "u1")))
        .await
        .unwrap();

    let err = adapter
        .set_user(UserSchema::new("u2"), Some(KeySchema::new("k1", "u2")))
        .await
        .unwrap_err();
    let AdapterError::Auth(auth) = err else {
        panic!("expected an auth error");
    };
    assert!(matches!(auth.cause(), Some(ContextError::Duplicate { column, .. }) if column == "Id"));
    assert!(std::error::Error::source(&auth).is_some());
}

#[tokio::test]
async fn test_duplicate_user_id_reported_as_duplicate_key() {
    let conn = connection();
    let adapter = adapter(&conn);
    adapter.set_user(UserSchema::new("u1"), None).await.unwrap();

    let err = adapter.set_user(UserSchema::new("u1"), None).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::AuthDuplicateKeyId));
}

#[tokio::test]
async fn test_update_and_delete_user() {
    let conn = connection();
    let adapter = adapter(&conn);
    adapter
        .set_user(UserSchema::new("u1").with_attribute("username", "alice"), None)
        .await
        .unwrap();

    adapter
        .update_user("u1", row(json!({"username": "bob"})))
        .await
        .unwrap();
    let user = adapter.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.attributes["username"], "bob");

    adapter.delete_user("u1").await.unwrap();
    assert!(adapter.get_user("u1").await.unwrap().is_none());
    // Deleting again is not an error.
    adapter.delete_user("u1").await.unwrap();
}

// ─── Sessions ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_session_lifecycle() {
    let conn = connection();
    let adapter = adapter(&conn);
    adapter.set_user(UserSchema::new("u1"), None).await.unwrap();

    let session = SessionSchema::new("s1", "u1", 1000, 2000);
    adapter.set_session(session.clone()).await.unwrap();
    assert_eq!(adapter.get_session("s1").await.unwrap(), Some(session));

    let tables = conn.snapshot().await;
    let stored = &tables["Session"][0];
    assert_eq!(stored["ActiveExpires"], 1000);
    assert_eq!(stored["UserId"], "u1");

    adapter.delete_session("s1").await.unwrap();
    assert!(adapter.get_session("s1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_session_attributes_are_mapped() {
    let conn = connection();
    let adapter = adapter(&conn);
    adapter.set_user(UserSchema::new("u1"), None).await.unwrap();

    let session = SessionSchema::new("s1", "u1", 1000, 2000).with_attribute("country", "NL");
    adapter.set_session(session.clone()).await.unwrap();

    assert_eq!(conn.snapshot().await["Session"][0]["Country"], "NL");
    assert_eq!(adapter.get_session("s1").await.unwrap(), Some(session));
}

#[tokio::test]
async fn test_set_session_unknown_user_writes_nothing() {
    let conn = connection();
    let adapter = adapter(&conn);

    let err = adapter
        .set_session(SessionSchema::new("s1", "ghost", 1000, 2000))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::AuthInvalidUserId));
    assert_eq!(conn.row_count("Session").await, 0);
}

#[tokio::test]
async fn test_set_session_duplicate_id() {
    let conn = connection();
    let adapter = adapter(&conn);
    adapter.set_user(UserSchema::new("u1"), None).await.unwrap();
    adapter
        .set_session(SessionSchema::new("s1", "u1", 1000, 2000))
        .await
        .unwrap();

    let err = adapter
        .set_session(SessionSchema::new("s1", "u1", 3000, 4000))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::AuthInvalidSessionId));
}

#[tokio::test]
async fn test_delete_sessions_by_user_id() {
    let conn = connection();
    let adapter = adapter(&conn);
    adapter.set_user(UserSchema::new("u1"), None).await.unwrap();
    adapter.set_user(UserSchema::new("u2"), None).await.unwrap();
    for _ in 0..3 {
        adapter.set_session(generate_session("u1")).await.unwrap();
    }
    adapter.set_session(generate_session("u2")).await.unwrap();
    assert_eq!(adapter.get_sessions_by_user_id("u1").await.unwrap().len(), 3);

    adapter.delete_sessions_by_user_id("u1").await.unwrap();

    assert!(adapter.get_sessions_by_user_id("u1").await.unwrap().is_empty());
    assert_eq!(adapter.get_sessions_by_user_id("u2").await.unwrap().len(), 1);
    // No sessions left to delete.
    adapter.delete_sessions_by_user_id("u1").await.unwrap();
}

#[tokio::test]
async fn test_update_session_unknown_id() {
    let conn = connection();
    let adapter = adapter(&conn);
    let err = adapter
        .update_session("ghost", row(json!({"idle_expires": 1})))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::AuthInvalidSessionId));
}

// ─── Keys ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_key_lifecycle() {
    let conn = connection();
    let adapter = adapter(&conn);
    let user = generate_user();
    adapter.set_user(user.clone(), None).await.unwrap();

    let key = generate_key(&user.id);
    adapter.set_key(key.clone()).await.unwrap();
    assert_eq!(adapter.get_key(&key.id).await.unwrap(), Some(key.clone()));
    assert_eq!(conn.snapshot().await["Key"][0]["PrimaryKey"], true);

    adapter
        .update_key(&key.id, row(json!({"hashed_password": null})))
        .await
        .unwrap();
    let updated = adapter.get_key(&key.id).await.unwrap().unwrap();
    assert!(updated.hashed_password.is_none());
    assert_eq!(conn.snapshot().await["Key"][0]["HashedPassword"], serde_json::Value::Null);

    adapter.delete_key(&key.id).await.unwrap();
    assert!(adapter.get_key(&key.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_key_unknown_user_writes_nothing() {
    let conn = connection();
    let adapter = adapter(&conn);

    let err = adapter.set_key(generate_key("ghost")).await.unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::AuthInvalidUserId));
    assert_eq!(conn.row_count("Key").await, 0);
}

#[tokio::test]
async fn test_set_key_duplicate() {
    let conn = connection();
    let adapter = adapter(&conn);
    let user = generate_user();
    let key = generate_key(&user.id);
    adapter.set_user(user, Some(key.clone())).await.unwrap();

    let err = adapter.set_key(key).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::AuthDuplicateKeyId));
}

#[tokio::test]
async fn test_keys_by_user_id() {
    let conn = connection();
    let adapter = adapter(&conn);
    adapter.set_user(UserSchema::new("u1"), None).await.unwrap();
    adapter.set_user(UserSchema::new("u2"), None).await.unwrap();
    adapter.set_key(generate_key("u1")).await.unwrap();
    adapter.set_key(generate_key("u1").primary(false)).await.unwrap();
    adapter.set_key(generate_key("u2")).await.unwrap();

    assert_eq!(adapter.get_keys_by_user_id("u1").await.unwrap().len(), 2);
    adapter.delete_keys_by_user_id("u1").await.unwrap();
    assert!(adapter.get_keys_by_user_id("u1").await.unwrap().is_empty());
    assert_eq!(adapter.get_keys_by_user_id("u2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_key_unknown_id() {
    let conn = connection();
    let adapter = adapter(&conn);
    let err = adapter
        .update_key("ghost", row(json!({"hashed_password": "x"})))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::AuthInvalidKeyId));
}

// ─── Sequential user creation ─────────────────────────────────────

#[tokio::test]
async fn test_sequential_duplicate_key_caught_before_write() {
    let conn = connection();
    let adapter = adapter_with(&conn, UserCreationMode::Sequential);
    adapter
        .set_user(UserSchema::new("u1"), Some(KeySchema::new("k1", "u1")))
        .await
        .unwrap();

    let err = adapter
        .set_user(UserSchema::new("u2"), Some(KeySchema::new("k1", "u2")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::AuthDuplicateKeyId));
    assert!(adapter.get_user("u2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_sequential_leaves_user_when_key_insert_fails() {
    let conn = connection();
    let adapter = adapter_with(&conn, UserCreationMode::Sequential);

    // Key points at a different, missing user; the key insert fails after the
    // user row is already written.
    let err = adapter
        .set_user(UserSchema::new("u1"), Some(KeySchema::new("k1", "ghost")))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::AuthDuplicateKeyId));
    assert!(adapter.get_user("u1").await.unwrap().is_some());
    assert_eq!(conn.row_count("Key").await, 0);
}

#[tokio::test]
async fn test_transactional_leaves_nothing_when_key_insert_fails() {
    let conn = connection();
    let adapter = adapter(&conn);

    let err = adapter
        .set_user(UserSchema::new("u1"), Some(KeySchema::new("k1", "ghost")))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::AuthDuplicateKeyId));
    assert_eq!(conn.row_count("User").await, 0);
    assert_eq!(conn.row_count("Key").await, 0);
}

// ─── Construction ─────────────────────────────────────────────────

#[tokio::test]
async fn test_columns_from_json() {
    let conn = connection();
    let columns = ColumnMaps::from_json(&json!({
        "user": {"id": "Id", "username": "Username"},
        "session": {
            "id": "Id", "user_id": "UserId",
            "active_expires": "ActiveExpires", "idle_expires": "IdleExpires"
        },
        "key": {
            "id": "Id", "user_id": "UserId", "primary_key": "PrimaryKey",
            "hashed_password": "HashedPassword", "expires": "Expires"
        }
    }))
    .unwrap();
    let adapter = AdapterFactory::new(contexts(&conn))
        .columns(columns)
        .connection(Arc::new(conn.clone()))
        .build()
        .unwrap();

    adapter.set_user(UserSchema::new("u1"), None).await.unwrap();
    adapter
        .set_session(SessionSchema::new("s1", "u1", 1000, 2000))
        .await
        .unwrap();
    assert_eq!(conn.snapshot().await["Session"][0]["IdleExpires"], 2000);
}

#[test]
fn test_factory_rejects_duplicate_storage_columns() {
    let err = ColumnMap::new(Entity::User, [("id", "Id"), ("username", "Id")]).unwrap_err();
    assert!(matches!(err, authctx_core::MappingError::DuplicateStorageColumn { .. }));
}
