// Adapter conformance runner.
//
// Runs every canonical adapter check against an `AuthAdapter`, seeding and
// inspecting storage through a `Database` so that each check observes the
// adapter's effect on real rows. Storage is cleared before every check.
// The run stops at the first failing check.

use std::time::Instant;

use serde_json::json;

use authctx_core::db::adapter::AuthAdapter;
use authctx_core::db::context::Row;
use authctx_core::error::{AdapterError, AdapterResult, ContextError, ErrorCode};

use crate::database::Database;
use crate::generators::{generate_key, generate_session, generate_user};

// ─── Report types ────────────────────────────────────────────────

/// Outcome of a full, successful run.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub passed: Vec<&'static str>,
    pub duration_ms: f64,
}

/// The first check that did not hold.
#[derive(Debug, thiserror::Error)]
pub enum TestFailure {
    #[error("{check}: {reason}")]
    Assertion { check: &'static str, reason: String },

    #[error("{check}: adapter call failed: {source}")]
    Adapter {
        check: &'static str,
        #[source]
        source: AdapterError,
    },

    #[error("{check}: storage access failed: {source}")]
    Storage {
        check: &'static str,
        #[source]
        source: ContextError,
    },
}

impl TestFailure {
    pub fn check(&self) -> &'static str {
        match self {
            Self::Assertion { check, .. } | Self::Adapter { check, .. } | Self::Storage { check, .. } => *check,
        }
    }
}

/// Failure inside one check, before the check name is attached.
#[derive(Debug)]
enum Failure {
    Assertion(String),
    Adapter(AdapterError),
    Storage(ContextError),
}

impl From<AdapterError> for Failure {
    fn from(err: AdapterError) -> Self {
        Self::Adapter(err)
    }
}

impl From<ContextError> for Failure {
    fn from(err: ContextError) -> Self {
        Self::Storage(err)
    }
}

impl Failure {
    fn named(self, check: &'static str) -> TestFailure {
        match self {
            Self::Assertion(reason) => TestFailure::Assertion { check, reason },
            Self::Adapter(source) => TestFailure::Adapter { check, source },
            Self::Storage(source) => TestFailure::Storage { check, source },
        }
    }
}

type CheckResult = Result<(), Failure>;

fn ensure(condition: bool, reason: impl FnOnce() -> String) -> CheckResult {
    if condition {
        Ok(())
    } else {
        Err(Failure::Assertion(reason()))
    }
}

fn ensure_code(result: AdapterResult<()>, expected: ErrorCode) -> CheckResult {
    match result {
        Err(err) if err.code() == Some(expected) => Ok(()),
        Err(err) => Err(Failure::Assertion(format!("expected {expected}, got error: {err}"))),
        Ok(()) => Err(Failure::Assertion(format!("expected {expected}, got success"))),
    }
}

fn partial(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap_or_default()
}

// ─── Checks ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    GetUser,
    SetUser,
    SetUserWithKey,
    SetUserDuplicateKey,
    UpdateUser,
    DeleteUser,
    GetSession,
    GetSessionsByUserId,
    SetSession,
    SetSessionInvalidUser,
    UpdateSession,
    DeleteSession,
    DeleteSessionsByUserId,
    GetKey,
    GetKeysByUserId,
    SetKey,
    SetKeyInvalidUser,
    SetKeyDuplicate,
    UpdateKey,
    DeleteKey,
    DeleteKeysByUserId,
}

impl Check {
    const ALL: [Check; 21] = [
        Check::GetUser,
        Check::SetUser,
        Check::SetUserWithKey,
        Check::SetUserDuplicateKey,
        Check::UpdateUser,
        Check::DeleteUser,
        Check::GetSession,
        Check::GetSessionsByUserId,
        Check::SetSession,
        Check::SetSessionInvalidUser,
        Check::UpdateSession,
        Check::DeleteSession,
        Check::DeleteSessionsByUserId,
        Check::GetKey,
        Check::GetKeysByUserId,
        Check::SetKey,
        Check::SetKeyInvalidUser,
        Check::SetKeyDuplicate,
        Check::UpdateKey,
        Check::DeleteKey,
        Check::DeleteKeysByUserId,
    ];

    fn name(self) -> &'static str {
        match self {
            Check::GetUser => "get_user returns the stored user",
            Check::SetUser => "set_user without a key",
            Check::SetUserWithKey => "set_user with a key",
            Check::SetUserDuplicateKey => "set_user rejects a duplicate key and keeps no user",
            Check::UpdateUser => "update_user",
            Check::DeleteUser => "delete_user",
            Check::GetSession => "get_session returns the stored session",
            Check::GetSessionsByUserId => "get_sessions_by_user_id",
            Check::SetSession => "set_session",
            Check::SetSessionInvalidUser => "set_session rejects an unknown user",
            Check::UpdateSession => "update_session",
            Check::DeleteSession => "delete_session",
            Check::DeleteSessionsByUserId => "delete_sessions_by_user_id",
            Check::GetKey => "get_key returns the stored key",
            Check::GetKeysByUserId => "get_keys_by_user_id",
            Check::SetKey => "set_key",
            Check::SetKeyInvalidUser => "set_key rejects an unknown user",
            Check::SetKeyDuplicate => "set_key rejects a duplicate key id",
            Check::UpdateKey => "update_key",
            Check::DeleteKey => "delete_key",
            Check::DeleteKeysByUserId => "delete_keys_by_user_id",
        }
    }

    async fn run(self, adapter: &dyn AuthAdapter, db: &Database) -> CheckResult {
        match self {
            Check::GetUser => {
                let user = generate_user();
                db.insert_user(&user).await?;
                let found = adapter.get_user(&user.id).await?;
                ensure(found.as_ref() == Some(&user), || format!("expected {user:?}, got {found:?}"))?;
                let missing = adapter.get_user("missing").await?;
                ensure(missing.is_none(), || format!("expected no user, got {missing:?}"))
            }
            Check::SetUser => {
                let user = generate_user();
                adapter.set_user(user.clone(), None).await?;
                let stored = db.user(&user.id).await?;
                ensure(stored.as_ref() == Some(&user), || format!("expected {user:?}, stored {stored:?}"))
            }
            Check::SetUserWithKey => {
                let user = generate_user();
                let key = generate_key(&user.id);
                adapter.set_user(user.clone(), Some(key.clone())).await?;
                ensure(db.user(&user.id).await?.is_some(), || "user row missing".into())?;
                let stored = db.key(&key.id).await?;
                ensure(stored.as_ref() == Some(&key), || format!("expected {key:?}, stored {stored:?}"))
            }
            Check::SetUserDuplicateKey => {
                let owner = generate_user();
                let key = generate_key(&owner.id);
                db.insert_user(&owner).await?;
                db.insert_key(&key).await?;

                let user = generate_user();
                let clash = generate_key(&user.id);
                let clash = authctx_core::KeySchema { id: key.id.clone(), ..clash };
                ensure_code(
                    adapter.set_user(user.clone(), Some(clash)).await,
                    ErrorCode::AuthDuplicateKeyId,
                )?;
                ensure(db.user(&user.id).await?.is_none(), || {
                    "user row survived a failed user+key creation".into()
                })
            }
            Check::UpdateUser => {
                let user = generate_user();
                db.insert_user(&user).await?;
                adapter
                    .update_user(&user.id, partial(json!({"username": "renamed"})))
                    .await?;
                let stored = db.user(&user.id).await?;
                let username = stored.as_ref().and_then(|u| u.attributes.get("username"));
                ensure(username == Some(&json!("renamed")), || format!("username is {username:?}"))
            }
            Check::DeleteUser => {
                let user = generate_user();
                db.insert_user(&user).await?;
                adapter.delete_user(&user.id).await?;
                ensure(db.user(&user.id).await?.is_none(), || "user row not deleted".into())?;
                adapter.delete_user(&user.id).await?;
                Ok(())
            }
            Check::GetSession => {
                let user = generate_user();
                let session = generate_session(&user.id);
                db.insert_user(&user).await?;
                db.insert_session(&session).await?;
                let found = adapter.get_session(&session.id).await?;
                ensure(found.as_ref() == Some(&session), || {
                    format!("expected {session:?}, got {found:?}")
                })?;
                let missing = adapter.get_session("missing").await?;
                ensure(missing.is_none(), || format!("expected no session, got {missing:?}"))
            }
            Check::GetSessionsByUserId => {
                let user = generate_user();
                let other = generate_user();
                db.insert_user(&user).await?;
                db.insert_user(&other).await?;
                let first = generate_session(&user.id);
                let second = generate_session(&user.id);
                db.insert_session(&first).await?;
                db.insert_session(&second).await?;
                db.insert_session(&generate_session(&other.id)).await?;

                let found = adapter.get_sessions_by_user_id(&user.id).await?;
                ensure(
                    found.len() == 2 && found.contains(&first) && found.contains(&second),
                    || format!("expected the user's two sessions, got {found:?}"),
                )?;
                let none = adapter.get_sessions_by_user_id("missing").await?;
                ensure(none.is_empty(), || format!("expected no sessions, got {none:?}"))
            }
            Check::SetSession => {
                let user = generate_user();
                db.insert_user(&user).await?;
                let session = generate_session(&user.id);
                adapter.set_session(session.clone()).await?;
                let stored = db.session(&session.id).await?;
                ensure(stored.as_ref() == Some(&session), || {
                    format!("expected {session:?}, stored {stored:?}")
                })
            }
            Check::SetSessionInvalidUser => {
                let session = generate_session("missing");
                ensure_code(adapter.set_session(session.clone()).await, ErrorCode::AuthInvalidUserId)?;
                ensure(db.session(&session.id).await?.is_none(), || {
                    "session written for an unknown user".into()
                })
            }
            Check::UpdateSession => {
                let user = generate_user();
                let session = generate_session(&user.id);
                db.insert_user(&user).await?;
                db.insert_session(&session).await?;
                let idle = session.idle_expires + 60_000;
                adapter
                    .update_session(&session.id, partial(json!({"idle_expires": idle})))
                    .await?;
                let stored = db.session(&session.id).await?;
                ensure(stored.map(|s| s.idle_expires) == Some(idle), || {
                    "idle_expires not updated".into()
                })
            }
            Check::DeleteSession => {
                let user = generate_user();
                let session = generate_session(&user.id);
                db.insert_user(&user).await?;
                db.insert_session(&session).await?;
                adapter.delete_session(&session.id).await?;
                ensure(db.session(&session.id).await?.is_none(), || "session not deleted".into())
            }
            Check::DeleteSessionsByUserId => {
                let user = generate_user();
                let other = generate_user();
                db.insert_user(&user).await?;
                db.insert_user(&other).await?;
                let kept = generate_session(&other.id);
                db.insert_session(&generate_session(&user.id)).await?;
                db.insert_session(&generate_session(&user.id)).await?;
                db.insert_session(&kept).await?;

                adapter.delete_sessions_by_user_id(&user.id).await?;
                let left = db.session.all().await?;
                ensure(left.len() == 1, || format!("expected one session left, got {left:?}"))?;
                ensure(db.session(&kept.id).await?.is_some(), || {
                    "another user's session was deleted".into()
                })
            }
            Check::GetKey => {
                let user = generate_user();
                let key = generate_key(&user.id);
                db.insert_user(&user).await?;
                db.insert_key(&key).await?;
                let found = adapter.get_key(&key.id).await?;
                ensure(found.as_ref() == Some(&key), || format!("expected {key:?}, got {found:?}"))?;
                let missing = adapter.get_key("missing").await?;
                ensure(missing.is_none(), || format!("expected no key, got {missing:?}"))
            }
            Check::GetKeysByUserId => {
                let user = generate_user();
                db.insert_user(&user).await?;
                let first = generate_key(&user.id);
                let second = generate_key(&user.id).primary(false);
                db.insert_key(&first).await?;
                db.insert_key(&second).await?;

                let found = adapter.get_keys_by_user_id(&user.id).await?;
                ensure(
                    found.len() == 2 && found.contains(&first) && found.contains(&second),
                    || format!("expected the user's two keys, got {found:?}"),
                )
            }
            Check::SetKey => {
                let user = generate_user();
                db.insert_user(&user).await?;
                let key = generate_key(&user.id);
                adapter.set_key(key.clone()).await?;
                let stored = db.key(&key.id).await?;
                ensure(stored.as_ref() == Some(&key), || format!("expected {key:?}, stored {stored:?}"))
            }
            Check::SetKeyInvalidUser => {
                let key = generate_key("missing");
                ensure_code(adapter.set_key(key.clone()).await, ErrorCode::AuthInvalidUserId)?;
                ensure(db.key(&key.id).await?.is_none(), || "key written for an unknown user".into())
            }
            Check::SetKeyDuplicate => {
                let user = generate_user();
                let key = generate_key(&user.id);
                db.insert_user(&user).await?;
                db.insert_key(&key).await?;
                ensure_code(adapter.set_key(key.clone()).await, ErrorCode::AuthDuplicateKeyId)
            }
            Check::UpdateKey => {
                let user = generate_user();
                let key = generate_key(&user.id);
                db.insert_user(&user).await?;
                db.insert_key(&key).await?;
                adapter
                    .update_key(&key.id, partial(json!({"hashed_password": "rehashed"})))
                    .await?;
                let stored = db.key(&key.id).await?;
                let hash = stored.and_then(|k| k.hashed_password);
                ensure(hash.as_deref() == Some("rehashed"), || format!("hashed_password is {hash:?}"))
            }
            Check::DeleteKey => {
                let user = generate_user();
                let key = generate_key(&user.id);
                db.insert_user(&user).await?;
                db.insert_key(&key).await?;
                adapter.delete_key(&key.id).await?;
                ensure(db.key(&key.id).await?.is_none(), || "key not deleted".into())
            }
            Check::DeleteKeysByUserId => {
                let user = generate_user();
                let other = generate_user();
                db.insert_user(&user).await?;
                db.insert_user(&other).await?;
                let kept = generate_key(&other.id);
                db.insert_key(&generate_key(&user.id)).await?;
                db.insert_key(&kept).await?;

                adapter.delete_keys_by_user_id(&user.id).await?;
                let left = db.key.all().await?;
                ensure(left.len() == 1, || format!("expected one key left, got {left:?}"))?;
                ensure(db.key(&kept.id).await?.is_some(), || "another user's key was deleted".into())
            }
        }
    }
}

// ─── Runner ──────────────────────────────────────────────────────

/// Run every adapter check against `adapter`, using `db` to seed and inspect
/// the same storage the adapter writes to.
pub async fn test_adapter(adapter: &dyn AuthAdapter, db: &Database) -> Result<TestReport, TestFailure> {
    let start = Instant::now();
    let mut passed = Vec::with_capacity(Check::ALL.len());
    tracing::info!("running {} adapter checks", Check::ALL.len());

    for check in Check::ALL {
        let name = check.name();
        db.clear()
            .await
            .map_err(|source| TestFailure::Storage { check: name, source })?;

        match check.run(adapter, db).await {
            Ok(()) => {
                tracing::info!("  ✓ {name}");
                passed.push(name);
            }
            Err(failure) => {
                let failure = failure.named(name);
                tracing::error!("  ✗ {failure}");
                return Err(failure);
            }
        }
    }

    db.clear()
        .await
        .map_err(|source| TestFailure::Storage { check: "clean-up", source })?;

    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    tracing::info!("all {} checks passed ({:.3}ms)", passed.len(), duration_ms);
    Ok(TestReport { passed, duration_ms })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use authctx_core::db::columns::ColumnMaps;
    use authctx_core::db::models::{KeySchema, SessionSchema, UserSchema};
    use authctx_memory::{MemoryConnection, TableDefinition};

    /// Accepts every call and never stores anything.
    #[derive(Debug)]
    struct Forgetful;

    #[async_trait]
    impl AuthAdapter for Forgetful {
        async fn get_session(&self, _: &str) -> AdapterResult<Option<SessionSchema>> {
            Ok(None)
        }
        async fn get_sessions_by_user_id(&self, _: &str) -> AdapterResult<Vec<SessionSchema>> {
            Ok(Vec::new())
        }
        async fn set_session(&self, _: SessionSchema) -> AdapterResult<()> {
            Ok(())
        }
        async fn update_session(&self, _: &str, _: Row) -> AdapterResult<()> {
            Ok(())
        }
        async fn delete_session(&self, _: &str) -> AdapterResult<()> {
            Ok(())
        }
        async fn delete_sessions_by_user_id(&self, _: &str) -> AdapterResult<()> {
            Ok(())
        }
        async fn get_user(&self, _: &str) -> AdapterResult<Option<UserSchema>> {
            Ok(None)
        }
        async fn set_user(&self, _: UserSchema, _: Option<KeySchema>) -> AdapterResult<()> {
            Ok(())
        }
        async fn update_user(&self, _: &str, _: Row) -> AdapterResult<()> {
            Ok(())
        }
        async fn delete_user(&self, _: &str) -> AdapterResult<()> {
            Ok(())
        }
        async fn get_key(&self, _: &str) -> AdapterResult<Option<KeySchema>> {
            Ok(None)
        }
        async fn get_keys_by_user_id(&self, _: &str) -> AdapterResult<Vec<KeySchema>> {
            Ok(Vec::new())
        }
        async fn set_key(&self, _: KeySchema) -> AdapterResult<()> {
            Ok(())
        }
        async fn update_key(&self, _: &str, _: Row) -> AdapterResult<()> {
            Ok(())
        }
        async fn delete_key(&self, _: &str) -> AdapterResult<()> {
            Ok(())
        }
        async fn delete_keys_by_user_id(&self, _: &str) -> AdapterResult<()> {
            Ok(())
        }
    }

    fn database() -> Database {
        let conn = MemoryConnection::new([
            TableDefinition::new("user").primary_key("id"),
            TableDefinition::new("session").primary_key("id"),
            TableDefinition::new("key").primary_key("id"),
        ]);
        Database::new(
            Arc::new(conn.context("user")),
            Arc::new(conn.context("session")),
            Arc::new(conn.context("key")),
            ColumnMaps::default(),
        )
    }

    #[tokio::test]
    async fn test_runner_reports_first_failure() {
        let err = test_adapter(&Forgetful, &database()).await.unwrap_err();
        assert_eq!(err.check(), Check::GetUser.name());
        assert!(matches!(err, TestFailure::Assertion { .. }));
    }

    #[tokio::test]
    async fn test_runner_storage_failure() {
        let conn = MemoryConnection::new(Vec::<TableDefinition>::new());
        let db = Database::new(
            Arc::new(conn.context("user")),
            Arc::new(conn.context("session")),
            Arc::new(conn.context("key")),
            ColumnMaps::default(),
        );
        let err = test_adapter(&Forgetful, &db).await.unwrap_err();
        assert!(matches!(err, TestFailure::Storage { .. }));
    }

    #[test]
    fn test_ensure_code() {
        assert!(ensure_code(Ok(()), ErrorCode::AuthInvalidUserId).is_err());
        let err = AdapterError::from(authctx_core::AuthError::invalid_user_id());
        assert!(ensure_code(Err(err), ErrorCode::AuthInvalidUserId).is_ok());
    }

    #[test]
    fn test_check_names_unique() {
        let mut names: Vec<_> = Check::ALL.iter().map(|c| c.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Check::ALL.len());
    }
}
