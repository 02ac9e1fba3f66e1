// Referential integrity pre-check for rows that point at a user.

use authctx_core::db::context::{DataContext, WhereClause};
use authctx_core::error::{AdapterResult, AuthError};

/// Fail with `AuthInvalidUserId` unless `users` holds a row whose
/// `id_column` equals `user_id`. Only counts; never reads row content.
pub async fn ensure_user_exists(
    users: &dyn DataContext,
    id_column: &str,
    user_id: &str,
) -> AdapterResult<()> {
    let n = users
        .filter(WhereClause::eq(id_column, user_id))
        .count()
        .await?;
    if n == 0 {
        tracing::debug!(table = users.table(), user_id, "referenced user does not exist");
        return Err(AuthError::invalid_user_id().into());
    }
    Ok(())
}
