// Record generators with unique ids.

use chrono::{Duration, Utc};
use uuid::Uuid;

use authctx_core::db::models::{KeySchema, SessionSchema, UserSchema};

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// A user with a random id and a matching `username` attribute.
pub fn generate_user() -> UserSchema {
    let id = short_id();
    UserSchema::new(id.clone()).with_attribute("username", format!("user_{id}"))
}

/// A session for `user_id`, active for one hour and idle-valid for two.
pub fn generate_session(user_id: &str) -> SessionSchema {
    let now = Utc::now();
    SessionSchema::new(
        Uuid::new_v4().to_string(),
        user_id,
        (now + Duration::hours(1)).timestamp_millis(),
        (now + Duration::hours(2)).timestamp_millis(),
    )
}

/// A primary password key for `user_id`.
pub fn generate_key(user_id: &str) -> KeySchema {
    KeySchema::new(format!("username:{}", short_id()), user_id)
        .primary(true)
        .hashed_password(format!("hashed:{}", Uuid::new_v4().simple()))
}
