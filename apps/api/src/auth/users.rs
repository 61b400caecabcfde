use sqlx::PgPool;

use super::UserInfo;
use crate::models::user::User;

/// Returns the local user for `info.user_id`, creating it on first sight and
/// refreshing email and name from the latest token otherwise.
pub async fn get_or_create_user(db: &PgPool, info: &UserInfo) -> Result<User, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO users (external_id, email, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (external_id) DO UPDATE SET
            email      = COALESCE(EXCLUDED.email, users.email),
            name       = COALESCE(EXCLUDED.name, users.name),
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(&info.user_id)
    .bind(info.email.as_deref())
    .bind(info.name.as_deref())
    .fetch_one(db)
    .await
}
