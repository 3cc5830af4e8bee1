use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, reset_token, reset_token_expires_at, created_at";

impl User {
    /// Find a user by (normalized) email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// Create a user; `None` when the email is already taken.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_token = $2, reset_token_expires_at = $3
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(expires_at)
        .execute(db)
        .await
        .context("store reset token")?;
        Ok(())
    }

    pub async fn find_by_reset_token(db: &PgPool, token: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token = $1"
        ))
        .bind(token)
        .fetch_optional(db)
        .await
        .context("find user by reset token")?;
        Ok(user)
    }

    /// Swap in a new password hash if `token` is still outstanding and not
    /// expired at `now`. The token is cleared in the same statement, so of two
    /// concurrent calls with one token at most one gets `Some`.
    pub async fn consume_reset_token(
        db: &PgPool,
        token: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
               SET password_hash = $2, reset_token = NULL, reset_token_expires_at = NULL
             WHERE reset_token = $1 AND reset_token_expires_at >= $3
            RETURNING id
            "#,
        )
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .fetch_optional(db)
        .await
        .context("consume reset token")?;
        Ok(id)
    }

    /// Delete the user and its tasks in one transaction. Returns false if the
    /// user did not exist.
    pub async fn delete_with_tasks(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let mut tx = db.begin().await.context("begin tx")?;

        sqlx::query("DELETE FROM tasks WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete user tasks")?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete user")?
            .rows_affected();

        tx.commit().await.context("commit tx")?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    /// Needs a migrated database at `DATABASE_URL`.
    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn reset_token_is_single_use_under_concurrency() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let db = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&db).await.unwrap();

        let email = format!("{}@example.com", Uuid::new_v4().simple());
        let user = User::create(&db, "Ada", &email, "old-hash").await.unwrap().unwrap();
        let now = OffsetDateTime::now_utc();
        User::set_reset_token(&db, user.id, "tok", now + Duration::minutes(5))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            User::consume_reset_token(&db, "tok", "hash-a", now),
            User::consume_reset_token(&db, "tok", "hash-b", now),
        );
        let winners = [a.unwrap(), b.unwrap()].into_iter().flatten().count();
        assert_eq!(winners, 1);

        User::delete_with_tasks(&db, user.id).await.unwrap();
    }

    /// Needs a migrated database at `DATABASE_URL`.
    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn expired_reset_token_is_not_consumed() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let db = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&db).await.unwrap();

        let email = format!("{}@example.com", Uuid::new_v4().simple());
        let user = User::create(&db, "Ada", &email, "old-hash").await.unwrap().unwrap();
        let now = OffsetDateTime::now_utc();
        User::set_reset_token(&db, user.id, "stale", now - Duration::minutes(1))
            .await
            .unwrap();

        assert!(User::consume_reset_token(&db, "stale", "new-hash", now)
            .await
            .unwrap()
            .is_none());
        let after = User::find_by_id(&db, user.id).await.unwrap().unwrap();
        assert_eq!(after.password_hash, "old-hash");

        User::delete_with_tasks(&db, user.id).await.unwrap();
    }
}
