use lazy_static::lazy_static;
use rand::RngCore;
use regex::Regex;
use sqlx::PgPool;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::AuthResponse,
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo_types::User,
};
use crate::error::{AppError, FieldError};

pub const INVALID_CREDENTIALS: &str = "Incorrect email or password.";
pub const SIGNUP_REJECTED: &str = "Unable to create an account with that email.";
pub const RESET_REQUESTED: &str =
    "If an account exists for this email, a password reset link will be sent.";
pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Field-level checks for signup input. `email` must already be normalized.
pub fn validate_signup(name: &str, email: &str, password: &str) -> Result<(), AppError> {
    let mut fields = Vec::new();
    if name.trim().is_empty() {
        fields.push(FieldError::new("name", "Name is required."));
    }
    if !is_valid_email(email) {
        fields.push(FieldError::new("email", "Invalid email."));
    }
    if let Err(f) = check_password(password) {
        fields.push(f);
    }
    if fields.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(fields))
    }
}

fn check_password(password: &str) -> Result<(), FieldError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(FieldError::new(
            "password",
            format!("Password must be at least {} characters.", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

/// 32 random bytes, hex encoded.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn issue_tokens(keys: &JwtKeys, user: User) -> Result<AuthResponse, AppError> {
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    })
}

pub async fn signup(db: &PgPool, name: &str, email: &str, password: &str) -> Result<User, AppError> {
    let email = normalize_email(email);
    validate_signup(name, &email, password)?;

    let hash = hash_password(password)?;
    match User::create(db, name.trim(), &email, &hash).await? {
        Some(user) => {
            info!(user_id = %user.id, "user registered");
            Ok(user)
        }
        None => {
            warn!("signup with existing email");
            Err(AppError::Auth(SIGNUP_REJECTED.into()))
        }
    }
}

pub async fn authenticate(db: &PgPool, email: &str, password: &str) -> Result<User, AppError> {
    let email = normalize_email(email);
    let Some(user) = User::find_by_email(db, &email).await? else {
        warn!("signin for unknown email");
        return Err(AppError::Auth(INVALID_CREDENTIALS.into()));
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "signin with wrong password");
        return Err(AppError::Auth(INVALID_CREDENTIALS.into()));
    }

    info!(user_id = %user.id, "user signed in");
    Ok(user)
}

/// Issues a single-use reset token. `None` for unknown emails; callers answer
/// both cases the same way.
pub async fn initiate_password_reset(
    db: &PgPool,
    email: &str,
    ttl_minutes: i64,
    now: OffsetDateTime,
) -> Result<Option<String>, AppError> {
    let email = normalize_email(email);
    let Some(user) = User::find_by_email(db, &email).await? else {
        return Ok(None);
    };

    let token = generate_reset_token();
    let expires_at = now + TimeDuration::minutes(ttl_minutes);
    User::set_reset_token(db, user.id, &token, expires_at).await?;
    info!(user_id = %user.id, %expires_at, "password reset token issued");
    Ok(Some(token))
}

pub async fn reset_password(
    db: &PgPool,
    token: &str,
    password: &str,
    now: OffsetDateTime,
) -> Result<Uuid, AppError> {
    check_password(password).map_err(|f| AppError::Validation(vec![f]))?;

    let hash = hash_password(password)?;
    if let Some(user_id) = User::consume_reset_token(db, token, &hash, now).await? {
        info!(%user_id, "password reset");
        return Ok(user_id);
    }

    let holder = User::find_by_reset_token(db, token).await?;
    warn!("password reset with unusable token");
    Err(reset_rejection(holder.as_ref(), now))
}

/// Why a token could not be consumed: it is still on file but past its expiry,
/// or it is unknown (never issued, already used, or replaced).
fn reset_rejection(holder: Option<&User>, now: OffsetDateTime) -> AppError {
    match holder {
        Some(user) if !reset_token_usable(user.reset_token_expires_at, now) => {
            AppError::Auth("Token has expired.".into())
        }
        _ => AppError::Auth("Token is not valid.".into()),
    }
}

fn reset_token_usable(expires_at: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    expires_at.is_some_and(|at| now <= at)
}

pub async fn delete_account(db: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    if User::delete_with_tasks(db, user_id).await? {
        info!(%user_id, "account deleted");
        Ok(())
    } else {
        Err(AppError::NotFound("User not found.".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example.com"));
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn signup_validation_reports_every_field() {
        let err = validate_signup(" ", "nope", "short").unwrap_err();
        match err {
            AppError::Validation(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.field).collect();
                assert_eq!(names, vec!["name", "email", "password"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(validate_signup("Ada", "ada@example.com", "long-enough").is_ok());
    }

    #[test]
    fn reset_tokens_are_random_hex() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn reset_token_expiry() {
        let at = datetime!(2024-01-01 12:00 UTC);
        assert!(reset_token_usable(Some(at), datetime!(2024-01-01 11:59 UTC)));
        assert!(!reset_token_usable(Some(at), datetime!(2024-01-01 12:01 UTC)));
        assert!(!reset_token_usable(None, at));
    }

    #[test]
    fn reset_rejection_tells_expired_from_unknown() {
        let now = datetime!(2024-01-01 12:00 UTC);
        let holder = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "x".into(),
            reset_token: Some("tok".into()),
            reset_token_expires_at: Some(datetime!(2024-01-01 11:00 UTC)),
            created_at: now,
        };
        assert_eq!(
            reset_rejection(Some(&holder), now).to_string(),
            "Token has expired."
        );
        // A holder whose token is still live lost a race with another reset.
        let live = User {
            reset_token_expires_at: Some(datetime!(2024-01-01 13:00 UTC)),
            ..holder
        };
        assert_eq!(reset_rejection(Some(&live), now).to_string(), "Token is not valid.");
        assert_eq!(reset_rejection(None, now).to_string(), "Token is not valid.");
    }
}
