use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    dto::{AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest},
    jwt::JwtKeys,
    repo::{NewUser, User},
};
use crate::error::AppError;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 72;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    username.chars().count() <= MAX_NAME_LEN && USERNAME_RE.is_match(username)
}

fn check_name(field: &str, value: &str) -> Result<(), AppError> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "{field} must be 1 to {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn check_password(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::validation("Password too short"));
    }
    Ok(())
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Normalizes and validates a registration request in place.
pub(crate) fn validate_registration(req: &mut RegisterRequest) -> Result<(), AppError> {
    req.email = req.email.trim().to_lowercase();
    req.username = req.username.trim().to_string();

    if !is_valid_email(&req.email) {
        warn!(email = %req.email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    if !is_valid_username(&req.username) {
        warn!(username = %req.username, "invalid username");
        return Err(AppError::validation("Invalid username"));
    }
    check_name("first_name", &req.first_name)?;
    check_name("last_name", &req.last_name)?;
    check_password(&req.password)
}

fn issue_tokens(keys: &JwtKeys, user: User) -> Result<AuthResponse, AppError> {
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    })
}

pub async fn register(db: &PgPool, keys: &JwtKeys, mut req: RegisterRequest) -> Result<AuthResponse, AppError> {
    validate_registration(&mut req)?;

    if User::find_by_email(db, &req.email).await?.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(AppError::conflict("Email already registered"));
    }

    let hash = hash_password(&req.password)?;
    let user = User::create(
        db,
        NewUser {
            email: &req.email,
            username: &req.username,
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            password_hash: &hash,
        },
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue_tokens(keys, user)
}

pub async fn login(db: &PgPool, keys: &JwtKeys, mut req: LoginRequest) -> Result<AuthResponse, AppError> {
    req.email = req.email.trim().to_lowercase();
    if !is_valid_email(&req.email) {
        warn!(email = %req.email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }

    let Some(user) = User::find_by_email(db, &req.email).await? else {
        warn!(email = %req.email, "login unknown email");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    info!(user_id = %user.id, "user logged in");
    issue_tokens(keys, user)
}

pub async fn refresh(db: &PgPool, keys: &JwtKeys, refresh_token: &str) -> Result<AuthResponse, AppError> {
    let claims = keys
        .verify_refresh(refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;
    let user = User::find_by_id(db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    issue_tokens(keys, user)
}

pub async fn change_password(db: &PgPool, user_id: Uuid, req: ChangePasswordRequest) -> Result<(), AppError> {
    check_password(&req.new_password)?;
    let user = User::find_by_id(db, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if !verify_password(&req.current_password, &user.password_hash)? {
        warn!(user_id = %user_id, "wrong current password");
        return Err(AppError::validation("Current password is incorrect"));
    }

    let hash = hash_password(&req.new_password)?;
    User::update_password(db, user_id, &hash).await?;
    info!(user_id = %user_id, "password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> RegisterRequest {
        RegisterRequest {
            email: "  Cook@Example.COM ".into(),
            username: "cook.42".into(),
            first_name: "Ada".into(),
            last_name: "Baker".into(),
            password: "Secur3P@ssw0rd!".into(),
        }
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("Secur3P@ssw0rd!").expect("hashing should succeed");
        assert!(verify_password("Secur3P@ssw0rd!", &hash).expect("verify should succeed"));
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }

    #[test]
    fn registration_normalizes_email() {
        let mut req = registration();
        validate_registration(&mut req).expect("valid registration");
        assert_eq!(req.email, "cook@example.com");
    }

    #[test]
    fn registration_rejects_bad_fields() {
        let mut req = RegisterRequest {
            username: "has space".into(),
            ..registration()
        };
        assert!(matches!(validate_registration(&mut req), Err(AppError::Validation(_))));

        let mut req = RegisterRequest {
            first_name: "   ".into(),
            ..registration()
        };
        assert!(matches!(validate_registration(&mut req), Err(AppError::Validation(_))));

        let mut req = RegisterRequest {
            password: "short".into(),
            ..registration()
        };
        assert!(matches!(validate_registration(&mut req), Err(AppError::Validation(_))));

        let mut req = RegisterRequest {
            email: "not-an-email".into(),
            ..registration()
        };
        assert!(matches!(validate_registration(&mut req), Err(AppError::Validation(_))));
    }

    #[test]
    fn username_rules() {
        assert!(is_valid_username("chef_anna+1@home"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("semi;colon"));
        assert!(!is_valid_username(&"a".repeat(73)));
    }
}
