use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use stashpad_db::Database;
use stashpad_db::models::UserRow;
use stashpad_types::api::{
    EmailRequest, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, ResetPasswordRequest,
    TokenRequest,
};

use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::run_db;
use crate::tokens::{self, EMAIL_VERIFY, PASSWORD_RESET, TokenError};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub require_email_verification: bool,
    /// Base URL used to build links in outgoing email.
    pub public_url: String,
    pub mailer: Mailer,
}

const MIN_PASSWORD_CHARS: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();
    if !(3..=32).contains(&username.chars().count()) {
        return Err(ApiError::bad_request("username must be 3-32 characters"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("invalid email address"));
    }
    check_password(&req.password)?;

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    let (id, name, addr, hash) = (user_id.to_string(), username.clone(), email.clone(), password_hash.clone());
    run_db(&state, move |db| {
        if db.username_taken(&name)? {
            return Err(ApiError::Conflict("username already taken".into()));
        }
        if db.email_taken(&addr)? {
            return Err(ApiError::Conflict("email already registered".into()));
        }
        db.create_user(&id, &name, &addr, &hash)?;
        Ok(())
    })
    .await?;
    info!("Registered user {} ({})", username, user_id);

    let token = if state.require_email_verification {
        send_verification(&state, user_id, &email, &password_hash).await;
        None
    } else {
        Some(tokens::create_session_token(&state.jwt_secret, user_id, &username)?)
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            token,
            verification_required: state.require_email_verification,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unreadable: {e}")))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    if state.require_email_verification && !user.email_verified {
        return Err(ApiError::Forbidden("verify your email before logging in".into()));
    }

    let user_id = parse_user_id(&user)?;
    let token = tokens::create_session_token(&state.jwt_secret, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = user_for_token(&state, &req.token, EMAIL_VERIFY).await?;
    let id = user.id.clone();
    let newly_verified = run_db(&state, move |db| db.mark_email_verified(&id)).await?;
    if newly_verified {
        info!("Email verified for {}", user.username);
    }
    Ok(Json(json!({ "verified": true, "already_verified": !newly_verified })))
}

/// Always 202 so the endpoint cannot be used to probe for accounts.
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    if let Some(user) = run_db(&state, move |db| db.get_user_by_email(&email)).await? {
        if !user.email_verified {
            let user_id = parse_user_id(&user)?;
            send_verification(&state, user_id, &user.email, &user.password).await;
        }
    }
    Ok(accepted())
}

/// Always 202, like [`resend_verification`].
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    if let Some(user) = run_db(&state, move |db| db.get_user_by_email(&email)).await? {
        let user_id = parse_user_id(&user)?;
        let token = tokens::create_purpose_token(
            &state.jwt_secret,
            user_id,
            PASSWORD_RESET,
            &user.password,
            tokens::reset_lifetime(),
        )?;
        let link = format!("{}/reset-password?token={}", state.public_url.trim_end_matches('/'), token);
        state
            .mailer
            .send_best_effort(
                &user.email,
                "Reset your Stashpad password",
                &format!("Use this link within the next hour to choose a new password:\n\n{link}\n"),
            )
            .await;
    }
    Ok(accepted())
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_password(&req.password)?;
    let user = user_for_token(&state, &req.token, PASSWORD_RESET).await?;

    let password_hash = hash_password(&req.password)?;
    let id = user.id.clone();
    run_db(&state, move |db| db.set_password_hash(&id, &password_hash)).await?;
    info!("Password reset for {}", user.username);

    Ok(Json(json!({ "reset": true })))
}

fn accepted() -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "If the account exists, an email has been sent." })),
    )
}

/// Resolve a purpose token to its user, refusing tokens minted against an
/// older password.
async fn user_for_token(state: &AppState, token: &str, purpose: &'static str) -> Result<UserRow, ApiError> {
    let claims = tokens::decode_purpose_token(&state.jwt_secret, token, purpose).map_err(|e| {
        if e == TokenError::Expired {
            info!("Rejected expired {} token", purpose);
        }
        ApiError::bad_request(e.to_string())
    })?;

    let id = claims.sub.to_string();
    let user = run_db(state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::bad_request(TokenError::Invalid.to_string()))?;

    if !tokens::matches_password(&claims, &user.password) {
        warn!("Stale {} token for {}", purpose, user.username);
        return Err(ApiError::bad_request(TokenError::Invalid.to_string()));
    }
    Ok(user)
}

async fn send_verification(state: &AppState, user_id: Uuid, email: &str, password_hash: &str) {
    let token = match tokens::create_purpose_token(
        &state.jwt_secret,
        user_id,
        EMAIL_VERIFY,
        password_hash,
        tokens::verify_lifetime(),
    ) {
        Ok(token) => token,
        Err(e) => {
            warn!("Could not create verification token for {}: {}", user_id, e);
            return;
        }
    };
    let link = format!("{}/verify-email?token={}", state.public_url.trim_end_matches('/'), token);
    state
        .mailer
        .send_best_effort(
            email,
            "Verify your Stashpad email",
            &format!("Confirm your address within 24 hours:\n\n{link}\n"),
        )
        .await;
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

fn check_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}

fn parse_user_id(user: &UserRow) -> Result<Uuid, ApiError> {
    user.id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("user id {:?} is not a uuid: {e}", user.id)))
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}
