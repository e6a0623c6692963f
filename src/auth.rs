use std::{collections::HashMap, sync::Arc};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tower_sessions::cookie::{self, Cookie, SameSite};
use tracing::{event, Level};
use uuid::Uuid;

use crate::{
    domain::{User, UserId},
    error::AppError,
    repositories::{RepositoryError, UserRepository},
    state::AppState,
};

pub static SESSION_COOKIE_NAME: &str = "session";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication credentials were not provided")]
    MissingCredentials,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("session is invalid or expired")]
    InvalidSession,

    #[error("session has been logged out")]
    RevokedSession,

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("failed to hash password")]
    PasswordHash,

    #[error("failed to issue session token: {0}")]
    TokenEncoding(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// The user behind a validated session, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub username: String,
    pub session: Claims,
}

pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and validates session tokens and remembers logged-out sessions until they expire.
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    revoked: Mutex<HashMap<Uuid, i64>>,
}

impl SessionManager {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        SessionManager {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
            revoked: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: &User) -> Result<IssuedSession, AuthError> {
        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::TokenEncoding(String::from("session expiry is out of range")))?;
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            jti: Uuid::new_v4(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenEncoding(e.to_string()))?;

        Ok(IssuedSession { token, expires_at })
    }

    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            event!(Level::DEBUG, "Failed to decode session token: {}", e);
            AuthError::InvalidSession
        })?;

        if self.revoked.lock().await.contains_key(&token_data.claims.jti) {
            return Err(AuthError::RevokedSession);
        }

        Ok(token_data.claims)
    }

    pub async fn revoke(&self, claims: &Claims) {
        let now = Utc::now().timestamp();
        let mut lock = self.revoked.lock().await;
        lock.retain(|_, exp| *exp > now);
        lock.insert(claims.jti, claims.exp);
    }
}

pub fn default_password_hasher() -> Argon2<'static> {
    Argon2::default()
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: SessionManager,
    hasher: Argon2<'static>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: SessionManager,
        hasher: Argon2<'static>,
    ) -> Self {
        AuthService {
            users,
            sessions,
            hasher,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .hasher
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::PasswordHash)?;

        let user = self.users.create(username, &password_hash).await?;
        event!(Level::INFO, "Registered user {} with id {}", user.username, user.id);
        Ok(user)
    }

    /// Creates the user unless one with that username already exists.
    pub async fn ensure_user(&self, username: &str, password: &str) -> Result<User, AuthError> {
        match self.users.find_by_username(username.trim()).await? {
            Some(existing) => Ok(existing),
            None => self.register(username, password).await,
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let user = self
            .users
            .find_by_username(username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let parsed_hash =
            PasswordHash::new(&user.password_hash).map_err(|_| AuthError::InvalidCredentials)?;
        self.hasher
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let session = self.sessions.issue(&user)?;
        event!(Level::INFO, "User {} logged in", user.username);
        Ok(session)
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.sessions.validate(token).await?;
        let id: UserId = claims.sub.parse().map_err(|_| AuthError::InvalidSession)?;

        // the account may have been removed since the session was issued
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::InvalidSession)?;

        Ok(AuthenticatedUser {
            id: user.id,
            username: user.username,
            session: claims,
        })
    }

    pub async fn logout(&self, user: &AuthenticatedUser) {
        self.sessions.revoke(&user.session).await;
        event!(Level::INFO, "User {} ({}) logged out", user.username, user.id);
    }
}

/// Pulls the session token from `Authorization: Bearer <token>` or the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let token = auth_header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());
        if token.is_some() {
            return token.map(String::from);
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE_NAME && !cookie.value_trimmed().is_empty())
        .map(|cookie| cookie.value_trimmed().to_string())
}

fn build_session_cookie(value: &str, max_age_seconds: i64) -> Option<HeaderValue> {
    let session = Cookie::build((SESSION_COOKIE_NAME, value))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(max_age_seconds))
        .build();

    HeaderValue::from_str(&session.to_string()).ok()
}

pub fn session_cookie(token: &str, max_age: Duration) -> Option<HeaderValue> {
    build_session_cookie(token, max_age.num_seconds())
}

/// Expires the session cookie in the browser.
pub fn cleared_session_cookie() -> Option<HeaderValue> {
    build_session_cookie("", 0)
}

pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(request.headers()).ok_or_else(|| {
        event!(Level::DEBUG, "No session found on {} {}", request.method(), request.uri());
        AuthError::MissingCredentials
    })?;

    let user = state.auth_service.authenticate(&token).await?;
    event!(Level::DEBUG, "Authenticated request for user {}", user.username);

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
pub fn minimal_cost_password_hasher() -> Argon2<'static> {
    use argon2::{Algorithm as Argon2Algorithm, Params, Version};

    let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None)
        .expect("minimum argon2 params are valid");
    Argon2::new(Argon2Algorithm::Argon2id, Version::V0x13, params)
}
