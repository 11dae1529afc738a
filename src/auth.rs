// src/auth.rs
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, State};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::core::{JobBoardApi, PersistedSession};
use crate::types::{Credentials, UploadedFile, UserProfile};
use crate::web::session::VisitorSession;
use crate::web::AppState;

/// Claims the backend puts in its tokens. Only expiry is acted upon here;
/// signature verification stays with the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default, alias = "userId")]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }
}

/// Decode the claims of a JWT without verifying it. Tokens that are not
/// JWTs are opaque to the front end and yield `None`.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            debug!("Treating token as opaque: {}", e);
            None
        }
    }
}

pub fn token_expired(token: &str, now: DateTime<Utc>) -> bool {
    decode_claims(token)
        .and_then(|claims| claims.expires_at())
        .map_or(false, |expires_at| expires_at <= now)
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    TokenExpired,
    InvalidCredentials,
    FaceNotRecognized,
    BackendUnavailable,
    StorageError,
}

impl AuthError {
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Please log in to continue",
            AuthError::TokenExpired => "Your session has expired. Please log in again",
            AuthError::InvalidCredentials => "Invalid email or password",
            AuthError::FaceNotRecognized => "Face not recognized. Try again or use your password",
            AuthError::BackendUnavailable => "Authentication service unavailable",
            AuthError::StorageError => "Could not read your session",
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "AUTHENTICATION_REQUIRED",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::FaceNotRecognized => "FACE_NOT_RECOGNIZED",
            AuthError::BackendUnavailable => "AUTH_BACKEND_UNAVAILABLE",
            AuthError::StorageError => "STORAGE_ERROR",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::InvalidCredentials
            | AuthError::FaceNotRecognized => Status::Unauthorized,
            AuthError::BackendUnavailable => Status::BadGateway,
            AuthError::StorageError => Status::InternalServerError,
        }
    }
}

/// Visitor with a stored, unexpired token
pub struct AuthenticatedUser {
    pub token: String,
    pub user: Option<UserProfile>,
    pub session_id: String,
}

impl AuthenticatedUser {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.email.as_str())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let state = match req.guard::<&State<AppState>>().await {
            Outcome::Success(state) => state,
            Outcome::Error((status, _)) => return Outcome::Error((status, AuthError::StorageError)),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let visitor = match req.guard::<VisitorSession>().await {
            Outcome::Success(visitor) => visitor,
            Outcome::Error((status, _)) => return Outcome::Error((status, AuthError::StorageError)),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let session = PersistedSession::new(state.store.as_ref(), visitor.id());

        let token = match session.auth_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No stored token for visitor session");
                return Outcome::Error((Status::Unauthorized, AuthError::MissingToken));
            }
            Err(e) => {
                error!("Failed to read stored token: {}", e);
                return Outcome::Error((Status::InternalServerError, AuthError::StorageError));
            }
        };

        if token_expired(&token, Utc::now()) {
            warn!("Stored token expired, clearing credentials");
            if let Err(e) = session.clear_credentials().await {
                error!("Failed to clear expired credentials: {}", e);
            }
            return Outcome::Error((Status::Unauthorized, AuthError::TokenExpired));
        }

        let user = session.auth_user().await.unwrap_or_else(|e| {
            warn!("Failed to read stored user: {}", e);
            None
        });

        Outcome::Success(AuthenticatedUser {
            token,
            user,
            session_id: visitor.id().to_string(),
        })
    }
}

// Optional auth guard that doesn't fail if no auth is provided
pub struct OptionalAuth {
    pub user: Option<AuthenticatedUser>,
}

impl OptionalAuth {
    pub fn token(&self) -> Option<&str> {
        self.user.as_ref().map(AuthenticatedUser::token)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OptionalAuth {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthenticatedUser::from_request(req).await {
            Outcome::Success(auth) => Outcome::Success(OptionalAuth { user: Some(auth) }),
            _ => Outcome::Success(OptionalAuth { user: None }),
        }
    }
}

/// Login and logout against the backend, keeping credentials in the
/// visitor's persisted session
pub struct AuthService<'a> {
    api: &'a dyn JobBoardApi,
    session: PersistedSession<'a>,
}

impl<'a> AuthService<'a> {
    pub fn new(api: &'a dyn JobBoardApi, session: PersistedSession<'a>) -> Self {
        Self { api, session }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile, AuthError> {
        let response = self.api.login(credentials).await.map_err(|e| {
            if e.status().is_some() {
                warn!("Login rejected for {}", credentials.email);
                AuthError::InvalidCredentials
            } else {
                error!("Login request failed: {}", e);
                AuthError::BackendUnavailable
            }
        })?;

        self.remember(&response.token, response.user).await
    }

    /// The face match itself is the backend's business
    pub async fn face_login(&self, image: &UploadedFile) -> Result<UserProfile, AuthError> {
        let response = self.api.face_login(image).await.map_err(|e| {
            if e.status().is_some() {
                warn!("Face login rejected");
                AuthError::FaceNotRecognized
            } else {
                error!("Face login request failed: {}", e);
                AuthError::BackendUnavailable
            }
        })?;

        self.remember(&response.token, response.user).await
    }

    async fn remember(&self, token: &str, user: UserProfile) -> Result<UserProfile, AuthError> {
        self.session
            .store_credentials(token, &user)
            .await
            .map_err(|e| {
                error!("Failed to store credentials: {}", e);
                AuthError::StorageError
            })?;

        info!("User {} logged in", user.email);
        Ok(user)
    }

    /// Local credentials are cleared even when the backend call fails
    pub async fn logout(&self, token: Option<&str>) -> Result<(), AuthError> {
        if let Some(token) = token {
            if let Err(e) = self.api.logout(token).await {
                warn!("Backend logout failed: {}", e);
            }
        }

        self.session.clear_credentials().await.map_err(|e| {
            error!("Failed to clear credentials: {}", e);
            AuthError::StorageError
        })?;
        info!("Visitor logged out");
        Ok(())
    }
}
