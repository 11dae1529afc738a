// src/web/handlers/auth_handlers.rs
use rocket::form::Form;
use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

use super::helpers::{internal_failure, read_upload};
use crate::auth::{AuthError, AuthService, OptionalAuth};
use crate::core::PersistedSession;
use crate::types::{Credentials, UserProfile};
use crate::web::session::VisitorSession;
use crate::web::types::*;
use crate::web::AppState;

fn auth_failure(err: AuthError) -> ErrorReply {
    let suggestions = match err {
        AuthError::InvalidCredentials => vec![
            "Check your email and password".to_string(),
            "Try logging in with face recognition".to_string(),
        ],
        AuthError::FaceNotRecognized => vec![
            "Make sure your face is well lit and centered".to_string(),
            "Log in with your email and password".to_string(),
        ],
        AuthError::MissingToken | AuthError::TokenExpired => vec!["Log in again".to_string()],
        AuthError::BackendUnavailable | AuthError::StorageError => {
            vec!["Try again in a few moments".to_string()]
        }
    };

    StandardErrorResponse::new(
        err.message().to_string(),
        err.error_code().to_string(),
        suggestions,
    )
    .reply(err.status())
}

fn service<'a>(state: &'a AppState, visitor: &'a VisitorSession) -> AuthService<'a> {
    AuthService::new(
        state.api.as_ref(),
        PersistedSession::new(state.store.as_ref(), visitor.id()),
    )
}

pub async fn login_handler(
    credentials: Json<Credentials>,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<UserProfile>>, ErrorReply> {
    let user = service(state, &visitor)
        .login(&credentials)
        .await
        .map_err(auth_failure)?;

    Ok(Json(DataResponse::success(
        format!("Welcome back, {}", user.name.as_deref().unwrap_or(&user.email)),
        user,
    )))
}

pub async fn face_login_handler(
    upload: Form<FaceLoginForm<'_>>,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<UserProfile>>, ErrorReply> {
    let image = read_upload(&upload.image, "face")
        .await
        .map_err(|e| internal_failure("read the uploaded image", e))?;

    let user = service(state, &visitor)
        .face_login(&image)
        .await
        .map_err(auth_failure)?;

    Ok(Json(DataResponse::success(
        format!("Welcome back, {}", user.name.as_deref().unwrap_or(&user.email)),
        user,
    )))
}

pub async fn logout_handler(
    auth: OptionalAuth,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<ActionResponse>, ErrorReply> {
    if let Some(user) = &auth.user {
        info!("Logging out {}", user.email().unwrap_or("unknown user"));
    }

    service(state, &visitor)
        .logout(auth.token())
        .await
        .map_err(auth_failure)?;

    Ok(Json(
        ActionResponse::success("Logged out".to_string(), "logout".to_string())
            .with_next_actions(vec!["login".to_string()]),
    ))
}
