// src/web/mod.rs

pub mod handlers;
pub mod session;
pub mod types;


pub use handlers::*;
pub use types::*;

use crate::application::{FieldEdit, FlowView, InFlightRegistry, Mounted, ResumeVault};
use crate::auth::{AuthenticatedUser, OptionalAuth};
use crate::core::{JobBoardApi, KeyValueStore, ServiceClient, SqliteKeyValueStore};
use crate::database::DatabaseConfig;
use crate::environment::EnvironmentConfig;
use crate::mbti::{AnswerOutcome, AnswerRequest, TestView};
use crate::types::{Credentials, UserProfile};
use anyhow::Result;
use rocket::data::{Limits, ToByteUnit};
use rocket::Either;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{catchers, delete, get, post, routes, Build, Rocket, State};
use session::VisitorSession;
use std::sync::Arc;
use tracing::{error, info};

/// Everything the routes share
pub struct AppState {
    pub api: Arc<dyn JobBoardApi>,
    pub store: Arc<dyn KeyValueStore>,
    pub vault: ResumeVault,
    pub in_flight: InFlightRegistry,
}

impl AppState {
    pub fn new(api: Arc<dyn JobBoardApi>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            api,
            store,
            vault: ResumeVault::new(),
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Keep idle resume uploads for `minutes` instead of the default
    pub fn with_resume_ttl(mut self, minutes: u64) -> Self {
        let ttl = i64::try_from(minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or(chrono::Duration::MAX);
        self.vault = ResumeVault::with_ttl(ttl);
        self
    }
}

// ===== Job page & application flow =====

#[get("/jobs/<job_id>?<query..>")]
pub async fn job_page(
    job_id: &str,
    query: JobPageQuery,
    auth: OptionalAuth,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<Mounted>>, ErrorReply> {
    handlers::job_page_handler(job_id, query, auth, visitor, state).await
}

#[post("/jobs/<job_id>/application/fields", data = "<edit>")]
pub async fn edit_fields(
    job_id: &str,
    edit: Json<FieldEdit>,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<FlowView>>, ErrorReply> {
    handlers::edit_fields_handler(job_id, edit, auth, visitor, state).await
}

#[post("/jobs/<job_id>/application/resume", data = "<upload>")]
pub async fn attach_resume(
    job_id: &str,
    upload: Form<ResumeUploadForm<'_>>,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<FlowView>>, ErrorReply> {
    handlers::attach_resume_handler(job_id, upload, auth, visitor, state).await
}

#[delete("/jobs/<job_id>/application/resume")]
pub async fn detach_resume(
    job_id: &str,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<FlowView>>, ErrorReply> {
    handlers::detach_resume_handler(job_id, auth, visitor, state).await
}

#[post("/jobs/<job_id>/application/next")]
pub async fn advance(
    job_id: &str,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Either<Redirect, Json<DataResponse<FlowView>>>, ErrorReply> {
    handlers::advance_handler(job_id, auth, visitor, state).await
}

#[post("/jobs/<job_id>/application/back")]
pub async fn retreat(
    job_id: &str,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<FlowView>>, ErrorReply> {
    handlers::retreat_handler(job_id, auth, visitor, state).await
}

#[post("/jobs/<job_id>/application/submit")]
pub async fn submit(
    job_id: &str,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<FlowView>>, ErrorReply> {
    handlers::submit_handler(job_id, auth, visitor, state).await
}

#[post("/jobs/<job_id>/application/cancel")]
pub async fn cancel(
    job_id: &str,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<FlowView>>, ErrorReply> {
    handlers::cancel_handler(job_id, auth, visitor, state).await
}

// ===== MBTI test =====

#[get("/mbti-test?<query..>")]
pub async fn mbti_test(
    query: MbtiQuery,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<TestView>>, ErrorReply> {
    handlers::begin_test_handler(query, auth, visitor, state).await
}

#[post("/mbti-test/answer?<query..>", data = "<request>")]
pub async fn mbti_answer(
    query: MbtiQuery,
    request: Json<AnswerRequest>,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Either<Redirect, Json<DataResponse<AnswerOutcome>>>, ErrorReply> {
    handlers::answer_handler(query, request, auth, visitor, state).await
}

// ===== Auth =====

#[post("/auth/login", data = "<credentials>")]
pub async fn login(
    credentials: Json<Credentials>,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<UserProfile>>, ErrorReply> {
    handlers::login_handler(credentials, visitor, state).await
}

#[post("/auth/face-login", data = "<upload>")]
pub async fn face_login(
    upload: Form<FaceLoginForm<'_>>,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<UserProfile>>, ErrorReply> {
    handlers::face_login_handler(upload, visitor, state).await
}

#[post("/auth/logout")]
pub async fn logout(
    auth: OptionalAuth,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<ActionResponse>, ErrorReply> {
    handlers::logout_handler(auth, visitor, state).await
}

#[get("/health")]
pub async fn health(auth: OptionalAuth) -> Json<TextResponse> {
    handlers::health_handler(auth).await
}

// Error catchers
#[rocket::catch(400)]
pub fn bad_request() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Invalid request format".to_string(),
        "BAD_REQUEST".to_string(),
        vec![
            "Check your request JSON format".to_string(),
            "Verify all required fields are present".to_string(),
        ],
    ))
}

#[rocket::catch(401)]
pub fn unauthorized() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Please log in to continue".to_string(),
        "AUTHENTICATION_REQUIRED".to_string(),
        vec!["Log in and try again".to_string()],
    ))
}

#[rocket::catch(404)]
pub fn not_found() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Resource not found".to_string(),
        "NOT_FOUND".to_string(),
        vec!["Check the address you requested".to_string()],
    ))
}

#[rocket::catch(422)]
pub fn unprocessable() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "The request body could not be understood".to_string(),
        "UNPROCESSABLE_ENTITY".to_string(),
        vec!["Verify field names and value types".to_string()],
    ))
}

#[rocket::catch(500)]
pub fn internal_error() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Internal server error".to_string(),
        "INTERNAL_ERROR".to_string(),
        vec![
            "Try again in a few moments".to_string(),
            "Contact support if the problem persists".to_string(),
        ],
    ))
}

/// Assemble the server; used by `start_web_server` and by the route tests
pub fn build_rocket(state: AppState, port: u16) -> Rocket<Build> {
    let limits = Limits::default()
        .limit("file", 10.mebibytes())
        .limit("data-form", 12.mebibytes());

    let figment = rocket::Config::figment()
        .merge(("address", "0.0.0.0"))
        .merge(("port", port))
        .merge(("limits", limits));

    rocket::custom(figment)
        .manage(state)
        .register(
            "/",
            catchers![bad_request, unauthorized, not_found, unprocessable, internal_error],
        )
        .mount(
            "/",
            routes![
                job_page,
                edit_fields,
                attach_resume,
                detach_resume,
                advance,
                retreat,
                submit,
                cancel,
                mbti_test,
                mbti_answer,
                login,
                face_login,
                logout,
                health,
            ],
        )
}

// Main server start function
pub async fn start_web_server(config: EnvironmentConfig) -> Result<()> {
    config.ensure_directories().await?;

    let mut db_config = DatabaseConfig::new(config.database_path.clone());

    if let Err(e) = db_config.init_pool().await {
        error!("Failed to initialize database: {}", e);
        return Err(e);
    }

    if let Err(e) = db_config.migrate().await {
        error!("Failed to run database migrations: {}", e);
        return Err(e);
    }

    let api = ServiceClient::new(config.backend_url.clone(), config.request_timeout_secs)?;
    let store = SqliteKeyValueStore::new(db_config.pool()?.clone());
    let state = AppState::new(Arc::new(api), Arc::new(store))
        .with_resume_ttl(config.resume_ttl_minutes);

    info!("Starting job board server");
    info!("Database: {}", db_config.database_path.display());
    info!("Backend: {}", config.backend_url);
    info!("Resume uploads kept for {} minutes", config.resume_ttl_minutes);
    info!("Server: http://0.0.0.0:{}", config.port);

    if let Err(e) = build_rocket(state, config.port).launch().await {
        error!("Rocket failed to launch: {:?}", e.kind());
        anyhow::bail!("Web server failed: {}", e);
    }

    Ok(())
}
