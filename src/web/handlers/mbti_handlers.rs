// src/web/handlers/mbti_handlers.rs
use rocket::Either;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::State;
use tracing::{info, warn};

use crate::auth::AuthenticatedUser;
use crate::core::PersistedSession;
use crate::mbti::{AnswerOutcome, AnswerRequest, MbtiError, MbtiTestRunner, TestView};
use crate::web::session::VisitorSession;
use crate::web::types::*;
use crate::web::AppState;

fn mbti_failure(err: MbtiError) -> ErrorReply {
    let (status, suggestions) = match &err {
        MbtiError::Backend(_) => (
            Status::BadGateway,
            vec!["Try again in a few moments".to_string()],
        ),
        MbtiError::UnknownQuestion(_) | MbtiError::InvalidOption { .. } => (
            Status::UnprocessableEntity,
            vec!["Reload the test and answer again".to_string()],
        ),
        MbtiError::InvalidJobId(_) => (
            Status::BadRequest,
            vec!["Check the link you followed".to_string()],
        ),
        MbtiError::Storage(_) => (
            Status::InternalServerError,
            vec!["Contact support if the problem persists".to_string()],
        ),
    };

    warn!("MBTI test request failed: {}", err);
    StandardErrorResponse::new(err.to_string(), err.error_code().to_string(), suggestions)
        .reply(status)
}

pub async fn begin_test_handler(
    query: MbtiQuery,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<TestView>>, ErrorReply> {
    let runner = MbtiTestRunner::new(
        state.api.as_ref(),
        PersistedSession::new(state.store.as_ref(), visitor.id()),
        auth.token(),
    );

    let view = runner
        .begin(query.job_id.as_deref())
        .await
        .map_err(mbti_failure)?;

    let message = match &view {
        TestView::Ready { .. } => "MBTI test ready",
        TestView::Completed { .. } => "MBTI test already completed",
    };
    Ok(Json(DataResponse::success(message.to_string(), view)))
}

pub async fn answer_handler(
    query: MbtiQuery,
    request: Json<AnswerRequest>,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Either<Redirect, Json<DataResponse<AnswerOutcome>>>, ErrorReply> {
    let runner = MbtiTestRunner::new(
        state.api.as_ref(),
        PersistedSession::new(state.store.as_ref(), visitor.id()),
        auth.token(),
    );

    let outcome = runner
        .answer(query.job_id.as_deref(), &request)
        .await
        .map_err(mbti_failure)?;

    match outcome {
        AnswerOutcome::Completed {
            return_to: Some(return_to),
            ..
        } => {
            info!("MBTI test finished, returning visitor to {}", return_to);
            Ok(Either::Left(Redirect::to(return_to)))
        }
        outcome @ AnswerOutcome::Completed { .. } => Ok(Either::Right(Json(
            DataResponse::success("MBTI test completed".to_string(), outcome),
        ))),
        outcome @ AnswerOutcome::InProgress { .. } => Ok(Either::Right(Json(
            DataResponse::success("Answer recorded".to_string(), outcome),
        ))),
    }
}
