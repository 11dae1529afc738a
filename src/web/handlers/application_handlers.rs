// src/web/handlers/application_handlers.rs
use rocket::Either;
use rocket::form::Form;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::State;
use tracing::{info, warn};

use super::helpers::{check_job_id, internal_failure, read_upload};
use crate::application::{
    AdvanceOutcome, ApplicationFlow, Field, FieldEdit, FlowView, Mounted, Recovery, SubmitError,
    SubmitOutcome, UrlSignals,
};
use crate::auth::{AuthenticatedUser, OptionalAuth};
use crate::core::PersistedSession;
use crate::utils::APPLICATIONS_PATH;
use crate::web::session::VisitorSession;
use crate::web::types::*;
use crate::web::AppState;

type FlowResult = Result<Json<DataResponse<FlowView>>, ErrorReply>;

fn flow<'a>(
    state: &'a AppState,
    visitor: &'a VisitorSession,
    job_id: &'a str,
    token: Option<&'a str>,
) -> ApplicationFlow<'a> {
    ApplicationFlow::new(
        state.api.as_ref(),
        PersistedSession::new(state.store.as_ref(), visitor.id()),
        &state.vault,
        &state.in_flight,
        job_id,
        token,
    )
}

fn view_response(message: &str, view: FlowView) -> Json<DataResponse<FlowView>> {
    Json(DataResponse::success(message.to_string(), view))
}

pub async fn job_page_handler(
    job_id: &str,
    query: JobPageQuery,
    auth: OptionalAuth,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Json<DataResponse<Mounted>>, ErrorReply> {
    check_job_id(job_id)?;

    let signals = UrlSignals::from_query(query.mbti_completed.as_deref(), query.step.as_deref());
    let mounted = flow(state, &visitor, job_id, auth.token())
        .mount(signals)
        .await
        .map_err(|e| internal_failure("load the job page", e))?;

    Ok(Json(DataResponse::success(
        "Job page loaded".to_string(),
        mounted,
    )))
}

pub async fn edit_fields_handler(
    job_id: &str,
    edit: Json<FieldEdit>,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> FlowResult {
    check_job_id(job_id)?;

    if edit.is_empty() {
        return Err(StandardErrorResponse::new(
            "No application field to update".to_string(),
            "EMPTY_EDIT".to_string(),
            vec!["Send at least one of name, email, phone or coverLetter".to_string()],
        )
        .reply(Status::UnprocessableEntity));
    }

    let view = flow(state, &visitor, job_id, Some(auth.token()))
        .edit(&edit)
        .await
        .map_err(|e| internal_failure("save your application", e))?;
    Ok(view_response("Application saved", view))
}

pub async fn attach_resume_handler(
    job_id: &str,
    upload: Form<ResumeUploadForm<'_>>,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> FlowResult {
    check_job_id(job_id)?;

    let file = read_upload(&upload.resume, "resume")
        .await
        .map_err(|e| internal_failure("read the uploaded resume", e))?;

    let view = flow(state, &visitor, job_id, Some(auth.token()))
        .attach_resume(file)
        .await
        .map_err(|e| internal_failure("attach your resume", e))?;

    if let Some(message) = view.errors.get(Field::Resume) {
        return Err(StandardErrorResponse::new(
            message.to_string(),
            "INVALID_RESUME".to_string(),
            vec!["Upload a PDF, DOC or DOCX file of at most 10 MB".to_string()],
        )
        .with_field_errors(view.errors.clone())
        .reply(Status::UnprocessableEntity));
    }
    Ok(view_response("Resume attached", view))
}

pub async fn detach_resume_handler(
    job_id: &str,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> FlowResult {
    check_job_id(job_id)?;

    let view = flow(state, &visitor, job_id, Some(auth.token()))
        .detach_resume()
        .await
        .map_err(|e| internal_failure("remove your resume", e))?;
    Ok(view_response("Resume removed", view))
}

pub async fn advance_handler(
    job_id: &str,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> Result<Either<Redirect, Json<DataResponse<FlowView>>>, ErrorReply> {
    check_job_id(job_id)?;

    let outcome = flow(state, &visitor, job_id, Some(auth.token()))
        .advance()
        .await
        .map_err(|e| internal_failure("move to the next step", e))?;

    match outcome {
        AdvanceOutcome::Moved(view) => Ok(Either::Right(view_response("Moved to the next step", view))),
        AdvanceOutcome::Unchanged(view) => Ok(Either::Right(view_response("Step unchanged", view))),
        AdvanceOutcome::Suspended { navigate_to, .. } => {
            info!("Redirecting visitor to the MBTI test for job {}", job_id);
            Ok(Either::Left(Redirect::to(navigate_to)))
        }
        AdvanceOutcome::Blocked(view) => Err(StandardErrorResponse::new(
            view.errors
                .first_message()
                .unwrap_or("Please fix the highlighted fields")
                .to_string(),
            "VALIDATION_FAILED".to_string(),
            vec!["Correct the highlighted fields and try again".to_string()],
        )
        .with_field_errors(view.errors)
        .reply(Status::UnprocessableEntity)),
        AdvanceOutcome::Busy => Err(StandardErrorResponse::new(
            "Already moving to the next step".to_string(),
            "REQUEST_IN_FLIGHT".to_string(),
            vec!["Wait for the current request to finish".to_string()],
        )
        .reply(Status::Conflict)),
    }
}

pub async fn retreat_handler(
    job_id: &str,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> FlowResult {
    check_job_id(job_id)?;

    let view = flow(state, &visitor, job_id, Some(auth.token()))
        .retreat()
        .await
        .map_err(|e| internal_failure("go back a step", e))?;
    Ok(view_response("Moved to the previous step", view))
}

fn recovery_suggestions(recovery: Recovery) -> Vec<String> {
    let suggestion = match recovery {
        Recovery::Login => "Log in and submit again",
        Recovery::FixFields => "Review your application and correct the highlighted fields",
        Recovery::TakeTest => "Complete the MBTI test, then submit again",
        Recovery::AttachResume => "Attach your resume again",
        Recovery::ViewApplications => "View your existing applications",
        Recovery::None => "Browse other open positions",
        Recovery::Retry => "Try again in a few moments",
    };
    vec![suggestion.to_string()]
}

fn submit_failure(err: SubmitError) -> ErrorReply {
    let status = match &err {
        SubmitError::Unauthenticated => Status::Unauthorized,
        SubmitError::NoDraft | SubmitError::NotAtReview | SubmitError::AlreadyApplied => {
            Status::Conflict
        }
        SubmitError::Validation(_) | SubmitError::ResumeMissing => Status::UnprocessableEntity,
        SubmitError::MbtiIncomplete | SubmitError::MbtiRequired { .. } => {
            Status::PreconditionFailed
        }
        SubmitError::JobNotFound => Status::NotFound,
        SubmitError::Server { .. } | SubmitError::Transport(_) => Status::BadGateway,
        SubmitError::Storage(_) => Status::InternalServerError,
    };

    let mut response = StandardErrorResponse::new(
        err.to_string(),
        err.error_code().to_string(),
        recovery_suggestions(err.recovery()),
    );
    match err {
        SubmitError::Validation(errors) => response = response.with_field_errors(errors),
        SubmitError::MbtiRequired { test_url } => response = response.with_link(test_url),
        SubmitError::AlreadyApplied => response = response.with_link(APPLICATIONS_PATH.to_string()),
        _ => {}
    }
    response.reply(status)
}

pub async fn submit_handler(
    job_id: &str,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> FlowResult {
    check_job_id(job_id)?;

    let application = flow(state, &visitor, job_id, Some(auth.token()));
    match application.submit().await {
        Ok(SubmitOutcome::Submitted(receipt)) => Ok(view_response(
            "Application submitted",
            application.submitted_view(receipt),
        )),
        Ok(SubmitOutcome::AlreadyInFlight) => Err(StandardErrorResponse::new(
            "Your application is already being submitted".to_string(),
            "SUBMIT_IN_FLIGHT".to_string(),
            vec!["Wait for the current submission to finish".to_string()],
        )
        .reply(Status::Conflict)),
        Err(e) => {
            warn!("Submit for job {} failed: {}", job_id, e.error_code());
            Err(submit_failure(e))
        }
    }
}

pub async fn cancel_handler(
    job_id: &str,
    auth: AuthenticatedUser,
    visitor: VisitorSession,
    state: &State<AppState>,
) -> FlowResult {
    check_job_id(job_id)?;

    let view = flow(state, &visitor, job_id, Some(auth.token()))
        .cancel()
        .await
        .map_err(|e| internal_failure("cancel your application", e))?;
    Ok(view_response("Application cancelled", view))
}
