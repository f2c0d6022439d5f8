use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{BookingRequest, FeedbackId, PackageId, UserId};
use super::eligibility::BookingEligibility;
use super::payments::{PaymentDetails, PaymentRejection};
use super::registration::{RegistrationError, RegistrationRequest};
use super::repository::{PortalStore, RepositoryError};
use super::service::{
    InstructorMessage, PaymentResult, PortalService, PortalServiceError, SelectionResult,
};
use crate::notifications::Notifier;

type Shared<S, N> = State<Arc<PortalService<S, N>>>;

/// JSON routes over the portal service. Callers are expected to authenticate upstream.
pub fn portal_router<S, N>(service: Arc<PortalService<S, N>>) -> Router
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/identity/:id_number", get(identity_handler::<S, N>))
        .route("/api/v1/students", post(register_handler::<S, N>))
        .route("/api/v1/password-resets", post(password_reset_handler::<S, N>))
        .route(
            "/api/v1/students/:student_id/packages",
            post(select_handler::<S, N>),
        )
        .route(
            "/api/v1/students/:student_id/packages/offers",
            get(offers_handler::<S, N>),
        )
        .route(
            "/api/v1/students/:student_id/packages/upgrade-offers",
            get(upgrade_offers_handler::<S, N>),
        )
        .route(
            "/api/v1/students/:student_id/packages/:package_id/payments",
            post(payment_handler::<S, N>),
        )
        .route(
            "/api/v1/students/:student_id/dashboard",
            get(dashboard_handler::<S, N>),
        )
        .route(
            "/api/v1/students/:student_id/booking-eligibility",
            get(booking_eligibility_handler::<S, N>),
        )
        .route(
            "/api/v1/students/:student_id/bookings",
            get(list_bookings_handler::<S, N>).post(book_vehicle_handler::<S, N>),
        )
        .route(
            "/api/v1/students/:student_id/feedback",
            post(feedback_handler::<S, N>),
        )
        .route(
            "/api/v1/instructors/:instructor_id/roster",
            get(roster_handler::<S, N>),
        )
        .route(
            "/api/v1/instructors/:instructor_id/students/:student_id",
            get(assigned_student_handler::<S, N>),
        )
        .route(
            "/api/v1/instructors/:instructor_id/packages/:package_id/progress",
            put(progress_handler::<S, N>),
        )
        .route(
            "/api/v1/instructors/:instructor_id/packages/:package_id/complete",
            post(complete_handler::<S, N>),
        )
        .route(
            "/api/v1/instructors/:instructor_id/messages",
            post(message_handler::<S, N>),
        )
        .route("/api/v1/admin/overview", get(overview_handler::<S, N>))
        .route("/api/v1/admin/students", get(students_handler::<S, N>))
        .route(
            "/api/v1/admin/students/:student_id",
            delete(delete_student_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/students/:student_id/instructor",
            put(assign_handler::<S, N>).delete(unassign_handler::<S, N>),
        )
        .route("/api/v1/admin/instructors", get(instructors_handler::<S, N>))
        .route(
            "/api/v1/admin/instructors/:instructor_id/phone",
            put(instructor_phone_handler::<S, N>),
        )
        .route("/api/v1/admin/payments", get(payments_handler::<S, N>))
        .route("/api/v1/admin/feedback", get(list_feedback_handler::<S, N>))
        .route(
            "/api/v1/admin/feedback/:feedback_id/response",
            post(feedback_response_handler::<S, N>),
        )
        .with_state(service)
}

/// HTTP status for a service failure.
pub fn status_for(error: &PortalServiceError) -> StatusCode {
    match error {
        PortalServiceError::Registration(RegistrationError::EmailInUse(_)) => StatusCode::CONFLICT,
        PortalServiceError::Registration(_)
        | PortalServiceError::PaymentDetails(_)
        | PortalServiceError::Feedback(_)
        | PortalServiceError::BookingIneligible(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PortalServiceError::Offer(_) => StatusCode::CONFLICT,
        PortalServiceError::UserNotFound(_)
        | PortalServiceError::PackageNotFound(_)
        | PortalServiceError::FeedbackNotFound(_)
        | PortalServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        PortalServiceError::WrongRole { .. }
        | PortalServiceError::NotAssigned { .. }
        | PortalServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        PortalServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        PortalServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub(crate) fn error_response(error: PortalServiceError) -> Response {
    let status = status_for(&error);
    let payload = match &error {
        PortalServiceError::BookingIneligible(reason) => json!({
            "error": error.to_string(),
            "reason": reason,
        }),
        _ => json!({ "error": error.to_string() }),
    };
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, PortalServiceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn identity_handler<S, N>(
    State(service): Shared<S, N>,
    Path(id_number): Path<String>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    match service.lookup_identity(&id_number) {
        Ok(identity) => (StatusCode::OK, Json(identity)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn register_handler<S, N>(
    State(service): Shared<S, N>,
    Json(request): Json<RegistrationRequest>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::CREATED, service.register_student(request))
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetBody {
    pub email: String,
    pub reset_link: String,
}

pub(crate) async fn password_reset_handler<S, N>(
    State(service): Shared<S, N>,
    Json(body): Json<PasswordResetBody>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    match service.request_password_reset(&body.email, &body.reset_link) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn offers_handler<S, N>(
    State(service): Shared<S, N>,
    Path(student_id): Path<String>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.offered_packages(&UserId(student_id), false),
    )
}

pub(crate) async fn upgrade_offers_handler<S, N>(
    State(service): Shared<S, N>,
    Path(student_id): Path<String>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.offered_packages(&UserId(student_id), true),
    )
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SelectPackageBody {
    pub template_id: u32,
}

pub(crate) async fn select_handler<S, N>(
    State(service): Shared<S, N>,
    Path(student_id): Path<String>,
    Json(body): Json<SelectPackageBody>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    match service.select_package(&UserId(student_id), body.template_id) {
        Ok(result) => {
            let status = match &result {
                SelectionResult::Created { .. } => StatusCode::CREATED,
                SelectionResult::RedirectToPayment { .. } => StatusCode::OK,
                SelectionResult::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (status, Json(result)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn payment_handler<S, N>(
    State(service): Shared<S, N>,
    Path((student_id, package_id)): Path<(String, u64)>,
    Json(details): Json<PaymentDetails>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    match service.pay_for_package(&UserId(student_id), PackageId(package_id), &details) {
        Ok(result) => {
            let status = match &result {
                PaymentResult::Paid { .. } => StatusCode::CREATED,
                PaymentResult::Rejected {
                    reason: PaymentRejection::AlreadyPaid | PaymentRejection::DuplicateActivePackage,
                    ..
                } => StatusCode::CONFLICT,
            };
            (status, Json(result)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn dashboard_handler<S, N>(
    State(service): Shared<S, N>,
    Path(student_id): Path<String>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.student_dashboard(&UserId(student_id)))
}

pub(crate) async fn booking_eligibility_handler<S, N>(
    State(service): Shared<S, N>,
    Path(student_id): Path<String>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    match service.check_booking_eligibility(&UserId(student_id)) {
        Ok(BookingEligibility::Eligible) => {
            (StatusCode::OK, Json(json!({ "eligible": true }))).into_response()
        }
        Ok(BookingEligibility::Ineligible(reason)) => {
            let payload = json!({
                "eligible": false,
                "reason": reason,
                "message": reason.summary(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn book_vehicle_handler<S, N>(
    State(service): Shared<S, N>,
    Path(student_id): Path<String>,
    Json(request): Json<BookingRequest>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::CREATED,
        service.book_vehicle(&UserId(student_id), request),
    )
}

pub(crate) async fn list_bookings_handler<S, N>(
    State(service): Shared<S, N>,
    Path(student_id): Path<String>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.bookings_for(&UserId(student_id)))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FeedbackBody {
    pub message: String,
}

pub(crate) async fn feedback_handler<S, N>(
    State(service): Shared<S, N>,
    Path(student_id): Path<String>,
    Json(body): Json<FeedbackBody>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::CREATED,
        service.submit_feedback(&UserId(student_id), &body.message),
    )
}

pub(crate) async fn roster_handler<S, N>(
    State(service): Shared<S, N>,
    Path(instructor_id): Path<String>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.instructor_roster(&UserId(instructor_id)),
    )
}

pub(crate) async fn assigned_student_handler<S, N>(
    State(service): Shared<S, N>,
    Path((instructor_id, student_id)): Path<(String, String)>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.assigned_student_detail(&UserId(instructor_id), &UserId(student_id)),
    )
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProgressBody {
    pub lessons_completed: i64,
}

pub(crate) async fn progress_handler<S, N>(
    State(service): Shared<S, N>,
    Path((instructor_id, package_id)): Path<(String, u64)>,
    Json(body): Json<ProgressBody>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.update_lesson_progress(
            &UserId(instructor_id),
            PackageId(package_id),
            body.lessons_completed,
        ),
    )
}

pub(crate) async fn complete_handler<S, N>(
    State(service): Shared<S, N>,
    Path((instructor_id, package_id)): Path<(String, u64)>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.mark_package_complete(&UserId(instructor_id), PackageId(package_id)),
    )
}

pub(crate) async fn message_handler<S, N>(
    State(service): Shared<S, N>,
    Path(instructor_id): Path<String>,
    Json(message): Json<InstructorMessage>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    match service.message_students(&UserId(instructor_id), &message) {
        Ok(sent) => (StatusCode::OK, Json(json!({ "sent": sent }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn overview_handler<S, N>(State(service): Shared<S, N>) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.admin_overview())
}

pub(crate) async fn students_handler<S, N>(State(service): Shared<S, N>) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.list_students())
}

pub(crate) async fn delete_student_handler<S, N>(
    State(service): Shared<S, N>,
    Path(student_id): Path<String>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    match service.delete_student(&UserId(student_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AssignInstructorBody {
    pub instructor_id: UserId,
}

pub(crate) async fn assign_handler<S, N>(
    State(service): Shared<S, N>,
    Path(student_id): Path<String>,
    Json(body): Json<AssignInstructorBody>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.assign_instructor(&UserId(student_id), &body.instructor_id),
    )
}

pub(crate) async fn unassign_handler<S, N>(
    State(service): Shared<S, N>,
    Path(student_id): Path<String>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.remove_assignment(&UserId(student_id)))
}

pub(crate) async fn instructors_handler<S, N>(State(service): Shared<S, N>) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.list_instructors())
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PhoneBody {
    pub phone_number: String,
}

pub(crate) async fn instructor_phone_handler<S, N>(
    State(service): Shared<S, N>,
    Path(instructor_id): Path<String>,
    Json(body): Json<PhoneBody>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.update_instructor_phone(&UserId(instructor_id), &body.phone_number),
    )
}

pub(crate) async fn payments_handler<S, N>(State(service): Shared<S, N>) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.list_payments())
}

pub(crate) async fn list_feedback_handler<S, N>(State(service): Shared<S, N>) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.list_feedback())
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FeedbackResponseBody {
    pub response: String,
}

pub(crate) async fn feedback_response_handler<S, N>(
    State(service): Shared<S, N>,
    Path(feedback_id): Path<u64>,
    Json(body): Json<FeedbackResponseBody>,
) -> Response
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.respond_to_feedback(FeedbackId(feedback_id), &body.response),
    )
}
