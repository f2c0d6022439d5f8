use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{
    BookingRequest, Feedback, FeedbackId, NewBooking, NewFeedback, PackageId, PackageInstance,
    PaymentReceipt, UserAccount, UserId, UserRole, VehicleBooking,
};
use super::eligibility::{
    BookingEligibility, BookingIneligibility, EligibilityConfig, EligibilityEngine, OfferError,
    PackageOffer, SelectionOutcome, SelectionRejection,
};
use super::payments::{self, PaymentDecision, PaymentDetails, PaymentDetailsError, PaymentRejection};
use super::progress;
use super::registration::{is_sa_phone_number, RegistrationError, RegistrationRequest};
use super::repository::{PortalStore, RepositoryError};
use super::views::{
    newest_receipts_first, AdminOverview, ContactView, InstructorRoster, StudentDashboard,
    StudentDetail, RECENT_PAYMENT_LIMIT,
};
use crate::identity::{DerivedIdentity, IdentityError};
use crate::notifications::{templates, NotificationError, Notifier};

pub const FEEDBACK_MAX_CHARS: usize = 1000;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// What happened to a package selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SelectionResult {
    Created {
        package: PackageInstance,
    },
    RedirectToPayment {
        package_id: PackageId,
    },
    Rejected {
        reason: SelectionRejection,
        message: &'static str,
        suggest_upgrade: bool,
    },
}

impl SelectionResult {
    fn rejected(reason: SelectionRejection) -> Self {
        Self::Rejected {
            reason,
            message: reason.summary(),
            suggest_upgrade: reason.suggests_upgrade(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentResult {
    Paid {
        receipt: PaymentReceipt,
    },
    Rejected {
        reason: PaymentRejection,
        message: &'static str,
    },
}

impl PaymentResult {
    fn rejected(reason: PaymentRejection) -> Self {
        Self::Rejected {
            reason,
            message: reason.summary(),
        }
    }
}

/// Message from an instructor to some or all of their students.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstructorMessage {
    pub subject: String,
    pub content: String,
    /// Empty means every assigned student.
    #[serde(default)]
    pub student_ids: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedbackError {
    #[error("feedback message cannot be empty")]
    Empty,
    #[error("feedback message is {0} characters; the limit is {FEEDBACK_MAX_CHARS}")]
    TooLong(usize),
    #[error("response cannot be empty")]
    EmptyResponse,
}

/// Orchestrates the eligibility engine over the stores and the notifier.
pub struct PortalService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    engine: Arc<EligibilityEngine>,
    clock: fn() -> NaiveDateTime,
}

impl<S, N> Clone for PortalService<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            notifier: self.notifier.clone(),
            engine: self.engine.clone(),
            clock: self.clock,
        }
    }
}

impl<S, N> PortalService<S, N>
where
    S: PortalStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, config: EligibilityConfig) -> Self {
        Self {
            store,
            notifier,
            engine: Arc::new(EligibilityEngine::new(config)),
            clock: local_now,
        }
    }

    /// Replace the wall clock, mainly for deterministic tests.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn engine(&self) -> &EligibilityEngine {
        &self.engine
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    fn today(&self) -> NaiveDate {
        self.now().date()
    }

    fn user_with_role(
        &self,
        id: &UserId,
        role: UserRole,
    ) -> Result<UserAccount, PortalServiceError> {
        let user = self
            .store
            .fetch_user(id)?
            .ok_or_else(|| PortalServiceError::UserNotFound(id.clone()))?;
        if user.role != role {
            return Err(PortalServiceError::WrongRole {
                id: id.clone(),
                expected: role,
            });
        }
        Ok(user)
    }

    fn student(&self, id: &UserId) -> Result<UserAccount, PortalServiceError> {
        self.user_with_role(id, UserRole::Student)
    }

    fn instructor(&self, id: &UserId) -> Result<UserAccount, PortalServiceError> {
        self.user_with_role(id, UserRole::Instructor)
    }

    fn package(&self, id: PackageId) -> Result<PackageInstance, PortalServiceError> {
        self.store
            .fetch_package(id)?
            .ok_or(PortalServiceError::PackageNotFound(id))
    }

    fn best_effort(&self, action: &'static str, result: Result<(), NotificationError>) {
        if let Err(error) = result {
            warn!(action, %error, "notification failed; state change kept");
        }
    }

    /// Birth date and age encoded in an identity number, as of today.
    pub fn lookup_identity(&self, raw: &str) -> Result<DerivedIdentity, IdentityError> {
        self.engine.parser().derive(raw.trim(), self.today())
    }

    pub fn register_student(
        &self,
        request: RegistrationRequest,
    ) -> Result<UserAccount, PortalServiceError> {
        let identity = request.check(
            self.engine.parser(),
            self.engine.config().minimum_registration_age,
            self.today(),
        )?;

        let email = request.email.trim().to_ascii_lowercase();
        if self.store.find_by_email(&email)?.is_some() {
            return Err(RegistrationError::EmailInUse(email).into());
        }

        let account = request.into_account(&identity);
        let account = match self.store.insert_user(account) {
            Ok(account) => account,
            Err(RepositoryError::Conflict) => {
                return Err(RegistrationError::EmailInUse(email).into())
            }
            Err(error) => return Err(error.into()),
        };
        info!(student = %account.id, age = identity.age, "student registered");

        self.best_effort(
            "welcome_email",
            self.notifier.send_welcome(&account.email, &account.full_name),
        );
        if let Some(phone) = account.phone_number.as_deref() {
            self.best_effort(
                "welcome_sms",
                self.notifier
                    .send_sms(phone, &templates::welcome_sms(&account.full_name)),
            );
        }

        Ok(account)
    }

    /// Sends the reset link when the address is known; unknown addresses succeed silently.
    pub fn request_password_reset(
        &self,
        email: &str,
        reset_link: &str,
    ) -> Result<(), PortalServiceError> {
        match self.store.find_by_email(&email.trim().to_ascii_lowercase())? {
            Some(user) => self.best_effort(
                "password_reset",
                self.notifier.send_password_reset(&user.email, reset_link),
            ),
            None => debug!("password reset requested for unknown address"),
        }
        Ok(())
    }

    pub fn offered_packages(
        &self,
        student_id: &UserId,
        upgrade_requested: bool,
    ) -> Result<PackageOffer, PortalServiceError> {
        let student = self.student(student_id)?;
        let holdings = self.store.holdings_for(student_id)?;
        let offer =
            self.engine
                .offered_templates(&student, &holdings, upgrade_requested, self.today())?;
        Ok(offer)
    }

    pub fn select_package(
        &self,
        student_id: &UserId,
        template_id: u32,
    ) -> Result<SelectionResult, PortalServiceError> {
        let student = self.student(student_id)?;
        let holdings = self.store.holdings_for(student_id)?;

        match self
            .engine
            .evaluate_selection(&student, template_id, &holdings, self.today())
        {
            SelectionOutcome::CreateNew(draft) => {
                let package_type = draft.package_type;
                match self.store.insert_package(draft) {
                    Ok(package) => {
                        info!(
                            student = %student_id,
                            package = %package.id,
                            package_type = package_type.label(),
                            "package created"
                        );
                        Ok(SelectionResult::Created { package })
                    }
                    Err(RepositoryError::Conflict) => {
                        // Prefer the exact type; otherwise the family member that won the race.
                        let held = self.store.packages_for(student_id)?;
                        let existing = held
                            .iter()
                            .find(|package| package.package_type == package_type)
                            .or_else(|| {
                                held.iter()
                                    .find(|package| package_type.conflicts_with(package.package_type))
                            })
                            .ok_or(RepositoryError::Conflict)?;
                        debug!(student = %student_id, package = %existing.id, "concurrent selection resolved to existing package");
                        Ok(SelectionResult::RedirectToPayment {
                            package_id: existing.id,
                        })
                    }
                    Err(error) => Err(error.into()),
                }
            }
            SelectionOutcome::RedirectToPayment(package_id) => {
                Ok(SelectionResult::RedirectToPayment { package_id })
            }
            SelectionOutcome::Rejected(reason) => {
                warn!(student = %student_id, template_id, ?reason, "package selection rejected");
                Ok(SelectionResult::rejected(reason))
            }
        }
    }

    pub fn pay_for_package(
        &self,
        student_id: &UserId,
        package_id: PackageId,
        details: &PaymentDetails,
    ) -> Result<PaymentResult, PortalServiceError> {
        let student = self.student(student_id)?;
        let package = self.package(package_id)?;
        if package.student_id != *student_id {
            return Err(PortalServiceError::Forbidden(format!(
                "package {package_id} belongs to another student"
            )));
        }

        let holdings = self.store.holdings_for(student_id)?;
        let new_receipt = match payments::record_payment(&package, details, &holdings, self.now())? {
            PaymentDecision::Recorded(receipt) => receipt,
            PaymentDecision::Rejected(reason) => {
                warn!(student = %student_id, package = %package_id, ?reason, "payment rejected");
                return Ok(PaymentResult::rejected(reason));
            }
        };

        let receipt = match self.store.insert_receipt(new_receipt) {
            Ok(receipt) => receipt,
            Err(RepositoryError::Conflict) => {
                warn!(student = %student_id, package = %package_id, "concurrent payment rejected");
                return Ok(PaymentResult::rejected(PaymentRejection::AlreadyPaid));
            }
            Err(error) => return Err(error.into()),
        };
        info!(
            student = %student_id,
            package = %package_id,
            receipt = %receipt.receipt_number,
            amount = receipt.amount,
            "payment recorded"
        );

        self.best_effort(
            "receipt_email",
            self.notifier.send_receipt(
                &student.email,
                &student.full_name,
                &package.display_name,
                receipt.amount,
                &receipt.receipt_number.0,
            ),
        );
        Ok(PaymentResult::Paid { receipt })
    }

    /// Resolve the package and check that the instructor may act on its owner.
    fn assigned_package(
        &self,
        instructor_id: &UserId,
        package_id: PackageId,
    ) -> Result<PackageInstance, PortalServiceError> {
        self.instructor(instructor_id)?;
        let package = self.package(package_id)?;
        let student = self.student(&package.student_id)?;
        if !student.is_assigned_to(instructor_id) {
            return Err(PortalServiceError::NotAssigned {
                student: student.id,
                instructor: instructor_id.clone(),
            });
        }
        Ok(package)
    }

    fn save_progress(
        &self,
        before: bool,
        package: PackageInstance,
    ) -> Result<PackageInstance, PortalServiceError> {
        self.store.update_package(package.clone())?;
        if package.is_driver_ready && !before {
            info!(student = %package.student_id, package = %package.id, "package driver ready");
        }
        Ok(package)
    }

    pub fn update_lesson_progress(
        &self,
        instructor_id: &UserId,
        package_id: PackageId,
        lessons_completed: i64,
    ) -> Result<PackageInstance, PortalServiceError> {
        let package = self.assigned_package(instructor_id, package_id)?;
        let was_ready = package.is_driver_ready;
        let updated = progress::update_lesson_progress(package, lessons_completed, self.now());
        debug!(package = %package_id, lessons = updated.lessons_completed, "lesson progress updated");
        self.save_progress(was_ready, updated)
    }

    pub fn mark_package_complete(
        &self,
        instructor_id: &UserId,
        package_id: PackageId,
    ) -> Result<PackageInstance, PortalServiceError> {
        let package = self.assigned_package(instructor_id, package_id)?;
        let was_ready = package.is_driver_ready;
        let updated = progress::mark_package_complete(package, self.now());
        self.save_progress(was_ready, updated)
    }

    pub fn student_dashboard(
        &self,
        student_id: &UserId,
    ) -> Result<StudentDashboard, PortalServiceError> {
        let student = self.student(student_id)?;
        let holdings = self.store.holdings_for(student_id)?;
        let instructor = match &student.assigned_instructor_id {
            Some(id) => self.store.fetch_user(id)?,
            None => None,
        };
        Ok(StudentDashboard::build(
            &student,
            &holdings,
            instructor.as_ref(),
        ))
    }

    pub fn check_booking_eligibility(
        &self,
        student_id: &UserId,
    ) -> Result<BookingEligibility, PortalServiceError> {
        let student = self.student(student_id)?;
        let holdings = self.store.holdings_for(student_id)?;
        Ok(self
            .engine
            .check_booking_eligibility(&student, &holdings, self.today()))
    }

    pub fn book_vehicle(
        &self,
        student_id: &UserId,
        request: BookingRequest,
    ) -> Result<VehicleBooking, PortalServiceError> {
        if let BookingEligibility::Ineligible(reason) = self.check_booking_eligibility(student_id)? {
            warn!(student = %student_id, ?reason, "vehicle booking refused");
            return Err(PortalServiceError::BookingIneligible(reason));
        }

        let booking = self.store.insert_booking(NewBooking {
            student_id: student_id.clone(),
            request,
            booked_at: self.now(),
            booking_fee: self.engine.config().vehicle_booking_fee,
        })?;
        info!(student = %student_id, test_date = %booking.test_date, "vehicle booking requested");
        Ok(booking)
    }

    /// Newest first.
    pub fn bookings_for(
        &self,
        student_id: &UserId,
    ) -> Result<Vec<VehicleBooking>, PortalServiceError> {
        self.student(student_id)?;
        let mut bookings = self.store.bookings_for(student_id)?;
        bookings.sort_by(|a, b| b.booked_at.cmp(&a.booked_at).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }

    pub fn submit_feedback(
        &self,
        student_id: &UserId,
        message: &str,
    ) -> Result<Feedback, PortalServiceError> {
        self.student(student_id)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(FeedbackError::Empty.into());
        }
        let length = message.chars().count();
        if length > FEEDBACK_MAX_CHARS {
            return Err(FeedbackError::TooLong(length).into());
        }

        let feedback = self.store.insert_feedback(NewFeedback {
            student_id: student_id.clone(),
            message: message.to_string(),
            submitted_at: self.now(),
        })?;
        info!(student = %student_id, "feedback submitted");
        Ok(feedback)
    }

    pub fn respond_to_feedback(
        &self,
        feedback_id: FeedbackId,
        response: &str,
    ) -> Result<Feedback, PortalServiceError> {
        let response = response.trim();
        if response.is_empty() {
            return Err(FeedbackError::EmptyResponse.into());
        }

        let mut feedback = self
            .store
            .fetch_feedback(feedback_id)?
            .ok_or(PortalServiceError::FeedbackNotFound(feedback_id))?;
        feedback.admin_response = Some(response.to_string());
        feedback.responded_at = Some(self.now());
        feedback.is_read = true;
        self.store.update_feedback(feedback.clone())?;

        if let Some(student) = self.store.fetch_user(&feedback.student_id)? {
            self.best_effort(
                "feedback_response",
                self.notifier.send_email(templates::feedback_response(
                    &student.email,
                    &student.full_name,
                    response,
                )),
            );
        }
        Ok(feedback)
    }

    /// Newest first.
    pub fn list_feedback(&self) -> Result<Vec<Feedback>, PortalServiceError> {
        let mut feedback = self.store.all_feedback()?;
        feedback.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));
        Ok(feedback)
    }

    pub fn assign_instructor(
        &self,
        student_id: &UserId,
        instructor_id: &UserId,
    ) -> Result<UserAccount, PortalServiceError> {
        let mut student = self.student(student_id)?;
        self.instructor(instructor_id)?;
        student.assigned_instructor_id = Some(instructor_id.clone());
        self.store.update_user(student.clone())?;
        info!(student = %student_id, instructor = %instructor_id, "instructor assigned");
        Ok(student)
    }

    pub fn remove_assignment(&self, student_id: &UserId) -> Result<UserAccount, PortalServiceError> {
        let mut student = self.student(student_id)?;
        if let Some(previous) = student.assigned_instructor_id.take() {
            self.store.update_user(student.clone())?;
            info!(student = %student_id, instructor = %previous, "instructor assignment removed");
        }
        Ok(student)
    }

    pub fn instructor_roster(
        &self,
        instructor_id: &UserId,
    ) -> Result<InstructorRoster, PortalServiceError> {
        let instructor = self.instructor(instructor_id)?;
        let students = self
            .store
            .students_assigned_to(instructor_id)?
            .iter()
            .map(|student| -> Result<StudentDetail, RepositoryError> {
                let holdings = self.store.holdings_for(&student.id)?;
                Ok(StudentDetail::build(student, &holdings))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(InstructorRoster::build(&instructor, students))
    }

    /// An instructor's view of one assigned student.
    pub fn assigned_student_detail(
        &self,
        instructor_id: &UserId,
        student_id: &UserId,
    ) -> Result<StudentDetail, PortalServiceError> {
        self.instructor(instructor_id)?;
        let student = self.student(student_id)?;
        if !student.is_assigned_to(instructor_id) {
            return Err(PortalServiceError::NotAssigned {
                student: student.id,
                instructor: instructor_id.clone(),
            });
        }
        let holdings = self.store.holdings_for(student_id)?;
        Ok(StudentDetail::build(&student, &holdings))
    }

    /// Emails the selected assigned students and returns how many messages went out.
    /// Unassigned ids are skipped.
    pub fn message_students(
        &self,
        instructor_id: &UserId,
        message: &InstructorMessage,
    ) -> Result<usize, PortalServiceError> {
        let instructor = self.instructor(instructor_id)?;
        let assigned = self.store.students_assigned_to(instructor_id)?;

        let recipients: Vec<&UserAccount> = if message.student_ids.is_empty() {
            assigned.iter().collect()
        } else {
            for id in &message.student_ids {
                if !assigned.iter().any(|student| student.id == *id) {
                    warn!(instructor = %instructor_id, student = %id, "skipping unassigned student");
                }
            }
            assigned
                .iter()
                .filter(|student| message.student_ids.contains(&student.id))
                .collect()
        };

        let mut sent = 0;
        for student in recipients {
            let email = templates::instructor_message(
                &student.email,
                &student.full_name,
                &instructor.full_name,
                &message.subject,
                &message.content,
            );
            match self.notifier.send_email(email) {
                Ok(()) => sent += 1,
                Err(error) => {
                    warn!(student = %student.id, %error, "instructor message not delivered")
                }
            }
        }
        info!(instructor = %instructor_id, sent, "instructor message sent");
        Ok(sent)
    }

    pub fn admin_overview(&self) -> Result<AdminOverview, PortalServiceError> {
        let student_count = self.store.users_with_role(UserRole::Student)?.len();
        let instructor_count = self.store.users_with_role(UserRole::Instructor)?.len();
        let receipts = newest_receipts_first(self.store.all_receipts()?);
        let total_revenue = receipts.iter().map(|receipt| u64::from(receipt.amount)).sum();

        Ok(AdminOverview {
            student_count,
            instructor_count,
            total_revenue,
            recent_payments: receipts.into_iter().take(RECENT_PAYMENT_LIMIT).collect(),
            notifications_sent: self.notifier.sent_count(),
        })
    }

    pub fn list_students(&self) -> Result<Vec<StudentDetail>, PortalServiceError> {
        self.store
            .users_with_role(UserRole::Student)?
            .iter()
            .map(|student| -> Result<StudentDetail, PortalServiceError> {
                let holdings = self.store.holdings_for(&student.id)?;
                Ok(StudentDetail::build(student, &holdings))
            })
            .collect()
    }

    pub fn list_instructors(&self) -> Result<Vec<ContactView>, PortalServiceError> {
        Ok(self
            .store
            .users_with_role(UserRole::Instructor)?
            .iter()
            .map(ContactView::from)
            .collect())
    }

    /// Every receipt, newest first.
    pub fn list_payments(&self) -> Result<Vec<PaymentReceipt>, PortalServiceError> {
        Ok(newest_receipts_first(self.store.all_receipts()?))
    }

    pub fn update_instructor_phone(
        &self,
        instructor_id: &UserId,
        phone_number: &str,
    ) -> Result<UserAccount, PortalServiceError> {
        let mut instructor = self.instructor(instructor_id)?;
        let phone_number = phone_number.trim();
        if !is_sa_phone_number(phone_number) {
            return Err(RegistrationError::InvalidPhoneNumber(phone_number.to_string()).into());
        }
        instructor.phone_number = Some(phone_number.to_string());
        self.store.update_user(instructor.clone())?;
        Ok(instructor)
    }

    /// Removes receipts and packages before the account itself.
    pub fn delete_student(&self, student_id: &UserId) -> Result<(), PortalServiceError> {
        self.student(student_id)?;
        let receipts = self.store.delete_receipts_for(student_id)?;
        let packages = self.store.delete_packages_for(student_id)?;
        self.store.delete_user(student_id)?;
        info!(student = %student_id, receipts, packages, "student removed");
        Ok(())
    }
}

/// Error raised by the portal service.
#[derive(Debug, thiserror::Error)]
pub enum PortalServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    PaymentDetails(#[from] PaymentDetailsError),
    #[error(transparent)]
    Feedback(#[from] FeedbackError),
    #[error(transparent)]
    Offer(#[from] OfferError),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("package {0} not found")]
    PackageNotFound(PackageId),
    #[error("feedback {0} not found")]
    FeedbackNotFound(FeedbackId),
    #[error("user {id} is not a {}", .expected.label())]
    WrongRole { id: UserId, expected: UserRole },
    #[error("student {student} is not assigned to instructor {instructor}")]
    NotAssigned { student: UserId, instructor: UserId },
    #[error("{0}")]
    Forbidden(String),
    #[error("{}", .0.summary())]
    BookingIneligible(BookingIneligibility),
}
