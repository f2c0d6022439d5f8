use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::http::{header, Method, Request};
use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::notifications::{EmailMessage, NotificationError, Notifier, OutboxNotifier};
use crate::portal::catalog::PackageCatalog;
use crate::portal::domain::{
    BookingId, Feedback, FeedbackId, NewBooking, NewFeedback, NewReceipt, PackageDraft, PackageId,
    PackageInstance, PackageType, PaymentReceipt, ReceiptId, StudentHoldings, UserAccount, UserId,
    UserRole, VehicleBooking,
};
use crate::portal::eligibility::EligibilityConfig;
use crate::portal::payments::PaymentDetails;
use crate::portal::repository::{
    BookingStore, FeedbackStore, PackageStore, ReceiptStore, RepositoryError, UserDirectory,
};
use crate::portal::service::PortalService;

pub(super) const ADULT_ID: &str = "0001010000080";
/// Born 2009-03-15, seventeen on [`today`].
pub(super) const MINOR_ID: &str = "0903155009087";
/// Eighteenth birthday falls on [`today`].
pub(super) const EIGHTEEN_TODAY_ID: &str = "0810185009087";

pub(super) fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 18)
        .and_then(|date| date.and_hms_opt(9, 30, 0))
        .expect("valid timestamp")
}

pub(super) fn today() -> NaiveDate {
    now().date()
}

pub(super) fn account(id: &str, role: UserRole) -> UserAccount {
    UserAccount {
        id: UserId(id.to_string()),
        role,
        full_name: format!("User {id}"),
        email: format!("{id}@example.com"),
        phone_number: Some("0721234567".to_string()),
        identity_number: None,
        date_of_birth: None,
        address: "1 Main Road, Durban".to_string(),
        assigned_instructor_id: None,
    }
}

pub(super) fn student_with_id(id: &str, identity_number: &str) -> UserAccount {
    UserAccount {
        identity_number: Some(identity_number.to_string()),
        ..account(id, UserRole::Student)
    }
}

pub(super) fn adult_student(id: &str) -> UserAccount {
    student_with_id(id, ADULT_ID)
}

pub(super) fn minor_student(id: &str) -> UserAccount {
    student_with_id(id, MINOR_ID)
}

pub(super) fn instructor(id: &str) -> UserAccount {
    account(id, UserRole::Instructor)
}

pub(super) fn package(
    id: u64,
    student: &UserAccount,
    package_type: PackageType,
    driver_ready: bool,
) -> PackageInstance {
    let template = PackageCatalog::standard()
        .for_type(package_type)
        .expect("catalog covers every type");
    let mut instance = template.draft_for(&student.id).into_instance(PackageId(id));
    if driver_ready {
        instance.lessons_completed = instance.lesson_count;
        instance.is_driver_ready = true;
        instance.driver_ready_at = Some(now());
    }
    instance
}

pub(super) fn receipt(id: u64, package: &PackageInstance) -> PaymentReceipt {
    NewReceipt {
        student_id: package.student_id.clone(),
        package_id: package.id,
        amount: package.price,
        card_holder_name: "T Mokoena".to_string(),
        last4_digits: "4242".to_string(),
        card_expiry: NaiveDate::from_ymd_opt(2028, 5, 1).expect("valid date"),
        paid_at: now(),
        receipt_number: crate::portal::domain::ReceiptNumber::generate(),
    }
    .into_receipt(ReceiptId(id))
}

pub(super) fn holdings(packages: Vec<PackageInstance>) -> StudentHoldings {
    StudentHoldings::new(packages, Vec::new())
}

pub(super) fn card() -> PaymentDetails {
    PaymentDetails {
        card_holder_name: "Thabo Mokoena".to_string(),
        card_number: "4111111111111111".to_string(),
        expiry_month: 5,
        expiry_year: 2028,
        cvv: "123".to_string(),
    }
}

pub(super) type MemoryService = PortalService<MemoryStore, OutboxNotifier>;

pub(super) fn build_service() -> (MemoryService, Arc<MemoryStore>, Arc<OutboxNotifier>) {
    build_service_with(MemoryStore::default())
}

pub(super) fn build_service_with(
    store: MemoryStore,
) -> (MemoryService, Arc<MemoryStore>, Arc<OutboxNotifier>) {
    let store = Arc::new(store);
    let notifier = Arc::new(OutboxNotifier::default().with_clock(now));
    let service = PortalService::new(store.clone(), notifier.clone(), EligibilityConfig::default())
        .with_clock(now);
    (service, store, notifier)
}

pub(super) fn seed(store: &MemoryStore, user: UserAccount) -> UserAccount {
    store.insert_user(user).expect("seed user")
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, UserAccount>,
    packages: BTreeMap<PackageId, PackageInstance>,
    receipts: BTreeMap<ReceiptId, PaymentReceipt>,
    feedback: BTreeMap<FeedbackId, Feedback>,
    bookings: BTreeMap<BookingId, VehicleBooking>,
    next_id: u64,
    interloper: Option<PackageType>,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Single-lock store. With `racing` set, every package or receipt insert behaves as if a
/// concurrent request committed the same row first. [`MemoryStore::racing_with`] instead lets
/// another request commit a package of the given type just before the next package insert.
#[derive(Default)]
pub(super) struct MemoryStore {
    state: Mutex<MemoryState>,
    racing: bool,
}

impl MemoryStore {
    pub(super) fn racing() -> Self {
        Self {
            racing: true,
            ..Self::default()
        }
    }

    pub(super) fn racing_with(package_type: PackageType) -> Self {
        let store = Self::default();
        store.state.lock().expect("store mutex poisoned").interloper = Some(package_type);
        store
    }

    pub(super) fn package_count(&self) -> usize {
        self.state.lock().expect("store mutex poisoned").packages.len()
    }

    pub(super) fn receipt_count(&self) -> usize {
        self.state.lock().expect("store mutex poisoned").receipts.len()
    }

    fn commit_package(state: &mut MemoryState, draft: PackageDraft) -> PackageInstance {
        let id = PackageId(state.next_id());
        let package = draft.into_instance(id);
        state.packages.insert(id, package.clone());
        package
    }

    fn commit_receipt(state: &mut MemoryState, receipt: NewReceipt) -> PaymentReceipt {
        let id = ReceiptId(state.next_id());
        let receipt = receipt.into_receipt(id);
        state.receipts.insert(id, receipt.clone());
        receipt
    }
}

impl UserDirectory for MemoryStore {
    fn fetch_user(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.users.get(id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn insert_user(&self, user: UserAccount) -> Result<UserAccount, RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        let taken = guard.users.contains_key(&user.id)
            || guard
                .users
                .values()
                .any(|existing| existing.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(RepositoryError::Conflict);
        }
        guard.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn update_user(&self, user: UserAccount) -> Result<(), RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        match guard.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn users_with_role(&self, role: UserRole) -> Result<Vec<UserAccount>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        let mut users: Vec<_> = guard
            .users
            .values()
            .filter(|user| user.role == role)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    fn students_assigned_to(
        &self,
        instructor: &UserId,
    ) -> Result<Vec<UserAccount>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        let mut users: Vec<_> = guard
            .users
            .values()
            .filter(|user| user.role == UserRole::Student && user.is_assigned_to(instructor))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    fn delete_user(&self, id: &UserId) -> Result<(), RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        guard
            .users
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

impl PackageStore for MemoryStore {
    fn packages_for(&self, student: &UserId) -> Result<Vec<PackageInstance>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard
            .packages
            .values()
            .filter(|package| package.student_id == *student)
            .cloned()
            .collect())
    }

    fn fetch_package(&self, id: PackageId) -> Result<Option<PackageInstance>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.packages.get(&id).cloned())
    }

    fn insert_package(&self, draft: PackageDraft) -> Result<PackageInstance, RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        if let Some(package_type) = guard.interloper.take() {
            let rival = PackageCatalog::standard()
                .for_type(package_type)
                .expect("catalog covers every type")
                .draft_for(&draft.student_id);
            Self::commit_package(&mut guard, rival);
        }
        let duplicate = guard.packages.values().any(|package| {
            package.student_id == draft.student_id
                && draft.package_type.conflicts_with(package.package_type)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        let package = Self::commit_package(&mut guard, draft);
        if self.racing {
            return Err(RepositoryError::Conflict);
        }
        Ok(package)
    }

    fn update_package(&self, package: PackageInstance) -> Result<(), RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        match guard.packages.get_mut(&package.id) {
            Some(existing) => {
                *existing = package;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn delete_packages_for(&self, student: &UserId) -> Result<usize, RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        let before = guard.packages.len();
        guard
            .packages
            .retain(|_, package| package.student_id != *student);
        Ok(before - guard.packages.len())
    }
}

impl ReceiptStore for MemoryStore {
    fn receipts_for(&self, student: &UserId) -> Result<Vec<PaymentReceipt>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard
            .receipts
            .values()
            .filter(|receipt| receipt.student_id == *student)
            .cloned()
            .collect())
    }

    fn receipt_for_package(
        &self,
        package: PackageId,
    ) -> Result<Option<PaymentReceipt>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard
            .receipts
            .values()
            .find(|receipt| receipt.package_id == package)
            .cloned())
    }

    fn insert_receipt(&self, receipt: NewReceipt) -> Result<PaymentReceipt, RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        if guard
            .receipts
            .values()
            .any(|existing| existing.package_id == receipt.package_id)
        {
            return Err(RepositoryError::Conflict);
        }
        let receipt = Self::commit_receipt(&mut guard, receipt);
        if self.racing {
            return Err(RepositoryError::Conflict);
        }
        Ok(receipt)
    }

    fn all_receipts(&self) -> Result<Vec<PaymentReceipt>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.receipts.values().cloned().collect())
    }

    fn delete_receipts_for(&self, student: &UserId) -> Result<usize, RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        let before = guard.receipts.len();
        guard
            .receipts
            .retain(|_, receipt| receipt.student_id != *student);
        Ok(before - guard.receipts.len())
    }
}

impl FeedbackStore for MemoryStore {
    fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        let id = FeedbackId(guard.next_id());
        let feedback = feedback.into_feedback(id);
        guard.feedback.insert(id, feedback.clone());
        Ok(feedback)
    }

    fn fetch_feedback(&self, id: FeedbackId) -> Result<Option<Feedback>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.feedback.get(&id).cloned())
    }

    fn update_feedback(&self, feedback: Feedback) -> Result<(), RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        guard.feedback.insert(feedback.id, feedback);
        Ok(())
    }

    fn all_feedback(&self) -> Result<Vec<Feedback>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.feedback.values().cloned().collect())
    }
}

impl BookingStore for MemoryStore {
    fn insert_booking(&self, booking: NewBooking) -> Result<VehicleBooking, RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        let id = BookingId(guard.next_id());
        let booking = booking.into_booking(id);
        guard.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    fn bookings_for(&self, student: &UserId) -> Result<Vec<VehicleBooking>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard
            .bookings
            .values()
            .filter(|booking| booking.student_id == *student)
            .cloned()
            .collect())
    }
}

pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl UserDirectory for UnavailableStore {
    fn fetch_user(&self, _id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        offline()
    }

    fn find_by_email(&self, _email: &str) -> Result<Option<UserAccount>, RepositoryError> {
        offline()
    }

    fn insert_user(&self, _user: UserAccount) -> Result<UserAccount, RepositoryError> {
        offline()
    }

    fn update_user(&self, _user: UserAccount) -> Result<(), RepositoryError> {
        offline()
    }

    fn users_with_role(&self, _role: UserRole) -> Result<Vec<UserAccount>, RepositoryError> {
        offline()
    }

    fn students_assigned_to(
        &self,
        _instructor: &UserId,
    ) -> Result<Vec<UserAccount>, RepositoryError> {
        offline()
    }

    fn delete_user(&self, _id: &UserId) -> Result<(), RepositoryError> {
        offline()
    }
}

impl PackageStore for UnavailableStore {
    fn packages_for(&self, _student: &UserId) -> Result<Vec<PackageInstance>, RepositoryError> {
        offline()
    }

    fn fetch_package(&self, _id: PackageId) -> Result<Option<PackageInstance>, RepositoryError> {
        offline()
    }

    fn insert_package(&self, _draft: PackageDraft) -> Result<PackageInstance, RepositoryError> {
        offline()
    }

    fn update_package(&self, _package: PackageInstance) -> Result<(), RepositoryError> {
        offline()
    }

    fn delete_packages_for(&self, _student: &UserId) -> Result<usize, RepositoryError> {
        offline()
    }
}

impl ReceiptStore for UnavailableStore {
    fn receipts_for(&self, _student: &UserId) -> Result<Vec<PaymentReceipt>, RepositoryError> {
        offline()
    }

    fn receipt_for_package(
        &self,
        _package: PackageId,
    ) -> Result<Option<PaymentReceipt>, RepositoryError> {
        offline()
    }

    fn insert_receipt(&self, _receipt: NewReceipt) -> Result<PaymentReceipt, RepositoryError> {
        offline()
    }

    fn all_receipts(&self) -> Result<Vec<PaymentReceipt>, RepositoryError> {
        offline()
    }

    fn delete_receipts_for(&self, _student: &UserId) -> Result<usize, RepositoryError> {
        offline()
    }
}

impl FeedbackStore for UnavailableStore {
    fn insert_feedback(&self, _feedback: NewFeedback) -> Result<Feedback, RepositoryError> {
        offline()
    }

    fn fetch_feedback(&self, _id: FeedbackId) -> Result<Option<Feedback>, RepositoryError> {
        offline()
    }

    fn update_feedback(&self, _feedback: Feedback) -> Result<(), RepositoryError> {
        offline()
    }

    fn all_feedback(&self) -> Result<Vec<Feedback>, RepositoryError> {
        offline()
    }
}

impl BookingStore for UnavailableStore {
    fn insert_booking(&self, _booking: NewBooking) -> Result<VehicleBooking, RepositoryError> {
        offline()
    }

    fn bookings_for(&self, _student: &UserId) -> Result<Vec<VehicleBooking>, RepositoryError> {
        offline()
    }
}

/// Notifier whose transport is always down.
#[derive(Default)]
pub(super) struct FailingNotifier {
    attempts: Mutex<Vec<EmailMessage>>,
}

impl FailingNotifier {
    pub(super) fn attempts(&self) -> usize {
        self.attempts.lock().expect("notifier mutex poisoned").len()
    }
}

impl Notifier for FailingNotifier {
    fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError> {
        self.attempts
            .lock()
            .expect("notifier mutex poisoned")
            .push(message);
        Err(NotificationError::Transport("smtp relay refused".to_string()))
    }

    fn sent_count(&self) -> u64 {
        0
    }
}

pub(super) fn json_request(method: Method, uri: &str, body: &Value) -> Request<axum::body::Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(
            serde_json::to_vec(body).expect("serialize body"),
        ))
        .expect("valid request")
}

pub(super) fn empty_request(method: Method, uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .expect("valid request")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
