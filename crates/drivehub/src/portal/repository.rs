use super::domain::{
    Feedback, FeedbackId, NewBooking, NewFeedback, NewReceipt, PackageDraft, PackageId,
    PackageInstance, PaymentReceipt, StudentHoldings, UserAccount, UserId, UserRole,
    VehicleBooking,
};

/// Read/write access to the external user directory.
pub trait UserDirectory: Send + Sync {
    fn fetch_user(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError>;
    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] when the id or email is already taken.
    fn insert_user(&self, user: UserAccount) -> Result<UserAccount, RepositoryError>;
    fn update_user(&self, user: UserAccount) -> Result<(), RepositoryError>;
    fn users_with_role(&self, role: UserRole) -> Result<Vec<UserAccount>, RepositoryError>;
    fn students_assigned_to(
        &self,
        instructor: &UserId,
    ) -> Result<Vec<UserAccount>, RepositoryError>;
    fn delete_user(&self, id: &UserId) -> Result<(), RepositoryError>;
}

pub trait PackageStore: Send + Sync {
    fn packages_for(&self, student: &UserId) -> Result<Vec<PackageInstance>, RepositoryError>;
    fn fetch_package(&self, id: PackageId) -> Result<Option<PackageInstance>, RepositoryError>;
    /// Atomic check-and-insert: fails with [`RepositoryError::Conflict`] when the student
    /// already holds an instance of the draft's package type or of its Drivers or Full
    /// family (see [`super::domain::PackageType::conflicts_with`]).
    fn insert_package(&self, draft: PackageDraft) -> Result<PackageInstance, RepositoryError>;
    fn update_package(&self, package: PackageInstance) -> Result<(), RepositoryError>;
    fn delete_packages_for(&self, student: &UserId) -> Result<usize, RepositoryError>;
}

pub trait ReceiptStore: Send + Sync {
    fn receipts_for(&self, student: &UserId) -> Result<Vec<PaymentReceipt>, RepositoryError>;
    fn receipt_for_package(
        &self,
        package: PackageId,
    ) -> Result<Option<PaymentReceipt>, RepositoryError>;
    /// Atomic check-and-insert: fails with [`RepositoryError::Conflict`] when the package
    /// already has a receipt.
    fn insert_receipt(&self, receipt: NewReceipt) -> Result<PaymentReceipt, RepositoryError>;
    fn all_receipts(&self) -> Result<Vec<PaymentReceipt>, RepositoryError>;
    fn delete_receipts_for(&self, student: &UserId) -> Result<usize, RepositoryError>;
}

pub trait FeedbackStore: Send + Sync {
    fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, RepositoryError>;
    fn fetch_feedback(&self, id: FeedbackId) -> Result<Option<Feedback>, RepositoryError>;
    fn update_feedback(&self, feedback: Feedback) -> Result<(), RepositoryError>;
    fn all_feedback(&self) -> Result<Vec<Feedback>, RepositoryError>;
}

pub trait BookingStore: Send + Sync {
    fn insert_booking(&self, booking: NewBooking) -> Result<VehicleBooking, RepositoryError>;
    fn bookings_for(&self, student: &UserId) -> Result<Vec<VehicleBooking>, RepositoryError>;
}

/// Every collaborator the portal service writes through.
pub trait PortalStore:
    UserDirectory + PackageStore + ReceiptStore + FeedbackStore + BookingStore
{
    fn holdings_for(&self, student: &UserId) -> Result<StudentHoldings, RepositoryError> {
        Ok(StudentHoldings::new(
            self.packages_for(student)?,
            self.receipts_for(student)?,
        ))
    }
}

impl<T> PortalStore for T where
    T: UserDirectory + PackageStore + ReceiptStore + FeedbackStore + BookingStore
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
