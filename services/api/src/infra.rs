use chrono::NaiveDate;
use drivehub::portal::{
    BookingId, BookingStore, Feedback, FeedbackId, FeedbackStore, NewBooking, NewFeedback,
    NewReceipt, PackageDraft, PackageId, PackageInstance, PackageStore, PaymentReceipt, ReceiptId,
    ReceiptStore, RepositoryError, UserAccount, UserDirectory, UserId, UserRole, VehicleBooking,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, UserAccount>,
    packages: BTreeMap<PackageId, PackageInstance>,
    receipts: BTreeMap<ReceiptId, PaymentReceipt>,
    feedback: BTreeMap<FeedbackId, Feedback>,
    bookings: BTreeMap<BookingId, VehicleBooking>,
    sequence: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

/// Process-local stand-in for the directory and the package, receipt, feedback and booking
/// tables. One lock covers every table so the check-and-insert operations are atomic.
#[derive(Default, Clone)]
pub(crate) struct InMemoryPortalStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryPortalStore {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

impl UserDirectory for InMemoryPortalStore {
    fn fetch_user(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        Ok(self.tables()?.users.get(id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn insert_user(&self, user: UserAccount) -> Result<UserAccount, RepositoryError> {
        let mut guard = self.tables()?;
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
        let mut guard = self.tables()?;
        match guard.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn users_with_role(&self, role: UserRole) -> Result<Vec<UserAccount>, RepositoryError> {
        Ok(self
            .tables()?
            .users
            .values()
            .filter(|user| user.role == role)
            .cloned()
            .collect())
    }

    fn students_assigned_to(
        &self,
        instructor: &UserId,
    ) -> Result<Vec<UserAccount>, RepositoryError> {
        Ok(self
            .tables()?
            .users
            .values()
            .filter(|user| user.role == UserRole::Student && user.is_assigned_to(instructor))
            .cloned()
            .collect())
    }

    fn delete_user(&self, id: &UserId) -> Result<(), RepositoryError> {
        self.tables()?
            .users
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

impl PackageStore for InMemoryPortalStore {
    fn packages_for(&self, student: &UserId) -> Result<Vec<PackageInstance>, RepositoryError> {
        Ok(self
            .tables()?
            .packages
            .values()
            .filter(|package| package.student_id == *student)
            .cloned()
            .collect())
    }

    fn fetch_package(&self, id: PackageId) -> Result<Option<PackageInstance>, RepositoryError> {
        Ok(self.tables()?.packages.get(&id).cloned())
    }

    fn insert_package(&self, draft: PackageDraft) -> Result<PackageInstance, RepositoryError> {
        let mut guard = self.tables()?;
        let duplicate = guard.packages.values().any(|package| {
            package.student_id == draft.student_id
                && draft.package_type.conflicts_with(package.package_type)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        let id = PackageId(guard.next_id());
        let package = draft.into_instance(id);
        guard.packages.insert(id, package.clone());
        Ok(package)
    }

    fn update_package(&self, package: PackageInstance) -> Result<(), RepositoryError> {
        let mut guard = self.tables()?;
        match guard.packages.get_mut(&package.id) {
            Some(existing) => {
                *existing = package;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn delete_packages_for(&self, student: &UserId) -> Result<usize, RepositoryError> {
        let mut guard = self.tables()?;
        let before = guard.packages.len();
        guard
            .packages
            .retain(|_, package| package.student_id != *student);
        Ok(before - guard.packages.len())
    }
}

impl ReceiptStore for InMemoryPortalStore {
    fn receipts_for(&self, student: &UserId) -> Result<Vec<PaymentReceipt>, RepositoryError> {
        Ok(self
            .tables()?
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
        Ok(self
            .tables()?
            .receipts
            .values()
            .find(|receipt| receipt.package_id == package)
            .cloned())
    }

    fn insert_receipt(&self, receipt: NewReceipt) -> Result<PaymentReceipt, RepositoryError> {
        let mut guard = self.tables()?;
        let paid = guard
            .receipts
            .values()
            .any(|existing| existing.package_id == receipt.package_id);
        if paid {
            return Err(RepositoryError::Conflict);
        }
        let id = ReceiptId(guard.next_id());
        let receipt = receipt.into_receipt(id);
        guard.receipts.insert(id, receipt.clone());
        Ok(receipt)
    }

    fn all_receipts(&self) -> Result<Vec<PaymentReceipt>, RepositoryError> {
        Ok(self.tables()?.receipts.values().cloned().collect())
    }

    fn delete_receipts_for(&self, student: &UserId) -> Result<usize, RepositoryError> {
        let mut guard = self.tables()?;
        let before = guard.receipts.len();
        guard
            .receipts
            .retain(|_, receipt| receipt.student_id != *student);
        Ok(before - guard.receipts.len())
    }
}

impl FeedbackStore for InMemoryPortalStore {
    fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, RepositoryError> {
        let mut guard = self.tables()?;
        let id = FeedbackId(guard.next_id());
        let feedback = feedback.into_feedback(id);
        guard.feedback.insert(id, feedback.clone());
        Ok(feedback)
    }

    fn fetch_feedback(&self, id: FeedbackId) -> Result<Option<Feedback>, RepositoryError> {
        Ok(self.tables()?.feedback.get(&id).cloned())
    }

    fn update_feedback(&self, feedback: Feedback) -> Result<(), RepositoryError> {
        let mut guard = self.tables()?;
        match guard.feedback.get_mut(&feedback.id) {
            Some(existing) => {
                *existing = feedback;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn all_feedback(&self) -> Result<Vec<Feedback>, RepositoryError> {
        Ok(self.tables()?.feedback.values().cloned().collect())
    }
}

impl BookingStore for InMemoryPortalStore {
    fn insert_booking(&self, booking: NewBooking) -> Result<VehicleBooking, RepositoryError> {
        let mut guard = self.tables()?;
        let id = BookingId(guard.next_id());
        let booking = booking.into_booking(id);
        guard.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    fn bookings_for(&self, student: &UserId) -> Result<Vec<VehicleBooking>, RepositoryError> {
        Ok(self
            .tables()?
            .bookings
            .values()
            .filter(|booking| booking.student_id == *student)
            .cloned()
            .collect())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
