use serde::Serialize;

use super::domain::{
    PackageInstance, PackageType, PaymentReceipt, StudentHoldings, UserAccount, UserId,
};

#[derive(Debug, Clone, Serialize)]
pub struct PackageStatusView {
    pub package: PackageInstance,
    pub type_label: &'static str,
    pub description: &'static str,
    pub has_paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<PaymentReceipt>,
    pub progress_percentage: u32,
    pub is_driver_ready: bool,
}

impl PackageStatusView {
    pub fn from_holdings(package: &PackageInstance, holdings: &StudentHoldings) -> Self {
        let receipt = holdings.receipt_for(package.id).cloned();
        Self {
            package: package.clone(),
            type_label: package.package_type.label(),
            description: package.package_type.description(),
            has_paid: receipt.is_some(),
            receipt,
            progress_percentage: package.progress_percentage(),
            is_driver_ready: package.is_driver_ready,
        }
    }
}

/// Contact card for a user shown to someone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactView {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl From<&UserAccount> for ContactView {
    fn from(user: &UserAccount) -> Self {
        Self {
            id: user.id.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentDashboard {
    pub student: ContactView,
    pub packages: Vec<PackageStatusView>,
    /// Newest first.
    pub receipts: Vec<PaymentReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<ContactView>,
    pub can_upgrade_to_drivers: bool,
}

impl StudentDashboard {
    pub fn build(
        student: &UserAccount,
        holdings: &StudentHoldings,
        instructor: Option<&UserAccount>,
    ) -> Self {
        let packages = holdings
            .packages
            .iter()
            .map(|package| PackageStatusView::from_holdings(package, holdings))
            .collect();

        let has_drivers = holdings
            .packages
            .iter()
            .any(|package| package.package_type.is_drivers_family());
        let completed_pure_learners = holdings
            .packages
            .iter()
            .any(|package| package.package_type == PackageType::Learners && package.is_driver_ready);

        Self {
            student: ContactView::from(student),
            packages,
            receipts: newest_receipts_first(holdings.receipts.clone()),
            instructor: instructor.map(ContactView::from),
            can_upgrade_to_drivers: completed_pure_learners && !has_drivers,
        }
    }
}

/// One student's packages and receipts as seen by an instructor or administrator.
#[derive(Debug, Clone, Serialize)]
pub struct StudentDetail {
    pub student: ContactView,
    pub packages: Vec<PackageStatusView>,
    pub receipts: Vec<PaymentReceipt>,
    pub is_driver_ready: bool,
}

impl StudentDetail {
    pub fn build(student: &UserAccount, holdings: &StudentHoldings) -> Self {
        Self {
            student: ContactView::from(student),
            packages: holdings
                .packages
                .iter()
                .map(|package| PackageStatusView::from_holdings(package, holdings))
                .collect(),
            receipts: newest_receipts_first(holdings.receipts.clone()),
            is_driver_ready: holdings.first_driver_ready().is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructorRoster {
    pub instructor: ContactView,
    pub students: Vec<StudentDetail>,
    pub total_students: usize,
    pub total_packages: usize,
    pub driver_ready_students: usize,
}

impl InstructorRoster {
    pub fn build(instructor: &UserAccount, students: Vec<StudentDetail>) -> Self {
        Self {
            instructor: ContactView::from(instructor),
            total_students: students.len(),
            total_packages: students.iter().map(|detail| detail.packages.len()).sum(),
            driver_ready_students: students.iter().filter(|detail| detail.is_driver_ready).count(),
            students,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminOverview {
    pub student_count: usize,
    pub instructor_count: usize,
    /// Whole rand across every receipt.
    pub total_revenue: u64,
    pub recent_payments: Vec<PaymentReceipt>,
    pub notifications_sent: u64,
}

pub const RECENT_PAYMENT_LIMIT: usize = 5;

pub(crate) fn newest_receipts_first(mut receipts: Vec<PaymentReceipt>) -> Vec<PaymentReceipt> {
    receipts.sort_by(|a, b| b.paid_at.cmp(&a.paid_at).then(b.id.cmp(&a.id)));
    receipts
}
