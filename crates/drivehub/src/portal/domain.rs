use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for directory users (students, instructors, admins).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn generate() -> Self {
        Self(format!("usr-{}", uuid::Uuid::new_v4().simple()))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReceiptId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeedbackId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(pub u64);

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Roles recognised by the external user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Instructor,
    Student,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Instructor => "Instructor",
            UserRole::Student => "Student",
        }
    }
}

/// Directory row for any portal user. Credentials live with the directory, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub role: UserRole,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub identity_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: String,
    pub assigned_instructor_id: Option<UserId>,
}

impl UserAccount {
    pub fn is_assigned_to(&self, instructor: &UserId) -> bool {
        self.assigned_instructor_id.as_ref() == Some(instructor)
    }
}

/// Closed set of lesson bundles sold by the school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    Learners,
    DriversCode8,
    DriversCode10,
    FullCode8,
    FullCode10,
}

impl PackageType {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Learners,
            Self::DriversCode8,
            Self::DriversCode10,
            Self::FullCode8,
            Self::FullCode10,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Learners => "Learners",
            Self::DriversCode8 => "Drivers-Code8",
            Self::DriversCode10 => "Drivers-Code10",
            Self::FullCode8 => "Full-Code8",
            Self::FullCode10 => "Full-Code10",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Learners => "20 comprehensive lessons for learner's license",
            Self::DriversCode8 => "30 professional driving lessons for Code 8 license",
            Self::DriversCode10 => "30 comprehensive lessons for Code 10 license",
            Self::FullCode8 => "Complete training: Learners + Drivers Code 8",
            Self::FullCode10 => "Complete training: Learners + Drivers Code 10",
        }
    }

    pub const fn is_learners(self) -> bool {
        matches!(self, Self::Learners)
    }

    pub const fn is_drivers_family(self) -> bool {
        matches!(self, Self::DriversCode8 | Self::DriversCode10)
    }

    pub const fn is_full_family(self) -> bool {
        matches!(self, Self::FullCode8 | Self::FullCode10)
    }

    pub const fn requires_adult(self) -> bool {
        !self.is_learners()
    }

    /// Whether holding `other` blocks selecting `self` as a second package of the same family.
    pub const fn shares_family_with(self, other: Self) -> bool {
        (self.is_drivers_family() && other.is_drivers_family())
            || (self.is_full_family() && other.is_full_family())
    }

    /// Whether a student already holding `held` may not get a new instance of `self`.
    pub fn conflicts_with(self, held: Self) -> bool {
        self == held || self.shares_family_with(held)
    }
}

/// Catalog entry describing a purchasable lesson bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageTemplate {
    pub id: u32,
    pub package_type: PackageType,
    pub display_name: &'static str,
    pub lesson_count: u32,
    /// Whole rand.
    pub price: u32,
}

impl PackageTemplate {
    pub fn draft_for(&self, student_id: &UserId) -> PackageDraft {
        PackageDraft {
            package_type: self.package_type,
            display_name: self.display_name.to_string(),
            lesson_count: self.lesson_count,
            price: self.price,
            student_id: student_id.clone(),
        }
    }
}

/// A package instance that has been approved for creation but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDraft {
    pub package_type: PackageType,
    pub display_name: String,
    pub lesson_count: u32,
    pub price: u32,
    pub student_id: UserId,
}

impl PackageDraft {
    pub fn into_instance(self, id: PackageId) -> PackageInstance {
        PackageInstance {
            id,
            package_type: self.package_type,
            display_name: self.display_name,
            lesson_count: self.lesson_count,
            price: self.price,
            student_id: self.student_id,
            lessons_completed: 0,
            is_driver_ready: false,
            driver_ready_at: None,
        }
    }
}

/// A student's enrollment in one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInstance {
    pub id: PackageId,
    pub package_type: PackageType,
    pub display_name: String,
    pub lesson_count: u32,
    pub price: u32,
    pub student_id: UserId,
    pub lessons_completed: u32,
    pub is_driver_ready: bool,
    pub driver_ready_at: Option<NaiveDateTime>,
}

impl PackageInstance {
    pub fn progress_percentage(&self) -> u32 {
        if self.lesson_count == 0 {
            return 0;
        }
        self.lessons_completed * 100 / self.lesson_count
    }

    pub fn is_completed_learners(&self) -> bool {
        self.package_type.is_learners() && self.is_driver_ready
    }
}

/// Human-facing receipt reference, `RCP` followed by eight uppercase alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptNumber(pub String);

impl ReceiptNumber {
    pub const PREFIX: &'static str = "RCP";

    pub fn generate() -> Self {
        let token = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", Self::PREFIX, token[..8].to_ascii_uppercase()))
    }

    pub fn is_well_formed(&self) -> bool {
        self.0.len() == 11
            && self.0.starts_with(Self::PREFIX)
            && self.0[3..]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
    }
}

impl fmt::Display for ReceiptNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Receipt approved by the payment rules, awaiting an id from the receipt store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReceipt {
    pub student_id: UserId,
    pub package_id: PackageId,
    pub amount: u32,
    pub card_holder_name: String,
    pub last4_digits: String,
    pub card_expiry: NaiveDate,
    pub paid_at: NaiveDateTime,
    pub receipt_number: ReceiptNumber,
}

impl NewReceipt {
    pub fn into_receipt(self, id: ReceiptId) -> PaymentReceipt {
        PaymentReceipt {
            id,
            student_id: self.student_id,
            package_id: self.package_id,
            amount: self.amount,
            card_holder_name: self.card_holder_name,
            last4_digits: self.last4_digits,
            card_expiry: self.card_expiry,
            paid_at: self.paid_at,
            receipt_number: self.receipt_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub id: ReceiptId,
    pub student_id: UserId,
    pub package_id: PackageId,
    pub amount: u32,
    pub card_holder_name: String,
    pub last4_digits: String,
    pub card_expiry: NaiveDate,
    pub paid_at: NaiveDateTime,
    pub receipt_number: ReceiptNumber,
}

/// Everything the rules need to know about one student's enrollments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentHoldings {
    pub packages: Vec<PackageInstance>,
    pub receipts: Vec<PaymentReceipt>,
}

impl StudentHoldings {
    pub fn new(packages: Vec<PackageInstance>, receipts: Vec<PaymentReceipt>) -> Self {
        Self { packages, receipts }
    }

    pub fn completed_learners(&self) -> Option<&PackageInstance> {
        self.packages
            .iter()
            .find(|package| package.is_completed_learners())
    }

    pub fn of_type(&self, package_type: PackageType) -> Option<&PackageInstance> {
        self.packages
            .iter()
            .find(|package| package.package_type == package_type)
    }

    pub fn of_family(&self, package_type: PackageType) -> Option<&PackageInstance> {
        self.packages
            .iter()
            .find(|package| package_type.shares_family_with(package.package_type))
    }

    pub fn receipt_for(&self, package_id: PackageId) -> Option<&PaymentReceipt> {
        self.receipts
            .iter()
            .find(|receipt| receipt.package_id == package_id)
    }

    pub fn is_paid(&self, package_id: PackageId) -> bool {
        self.receipt_for(package_id).is_some()
    }

    pub fn first_driver_ready(&self) -> Option<&PackageInstance> {
        self.packages.iter().find(|package| package.is_driver_ready)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub student_id: UserId,
    pub message: String,
    pub submitted_at: NaiveDateTime,
}

/// Student feedback and the administrator's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: FeedbackId,
    pub student_id: UserId,
    pub message: String,
    pub submitted_at: NaiveDateTime,
    pub is_read: bool,
    pub admin_response: Option<String>,
    pub responded_at: Option<NaiveDateTime>,
}

impl NewFeedback {
    pub fn into_feedback(self, id: FeedbackId) -> Feedback {
        Feedback {
            id,
            student_id: self.student_id,
            message: self.message,
            submitted_at: self.submitted_at,
            is_read: false,
            admin_response: None,
            responded_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// Request to reserve a school vehicle for the driving test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub test_date: NaiveDate,
    pub test_location: String,
    pub vehicle_type: String,
    #[serde(default)]
    pub special_requirements: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub student_id: UserId,
    pub request: BookingRequest,
    pub booked_at: NaiveDateTime,
    pub booking_fee: u32,
}

impl NewBooking {
    pub fn into_booking(self, id: BookingId) -> VehicleBooking {
        VehicleBooking {
            id,
            student_id: self.student_id,
            test_date: self.request.test_date,
            test_location: self.request.test_location,
            vehicle_type: self.request.vehicle_type,
            special_requirements: self.request.special_requirements,
            booked_at: self.booked_at,
            status: BookingStatus::Pending,
            booking_fee: self.booking_fee,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleBooking {
    pub id: BookingId,
    pub student_id: UserId,
    pub test_date: NaiveDate,
    pub test_location: String,
    pub vehicle_type: String,
    pub special_requirements: Option<String>,
    pub booked_at: NaiveDateTime,
    pub status: BookingStatus,
    pub booking_fee: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_predicates_partition_the_catalog() {
        for package_type in PackageType::ordered() {
            let memberships = [
                package_type.is_learners(),
                package_type.is_drivers_family(),
                package_type.is_full_family(),
            ];
            assert_eq!(memberships.iter().filter(|member| **member).count(), 1);
        }
        assert!(PackageType::DriversCode8.shares_family_with(PackageType::DriversCode10));
        assert!(PackageType::FullCode10.shares_family_with(PackageType::FullCode8));
        assert!(!PackageType::FullCode8.shares_family_with(PackageType::DriversCode8));
        assert!(!PackageType::Learners.shares_family_with(PackageType::Learners));
    }

    #[test]
    fn generated_receipt_numbers_are_well_formed() {
        for _ in 0..32 {
            let number = ReceiptNumber::generate();
            assert!(number.is_well_formed(), "{number} should be well formed");
        }
        assert!(!ReceiptNumber("RCPabc12345".to_string()).is_well_formed());
        assert!(!ReceiptNumber("INV1234ABCD".to_string()).is_well_formed());
    }

    #[test]
    fn progress_percentage_uses_whole_numbers() {
        let mut package = PackageDraft {
            package_type: PackageType::DriversCode8,
            display_name: "Drivers Package - Code 8".to_string(),
            lesson_count: 30,
            price: 2000,
            student_id: UserId("usr-1".to_string()),
        }
        .into_instance(PackageId(1));
        package.lessons_completed = 10;
        assert_eq!(package.progress_percentage(), 33);

        package.lesson_count = 0;
        assert_eq!(package.progress_percentage(), 0);
    }
}
