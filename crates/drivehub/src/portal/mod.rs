//! Student enrollment, payment and lesson-progress workflows for the driving school.

pub mod catalog;
pub mod domain;
pub mod eligibility;
pub mod payments;
pub mod progress;
pub mod registration;
pub mod repository;
pub mod router;
pub mod service;
pub mod views;

#[cfg(test)]
mod tests;

pub use catalog::PackageCatalog;
pub use domain::{
    BookingId, BookingRequest, BookingStatus, Feedback, FeedbackId, NewBooking, NewFeedback,
    NewReceipt, PackageDraft, PackageId, PackageInstance, PackageTemplate, PackageType,
    PaymentReceipt, ReceiptId, ReceiptNumber, StudentHoldings, UserAccount, UserId, UserRole,
    VehicleBooking,
};
pub use eligibility::{
    AgeSource, BookingEligibility, BookingIneligibility, EligibilityConfig, EligibilityEngine,
    OfferError, PackageOffer, ResolvedAge, SelectionOutcome, SelectionRejection,
};
pub use payments::{PaymentDecision, PaymentDetails, PaymentDetailsError, PaymentRejection};
pub use registration::{RegistrationError, RegistrationRequest};
pub use repository::{
    BookingStore, FeedbackStore, PackageStore, PortalStore, ReceiptStore, RepositoryError,
    UserDirectory,
};
pub use router::portal_router;
pub use service::{
    FeedbackError, InstructorMessage, PaymentResult, PortalService, PortalServiceError,
    SelectionResult,
};
pub use views::{
    AdminOverview, ContactView, InstructorRoster, PackageStatusView, StudentDashboard,
    StudentDetail,
};
