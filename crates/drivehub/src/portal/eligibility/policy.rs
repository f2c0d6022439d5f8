use serde::{Deserialize, Serialize};

use super::super::domain::{
    PackageDraft, PackageId, PackageTemplate, StudentHoldings, UserAccount,
};
use super::rules::SelectionSignals;
use super::ResolvedAge;
use crate::identity::IdentityError;

/// Result of asking to enroll in a catalog template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SelectionOutcome {
    CreateNew(PackageDraft),
    RedirectToPayment(PackageId),
    Rejected(SelectionRejection),
}

/// Stable vocabulary of selection refusals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRejection {
    InvalidTemplate,
    UnderAgeWithCompletedLearners,
    AgeRestricted,
    AlreadyCompletedLearners,
    RequiresUpgradeFlow,
}

impl SelectionRejection {
    pub const fn summary(self) -> &'static str {
        match self {
            SelectionRejection::InvalidTemplate => "invalid package selected",
            SelectionRejection::UnderAgeWithCompletedLearners => {
                "learners training complete; come back at 18 to continue with drivers training"
            }
            SelectionRejection::AgeRestricted => {
                "you must be 18 years or older to select driver's packages"
            }
            SelectionRejection::AlreadyCompletedLearners => {
                "learners package already completed; upgrade to drivers training instead"
            }
            SelectionRejection::RequiresUpgradeFlow => {
                "learners phase already completed; select a drivers package instead"
            }
        }
    }

    /// Whether the caller should steer the student into the upgrade listing.
    pub const fn suggests_upgrade(self) -> bool {
        matches!(
            self,
            SelectionRejection::AlreadyCompletedLearners | SelectionRejection::RequiresUpgradeFlow
        )
    }
}

/// Vehicle-booking verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum BookingEligibility {
    Eligible,
    Ineligible(BookingIneligibility),
}

impl BookingEligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, BookingEligibility::Eligible)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingIneligibility {
    NoDriverReadyPackage,
    LearnersOnlyPackage,
    UnderAge,
    IdentityError(String),
}

impl BookingIneligibility {
    pub fn summary(&self) -> String {
        match self {
            BookingIneligibility::NoDriverReadyPackage => {
                "complete your lessons and be marked driver ready before booking a vehicle"
                    .to_string()
            }
            BookingIneligibility::LearnersOnlyPackage => {
                "vehicle booking requires a drivers or full package".to_string()
            }
            BookingIneligibility::UnderAge => {
                "you must be 18 years or older to book a vehicle for the driving test".to_string()
            }
            BookingIneligibility::IdentityError(detail) => {
                format!("unable to validate age from identity number: {detail}")
            }
        }
    }
}

/// Ordered selection rules; the first match wins.
pub(crate) fn decide_selection(
    student: &UserAccount,
    template: &PackageTemplate,
    age: &ResolvedAge,
    signals: &SelectionSignals<'_>,
) -> SelectionOutcome {
    if signals.completed_learners.is_some() && !age.is_adult {
        return SelectionOutcome::Rejected(SelectionRejection::UnderAgeWithCompletedLearners);
    }

    if template.package_type.requires_adult() && !age.is_adult {
        return SelectionOutcome::Rejected(SelectionRejection::AgeRestricted);
    }

    // A finished learners package is never a payment target; rule 6 answers instead.
    if let Some(existing) = signals
        .same_type
        .filter(|existing| !existing.is_completed_learners())
    {
        return SelectionOutcome::RedirectToPayment(existing.id);
    }

    if let Some(existing) = signals.same_family {
        return SelectionOutcome::RedirectToPayment(existing.id);
    }

    if signals.completed_learners.is_some() {
        if template.package_type.is_learners() {
            return SelectionOutcome::Rejected(SelectionRejection::AlreadyCompletedLearners);
        }
        if template.package_type.is_full_family() {
            return SelectionOutcome::Rejected(SelectionRejection::RequiresUpgradeFlow);
        }
    }

    SelectionOutcome::CreateNew(template.draft_for(&student.id))
}

/// Booking rules: a driver-ready package that is not pure learners, then adulthood
/// taken strictly from the identity number.
pub(crate) fn decide_booking(
    holdings: &StudentHoldings,
    identity_is_adult: impl FnOnce() -> Result<bool, IdentityError>,
) -> BookingEligibility {
    if holdings.first_driver_ready().is_none() {
        return BookingEligibility::Ineligible(BookingIneligibility::NoDriverReadyPackage);
    }

    // Completed learners does not shadow a completed drivers or full package held alongside it.
    let qualifying = holdings
        .packages
        .iter()
        .any(|package| package.is_driver_ready && !package.package_type.is_learners());
    if !qualifying {
        return BookingEligibility::Ineligible(BookingIneligibility::LearnersOnlyPackage);
    }

    match identity_is_adult() {
        Ok(true) => BookingEligibility::Eligible,
        Ok(false) => BookingEligibility::Ineligible(BookingIneligibility::UnderAge),
        Err(error) => {
            BookingEligibility::Ineligible(BookingIneligibility::IdentityError(error.to_string()))
        }
    }
}
