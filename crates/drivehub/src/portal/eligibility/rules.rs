use chrono::NaiveDate;
use tracing::debug;

use super::super::domain::{PackageInstance, PackageType, StudentHoldings, UserAccount};
use super::config::EligibilityConfig;
use super::{AgeSource, ResolvedAge};
use crate::identity::NationalIdParser;

/// Facts about a student's holdings that the selection policy branches on.
pub(crate) struct SelectionSignals<'a> {
    pub completed_learners: Option<&'a PackageInstance>,
    pub same_type: Option<&'a PackageInstance>,
    pub same_family: Option<&'a PackageInstance>,
}

pub(crate) fn selection_signals(
    holdings: &StudentHoldings,
    requested: PackageType,
) -> SelectionSignals<'_> {
    SelectionSignals {
        completed_learners: holdings.completed_learners(),
        same_type: holdings.of_type(requested),
        same_family: holdings.of_family(requested),
    }
}

/// Identity number first, then stored birth date, then the conservative default.
pub(crate) fn resolve_age(
    parser: &NationalIdParser,
    config: &EligibilityConfig,
    student: &UserAccount,
    today: NaiveDate,
) -> ResolvedAge {
    if let Some(raw) = student.identity_number.as_deref().filter(|raw| !raw.is_empty()) {
        match parser.derive(raw, today) {
            Ok(identity) => {
                return ResolvedAge {
                    age: identity.age,
                    is_adult: identity.is_adult,
                    source: AgeSource::IdentityNumber,
                }
            }
            Err(error) => {
                debug!(student = %student.id, %error, "identity number unusable, falling back");
            }
        }
    }

    if let Some(birth_date) = student.date_of_birth {
        let identity = parser.from_birth_date(birth_date, today);
        return ResolvedAge {
            age: identity.age,
            is_adult: identity.is_adult,
            source: AgeSource::DateOfBirth,
        };
    }

    debug!(student = %student.id, "no age evidence, treating as minor");
    ResolvedAge {
        age: config.unknown_age_default,
        is_adult: false,
        source: AgeSource::Default,
    }
}
