mod config;
mod policy;
mod rules;

pub use config::EligibilityConfig;
pub use policy::{BookingEligibility, BookingIneligibility, SelectionOutcome, SelectionRejection};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::catalog::PackageCatalog;
use super::domain::{PackageTemplate, StudentHoldings, UserAccount};
use crate::identity::NationalIdParser;

/// Which piece of evidence an age was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeSource {
    IdentityNumber,
    DateOfBirth,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAge {
    pub age: u32,
    pub is_adult: bool,
    pub source: AgeSource,
}

/// Catalog slice offered to a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageOffer {
    pub templates: Vec<PackageTemplate>,
    pub age: ResolvedAge,
    pub upgrade_flow: bool,
    /// Learners is complete but the student must reach adulthood before anything else unlocks.
    pub under_age_with_completed_learners: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OfferError {
    #[error("an upgrade requires a completed learners package")]
    NotEligibleForUpgrade,
}

/// Stateless decision engine over a student's age evidence and holdings.
#[derive(Debug, Clone)]
pub struct EligibilityEngine {
    config: EligibilityConfig,
    parser: NationalIdParser,
    catalog: PackageCatalog,
}

impl Default for EligibilityEngine {
    fn default() -> Self {
        Self::new(EligibilityConfig::default())
    }
}

impl EligibilityEngine {
    pub fn new(config: EligibilityConfig) -> Self {
        let parser = NationalIdParser::new(config.century_pivot, config.adult_age);
        Self {
            config,
            parser,
            catalog: PackageCatalog::standard(),
        }
    }

    pub fn config(&self) -> &EligibilityConfig {
        &self.config
    }

    pub fn parser(&self) -> &NationalIdParser {
        &self.parser
    }

    pub fn catalog(&self) -> &PackageCatalog {
        &self.catalog
    }

    /// Never fails; unusable evidence falls through to the next source.
    pub fn resolve_age(&self, student: &UserAccount, today: NaiveDate) -> ResolvedAge {
        rules::resolve_age(&self.parser, &self.config, student, today)
    }

    pub fn offered_templates(
        &self,
        student: &UserAccount,
        holdings: &StudentHoldings,
        upgrade_requested: bool,
        today: NaiveDate,
    ) -> Result<PackageOffer, OfferError> {
        let age = self.resolve_age(student, today);
        let completed_learners = holdings.completed_learners().is_some();

        if upgrade_requested && !completed_learners {
            return Err(OfferError::NotEligibleForUpgrade);
        }

        let templates = self
            .catalog
            .templates()
            .iter()
            .filter(|template| age.is_adult || !template.package_type.requires_adult())
            .filter(|template| !upgrade_requested || template.package_type.requires_adult())
            .cloned()
            .collect();

        Ok(PackageOffer {
            templates,
            age,
            upgrade_flow: upgrade_requested,
            under_age_with_completed_learners: completed_learners && !age.is_adult,
        })
    }

    pub fn evaluate_selection(
        &self,
        student: &UserAccount,
        template_id: u32,
        holdings: &StudentHoldings,
        today: NaiveDate,
    ) -> SelectionOutcome {
        let Some(template) = self.catalog.get(template_id) else {
            return SelectionOutcome::Rejected(SelectionRejection::InvalidTemplate);
        };

        let age = self.resolve_age(student, today);
        let signals = rules::selection_signals(holdings, template.package_type);
        policy::decide_selection(student, template, &age, &signals)
    }

    /// Adulthood here comes only from the identity number; a missing or malformed
    /// number is reported rather than replaced by the stored birth date.
    pub fn check_booking_eligibility(
        &self,
        student: &UserAccount,
        holdings: &StudentHoldings,
        today: NaiveDate,
    ) -> BookingEligibility {
        policy::decide_booking(holdings, || {
            let raw = student.identity_number.as_deref().unwrap_or_default();
            self.parser.is_adult(raw, today)
        })
    }
}
