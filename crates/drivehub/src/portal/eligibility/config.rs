use serde::{Deserialize, Serialize};

use crate::identity::{ADULT_AGE, CENTURY_PIVOT};

/// Policy dials backing age resolution and booking rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityConfig {
    pub century_pivot: u32,
    pub adult_age: u32,
    pub minimum_registration_age: u32,
    /// Age assumed when neither an identity number nor a birth date is usable.
    pub unknown_age_default: u32,
    pub vehicle_booking_fee: u32,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            century_pivot: CENTURY_PIVOT,
            adult_age: ADULT_AGE,
            minimum_registration_age: 16,
            unknown_age_default: 16,
            vehicle_booking_fee: 250,
        }
    }
}
