use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use super::domain::{UserAccount, UserId, UserRole};
use crate::identity::{DerivedIdentity, IdentityError, NationalIdParser};

/// Self-service student sign-up. Credentials are handled by the directory.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RegistrationRequest {
    #[validate(length(min = 1, max = 100, message = "full name is required"))]
    pub full_name: String,
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub phone_number: String,
    pub identity_number: String,
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid registration: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("you must be at least {minimum} years old to register (identity number gives {age})")]
    TooYoung { age: u32, minimum: u32 },
    #[error("{0} is not a valid South African phone number")]
    InvalidPhoneNumber(String),
    #[error("an account already exists for {0}")]
    EmailInUse(String),
}

/// `+27` or `0`, then a digit 1-8, then eight more digits.
pub fn is_sa_phone_number(raw: &str) -> bool {
    let rest = match raw.strip_prefix("+27") {
        Some(rest) => rest,
        None => match raw.strip_prefix('0') {
            Some(rest) => rest,
            None => return false,
        },
    };

    let bytes = rest.as_bytes();
    bytes.len() == 9
        && (b'1'..=b'8').contains(&bytes[0])
        && bytes[1..].iter().all(u8::is_ascii_digit)
}

impl RegistrationRequest {
    /// Validate the form and derive the birth date the directory will store.
    pub fn check(
        &self,
        parser: &NationalIdParser,
        minimum_age: u32,
        today: NaiveDate,
    ) -> Result<DerivedIdentity, RegistrationError> {
        self.validate()?;

        if !is_sa_phone_number(self.phone_number.trim()) {
            return Err(RegistrationError::InvalidPhoneNumber(
                self.phone_number.clone(),
            ));
        }

        let identity = parser.derive(self.identity_number.trim(), today)?;
        if identity.age < minimum_age {
            return Err(RegistrationError::TooYoung {
                age: identity.age,
                minimum: minimum_age,
            });
        }
        Ok(identity)
    }

    pub fn into_account(self, identity: &DerivedIdentity) -> UserAccount {
        UserAccount {
            id: UserId::generate(),
            role: UserRole::Student,
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_ascii_lowercase(),
            phone_number: Some(self.phone_number.trim().to_string()),
            identity_number: Some(self.identity_number.trim().to_string()),
            date_of_birth: Some(identity.birth_date),
            address: self.address.trim().to_string(),
            assigned_instructor_id: None,
        }
    }
}
