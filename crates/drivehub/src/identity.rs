//! South-African national identity number parsing.
//!
//! Only the leading `YYMMDD` block is interpreted. Citizenship and checksum
//! digits are carried along but not validated.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Two-digit years at or below this value belong to the 2000s.
pub const CENTURY_PIVOT: u32 = 21;
/// Age at which driver and full packages unlock.
pub const ADULT_AGE: u32 = 18;
pub const IDENTITY_NUMBER_LENGTH: usize = 13;

/// Raised when an identity number cannot be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid identity number: {0}")]
    InvalidIdentityFormat(FormatIssue),
}

/// Detail carried by [`IdentityError::InvalidIdentityFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatIssue {
    WrongLength(usize),
    NonDigit,
    ImpossibleDate { year: i32, month: u32, day: u32 },
}

impl fmt::Display for FormatIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatIssue::WrongLength(found) => write!(
                f,
                "expected {IDENTITY_NUMBER_LENGTH} characters, found {found}"
            ),
            FormatIssue::NonDigit => write!(f, "only digits are allowed"),
            FormatIssue::ImpossibleDate { year, month, day } => {
                write!(f, "{year:04}-{month:02}-{day:02} is not a calendar date")
            }
        }
    }
}

/// Structurally valid identity number: exactly 13 ASCII digits.
///
/// The encoded birth date is only checked by [`NationalIdParser`], so an
/// `IdentityNumber` may still carry an impossible date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityNumber(String);

impl IdentityNumber {
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let length = raw.chars().count();
        if length != IDENTITY_NUMBER_LENGTH {
            return Err(IdentityError::InvalidIdentityFormat(
                FormatIssue::WrongLength(length),
            ));
        }
        if !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(IdentityError::InvalidIdentityFormat(FormatIssue::NonDigit));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn field(&self, start: usize) -> u32 {
        // Both bytes are ASCII digits, checked in `parse`.
        let bytes = self.0.as_bytes();
        u32::from(bytes[start] - b'0') * 10 + u32::from(bytes[start + 1] - b'0')
    }

    pub fn year_of_century(&self) -> u32 {
        self.field(0)
    }

    pub fn month(&self) -> u32 {
        self.field(2)
    }

    pub fn day(&self) -> u32 {
        self.field(4)
    }
}

impl FromStr for IdentityNumber {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for IdentityNumber {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IdentityNumber> for String {
    fn from(value: IdentityNumber) -> Self {
        value.0
    }
}

impl fmt::Display for IdentityNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Birth date and age recovered from an identity number or a stored date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedIdentity {
    pub birth_date: NaiveDate,
    pub age: u32,
    pub is_adult: bool,
}

/// Parser holding the century pivot and adult threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NationalIdParser {
    century_pivot: u32,
    adult_age: u32,
}

impl Default for NationalIdParser {
    fn default() -> Self {
        Self::new(CENTURY_PIVOT, ADULT_AGE)
    }
}

impl NationalIdParser {
    pub fn new(century_pivot: u32, adult_age: u32) -> Self {
        Self {
            century_pivot: century_pivot.min(99),
            adult_age,
        }
    }

    pub fn century_pivot(&self) -> u32 {
        self.century_pivot
    }

    pub fn adult_age(&self) -> u32 {
        self.adult_age
    }

    pub fn full_year(&self, year_of_century: u32) -> i32 {
        let base = if year_of_century <= self.century_pivot {
            2000
        } else {
            1900
        };
        base + year_of_century as i32
    }

    pub fn birth_date(&self, raw: &str) -> Result<NaiveDate, IdentityError> {
        let number = IdentityNumber::parse(raw)?;
        let year = self.full_year(number.year_of_century());
        let (month, day) = (number.month(), number.day());

        NaiveDate::from_ymd_opt(year, month, day).ok_or(IdentityError::InvalidIdentityFormat(
            FormatIssue::ImpossibleDate { year, month, day },
        ))
    }

    /// Derive the birth date, age and adulthood encoded in `raw` as of `today`.
    pub fn derive(&self, raw: &str, today: NaiveDate) -> Result<DerivedIdentity, IdentityError> {
        let birth_date = self.birth_date(raw)?;
        Ok(self.from_birth_date(birth_date, today))
    }

    pub fn is_adult(&self, raw: &str, today: NaiveDate) -> Result<bool, IdentityError> {
        self.derive(raw, today).map(|identity| identity.is_adult)
    }

    pub fn from_birth_date(&self, birth_date: NaiveDate, today: NaiveDate) -> DerivedIdentity {
        let age = age_on(birth_date, today);
        DerivedIdentity {
            birth_date,
            age,
            is_adult: age >= self.adult_age,
        }
    }
}

/// Whole calendar years between `birth_date` and `today`; zero for future dates.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> u32 {
    if birth_date >= today {
        return 0;
    }

    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age.max(0) as u32
}
