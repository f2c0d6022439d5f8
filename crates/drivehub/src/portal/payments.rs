//! Card-detail validation and the receipt rules for a single package.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::domain::{NewReceipt, PackageInstance, ReceiptNumber, StudentHoldings};

pub const CARD_NUMBER_LENGTH: usize = 16;
pub const CVV_LENGTH: usize = 3;

/// Card details as submitted on the payment form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub card_holder_name: String,
    pub card_number: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: String,
}

/// Validated card details reduced to what a receipt keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPayment {
    pub card_holder_name: String,
    pub last4_digits: String,
    pub card_expiry: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentDetailsError {
    #[error("card holder name is required")]
    MissingCardHolder,
    #[error("card number must be exactly {CARD_NUMBER_LENGTH} digits")]
    InvalidCardNumber,
    #[error("cvv must be exactly {CVV_LENGTH} digits")]
    InvalidCvv,
    #[error("card expiry {month:02}/{year} is not a valid month")]
    InvalidExpiry { month: u32, year: i32 },
}

fn is_digits(value: &str, length: usize) -> bool {
    value.len() == length && value.bytes().all(|b| b.is_ascii_digit())
}

impl PaymentDetails {
    pub fn validate(&self) -> Result<CardPayment, PaymentDetailsError> {
        let card_holder_name = self.card_holder_name.trim();
        if card_holder_name.is_empty() {
            return Err(PaymentDetailsError::MissingCardHolder);
        }
        if !is_digits(&self.card_number, CARD_NUMBER_LENGTH) {
            return Err(PaymentDetailsError::InvalidCardNumber);
        }
        if !is_digits(&self.cvv, CVV_LENGTH) {
            return Err(PaymentDetailsError::InvalidCvv);
        }
        let card_expiry = NaiveDate::from_ymd_opt(self.expiry_year, self.expiry_month, 1).ok_or(
            PaymentDetailsError::InvalidExpiry {
                month: self.expiry_month,
                year: self.expiry_year,
            },
        )?;

        Ok(CardPayment {
            card_holder_name: card_holder_name.to_string(),
            last4_digits: self.card_number[CARD_NUMBER_LENGTH - 4..].to_string(),
            card_expiry,
        })
    }
}

/// Verdict on a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentDecision {
    Recorded(NewReceipt),
    Rejected(PaymentRejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRejection {
    AlreadyPaid,
    DuplicateActivePackage,
}

impl PaymentRejection {
    pub const fn summary(self) -> &'static str {
        match self {
            PaymentRejection::AlreadyPaid => "this package has already been paid",
            PaymentRejection::DuplicateActivePackage => {
                "you already have an active package of this type"
            }
        }
    }
}

/// Applies the receipt rules before looking at the card, so an already paid package is
/// rejected whatever details accompany the request.
pub fn record_payment(
    package: &PackageInstance,
    details: &PaymentDetails,
    holdings: &StudentHoldings,
    paid_at: NaiveDateTime,
) -> Result<PaymentDecision, PaymentDetailsError> {
    if holdings.is_paid(package.id) {
        return Ok(PaymentDecision::Rejected(PaymentRejection::AlreadyPaid));
    }

    let duplicate = holdings.packages.iter().any(|other| {
        other.id != package.id
            && other.student_id == package.student_id
            && other.package_type == package.package_type
            && holdings.is_paid(other.id)
    });
    if duplicate {
        return Ok(PaymentDecision::Rejected(
            PaymentRejection::DuplicateActivePackage,
        ));
    }

    let card = details.validate()?;
    Ok(PaymentDecision::Recorded(NewReceipt {
        student_id: package.student_id.clone(),
        package_id: package.id,
        amount: package.price,
        card_holder_name: card.card_holder_name,
        last4_digits: card.last4_digits,
        card_expiry: card.card_expiry,
        paid_at,
        receipt_number: ReceiptNumber::generate(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::domain::{PackageDraft, PackageId, PackageType, ReceiptId, UserId};

    fn details() -> PaymentDetails {
        PaymentDetails {
            card_holder_name: "Thandi Mokoena".to_string(),
            card_number: "4111111111111234".to_string(),
            expiry_month: 9,
            expiry_year: 2028,
            cvv: "123".to_string(),
        }
    }

    fn paid_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .and_then(|date| date.and_hms_opt(10, 30, 0))
            .expect("valid timestamp")
    }

    fn package(id: u64, package_type: PackageType) -> PackageInstance {
        PackageDraft {
            package_type,
            display_name: package_type.label().to_string(),
            lesson_count: 30,
            price: 2000,
            student_id: UserId("usr-pay".to_string()),
        }
        .into_instance(PackageId(id))
    }

    #[test]
    fn keeps_only_the_last_four_digits_and_first_of_month_expiry() {
        let card = details().validate().expect("valid card");
        assert_eq!(card.last4_digits, "1234");
        assert_eq!(
            card.card_expiry,
            NaiveDate::from_ymd_opt(2028, 9, 1).expect("valid date")
        );
    }

    #[test]
    fn rejects_malformed_card_fields() {
        let mut short = details();
        short.card_number = "411111111111".to_string();
        assert_eq!(short.validate(), Err(PaymentDetailsError::InvalidCardNumber));

        let mut lettered = details();
        lettered.card_number = "4111-1111-1111-1".to_string();
        assert_eq!(lettered.validate(), Err(PaymentDetailsError::InvalidCardNumber));

        let mut cvv = details();
        cvv.cvv = "12a".to_string();
        assert_eq!(cvv.validate(), Err(PaymentDetailsError::InvalidCvv));

        let mut month = details();
        month.expiry_month = 13;
        assert!(matches!(
            month.validate(),
            Err(PaymentDetailsError::InvalidExpiry { month: 13, .. })
        ));

        let mut holder = details();
        holder.card_holder_name = "   ".to_string();
        assert_eq!(holder.validate(), Err(PaymentDetailsError::MissingCardHolder));
    }

    #[test]
    fn records_receipt_for_package_price() {
        let pkg = package(1, PackageType::DriversCode8);
        let holdings = StudentHoldings::new(vec![pkg.clone()], Vec::new());

        match record_payment(&pkg, &details(), &holdings, paid_at()).expect("valid details") {
            PaymentDecision::Recorded(receipt) => {
                assert_eq!(receipt.amount, 2000);
                assert_eq!(receipt.package_id, PackageId(1));
                assert!(receipt.receipt_number.is_well_formed());
            }
            other => panic!("expected a receipt, got {other:?}"),
        }
    }

    #[test]
    fn paid_package_is_rejected_regardless_of_card_details() {
        let pkg = package(1, PackageType::Learners);
        let receipt = match record_payment(
            &pkg,
            &details(),
            &StudentHoldings::new(vec![pkg.clone()], Vec::new()),
            paid_at(),
        )
        .expect("valid details")
        {
            PaymentDecision::Recorded(receipt) => receipt.into_receipt(ReceiptId(1)),
            other => panic!("expected a receipt, got {other:?}"),
        };
        let holdings = StudentHoldings::new(vec![pkg.clone()], vec![receipt]);

        let mut garbage = details();
        garbage.card_number = "nope".to_string();
        garbage.cvv = String::new();
        for attempt in [details(), garbage] {
            assert_eq!(
                record_payment(&pkg, &attempt, &holdings, paid_at()),
                Ok(PaymentDecision::Rejected(PaymentRejection::AlreadyPaid))
            );
        }
    }

    #[test]
    fn second_paid_instance_of_same_type_is_a_duplicate() {
        let paid = package(1, PackageType::DriversCode10);
        let unpaid = package(2, PackageType::DriversCode10);
        let receipt = NewReceipt {
            student_id: paid.student_id.clone(),
            package_id: paid.id,
            amount: paid.price,
            card_holder_name: "Thandi Mokoena".to_string(),
            last4_digits: "1234".to_string(),
            card_expiry: NaiveDate::from_ymd_opt(2028, 9, 1).expect("valid date"),
            paid_at: paid_at(),
            receipt_number: ReceiptNumber::generate(),
        }
        .into_receipt(ReceiptId(7));
        let holdings = StudentHoldings::new(vec![paid, unpaid.clone()], vec![receipt]);

        assert_eq!(
            record_payment(&unpaid, &details(), &holdings, paid_at()),
            Ok(PaymentDecision::Rejected(
                PaymentRejection::DuplicateActivePackage
            ))
        );
    }
}
