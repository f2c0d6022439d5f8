//! Email-to-SMS gateway routing for South-African mobile numbers.

use serde::Serialize;

pub const SMS_MAX_CHARS: usize = 160;
const TRUNCATED_CHARS: usize = SMS_MAX_CHARS - 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Carrier {
    Vodacom,
    Mtn,
    CellC,
    Telkom,
}

/// Each prefix belongs to exactly one network.
const PREFIXES: [(&str, Carrier); 10] = [
    ("072", Carrier::Vodacom),
    ("076", Carrier::Vodacom),
    ("079", Carrier::Vodacom),
    ("082", Carrier::Vodacom),
    ("073", Carrier::Mtn),
    ("078", Carrier::Mtn),
    ("083", Carrier::Mtn),
    ("074", Carrier::CellC),
    ("084", Carrier::CellC),
    ("081", Carrier::Telkom),
];

impl Carrier {
    pub const fn label(self) -> &'static str {
        match self {
            Carrier::Vodacom => "vodacom",
            Carrier::Mtn => "mtn",
            Carrier::CellC => "cellc",
            Carrier::Telkom => "telkom",
        }
    }

    pub const fn gateway_domain(self) -> &'static str {
        match self {
            Carrier::Vodacom => "voda.co.za",
            Carrier::Mtn => "sms.mtnnigeria.net",
            Carrier::CellC => "cellc.net",
            Carrier::Telkom => "tm4.co.za",
        }
    }

    pub fn detect(normalized: &str) -> Option<Self> {
        let prefix = normalized.get(..3)?;
        PREFIXES
            .iter()
            .find(|(candidate, _)| *candidate == prefix)
            .map(|(_, carrier)| *carrier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SmsError {
    #[error("{0} is not a South-African mobile number")]
    InvalidNumber(String),
    #[error("no SMS gateway is known for {0}")]
    UnknownCarrier(String),
}

/// Strip everything but digits and rewrite the `27` country code as a leading `0`.
pub fn normalize_number(raw: &str) -> Result<String, SmsError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let local = match digits.strip_prefix("27") {
        Some(rest) => format!("0{rest}"),
        None => digits,
    };

    if local.len() != 10 || !local.starts_with('0') {
        return Err(SmsError::InvalidNumber(raw.to_string()));
    }
    Ok(local)
}

pub fn truncate_body(body: &str) -> String {
    if body.chars().count() <= SMS_MAX_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(TRUNCATED_CHARS).collect();
    cut.push_str("...");
    cut
}

/// An SMS addressed to the carrier's email gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsMessage {
    pub number: String,
    pub carrier: Carrier,
    pub gateway_address: String,
    pub body: String,
}

impl SmsMessage {
    pub fn for_number(raw: &str, body: &str) -> Result<Self, SmsError> {
        let number = normalize_number(raw)?;
        let carrier =
            Carrier::detect(&number).ok_or_else(|| SmsError::UnknownCarrier(number.clone()))?;

        Ok(Self {
            gateway_address: format!("{number}@{}", carrier.gateway_domain()),
            number,
            carrier,
            body: truncate_body(body),
        })
    }
}
