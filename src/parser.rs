use crate::errors::ParseFailure;
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static REGISTRAR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*Registrar:[ \t]*(\S[^\r\n]*?)[ \t\r]*$").expect("valid registrar pattern")
});

// Checked in order; the registrar-side label wins when both are present
static EXPIRATION_LINES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?m)^[ \t]*Registrar Registration Expiration Date:[ \t]*(\S[^\r\n]*?)[ \t\r]*$")
            .expect("valid expiration pattern"),
        Regex::new(r"(?m)^[ \t]*Registry Expiry Date:[ \t]*(\S[^\r\n]*?)[ \t\r]*$")
            .expect("valid expiry pattern"),
    ]
});

static UPDATED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*Updated Date:[ \t]*(\S[^\r\n]*?)[ \t\r]*$").expect("valid updated pattern")
});

/// Fields extracted from an accepted whois response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationData {
    pub registrar: String,
    pub expiration_raw: String,
    pub expiration: DateTime<Utc>,
    pub updated_raw: Option<String>,
    pub updated: Option<DateTime<Utc>>,
}

/// Result of parsing one whois response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Success(RegistrationData),
    RetryableFailure(ParseFailure),
    TerminalFailure(ParseFailure),
}

/// Validates whois responses against the single supported registrar.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    supported_registrar: String,
    rate_limit_marker: String,
}

impl ResponseParser {
    pub fn new(supported_registrar: impl Into<String>, rate_limit_marker: impl Into<String>) -> Self {
        Self {
            supported_registrar: supported_registrar.into(),
            rate_limit_marker: rate_limit_marker.into().to_lowercase(),
        }
    }

    pub fn supported_registrar(&self) -> &str {
        &self.supported_registrar
    }

    pub fn parse(&self, data: &str) -> QueryOutcome {
        // A throttled reply carries none of the expected fields, so look for it first
        if !self.rate_limit_marker.is_empty() && data.to_lowercase().contains(&self.rate_limit_marker) {
            return QueryOutcome::RetryableFailure(ParseFailure::RateLimited);
        }

        let registrar = match capture(&REGISTRAR_LINE, data) {
            Some(registrar) => registrar,
            None => {
                return QueryOutcome::TerminalFailure(ParseFailure::MalformedResponse(
                    "response not in expected registrar format".to_string(),
                ))
            }
        };

        if registrar != self.supported_registrar {
            return QueryOutcome::TerminalFailure(ParseFailure::UnsupportedRegistrar(registrar));
        }

        let expiration = EXPIRATION_LINES
            .iter()
            .find_map(|pattern| capture(pattern, data))
            .and_then(|raw| parse_date(&raw).map(|date| (raw, date)));

        let (expiration_raw, expiration) = match expiration {
            Some(found) => found,
            None => {
                return QueryOutcome::TerminalFailure(ParseFailure::MalformedResponse(
                    "cannot parse expiration date".to_string(),
                ))
            }
        };

        let updated_raw = capture(&UPDATED_LINE, data);
        let updated = updated_raw.as_deref().and_then(parse_date);

        QueryOutcome::Success(RegistrationData {
            registrar,
            expiration_raw,
            expiration,
            updated_raw,
            updated,
        })
    }
}

fn capture(pattern: &Regex, data: &str) -> Option<String> {
    pattern
        .captures(data)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse various date formats commonly found in whois data
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let date_str = date_str.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Some(dt.with_timezone(&Utc));
    }

    let zoned_formats = [
        "%Y-%m-%dT%H:%M:%S%z",             // 2025-05-18T13:36:06+0000
        "%Y-%m-%dT%H:%M:%S%.f%z",          // 2025-05-18T13:36:06.0+0000
        "%Y-%m-%d %H:%M:%S%z",             // 2025-05-18 13:36:06+0000
    ];

    for format in &zoned_formats {
        if let Ok(dt) = DateTime::parse_from_str(date_str, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive_formats = [
        "%Y-%m-%dT%H:%M:%S%.fZ",           // 2025-05-18T13:36:06.0Z
        "%Y-%m-%dT%H:%M:%SZ",              // 2025-05-18T13:36:06Z
        "%Y-%m-%dT%H:%M:%S",               // 2025-05-18T13:36:06
        "%Y-%m-%d %H:%M:%S",               // 2025-05-18 13:36:06
    ];

    for format in &naive_formats {
        if let Ok(naive_dt) = NaiveDateTime::parse_from_str(date_str, format) {
            return Some(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
        }
    }

    let date_only_formats = [
        "%Y-%m-%d",
        "%d-%b-%Y",
        "%d %b %Y",
        "%Y/%m/%d",
        "%d.%m.%Y",
    ];

    for format in &date_only_formats {
        if let Ok(naive_date) = chrono::NaiveDate::parse_from_str(date_str, format) {
            if let Some(naive_dt) = naive_date.and_hms_opt(0, 0, 0) {
                return Some(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
            }
        }
    }

    debug!("Failed to parse date: {}", date_str);
    None
}
