//! # Document Numbering
//!
//! Pure rules for the human-readable document numbers printed on quotations.
//!
//! ## Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   COT - 202503 - 0001                                                   │
//! │    │      │       │                                                     │
//! │    │      │       └── sequence within (tenant, prefix, period)          │
//! │    │      │           zero-padded to 4, grows un-padded past 9999       │
//! │    │      └────────── period: UTC year + month of the reference instant │
//! │    └───────────────── prefix of the document kind                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Allocation itself (the atomic counter) lives in tienda-db. This module only
//! knows how periods are derived and how numbers are written and read back.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Document Kind
// =============================================================================

/// Kinds of numbered documents. Each kind has its own sequence per tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Cotización.
    Quotation,
}

impl DocumentKind {
    /// Prefix written at the start of the document number.
    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "COT",
        }
    }

    /// Looks a kind up by its prefix.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "COT" => Some(DocumentKind::Quotation),
            _ => None,
        }
    }
}

// =============================================================================
// Period
// =============================================================================

/// Calendar month that scopes a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Builds a period, rejecting months outside 1..=12 and years that don't
    /// fit the four-digit key.
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::OutOfRange {
                field: "month".to_string(),
                min: 1,
                max: 12,
            });
        }
        if !(1000..=9999).contains(&year) {
            return Err(ValidationError::OutOfRange {
                field: "year".to_string(),
                min: 1000,
                max: 9999,
            });
        }
        Ok(Period { year, month })
    }

    /// Period containing `at`, evaluated in UTC. Instants outside years
    /// 1000..=9999 have no four-digit key and are rejected.
    pub fn containing(at: DateTime<Utc>) -> Result<Self, ValidationError> {
        Period::new(at.year(), at.month())
    }

    pub const fn year(&self) -> i32 {
        self.year
    }

    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Storage key, `YYYYMM`.
    pub fn key(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "period".to_string(),
                reason: "expected YYYYMM".to_string(),
            });
        }
        let year = s[..4].parse().map_err(|_| ValidationError::InvalidFormat {
            field: "period".to_string(),
            reason: "bad year".to_string(),
        })?;
        let month = s[4..].parse().map_err(|_| ValidationError::InvalidFormat {
            field: "period".to_string(),
            reason: "bad month".to_string(),
        })?;
        Period::new(year, month)
    }
}

// =============================================================================
// Document Number
// =============================================================================

/// A formatted document number, e.g. `COT-202503-0001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentNumber {
    kind: DocumentKind,
    period: Period,
    sequence: u64,
}

impl DocumentNumber {
    /// Builds a number. Sequences start at 1.
    pub fn new(kind: DocumentKind, period: Period, sequence: u64) -> Result<Self, ValidationError> {
        if sequence == 0 {
            return Err(ValidationError::MustBePositive {
                field: "sequence".to_string(),
            });
        }
        Ok(DocumentNumber {
            kind,
            period,
            sequence,
        })
    }

    pub const fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub const fn period(&self) -> Period {
        self.period
    }

    pub const fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{:04}", self.kind.prefix(), self.period, self.sequence)
    }
}

impl FromStr for DocumentNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "document_number".to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.splitn(3, '-');
        let (prefix, period, sequence) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(d), Some(n)) => (p, d, n),
            _ => return Err(invalid("expected PREFIX-YYYYMM-NNNN")),
        };

        let kind = DocumentKind::from_prefix(prefix).ok_or_else(|| invalid("unknown prefix"))?;
        let period: Period = period.parse()?;
        if sequence.len() < 4 || !sequence.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("sequence must be at least four digits"));
        }
        let sequence: u64 = sequence.parse().map_err(|_| invalid("sequence too large"))?;

        DocumentNumber::new(kind, period, sequence)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn march_2025() -> Period {
        Period::new(2025, 3).unwrap()
    }

    #[test]
    fn test_period_from_instant_uses_utc() {
        let at = Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap();
        assert_eq!(Period::containing(at).unwrap(), march_2025());
        assert_eq!(Period::containing(at).unwrap().key(), "202503");

        let next = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(Period::containing(next).unwrap().key(), "202504");
    }

    #[test]
    fn test_period_from_instant_outside_four_digit_years() {
        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            Period::containing(far),
            Err(ValidationError::OutOfRange { .. })
        ));

        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        let period = Period::containing(last).unwrap();
        assert_eq!(period.key().parse::<Period>().unwrap(), period);
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(2025, 0).is_err());
        assert!(Period::new(2025, 13).is_err());
        assert!(Period::new(999, 1).is_err());
        assert_eq!("202512".parse::<Period>().unwrap(), Period::new(2025, 12).unwrap());
        assert!("2025-1".parse::<Period>().is_err());
    }

    #[test]
    fn test_format_pads_to_four_digits() {
        let n = DocumentNumber::new(DocumentKind::Quotation, march_2025(), 1).unwrap();
        assert_eq!(n.to_string(), "COT-202503-0001");

        let n = DocumentNumber::new(DocumentKind::Quotation, march_2025(), 9999).unwrap();
        assert_eq!(n.to_string(), "COT-202503-9999");
    }

    #[test]
    fn test_format_rolls_over_unpadded() {
        let n = DocumentNumber::new(DocumentKind::Quotation, march_2025(), 10000).unwrap();
        assert_eq!(n.to_string(), "COT-202503-10000");
    }

    #[test]
    fn test_numbers_sort_in_issue_order_within_period() {
        let numbers: Vec<String> = (1..=120)
            .map(|seq| {
                DocumentNumber::new(DocumentKind::Quotation, march_2025(), seq)
                    .unwrap()
                    .to_string()
            })
            .collect();
        let mut sorted = numbers.clone();
        sorted.sort();
        assert_eq!(numbers, sorted);
    }

    #[test]
    fn test_parse_back() {
        let n: DocumentNumber = "COT-202503-0042".parse().unwrap();
        assert_eq!(n.kind(), DocumentKind::Quotation);
        assert_eq!(n.period(), march_2025());
        assert_eq!(n.sequence(), 42);

        let big: DocumentNumber = "COT-202503-12345".parse().unwrap();
        assert_eq!(big.sequence(), 12345);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("COT-202503".parse::<DocumentNumber>().is_err());
        assert!("XXX-202503-0001".parse::<DocumentNumber>().is_err());
        assert!("COT-202513-0001".parse::<DocumentNumber>().is_err());
        assert!("COT-202503-01".parse::<DocumentNumber>().is_err());
        assert!("COT-202503-0000".parse::<DocumentNumber>().is_err());
    }

    #[test]
    fn test_zero_sequence_rejected() {
        assert!(DocumentNumber::new(DocumentKind::Quotation, march_2025(), 0).is_err());
    }
}
