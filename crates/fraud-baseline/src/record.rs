//! Transaction records and the flagged output derived from them.
//!
//! `TransactionRecord` is immutable once ingested. `RawTransaction` is the
//! unvalidated shape a source reads off the wire; `validate` turns it into a
//! record or a `MalformedRecord` at the ingestion boundary, so nothing past
//! that point has to handle missing fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MalformedRecord;

/// One transaction. The grouping key is `user_id` and the scored value is
/// `amount`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub user_id: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(
        transaction_id: impl Into<String>,
        user_id: impl Into<String>,
        amount: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            user_id: user_id.into(),
            amount,
            timestamp,
        }
    }

    /// Grouping key for baselines.
    pub fn key(&self) -> &str {
        &self.user_id
    }

    /// Value tested against the key's baseline.
    pub fn value(&self) -> f64 {
        self.amount
    }
}

/// A row as read from a source, before schema validation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl RawTransaction {
    /// Validate the row. `position` is only used for error reporting.
    pub fn validate(self, position: u64) -> Result<TransactionRecord, MalformedRecord> {
        let transaction_id = required(self.transaction_id, "transaction_id", position)?;
        let user_id = required(self.user_id, "user_id", position)?;

        let raw_amount = required(self.amount, "amount", position)?;
        let amount: f64 = raw_amount.parse().map_err(|_| {
            MalformedRecord::new(position, format!("amount is not a number: {:?}", raw_amount))
        })?;
        if !amount.is_finite() {
            return Err(MalformedRecord::new(
                position,
                format!("amount is not finite: {}", raw_amount),
            ));
        }

        let raw_ts = required(self.timestamp, "timestamp", position)?;
        let timestamp = parse_timestamp(&raw_ts).ok_or_else(|| {
            MalformedRecord::new(position, format!("unparseable timestamp: {:?}", raw_ts))
        })?;

        Ok(TransactionRecord {
            transaction_id,
            user_id,
            amount,
            timestamp,
        })
    }
}

fn required(
    field: Option<String>,
    name: &str,
    position: u64,
) -> Result<String, MalformedRecord> {
    match field.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(MalformedRecord::new(position, format!("missing {}", name))),
    }
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` / `YYYY-MM-DDTHH:MM:SS[.fff]`
/// (taken as UTC), or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// A record together with the baseline it was judged against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlaggedRecord {
    #[serde(flatten)]
    pub record: TransactionRecord,
    /// Mean of the baseline the record was tested against.
    pub key_mean: f64,
    /// Standard deviation of that baseline.
    pub key_stddev: f64,
    /// Number of observations in that baseline.
    pub key_count: u64,
    /// `key_mean + k * key_stddev`.
    pub threshold: f64,
    pub is_fraud: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(id: &str, user: &str, amount: &str, ts: &str) -> RawTransaction {
        RawTransaction {
            transaction_id: Some(id.into()),
            user_id: Some(user.into()),
            amount: Some(amount.into()),
            timestamp: Some(ts.into()),
        }
    }

    #[test]
    fn validate_well_formed_row() {
        let rec = raw("t1", "U1", "12.50", "2024-03-01 10:15:00")
            .validate(1)
            .unwrap();
        assert_eq!(rec.transaction_id, "t1");
        assert_eq!(rec.key(), "U1");
        assert!((rec.value() - 12.5).abs() < f64::EPSILON);
        assert_eq!(
            rec.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap()
        );
    }

    #[test]
    fn validate_trims_fields() {
        let rec = raw(" t1 ", " U1 ", " 3 ", "2024-03-01").validate(1).unwrap();
        assert_eq!(rec.transaction_id, "t1");
        assert_eq!(rec.user_id, "U1");
    }

    #[test]
    fn missing_key_is_malformed() {
        let mut r = raw("t1", "", "1.0", "2024-03-01");
        let err = r.clone().validate(4).unwrap_err();
        assert_eq!(err.position, 4);
        assert!(err.reason.contains("user_id"));

        r.user_id = None;
        assert!(r.validate(4).unwrap_err().reason.contains("user_id"));
    }

    #[test]
    fn unparseable_amount_is_malformed() {
        let err = raw("t1", "U1", "twelve", "2024-03-01")
            .validate(2)
            .unwrap_err();
        assert!(err.reason.contains("twelve"));
    }

    #[test]
    fn non_finite_amount_is_malformed() {
        let err = raw("t1", "U1", "NaN", "2024-03-01").validate(2).unwrap_err();
        assert!(err.reason.contains("not finite"));
        assert!(raw("t1", "U1", "inf", "2024-03-01").validate(2).is_err());
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let err = raw("t1", "U1", "1", "yesterday").validate(9).unwrap_err();
        assert!(err.reason.contains("timestamp"));
    }

    #[test]
    fn timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_timestamp("2024-01-02T03:04:05Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T05:04:05+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 03:04:05"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T03:04:05"), Some(expected));
        assert!(parse_timestamp("2024-01-02 03:04:05.250").is_some());
        assert_eq!(
            parse_timestamp("2024-01-02"),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("02/01/2024"), None);
    }

    #[test]
    fn flagged_record_json_is_flat() {
        let rec = TransactionRecord::new(
            "t9",
            "U2",
            900.0,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        );
        let flagged = FlaggedRecord {
            record: rec,
            key_mean: 100.0,
            key_stddev: 10.0,
            key_count: 20,
            threshold: 130.0,
            is_fraud: true,
        };
        let json = serde_json::to_value(&flagged).unwrap();
        assert_eq!(json["transaction_id"], "t9");
        assert_eq!(json["user_id"], "U2");
        assert_eq!(json["is_fraud"], true);
    }
}
