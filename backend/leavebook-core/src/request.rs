// src/request.rs
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// --- Identifiers ---

/// Key used by the backing store for updates and deletes (`no` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(RequestId)
    }
}

// Float bounds of i64; the upper one (2^63) is itself out of range.
const I64_MIN_F64: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_F64: f64 = 9_223_372_036_854_775_808.0;

// The sheet may hand ids back as numbers, floats or strings.
impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && (I64_MIN_F64..I64_MAX_F64).contains(f))
                        .map(|f| f as i64)
                })
                .map(RequestId)
                .ok_or_else(|| de::Error::custom(format!("request id out of range: {}", n))),
            serde_json::Value::String(s) => s
                .parse()
                .map_err(|_| de::Error::custom(format!("request id is not numeric: '{}'", s))),
            other => Err(de::Error::custom(format!(
                "request id has unexpected type: {}",
                other
            ))),
        }
    }
}

// --- Status ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// Only `Pending` moves, and only to a decision.
    pub fn can_transition_to(&self, target: RequestStatus) -> bool {
        matches!(
            (self, target),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
        )
    }

    /// Lenient wire decoding: unknown or blank values are `Pending`.
    pub fn from_wire(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(format!("unknown request status '{}'", other)),
        }
    }
}

impl Serialize for RequestStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RequestStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) => RequestStatus::from_wire(&s),
            _ => RequestStatus::Pending,
        })
    }
}

// --- Request record ---

/// One leave/attendance submission as stored in the backing sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "no")]
    pub id: RequestId,
    #[serde(rename = "name", default)]
    pub staff_name: String,
    #[serde(with = "sheet_date")]
    pub date: NaiveDate,
    #[serde(rename = "in", default, deserialize_with = "lenient_text")]
    pub time_in: Option<String>,
    #[serde(rename = "out", default, deserialize_with = "lenient_text")]
    pub time_out: Option<String>,
    #[serde(default, deserialize_with = "lenient_reason")]
    pub reason: String,
    #[serde(default)]
    pub status: RequestStatus,
}

impl Request {
    /// Trimmed, lower-cased name used for duplicate matching.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.staff_name)
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Reduces a stored date value to a calendar date, whatever shape the sheet
/// returned it in.
pub fn parse_sheet_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.date())
}

mod sheet_date {
    use super::parse_sheet_date;
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_sheet_date(&raw)
            .ok_or_else(|| de::Error::custom(format!("unrecognised date value '{}'", raw)))
    }
}

// Sheet cells come back as strings, numbers or null.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_reason<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_sheet_record() {
        let record: Request = serde_json::from_value(json!({
            "no": 1714550400000i64,
            "name": "Noy Vathana",
            "date": "2024-05-01",
            "in": "8:00",
            "out": "17:00",
            "reason": "Clinic",
            "status": "Approved"
        }))
        .unwrap();

        assert_eq!(record.id, RequestId(1714550400000));
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(record.time_in.as_deref(), Some("8:00"));
        assert_eq!(record.status, RequestStatus::Approved);
    }

    #[test]
    fn test_missing_or_odd_status_is_pending() {
        let record: Request = serde_json::from_value(json!({
            "no": "42",
            "name": "Chek Seang",
            "date": "2024-05-02T00:00:00.000"
        }))
        .unwrap();
        assert_eq!(record.id, RequestId(42));
        assert_eq!(record.status, RequestStatus::Pending);
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(record.time_in, None);
        assert_eq!(record.reason, "");

        assert_eq!(RequestStatus::from_wire(""), RequestStatus::Pending);
        assert_eq!(RequestStatus::from_wire("rejected"), RequestStatus::Rejected);
        assert_eq!(RequestStatus::from_wire("maybe"), RequestStatus::Pending);
    }

    #[test]
    fn test_float_ids_must_fit_i64() {
        let whole: RequestId = serde_json::from_value(json!(1714550400000.0)).unwrap();
        assert_eq!(whole, RequestId(1714550400000));

        assert!(serde_json::from_value::<RequestId>(json!(9.3e18)).is_err());
        assert!(serde_json::from_value::<RequestId>(json!(-9.3e18)).is_err());
        assert!(serde_json::from_value::<RequestId>(json!(12.5)).is_err());
    }

    #[test]
    fn test_encodes_wire_field_names() {
        let record = Request {
            id: RequestId(7),
            staff_name: "Som Tihak".into(),
            date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            time_in: Some("8:00".into()),
            time_out: Some("12:00".into()),
            reason: "Family".into(),
            status: RequestStatus::Pending,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "no": 7,
                "name": "Som Tihak",
                "date": "2024-05-03",
                "in": "8:00",
                "out": "12:00",
                "reason": "Family",
                "status": "Pending"
            })
        );
    }

    #[test]
    fn test_status_transitions() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Pending));
        assert!(Approved.is_terminal());
    }

    #[test]
    fn test_name_normalization() {
        assert_eq!(normalize_name("  Noy VATHANA "), "noy vathana");
    }
}
