//! Data models for the dashboard.
//!
//! Records are decoded leniently from whatever other screens wrote to the
//! store: string fields accept only JSON strings and anything else reads as
//! absent, so a single odd field never discards the whole record.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Role tag stored for super admins.
pub const SUPER_ADMIN_ROLE: &str = "SUPER_ADMIN";

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// JavaScript truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The `currentAdmin` record as written by the login screen.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAdmin {
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub institution_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
}

/// Profile fields shared by both roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// The signed-in admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Identity {
    SuperAdmin(AdminProfile),
    InstitutionAdmin {
        #[serde(flatten)]
        profile: AdminProfile,
        #[serde(rename = "institutionId", skip_serializing_if = "Option::is_none")]
        institution_id: Option<String>,
    },
}

impl Identity {
    /// Resolve an identity from the stored record. Empty strings count as
    /// absent.
    pub fn from_stored(stored: StoredAdmin) -> Self {
        let profile = AdminProfile {
            user_id: stored.user_id.filter(|s| !s.is_empty()),
            name: stored.name.filter(|s| !s.is_empty()),
            email: stored.email.filter(|s| !s.is_empty()),
        };

        if stored.role.as_deref() == Some(SUPER_ADMIN_ROLE) {
            Identity::SuperAdmin(profile)
        } else {
            Identity::InstitutionAdmin {
                profile,
                institution_id: stored.institution_id.filter(|s| !s.is_empty()),
            }
        }
    }

    pub fn profile(&self) -> &AdminProfile {
        match self {
            Identity::SuperAdmin(profile) => profile,
            Identity::InstitutionAdmin { profile, .. } => profile,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Identity::SuperAdmin(_))
    }

    pub fn user_id(&self) -> Option<&str> {
        self.profile().user_id.as_deref()
    }

    /// Name to greet the admin with: name, then user id, then `fallback`.
    pub fn display_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        let profile = self.profile();
        profile
            .name
            .as_deref()
            .or(profile.user_id.as_deref())
            .unwrap_or(fallback)
    }

    /// Contact line shown under the name: email, then user id.
    pub fn contact(&self) -> Option<&str> {
        let profile = self.profile();
        profile.email.as_deref().or(profile.user_id.as_deref())
    }

    pub fn role_label(&self) -> &'static str {
        match self {
            Identity::SuperAdmin(_) => "Super Admin",
            Identity::InstitutionAdmin { .. } => "Admin",
        }
    }
}

/// An entry of the `admins` collection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub approved: Option<Value>,
}

impl Admin {
    pub fn is_approved(&self) -> bool {
        self.approved.as_ref().is_some_and(is_truthy)
    }
}

/// An entry of the `certificates` collection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    #[serde(default, deserialize_with = "lenient_string")]
    pub issuer_id: Option<String>,
    #[serde(default)]
    pub issued_at: Option<Value>,
}

impl Certificate {
    pub fn issued_at(&self, offset: &FixedOffset) -> Option<DateTime<FixedOffset>> {
        self.issued_at
            .as_ref()
            .and_then(|v| parse_timestamp(v, offset))
    }
}

/// An issue or revoke request awaiting a decision.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub institution_id: Option<String>,
}

impl CertificateRequest {
    pub fn is_pending(&self) -> bool {
        self.status.as_deref() == Some("pending")
    }
}

/// A request that has already been approved or rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub action: Option<String>,
}

impl ProcessedRequest {
    /// When the request was decided, falling back to when it was made.
    pub fn decided_at(&self, offset: &FixedOffset) -> Option<DateTime<FixedOffset>> {
        self.processed_at
            .as_ref()
            .and_then(|v| parse_timestamp(v, offset))
            .or_else(|| {
                self.requested_at
                    .as_ref()
                    .and_then(|v| parse_timestamp(v, offset))
            })
    }
}

/// Kind of request shown in the processed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Issue,
    Revoke,
    Reissue,
}

impl RequestKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "issue" => Some(RequestKind::Issue),
            "revoke" => Some(RequestKind::Revoke),
            "reissue" => Some(RequestKind::Reissue),
            _ => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Issue => write!(f, "Issue"),
            RequestKind::Revoke => write!(f, "Revoke"),
            RequestKind::Reissue => write!(f, "Reissue"),
        }
    }
}

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parse a stored timestamp into the given offset.
///
/// Numbers are epoch milliseconds. Strings may be RFC 3339, a date-time
/// without zone (read in `offset`), or a bare date (read as UTC midnight).
pub fn parse_timestamp(value: &Value, offset: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis).map(|dt| dt.with_timezone(offset))
        }
        Value::String(s) => parse_timestamp_str(s.trim(), offset),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str, offset: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(offset));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return offset.from_local_datetime(&naive).single();
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().with_timezone(offset))
}

/// Counters shown on the dashboard.
///
/// Super admins see the system-wide counters; institution admins see
/// `my_certificates`, `pending_requests` and the issuance counters scoped
/// to their own certificates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_institutions: usize,
    pub total_admins: usize,
    pub pending_admins: usize,
    pub total_certificates: usize,
    pub today_issued: usize,
    pub monthly_issued: usize,
    pub my_certificates: usize,
    pub pending_requests: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn stored(value: Value) -> StoredAdmin {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_identity_role_branch() {
        let super_admin = Identity::from_stored(stored(json!({
            "userId": "root", "role": "SUPER_ADMIN", "institutionId": "ignored"
        })));
        assert!(super_admin.is_super_admin());

        let admin = Identity::from_stored(stored(json!({
            "userId": "kim", "role": "ADMIN", "institutionId": "inst-1"
        })));
        assert_eq!(
            admin,
            Identity::InstitutionAdmin {
                profile: AdminProfile {
                    user_id: Some("kim".to_string()),
                    name: None,
                    email: None,
                },
                institution_id: Some("inst-1".to_string()),
            }
        );

        let no_role = Identity::from_stored(stored(json!({"name": "Lee"})));
        assert!(!no_role.is_super_admin());
    }

    #[test]
    fn test_identity_without_name_or_user_id() {
        let odd = Identity::from_stored(stored(json!({"userId": 7, "name": ""})));
        assert_eq!(odd.user_id(), None);
        assert_eq!(odd.display_name("Admin"), "Admin");
        assert_eq!(odd.contact(), None);
    }

    #[test]
    fn test_display_name_and_contact_fallbacks() {
        let named = Identity::from_stored(stored(json!({
            "userId": "kim", "name": "Kim", "email": "kim@example.com"
        })));
        assert_eq!(named.display_name("Admin"), "Kim");
        assert_eq!(named.contact(), Some("kim@example.com"));

        let bare = Identity::from_stored(stored(json!({"userId": "kim"})));
        assert_eq!(bare.display_name("Admin"), "kim");
        assert_eq!(bare.contact(), Some("kim"));

        let anonymous = Identity::from_stored(stored(json!({"name": "Park"})));
        assert_eq!(anonymous.display_name("Admin"), "Park");
        assert_eq!(anonymous.contact(), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!("false")));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!([])));
    }

    #[test]
    fn test_admin_approval() {
        let pending: Admin = serde_json::from_value(json!({"userId": "a"})).unwrap();
        let approved: Admin =
            serde_json::from_value(json!({"userId": "b", "approved": true})).unwrap();
        assert!(!pending.is_approved());
        assert!(approved.is_approved());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let offset = kst();

        let rfc = parse_timestamp(&json!("2024-03-01T15:30:00Z"), &offset).unwrap();
        assert_eq!((rfc.day(), rfc.hour()), (2, 0));

        let millis = parse_timestamp(&json!(0), &offset).unwrap();
        assert_eq!((millis.year(), millis.hour()), (1970, 9));

        let naive = parse_timestamp(&json!("2024-03-01T23:30:00"), &offset).unwrap();
        assert_eq!((naive.day(), naive.hour()), (1, 23));

        let date_only = parse_timestamp(&json!("2024-03-01"), &offset).unwrap();
        assert_eq!((date_only.day(), date_only.hour()), (1, 9));

        assert!(parse_timestamp(&json!("yesterday"), &offset).is_none());
        assert!(parse_timestamp(&json!(true), &offset).is_none());
    }

    #[test]
    fn test_processed_request_falls_back_to_requested_at() {
        let offset = kst();
        let request: ProcessedRequest = serde_json::from_value(json!({
            "id": 3,
            "requestType": "revoke",
            "requestedAt": "2024-05-02T10:00:00+09:00"
        }))
        .unwrap();

        let decided = request.decided_at(&offset).unwrap();
        assert_eq!((decided.month(), decided.day()), (5, 2));
        assert_eq!(
            RequestKind::parse(request.request_type.as_deref().unwrap()),
            Some(RequestKind::Revoke)
        );
    }

    #[test]
    fn test_identity_serializes_role_tag() {
        let admin = Identity::InstitutionAdmin {
            profile: AdminProfile {
                user_id: Some("kim".to_string()),
                ..AdminProfile::default()
            },
            institution_id: Some("inst-1".to_string()),
        };
        let value = serde_json::to_value(&admin).unwrap();
        assert_eq!(value["role"], "INSTITUTION_ADMIN");
        assert_eq!(value["userId"], "kim");
        assert_eq!(value["institutionId"], "inst-1");
    }
}
