//! Production Security Filter
//!
//! Redacts sensitive data from schemas and result rows, but only for the environment
//! designated as production. For every other environment the filter is inert and every
//! operation is the identity transform.
//!
//! # Classification
//! Field names are matched against an ordered, immutable list of [`SensitivePattern`]s,
//! compiled once on first use. Names are normalized first (camelCase split on `_`,
//! lowercased). Matching is then structural: a pattern term must appear as a whole
//! `_`-delimited segment (or a known compound, with or without separators) of the
//! name, so `home_phone`, `userEmail` and `phonenumber` match while `shipping_method`
//! does not match `pin`.
//!
//! # Masking
//! - email-shaped fields keep two characters of the local part: `jo***@***.***`
//! - phone-shaped fields keep the last four digits: `XXX-***-6789`
//! - everything else becomes the fixed token `********`
//!
//! Generic masking ignores the original value entirely, so neither length nor format
//! leaks. `null` is never replaced.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

use crate::engine::{ColumnInfo, Row};
use crate::statement::identifier_tokens;

/// Replacement type for sensitive columns in schema output
pub const SENSITIVE_TYPE_SENTINEL: &str = "[SENSITIVE]";

/// Fixed token replacing generic sensitive values
pub const MASK_TOKEN: &str = "********";

/// Replacement for phone values with too few digits to keep a suffix
pub const PHONE_MASK: &str = "XXX-***-****";

/// Replacement for the masked part of an email address
const EMAIL_MASK: &str = "***";

/// Advisory attached to results produced while redaction is active
pub const SENSITIVE_DATA_NOTICE: &str =
    "This statement touches fields classified as sensitive; their values are masked in production.";

/// Category of sensitive data a pattern detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitiveCategory {
    /// Personally identifiable information
    Pii,
    /// Payment and banking data
    Financial,
    /// Credentials and secrets
    Authentication,
}

/// One entry of the sensitive field catalog
#[derive(Debug)]
pub struct SensitivePattern {
    /// What kind of data the pattern detects
    pub category: SensitiveCategory,
    matcher: Regex,
}

impl SensitivePattern {
    fn new(category: SensitiveCategory, terms: &str) -> Self {
        // Terms must form whole segments of a snake_case / dotted name
        let pattern = format!(r"(?i)(?:^|[_.\s])(?:{terms})(?:$|[_.\s])");
        Self {
            category,
            matcher: Regex::new(&pattern).expect("sensitive pattern must compile"),
        }
    }

    /// Whether the field name matches this pattern
    #[must_use]
    pub fn matches(&self, field: &str) -> bool {
        self.matcher.is_match(field)
    }
}

/// The sensitive field catalog, in evaluation order
///
/// Terms are written against normalized names (see [`normalize_field_name`]); `_?`
/// lets compounds match both segmented and run-together (`phone_number`, `phonenumber`).
static SENSITIVE_PATTERNS: LazyLock<Vec<SensitivePattern>> = LazyLock::new(|| {
    use SensitiveCategory::{Authentication, Financial, Pii};
    vec![
        SensitivePattern::new(
            Pii,
            "ssn|social_?security(?:_?n(?:umber|o))?|sin|national_?id|passport(?:_?n(?:umber|o))?|\
             driver_?licen[cs]e(?:_?n(?:umber|o))?|tax_?id|tin",
        ),
        SensitivePattern::new(Pii, "e_?mail(?:_?addr(?:ess)?)?|mail"),
        SensitivePattern::new(
            Pii,
            "(?:home_?|work_?|mobile_?|cell_?)?phone(?:_?n(?:umber|o))?|mobile(?:_?n(?:umber|o))?|\
             cell(?:_?phone)?|telephone|fax",
        ),
        SensitivePattern::new(
            Pii,
            "birth_?date|date_?of_?birth|dob|birthday|\
             (?:home_?|street_?|billing_?|shipping_?|postal_?|mailing_?|ip_?)?address|street|\
             post_?code|postal_?code|zip(?:_?code)?|real_?name|full_?name|id_?card",
        ),
        SensitivePattern::new(
            Financial,
            "credit_?card(?:_?n(?:umber|o))?|card_?n(?:umber|o)|cvv2?|cvc|iban|swift(?:_?code)?|bic|\
             account_?n(?:umber|o)|routing(?:_?n(?:umber|o))?|bank_?account(?:_?n(?:umber|o))?|\
             salary|income",
        ),
        SensitivePattern::new(
            Authentication,
            "password(?:_?hash)?|passwd|pwd|pass_?hash|secret(?:_?key)?|client_?secret|\
             (?:access_?|refresh_?|auth_?|api_?|session_?|reset_?)?token|api_?key|private_?key|\
             salt|otp|pin(?:_?code)?|session_?id|auth_?code|security_?answer",
        ),
    ]
});

/// Lowercase a field name, splitting camelCase words with `_`
///
/// `userEmail` becomes `user_email`, `APIKey` becomes `api_key`, `SSN` stays `ssn`.
#[must_use]
pub fn normalize_field_name(field: &str) -> String {
    let chars: Vec<char> = field.chars().collect();
    let mut normalized = String::with_capacity(field.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                normalized.push('_');
            }
        }
        normalized.extend(ch.to_lowercase());
    }

    normalized
}

/// The ordered sensitive field catalog
#[must_use]
pub fn sensitive_patterns() -> &'static [SensitivePattern] {
    &SENSITIVE_PATTERNS
}

/// Classify a field name against the catalog, regardless of environment
#[must_use]
pub fn classify_field(field: &str) -> Option<SensitiveCategory> {
    let normalized = normalize_field_name(field);
    SENSITIVE_PATTERNS.iter().find(|p| p.matches(&normalized)).map(|p| p.category)
}

/// Redaction filter bound to one environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityFilter {
    environment: String,
    active: bool,
}

impl SecurityFilter {
    /// Build the filter for `environment`; it is active only when that environment is
    /// the designated production environment
    pub fn new(environment: impl Into<String>, production_label: &str) -> Self {
        let environment = environment.into();
        let active = environment == production_label;
        Self { environment, active }
    }

    /// Environment this filter was built for
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Whether redaction is applied
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Human-readable redaction status
    #[must_use]
    pub fn status(&self) -> String {
        if self.active {
            format!(
                "Production data protection ACTIVE for '{}': sensitive fields are masked in results and schemas",
                self.environment
            )
        } else {
            format!("Data protection inactive for '{}': results are returned unmasked", self.environment)
        }
    }

    /// Whether `field` holds sensitive data (always false when inert)
    #[must_use]
    pub fn is_sensitive(&self, field: &str) -> bool {
        self.active && classify_field(field).is_some()
    }

    /// Replace the type of sensitive columns with a sentinel and mark them
    #[must_use]
    pub fn filter_schema(&self, columns: Vec<ColumnInfo>) -> Vec<ColumnInfo> {
        if !self.active {
            return columns;
        }

        columns
            .into_iter()
            .map(|mut column| {
                if self.is_sensitive(&column.name) {
                    column.data_type = SENSITIVE_TYPE_SENTINEL.to_string();
                    column.sensitive = true;
                }
                column
            })
            .collect()
    }

    /// Mask sensitive values in every row
    #[must_use]
    pub fn filter_rows(&self, rows: Vec<Row>) -> Vec<Row> {
        if !self.active {
            return rows;
        }

        rows.into_iter().map(|row| self.filter_row(row)).collect()
    }

    fn filter_row(&self, row: Row) -> Row {
        row.into_iter()
            .map(|(field, value)| {
                if self.is_sensitive(&field) {
                    let masked = mask_value(&field, &value);
                    (field, masked)
                } else {
                    (field, value)
                }
            })
            .collect()
    }

    /// Names of the given fields that would be masked
    #[must_use]
    pub fn sensitive_fields<'a>(&self, fields: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        fields.into_iter().filter(|f| self.is_sensitive(f)).cloned().collect()
    }

    /// Whether the statement text mentions a sensitive field name
    ///
    /// Advisory only: never used to block execution.
    #[must_use]
    pub fn would_touch_sensitive_data(&self, sql: &str) -> bool {
        self.active && identifier_tokens(sql).any(|token| classify_field(token).is_some())
    }
}

fn is_email_field(field: &str) -> bool {
    let lower = field.to_ascii_lowercase();
    lower.contains("email") || lower.contains("e_mail")
}

fn is_phone_field(field: &str) -> bool {
    let lower = field.to_ascii_lowercase();
    ["phone", "mobile", "cell", "fax"].iter().any(|term| lower.contains(term))
}

/// Mask a sensitive value according to the shape of its field name
#[must_use]
pub fn mask_value(field: &str, value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) if is_email_field(field) => Value::String(mask_email(s)),
        Value::String(_) | Value::Number(_) if is_phone_field(field) => {
            Value::String(mask_phone(&value_text(value)))
        }
        _ => Value::String(MASK_TOKEN.to_string()),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `john.doe@example.com` becomes `jo***@***.***`
fn mask_email(value: &str) -> String {
    match value.split_once('@') {
        Some((local, _domain)) => {
            let prefix: String = local.chars().take(2).collect();
            format!("{prefix}{EMAIL_MASK}@{EMAIL_MASK}.{EMAIL_MASK}")
        }
        None => MASK_TOKEN.to_string(),
    }
}

/// `+1 (555) 123-6789` becomes `XXX-***-6789`
fn mask_phone(value: &str) -> String {
    let digits: Vec<char> = value.chars().filter(char::is_ascii_digit).collect();
    if digits.len() >= 10 {
        let last_four: String = digits[digits.len() - 4..].iter().collect();
        format!("XXX-***-{last_four}")
    } else {
        PHONE_MASK.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn production() -> SecurityFilter {
        SecurityFilter::new("production", "production")
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_active_only_for_production_label() {
        assert!(production().is_active());
        assert!(!SecurityFilter::new("staging", "production").is_active());
        assert!(!SecurityFilter::new("local", "production").is_active());
        assert!(SecurityFilter::new("prod-eu", "prod-eu").is_active());
    }

    #[test]
    fn test_sensitive_field_names() {
        let filter = production();
        for field in [
            "ssn",
            "SSN",
            "email",
            "user_email",
            "home_phone",
            "phone_number",
            "password",
            "password_hash",
            "api_key",
            "credit_card_number",
            "iban",
            "date_of_birth",
            "users.email",
            "userEmail",
            "phoneNumber",
            "passwordHash",
            "creditCardNumber",
            "emailaddress",
            "phonenumber",
            "passwordhash",
            "apiToken",
            "APIKey",
            "dateOfBirth",
            "homePhone",
            "customer_ssn",
        ] {
            assert!(filter.is_sensitive(field), "{field} should be sensitive");
        }
    }

    #[test]
    fn test_non_sensitive_field_names() {
        let filter = production();
        for field in [
            "id",
            "name",
            "created_at",
            "shipping_method",
            "status",
            "tokenizer",
            "spin",
            "isPinned",
            "createdAt",
            "orderTotal",
        ] {
            assert!(!filter.is_sensitive(field), "{field} should not be sensitive");
        }
    }

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(normalize_field_name("userEmail"), "user_email");
        assert_eq!(normalize_field_name("APIKey"), "api_key");
        assert_eq!(normalize_field_name("SSN"), "ssn");
        assert_eq!(normalize_field_name("address2Line"), "address2_line");
        assert_eq!(normalize_field_name("home_phone"), "home_phone");
    }

    #[test]
    fn test_inert_filter_classifies_nothing() {
        let filter = SecurityFilter::new("local", "production");
        assert!(!filter.is_sensitive("ssn"));
        assert!(!filter.would_touch_sensitive_data("SELECT ssn FROM users"));
    }

    #[test]
    fn test_pattern_categories() {
        assert_eq!(classify_field("ssn"), Some(SensitiveCategory::Pii));
        assert_eq!(classify_field("iban"), Some(SensitiveCategory::Financial));
        assert_eq!(classify_field("refresh_token"), Some(SensitiveCategory::Authentication));
        assert_eq!(classify_field("title"), None);
        assert!(!sensitive_patterns().is_empty());
    }

    #[test]
    fn test_generic_mask_is_fixed_and_deterministic() {
        let a = mask_value("ssn", &json!("123-45-6789"));
        let b = mask_value("ssn", &json!("123-45-6789"));
        let c = mask_value("ssn", &json!("9"));
        let d = mask_value("salary", &json!(125_000));
        assert_eq!(a, json!(MASK_TOKEN));
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a, d);
    }

    #[test]
    fn test_email_mask() {
        assert_eq!(mask_value("email", &json!("john.doe@example.com")), json!("jo***@***.***"));
        assert_eq!(mask_value("email", &json!("a@b.io")), json!("a***@***.***"));
        assert_eq!(mask_value("email", &json!("not-an-email")), json!(MASK_TOKEN));
    }

    #[test]
    fn test_phone_mask() {
        assert_eq!(mask_value("home_phone", &json!("+1 (555) 123-6789")), json!("XXX-***-6789"));
        assert_eq!(mask_value("mobile", &json!(5551236789_u64)), json!("XXX-***-6789"));
        assert_eq!(mask_value("phone", &json!("123-4567")), json!(PHONE_MASK));
    }

    #[test]
    fn test_null_passes_through() {
        assert_eq!(mask_value("ssn", &Value::Null), Value::Null);
        assert_eq!(mask_value("email", &Value::Null), Value::Null);
    }

    #[test]
    fn test_filter_rows() {
        let rows = vec![row(json!({
            "id": 1,
            "name": "Ann",
            "ssn": "123-45-6789",
            "email": "ann@example.com",
            "notes": null
        }))];

        let filtered = production().filter_rows(rows.clone());
        assert_eq!(
            filtered,
            vec![row(json!({
                "id": 1,
                "name": "Ann",
                "ssn": MASK_TOKEN,
                "email": "an***@***.***",
                "notes": null
            }))]
        );

        let untouched = SecurityFilter::new("staging", "production").filter_rows(rows.clone());
        assert_eq!(untouched, rows);
    }

    #[test]
    fn test_filter_schema() {
        let columns = vec![
            ColumnInfo::new("id", "int", false),
            ColumnInfo::new("home_phone", "varchar(32)", true),
        ];

        let filtered = production().filter_schema(columns.clone());
        assert_eq!(filtered[0], columns[0]);
        assert_eq!(filtered[1].data_type, SENSITIVE_TYPE_SENTINEL);
        assert!(filtered[1].sensitive);

        let local = SecurityFilter::new("local", "production").filter_schema(columns.clone());
        assert_eq!(local, columns);
    }

    #[test]
    fn test_would_touch_sensitive_data() {
        let filter = production();
        assert!(filter.would_touch_sensitive_data("SELECT ssn FROM users"));
        assert!(filter.would_touch_sensitive_data("select u.email from users u"));
        assert!(!filter.would_touch_sensitive_data("SELECT id, name FROM users"));
    }

    #[test]
    fn test_status_strings() {
        assert!(production().status().contains("ACTIVE"));
        assert!(SecurityFilter::new("local", "production").status().contains("inactive"));
    }
}
