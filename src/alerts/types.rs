// src/alerts/types.rs
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MIN_MAGNITUDE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=10.0;

/// A stored alert subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertPreference {
    pub id: String,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub discord_webhook: Option<String>,
    pub min_magnitude: f64,
    pub notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Unique identity keys a subscription can be found by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Phone,
    Email,
}

impl IdentityKey {
    pub fn field(self) -> &'static str {
        match self {
            IdentityKey::Phone => "phoneNumber",
            IdentityKey::Email => "email",
        }
    }
}

impl AlertPreference {
    pub fn identity(&self, key: IdentityKey) -> Option<&str> {
        match key {
            IdentityKey::Phone => self.phone_number.as_deref(),
            IdentityKey::Email => self.email.as_deref(),
        }
    }
}

/// Body of a preference write, as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPreferenceInput {
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub discord_webhook: Option<String>,
    #[serde(default)]
    pub min_magnitude: Option<f64>,
    #[serde(default)]
    pub notifications_enabled: Option<bool>,
}

/// Input after validation: strings trimmed, empty strings collapsed to `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPreference {
    pub location_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub discord_webhook: Option<String>,
    pub min_magnitude: f64,
    pub notifications_enabled: bool,
}

impl ValidPreference {
    pub fn identity(&self, key: IdentityKey) -> Option<&str> {
        match key {
            IdentityKey::Phone => self.phone_number.as_deref(),
            IdentityKey::Email => self.email.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// One or more fields violate their constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid input")?;
        for (i, fe) in self.fields.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{} {}", fe.field, fe.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// `{field: [messages]}` for client responses.
    pub fn details(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut out: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for fe in &self.fields {
            out.entry(fe.field).or_default().push(fe.message.clone());
        }
        out
    }
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{3,19}$").unwrap());

fn clean(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl AlertPreferenceInput {
    pub fn validate(self) -> Result<ValidPreference, ValidationError> {
        let mut errors = Vec::new();
        let mut fail = |field: &'static str, message: &str| {
            errors.push(FieldError {
                field,
                message: message.to_string(),
            })
        };

        let location_name = clean(self.location_name);
        let phone_number = clean(self.phone_number);
        let email = clean(self.email);
        let discord_webhook = clean(self.discord_webhook);

        if let Some(p) = &phone_number {
            if !PHONE_RE.is_match(p) {
                fail("phoneNumber", "must be digits with optional leading +");
            }
        }
        if let Some(e) = &email {
            if !EMAIL_RE.is_match(e) {
                fail("email", "must be a valid email address");
            }
        }
        if let Some(w) = &discord_webhook {
            let ok = reqwest::Url::parse(w)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !ok {
                fail("discordWebhook", "must be an http(s) URL");
            }
        }

        let min_magnitude = match self.min_magnitude {
            Some(m) if m.is_finite() && MIN_MAGNITUDE_RANGE.contains(&m) => Some(m),
            Some(_) => {
                fail("minMagnitude", "must be between 0 and 10");
                None
            }
            None => {
                fail("minMagnitude", "is required");
                None
            }
        };
        if self.notifications_enabled.is_none() {
            fail("notificationsEnabled", "is required");
        }

        match (min_magnitude, self.notifications_enabled) {
            (Some(min_magnitude), Some(notifications_enabled)) if errors.is_empty() => {
                Ok(ValidPreference {
                    location_name,
                    phone_number,
                    email,
                    discord_webhook,
                    min_magnitude,
                    notifications_enabled,
                })
            }
            _ => Err(ValidationError { fields: errors }),
        }
    }
}
