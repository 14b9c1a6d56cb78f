// src/alerts/store.rs
//! Identity-resolving upsert for alert subscriptions.
//!
//! Resolution order is a stated contract: phone number first, then email.
//! The first strategy whose value is present and matches a stored record
//! picks the merge target; when none matches a new record is created.
//!
//! Crossed identities (phone resolves to record A while the incoming email
//! belongs to record B) are rejected with `IdentityConflict` and nothing is
//! written, since merging would give two records the same email.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo::{PreferenceRepository, StorageError};
use super::types::{
    AlertPreference, AlertPreferenceInput, IdentityKey, ValidPreference, ValidationError,
};

/// Identity strategies, tried in order.
pub const RESOLUTION_ORDER: [IdentityKey; 2] = [IdentityKey::Phone, IdentityKey::Email];

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{field} belongs to a different subscription than the one matched by {matched_by}")]
    IdentityConflict {
        matched_by: &'static str,
        field: &'static str,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub id: String,
    pub merged: bool,
}

pub struct PreferenceStore {
    repo: Arc<dyn PreferenceRepository>,
    // Serializes resolve -> merge -> write so concurrent writes to the same
    // identity cannot lose updates.
    write_lock: Mutex<()>,
}

impl PreferenceStore {
    pub fn new(repo: Arc<dyn PreferenceRepository>) -> Self {
        Self {
            repo,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn upsert(&self, input: AlertPreferenceInput) -> Result<UpsertOutcome, PreferenceError> {
        let incoming = input.validate()?;

        let _guard = self.write_lock.lock().await;

        let outcome = match self.resolve(&incoming).await? {
            Some((matched_by, existing)) => {
                self.ensure_no_crossed_identity(matched_by, &existing, &incoming)
                    .await?;
                let id = existing.id.clone();
                self.repo.update(merge(existing, &incoming)).await?;
                info!(%id, matched_by = matched_by.field(), "updated alert preference");
                UpsertOutcome { id, merged: true }
            }
            None => {
                let record = create(&incoming);
                let id = record.id.clone();
                self.repo.insert(record).await?;
                info!(%id, "created alert preference");
                UpsertOutcome { id, merged: false }
            }
        };

        counter!(
            "alerts_upserts_total",
            "merged" => if outcome.merged { "true" } else { "false" }
        )
        .increment(1);
        Ok(outcome)
    }

    async fn resolve(
        &self,
        incoming: &ValidPreference,
    ) -> Result<Option<(IdentityKey, AlertPreference)>, StorageError> {
        for key in RESOLUTION_ORDER {
            let Some(value) = incoming.identity(key) else {
                continue;
            };
            if let Some(existing) = self.repo.find_by(key, value).await? {
                return Ok(Some((key, existing)));
            }
        }
        Ok(None)
    }

    async fn ensure_no_crossed_identity(
        &self,
        matched_by: IdentityKey,
        target: &AlertPreference,
        incoming: &ValidPreference,
    ) -> Result<(), PreferenceError> {
        for key in RESOLUTION_ORDER {
            if key == matched_by {
                continue;
            }
            let Some(value) = incoming.identity(key) else {
                continue;
            };
            if let Some(owner) = self.repo.find_by(key, value).await? {
                if owner.id != target.id {
                    warn!(
                        target_id = %target.id,
                        owner_id = %owner.id,
                        matched_by = matched_by.field(),
                        field = key.field(),
                        "crossed subscription identities; rejecting write"
                    );
                    counter!("alerts_identity_conflicts_total").increment(1);
                    return Err(PreferenceError::IdentityConflict {
                        matched_by: matched_by.field(),
                        field: key.field(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn overwrite_if_present(slot: &mut Option<String>, incoming: &Option<String>) {
    if let Some(v) = incoming {
        *slot = Some(v.clone());
    }
}

/// Present optional fields overwrite, absent ones keep the stored value.
/// Magnitude threshold and the enabled flag always take the incoming value.
fn merge(mut existing: AlertPreference, incoming: &ValidPreference) -> AlertPreference {
    overwrite_if_present(&mut existing.location_name, &incoming.location_name);
    overwrite_if_present(&mut existing.discord_webhook, &incoming.discord_webhook);
    overwrite_if_present(&mut existing.email, &incoming.email);
    overwrite_if_present(&mut existing.phone_number, &incoming.phone_number);
    existing.min_magnitude = incoming.min_magnitude;
    existing.notifications_enabled = incoming.notifications_enabled;
    existing.updated_at = Utc::now();
    existing
}

fn create(incoming: &ValidPreference) -> AlertPreference {
    let now = Utc::now();
    AlertPreference {
        id: Uuid::new_v4().to_string(),
        location_name: incoming.location_name.clone(),
        phone_number: incoming.phone_number.clone(),
        email: incoming.email.clone(),
        discord_webhook: incoming.discord_webhook.clone(),
        min_magnitude: incoming.min_magnitude,
        notifications_enabled: incoming.notifications_enabled,
        created_at: now,
        updated_at: now,
    }
}
