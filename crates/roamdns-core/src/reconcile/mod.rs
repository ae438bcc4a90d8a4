//! Reconciliation against the external DNS provider
//!
//! The reconciler makes the provider's record for a client name match the
//! address the server just observed. Every call is a fresh lookup-then-act:
//! no intent is stored between runs, and correctness rests on upsert and
//! delete being idempotent.
//!
//! ## Flow
//!
//! ```text
//!  upsert(name, value)                  delete(name)
//!        │                                   │
//!        ▼                                   ▼
//!  find_record (≤3 tries, 1s apart)    find_record (≤3 tries, 1s apart)
//!        │                                   │
//!   found? ──yes──▶ update_record       found? ──yes──▶ delete_record
//!        │                                   │
//!        no ──────▶ create_record            no ──────▶ warn, Ok(Absent)
//! ```
//!
//! ## Retry policy
//!
//! Only lookups are retried. Create, update and delete are attempted exactly
//! once; a failed write surfaces to the caller and the next report from the
//! client repairs the divergence.
//!
//! An update is issued whenever a record exists, even when its value already
//! matches. This costs one extra provider call per detected change and keeps
//! the provider's copy authoritative over whatever was looked up.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsRecord, RecordType};

/// Number of lookup attempts before the error is surfaced
pub const LOOKUP_ATTEMPTS: usize = 3;

/// Fixed pause between lookup attempts
pub const LOOKUP_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Result of [`Reconciler::upsert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed; one was created
    Created { record_id: String },
    /// A record existed and was overwritten
    Updated { record_id: String },
}

/// Result of [`Reconciler::delete`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The record existed and was deleted
    Deleted { record_id: String },
    /// No record existed; nothing was done
    Absent,
}

/// Idempotent upsert/delete of one record per client name
pub struct Reconciler {
    /// DNS provider for lookups and writes
    provider: Arc<dyn DnsProvider>,

    /// Domain the records live under
    domain: String,

    /// Lookup attempts (at least 1)
    lookup_attempts: usize,

    /// Delay between lookup attempts
    lookup_retry_delay: Duration,
}

impl Reconciler {
    /// Create a reconciler for `domain` with the default lookup retry policy
    pub fn new(provider: Arc<dyn DnsProvider>, domain: impl Into<String>) -> Self {
        Self {
            provider,
            domain: domain.into(),
            lookup_attempts: LOOKUP_ATTEMPTS,
            lookup_retry_delay: LOOKUP_RETRY_DELAY,
        }
    }

    /// Override the lookup retry policy
    pub fn with_lookup_retry(mut self, attempts: usize, delay: Duration) -> Self {
        self.lookup_attempts = attempts.max(1);
        self.lookup_retry_delay = delay;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Point the `A` record `record_name` at `value`
    pub async fn upsert(&self, record_name: &str, value: &str) -> Result<UpsertOutcome> {
        self.upsert_typed(record_name, RecordType::A, value).await
    }

    /// Point `record_name` at `ip`, choosing `A` or `AAAA` by address family
    pub async fn upsert_address(&self, record_name: &str, ip: IpAddr) -> Result<UpsertOutcome> {
        self.upsert_typed(record_name, RecordType::for_ip(&ip), &ip.to_string())
            .await
    }

    /// Create the record if absent, otherwise update it by identifier
    pub async fn upsert_typed(
        &self,
        record_name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<UpsertOutcome> {
        match self.lookup(record_name).await? {
            Some(record) => {
                debug!(
                    "Record {}.{} exists (id {}, value {}), updating to {}",
                    record_name, self.domain, record.id, record.value, value
                );
                self.provider
                    .update_record(&record.id, record_name, record_type, value)
                    .await?;
                info!(
                    "Updated {} record {}.{} -> {}",
                    record_type, record_name, self.domain, value
                );
                Ok(UpsertOutcome::Updated {
                    record_id: record.id,
                })
            }
            None => {
                let record_id = self
                    .provider
                    .create_record(&self.domain, record_name, record_type, value)
                    .await?;
                info!(
                    "Created {} record {}.{} -> {} (id {})",
                    record_type, record_name, self.domain, value, record_id
                );
                Ok(UpsertOutcome::Created { record_id })
            }
        }
    }

    /// Delete the record for `record_name`; absent records are a no-op
    pub async fn delete(&self, record_name: &str) -> Result<DeleteOutcome> {
        match self.lookup(record_name).await? {
            Some(record) => {
                self.provider.delete_record(&record.id).await?;
                info!(
                    "Deleted record {}.{} (id {})",
                    record_name, self.domain, record.id
                );
                Ok(DeleteOutcome::Deleted {
                    record_id: record.id,
                })
            }
            None => {
                warn!("Record does not exist: {}.{}", record_name, self.domain);
                Ok(DeleteOutcome::Absent)
            }
        }
    }

    /// Look up a record, retrying transient failures
    async fn lookup(&self, record_name: &str) -> Result<Option<DnsRecord>> {
        let mut last_error = None;

        for attempt in 1..=self.lookup_attempts {
            match self.provider.find_record(&self.domain, record_name).await {
                Ok(found) => return Ok(found),
                Err(e) => {
                    warn!(
                        "Lookup attempt {}/{} for {}.{} failed: {}",
                        attempt, self.lookup_attempts, record_name, self.domain, e
                    );
                    last_error = Some(e);

                    if attempt < self.lookup_attempts {
                        tokio::time::sleep(self.lookup_retry_delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Other("lookup made no attempts".to_string())))
    }
}
