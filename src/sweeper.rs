//! Background approval of unanswered transfer requests
//!
//! A pending transfer nobody acts on elapses to `serverApproved` after the
//! configured window, applying the same mutation the losing sponsor's
//! approval would: sponsorship moves and the expiration extends one year.

use std::time::Duration as StdDuration;

use chrono::{Days, Duration, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Policy;
use crate::error::Error;
use crate::store::{Store, TransferStatus};

const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60);

pub async fn run(store: Store, policy: Policy, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(err) = sweep(&store, policy.transfer_window_days).await {
                    warn!(error = %err, "transfer sweep failed");
                }
            }
            _ = shutdown.changed() => return,
        }
    }
}

/// One pass over elapsed pending transfers; returns how many were approved.
pub async fn sweep(store: &Store, window_days: i64) -> Result<usize, Error> {
    let now = Utc::now();
    let cutoff = now - Duration::days(window_days);

    let mut txn = store.begin().await?;
    let pending = txn.pending_transfers_before(cutoff).await?;
    let mut approved = 0;

    for record in pending {
        let Some(mut domain) = txn.domain(&record.domain_name).await? else {
            // The domain was deleted while the request sat pending; close
            // the record instead of resurrecting it.
            txn.set_transfer_status(record.id, TransferStatus::ServerCancelled, now)
                .await?;
            continue;
        };

        domain.client_id = record.new_client.clone();
        domain.expires_at = domain.expires_at + Days::new(365);
        domain.updated_at = Some(now);
        txn.update_domain(&domain).await?;
        txn.set_transfer_status(record.id, TransferStatus::ServerApproved, now)
            .await?;

        info!(
            domain = %record.domain_name,
            from = %record.old_client,
            to = %record.new_client,
            "transfer auto-approved"
        );
        approved += 1;
    }

    txn.commit().await?;
    Ok(approved)
}
