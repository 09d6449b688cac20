//! Types for EPP domain transfer
//!
//! The `op` attribute on the `<transfer>` command element selects the
//! operation; `query` is the default. Approval and rejection belong to the
//! losing sponsor, cancellation to the requesting registrar, and a pending
//! request that nobody acts on is approved server-side by the sweeper after
//! the configured window.

use chrono::{Days, Duration, Utc};
use instant_xml::{FromXml, ToXml};

use super::{DomainAuthInfo, Period, XMLNS};
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::{Transfer, TransferStatus, Txn};
use crate::xml::format_time;

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "transfer", ns(XMLNS))]
pub struct DomainTransfer {
    pub name: Option<String>,
    pub period: Option<Period>,
    pub auth_info: Option<DomainAuthInfo>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferOp {
    Query,
    Request,
    Approve,
    Reject,
    Cancel,
}

impl TransferOp {
    /// Maps the `op` attribute; `None` for values this server does not
    /// implement (2102).
    pub fn from_attr(op: Option<&str>) -> Option<Self> {
        Some(match op {
            None | Some("query") => Self::Query,
            Some("request") => Self::Request,
            Some("approve") => Self::Approve,
            Some("reject") => Self::Reject,
            Some("cancel") => Self::Cancel,
            Some(_) => return None,
        })
    }
}

// Response

/// The `<trnData>` tag for domain transfer responses
#[derive(Debug, ToXml)]
#[xml(rename = "trnData", ns(XMLNS))]
pub struct TransferData {
    pub name: String,
    #[xml(rename = "trStatus")]
    pub status: String,
    #[xml(rename = "reID")]
    pub requester: String,
    #[xml(rename = "reDate")]
    pub requested_at: String,
    #[xml(rename = "acID")]
    pub action_by: String,
    #[xml(rename = "acDate")]
    pub action_at: String,
}

impl TransferData {
    fn from_record(record: &Transfer, window_days: i64) -> Self {
        // For a pending record the action date is the auto-approval
        // deadline; afterwards it is the date the transfer was acted on.
        let action_at = record
            .acted_at
            .unwrap_or(record.requested_at + Duration::days(window_days));
        Self {
            name: record.domain_name.clone(),
            status: record.status.as_str().to_owned(),
            requester: record.new_client.clone(),
            requested_at: format_time(record.requested_at),
            action_by: record.old_client.clone(),
            action_at: format_time(action_at),
        }
    }
}

pub(crate) async fn handle(
    op: TransferOp,
    request: &DomainTransfer,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(name) = &request.name else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let name = name.trim().to_lowercase();

    match op {
        TransferOp::Query => {
            let Some(record) = txn.latest_transfer(&name).await? else {
                return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
            };
            Reply::with_data(
                ResultCode::CommandCompletedSuccessfully,
                TransferData::from_record(&record, ctx.transfer_window_days),
                &ctx.tr_ids,
            )
        }
        TransferOp::Request => request_transfer(request, &name, ctx, txn).await,
        TransferOp::Approve => approve(&name, ctx, txn).await,
        TransferOp::Reject => act(&name, TransferStatus::ClientRejected, ctx, txn).await,
        TransferOp::Cancel => act(&name, TransferStatus::ClientCancelled, ctx, txn).await,
    }
}

async fn request_transfer(
    request: &DomainTransfer,
    name: &str,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(auth) = &request.auth_info else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };

    let Some(domain) = txn.domain(name).await? else {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    };
    if domain.client_id == ctx.client {
        return Reply::with_message(
            ResultCode::CommandUseError,
            "Registrar already sponsors this object",
            &ctx.tr_ids,
        );
    }
    if auth.password != domain.auth_info {
        return Reply::new(ResultCode::InvalidAuthorizationInformation, &ctx.tr_ids);
    }
    if let Some(pending) = txn.latest_transfer(name).await? {
        if pending.status == TransferStatus::Pending {
            return Reply::with_message(
                ResultCode::CommandUseError,
                "Transfer already pending",
                &ctx.tr_ids,
            );
        }
    }

    let requested_at = Utc::now();
    let id = txn
        .insert_transfer(name, &domain.client_id, ctx.client, requested_at, &auth.password)
        .await?;

    tracing::info!(
        domain = %name,
        from = %domain.client_id,
        to = %ctx.client,
        transfer = id,
        "transfer requested"
    );
    Reply::with_data(
        ResultCode::CommandCompletedSuccessfullyActionPending,
        TransferData {
            name: name.to_owned(),
            status: TransferStatus::Pending.as_str().to_owned(),
            requester: ctx.client.to_owned(),
            requested_at: format_time(requested_at),
            action_by: domain.client_id,
            action_at: format_time(requested_at + Duration::days(ctx.transfer_window_days)),
        },
        &ctx.tr_ids,
    )
}

async fn approve(name: &str, ctx: &CommandContext<'_>, txn: &mut Txn) -> Result<Reply, Error> {
    let Some(record) = pending_record(name, txn).await? else {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    };
    if record.old_client != ctx.client {
        return Reply::new(ResultCode::AuthorizationError, &ctx.tr_ids);
    }

    let Some(mut domain) = txn.domain(name).await? else {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    };

    let now = Utc::now();
    domain.client_id = record.new_client.clone();
    domain.expires_at = domain.expires_at + Days::new(365);
    domain.updated_at = Some(now);
    txn.update_domain(&domain).await?;
    txn.set_transfer_status(record.id, TransferStatus::ClientApproved, now)
        .await?;

    tracing::info!(domain = %name, to = %record.new_client, "transfer approved");
    let mut data = TransferData::from_record(&record, ctx.transfer_window_days);
    data.status = TransferStatus::ClientApproved.as_str().to_owned();
    data.action_at = format_time(now);
    Reply::with_data(ResultCode::CommandCompletedSuccessfully, data, &ctx.tr_ids)
}

/// Rejection (by the losing sponsor) and cancellation (by the requesting
/// registrar) terminate the record without touching the domain.
async fn act(
    name: &str,
    outcome: TransferStatus,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(record) = pending_record(name, txn).await? else {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    };
    let allowed = match outcome {
        TransferStatus::ClientRejected => record.old_client == ctx.client,
        TransferStatus::ClientCancelled => record.new_client == ctx.client,
        _ => false,
    };
    if !allowed {
        return Reply::new(ResultCode::AuthorizationError, &ctx.tr_ids);
    }

    let now = Utc::now();
    txn.set_transfer_status(record.id, outcome, now).await?;

    tracing::info!(domain = %name, outcome = outcome.as_str(), "transfer closed");
    let mut data = TransferData::from_record(&record, ctx.transfer_window_days);
    data.status = outcome.as_str().to_owned();
    data.action_at = format_time(now);
    Reply::with_data(ResultCode::CommandCompletedSuccessfully, data, &ctx.tr_ids)
}

async fn pending_record(name: &str, txn: &mut Txn) -> Result<Option<Transfer>, Error> {
    Ok(txn
        .latest_transfer(name)
        .await?
        .filter(|record| record.status == TransferStatus::Pending))
}
