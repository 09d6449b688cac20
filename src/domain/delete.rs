//! Types for EPP domain delete

use instant_xml::FromXml;

use super::{Status, XMLNS};
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::Txn;

#[derive(Debug, FromXml)]
#[xml(rename = "delete", ns(XMLNS))]
pub struct DomainDelete {
    pub name: Option<String>,
}

/// Deleting removes the domain and its association rows only; referenced
/// contacts and hosts stay behind as independent objects.
pub(crate) async fn handle(
    request: &DomainDelete,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(name) = &request.name else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let name = name.trim().to_lowercase();

    let Some(domain) = txn.domain(&name).await? else {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    };
    if domain.client_id != ctx.client {
        return Reply::new(ResultCode::AuthorizationError, &ctx.tr_ids);
    }
    if domain
        .statuses
        .iter()
        .any(|s| s == Status::ClientDeleteProhibited.as_str())
    {
        return Reply::new(ResultCode::ObjectStatusProhibitsOperation, &ctx.tr_ids);
    }

    txn.delete_domain(&name).await?;
    tracing::info!(domain = %name, client = %ctx.client, "domain deleted");
    Reply::new(ResultCode::CommandCompletedSuccessfully, &ctx.tr_ids)
}
