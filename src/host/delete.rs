//! Types for EPP host delete

use instant_xml::FromXml;

use super::XMLNS;
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::{StoreError, Txn};

#[derive(Debug, FromXml)]
#[xml(rename = "delete", ns(XMLNS))]
pub struct HostDelete {
    pub name: Option<String>,
}

/// A host still delegated to by any domain cannot be deleted.
pub(crate) async fn handle(
    request: &HostDelete,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(name) = &request.name else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let name = name.trim().to_lowercase();

    if txn.host(&name).await?.is_none() {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    }

    match txn.delete_host(&name).await {
        Ok(()) => {
            tracing::info!(host = %name, client = %ctx.client, "host deleted");
            Reply::new(ResultCode::CommandCompletedSuccessfully, &ctx.tr_ids)
        }
        Err(StoreError::InUse(_)) => {
            Reply::new(ResultCode::ObjectAssociationProhibitsOperation, &ctx.tr_ids)
        }
        Err(err) => Err(err.into()),
    }
}
