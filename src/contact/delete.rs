//! Types for EPP contact delete

use instant_xml::FromXml;

use super::XMLNS;
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::{StoreError, Txn};

#[derive(Debug, FromXml)]
#[xml(rename = "delete", ns(XMLNS))]
pub struct ContactDelete {
    pub id: Option<String>,
}

/// A handle referenced by any domain, through any role, cannot be deleted.
pub(crate) async fn handle(
    request: &ContactDelete,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(id) = request.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };

    if txn.contact(id).await?.is_none() {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    }

    match txn.delete_contact(id).await {
        Ok(()) => {
            tracing::info!(contact = %id, client = %ctx.client, "contact deleted");
            Reply::new(ResultCode::CommandCompletedSuccessfully, &ctx.tr_ids)
        }
        Err(StoreError::InUse(count)) => Reply::with_message(
            ResultCode::ObjectAssociationProhibitsOperation,
            format!("Object association prohibits operation ({count} domains reference this contact)"),
            &ctx.tr_ids,
        ),
        Err(err) => Err(err.into()),
    }
}
