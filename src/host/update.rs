//! Types for EPP host update

use chrono::Utc;
use instant_xml::FromXml;

use super::{parse_addr, HostAddr, Status, XMLNS};
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::Txn;

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "add", ns(XMLNS))]
pub struct HostAdd {
    #[xml(rename = "addr")]
    pub addresses: Vec<HostAddr>,
    pub statuses: Vec<Status>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "rem", ns(XMLNS))]
pub struct HostRem {
    #[xml(rename = "addr")]
    pub addresses: Vec<HostAddr>,
    pub statuses: Vec<Status>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "update", ns(XMLNS))]
pub struct HostUpdate {
    pub name: Option<String>,
    pub add: Option<HostAdd>,
    pub rem: Option<HostRem>,
}

/// Address and status manipulation uses set semantics: duplicates in `add`
/// coalesce, and removing an address the host does not have is a no-op.
pub(crate) async fn handle(
    request: &HostUpdate,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(name) = &request.name else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let name = name.trim().to_lowercase();

    let Some(mut host) = txn.host(&name).await? else {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    };

    if let Some(add) = &request.add {
        for addr in &add.addresses {
            match parse_addr(addr) {
                Some(parsed) => txn.add_host_address(&name, parsed).await?,
                None => {
                    return Reply::with_message(
                        ResultCode::ParameterValueSyntaxError,
                        format!("Invalid IP address: {}", addr.address),
                        &ctx.tr_ids,
                    )
                }
            }
        }
        for status in &add.statuses {
            let token = status.as_str().to_owned();
            if !host.statuses.contains(&token) {
                host.statuses.push(token);
            }
        }
    }

    if let Some(rem) = &request.rem {
        for addr in &rem.addresses {
            if let Some(parsed) = parse_addr(addr) {
                txn.remove_host_address(&name, parsed).await?;
            }
        }
        for status in &rem.statuses {
            host.statuses.retain(|s| s != status.as_str());
        }
    }

    host.updated_at = Some(Utc::now());
    txn.update_host(&host).await?;

    tracing::info!(host = %name, client = %ctx.client, "host updated");
    Reply::new(ResultCode::CommandCompletedSuccessfully, &ctx.tr_ids)
}
