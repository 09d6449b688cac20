//! Types for EPP host info

use std::str::FromStr;

use instant_xml::{FromXml, ToXml};

use super::{HostAddr, Status, XMLNS};
use crate::dispatch::CommandContext;
use crate::domain::roid;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::Txn;
use crate::xml::format_time;

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "info", ns(XMLNS))]
pub struct HostInfo {
    pub name: Option<String>,
}

// Response

/// The `<infData>` tag for host info responses
#[derive(Debug, ToXml)]
#[xml(rename = "infData", ns(XMLNS))]
pub struct InfoData {
    pub name: String,
    pub roid: String,
    pub statuses: Vec<Status>,
    pub addresses: Vec<HostAddr>,
    #[xml(rename = "clID")]
    pub client_id: String,
    #[xml(rename = "crID")]
    pub creator_id: String,
    #[xml(rename = "crDate")]
    pub created_at: String,
    #[xml(rename = "upDate")]
    pub updated_at: Option<String>,
}

pub(crate) async fn handle(
    request: &HostInfo,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(name) = &request.name else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let name = name.trim().to_lowercase();

    let Some(host) = txn.host(&name).await? else {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    };
    let addresses = txn.host_addresses(&name).await?;

    let data = InfoData {
        roid: roid(&host.name, ctx.server_id),
        name: host.name,
        statuses: host
            .statuses
            .iter()
            .filter_map(|s| Status::from_str(s).ok())
            .collect(),
        addresses: addresses.iter().map(HostAddr::from).collect(),
        client_id: host.client_id.clone(),
        creator_id: host.client_id,
        created_at: format_time(host.created_at),
        updated_at: host.updated_at.map(format_time),
    };

    Reply::with_data(ResultCode::CommandCompletedSuccessfully, data, &ctx.tr_ids)
}
