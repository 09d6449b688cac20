//! Types for EPP host create

use chrono::Utc;
use instant_xml::{FromXml, ToXml};

use super::{is_valid_hostname, parse_addr, HostAddr, XMLNS};
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::{self, StoreError, Txn};
use crate::xml::format_time;

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "create", ns(XMLNS))]
pub struct HostCreate {
    pub name: Option<String>,
    #[xml(rename = "addr")]
    pub addresses: Vec<HostAddr>,
}

// Response

/// The `<creData>` tag for host create responses
#[derive(Debug, ToXml)]
#[xml(rename = "creData", ns(XMLNS))]
pub struct CreateData {
    pub name: String,
    #[xml(rename = "crDate")]
    pub created_at: String,
}

pub(crate) async fn handle(
    request: &HostCreate,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(name) = &request.name else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let name = name.trim().to_lowercase();

    if !is_valid_hostname(&name) {
        return Reply::with_message(
            ResultCode::ParameterValueSyntaxError,
            "Invalid hostname format",
            &ctx.tr_ids,
        );
    }

    let mut addresses = Vec::with_capacity(request.addresses.len());
    for addr in &request.addresses {
        match parse_addr(addr) {
            Some(parsed) => addresses.push(parsed),
            None => {
                return Reply::with_message(
                    ResultCode::ParameterValueSyntaxError,
                    format!("Invalid IP address: {}", addr.address),
                    &ctx.tr_ids,
                )
            }
        }
    }

    if txn.host(&name).await?.is_some() {
        return Reply::new(ResultCode::ObjectExists, &ctx.tr_ids);
    }

    let created_at = Utc::now();
    let host = store::Host {
        name: name.clone(),
        client_id: ctx.client.to_owned(),
        created_at,
        updated_at: None,
        statuses: vec!["ok".to_owned()],
    };
    match txn.insert_host(&host).await {
        Ok(()) => {}
        Err(StoreError::Exists) => return Reply::new(ResultCode::ObjectExists, &ctx.tr_ids),
        Err(err) => return Err(err.into()),
    }
    // Duplicate addresses in the request coalesce through the store's
    // add-if-absent semantics.
    for addr in addresses {
        txn.add_host_address(&name, addr).await?;
    }

    tracing::info!(host = %name, client = %ctx.client, "host created");
    Reply::with_data(
        ResultCode::CommandCompletedSuccessfully,
        CreateData {
            name,
            created_at: format_time(created_at),
        },
        &ctx.tr_ids,
    )
}
