//! Types for EPP domain info

use std::str::FromStr;

use instant_xml::{FromXml, ToXml};

use super::{roid, DomainAuthInfo, DomainContact, HostObj, NameServers, Status, XMLNS};
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::Txn;
use crate::xml::format_time;

// Request

/// The `<name>` element carries an optional `hosts` filter attribute, which
/// this registry accepts and ignores (all delegation data is returned).
#[derive(Debug, FromXml)]
#[xml(rename = "name", ns(XMLNS))]
pub struct InfoName {
    #[xml(attribute)]
    pub hosts: Option<String>,
    #[xml(direct)]
    pub name: String,
}

#[derive(Debug, FromXml)]
#[xml(rename = "info", ns(XMLNS))]
pub struct DomainInfo {
    pub name: Option<InfoName>,
    pub auth_info: Option<DomainAuthInfo>,
}

// Response

/// The `<infData>` tag for domain info responses
#[derive(Debug, ToXml)]
#[xml(rename = "infData", ns(XMLNS))]
pub struct InfoData {
    pub name: String,
    pub roid: String,
    pub statuses: Vec<Status>,
    pub registrant: Option<String>,
    pub contacts: Vec<DomainContact>,
    pub ns: Option<NameServers>,
    #[xml(rename = "clID")]
    pub client_id: String,
    #[xml(rename = "crID")]
    pub creator_id: String,
    #[xml(rename = "crDate")]
    pub created_at: String,
    #[xml(rename = "upDate")]
    pub updated_at: Option<String>,
    #[xml(rename = "exDate")]
    pub expires_at: String,
    pub auth_info: Option<DomainAuthInfo>,
}

/// The stored authorization data is disclosed to the sponsoring client only.
pub(crate) async fn handle(
    request: &DomainInfo,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(name) = &request.name else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let name = name.name.trim().to_lowercase();

    let Some(domain) = txn.domain(&name).await? else {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    };

    let nameservers = txn.domain_nameservers(&name).await?;
    let contacts = txn
        .domain_contacts(&name)
        .await?
        .into_iter()
        .map(|(role, id)| DomainContact {
            contact_type: role,
            id,
        })
        .collect();

    let sponsor = ctx.client == domain.client_id;
    let data = InfoData {
        roid: roid(&domain.name, ctx.server_id),
        name: domain.name,
        statuses: domain
            .statuses
            .iter()
            .filter_map(|s| Status::from_str(s).ok())
            .collect(),
        registrant: domain.registrant,
        contacts,
        ns: (!nameservers.is_empty()).then(|| NameServers {
            hosts: nameservers
                .into_iter()
                .map(|name| HostObj { name })
                .collect(),
        }),
        client_id: domain.client_id.clone(),
        creator_id: domain.client_id,
        created_at: format_time(domain.created_at),
        updated_at: domain.updated_at.map(format_time),
        expires_at: format_time(domain.expires_at),
        auth_info: sponsor.then_some(DomainAuthInfo {
            password: domain.auth_info,
        }),
    };

    Reply::with_data(ResultCode::CommandCompletedSuccessfully, data, &ctx.tr_ids)
}
