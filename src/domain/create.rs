//! Types for EPP domain create

use chrono::{Days, Utc};
use instant_xml::{FromXml, ToXml};

use super::{DomainAuthInfo, DomainContact, NameServers, Period, XMLNS};
use crate::common::token_hex;
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::host::is_valid_hostname;
use crate::response::{Reply, ResultCode};
use crate::store::{self, StoreError, Txn};
use crate::xml::format_time;

const CONTACT_ROLES: &[&str] = &["admin", "billing", "tech"];

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "create", ns(XMLNS))]
pub struct DomainCreate {
    pub name: Option<String>,
    pub period: Option<Period>,
    pub ns: Option<NameServers>,
    pub registrant: Option<String>,
    pub contacts: Vec<DomainContact>,
    pub auth_info: Option<DomainAuthInfo>,
}

// Response

/// The `<creData>` tag for domain create responses
#[derive(Debug, ToXml)]
#[xml(rename = "creData", ns(XMLNS))]
pub struct CreateData {
    pub name: String,
    #[xml(rename = "crDate")]
    pub created_at: String,
    #[xml(rename = "exDate")]
    pub expires_at: String,
}

pub(crate) async fn handle(
    request: &DomainCreate,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(name) = &request.name else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let name = name.trim().to_lowercase();

    let years = match &request.period {
        Some(period) => match period.years() {
            Some(years) => years,
            None => return Reply::new(ResultCode::ParameterValueSyntaxError, &ctx.tr_ids),
        },
        None => 1,
    };

    for contact in &request.contacts {
        if !CONTACT_ROLES.contains(&contact.contact_type.as_str()) {
            return Reply::new(ResultCode::ParameterValueSyntaxError, &ctx.tr_ids);
        }
    }

    if txn.domain(&name).await?.is_some() {
        return Reply::new(ResultCode::ObjectExists, &ctx.tr_ids);
    }

    let created_at = Utc::now();
    let expires_at = created_at + Days::new(365 * u64::from(years));
    let auth_info = match &request.auth_info {
        Some(auth) => auth.password.clone(),
        None => token_hex(8),
    };

    let domain = store::Domain {
        name: name.clone(),
        client_id: ctx.client.to_owned(),
        registrant: request.registrant.clone(),
        created_at,
        expires_at,
        updated_at: None,
        statuses: vec!["ok".to_owned()],
        auth_info,
    };
    match txn.insert_domain(&domain).await {
        Ok(()) => {}
        Err(StoreError::Exists) => return Reply::new(ResultCode::ObjectExists, &ctx.tr_ids),
        Err(err) => return Err(err.into()),
    }

    // Referenced hosts may be unknown; they are created name-only with the
    // caller as sponsor and no addresses.
    if let Some(ns) = &request.ns {
        for host in &ns.hosts {
            let host_name = host.name.trim().to_lowercase();
            if !is_valid_hostname(&host_name) {
                return Reply::new(ResultCode::ParameterValueSyntaxError, &ctx.tr_ids);
            }
            if txn.host(&host_name).await?.is_none() {
                txn.insert_host(&store::Host {
                    name: host_name.clone(),
                    client_id: ctx.client.to_owned(),
                    created_at,
                    updated_at: None,
                    statuses: vec!["ok".to_owned()],
                })
                .await?;
            }
            txn.add_domain_nameserver(&name, &host_name).await?;
        }
    }

    for contact in &request.contacts {
        txn.add_domain_contact(&name, &contact.contact_type, &contact.id)
            .await?;
    }

    tracing::info!(domain = %name, client = %ctx.client, years, "domain created");
    Reply::with_data(
        ResultCode::CommandCompletedSuccessfully,
        CreateData {
            name,
            created_at: format_time(created_at),
            expires_at: format_time(expires_at),
        },
        &ctx.tr_ids,
    )
}
