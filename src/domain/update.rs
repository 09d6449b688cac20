//! Types for EPP domain update

use chrono::Utc;
use instant_xml::FromXml;

use super::{DomainAuthInfo, NameServers, Status, XMLNS};
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::host::is_valid_hostname;
use crate::response::{Reply, ResultCode};
use crate::store::{self, Txn};

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "add", ns(XMLNS))]
pub struct DomainAdd {
    pub ns: Option<NameServers>,
    pub statuses: Vec<Status>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "rem", ns(XMLNS))]
pub struct DomainRem {
    pub ns: Option<NameServers>,
    pub statuses: Vec<Status>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "chg", ns(XMLNS))]
pub struct DomainChange {
    pub registrant: Option<String>,
    pub auth_info: Option<DomainAuthInfo>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "update", ns(XMLNS))]
pub struct DomainUpdate {
    pub name: Option<String>,
    pub add: Option<DomainAdd>,
    pub rem: Option<DomainRem>,
    pub chg: Option<DomainChange>,
}

/// Nameserver and status manipulation uses set semantics: adding something
/// present and removing something absent are both no-ops.
pub(crate) async fn handle(
    request: &DomainUpdate,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(name) = &request.name else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let name = name.trim().to_lowercase();

    let Some(mut domain) = txn.domain(&name).await? else {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    };
    if domain.client_id != ctx.client {
        return Reply::new(ResultCode::AuthorizationError, &ctx.tr_ids);
    }
    if domain
        .statuses
        .iter()
        .any(|s| s == Status::ClientUpdateProhibited.as_str())
    {
        return Reply::new(ResultCode::ObjectStatusProhibitsOperation, &ctx.tr_ids);
    }

    if let Some(add) = &request.add {
        if let Some(ns) = &add.ns {
            for host in &ns.hosts {
                let host_name = host.name.trim().to_lowercase();
                if !is_valid_hostname(&host_name) {
                    return Reply::new(ResultCode::ParameterValueSyntaxError, &ctx.tr_ids);
                }
                if txn.host(&host_name).await?.is_none() {
                    txn.insert_host(&store::Host {
                        name: host_name.clone(),
                        client_id: ctx.client.to_owned(),
                        created_at: Utc::now(),
                        updated_at: None,
                        statuses: vec!["ok".to_owned()],
                    })
                    .await?;
                }
                txn.add_domain_nameserver(&name, &host_name).await?;
            }
        }
        for status in &add.statuses {
            let token = status.as_str().to_owned();
            if !domain.statuses.contains(&token) {
                domain.statuses.push(token);
            }
        }
    }

    if let Some(rem) = &request.rem {
        if let Some(ns) = &rem.ns {
            for host in &ns.hosts {
                txn.remove_domain_nameserver(&name, &host.name.trim().to_lowercase())
                    .await?;
            }
        }
        for status in &rem.statuses {
            domain.statuses.retain(|s| s != status.as_str());
        }
    }

    if let Some(chg) = &request.chg {
        if let Some(registrant) = &chg.registrant {
            domain.registrant = Some(registrant.clone());
        }
        if let Some(auth) = &chg.auth_info {
            domain.auth_info = auth.password.clone();
        }
    }

    domain.updated_at = Some(Utc::now());
    txn.update_domain(&domain).await?;

    tracing::info!(domain = %name, client = %ctx.client, "domain updated");
    Reply::new(ResultCode::CommandCompletedSuccessfully, &ctx.tr_ids)
}
