//! Types for EPP contact update

use chrono::Utc;
use instant_xml::FromXml;

use super::{validate_country, ContactAuthInfo, Fax, PostalInfo, Status, Voice, XMLNS};
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::Txn;

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "add", ns(XMLNS))]
pub struct ContactAdd {
    pub statuses: Vec<Status>,
}

/// `<rem>` may drop status tokens and may clear the fax number.
#[derive(Debug, FromXml)]
#[xml(rename = "rem", ns(XMLNS))]
pub struct ContactRem {
    pub statuses: Vec<Status>,
    pub fax: Option<Fax>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "chg", ns(XMLNS))]
pub struct ContactChange {
    pub postal_info: Option<PostalInfo>,
    pub voice: Option<Voice>,
    pub fax: Option<Fax>,
    pub email: Option<String>,
    pub auth_info: Option<ContactAuthInfo>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "update", ns(XMLNS))]
pub struct ContactUpdate {
    pub id: Option<String>,
    pub add: Option<ContactAdd>,
    pub rem: Option<ContactRem>,
    pub chg: Option<ContactChange>,
}

fn replace(target: &mut String, value: &str) {
    *target = value.trim().to_owned();
}

/// `<chg>` replaces individual fields; a change that would leave a mandatory
/// field empty is refused with 2005 rather than applied.
pub(crate) async fn handle(
    request: &ContactUpdate,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(id) = request.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };

    let Some(mut contact) = txn.contact(id).await? else {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    };

    if let Some(add) = &request.add {
        for status in &add.statuses {
            let token = status.as_str().to_owned();
            if !contact.statuses.contains(&token) {
                contact.statuses.push(token);
            }
        }
    }

    if let Some(rem) = &request.rem {
        for status in &rem.statuses {
            contact.statuses.retain(|s| s != status.as_str());
        }
        if rem.fax.is_some() {
            contact.fax = None;
        }
    }

    if let Some(chg) = &request.chg {
        if let Some(postal) = &chg.postal_info {
            if let Some(name) = &postal.name {
                replace(&mut contact.name, name);
            }
            if let Some(organization) = &postal.organization {
                let organization = organization.trim();
                contact.organization =
                    (!organization.is_empty()).then(|| organization.to_owned());
            }
            if let Some(address) = &postal.address {
                if !address.street.is_empty() {
                    contact.street = address
                        .street
                        .iter()
                        .map(|line| line.trim().to_owned())
                        .filter(|line| !line.is_empty())
                        .collect();
                }
                if let Some(city) = &address.city {
                    replace(&mut contact.city, city);
                }
                if let Some(province) = &address.province {
                    let province = province.trim();
                    contact.province = (!province.is_empty()).then(|| province.to_owned());
                }
                if let Some(postal_code) = &address.postal_code {
                    replace(&mut contact.postal_code, postal_code);
                }
                if let Some(country) = &address.country {
                    match validate_country(country) {
                        Some(code) => contact.country_code = code,
                        None => {
                            return Reply::new(ResultCode::ParameterValueSyntaxError, &ctx.tr_ids)
                        }
                    }
                }
            }
        }
        if let Some(voice) = &chg.voice {
            replace(&mut contact.voice, &voice.number);
        }
        if let Some(fax) = &chg.fax {
            let number = fax.number.trim();
            contact.fax = (!number.is_empty()).then(|| number.to_owned());
        }
        if let Some(email) = &chg.email {
            replace(&mut contact.email, email);
        }
    }

    // The merged record must still satisfy the creation invariants.
    let mandatory = [
        &contact.name,
        &contact.city,
        &contact.postal_code,
        &contact.country_code,
        &contact.voice,
        &contact.email,
    ];
    if contact.street.is_empty() || mandatory.iter().any(|field| field.is_empty()) {
        return Reply::new(ResultCode::ParameterValueSyntaxError, &ctx.tr_ids);
    }

    contact.updated_at = Some(Utc::now());
    txn.update_contact(&contact).await?;

    tracing::info!(contact = %id, client = %ctx.client, "contact updated");
    Reply::new(ResultCode::CommandCompletedSuccessfully, &ctx.tr_ids)
}
