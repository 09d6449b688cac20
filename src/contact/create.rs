//! Types for EPP contact create

use chrono::Utc;
use instant_xml::{FromXml, ToXml};

use super::{validate_country, ContactAuthInfo, Fax, PostalInfo, Voice, XMLNS};
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::{self, StoreError, Txn};
use crate::xml::format_time;

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "create", ns(XMLNS))]
pub struct ContactCreate {
    pub id: Option<String>,
    pub postal_info: Option<PostalInfo>,
    pub voice: Option<Voice>,
    pub fax: Option<Fax>,
    pub email: Option<String>,
    pub auth_info: Option<ContactAuthInfo>,
}

// Response

/// The `<creData>` tag for contact create responses
#[derive(Debug, ToXml)]
#[xml(rename = "creData", ns(XMLNS))]
pub struct CreateData {
    pub id: String,
    #[xml(rename = "crDate")]
    pub created_at: String,
}

fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) async fn handle(
    request: &ContactCreate,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    // Name, first street line, city, postal code, country code, voice and
    // email must all be present on creation.
    let (Some(id), Some(postal), Some(voice), Some(email)) = (
        text(&request.id),
        &request.postal_info,
        &request.voice,
        text(&request.email),
    ) else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let Some(address) = &postal.address else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let (Some(name), Some(city), Some(postal_code), Some(country)) = (
        text(&postal.name),
        text(&address.city),
        text(&address.postal_code),
        text(&address.country),
    ) else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };
    let street: Vec<String> = address
        .street
        .iter()
        .map(|line| line.trim().to_owned())
        .filter(|line| !line.is_empty())
        .collect();
    if street.is_empty() || voice.number.trim().is_empty() {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    }

    let Some(country_code) = validate_country(country) else {
        return Reply::new(ResultCode::ParameterValueSyntaxError, &ctx.tr_ids);
    };

    if txn.contact(id).await?.is_some() {
        return Reply::new(ResultCode::ObjectExists, &ctx.tr_ids);
    }

    let created_at = Utc::now();
    let contact = store::Contact {
        handle: id.to_owned(),
        client_id: ctx.client.to_owned(),
        name: name.to_owned(),
        organization: text(&postal.organization).map(str::to_owned),
        street,
        city: city.to_owned(),
        province: text(&address.province).map(str::to_owned),
        postal_code: postal_code.to_owned(),
        country_code,
        voice: voice.number.trim().to_owned(),
        fax: request
            .fax
            .as_ref()
            .map(|fax| fax.number.trim().to_owned())
            .filter(|number| !number.is_empty()),
        email: email.to_owned(),
        created_at,
        updated_at: None,
        statuses: vec!["ok".to_owned()],
    };
    match txn.insert_contact(&contact).await {
        Ok(()) => {}
        Err(StoreError::Exists) => return Reply::new(ResultCode::ObjectExists, &ctx.tr_ids),
        Err(err) => return Err(err.into()),
    }

    tracing::info!(contact = %id, client = %ctx.client, "contact created");
    Reply::with_data(
        ResultCode::CommandCompletedSuccessfully,
        CreateData {
            id: id.to_owned(),
            created_at: format_time(created_at),
        },
        &ctx.tr_ids,
    )
}
