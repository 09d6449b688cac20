//! Types for EPP contact info

use std::str::FromStr;

use instant_xml::{FromXml, ToXml};

use super::{ContactAuthInfo, Fax, Status, Voice, XMLNS};
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::Txn;
use crate::xml::format_time;

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "info", ns(XMLNS))]
pub struct ContactInfo {
    pub id: Option<String>,
    pub auth_info: Option<ContactAuthInfo>,
}

// Response

#[derive(Debug, ToXml)]
#[xml(rename = "addr", ns(XMLNS))]
pub struct AddressData {
    pub street: Vec<String>,
    pub city: String,
    #[xml(rename = "sp")]
    pub province: Option<String>,
    #[xml(rename = "pc")]
    pub postal_code: String,
    #[xml(rename = "cc")]
    pub country: String,
}

/// One `<postalInfo>` block, tagged `loc` the way the registry stores it.
#[derive(Debug, ToXml)]
#[xml(rename = "postalInfo", ns(XMLNS))]
pub struct PostalInfoData {
    #[xml(rename = "type", attribute)]
    pub info_type: &'static str,
    pub name: String,
    #[xml(rename = "org")]
    pub organization: Option<String>,
    #[xml(rename = "addr")]
    pub address: AddressData,
}

/// The `<infData>` tag for contact info responses
#[derive(Debug, ToXml)]
#[xml(rename = "infData", ns(XMLNS))]
pub struct InfoData {
    pub id: String,
    pub roid: String,
    pub statuses: Vec<Status>,
    pub postal_info: PostalInfoData,
    pub voice: Option<Voice>,
    pub fax: Option<Fax>,
    pub email: String,
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
    request: &ContactInfo,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    let Some(id) = request.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    };

    let Some(contact) = txn.contact(id).await? else {
        return Reply::new(ResultCode::ObjectDoesNotExist, &ctx.tr_ids);
    };

    let data = InfoData {
        roid: format!("{}-REP", contact.handle),
        id: contact.handle,
        statuses: contact
            .statuses
            .iter()
            .filter_map(|s| Status::from_str(s).ok())
            .collect(),
        postal_info: PostalInfoData {
            info_type: "loc",
            name: contact.name,
            organization: contact.organization,
            address: AddressData {
                street: contact.street,
                city: contact.city,
                province: contact.province,
                postal_code: contact.postal_code,
                country: contact.country_code,
            },
        },
        voice: Some(Voice {
            extension: None,
            number: contact.voice,
        }),
        fax: contact.fax.map(|number| Fax {
            extension: None,
            number,
        }),
        email: contact.email,
        client_id: contact.client_id.clone(),
        creator_id: contact.client_id,
        created_at: format_time(contact.created_at),
        updated_at: contact.updated_at.map(format_time),
    };

    Reply::with_data(ResultCode::CommandCompletedSuccessfully, data, &ctx.tr_ids)
}
