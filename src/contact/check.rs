//! Types for EPP contact check

use instant_xml::{FromXml, ToXml};

use super::XMLNS;
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::Txn;

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "check", ns(XMLNS))]
pub struct ContactCheck {
    #[xml(rename = "id")]
    pub ids: Vec<String>,
}

// Response

#[derive(Debug, ToXml)]
#[xml(rename = "id", ns(XMLNS))]
pub struct Checked {
    #[xml(attribute)]
    pub avail: u8,
    #[xml(direct)]
    pub id: String,
}

#[derive(Debug, ToXml)]
#[xml(rename = "reason", ns(XMLNS))]
pub struct Reason {
    #[xml(direct)]
    pub value: String,
}

#[derive(Debug, ToXml)]
#[xml(rename = "cd", ns(XMLNS))]
pub struct CheckedContact {
    pub id: Checked,
    pub reason: Option<Reason>,
}

/// The `<chkData>` tag for contact check responses
#[derive(Debug, ToXml)]
#[xml(rename = "chkData", ns(XMLNS))]
pub struct CheckData {
    pub list: Vec<CheckedContact>,
}

/// Handles are case-sensitive on the wire and looked up as sent.
pub(crate) async fn handle(
    request: &ContactCheck,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    if request.ids.is_empty() {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    }

    let mut list = Vec::with_capacity(request.ids.len());
    for id in &request.ids {
        let id = id.trim();
        let exists = txn.contact(id).await?.is_some();
        list.push(CheckedContact {
            id: Checked {
                avail: u8::from(!exists),
                id: id.to_owned(),
            },
            reason: exists.then(|| Reason {
                value: "In use".to_owned(),
            }),
        });
    }

    Reply::with_data(
        ResultCode::CommandCompletedSuccessfully,
        CheckData { list },
        &ctx.tr_ids,
    )
}
