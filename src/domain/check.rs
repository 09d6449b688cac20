//! Types for EPP domain check

use instant_xml::{FromXml, ToXml};

use super::XMLNS;
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::Txn;

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "check", ns(XMLNS))]
pub struct DomainCheck {
    #[xml(rename = "name")]
    pub names: Vec<String>,
}

// Response

#[derive(Debug, ToXml)]
#[xml(rename = "name", ns(XMLNS))]
pub struct Checked {
    #[xml(attribute)]
    pub avail: u8,
    #[xml(direct)]
    pub name: String,
}

#[derive(Debug, ToXml)]
#[xml(rename = "reason", ns(XMLNS))]
pub struct Reason {
    #[xml(direct)]
    pub value: String,
}

#[derive(Debug, ToXml)]
#[xml(rename = "cd", ns(XMLNS))]
pub struct CheckedDomain {
    pub name: Checked,
    pub reason: Option<Reason>,
}

/// The `<chkData>` tag for domain check responses
#[derive(Debug, ToXml)]
#[xml(rename = "chkData", ns(XMLNS))]
pub struct CheckData {
    pub list: Vec<CheckedDomain>,
}

/// Availability is simple non-existence; names are lowercased before lookup.
pub(crate) async fn handle(
    request: &DomainCheck,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    if request.names.is_empty() {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    }

    let mut list = Vec::with_capacity(request.names.len());
    for name in &request.names {
        let name = name.trim().to_lowercase();
        let exists = txn.domain(&name).await?.is_some();
        list.push(CheckedDomain {
            name: Checked {
                avail: u8::from(!exists),
                name,
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
