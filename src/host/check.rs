//! Types for EPP host check

use instant_xml::{FromXml, ToXml};

use super::{is_valid_hostname, XMLNS};
use crate::dispatch::CommandContext;
use crate::error::Error;
use crate::response::{Reply, ResultCode};
use crate::store::Txn;

// Request

#[derive(Debug, FromXml)]
#[xml(rename = "check", ns(XMLNS))]
pub struct HostCheck {
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
pub struct CheckedHost {
    pub name: Checked,
    pub reason: Option<Reason>,
}

/// The `<chkData>` tag for host check responses
#[derive(Debug, ToXml)]
#[xml(rename = "chkData", ns(XMLNS))]
pub struct CheckData {
    pub list: Vec<CheckedHost>,
}

/// A name that fails RFC 952/1123 validation is reported unavailable with
/// its own reason instead of erroring the whole check.
pub(crate) async fn handle(
    request: &HostCheck,
    ctx: &CommandContext<'_>,
    txn: &mut Txn,
) -> Result<Reply, Error> {
    if request.names.is_empty() {
        return Reply::new(ResultCode::RequiredParameterMissing, &ctx.tr_ids);
    }

    let mut list = Vec::with_capacity(request.names.len());
    for name in &request.names {
        let name = name.trim().to_lowercase();
        let entry = if !is_valid_hostname(&name) {
            CheckedHost {
                name: Checked { avail: 0, name },
                reason: Some(Reason {
                    value: "Invalid hostname format".to_owned(),
                }),
            }
        } else {
            let exists = txn.host(&name).await?.is_some();
            CheckedHost {
                name: Checked {
                    avail: u8::from(!exists),
                    name,
                },
                reason: exists.then(|| Reason {
                    value: "In use".to_owned(),
                }),
            }
        };
        list.push(entry);
    }

    Reply::with_data(
        ResultCode::CommandCompletedSuccessfully,
        CheckData { list },
        &ctx.tr_ids,
    )
}
