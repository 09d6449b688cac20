//! Types for building EPP responses

use std::borrow::Cow;

use instant_xml::ToXml;

use crate::common::{token_hex, EPP_XMLNS};
use crate::error::Error;
use crate::xml;

/// Response codes as enumerated in section 3 of RFC 5730
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResultCode {
    CommandCompletedSuccessfully = 1000,
    CommandCompletedSuccessfullyActionPending = 1001,
    CommandCompletedSuccessfullyEndingSession = 1500,
    UnknownCommand = 2000,
    CommandSyntaxError = 2001,
    CommandUseError = 2002,
    RequiredParameterMissing = 2003,
    ParameterValueRangeError = 2004,
    ParameterValueSyntaxError = 2005,
    UnimplementedCommand = 2101,
    UnimplementedOption = 2102,
    AuthorizationError = 2201,
    InvalidAuthorizationInformation = 2202,
    ObjectExists = 2302,
    ObjectDoesNotExist = 2303,
    ObjectStatusProhibitsOperation = 2304,
    ObjectAssociationProhibitsOperation = 2305,
    ParameterValuePolicyError = 2306,
    CommandFailed = 2400,
}

impl ResultCode {
    pub fn is_success(&self) -> bool {
        use ResultCode::*;
        matches!(
            self,
            CommandCompletedSuccessfully
                | CommandCompletedSuccessfullyActionPending
                | CommandCompletedSuccessfullyEndingSession
        )
    }

    /// The standard `<msg>` text for this code
    pub fn message(&self) -> &'static str {
        use ResultCode::*;
        match self {
            CommandCompletedSuccessfully => "Command completed successfully",
            CommandCompletedSuccessfullyActionPending => {
                "Command completed successfully; action pending"
            }
            CommandCompletedSuccessfullyEndingSession => {
                "Command completed successfully; ending session"
            }
            UnknownCommand => "Unknown command",
            CommandSyntaxError => "Command syntax error",
            CommandUseError => "Command use error",
            RequiredParameterMissing => "Required parameter missing",
            ParameterValueRangeError => "Parameter value range error",
            ParameterValueSyntaxError => "Parameter value syntax error",
            UnimplementedCommand => "Unimplemented command",
            UnimplementedOption => "Unimplemented option",
            AuthorizationError => "Authorization error",
            InvalidAuthorizationInformation => "Invalid authorization information",
            ObjectExists => "Object exists",
            ObjectDoesNotExist => "Object does not exist",
            ObjectStatusProhibitsOperation => "Object status prohibits operation",
            ObjectAssociationProhibitsOperation => "Object association prohibits operation",
            ParameterValuePolicyError => "Parameter value policy error",
            CommandFailed => "Command failed",
        }
    }
}

/// Transaction identifiers for one response: the echoed `<clTRID>` (when the
/// request carried one) and a fresh server-generated `<svTRID>`.
#[derive(Debug)]
pub struct TrIds {
    pub client: Option<String>,
    pub server: String,
}

impl TrIds {
    pub fn new(client: Option<String>) -> Self {
        Self {
            client,
            server: server_tr_id(),
        }
    }
}

fn server_tr_id() -> String {
    token_hex(16)
}

#[derive(Debug, ToXml)]
#[xml(rename = "result", ns(EPP_XMLNS))]
struct EppResult<'a> {
    #[xml(attribute)]
    code: u16,
    #[xml(rename = "msg")]
    message: Cow<'a, str>,
}

#[derive(Debug, ToXml)]
#[xml(rename = "resData", ns(EPP_XMLNS))]
struct ResData<T> {
    data: T,
}

#[derive(Debug, ToXml)]
#[xml(rename = "trID", ns(EPP_XMLNS))]
struct ResponseTrid<'a> {
    #[xml(rename = "clTRID")]
    client: Option<&'a str>,
    #[xml(rename = "svTRID")]
    server: &'a str,
}

#[derive(Debug, ToXml)]
#[xml(rename = "response", ns(EPP_XMLNS))]
struct ResponseDocument<'a, T> {
    result: EppResult<'a>,
    res_data: Option<ResData<T>>,
    tr_ids: ResponseTrid<'a>,
}

/// A fully serialized response frame payload plus the code it carries.
///
/// The dispatcher commits or rolls back the command transaction based on
/// `code`, then hands `xml` to the frame codec unchanged.
#[derive(Debug)]
pub struct Reply {
    pub code: ResultCode,
    pub xml: String,
}

impl Reply {
    /// A response with the code's standard message and no `<resData>`.
    pub(crate) fn new(code: ResultCode, tr_ids: &TrIds) -> Result<Self, Error> {
        Self::build::<NoData>(code, code.message().into(), None, tr_ids)
    }

    /// A response with an overridden `<msg>` text.
    pub(crate) fn with_message(
        code: ResultCode,
        message: impl Into<Cow<'static, str>>,
        tr_ids: &TrIds,
    ) -> Result<Self, Error> {
        Self::build::<NoData>(code, message.into(), None, tr_ids)
    }

    /// A response carrying object data under `<resData>`.
    pub(crate) fn with_data(
        code: ResultCode,
        data: impl ToXml,
        tr_ids: &TrIds,
    ) -> Result<Self, Error> {
        Self::build(code, code.message().into(), Some(data), tr_ids)
    }

    fn build<T: ToXml>(
        code: ResultCode,
        message: Cow<'_, str>,
        data: Option<T>,
        tr_ids: &TrIds,
    ) -> Result<Self, Error> {
        let document = ResponseDocument {
            result: EppResult {
                code: code as u16,
                message,
            },
            res_data: data.map(|data| ResData { data }),
            tr_ids: ResponseTrid {
                client: tr_ids.client.as_deref(),
                server: &tr_ids.server,
            },
        };

        Ok(Self {
            code,
            xml: xml::serialize(&document)?,
        })
    }
}

/// Placeholder for responses without `<resData>`; serializes to nothing.
#[derive(Debug)]
pub(crate) struct NoData;

impl ToXml for NoData {
    fn serialize<W: std::fmt::Write + ?Sized>(
        &self,
        _: Option<instant_xml::Id<'_>>,
        _: &mut instant_xml::Serializer<W>,
    ) -> Result<(), instant_xml::Error> {
        Ok(())
    }
}
