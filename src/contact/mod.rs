//! Handlers and wire mappings for EPP contact objects
//!
//! As described in [RFC 5733](https://tools.ietf.org/html/rfc5733).

use std::fmt;
use std::str::FromStr;

use instant_xml::{Deserializer, FromXml, Serializer, ToXml};

pub mod check;
pub mod create;
pub mod delete;
pub mod info;
pub mod update;

pub const XMLNS: &str = "urn:ietf:params:xml:ns:contact-1.0";

/// The `<authInfo>` element for contact transactions
#[derive(Clone, Debug, FromXml, ToXml)]
#[xml(rename = "authInfo", ns(XMLNS))]
pub struct ContactAuthInfo {
    /// The `<pw>` tag under `<authInfo>`
    #[xml(rename = "pw")]
    pub password: String,
}

/// The `<voice>` element on contact transactions
#[derive(Clone, Debug, FromXml, PartialEq, ToXml)]
#[xml(rename = "voice", ns(XMLNS))]
pub struct Voice {
    /// The value of the 'x' attr on `<voice>` and `<fax>` tags
    #[xml(rename = "x", attribute)]
    pub extension: Option<String>,
    /// The inner text on the `<voice>` and `<fax>` tags
    #[xml(direct)]
    pub number: String,
}

/// The `<fax>` element on contact transactions
#[derive(Clone, Debug, FromXml, PartialEq, ToXml)]
#[xml(rename = "fax", ns(XMLNS))]
pub struct Fax {
    #[xml(rename = "x", attribute)]
    pub extension: Option<String>,
    #[xml(direct)]
    pub number: String,
}

/// The `<addr>` block as received on create and update requests.
///
/// Everything is optional at the XML layer; the handlers decide which
/// absences are 2003 (create) and which mean "leave unchanged" (update).
#[derive(Clone, Debug, FromXml)]
#[xml(rename = "addr", ns(XMLNS))]
pub struct Address {
    pub street: Vec<String>,
    pub city: Option<String>,
    #[xml(rename = "sp")]
    pub province: Option<String>,
    #[xml(rename = "pc")]
    pub postal_code: Option<String>,
    #[xml(rename = "cc")]
    pub country: Option<String>,
}

/// The `<postalInfo>` block as received on create and update requests
#[derive(Clone, Debug, FromXml)]
#[xml(rename = "postalInfo", ns(XMLNS))]
pub struct PostalInfo {
    /// The 'type' attr (`loc` or `int`)
    #[xml(rename = "type", attribute)]
    pub info_type: Option<String>,
    pub name: Option<String>,
    #[xml(rename = "org")]
    pub organization: Option<String>,
    #[xml(rename = "addr")]
    pub address: Option<Address>,
}

/// Uppercased ISO 3166 alpha-2 code, or `None` for anything celes does not
/// recognize.
pub(crate) fn validate_country(code: &str) -> Option<String> {
    celes::Country::from_str(code.trim())
        .ok()
        .map(|country| country.alpha2.to_owned())
}

/// The `<status>` type on contact transactions
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    ClientDeleteProhibited,
    ServerDeleteProhibited,
    ClientTransferProhibited,
    ServerTransferProhibited,
    ClientUpdateProhibited,
    ServerUpdateProhibited,
    Linked,
    Ok,
    PendingCreate,
    PendingDelete,
    PendingTransfer,
    PendingUpdate,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        use Status::*;
        match self {
            ClientDeleteProhibited => "clientDeleteProhibited",
            ServerDeleteProhibited => "serverDeleteProhibited",
            ClientTransferProhibited => "clientTransferProhibited",
            ServerTransferProhibited => "serverTransferProhibited",
            ClientUpdateProhibited => "clientUpdateProhibited",
            ServerUpdateProhibited => "serverUpdateProhibited",
            Linked => "linked",
            Ok => "ok",
            PendingCreate => "pendingCreate",
            PendingDelete => "pendingDelete",
            PendingTransfer => "pendingTransfer",
            PendingUpdate => "pendingUpdate",
        }
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "clientDeleteProhibited" => Status::ClientDeleteProhibited,
            "serverDeleteProhibited" => Status::ServerDeleteProhibited,
            "clientTransferProhibited" => Status::ClientTransferProhibited,
            "serverTransferProhibited" => Status::ServerTransferProhibited,
            "clientUpdateProhibited" => Status::ClientUpdateProhibited,
            "serverUpdateProhibited" => Status::ServerUpdateProhibited,
            "linked" => Status::Linked,
            "ok" => Status::Ok,
            "pendingCreate" => Status::PendingCreate,
            "pendingDelete" => Status::PendingDelete,
            "pendingTransfer" => Status::PendingTransfer,
            "pendingUpdate" => Status::PendingUpdate,
            _ => return Err(()),
        })
    }
}

impl ToXml for Status {
    fn serialize<W: fmt::Write + ?Sized>(
        &self,
        _: Option<instant_xml::Id<'_>>,
        serializer: &mut Serializer<W>,
    ) -> Result<(), instant_xml::Error> {
        serializer.write_start("status", XMLNS)?;
        serializer.write_attr("s", XMLNS, &self.as_str())?;
        serializer.end_empty()
    }
}

impl<'xml> FromXml<'xml> for Status {
    fn matches(id: instant_xml::Id<'_>, _: Option<instant_xml::Id<'_>>) -> bool {
        id == instant_xml::Id {
            ns: XMLNS,
            name: "status",
        }
    }

    fn deserialize<'cx>(
        into: &mut Self::Accumulator,
        field: &'static str,
        deserializer: &mut Deserializer<'cx, 'xml>,
    ) -> Result<(), instant_xml::Error> {
        use instant_xml::de::Node;
        use instant_xml::{Error, Id};

        let node = match deserializer.next() {
            Some(result) => result?,
            None => return Err(Error::MissingValue(field)),
        };

        let attr = match node {
            Node::Attribute(attr) => attr,
            Node::Open(_) | Node::Text(_) => return Err(Error::MissingValue(field)),
            node => return Err(Error::UnexpectedNode(format!("{node:?} in Status"))),
        };

        let id = deserializer.attribute_id(&attr)?;
        let expected = Id { ns: "", name: "s" };
        if id != expected {
            return Err(Error::MissingValue(field));
        }

        *into = Some(
            Status::from_str(&attr.value)
                .map_err(|()| Error::UnexpectedValue(format!("invalid status {:?}", attr.value)))?,
        );

        deserializer.ignore()?;
        Ok(())
    }

    type Accumulator = Option<Status>;
    const KIND: instant_xml::Kind = instant_xml::Kind::Element;
}
