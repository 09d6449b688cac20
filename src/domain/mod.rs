//! Handlers and wire mappings for EPP domain objects
//!
//! As described in [RFC 5731](https://tools.ietf.org/html/rfc5731).

use std::fmt;
use std::str::FromStr;

use instant_xml::{Deserializer, FromXml, Serializer, ToXml};

pub mod check;
pub mod create;
pub mod delete;
pub mod info;
pub mod renew;
pub mod transfer;
pub mod update;

pub const XMLNS: &str = "urn:ietf:params:xml:ns:domain-1.0";

/// The `<period>` element on create, renew and transfer requests
#[derive(Clone, Debug, FromXml)]
#[xml(rename = "period", ns(XMLNS))]
pub struct Period {
    /// The interval unit; only years are served
    #[xml(attribute)]
    pub unit: Option<String>,
    #[xml(direct)]
    pub length: u8,
}

impl Period {
    /// The registration period in years, or `None` when the length or the
    /// unit is outside what this registry sells.
    pub fn years(&self) -> Option<u8> {
        match self.unit.as_deref() {
            Some("y") | None => (1..=99).contains(&self.length).then_some(self.length),
            Some(_) => None,
        }
    }
}

/// The `<authInfo>` element for domain transactions
#[derive(Clone, Debug, FromXml, ToXml)]
#[xml(rename = "authInfo", ns(XMLNS))]
pub struct DomainAuthInfo {
    /// The `<pw>` tag under `<authInfo>`
    #[xml(rename = "pw")]
    pub password: String,
}

/// A `<hostObj>` nameserver reference
#[derive(Clone, Debug, Eq, FromXml, PartialEq, ToXml)]
#[xml(rename = "hostObj", ns(XMLNS))]
pub struct HostObj {
    #[xml(direct)]
    pub name: String,
}

/// The `<ns>` block listing a domain's nameserver hosts
#[derive(Clone, Debug, FromXml, ToXml)]
#[xml(rename = "ns", ns(XMLNS))]
pub struct NameServers {
    #[xml(rename = "hostObj")]
    pub hosts: Vec<HostObj>,
}

/// A role-tagged `<contact>` link on create and info
#[derive(Clone, Debug, FromXml, ToXml)]
#[xml(rename = "contact", ns(XMLNS))]
pub struct DomainContact {
    /// The contact type attr (admin, billing or tech)
    #[xml(attribute, rename = "type")]
    pub contact_type: String,
    /// The contact id
    #[xml(direct)]
    pub id: String,
}

/// The `<status>` type on domain transactions
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    ClientDeleteProhibited,
    ServerDeleteProhibited,
    ClientHold,
    ServerHold,
    ClientRenewProhibited,
    ServerRenewProhibited,
    ClientTransferProhibited,
    ServerTransferProhibited,
    ClientUpdateProhibited,
    ServerUpdateProhibited,
    Inactive,
    Ok,
    PendingCreate,
    PendingDelete,
    PendingRenew,
    PendingTransfer,
    PendingUpdate,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        use Status::*;
        match self {
            ClientDeleteProhibited => "clientDeleteProhibited",
            ServerDeleteProhibited => "serverDeleteProhibited",
            ClientHold => "clientHold",
            ServerHold => "serverHold",
            ClientRenewProhibited => "clientRenewProhibited",
            ServerRenewProhibited => "serverRenewProhibited",
            ClientTransferProhibited => "clientTransferProhibited",
            ServerTransferProhibited => "serverTransferProhibited",
            ClientUpdateProhibited => "clientUpdateProhibited",
            ServerUpdateProhibited => "serverUpdateProhibited",
            Inactive => "inactive",
            Ok => "ok",
            PendingCreate => "pendingCreate",
            PendingDelete => "pendingDelete",
            PendingRenew => "pendingRenew",
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
            "clientHold" => Status::ClientHold,
            "serverHold" => Status::ServerHold,
            "clientRenewProhibited" => Status::ClientRenewProhibited,
            "serverRenewProhibited" => Status::ServerRenewProhibited,
            "clientTransferProhibited" => Status::ClientTransferProhibited,
            "serverTransferProhibited" => Status::ServerTransferProhibited,
            "clientUpdateProhibited" => Status::ClientUpdateProhibited,
            "serverUpdateProhibited" => Status::ServerUpdateProhibited,
            "inactive" => Status::Inactive,
            "ok" => Status::Ok,
            "pendingCreate" => Status::PendingCreate,
            "pendingDelete" => Status::PendingDelete,
            "pendingRenew" => Status::PendingRenew,
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

/// Repository object identifier for domains and hosts:
/// the uppercased identity with dots replaced by hyphens, suffixed with the
/// server identifier.
pub(crate) fn roid(identity: &str, server_id: &str) -> String {
    format!("{}-{}", identity.to_uppercase().replace('.', "-"), server_id)
}
