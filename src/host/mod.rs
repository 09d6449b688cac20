//! Handlers and wire mappings for EPP host objects
//!
//! As described in [RFC 5732](https://tools.ietf.org/html/rfc5732).

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use instant_xml::{Deserializer, FromXml, Serializer, ToXml};

pub mod check;
pub mod create;
pub mod delete;
pub mod info;
pub mod update;

pub const XMLNS: &str = "urn:ietf:params:xml:ns:host-1.0";

/// The `<addr>` element on host transactions
#[derive(Clone, Debug, FromXml, ToXml)]
#[xml(rename = "addr", ns(XMLNS))]
pub struct HostAddr {
    #[xml(attribute, rename = "ip")]
    pub ip_version: Option<String>,
    #[xml(direct)]
    pub address: String,
}

impl From<&IpAddr> for HostAddr {
    fn from(addr: &IpAddr) -> Self {
        Self {
            ip_version: Some(
                match addr {
                    IpAddr::V4(_) => "v4",
                    IpAddr::V6(_) => "v6",
                }
                .to_owned(),
            ),
            address: addr.to_string(),
        }
    }
}

/// Parses a wire address, requiring the parsed family to match the `ip`
/// version tag (`v4` when absent).
pub(crate) fn parse_addr(addr: &HostAddr) -> Option<IpAddr> {
    let parsed: IpAddr = addr.address.trim().parse().ok()?;
    match (addr.ip_version.as_deref(), parsed) {
        (Some("v4") | None, IpAddr::V4(_)) => Some(parsed),
        (Some("v6"), IpAddr::V6(_)) => Some(parsed),
        _ => None,
    }
}

/// RFC 952/1123 shape: at least two labels of 1-63 characters, letters,
/// digits and interior hyphens only, 255 characters overall.
pub(crate) fn is_valid_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > 255 {
        return false;
    }
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

/// The `<status>` type on host transactions
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    ClientDeleteProhibited,
    ServerDeleteProhibited,
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
            "clientDeleteProhibited" => Self::ClientDeleteProhibited,
            "serverDeleteProhibited" => Self::ServerDeleteProhibited,
            "clientUpdateProhibited" => Self::ClientUpdateProhibited,
            "serverUpdateProhibited" => Self::ServerUpdateProhibited,
            "linked" => Self::Linked,
            "ok" => Self::Ok,
            "pendingCreate" => Self::PendingCreate,
            "pendingDelete" => Self::PendingDelete,
            "pendingTransfer" => Self::PendingTransfer,
            "pendingUpdate" => Self::PendingUpdate,
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

    type Accumulator = Option<Self>;
    const KIND: instant_xml::Kind = instant_xml::Kind::Element;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_shapes() {
        assert!(is_valid_hostname("ns1.example.test"));
        assert!(is_valid_hostname("a-b.example"));
        assert!(!is_valid_hostname("bare"));
        assert!(!is_valid_hostname("-bad.example.test"));
        assert!(!is_valid_hostname("bad-.example.test"));
        assert!(!is_valid_hostname("under_score.example"));
        assert!(!is_valid_hostname("dot..dot"));
        assert!(!is_valid_hostname(""));
        let long_label = format!("{}.example", "a".repeat(64));
        assert!(!is_valid_hostname(&long_label));
    }

    #[test]
    fn addr_versions_must_agree() {
        let v4 = HostAddr {
            ip_version: Some("v4".to_owned()),
            address: "192.0.2.1".to_owned(),
        };
        assert!(parse_addr(&v4).is_some());

        let untagged = HostAddr {
            ip_version: None,
            address: "192.0.2.300".to_owned(),
        };
        assert!(parse_addr(&untagged).is_none());

        let v6 = HostAddr {
            ip_version: Some("v6".to_owned()),
            address: "2001:db8::1".to_owned(),
        };
        assert!(parse_addr(&v6).is_some());

        let mismatched = HostAddr {
            ip_version: Some("v6".to_owned()),
            address: "192.0.2.1".to_owned(),
        };
        assert!(parse_addr(&mismatched).is_none());
    }
}
