//! The server greeting (RFC 5730 section 2.4)
//!
//! Sent unsolicited on accept and again for every `<hello>`. The document
//! is fully server-controlled (identifier, clock, advertised namespaces)
//! and serializes through the same codec as every other response.

use std::fmt;

use chrono::Utc;
use instant_xml::{Serializer, ToXml};

use crate::common::{EPP_XMLNS, EXT_URIS, OBJ_URIS};
use crate::error::Error;
use crate::xml::{self, format_time};

pub(crate) fn greeting(server_id: &str) -> Result<String, Error> {
    xml::serialize(&Greeting {
        server_id,
        date: format_time(Utc::now()),
        svc_menu: SvcMenu {
            version: "1.0",
            lang: "en",
            obj_uris: OBJ_URIS,
            extension: SvcExtension { ext_uris: EXT_URIS },
        },
        dcp: Dcp {
            access: Access { all: All },
            statement: Statement {
                purpose: Purpose {
                    admin: Admin,
                    prov: Prov,
                },
                recipient: Recipient {
                    ours: Ours,
                    public: Public,
                },
                retention: Retention { stated: Stated },
            },
        },
    })
}

#[derive(Debug, ToXml)]
#[xml(rename = "greeting", ns(EPP_XMLNS))]
struct Greeting<'a> {
    #[xml(rename = "svID")]
    server_id: &'a str,
    #[xml(rename = "svDate")]
    date: String,
    svc_menu: SvcMenu,
    dcp: Dcp,
}

#[derive(Debug, ToXml)]
#[xml(rename = "svcMenu", ns(EPP_XMLNS))]
struct SvcMenu {
    version: &'static str,
    lang: &'static str,
    #[xml(rename = "objURI")]
    obj_uris: &'static [&'static str],
    extension: SvcExtension,
}

#[derive(Debug, ToXml)]
#[xml(rename = "svcExtension", ns(EPP_XMLNS))]
struct SvcExtension {
    #[xml(rename = "extURI")]
    ext_uris: &'static [&'static str],
}

/// The `<dcp>` data-collection policy block: full access, admin and
/// provisioning purposes, disclosure to us and the public, retention as
/// stated.
#[derive(Debug, ToXml)]
#[xml(rename = "dcp", ns(EPP_XMLNS))]
struct Dcp {
    access: Access,
    statement: Statement,
}

#[derive(Debug, ToXml)]
#[xml(rename = "access", ns(EPP_XMLNS))]
struct Access {
    all: All,
}

#[derive(Debug, ToXml)]
#[xml(rename = "statement", ns(EPP_XMLNS))]
struct Statement {
    purpose: Purpose,
    recipient: Recipient,
    retention: Retention,
}

#[derive(Debug, ToXml)]
#[xml(rename = "purpose", ns(EPP_XMLNS))]
struct Purpose {
    admin: Admin,
    prov: Prov,
}

#[derive(Debug, ToXml)]
#[xml(rename = "recipient", ns(EPP_XMLNS))]
struct Recipient {
    ours: Ours,
    public: Public,
}

#[derive(Debug, ToXml)]
#[xml(rename = "retention", ns(EPP_XMLNS))]
struct Retention {
    stated: Stated,
}

macro_rules! empty_tag {
    ($name:ident, $tag:literal) => {
        #[derive(Debug)]
        struct $name;

        impl ToXml for $name {
            fn serialize<W: fmt::Write + ?Sized>(
                &self,
                _: Option<instant_xml::Id<'_>>,
                serializer: &mut Serializer<W>,
            ) -> Result<(), instant_xml::Error> {
                serializer.write_start($tag, EPP_XMLNS)?;
                serializer.end_empty()
            }
        }
    };
}

empty_tag!(All, "all");
empty_tag!(Admin, "admin");
empty_tag!(Prov, "prov");
empty_tag!(Ours, "ours");
empty_tag!(Public, "public");
empty_tag!(Stated, "stated");
