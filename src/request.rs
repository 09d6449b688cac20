//! Types for parsing inbound EPP command documents
//!
//! The envelope is namespace-driven: the child of `<epp>` selects the message
//! kind, the child of `<command>` selects the verb, and the verb's payload is
//! selected by its object namespace (domain-1.0, contact-1.0 or host-1.0).
//! Catch-all variants keep dispatch total: an unrecognized verb or object
//! parses instead of failing, so the dispatcher can answer 2000/2101.

use instant_xml::{Deserializer, FromXml, Id, Kind};

use crate::common::EPP_XMLNS;
use crate::contact;
use crate::domain;
use crate::host;

/// The kinds of document a client may send after the greeting.
#[derive(Debug, FromXml)]
#[xml(forward)]
pub enum EppMessage {
    Hello(Hello),
    Command(Command),
    Extension(ExtensionFrame),
}

/// `<command>`: one verb, an optional extension block, an optional `<clTRID>`.
#[derive(Debug, FromXml)]
#[xml(rename = "command", ns(EPP_XMLNS))]
pub struct Command {
    pub verb: Verb,
    pub extension: Option<ExtensionFrame>,
    #[xml(rename = "clTRID")]
    pub client_tr_id: Option<String>,
}

#[derive(Debug, FromXml)]
#[xml(forward)]
pub enum Verb {
    Login(Login),
    Logout(Logout),
    Check(Check),
    Info(Info),
    Create(Create),
    Update(Update),
    Delete(Delete),
    Renew(Renew),
    Transfer(Transfer),
    Poll(Poll),
    Unknown(UnknownVerb),
}

#[derive(Debug, FromXml)]
#[xml(rename = "login", ns(EPP_XMLNS))]
pub struct Login {
    #[xml(rename = "clID")]
    pub client_id: Option<String>,
    #[xml(rename = "pw")]
    pub password: Option<String>,
    #[xml(rename = "newPW")]
    pub new_password: Option<String>,
    pub options: Option<LoginOptions>,
    pub svcs: Option<Services>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "options", ns(EPP_XMLNS))]
pub struct LoginOptions {
    pub version: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "svcs", ns(EPP_XMLNS))]
pub struct Services {
    #[xml(rename = "objURI")]
    pub object_uris: Vec<String>,
    #[xml(rename = "svcExtension")]
    pub extension: Option<ServiceExtension>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "svcExtension", ns(EPP_XMLNS))]
pub struct ServiceExtension {
    #[xml(rename = "extURI")]
    pub extension_uris: Vec<String>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "check", ns(EPP_XMLNS))]
pub struct Check {
    pub payload: Option<CheckPayload>,
}

#[derive(Debug, FromXml)]
#[xml(forward)]
pub enum CheckPayload {
    Domain(domain::check::DomainCheck),
    Contact(contact::check::ContactCheck),
    Host(host::check::HostCheck),
    Unknown(UnknownObject),
}

#[derive(Debug, FromXml)]
#[xml(rename = "info", ns(EPP_XMLNS))]
pub struct Info {
    pub payload: Option<InfoPayload>,
}

#[derive(Debug, FromXml)]
#[xml(forward)]
pub enum InfoPayload {
    Domain(domain::info::DomainInfo),
    Contact(contact::info::ContactInfo),
    Host(host::info::HostInfo),
    Unknown(UnknownObject),
}

#[derive(Debug, FromXml)]
#[xml(rename = "create", ns(EPP_XMLNS))]
pub struct Create {
    pub payload: Option<CreatePayload>,
}

#[derive(Debug, FromXml)]
#[xml(forward)]
pub enum CreatePayload {
    Domain(domain::create::DomainCreate),
    Contact(contact::create::ContactCreate),
    Host(host::create::HostCreate),
    Unknown(UnknownObject),
}

#[derive(Debug, FromXml)]
#[xml(rename = "update", ns(EPP_XMLNS))]
pub struct Update {
    pub payload: Option<UpdatePayload>,
}

#[derive(Debug, FromXml)]
#[xml(forward)]
pub enum UpdatePayload {
    Domain(domain::update::DomainUpdate),
    Contact(contact::update::ContactUpdate),
    Host(host::update::HostUpdate),
    Unknown(UnknownObject),
}

#[derive(Debug, FromXml)]
#[xml(rename = "delete", ns(EPP_XMLNS))]
pub struct Delete {
    pub payload: Option<DeletePayload>,
}

#[derive(Debug, FromXml)]
#[xml(forward)]
pub enum DeletePayload {
    Domain(domain::delete::DomainDelete),
    Contact(contact::delete::ContactDelete),
    Host(host::delete::HostDelete),
    Unknown(UnknownObject),
}

#[derive(Debug, FromXml)]
#[xml(rename = "renew", ns(EPP_XMLNS))]
pub struct Renew {
    pub payload: Option<RenewPayload>,
}

#[derive(Debug, FromXml)]
#[xml(forward)]
pub enum RenewPayload {
    Domain(domain::renew::DomainRenew),
    Unknown(UnknownObject),
}

/// `<transfer>` carries the operation in its `op` attribute; `query` when
/// absent.
#[derive(Debug, FromXml)]
#[xml(rename = "transfer", ns(EPP_XMLNS))]
pub struct Transfer {
    #[xml(attribute)]
    pub op: Option<String>,
    pub payload: Option<TransferPayload>,
}

#[derive(Debug, FromXml)]
#[xml(forward)]
pub enum TransferPayload {
    Domain(domain::transfer::DomainTransfer),
    Unknown(UnknownObject),
}

#[derive(Debug, FromXml)]
#[xml(rename = "poll", ns(EPP_XMLNS))]
pub struct Poll {
    #[xml(attribute)]
    pub op: Option<String>,
    #[xml(rename = "msgID", attribute)]
    pub message_id: Option<String>,
}

macro_rules! empty_element {
    ($name:ty, $tag:literal) => {
        impl<'xml> FromXml<'xml> for $name {
            fn matches(id: Id<'_>, _: Option<Id<'_>>) -> bool {
                id == Id {
                    ns: EPP_XMLNS,
                    name: $tag,
                }
            }

            fn deserialize<'cx>(
                into: &mut Self::Accumulator,
                _: &'static str,
                deserializer: &mut Deserializer<'cx, 'xml>,
            ) -> Result<(), instant_xml::Error> {
                deserializer.ignore()?;
                *into = Some(Self);
                Ok(())
            }

            type Accumulator = Option<Self>;
            const KIND: Kind = Kind::Element;
        }
    };
}

/// `<hello/>`: request to re-emit the greeting.
#[derive(Debug)]
pub struct Hello;
empty_element!(Hello, "hello");

/// `<logout/>`: end the session.
#[derive(Debug)]
pub struct Logout;
empty_element!(Logout, "logout");

/// An `<extension>` block, either at the top level or inside `<command>`.
/// No extensions are implemented; the content is consumed and discarded.
#[derive(Debug)]
pub struct ExtensionFrame;
empty_element!(ExtensionFrame, "extension");

/// Catch-all for a verb element this server does not recognize. Matches any
/// element in the EPP namespace other than the `<command>` children handled
/// elsewhere, so `<command>` parsing stays total.
#[derive(Debug)]
pub struct UnknownVerb;

impl<'xml> FromXml<'xml> for UnknownVerb {
    fn matches(id: Id<'_>, _: Option<Id<'_>>) -> bool {
        id.ns == EPP_XMLNS && !matches!(id.name, "clTRID" | "extension")
    }

    fn deserialize<'cx>(
        into: &mut Self::Accumulator,
        _: &'static str,
        deserializer: &mut Deserializer<'cx, 'xml>,
    ) -> Result<(), instant_xml::Error> {
        deserializer.ignore()?;
        *into = Some(Self);
        Ok(())
    }

    type Accumulator = Option<Self>;
    const KIND: Kind = Kind::Element;
}

/// Catch-all for an object payload in a namespace this server does not serve.
#[derive(Debug)]
pub struct UnknownObject;

impl<'xml> FromXml<'xml> for UnknownObject {
    fn matches(_: Id<'_>, _: Option<Id<'_>>) -> bool {
        true
    }

    fn deserialize<'cx>(
        into: &mut Self::Accumulator,
        _: &'static str,
        deserializer: &mut Deserializer<'cx, 'xml>,
    ) -> Result<(), instant_xml::Error> {
        deserializer.ignore()?;
        *into = Some(Self);
        Ok(())
    }

    type Accumulator = Option<Self>;
    const KIND: Kind = Kind::Element;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    fn epp(body: &str) -> String {
        format!("<epp xmlns='urn:ietf:params:xml:ns:epp-1.0'>{body}</epp>")
    }

    #[test]
    fn login_command() {
        let input = epp(
            "<command><login><clID>RG1</clID><pw>hunter2</pw>\
             <options><version>1.0</version><lang>en</lang></options>\
             <svcs><objURI>urn:ietf:params:xml:ns:domain-1.0</objURI></svcs>\
             </login><clTRID>cl-1</clTRID></command>",
        );

        let message = xml::deserialize::<EppMessage>(&input).unwrap();
        let EppMessage::Command(command) = message else {
            panic!("expected command");
        };
        assert_eq!(command.client_tr_id.as_deref(), Some("cl-1"));
        let Verb::Login(login) = command.verb else {
            panic!("expected login");
        };
        assert_eq!(login.client_id.as_deref(), Some("RG1"));
        assert_eq!(login.password.as_deref(), Some("hunter2"));
        let services = login.svcs.unwrap();
        assert_eq!(services.object_uris.len(), 1);
    }

    #[test]
    fn hello_document() {
        let message = xml::deserialize::<EppMessage>(&epp("<hello/>")).unwrap();
        assert!(matches!(message, EppMessage::Hello(_)));
    }

    #[test]
    fn check_routes_by_namespace() {
        let input = epp(
            "<command><check>\
             <domain:check xmlns:domain='urn:ietf:params:xml:ns:domain-1.0'>\
             <domain:name>example.test</domain:name>\
             <domain:name>other.test</domain:name>\
             </domain:check></check><clTRID>cl-2</clTRID></command>",
        );

        let message = xml::deserialize::<EppMessage>(&input).unwrap();
        let EppMessage::Command(command) = message else {
            panic!("expected command");
        };
        let Verb::Check(check) = command.verb else {
            panic!("expected check");
        };
        let Some(CheckPayload::Domain(check)) = check.payload else {
            panic!("expected domain payload");
        };
        assert_eq!(check.names, vec!["example.test", "other.test"]);
    }

    #[test]
    fn unknown_object_namespace() {
        let input = epp(
            "<command><check>\
             <funds:check xmlns:funds='urn:example:funds-1.0'><funds:id>x</funds:id></funds:check>\
             </check></command>",
        );

        let message = xml::deserialize::<EppMessage>(&input).unwrap();
        let EppMessage::Command(command) = message else {
            panic!("expected command");
        };
        let Verb::Check(check) = command.verb else {
            panic!("expected check");
        };
        assert!(matches!(check.payload, Some(CheckPayload::Unknown(_))));
    }

    #[test]
    fn transfer_op_attribute() {
        let input = epp(
            "<command><transfer op='request'>\
             <domain:transfer xmlns:domain='urn:ietf:params:xml:ns:domain-1.0'>\
             <domain:name>example.test</domain:name>\
             <domain:authInfo><domain:pw>pw1</domain:pw></domain:authInfo>\
             </domain:transfer></transfer></command>",
        );

        let message = xml::deserialize::<EppMessage>(&input).unwrap();
        let EppMessage::Command(command) = message else {
            panic!("expected command");
        };
        let Verb::Transfer(transfer) = command.verb else {
            panic!("expected transfer");
        };
        assert_eq!(transfer.op.as_deref(), Some("request"));
        let Some(TransferPayload::Domain(payload)) = transfer.payload else {
            panic!("expected domain payload");
        };
        assert_eq!(payload.name.as_deref(), Some("example.test"));
        assert_eq!(
            payload.auth_info.map(|auth| auth.password),
            Some("pw1".to_string())
        );
    }

    #[test]
    fn update_blocks() {
        let input = epp(
            "<command><update>\
             <domain:update xmlns:domain='urn:ietf:params:xml:ns:domain-1.0'>\
             <domain:name>example.test</domain:name>\
             <domain:add><domain:ns><domain:hostObj>ns1.example.test</domain:hostObj></domain:ns>\
             <domain:status s='clientDeleteProhibited'/></domain:add>\
             <domain:rem><domain:status s='clientHold'/></domain:rem>\
             <domain:chg><domain:registrant>C2</domain:registrant>\
             <domain:authInfo><domain:pw>pw2</domain:pw></domain:authInfo></domain:chg>\
             </domain:update></update><clTRID>cl-3</clTRID></command>",
        );

        let message = xml::deserialize::<EppMessage>(&input).unwrap();
        let EppMessage::Command(command) = message else {
            panic!("expected command");
        };
        let Verb::Update(update) = command.verb else {
            panic!("expected update");
        };
        let Some(UpdatePayload::Domain(update)) = update.payload else {
            panic!("expected domain payload");
        };
        let add = update.add.unwrap();
        assert_eq!(add.ns.unwrap().hosts[0].name, "ns1.example.test");
        assert_eq!(add.statuses, vec![domain::Status::ClientDeleteProhibited]);
        assert_eq!(
            update.rem.unwrap().statuses,
            vec![domain::Status::ClientHold]
        );
        let chg = update.chg.unwrap();
        assert_eq!(chg.registrant.as_deref(), Some("C2"));
        assert_eq!(chg.auth_info.unwrap().password, "pw2");
    }

    #[test]
    fn empty_epp_document_fails() {
        assert!(xml::deserialize::<EppMessage>("<epp/>").is_err());
    }
}
