//! Helpers for serialization to and deserialization from EPP XML

use chrono::{DateTime, SecondsFormat, Utc};
use instant_xml::{FromXml, FromXmlOwned, ToXml};

use crate::common::EPP_XMLNS;
use crate::error::Error;

pub const EPP_XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#;

pub(crate) fn serialize(data: impl ToXml) -> Result<String, Error> {
    Ok(format!(
        "{}\r\n{}",
        EPP_XML_HEADER,
        instant_xml::to_string(&Epp { data }).map_err(Error::Xml)?
    ))
}

pub(crate) fn deserialize<T: FromXmlOwned>(xml: &str) -> Result<T, Error> {
    match instant_xml::from_str::<Epp<T>>(xml) {
        Ok(Epp { data }) => Ok(data),
        Err(e) => Err(Error::Xml(e)),
    }
}

#[derive(FromXml, ToXml)]
#[xml(rename = "epp", ns(EPP_XMLNS))]
pub(crate) struct Epp<T> {
    pub(crate) data: T,
}

/// Renders a timestamp the way EPP responses carry them.
pub(crate) fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
