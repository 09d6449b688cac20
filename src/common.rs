//! Shared types and helpers for EPP documents

use rand::Rng;

pub const EPP_XMLNS: &str = "urn:ietf:params:xml:ns:epp-1.0";

pub const OBJ_URIS: &[&str] = &[
    "urn:ietf:params:xml:ns:domain-1.0",
    "urn:ietf:params:xml:ns:contact-1.0",
    "urn:ietf:params:xml:ns:host-1.0",
];

/// Extension namespaces advertised in the greeting. Advertised only; no
/// extension handlers are wired up.
pub const EXT_URIS: &[&str] = &[
    "urn:ietf:params:xml:ns:rgp-1.0",
    "urn:ietf:params:xml:ns:secDNS-1.1",
];

/// Lower-case hex string from `bytes` random octets.
pub(crate) fn token_hex(bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(bytes * 2);
    for _ in 0..bytes {
        out.push_str(&format!("{:02x}", rng.gen::<u8>()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::token_hex;

    #[test]
    fn token_shape() {
        let token = token_hex(16);
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
