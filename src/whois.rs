//! RFC 3912 WHOIS front end
//!
//! One CRLF-terminated query per connection, a text response, close. Reads
//! the same store as EPP; delegation data comes from the normalized
//! nameserver association table.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::Error;
use crate::store::Store;
use crate::xml::format_time;

const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn serve(
    listener: TcpListener,
    store: Store,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Error> {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let store = store.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle(stream, &store).await {
                        warn!(%peer, error = %err, "whois query failed");
                    }
                });
            }
            _ = shutdown.changed() => return Ok(()),
        }
    }
}

async fn handle(stream: TcpStream, store: &Store) -> Result<(), Error> {
    let mut stream = BufReader::new(stream);
    let mut line = String::new();
    match timeout(QUERY_TIMEOUT, stream.read_line(&mut line)).await {
        Ok(read) => {
            read?;
        }
        Err(_) => return Err(Error::Timeout),
    }

    let query = line.trim();
    info!(%query, "whois query");
    let response = lookup(store, query).await?;
    let stream = stream.get_mut();
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Resolves a query against domains, then hosts, then contact handles.
pub async fn lookup(store: &Store, query: &str) -> Result<String, Error> {
    let query = query.trim();
    if query.is_empty() {
        return Ok("% Empty query\r\n".to_owned());
    }

    let mut txn = store.begin().await?;
    let lowered = query.to_lowercase();

    if let Some(domain) = txn.domain(&lowered).await? {
        let nameservers = txn.domain_nameservers(&lowered).await?;
        let mut out = String::new();
        out.push_str(&format!("Domain Name: {}\r\n", domain.name.to_uppercase()));
        out.push_str(&format!("Sponsoring Registrar: {}\r\n", domain.client_id));
        if let Some(registrant) = &domain.registrant {
            out.push_str(&format!("Registrant ID: {registrant}\r\n"));
        }
        out.push_str(&format!(
            "Creation Date: {}\r\n",
            format_time(domain.created_at)
        ));
        if let Some(updated_at) = domain.updated_at {
            out.push_str(&format!("Updated Date: {}\r\n", format_time(updated_at)));
        }
        out.push_str(&format!(
            "Registry Expiry Date: {}\r\n",
            format_time(domain.expires_at)
        ));
        for status in &domain.statuses {
            out.push_str(&format!("Domain Status: {status}\r\n"));
        }
        for nameserver in nameservers {
            out.push_str(&format!("Name Server: {}\r\n", nameserver.to_uppercase()));
        }
        out.push_str(&trailer());
        return Ok(out);
    }

    if let Some(host) = txn.host(&lowered).await? {
        let addresses = txn.host_addresses(&lowered).await?;
        let mut out = String::new();
        out.push_str(&format!("Server Name: {}\r\n", host.name.to_uppercase()));
        for address in addresses {
            out.push_str(&format!("IP Address: {address}\r\n"));
        }
        out.push_str(&format!("Sponsoring Registrar: {}\r\n", host.client_id));
        out.push_str(&trailer());
        return Ok(out);
    }

    if let Some(contact) = txn.contact(query).await? {
        // Postal details stay private; WHOIS discloses the handle and the
        // sponsoring registrar only.
        let mut out = String::new();
        out.push_str(&format!("Contact ID: {}\r\n", contact.handle));
        out.push_str(&format!("Sponsoring Registrar: {}\r\n", contact.client_id));
        out.push_str(&format!(
            "Creation Date: {}\r\n",
            format_time(contact.created_at)
        ));
        out.push_str(&trailer());
        return Ok(out);
    }

    Ok(format!("No match for \"{query}\"\r\n"))
}

fn trailer() -> String {
    format!(
        "\r\n>>> Last update of WHOIS database: {} <<<\r\n",
        format_time(chrono::Utc::now())
    )
}
