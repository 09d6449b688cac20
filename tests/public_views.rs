//! WHOIS and RDAP read-only views over the registry store

use chrono::{Days, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use epp_registry::config::Policy;
use epp_registry::store::{Domain, Host, Store};
use epp_registry::{rdap, whois};

async fn seeded_store() -> Store {
    let store = Store::in_memory().await.unwrap();
    let mut txn = store.begin().await.unwrap();
    txn.insert_domain(&Domain {
        name: "example.test".to_owned(),
        client_id: "RG1".to_owned(),
        registrant: Some("C1".to_owned()),
        created_at: Utc::now(),
        expires_at: Utc::now() + Days::new(365),
        updated_at: None,
        statuses: vec!["ok".to_owned()],
        auth_info: "pw1".to_owned(),
    })
    .await
    .unwrap();
    txn.insert_host(&Host {
        name: "ns1.example.test".to_owned(),
        client_id: "RG1".to_owned(),
        created_at: Utc::now(),
        updated_at: None,
        statuses: vec!["ok".to_owned()],
    })
    .await
    .unwrap();
    txn.add_host_address("ns1.example.test", "192.0.2.1".parse().unwrap())
        .await
        .unwrap();
    txn.add_domain_nameserver("example.test", "ns1.example.test")
        .await
        .unwrap();
    txn.commit().await.unwrap();
    store
}

#[tokio::test]
async fn whois_domain_uses_association_table() {
    let store = seeded_store().await;

    let response = whois::lookup(&store, "EXAMPLE.TEST").await.unwrap();
    assert!(response.contains("Domain Name: EXAMPLE.TEST"));
    assert!(response.contains("Sponsoring Registrar: RG1"));
    assert!(response.contains("Name Server: NS1.EXAMPLE.TEST"));
    assert!(response.contains("Domain Status: ok"));

    let response = whois::lookup(&store, "ns1.example.test").await.unwrap();
    assert!(response.contains("Server Name: NS1.EXAMPLE.TEST"));
    assert!(response.contains("IP Address: 192.0.2.1"));

    let response = whois::lookup(&store, "missing.test").await.unwrap();
    assert!(response.contains("No match"));
}

async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                .as_bytes(),
        )
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn rdap_lookups() {
    let store = seeded_store().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(rdap::serve(
        listener,
        store,
        Policy::default(),
        shutdown_rx,
    ));

    let response = http_get(addr, "/domain/example.test").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains(r#""objectClassName":"domain""#));
    assert!(response.contains(r#""ldhName":"example.test""#));
    assert!(response.contains(r#""ldhName":"ns1.example.test""#));
    assert!(response.contains("EXAMPLE-TEST-REG"));

    let response = http_get(addr, "/nameserver/ns1.example.test").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("192.0.2.1"));

    let response = http_get(addr, "/domain/missing.test").await;
    assert!(response.starts_with("HTTP/1.1 404"));
    assert!(response.contains("rdap_level_0"));

    let _ = shutdown_tx.send(true);
}
