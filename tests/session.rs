//! End-to-end EPP sessions over in-memory pipes
//!
//! Each test drives the real connection handler (greeting, framing, XML
//! codec, dispatch, store) through `tokio::io::duplex`, with an in-memory
//! SQLite store provisioned with two registrars.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::DuplexStream;
use tokio::sync::watch;

use epp_registry::config::Policy;
use epp_registry::connection::{read_frame, write_frame};
use epp_registry::server::Server;
use epp_registry::store::Store;
use epp_registry::Error;

struct Client {
    stream: DuplexStream,
    // Keeps the shutdown channel alive for the session's lifetime.
    _shutdown: watch::Sender<bool>,
}

impl Client {
    async fn send(&mut self, xml: &str) -> String {
        write_frame(&mut self.stream, xml).await.unwrap();
        read_frame(&mut self.stream).await.unwrap()
    }
}

fn epp(body: &str) -> String {
    format!("<epp xmlns='urn:ietf:params:xml:ns:epp-1.0'>{body}</epp>")
}

fn command(body: &str, cl_tr_id: &str) -> String {
    epp(&format!(
        "<command>{body}<clTRID>{cl_tr_id}</clTRID></command>"
    ))
}

async fn store_with_registrars() -> Store {
    let store = Store::in_memory().await.unwrap();
    let mut txn = store.begin().await.unwrap();
    txn.insert_registrar("RG1", "pw-rg1").await.unwrap();
    txn.insert_registrar("RG2", "pw-rg2").await.unwrap();
    txn.commit().await.unwrap();
    store
}

async fn connect(store: &Store) -> Client {
    let server = Arc::new(Server::new(store.clone(), Policy::default()));
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        server
            .run_session(server_side, "test-peer".to_owned(), shutdown_rx)
            .await;
    });

    let mut client = Client {
        stream: client_side,
        _shutdown: shutdown_tx,
    };
    let greeting = read_frame(&mut client.stream).await.unwrap();
    assert!(greeting.contains("<greeting>"));
    client
}

async fn login(store: &Store, client_id: &str, password: &str) -> Client {
    let mut client = connect(store).await;
    let response = client
        .send(&command(
            &format!(
                "<login><clID>{client_id}</clID><pw>{password}</pw>\
                 <options><version>1.0</version><lang>en</lang></options>\
                 <svcs><objURI>urn:ietf:params:xml:ns:domain-1.0</objURI></svcs></login>"
            ),
            "login-1",
        ))
        .await;
    assert_eq!(code(&response), 1000, "login failed: {response}");
    client
}

fn code(response: &str) -> u16 {
    let start = response.find("code=\"").expect("no result code") + 6;
    response[start..start + 4].parse().unwrap()
}

/// Text content of the first element whose local name matches, prefix
/// agnostic.
fn text_of(response: &str, local: &str) -> Option<String> {
    let open = format!("{local}>");
    let at = response.find(&open)? + open.len();
    let end = response[at..].find('<')?;
    Some(response[at..at + end].to_owned())
}

fn domain_check(name: &str) -> String {
    command(
        &format!(
            "<check><domain:check xmlns:domain='urn:ietf:params:xml:ns:domain-1.0'>\
             <domain:name>{name}</domain:name></domain:check></check>"
        ),
        "chk-1",
    )
}

fn domain_create(name: &str, period: u8, registrant: &str, auth: &str) -> String {
    command(
        &format!(
            "<create><domain:create xmlns:domain='urn:ietf:params:xml:ns:domain-1.0'>\
             <domain:name>{name}</domain:name>\
             <domain:period unit='y'>{period}</domain:period>\
             <domain:registrant>{registrant}</domain:registrant>\
             <domain:authInfo><domain:pw>{auth}</domain:pw></domain:authInfo>\
             </domain:create></create>"
        ),
        "cre-1",
    )
}

fn domain_info(name: &str) -> String {
    command(
        &format!(
            "<info><domain:info xmlns:domain='urn:ietf:params:xml:ns:domain-1.0'>\
             <domain:name>{name}</domain:name></domain:info></info>"
        ),
        "inf-1",
    )
}

fn domain_update(name: &str, body: &str) -> String {
    command(
        &format!(
            "<update><domain:update xmlns:domain='urn:ietf:params:xml:ns:domain-1.0'>\
             <domain:name>{name}</domain:name>{body}</domain:update></update>"
        ),
        "upd-1",
    )
}

fn domain_delete(name: &str) -> String {
    command(
        &format!(
            "<delete><domain:delete xmlns:domain='urn:ietf:params:xml:ns:domain-1.0'>\
             <domain:name>{name}</domain:name></domain:delete></delete>"
        ),
        "del-1",
    )
}

fn domain_transfer(op: &str, name: &str, auth: Option<&str>) -> String {
    let auth = auth
        .map(|pw| format!("<domain:authInfo><domain:pw>{pw}</domain:pw></domain:authInfo>"))
        .unwrap_or_default();
    command(
        &format!(
            "<transfer op='{op}'>\
             <domain:transfer xmlns:domain='urn:ietf:params:xml:ns:domain-1.0'>\
             <domain:name>{name}</domain:name>{auth}</domain:transfer></transfer>"
        ),
        "trn-1",
    )
}

fn contact_create(id: &str, cc: &str) -> String {
    command(
        &format!(
            "<create><contact:create xmlns:contact='urn:ietf:params:xml:ns:contact-1.0'>\
             <contact:id>{id}</contact:id>\
             <contact:postalInfo type='loc'><contact:name>Jo Example</contact:name>\
             <contact:addr><contact:street>1 High Street</contact:street>\
             <contact:city>London</contact:city><contact:pc>SW1A 1AA</contact:pc>\
             <contact:cc>{cc}</contact:cc></contact:addr></contact:postalInfo>\
             <contact:voice>+44.2012345678</contact:voice>\
             <contact:email>jo@example.test</contact:email>\
             </contact:create></create>"
        ),
        "cc-1",
    )
}

fn contact_delete(id: &str) -> String {
    command(
        &format!(
            "<delete><contact:delete xmlns:contact='urn:ietf:params:xml:ns:contact-1.0'>\
             <contact:id>{id}</contact:id></contact:delete></delete>"
        ),
        "cd-1",
    )
}

fn host_create(name: &str) -> String {
    command(
        &format!(
            "<create><host:create xmlns:host='urn:ietf:params:xml:ns:host-1.0'>\
             <host:name>{name}</host:name>\
             <host:addr ip='v4'>192.0.2.1</host:addr>\
             </host:create></create>"
        ),
        "hc-1",
    )
}

#[tokio::test]
async fn create_check_round_trip() {
    let store = store_with_registrars().await;
    let mut client = login(&store, "RG1", "pw-rg1").await;

    let response = client.send(&domain_check("example.test")).await;
    assert_eq!(code(&response), 1000);
    assert!(response.contains(r#"avail="1""#));

    let response = client
        .send(&domain_create("example.test", 2, "C1", "pw1"))
        .await;
    assert_eq!(code(&response), 1000, "{response}");
    let created: DateTime<Utc> = text_of(&response, "crDate").unwrap().parse().unwrap();
    let expires: DateTime<Utc> = text_of(&response, "exDate").unwrap().parse().unwrap();
    assert_eq!((expires - created).num_days(), 730);

    let response = client.send(&domain_check("example.test")).await;
    assert_eq!(code(&response), 1000);
    assert!(response.contains(r#"avail="0""#));
    assert!(response.contains("In use"));

    // Duplicate create fails without touching the stored object.
    let response = client
        .send(&domain_create("example.test", 1, "C1", "pw2"))
        .await;
    assert_eq!(code(&response), 2302);
}

#[tokio::test]
async fn update_requires_sponsorship() {
    let store = store_with_registrars().await;
    let mut rg1 = login(&store, "RG1", "pw-rg1").await;
    let response = rg1
        .send(&domain_create("example.test", 1, "C1", "pw1"))
        .await;
    assert_eq!(code(&response), 1000);

    let add_ns = domain_update(
        "example.test",
        "<domain:add><domain:ns><domain:hostObj>ns1.rg2.test</domain:hostObj>\
         </domain:ns></domain:add>",
    );

    let mut rg2 = login(&store, "RG2", "pw-rg2").await;
    let response = rg2.send(&add_ns).await;
    assert_eq!(code(&response), 2201);

    // The domain is unchanged: info as the sponsor shows no nameservers.
    let response = rg1.send(&domain_info("example.test")).await;
    assert_eq!(code(&response), 1000);
    assert!(!response.contains("hostObj"));

    // The sponsor's own update goes through.
    let response = rg1.send(&add_ns).await;
    assert_eq!(code(&response), 1000, "{response}");
    let response = rg1.send(&domain_info("example.test")).await;
    assert!(response.contains("ns1.rg2.test"));
}

#[tokio::test]
async fn referenced_contact_cannot_be_deleted() {
    let store = store_with_registrars().await;
    let mut client = login(&store, "RG1", "pw-rg1").await;

    let response = client.send(&contact_create("C1", "GB")).await;
    assert_eq!(code(&response), 1000, "{response}");

    let response = client.send(&domain_create("d.test", 1, "C1", "pw1")).await;
    assert_eq!(code(&response), 1000);

    let response = client.send(&contact_delete("C1")).await;
    assert_eq!(code(&response), 2305);
    assert!(response.contains("1 domains reference this contact"));

    // Drop the domain, then the contact goes away.
    assert_eq!(code(&client.send(&domain_delete("d.test")).await), 1000);
    assert_eq!(code(&client.send(&contact_delete("C1")).await), 1000);
}

#[tokio::test]
async fn transfer_request_and_query() {
    let store = store_with_registrars().await;
    let mut rg1 = login(&store, "RG1", "pw-rg1").await;
    let response = rg1
        .send(&domain_create("example.test", 1, "C1", "pw1"))
        .await;
    assert_eq!(code(&response), 1000);

    let mut rg2 = login(&store, "RG2", "pw-rg2").await;
    // Wrong passphrase first.
    let response = rg2
        .send(&domain_transfer("request", "example.test", Some("nope")))
        .await;
    assert_eq!(code(&response), 2202);

    let response = rg2
        .send(&domain_transfer("request", "example.test", Some("pw1")))
        .await;
    assert_eq!(code(&response), 1001, "{response}");
    assert_eq!(text_of(&response, "trStatus").as_deref(), Some("pending"));

    // Either party sees the same pending record via query.
    let query = domain_transfer("query", "example.test", None);
    let response = rg1.send(&query).await;
    assert_eq!(code(&response), 1000);
    assert_eq!(text_of(&response, "trStatus").as_deref(), Some("pending"));
    let response = rg2.send(&query).await;
    assert_eq!(text_of(&response, "trStatus").as_deref(), Some("pending"));

    // A second request while one is pending is refused, as is a request by
    // the current sponsor.
    let response = rg2
        .send(&domain_transfer("request", "example.test", Some("pw1")))
        .await;
    assert_eq!(code(&response), 2002);
    let response = rg1
        .send(&domain_transfer("request", "example.test", Some("pw1")))
        .await;
    assert_eq!(code(&response), 2002);

    // The losing sponsor approves: sponsorship moves, expiry extends.
    let response = rg1
        .send(&domain_transfer("approve", "example.test", None))
        .await;
    assert_eq!(code(&response), 1000, "{response}");
    assert_eq!(
        text_of(&response, "trStatus").as_deref(),
        Some("clientApproved")
    );

    // RG2 now sponsors the domain and may update it.
    let update = domain_update(
        "example.test",
        "<domain:chg><domain:authInfo><domain:pw>pw2</domain:pw></domain:authInfo></domain:chg>",
    );
    assert_eq!(code(&rg2.send(&update).await), 1000);
}

#[tokio::test]
async fn transfer_reject_leaves_domain_alone() {
    let store = store_with_registrars().await;
    let mut rg1 = login(&store, "RG1", "pw-rg1").await;
    assert_eq!(
        code(&rg1.send(&domain_create("kept.test", 1, "C1", "pw1")).await),
        1000
    );

    let mut rg2 = login(&store, "RG2", "pw-rg2").await;
    let response = rg2
        .send(&domain_transfer("request", "kept.test", Some("pw1")))
        .await;
    assert_eq!(code(&response), 1001);

    // Only the losing sponsor may reject.
    let response = rg2.send(&domain_transfer("reject", "kept.test", None)).await;
    assert_eq!(code(&response), 2201);
    let response = rg1.send(&domain_transfer("reject", "kept.test", None)).await;
    assert_eq!(code(&response), 1000);
    assert_eq!(
        text_of(&response, "trStatus").as_deref(),
        Some("clientRejected")
    );

    // Sponsorship never moved.
    let response = rg1.send(&domain_info("kept.test")).await;
    assert_eq!(text_of(&response, "clID").as_deref(), Some("RG1"));

    // A fresh request can be cancelled by its requester.
    let response = rg2
        .send(&domain_transfer("request", "kept.test", Some("pw1")))
        .await;
    assert_eq!(code(&response), 1001);
    let response = rg2.send(&domain_transfer("cancel", "kept.test", None)).await;
    assert_eq!(code(&response), 1000);
    assert_eq!(
        text_of(&response, "trStatus").as_deref(),
        Some("clientCancelled")
    );
}

#[tokio::test]
async fn host_lifecycle_and_validation() {
    let store = store_with_registrars().await;
    let mut client = login(&store, "RG1", "pw-rg1").await;

    let response = client.send(&host_create("-bad.example.test")).await;
    assert_eq!(code(&response), 2005);

    let response = client.send(&host_create("ns.example.test")).await;
    assert_eq!(code(&response), 1000, "{response}");

    let response = client.send(&host_create("ns.example.test")).await;
    assert_eq!(code(&response), 2302);

    // Malformed hostnames in check come back unavailable with a reason.
    let check = command(
        "<check><host:check xmlns:host='urn:ietf:params:xml:ns:host-1.0'>\
         <host:name>-bad.example.test</host:name>\
         <host:name>ns.example.test</host:name>\
         <host:name>free.example.test</host:name>\
         </host:check></check>",
        "hk-1",
    );
    let response = client.send(&check).await;
    assert_eq!(code(&response), 1000);
    assert!(response.contains("Invalid hostname format"));
    assert!(response.contains(r#"avail="1""#));

    let update = command(
        "<update><host:update xmlns:host='urn:ietf:params:xml:ns:host-1.0'>\
         <host:name>ns.example.test</host:name>\
         <host:add><host:addr ip='v6'>2001:db8::1</host:addr></host:add>\
         <host:rem><host:addr ip='v4'>192.0.2.1</host:addr></host:rem>\
         </host:update></update>",
        "hu-1",
    );
    let response = client.send(&update).await;
    assert_eq!(code(&response), 1000, "{response}");

    let info = command(
        "<info><host:info xmlns:host='urn:ietf:params:xml:ns:host-1.0'>\
         <host:name>ns.example.test</host:name></host:info></info>",
        "hi-1",
    );
    let response = client.send(&info).await;
    assert!(response.contains("2001:db8::1"));
    assert!(!response.contains("192.0.2.1"));

    // A host delegated to by a domain survives deletion attempts.
    let response = client
        .send(&domain_create("delegated.test", 1, "C1", "pw1"))
        .await;
    assert_eq!(code(&response), 1000);
    let add_ns = domain_update(
        "delegated.test",
        "<domain:add><domain:ns><domain:hostObj>ns.example.test</domain:hostObj>\
         </domain:ns></domain:add>",
    );
    assert_eq!(code(&client.send(&add_ns).await), 1000);

    let delete = command(
        "<delete><host:delete xmlns:host='urn:ietf:params:xml:ns:host-1.0'>\
         <host:name>ns.example.test</host:name></host:delete></delete>",
        "hd-1",
    );
    let response = client.send(&delete).await;
    assert_eq!(code(&response), 2305);
}

#[tokio::test]
async fn renew_checks_current_expiry() {
    let store = store_with_registrars().await;
    let mut client = login(&store, "RG1", "pw-rg1").await;
    let response = client
        .send(&domain_create("example.test", 1, "C1", "pw1"))
        .await;
    let expires = text_of(&response, "exDate").unwrap();
    let expiry_day = expires[..10].to_owned();

    let renew = |day: &str| {
        command(
            &format!(
                "<renew><domain:renew xmlns:domain='urn:ietf:params:xml:ns:domain-1.0'>\
                 <domain:name>example.test</domain:name>\
                 <domain:curExpDate>{day}</domain:curExpDate>\
                 <domain:period unit='y'>1</domain:period>\
                 </domain:renew></renew>"
            ),
            "rn-1",
        )
    };

    let response = client.send(&renew("2019-01-01")).await;
    assert_eq!(code(&response), 2306);

    let response = client.send(&renew(&expiry_day)).await;
    assert_eq!(code(&response), 1000, "{response}");
    let old: DateTime<Utc> = expires.parse().unwrap();
    let new: DateTime<Utc> = text_of(&response, "exDate").unwrap().parse().unwrap();
    assert_eq!((new - old).num_days(), 365);

    // The old expiry date is stale now.
    let response = client.send(&renew(&expiry_day)).await;
    assert_eq!(code(&response), 2306);
}

#[tokio::test]
async fn status_gates_delete() {
    let store = store_with_registrars().await;
    let mut client = login(&store, "RG1", "pw-rg1").await;
    let response = client
        .send(&domain_create("locked.test", 1, "C1", "pw1"))
        .await;
    assert_eq!(code(&response), 1000);

    let add_lock = domain_update(
        "locked.test",
        "<domain:add><domain:status s='clientDeleteProhibited'/></domain:add>",
    );
    assert_eq!(code(&client.send(&add_lock).await), 1000);

    let response = client.send(&domain_delete("locked.test")).await;
    assert_eq!(code(&response), 2304);

    let drop_lock = domain_update(
        "locked.test",
        "<domain:rem><domain:status s='clientDeleteProhibited'/></domain:rem>",
    );
    assert_eq!(code(&client.send(&drop_lock).await), 1000);
    assert_eq!(code(&client.send(&domain_delete("locked.test")).await), 1000);
}

#[tokio::test]
async fn update_prohibited_status_blocks_updates() {
    let store = store_with_registrars().await;
    let mut client = login(&store, "RG1", "pw-rg1").await;
    assert_eq!(
        code(
            &client
                .send(&domain_create("frozen.test", 1, "C1", "pw1"))
                .await
        ),
        1000
    );

    let add_lock = domain_update(
        "frozen.test",
        "<domain:add><domain:status s='clientUpdateProhibited'/></domain:add>",
    );
    assert_eq!(code(&client.send(&add_lock).await), 1000);

    // Any further update, including one removing the lock, is refused.
    let drop_lock = domain_update(
        "frozen.test",
        "<domain:rem><domain:status s='clientUpdateProhibited'/></domain:rem>",
    );
    assert_eq!(code(&client.send(&drop_lock).await), 2304);
}

#[tokio::test]
async fn malformed_payload_keeps_session_open() {
    let store = store_with_registrars().await;
    let mut client = login(&store, "RG1", "pw-rg1").await;

    // Well-formed XML that is not a valid EPP document.
    let response = client.send("<epp/>").await;
    assert_eq!(code(&response), 2001);

    // The session keeps serving.
    let response = client.send(&domain_check("after.test")).await;
    assert_eq!(code(&response), 1000);
}

#[tokio::test]
async fn authentication_gates_commands() {
    let store = store_with_registrars().await;
    let mut client = connect(&store).await;

    let response = client.send(&domain_check("example.test")).await;
    assert_eq!(code(&response), 2002);

    // Bad password: still unauthenticated.
    let response = client
        .send(&command(
            "<login><clID>RG1</clID><pw>wrong</pw></login>",
            "l-1",
        ))
        .await;
    assert_eq!(code(&response), 2002);
    let response = client.send(&domain_check("example.test")).await;
    assert_eq!(code(&response), 2002);
}

#[tokio::test]
async fn login_new_password_rotates_credentials() {
    let store = store_with_registrars().await;
    let mut client = connect(&store).await;
    let response = client
        .send(&command(
            "<login><clID>RG1</clID><pw>pw-rg1</pw><newPW>pw-next</newPW></login>",
            "np-1",
        ))
        .await;
    assert_eq!(code(&response), 1000, "{response}");

    // The old password is refused on a fresh connection; the new one works.
    let mut stale = connect(&store).await;
    let response = stale
        .send(&command("<login><clID>RG1</clID><pw>pw-rg1</pw></login>", "np-2"))
        .await;
    assert_eq!(code(&response), 2002);

    let mut fresh = connect(&store).await;
    let response = fresh
        .send(&command("<login><clID>RG1</clID><pw>pw-next</pw></login>", "np-3"))
        .await;
    assert_eq!(code(&response), 1000);
}

#[tokio::test]
async fn hello_and_logout() {
    let store = store_with_registrars().await;
    let mut client = login(&store, "RG1", "pw-rg1").await;

    let response = client.send(&epp("<hello/>")).await;
    assert!(response.contains("<greeting>"));

    let response = client.send(&command("<logout/>", "lo-1")).await;
    assert_eq!(code(&response), 1500);

    // The server closes the stream after 1500.
    assert!(matches!(
        read_frame(&mut client.stream).await,
        Err(Error::Closed) | Err(Error::Io(_))
    ));
}

#[tokio::test]
async fn unknown_verbs_and_objects() {
    let store = store_with_registrars().await;
    let mut client = login(&store, "RG1", "pw-rg1").await;

    let response = client.send(&command("<refresh/>", "u-1")).await;
    assert_eq!(code(&response), 2000);

    let response = client
        .send(&command(
            "<check><funds:check xmlns:funds='urn:example:funds-1.0'>\
             <funds:id>x</funds:id></funds:check></check>",
            "u-2",
        ))
        .await;
    assert_eq!(code(&response), 2101);

    let response = client
        .send(&domain_transfer("sideways", "example.test", None))
        .await;
    assert_eq!(code(&response), 2102);
}

#[tokio::test]
async fn contact_update_keeps_mandatory_fields() {
    let store = store_with_registrars().await;
    let mut client = login(&store, "RG1", "pw-rg1").await;

    // Lower-case country codes are accepted and stored uppercase.
    assert_eq!(code(&client.send(&contact_create("C9", "gb")).await), 1000);

    let contact_update = |body: &str| {
        command(
            &format!(
                "<update><contact:update xmlns:contact='urn:ietf:params:xml:ns:contact-1.0'>\
                 <contact:id>C9</contact:id>{body}</contact:update></update>"
            ),
            "cu-1",
        )
    };

    // Emptying a mandatory field is refused.
    let response = client
        .send(&contact_update(
            "<contact:chg><contact:postalInfo type='loc'><contact:addr>\
             <contact:city></contact:city>\
             </contact:addr></contact:postalInfo></contact:chg>",
        ))
        .await;
    assert_eq!(code(&response), 2005);

    // A real change lands.
    let response = client
        .send(&contact_update(
            "<contact:chg><contact:postalInfo type='loc'><contact:addr>\
             <contact:city>Manchester</contact:city></contact:addr></contact:postalInfo>\
             <contact:email>new@example.test</contact:email></contact:chg>",
        ))
        .await;
    assert_eq!(code(&response), 1000, "{response}");

    let info = command(
        "<info><contact:info xmlns:contact='urn:ietf:params:xml:ns:contact-1.0'>\
         <contact:id>C9</contact:id></contact:info></info>",
        "ci-1",
    );
    let response = client.send(&info).await;
    assert_eq!(code(&response), 1000);
    assert!(response.contains("Manchester"));
    assert!(response.contains("new@example.test"));
    assert_eq!(text_of(&response, "cc").as_deref(), Some("GB"));
    assert!(response.contains("C9-REP"));
}

#[tokio::test]
async fn info_redacts_auth_for_non_sponsor() {
    let store = store_with_registrars().await;
    let mut rg1 = login(&store, "RG1", "pw-rg1").await;
    assert_eq!(
        code(
            &rg1.send(&domain_create("example.test", 1, "C1", "pw1"))
                .await
        ),
        1000
    );

    let response = rg1.send(&domain_info("example.test")).await;
    assert!(response.contains("pw1"));
    assert!(response.contains("EXAMPLE-TEST-REG"));

    let mut rg2 = login(&store, "RG2", "pw-rg2").await;
    let response = rg2.send(&domain_info("example.test")).await;
    assert_eq!(code(&response), 1000);
    assert!(!response.contains("pw1"));
}
