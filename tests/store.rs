//! Store-level invariants and the transfer sweeper

use chrono::{Days, Duration, Utc};

use epp_registry::store::{Contact, Domain, Store, StoreError, TransferStatus};
use epp_registry::sweeper;

fn domain(name: &str, client: &str) -> Domain {
    Domain {
        name: name.to_owned(),
        client_id: client.to_owned(),
        registrant: None,
        created_at: Utc::now(),
        expires_at: Utc::now() + Days::new(365),
        updated_at: None,
        statuses: vec!["ok".to_owned()],
        auth_info: "secret".to_owned(),
    }
}

fn contact(handle: &str) -> Contact {
    Contact {
        handle: handle.to_owned(),
        client_id: "RG1".to_owned(),
        name: "Jo Example".to_owned(),
        organization: None,
        street: vec!["1 High Street".to_owned()],
        city: "London".to_owned(),
        province: None,
        postal_code: "SW1A 1AA".to_owned(),
        country_code: "GB".to_owned(),
        voice: "+44.2012345678".to_owned(),
        fax: None,
        email: "jo@example.test".to_owned(),
        created_at: Utc::now(),
        updated_at: None,
        statuses: vec!["ok".to_owned()],
    }
}

#[tokio::test]
async fn identity_uniqueness_across_transactions() {
    let store = Store::in_memory().await.unwrap();

    let mut txn = store.begin().await.unwrap();
    txn.insert_domain(&domain("example.test", "RG1"))
        .await
        .unwrap();
    txn.insert_contact(&contact("C1")).await.unwrap();
    txn.commit().await.unwrap();

    let mut txn = store.begin().await.unwrap();
    assert!(matches!(
        txn.insert_domain(&domain("example.test", "RG2")).await,
        Err(StoreError::Exists)
    ));
    assert!(matches!(
        txn.insert_contact(&contact("C1")).await,
        Err(StoreError::Exists)
    ));
}

#[tokio::test]
async fn address_set_semantics() {
    let store = Store::in_memory().await.unwrap();
    let mut txn = store.begin().await.unwrap();
    txn.insert_host(&epp_registry::store::Host {
        name: "ns1.example.test".to_owned(),
        client_id: "RG1".to_owned(),
        created_at: Utc::now(),
        updated_at: None,
        statuses: vec!["ok".to_owned()],
    })
    .await
    .unwrap();

    let addr = "192.0.2.7".parse().unwrap();
    txn.add_host_address("ns1.example.test", addr).await.unwrap();
    // Duplicate add coalesces; removing something absent is a no-op.
    txn.add_host_address("ns1.example.test", addr).await.unwrap();
    txn.remove_host_address("ns1.example.test", "192.0.2.8".parse().unwrap())
        .await
        .unwrap();

    let addresses = txn.host_addresses("ns1.example.test").await.unwrap();
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0], addr);
}

#[tokio::test]
async fn sweeper_approves_elapsed_transfers() {
    let store = Store::in_memory().await.unwrap();

    let mut txn = store.begin().await.unwrap();
    let mut record = domain("moving.test", "RG1");
    let original_expiry = record.expires_at;
    txn.insert_domain(&record).await.unwrap();
    txn.insert_transfer(
        "moving.test",
        "RG1",
        "RG2",
        Utc::now() - Duration::days(6),
        "pw1",
    )
    .await
    .unwrap();
    // A fresh request elsewhere must stay untouched.
    record.name = "staying.test".to_owned();
    txn.insert_domain(&record).await.unwrap();
    txn.insert_transfer("staying.test", "RG1", "RG2", Utc::now(), "pw1")
        .await
        .unwrap();
    txn.commit().await.unwrap();

    let approved = sweeper::sweep(&store, 5).await.unwrap();
    assert_eq!(approved, 1);

    let mut txn = store.begin().await.unwrap();
    let moved = txn.domain("moving.test").await.unwrap().unwrap();
    assert_eq!(moved.client_id, "RG2");
    assert_eq!((moved.expires_at - original_expiry).num_days(), 365);
    let record = txn.latest_transfer("moving.test").await.unwrap().unwrap();
    assert_eq!(record.status, TransferStatus::ServerApproved);
    assert!(record.acted_at.is_some());

    let stayed = txn.domain("staying.test").await.unwrap().unwrap();
    assert_eq!(stayed.client_id, "RG1");
    let record = txn.latest_transfer("staying.test").await.unwrap().unwrap();
    assert_eq!(record.status, TransferStatus::Pending);
}

#[tokio::test]
async fn sweeper_cancels_orphaned_transfers() {
    let store = Store::in_memory().await.unwrap();

    let mut txn = store.begin().await.unwrap();
    txn.insert_transfer(
        "gone.test",
        "RG1",
        "RG2",
        Utc::now() - Duration::days(10),
        "pw1",
    )
    .await
    .unwrap();
    txn.commit().await.unwrap();

    assert_eq!(sweeper::sweep(&store, 5).await.unwrap(), 0);

    let mut txn = store.begin().await.unwrap();
    let record = txn.latest_transfer("gone.test").await.unwrap().unwrap();
    assert_eq!(record.status, TransferStatus::ServerCancelled);
}
