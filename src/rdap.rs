//! RDAP front end (RFC 7480/9083, minimal profile)
//!
//! JSON lookups for the three object classes over the same store as EPP.
//! Not a conformance-complete RDAP service: no search, no paging, no
//! object tagging.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::warn;

use crate::config::Policy;
use crate::domain::roid;
use crate::error::Error;
use crate::store::Store;
use crate::xml::format_time;

#[derive(Clone)]
struct AppState {
    store: Store,
    policy: Policy,
}

pub fn router(store: Store, policy: Policy) -> Router {
    Router::new()
        .route("/help", get(help))
        .route("/domain/{name}", get(domain))
        .route("/entity/{handle}", get(entity))
        .route("/nameserver/{name}", get(nameserver))
        .with_state(AppState { store, policy })
}

pub async fn serve(
    listener: TcpListener,
    store: Store,
    policy: Policy,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Error> {
    axum::serve(listener, router(store, policy))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}

fn conformance() -> Value {
    json!(["rdap_level_0"])
}

fn not_found(description: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "rdapConformance": conformance(),
            "errorCode": 404,
            "title": "Not Found",
            "description": [description],
        })),
    )
}

fn internal_error(err: Error) -> (StatusCode, Json<Value>) {
    warn!(error = %err, "rdap lookup failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "rdapConformance": conformance(),
            "errorCode": 500,
            "title": "Internal Error",
        })),
    )
}

async fn help(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "rdapConformance": conformance(),
        "notices": [{
            "title": "RDAP Service",
            "description": [format!("{} registration data lookup", state.policy.server_id)],
        }],
    }))
}

async fn domain(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let name = name.trim().to_lowercase();
    let result = domain_json(&state, &name).await.map_err(internal_error)?;
    match result {
        Some(value) => Ok(Json(value)),
        None => Err(not_found("domain not found")),
    }
}

async fn domain_json(state: &AppState, name: &str) -> Result<Option<Value>, Error> {
    let mut txn = state.store.begin().await?;
    let Some(domain) = txn.domain(name).await? else {
        return Ok(None);
    };
    let nameservers = txn.domain_nameservers(name).await?;
    let contacts = txn.domain_contacts(name).await?;

    let mut events = vec![
        json!({ "eventAction": "registration", "eventDate": format_time(domain.created_at) }),
        json!({ "eventAction": "expiration", "eventDate": format_time(domain.expires_at) }),
    ];
    if let Some(updated_at) = domain.updated_at {
        events.push(json!({ "eventAction": "last changed", "eventDate": format_time(updated_at) }));
    }

    let mut entities: Vec<Value> = Vec::new();
    if let Some(registrant) = &domain.registrant {
        entities.push(json!({
            "objectClassName": "entity",
            "handle": registrant,
            "roles": ["registrant"],
        }));
    }
    for (role, handle) in contacts {
        entities.push(json!({
            "objectClassName": "entity",
            "handle": handle,
            "roles": [role],
        }));
    }

    Ok(Some(json!({
        "rdapConformance": conformance(),
        "objectClassName": "domain",
        "handle": roid(&domain.name, &state.policy.server_id),
        "ldhName": domain.name,
        "status": domain.statuses,
        "events": events,
        "entities": entities,
        "nameservers": nameservers
            .into_iter()
            .map(|name| json!({ "objectClassName": "nameserver", "ldhName": name }))
            .collect::<Vec<_>>(),
    })))
}

async fn entity(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let result = entity_json(&state, handle.trim())
        .await
        .map_err(internal_error)?;
    match result {
        Some(value) => Ok(Json(value)),
        None => Err(not_found("entity not found")),
    }
}

async fn entity_json(state: &AppState, handle: &str) -> Result<Option<Value>, Error> {
    let mut txn = state.store.begin().await?;
    let Some(contact) = txn.contact(handle).await? else {
        return Ok(None);
    };

    // jCard (RFC 7095): version, full name, and the public address parts.
    let vcard = json!([
        "vcard",
        [
            ["version", {}, "text", "4.0"],
            ["fn", {}, "text", contact.name],
            ["adr", {}, "text", [
                "",
                "",
                contact.street.join(" "),
                contact.city,
                contact.province.unwrap_or_default(),
                contact.postal_code,
                contact.country_code,
            ]],
        ],
    ]);

    Ok(Some(json!({
        "rdapConformance": conformance(),
        "objectClassName": "entity",
        "handle": contact.handle,
        "status": contact.statuses,
        "vcardArray": vcard,
        "events": [
            { "eventAction": "registration", "eventDate": format_time(contact.created_at) },
        ],
    })))
}

async fn nameserver(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let name = name.trim().to_lowercase();
    let result = nameserver_json(&state, &name)
        .await
        .map_err(internal_error)?;
    match result {
        Some(value) => Ok(Json(value)),
        None => Err(not_found("nameserver not found")),
    }
}

async fn nameserver_json(state: &AppState, name: &str) -> Result<Option<Value>, Error> {
    let mut txn = state.store.begin().await?;
    let Some(host) = txn.host(name).await? else {
        return Ok(None);
    };
    let addresses = txn.host_addresses(name).await?;

    let (v4, v6): (Vec<_>, Vec<_>) = addresses.iter().partition(|addr| addr.is_ipv4());
    Ok(Some(json!({
        "rdapConformance": conformance(),
        "objectClassName": "nameserver",
        "handle": roid(&host.name, &state.policy.server_id),
        "ldhName": host.name,
        "status": host.statuses,
        "ipAddresses": {
            "v4": v4.iter().map(|a: &&std::net::IpAddr| a.to_string()).collect::<Vec<_>>(),
            "v6": v6.iter().map(|a: &&std::net::IpAddr| a.to_string()).collect::<Vec<_>>(),
        },
        "events": [
            { "eventAction": "registration", "eventDate": format_time(host.created_at) },
        ],
    })))
}
