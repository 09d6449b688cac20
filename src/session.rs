//! Per-connection session state and authentication

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::common::token_hex;
use crate::error::Error;
use crate::request::Login;
use crate::response::{Reply, ResultCode, TrIds};
use crate::store::{digest_password, Txn};

/// State for one EPP connection.
///
/// A session is born `Greeted` (the greeting goes out on accept), becomes
/// `Authenticated` on a successful login, and only leaves that state when
/// the stream closes. Everything here is owned by the connection task; the
/// shared [`SessionTable`] carries a read-only snapshot for shutdown.
#[derive(Debug)]
pub struct Session {
    id: String,
    peer: String,
    auth: Option<Authenticated>,
}

#[derive(Debug)]
struct Authenticated {
    client_id: String,
    login_time: DateTime<Utc>,
}

impl Session {
    pub fn new(peer: impl Into<String>) -> Self {
        Self {
            id: token_hex(8),
            peer: peer.into(),
            auth: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn client_id(&self) -> Option<&str> {
        self.auth.as_ref().map(|auth| auth.client_id.as_str())
    }

    /// Validates the credentials against the registrar table. A second login
    /// on an authenticated session is a use error; a failed login leaves the
    /// session in the greeted state. A `<newPW>` on a successful login
    /// replaces the stored credential inside the command transaction.
    pub(crate) async fn login(
        &mut self,
        login: &Login,
        txn: &mut Txn,
        tr_ids: &TrIds,
    ) -> Result<Reply, Error> {
        if self.auth.is_some() {
            return Reply::new(ResultCode::CommandUseError, tr_ids);
        }

        let (Some(client_id), Some(password)) = (&login.client_id, &login.password) else {
            return Reply::new(ResultCode::RequiredParameterMissing, tr_ids);
        };
        let new_password = match &login.new_password {
            Some(new_password) if new_password.trim().is_empty() => {
                return Reply::new(ResultCode::ParameterValueSyntaxError, tr_ids);
            }
            other => other,
        };

        match txn.registrar(client_id).await? {
            Some(registrar) if registrar.password_digest == digest_password(password) => {
                if let Some(new_password) = new_password {
                    txn.update_registrar_password(client_id, new_password)
                        .await?;
                    info!(session = %self.id, client = %client_id, "password changed");
                }
                info!(session = %self.id, client = %client_id, "client logged in");
                self.auth = Some(Authenticated {
                    client_id: client_id.clone(),
                    login_time: Utc::now(),
                });
                Reply::new(ResultCode::CommandCompletedSuccessfully, tr_ids)
            }
            _ => {
                warn!(
                    session = %self.id,
                    client = %client_id,
                    peer = %self.peer,
                    "authentication failure"
                );
                Reply::with_message(ResultCode::CommandUseError, "Authentication error", tr_ids)
            }
        }
    }

    pub(crate) fn logout(&mut self, tr_ids: &TrIds) -> Result<Reply, Error> {
        if let Some(auth) = self.auth.take() {
            info!(
                session = %self.id,
                client = %auth.client_id,
                since = %auth.login_time,
                "client logged out"
            );
        }
        Reply::new(ResultCode::CommandCompletedSuccessfullyEndingSession, tr_ids)
    }
}

/// Process-wide map of live sessions, keyed by session id.
///
/// Mutated only when the owning connection task starts and ends; other
/// readers (the shutdown path) only enumerate it.
#[derive(Clone, Debug, Default)]
pub struct SessionTable {
    inner: Arc<Mutex<HashMap<String, SessionEntry>>>,
}

#[derive(Clone, Debug)]
pub struct SessionEntry {
    pub peer: String,
    pub client_id: Option<String>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: &Session) {
        let mut inner = self.inner.lock().expect("session table poisoned");
        inner.insert(
            session.id().to_owned(),
            SessionEntry {
                peer: session.peer().to_owned(),
                client_id: session.client_id().map(str::to_owned),
            },
        );
    }

    pub fn update(&self, session: &Session) {
        self.register(session);
    }

    pub fn remove(&self, session: &Session) {
        let mut inner = self.inner.lock().expect("session table poisoned");
        inner.remove(session.id());
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session table poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<(String, SessionEntry)> {
        let inner = self.inner.lock().expect("session table poisoned");
        inner
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }
}
