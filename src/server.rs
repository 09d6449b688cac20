//! The EPP listener: TCP accept loop, TLS termination and per-session tasks

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::config::Policy;
use crate::connection::{read_frame, write_frame};
use crate::dispatch;
use crate::error::Error;
use crate::greeting::greeting;
use crate::response::{Reply, ResultCode, TrIds};
use crate::session::{Session, SessionTable};
use crate::store::Store;

pub struct Server {
    store: Store,
    policy: Policy,
    sessions: SessionTable,
    idle_timeout: Duration,
    handshake_timeout: Duration,
}

impl Server {
    pub fn new(store: Store, policy: Policy) -> Self {
        Self {
            store,
            policy,
            sessions: SessionTable::new(),
            idle_timeout: Duration::from_secs(600),
            handshake_timeout: Duration::from_secs(30),
        }
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Accepts connections until shutdown is signalled, then drains:
    /// accepts stop, sessions finish the command they are on and close.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        acceptor: Option<TlsAcceptor>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), Error> {
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    let server = self.clone();
                    let acceptor = acceptor.clone();
                    let shutdown = shutdown.clone();
                    tasks.spawn(async move {
                        server.accept(stream, peer, acceptor, shutdown).await;
                    });
                    // Reap whatever already finished so the set stays small.
                    while tasks.try_join_next().is_some() {}
                }
                _ = shutdown.changed() => break,
            }
        }

        info!(
            sessions = self.sessions.len(),
            "refusing new connections; draining"
        );
        for (id, entry) in self.sessions.snapshot() {
            info!(
                session = %id,
                peer = %entry.peer,
                client = entry.client_id.as_deref().unwrap_or("-"),
                "awaiting session"
            );
        }
        while tasks.join_next().await.is_some() {}
        Ok(())
    }

    async fn accept(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        acceptor: Option<TlsAcceptor>,
        shutdown: watch::Receiver<bool>,
    ) {
        info!(%peer, "new connection");
        match acceptor {
            Some(acceptor) => {
                match timeout(self.handshake_timeout, acceptor.accept(stream)).await {
                    Ok(Ok(tls)) => self.run_session(tls, peer.to_string(), shutdown).await,
                    Ok(Err(err)) => warn!(%peer, error = %err, "TLS handshake failed"),
                    Err(_) => warn!(%peer, "TLS handshake timed out"),
                }
            }
            None => self.run_session(stream, peer.to_string(), shutdown).await,
        }
    }

    /// Runs the greeting/command loop for one established stream. Public so
    /// tests can drive a whole session over an in-memory pipe.
    pub async fn run_session<S>(&self, mut stream: S, peer: String, shutdown: watch::Receiver<bool>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut session = Session::new(peer);
        self.sessions.register(&session);
        let result = self.session_loop(&mut stream, &mut session, shutdown).await;
        self.sessions.remove(&session);
        match result {
            Ok(()) | Err(Error::Closed) => {
                info!(session = %session.id(), peer = %session.peer(), "connection closed")
            }
            Err(err) => {
                warn!(session = %session.id(), peer = %session.peer(), error = %err, "session failed")
            }
        }
    }

    async fn session_loop<S>(
        &self,
        stream: &mut S,
        session: &mut Session,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        write_frame(stream, &greeting(&self.policy.server_id)?).await?;

        loop {
            let payload = tokio::select! {
                frame = timeout(self.idle_timeout, read_frame(stream)) => match frame {
                    Ok(Ok(payload)) => payload,
                    Ok(Err(Error::FrameLength(size))) => {
                        // The stream cannot be resynchronized after a bad
                        // header, so answer 2001 and close.
                        warn!(session = %session.id(), size, "refusing frame");
                        let reply = Reply::new(ResultCode::CommandSyntaxError, &TrIds::new(None))?;
                        write_frame(stream, &reply.xml).await?;
                        return Ok(());
                    }
                    Ok(Err(err)) => return Err(err),
                    Err(_) => {
                        info!(session = %session.id(), "closing idle session");
                        return Ok(());
                    }
                },
                _ = shutdown.changed() => return Ok(()),
            };

            let processed =
                dispatch::process(&payload, session, &self.store, &self.policy).await?;
            self.sessions.update(session);
            write_frame(stream, &processed.xml).await?;
            if processed.close {
                return Ok(());
            }
        }
    }
}

/// Builds the TLS acceptor from PEM files. When a CA bundle is configured,
/// client certificates are requested and verified if presented; sessions
/// without one still authenticate through login credentials.
pub fn tls_acceptor(
    cert_path: &Path,
    key_path: &Path,
    ca_path: Option<&Path>,
) -> Result<TlsAcceptor, Error> {
    let certs = read_certs(cert_path)?;
    let key = read_key(key_path)?;

    let builder = match ca_path {
        Some(ca_path) => {
            let mut roots = RootCertStore::empty();
            for cert in read_certs(ca_path)? {
                roots
                    .add(cert)
                    .map_err(|err| Error::Other(format!("invalid CA certificate: {err}")))?;
            }
            let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
                .allow_unauthenticated()
                .build()
                .map_err(|err| Error::Other(format!("client verifier: {err}")))?;
            ServerConfig::builder().with_client_cert_verifier(verifier)
        }
        None => ServerConfig::builder().with_no_client_auth(),
    };

    let config = builder.with_single_cert(certs, key)?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, Error> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(Error::Other(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn read_key(path: &Path) -> Result<PrivateKeyDer<'static>, Error> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| Error::Other(format!("no private key found in {}", path.display())))
}
