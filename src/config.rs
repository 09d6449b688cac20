//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "epp-registry", about = "EPP registry server", version)]
pub struct Config {
    /// Address the EPP listener binds
    #[arg(long, env = "EPP_LISTEN", default_value = "0.0.0.0:700")]
    pub listen: SocketAddr,
    /// Server certificate chain (PEM); TLS is disabled when absent
    #[arg(long, env = "EPP_CERT")]
    pub cert: Option<PathBuf>,
    /// Server private key (PEM)
    #[arg(long, env = "EPP_KEY")]
    pub key: Option<PathBuf>,
    /// CA bundle for optional client-certificate verification (PEM)
    #[arg(long, env = "EPP_CA")]
    pub ca: Option<PathBuf>,
    /// Store connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:registry.db?mode=rwc")]
    pub database_url: String,
    /// Apply the embedded schema migrations before serving
    #[arg(long)]
    pub migrate: bool,
    /// Identifier used in the greeting and as the ROID suffix
    #[arg(long, env = "EPP_SERVER_ID", default_value = "REG")]
    pub server_id: String,
    /// Seconds a session may sit idle before it is closed
    #[arg(long, env = "EPP_IDLE_TIMEOUT", default_value_t = 600)]
    pub idle_timeout_secs: u64,
    /// Seconds allowed for the TLS handshake
    #[arg(long, env = "EPP_HANDSHAKE_TIMEOUT", default_value_t = 30)]
    pub handshake_timeout_secs: u64,
    /// Days before an unanswered transfer request is approved server-side
    #[arg(long, env = "EPP_TRANSFER_WINDOW", default_value_t = 5)]
    pub transfer_window_days: i64,
    /// WHOIS listener address (service disabled when absent)
    #[arg(long, env = "WHOIS_LISTEN")]
    pub whois_listen: Option<SocketAddr>,
    /// RDAP listener address (service disabled when absent)
    #[arg(long, env = "RDAP_LISTEN")]
    pub rdap_listen: Option<SocketAddr>,
}

impl Config {
    pub fn policy(&self) -> Policy {
        Policy {
            server_id: self.server_id.clone(),
            transfer_window_days: self.transfer_window_days,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// The policy knobs handlers see: everything else in [`Config`] is
/// listener plumbing.
#[derive(Clone, Debug)]
pub struct Policy {
    pub server_id: String,
    pub transfer_window_days: i64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            server_id: "REG".to_owned(),
            transfer_window_days: 5,
        }
    }
}
