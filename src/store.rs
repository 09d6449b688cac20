//! Transactional persistence for registry objects
//!
//! One [`Store`] wraps a sqlx pool; every EPP command checks out a [`Txn`]
//! for its whole lifetime so check-then-write sequences are isolated. The
//! store owns the entity invariants the protocol depends on: identity
//! uniqueness surfaces as [`StoreError::Exists`], reference-protected
//! deletes as [`StoreError::InUse`], and status sets are normalized so they
//! are never empty and `ok` never coexists with another token.

use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqlitePool};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object exists")]
    Exists,
    #[error("object is referenced by {0} domains")]
    InUse(i64),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

fn conflict(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Exists,
        err => StoreError::Db(err),
    }
}

#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new().connect(url).await?;
        Ok(Self { pool })
    }

    /// A private in-memory database with the schema applied. One connection
    /// only: every handle must see the same data.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub async fn begin(&self) -> Result<Txn, StoreError> {
        Ok(Txn {
            inner: self.pool.begin().await?,
        })
    }
}

/// A transaction scoped to a single command. Dropping it without
/// [`Txn::commit`] rolls back, so every early-return path releases its work.
pub struct Txn {
    inner: sqlx::Transaction<'static, Sqlite>,
}

#[derive(Clone, Debug)]
pub struct Domain {
    pub name: String,
    pub client_id: String,
    pub registrant: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub statuses: Vec<String>,
    pub auth_info: String,
}

#[derive(Clone, Debug)]
pub struct Contact {
    pub handle: String,
    pub client_id: String,
    pub name: String,
    pub organization: Option<String>,
    pub street: Vec<String>,
    pub city: String,
    pub province: Option<String>,
    pub postal_code: String,
    pub country_code: String,
    pub voice: String,
    pub fax: Option<String>,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub statuses: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Host {
    pub name: String,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub statuses: Vec<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferStatus {
    Pending,
    ClientApproved,
    ClientRejected,
    ClientCancelled,
    ServerApproved,
    ServerCancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        use TransferStatus::*;
        match self {
            Pending => "pending",
            ClientApproved => "clientApproved",
            ClientRejected => "clientRejected",
            ClientCancelled => "clientCancelled",
            ServerApproved => "serverApproved",
            ServerCancelled => "serverCancelled",
        }
    }
}

impl FromStr for TransferStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use TransferStatus::*;
        Ok(match s {
            "pending" => Pending,
            "clientApproved" => ClientApproved,
            "clientRejected" => ClientRejected,
            "clientCancelled" => ClientCancelled,
            "serverApproved" => ServerApproved,
            "serverCancelled" => ServerCancelled,
            _ => return Err(()),
        })
    }
}

#[derive(Clone, Debug)]
pub struct Transfer {
    pub id: i64,
    pub domain_name: String,
    pub old_client: String,
    pub new_client: String,
    pub status: TransferStatus,
    pub requested_at: DateTime<Utc>,
    pub acted_at: Option<DateTime<Utc>>,
    pub auth_info: String,
}

#[derive(Clone, Debug)]
pub struct Registrar {
    pub id: String,
    pub password_digest: String,
}

/// SHA-256 hex digest used for registrar passwords.
pub fn digest_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn join_statuses(statuses: &[String]) -> String {
    let mut set: Vec<&str> = Vec::new();
    for status in statuses {
        if !set.contains(&status.as_str()) {
            set.push(status);
        }
    }
    if set.len() > 1 {
        set.retain(|s| *s != "ok");
    }
    if set.is_empty() {
        set.push("ok");
    }
    set.join(" ")
}

fn split_statuses(joined: &str) -> Vec<String> {
    joined.split_whitespace().map(str::to_owned).collect()
}

impl Txn {
    pub async fn commit(self) -> Result<(), StoreError> {
        Ok(self.inner.commit().await?)
    }

    pub async fn rollback(self) -> Result<(), StoreError> {
        Ok(self.inner.rollback().await?)
    }

    // Domains

    pub async fn domain(&mut self, name: &str) -> Result<Option<Domain>, StoreError> {
        let row = sqlx::query(
            "SELECT name, client_id, registrant, created_at, expires_at, updated_at,
                    statuses, auth_info
             FROM domains WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&mut *self.inner)
        .await?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(Domain {
            name: row.try_get("name")?,
            client_id: row.try_get("client_id")?,
            registrant: row.try_get("registrant")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            updated_at: row.try_get("updated_at")?,
            statuses: split_statuses(row.try_get::<String, _>("statuses")?.as_str()),
            auth_info: row.try_get("auth_info")?,
        }))
    }

    pub async fn insert_domain(&mut self, domain: &Domain) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO domains (name, client_id, registrant, created_at, expires_at,
                                  updated_at, statuses, auth_info)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&domain.name)
        .bind(&domain.client_id)
        .bind(&domain.registrant)
        .bind(domain.created_at)
        .bind(domain.expires_at)
        .bind(domain.updated_at)
        .bind(join_statuses(&domain.statuses))
        .bind(&domain.auth_info)
        .execute(&mut *self.inner)
        .await
        .map_err(conflict)?;
        Ok(())
    }

    pub async fn update_domain(&mut self, domain: &Domain) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE domains SET client_id = ?, registrant = ?, expires_at = ?,
                    updated_at = ?, statuses = ?, auth_info = ?
             WHERE name = ?",
        )
        .bind(&domain.client_id)
        .bind(&domain.registrant)
        .bind(domain.expires_at)
        .bind(domain.updated_at)
        .bind(join_statuses(&domain.statuses))
        .bind(&domain.auth_info)
        .bind(&domain.name)
        .execute(&mut *self.inner)
        .await?;
        Ok(())
    }

    /// Removes the domain and its association rows. Contacts and hosts the
    /// domain referenced are left in place.
    pub async fn delete_domain(&mut self, name: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM domain_nameservers WHERE domain_name = ?")
            .bind(name)
            .execute(&mut *self.inner)
            .await?;
        sqlx::query("DELETE FROM domain_contacts WHERE domain_name = ?")
            .bind(name)
            .execute(&mut *self.inner)
            .await?;
        sqlx::query("DELETE FROM domains WHERE name = ?")
            .bind(name)
            .execute(&mut *self.inner)
            .await?;
        Ok(())
    }

    pub async fn domain_nameservers(&mut self, name: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT host_name FROM domain_nameservers WHERE domain_name = ? ORDER BY host_name",
        )
        .bind(name)
        .fetch_all(&mut *self.inner)
        .await?;
        rows.iter()
            .map(|row| Ok(row.try_get("host_name")?))
            .collect()
    }

    pub async fn add_domain_nameserver(
        &mut self,
        domain: &str,
        host: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO domain_nameservers (domain_name, host_name) VALUES (?, ?)")
            .bind(domain)
            .bind(host)
            .execute(&mut *self.inner)
            .await?;
        Ok(())
    }

    pub async fn remove_domain_nameserver(
        &mut self,
        domain: &str,
        host: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM domain_nameservers WHERE domain_name = ? AND host_name = ?")
            .bind(domain)
            .bind(host)
            .execute(&mut *self.inner)
            .await?;
        Ok(())
    }

    /// Role-tagged contact links for one domain, `(role, handle)` pairs.
    pub async fn domain_contacts(
        &mut self,
        name: &str,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let rows = sqlx::query(
            "SELECT role, contact_handle FROM domain_contacts
             WHERE domain_name = ? ORDER BY role, contact_handle",
        )
        .bind(name)
        .fetch_all(&mut *self.inner)
        .await?;
        rows.iter()
            .map(|row| Ok((row.try_get("role")?, row.try_get("contact_handle")?)))
            .collect()
    }

    pub async fn add_domain_contact(
        &mut self,
        domain: &str,
        role: &str,
        handle: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO domain_contacts (domain_name, role, contact_handle)
             VALUES (?, ?, ?)",
        )
        .bind(domain)
        .bind(role)
        .bind(handle)
        .execute(&mut *self.inner)
        .await?;
        Ok(())
    }

    // Contacts

    pub async fn contact(&mut self, handle: &str) -> Result<Option<Contact>, StoreError> {
        let row = sqlx::query(
            "SELECT handle, client_id, name, organization, street1, street2, street3,
                    city, province, postal_code, country_code, voice, fax, email,
                    created_at, updated_at, statuses
             FROM contacts WHERE handle = ?",
        )
        .bind(handle)
        .fetch_optional(&mut *self.inner)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let mut street = Vec::new();
        for column in ["street1", "street2", "street3"] {
            if let Some(line) = row.try_get::<Option<String>, _>(column)? {
                street.push(line);
            }
        }
        Ok(Some(Contact {
            handle: row.try_get("handle")?,
            client_id: row.try_get("client_id")?,
            name: row.try_get("name")?,
            organization: row.try_get("organization")?,
            street,
            city: row.try_get("city")?,
            province: row.try_get("province")?,
            postal_code: row.try_get("postal_code")?,
            country_code: row.try_get("country_code")?,
            voice: row.try_get("voice")?,
            fax: row.try_get("fax")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            statuses: split_statuses(row.try_get::<String, _>("statuses")?.as_str()),
        }))
    }

    pub async fn insert_contact(&mut self, contact: &Contact) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO contacts (handle, client_id, name, organization, street1, street2,
                                   street3, city, province, postal_code, country_code,
                                   voice, fax, email, created_at, updated_at, statuses)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&contact.handle)
        .bind(&contact.client_id)
        .bind(&contact.name)
        .bind(&contact.organization)
        .bind(contact.street.first().map(String::as_str))
        .bind(contact.street.get(1).map(String::as_str))
        .bind(contact.street.get(2).map(String::as_str))
        .bind(&contact.city)
        .bind(&contact.province)
        .bind(&contact.postal_code)
        .bind(&contact.country_code)
        .bind(&contact.voice)
        .bind(&contact.fax)
        .bind(&contact.email)
        .bind(contact.created_at)
        .bind(contact.updated_at)
        .bind(join_statuses(&contact.statuses))
        .execute(&mut *self.inner)
        .await
        .map_err(conflict)?;
        Ok(())
    }

    pub async fn update_contact(&mut self, contact: &Contact) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE contacts SET name = ?, organization = ?, street1 = ?, street2 = ?,
                    street3 = ?, city = ?, province = ?, postal_code = ?, country_code = ?,
                    voice = ?, fax = ?, email = ?, updated_at = ?, statuses = ?
             WHERE handle = ?",
        )
        .bind(&contact.name)
        .bind(&contact.organization)
        .bind(contact.street.first().map(String::as_str))
        .bind(contact.street.get(1).map(String::as_str))
        .bind(contact.street.get(2).map(String::as_str))
        .bind(&contact.city)
        .bind(&contact.province)
        .bind(&contact.postal_code)
        .bind(&contact.country_code)
        .bind(&contact.voice)
        .bind(&contact.fax)
        .bind(&contact.email)
        .bind(contact.updated_at)
        .bind(join_statuses(&contact.statuses))
        .bind(&contact.handle)
        .execute(&mut *self.inner)
        .await?;
        Ok(())
    }

    /// Fails with [`StoreError::InUse`] while any domain references the
    /// handle as registrant or through a role link.
    pub async fn delete_contact(&mut self, handle: &str) -> Result<(), StoreError> {
        let references = self.count_domains_referencing_contact(handle).await?;
        if references > 0 {
            return Err(StoreError::InUse(references));
        }
        sqlx::query("DELETE FROM contacts WHERE handle = ?")
            .bind(handle)
            .execute(&mut *self.inner)
            .await?;
        Ok(())
    }

    pub async fn count_domains_referencing_contact(
        &mut self,
        handle: &str,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(DISTINCT d.name) AS n FROM domains d
             LEFT JOIN domain_contacts dc ON dc.domain_name = d.name
             WHERE d.registrant = ?1 OR dc.contact_handle = ?1",
        )
        .bind(handle)
        .fetch_one(&mut *self.inner)
        .await?;
        Ok(row.try_get("n")?)
    }

    // Hosts

    pub async fn host(&mut self, name: &str) -> Result<Option<Host>, StoreError> {
        let row = sqlx::query(
            "SELECT name, client_id, created_at, updated_at, statuses FROM hosts WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&mut *self.inner)
        .await?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(Host {
            name: row.try_get("name")?,
            client_id: row.try_get("client_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            statuses: split_statuses(row.try_get::<String, _>("statuses")?.as_str()),
        }))
    }

    pub async fn insert_host(&mut self, host: &Host) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO hosts (name, client_id, created_at, updated_at, statuses)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&host.name)
        .bind(&host.client_id)
        .bind(host.created_at)
        .bind(host.updated_at)
        .bind(join_statuses(&host.statuses))
        .execute(&mut *self.inner)
        .await
        .map_err(conflict)?;
        Ok(())
    }

    pub async fn update_host(&mut self, host: &Host) -> Result<(), StoreError> {
        sqlx::query("UPDATE hosts SET client_id = ?, updated_at = ?, statuses = ? WHERE name = ?")
            .bind(&host.client_id)
            .bind(host.updated_at)
            .bind(join_statuses(&host.statuses))
            .bind(&host.name)
            .execute(&mut *self.inner)
            .await?;
        Ok(())
    }

    /// Fails with [`StoreError::InUse`] while any domain delegates to the
    /// host.
    pub async fn delete_host(&mut self, name: &str) -> Result<(), StoreError> {
        let references = self.count_domains_referencing_host(name).await?;
        if references > 0 {
            return Err(StoreError::InUse(references));
        }
        sqlx::query("DELETE FROM host_ips WHERE host_name = ?")
            .bind(name)
            .execute(&mut *self.inner)
            .await?;
        sqlx::query("DELETE FROM hosts WHERE name = ?")
            .bind(name)
            .execute(&mut *self.inner)
            .await?;
        Ok(())
    }

    pub async fn count_domains_referencing_host(&mut self, name: &str) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM domain_nameservers WHERE host_name = ?")
            .bind(name)
            .fetch_one(&mut *self.inner)
            .await?;
        Ok(row.try_get("n")?)
    }

    pub async fn host_addresses(&mut self, name: &str) -> Result<Vec<IpAddr>, StoreError> {
        let rows = sqlx::query(
            "SELECT address FROM host_ips WHERE host_name = ? ORDER BY ip_version, address",
        )
        .bind(name)
        .fetch_all(&mut *self.inner)
        .await?;
        let mut addresses = Vec::with_capacity(rows.len());
        for row in rows {
            let text: String = row.try_get("address")?;
            if let Ok(addr) = text.parse() {
                addresses.push(addr);
            }
        }
        Ok(addresses)
    }

    /// Adding an address the host already has is a no-op.
    pub async fn add_host_address(&mut self, name: &str, addr: IpAddr) -> Result<(), StoreError> {
        let version = match addr {
            IpAddr::V4(_) => "v4",
            IpAddr::V6(_) => "v6",
        };
        sqlx::query("INSERT OR IGNORE INTO host_ips (host_name, address, ip_version) VALUES (?, ?, ?)")
            .bind(name)
            .bind(addr.to_string())
            .bind(version)
            .execute(&mut *self.inner)
            .await?;
        Ok(())
    }

    /// Removing an address the host does not have is a no-op.
    pub async fn remove_host_address(
        &mut self,
        name: &str,
        addr: IpAddr,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM host_ips WHERE host_name = ? AND address = ?")
            .bind(name)
            .bind(addr.to_string())
            .execute(&mut *self.inner)
            .await?;
        Ok(())
    }

    // Transfers

    pub async fn latest_transfer(&mut self, domain: &str) -> Result<Option<Transfer>, StoreError> {
        let row = sqlx::query(
            "SELECT id, domain_name, old_client, new_client, status, requested_at,
                    acted_at, auth_info
             FROM transfers WHERE domain_name = ?
             ORDER BY requested_at DESC, id DESC LIMIT 1",
        )
        .bind(domain)
        .fetch_optional(&mut *self.inner)
        .await?;

        row.as_ref().map(transfer_from_row).transpose()
    }

    pub async fn insert_transfer(
        &mut self,
        domain: &str,
        old_client: &str,
        new_client: &str,
        requested_at: DateTime<Utc>,
        auth_info: &str,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO transfers (domain_name, old_client, new_client, status,
                                    requested_at, auth_info)
             VALUES (?, ?, ?, 'pending', ?, ?)",
        )
        .bind(domain)
        .bind(old_client)
        .bind(new_client)
        .bind(requested_at)
        .bind(auth_info)
        .execute(&mut *self.inner)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn set_transfer_status(
        &mut self,
        id: i64,
        status: TransferStatus,
        acted_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE transfers SET status = ?, acted_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(acted_at)
            .bind(id)
            .execute(&mut *self.inner)
            .await?;
        Ok(())
    }

    /// Pending transfers requested at or before `cutoff`, oldest first.
    pub async fn pending_transfers_before(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Transfer>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, domain_name, old_client, new_client, status, requested_at,
                    acted_at, auth_info
             FROM transfers WHERE status = 'pending' AND requested_at <= ?
             ORDER BY requested_at",
        )
        .bind(cutoff)
        .fetch_all(&mut *self.inner)
        .await?;
        rows.iter().map(transfer_from_row).collect()
    }

    // Registrars

    pub async fn registrar(&mut self, id: &str) -> Result<Option<Registrar>, StoreError> {
        let row = sqlx::query("SELECT id, password_digest FROM registrars WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(Registrar {
            id: row.try_get("id")?,
            password_digest: row.try_get("password_digest")?,
        }))
    }

    pub async fn insert_registrar(&mut self, id: &str, password: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO registrars (id, password_digest) VALUES (?, ?)")
            .bind(id)
            .bind(digest_password(password))
            .execute(&mut *self.inner)
            .await
            .map_err(conflict)?;
        Ok(())
    }

    pub async fn update_registrar_password(
        &mut self,
        id: &str,
        password: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE registrars SET password_digest = ? WHERE id = ?")
            .bind(digest_password(password))
            .bind(id)
            .execute(&mut *self.inner)
            .await?;
        Ok(())
    }
}

fn transfer_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Transfer, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(Transfer {
        id: row.try_get("id")?,
        domain_name: row.try_get("domain_name")?,
        old_client: row.try_get("old_client")?,
        new_client: row.try_get("new_client")?,
        status: TransferStatus::from_str(&status)
            .map_err(|_| StoreError::Corrupt(format!("unknown transfer status {status:?}")))?,
        requested_at: row.try_get("requested_at")?,
        acted_at: row.try_get("acted_at")?,
        auth_info: row.try_get("auth_info")?,
    })
}
