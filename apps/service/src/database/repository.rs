use async_trait::async_trait;
use libsql::{Connection, Row, params};
use thiserror::Error;

use super::models::{Access, Folder, Host, HostState, PhoneNumber, PingerConfig, SmsConfig, User};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Failure of a single storage call
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<libsql::Error> for StoreError {
    fn from(err: libsql::Error) -> Self {
        if is_unique_violation(&err) {
            StoreError::Conflict
        } else {
            StoreError::Backend(err.into())
        }
    }
}

impl From<deadpool::managed::PoolError<libsql::Error>> for StoreError {
    fn from(err: deadpool::managed::PoolError<libsql::Error>) -> Self {
        StoreError::Backend(anyhow::anyhow!("connection pool: {err}"))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(err.into())
    }
}

fn is_unique_violation(err: &libsql::Error) -> bool {
    err.to_string().contains("UNIQUE constraint failed")
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One column of a host row
#[derive(Debug, Clone, PartialEq)]
pub enum HostUpdate {
    Name(String),
    Folder(i64),
    State(HostState),
    Info(String),
    Sms(Option<SmsConfig>),
    Ip(String),
    LastChange(i64),
}

impl HostUpdate {
    /// Short field name, used in error messages and audit lines
    pub fn field(&self) -> &'static str {
        match self {
            HostUpdate::Name(_) => "name",
            HostUpdate::Folder(_) => "folder",
            HostUpdate::State(_) => "state",
            HostUpdate::Info(_) => "info",
            HostUpdate::Sms(_) => "sms",
            HostUpdate::Ip(_) => "ip",
            HostUpdate::LastChange(_) => "time",
        }
    }
}

/// Storage backend for hosts, folders, users, phones and the pinger row.
///
/// Every call is independent; callers must not assume that a sequence of
/// calls is atomic.
#[async_trait]
pub trait Database: Send + Sync {
    /// All hosts in insertion order
    async fn list_hosts(&self) -> StoreResult<Vec<Host>>;

    async fn get_host(&self, ip: &str) -> StoreResult<Option<Host>>;

    async fn insert_host(&self, host: &Host) -> StoreResult<()>;

    /// Change one column of a host
    async fn update_host(&self, ip: &str, update: HostUpdate) -> StoreResult<()>;

    async fn delete_host(&self, ip: &str) -> StoreResult<()>;

    /// Move every host of folder `from` into folder `to`, returning how many moved
    async fn reassign_hosts(&self, from: i64, to: i64) -> StoreResult<u64>;

    async fn count_hosts_in_folder(&self, folder_id: i64) -> StoreResult<u64>;

    async fn list_folders(&self) -> StoreResult<Vec<Folder>>;

    async fn get_folder(&self, id: i64) -> StoreResult<Option<Folder>>;

    async fn insert_folder(&self, folder: &Folder) -> StoreResult<()>;

    async fn rename_folder(&self, id: i64, name: &str) -> StoreResult<()>;

    /// Give a folder a new id; member hosts follow it
    async fn change_folder_id(&self, id: i64, new_id: i64) -> StoreResult<()>;

    async fn delete_folder(&self, id: i64) -> StoreResult<()>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn update_user(
        &self,
        login: &str,
        password: Option<&str>,
        access: Option<Access>,
    ) -> StoreResult<()>;

    async fn delete_user(&self, login: &str) -> StoreResult<()>;

    async fn touch_last_online(&self, login: &str, at: i64) -> StoreResult<()>;

    async fn list_phones(&self) -> StoreResult<Vec<PhoneNumber>>;

    async fn insert_phone(&self, phone: &PhoneNumber) -> StoreResult<()>;

    async fn update_phone_info(&self, number: &str, info: &str) -> StoreResult<()>;

    async fn delete_phone(&self, number: &str) -> StoreResult<()>;

    async fn pinger_config(&self) -> StoreResult<PingerConfig>;

    async fn save_pinger_config(&self, config: &PingerConfig) -> StoreResult<()>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

const HOST_COLUMNS: &str = "ip, name, folder_id, state, last_change_time, info, sms";

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> StoreResult<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    fn host_from_row(row: &Row) -> StoreResult<Host> {
        let state: String = row.get(3)?;
        let sms: Option<String> = row.get(6)?;

        Ok(Host {
            ip: row.get(0)?,
            name: row.get(1)?,
            folder_id: row.get(2)?,
            state: state.parse().map_err(anyhow::Error::from)?,
            last_change_time: row.get(4)?,
            info: row.get(5)?,
            sms_config: sms
                .filter(|raw| !raw.is_empty())
                .map(|raw| serde_json::from_str::<SmsConfig>(&raw))
                .transpose()?,
        })
    }

    fn user_from_row(row: &Row) -> StoreResult<User> {
        let access: String = row.get(2)?;
        Ok(User {
            login: row.get(0)?,
            password: row.get(1)?,
            access: access.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            last_online: row.get(3)?,
        })
    }

    async fn query_hosts(
        conn: &Connection,
        sql: &str,
        args: impl libsql::params::IntoParams,
    ) -> StoreResult<Vec<Host>> {
        let mut rows = conn.query(sql, args).await?;
        let mut hosts = Vec::new();
        while let Some(row) = rows.next().await? {
            hosts.push(Self::host_from_row(&row)?);
        }
        Ok(hosts)
    }

    fn affected_one(affected: u64) -> StoreResult<()> {
        if affected == 0 { Err(StoreError::NotFound) } else { Ok(()) }
    }
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn list_hosts(&self) -> StoreResult<Vec<Host>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {HOST_COLUMNS} FROM hosts ORDER BY rowid");
        Self::query_hosts(&conn, &sql, ()).await
    }

    async fn get_host(&self, ip: &str) -> StoreResult<Option<Host>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {HOST_COLUMNS} FROM hosts WHERE ip = ?");
        let hosts = Self::query_hosts(&conn, &sql, params![ip]).await?;
        Ok(hosts.into_iter().next())
    }

    async fn insert_host(&self, host: &Host) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        let sms = host.sms_config.as_ref().map(serde_json::to_string).transpose()?;

        conn.execute(
            "INSERT INTO hosts (ip, name, folder_id, state, last_change_time, info, sms)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                host.ip.clone(),
                host.name.clone(),
                host.folder_id,
                host.state.as_str(),
                host.last_change_time,
                host.info.clone(),
                sms
            ],
        )
        .await?;
        Ok(())
    }

    async fn update_host(&self, ip: &str, update: HostUpdate) -> StoreResult<()> {
        let conn = self.get_conn().await?;

        let affected = match update {
            HostUpdate::Name(name) => {
                conn.execute("UPDATE hosts SET name = ? WHERE ip = ?", params![name, ip]).await?
            }
            HostUpdate::Folder(folder_id) => {
                conn.execute("UPDATE hosts SET folder_id = ? WHERE ip = ?", params![folder_id, ip])
                    .await?
            }
            HostUpdate::State(state) => {
                conn.execute("UPDATE hosts SET state = ? WHERE ip = ?", params![state.as_str(), ip])
                    .await?
            }
            HostUpdate::Info(info) => {
                conn.execute("UPDATE hosts SET info = ? WHERE ip = ?", params![info, ip]).await?
            }
            HostUpdate::Sms(sms) => {
                let sms = sms.as_ref().map(serde_json::to_string).transpose()?;
                conn.execute("UPDATE hosts SET sms = ? WHERE ip = ?", params![sms, ip]).await?
            }
            HostUpdate::Ip(new_ip) => {
                conn.execute("UPDATE hosts SET ip = ? WHERE ip = ?", params![new_ip, ip]).await?
            }
            HostUpdate::LastChange(at) => {
                conn.execute("UPDATE hosts SET last_change_time = ? WHERE ip = ?", params![at, ip])
                    .await?
            }
        };

        Self::affected_one(affected)
    }

    async fn delete_host(&self, ip: &str) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        let affected = conn.execute("DELETE FROM hosts WHERE ip = ?", params![ip]).await?;
        Self::affected_one(affected)
    }

    async fn reassign_hosts(&self, from: i64, to: i64) -> StoreResult<u64> {
        let conn = self.get_conn().await?;
        let moved = conn
            .execute("UPDATE hosts SET folder_id = ? WHERE folder_id = ?", params![to, from])
            .await?;
        Ok(moved)
    }

    async fn count_hosts_in_folder(&self, folder_id: i64) -> StoreResult<u64> {
        let conn = self.get_conn().await?;
        let mut rows =
            conn.query("SELECT COUNT(*) FROM hosts WHERE folder_id = ?", params![folder_id]).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?.max(0) as u64),
            None => Ok(0),
        }
    }

    async fn list_folders(&self) -> StoreResult<Vec<Folder>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT id, name FROM folders ORDER BY id", ()).await?;
        let mut folders = Vec::new();
        while let Some(row) = rows.next().await? {
            folders.push(Folder { id: row.get(0)?, name: row.get(1)? });
        }
        Ok(folders)
    }

    async fn get_folder(&self, id: i64) -> StoreResult<Option<Folder>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT id, name FROM folders WHERE id = ?", params![id]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Folder { id: row.get(0)?, name: row.get(1)? })),
            None => Ok(None),
        }
    }

    async fn insert_folder(&self, folder: &Folder) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO folders (id, name) VALUES (?, ?)",
            params![folder.id, folder.name.clone()],
        )
        .await?;
        Ok(())
    }

    async fn rename_folder(&self, id: i64, name: &str) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        let affected =
            conn.execute("UPDATE folders SET name = ? WHERE id = ?", params![name, id]).await?;
        Self::affected_one(affected)
    }

    async fn change_folder_id(&self, id: i64, new_id: i64) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        let affected =
            tx.execute("UPDATE folders SET id = ? WHERE id = ?", params![new_id, id]).await?;
        if affected == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }
        tx.execute("UPDATE hosts SET folder_id = ? WHERE folder_id = ?", params![new_id, id])
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_folder(&self, id: i64) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        let affected = conn.execute("DELETE FROM folders WHERE id = ?", params![id]).await?;
        Self::affected_one(affected)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT login, password, access, last_online FROM users ORDER BY rowid", ())
            .await?;
        let mut users = Vec::new();
        while let Some(row) = rows.next().await? {
            users.push(Self::user_from_row(&row)?);
        }
        Ok(users)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO users (login, password, access, last_online) VALUES (?, ?, ?, ?)",
            params![
                user.login.clone(),
                user.password.clone(),
                user.access.as_str(),
                user.last_online
            ],
        )
        .await?;
        Ok(())
    }

    async fn update_user(
        &self,
        login: &str,
        password: Option<&str>,
        access: Option<Access>,
    ) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT 1 FROM users WHERE login = ?", params![login]).await?;
        if rows.next().await?.is_none() {
            return Err(StoreError::NotFound);
        }

        if let Some(password) = password {
            conn.execute("UPDATE users SET password = ? WHERE login = ?", params![password, login])
                .await?;
        }
        if let Some(access) = access {
            conn.execute(
                "UPDATE users SET access = ? WHERE login = ?",
                params![access.as_str(), login],
            )
            .await?;
        }
        Ok(())
    }

    async fn delete_user(&self, login: &str) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        let affected = conn.execute("DELETE FROM users WHERE login = ?", params![login]).await?;
        Self::affected_one(affected)
    }

    async fn touch_last_online(&self, login: &str, at: i64) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        let affected = conn
            .execute("UPDATE users SET last_online = ? WHERE login = ?", params![at, login])
            .await?;
        Self::affected_one(affected)
    }

    async fn list_phones(&self) -> StoreResult<Vec<PhoneNumber>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT number, info FROM phones ORDER BY rowid", ()).await?;
        let mut phones = Vec::new();
        while let Some(row) = rows.next().await? {
            phones.push(PhoneNumber { number: row.get(0)?, info: row.get(1)? });
        }
        Ok(phones)
    }

    async fn insert_phone(&self, phone: &PhoneNumber) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO phones (number, info) VALUES (?, ?)",
            params![phone.number.clone(), phone.info.clone()],
        )
        .await?;
        Ok(())
    }

    async fn update_phone_info(&self, number: &str, info: &str) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        let affected = conn
            .execute("UPDATE phones SET info = ? WHERE number = ?", params![info, number])
            .await?;
        Self::affected_one(affected)
    }

    async fn delete_phone(&self, number: &str) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        let affected = conn.execute("DELETE FROM phones WHERE number = ?", params![number]).await?;
        Self::affected_one(affected)
    }

    async fn pinger_config(&self) -> StoreResult<PingerConfig> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT auto_ping_interval_s, icmp_count, icmp_interval_s, hosts_per_second,
                    icmp_timeout_s
                 FROM pinger_config WHERE id = 1",
                (),
            )
            .await?;

        let row = rows.next().await?.ok_or(StoreError::NotFound)?;
        Ok(PingerConfig {
            auto_ping_interval_s: row.get::<i64>(0)?.max(1) as u64,
            icmp_count: row.get::<i64>(1)?.clamp(1, i64::from(u32::MAX)) as u32,
            icmp_interval_s: row.get(2)?,
            hosts_per_second: row.get::<i64>(3)?.clamp(1, i64::from(u32::MAX)) as u32,
            icmp_timeout_s: row.get(4)?,
        })
    }

    async fn save_pinger_config(&self, config: &PingerConfig) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO pinger_config (id, auto_ping_interval_s, icmp_count, icmp_interval_s,
                hosts_per_second, icmp_timeout_s)
             VALUES (1, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                auto_ping_interval_s = excluded.auto_ping_interval_s,
                icmp_count = excluded.icmp_count,
                icmp_interval_s = excluded.icmp_interval_s,
                hosts_per_second = excluded.hosts_per_second,
                icmp_timeout_s = excluded.icmp_timeout_s",
            params![
                config.auto_ping_interval_s as i64,
                i64::from(config.icmp_count),
                config.icmp_interval_s,
                i64::from(config.hosts_per_second),
                config.icmp_timeout_s
            ],
        )
        .await?;
        Ok(())
    }
}
