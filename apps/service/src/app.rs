use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::sync::Notify;
use tracing::info;

use crate::config::Config;
use crate::database::{self, Database, DatabaseImpl};
use crate::dispatch::Dispatcher;
use crate::events::EventLog;
use crate::monitoring::{Notifier, Pinger, Prober};
use crate::pool;
use crate::server::sessions::SessionRegistry;
use crate::server::{Server, ServerSettings};

/// A fully wired service, bound but not yet serving
pub struct App {
    server: Server,
    pinger: Arc<Pinger>,
    shutdown: Arc<Notify>,
}

impl App {
    /// Open storage, run migrations and bind the listener.
    ///
    /// The prober and notifier are passed in so callers can swap the ICMP and
    /// SMS backends.
    pub async fn build(
        config: &Config,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let pool = pool::open_local(&config.database.path, config.database.max_connections)
            .await
            .with_context(|| format!("opening database {}", config.database.path))?;
        {
            let conn = pool.get().await.map_err(|e| anyhow!("acquiring connection: {e}"))?;
            database::initialize_database(&conn, &config.pinger)
                .await
                .context("running migrations")?;
        }
        let database: Arc<dyn Database> = Arc::new(DatabaseImpl::new_from_pool(pool));
        let pinger_config = database.pinger_config().await.context("loading pinger configuration")?;

        let events = Arc::new(EventLog::open(config.log.file_path()).await?);
        let pinger = Pinger::new(database.clone(), events.clone(), prober, notifier, pinger_config);
        let sessions = Arc::new(SessionRegistry::new());
        let shutdown = Arc::new(Notify::new());
        let dispatcher = Arc::new(Dispatcher::new(
            database.clone(),
            events.clone(),
            pinger.clone(),
            sessions.clone(),
            shutdown.clone(),
        ));

        let addr = format!("{}:{}", config.server.bind, config.server.port);
        let settings = ServerSettings::from_config(config);
        let server = Server::bind(&addr, settings, database, dispatcher, sessions, events).await?;

        Ok(Self { server, pinger, shutdown })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.server.local_addr()
    }

    /// Serve clients without the periodic sweep; returns on an admin shutdown
    pub async fn serve(self) {
        let shutdown = self.shutdown.clone();
        tokio::select! {
            _ = self.server.run() => {}
            _ = shutdown.notified() => info!("shutdown requested by an administrator"),
        }
    }

    /// Serve clients and run the periodic sweep until an admin shutdown or Ctrl-C
    pub async fn run(self) -> Result<()> {
        let sweeps = self.pinger.run();
        let shutdown = self.shutdown.clone();

        tokio::select! {
            _ = self.server.run() => {}
            _ = shutdown.notified() => info!("shutdown requested by an administrator"),
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for Ctrl-C")?;
                info!("interrupted, shutting down");
            }
        }

        sweeps.abort();
        Ok(())
    }
}
