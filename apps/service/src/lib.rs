//! hostwatch - host availability monitor.
//!
//! Probes a set of hosts over ICMP, keeps their state in a local database and
//! lets authenticated clients watch and administer it over the framed TCP
//! protocol from `hostwatch-proto`.

pub mod app;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod events;
pub mod monitoring;
pub mod pool;
pub mod server;

pub use app::App;
