// imap-alarms-api: Async Rust client for the OpenNMS alarm REST endpoints

pub mod alarms;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::{AlarmClient, Credentials};
pub use error::Error;
pub use models::{AlarmCollection, RemoteAlarm};
pub use transport::{RetryPolicy, TlsMode, TransportConfig};
