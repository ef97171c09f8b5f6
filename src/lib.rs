//! Issue commands to HAProxy over its Runtime API.
//!
//! Every command opens a fresh connection to a stats socket, switches the session to numbered
//! severities, and closes the connection once the answer is read. A [`Dispatcher`] serializes
//! commands per socket, bounds each one with a deadline, and retries transport failures once.
//! On top of it, [`Client`] offers typed operations for ACLs, maps, SSL storage, crt-lists, OCSP
//! responses, stick tables, ACME, and servers, plus staged [`Transaction`]s and an
//! [`EventListener`] for ring buffer sinks.
//!
//! # Examples
//! ```no_run
//! use hapctl::{Client, ClientConfig, ResourceKind};
//!
//! # async fn demo(pem: &str) -> hapctl::Result<()> {
//! let client = Client::new(&ClientConfig::from_file("/etc/hapctl.toml")?.with_env_overrides()?)?;
//!
//! let mut tx = client.update_transaction(ResourceKind::SslCert, "/etc/ssl/site.pem")?;
//! tx.set(pem).await?;
//! if let Err(err) = tx.commit().await {
//!     tx.abort().await?;
//!     return Err(err);
//! }
//! # Ok(()) }
//! ```

pub mod classifier;
mod client;
pub mod commands;
mod config;
pub mod connection;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod frame;
mod logging;
pub mod parsers;
pub mod requests;
pub mod runtime;
pub mod transaction;

#[cfg(test)]
mod testing;

pub use classifier::{Phase, ResourceKind};
pub use client::Client;
pub use commands::{Command, Target};
pub use config::{ClientConfig, SocketConfig};
pub use connection::{
    Connection, ConnectionBuilder, Endpoint, ProcessRole, SocketTransport, Transport,
    UnixSocketBuilder,
};
pub use dispatcher::{DispatchSettings, Dispatcher};
pub use errors::{Error, Result};
pub use events::{EventFlags, EventListener, EventRecord};
pub use logging::init_logging;
pub use requests::{AclId, BackendId, ErrorFlag, MapId, PatternRef, ServerRef, ServerState};
pub use runtime::*;
pub use transaction::{Transaction, TransactionState, VersionedTransaction};
