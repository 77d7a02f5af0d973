// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A client driver for HiveServer2-compatible query services.
//!
//! Connecting runs the configured handshake over a fresh TCP or HTTP
//! transport and yields a [`Session`]. Statements submitted through the
//! session become [`Operation`]s, whose results are retrieved page by page
//! with a [`ResultPager`]:
//!
//! ```no_run
//! # async fn run() -> Result<(), mz_hs2_client::Error> {
//! use std::time::Duration;
//!
//! use mz_hs2_client::{utils, ConnectionConfig};
//!
//! let config = ConnectionConfig::new("localhost", 10000);
//! let session = mz_hs2_client::connect(&config, None).await?;
//! let mut operation = session
//!     .execute_statement("SELECT 1", Default::default())
//!     .await?;
//! utils::wait_until_ready(&mut operation, false, Duration::from_millis(100), |_| {}).await?;
//! let mut pager = session.pager(operation);
//! let rows = utils::fetch_all(&mut pager).await?;
//! # drop(rows);
//! # Ok(())
//! # }
//! ```
//!
//! Nothing in the driver polls or retries on its own. Callers decide when to
//! poll an operation and when to give up on it.

use std::sync::Arc;

mod channel;
mod client;
pub mod codec;
mod config;
mod connection;
mod error;
mod negotiate;
mod operation;
mod pager;
pub mod protocol;
pub mod result;
mod service;
mod session;
mod status;
mod transport;
pub mod utils;

#[cfg(test)]
mod testing;

pub use mz_tls_util::TlsMaterial;

pub use crate::channel::{Channel, CookieJar, HttpChannel, TcpChannel, MAX_MESSAGE_SIZE};
pub use crate::client::SessionClient;
pub use crate::config::{AuthArg, AuthConfig, ConnectionConfig, Hs2Args, TransportArg, TransportKind};
pub use crate::connection::{ConnectionProvider, Endpoint, HttpConnection, TcpConnection};
pub use crate::error::{AuthenticationError, ConnectionError, Error, RemoteOperationError};
pub use crate::negotiate::{
    KerberosConfig, Negotiator, PlainCredentials, SecurityContext, SecurityContextProvider,
    DEFAULT_CREDENTIAL,
};
pub use crate::operation::{Operation, OperationSnapshot, OperationState};
pub use crate::pager::{ResultPager, DEFAULT_PAGE_SIZE};
pub use crate::service::Hs2Service;
pub use crate::session::{CrossReference, ExecuteOptions, Session};
pub use crate::status::{code, Status, StatusCode};
pub use crate::transport::{Conn, HttpTransport, RawTransport, TcpTransport};

/// Connects to the endpoint described by `config` and opens a session.
///
/// `security` supplies Kerberos security contexts and is required only when
/// `config` selects Kerberos.
pub async fn connect(
    config: &ConnectionConfig,
    security: Option<Arc<dyn SecurityContextProvider>>,
) -> Result<Session, Error> {
    let client = SessionClient::connect(config, security).await?;
    Session::open(Arc::new(client), config).await
}
