// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Establishing channels to the service.
//!
//! A provider dials a fresh raw transport on every call to
//! [`ConnectionProvider::connect`], attaches TLS when material is configured,
//! hands the transport to the [`Negotiator`] and wraps the result in a
//! [`Channel`]. A transport whose negotiation failed is dropped, never
//! reused.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use mz_tls_util::{TlsError, TlsMaterial};
use openssl::ssl::Ssl;
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;
use tracing::{debug, info};

use crate::channel::Channel;
use crate::error::{ConnectionError, Error};
use crate::negotiate::Negotiator;
use crate::transport::{Conn, HttpTransport, RawTransport, TcpTransport};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Endpoint {
        Endpoint {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Opens a new channel to `endpoint`.
    async fn connect(
        &self,
        endpoint: &Endpoint,
        tls: Option<&TlsMaterial>,
        negotiator: &Negotiator,
    ) -> Result<Arc<dyn Channel>, Error>;
}

/// Connects over TCP with length-prefixed framing.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnection;

impl TcpConnection {
    async fn dial(endpoint: &Endpoint, tls: Option<&TlsMaterial>) -> Result<Conn, ConnectionError> {
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
        stream.set_nodelay(true)?;
        let Some(material) = tls else {
            return Ok(Conn::Unencrypted(stream));
        };

        let connector = mz_tls_util::make_connector(material)?;
        let ssl: Ssl = connector
            .configure()
            .and_then(|config| config.into_ssl(&endpoint.host))
            .map_err(TlsError::from)?;
        let mut stream = SslStream::new(ssl, stream).map_err(TlsError::from)?;
        Pin::new(&mut stream).connect().await?;
        debug!(%endpoint, "tls established");
        Ok(Conn::Ssl(stream))
    }
}

#[async_trait]
impl ConnectionProvider for TcpConnection {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        tls: Option<&TlsMaterial>,
        negotiator: &Negotiator,
    ) -> Result<Arc<dyn Channel>, Error> {
        let io = Self::dial(endpoint, tls).await?;
        let raw = RawTransport::Tcp(TcpTransport::new(endpoint.to_string(), io));
        let transport = negotiator.negotiate(raw).await?;
        info!(%endpoint, mechanism = negotiator.name(), tls = tls.is_some(), "connected");
        Ok(transport.into_channel())
    }
}

/// Connects over HTTP, one POST per message.
#[derive(Clone, Debug)]
pub struct HttpConnection {
    path: String,
    https: bool,
}

impl HttpConnection {
    /// `https` forces TLS even when no TLS material is configured.
    pub fn new(path: impl Into<String>, https: bool) -> HttpConnection {
        HttpConnection {
            path: path.into(),
            https,
        }
    }

    fn url(&self, endpoint: &Endpoint, tls: bool) -> Result<Url, Error> {
        let scheme = if tls || self.https { "https" } else { "http" };
        let path = self.path.trim_start_matches('/');
        Url::parse(&format!("{scheme}://{endpoint}/{path}"))
            .map_err(|e| Error::Config(format!("invalid http endpoint: {e}")))
    }

    fn client(tls: Option<&TlsMaterial>) -> Result<reqwest::Client, ConnectionError> {
        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        if let Some(material) = tls {
            if let Some(ca) = &material.ca {
                builder = builder.add_root_certificate(reqwest::Certificate::from_pem(ca.as_bytes())?);
            }
            if let Some((cert, key)) = material.identity()? {
                let archive = mz_tls_util::pkcs12der_from_pem(key.as_bytes(), cert.as_bytes())
                    .map_err(TlsError::from)?;
                builder = builder.identity(reqwest::Identity::from_pkcs12_der(
                    &archive.der,
                    &archive.pass,
                )?);
            }
        }
        Ok(builder.build()?)
    }
}

#[async_trait]
impl ConnectionProvider for HttpConnection {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        tls: Option<&TlsMaterial>,
        negotiator: &Negotiator,
    ) -> Result<Arc<dyn Channel>, Error> {
        let url = self.url(endpoint, tls.is_some())?;
        let client = Self::client(tls)?;
        let raw = RawTransport::Http(HttpTransport::new(client, url.clone()));
        let transport = negotiator.negotiate(raw).await?;
        info!(%url, mechanism = negotiator.name(), "connected");
        Ok(transport.into_channel())
    }
}
