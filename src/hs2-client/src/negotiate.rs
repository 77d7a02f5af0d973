// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Handshakes that must complete before calls flow over a transport.
//!
//! Over TCP the service speaks SASL: the client opens with a `START` frame
//! naming the mechanism and the two sides trade `OK` frames until the server
//! answers `COMPLETE`, or refuses with `BAD`/`ERROR`. Over HTTP every request
//! carries its credentials in headers, so negotiation only decides which
//! headers the channel attaches.
//!
//! Negotiation never retries. A transport whose handshake failed is dropped.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::codec::{SaslCodec, SaslFrame, SaslStatus};
use crate::config::AuthConfig;
use crate::error::{AuthenticationError, ConnectionError, Error};
use crate::transport::{Conn, HttpTransport, RawTransport, TcpTransport};

const PLAIN: &str = "PLAIN";
const GSSAPI: &str = "GSSAPI";

/// Username and password sent when none are configured.
pub const DEFAULT_CREDENTIAL: &str = "anonymous";

/// One side of a GSSAPI security context, e.g. a Kerberos ticket exchange.
#[async_trait]
pub trait SecurityContext: Send {
    /// Produces the next token. The first call receives no challenge.
    async fn step(&mut self, challenge: Option<&[u8]>) -> Result<Vec<u8>, AuthenticationError>;

    /// Reports whether the context is established.
    fn is_complete(&self) -> bool;
}

/// Creates [`SecurityContext`]s for a service principal.
pub trait SecurityContextProvider: fmt::Debug + Send + Sync {
    fn new_context(
        &self,
        service: &str,
        host: &str,
    ) -> Result<Box<dyn SecurityContext>, AuthenticationError>;
}

#[derive(Clone)]
pub struct PlainCredentials {
    pub authzid: Option<String>,
    pub username: String,
    pub password: String,
}

impl PlainCredentials {
    pub fn new(username: Option<String>, password: Option<String>) -> PlainCredentials {
        PlainCredentials {
            authzid: None,
            username: username.unwrap_or_else(|| DEFAULT_CREDENTIAL.into()),
            password: password.unwrap_or_else(|| DEFAULT_CREDENTIAL.into()),
        }
    }

    /// The `PLAIN` mechanism message: `authzid NUL username NUL password`.
    fn sasl_message(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_slice(self.authzid.as_deref().unwrap_or_default().as_bytes());
        buf.put_u8(0);
        buf.put_slice(self.username.as_bytes());
        buf.put_u8(0);
        buf.put_slice(self.password.as_bytes());
        buf.freeze()
    }
}

impl fmt::Debug for PlainCredentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PlainCredentials")
            .field("authzid", &self.authzid)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct KerberosConfig {
    /// Service name of the principal, usually `hive`.
    pub service: String,
    /// Host part of the principal.
    pub fqdn: String,
    pub provider: Arc<dyn SecurityContextProvider>,
}

/// The handshake run on a raw transport, selected from configuration.
#[derive(Clone, Debug)]
pub enum Negotiator {
    /// No handshake at all.
    NoSasl,
    Plain(PlainCredentials),
    Kerberos(KerberosConfig),
    /// Replays session cookies on top of another scheme. HTTP only.
    HttpCookie(Box<Negotiator>),
}

impl Negotiator {
    pub fn from_config(
        auth: &AuthConfig,
        http_cookie_affinity: bool,
        host: &str,
        security: Option<Arc<dyn SecurityContextProvider>>,
    ) -> Result<Negotiator, Error> {
        let negotiator = match auth {
            AuthConfig::NoSasl => Negotiator::NoSasl,
            AuthConfig::Plain { username, password } => {
                Negotiator::Plain(PlainCredentials::new(username.clone(), password.clone()))
            }
            AuthConfig::Kerberos { service, fqdn } => {
                let provider = security.ok_or_else(|| {
                    Error::Config("kerberos requires a security context provider".into())
                })?;
                Negotiator::Kerberos(KerberosConfig {
                    service: service.clone(),
                    fqdn: fqdn.clone().unwrap_or_else(|| host.to_string()),
                    provider,
                })
            }
        };
        Ok(if http_cookie_affinity {
            Negotiator::HttpCookie(Box::new(negotiator))
        } else {
            negotiator
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Negotiator::NoSasl => "nosasl",
            Negotiator::Plain(_) => "plain",
            Negotiator::Kerberos(_) => "kerberos",
            Negotiator::HttpCookie(_) => "http-cookie",
        }
    }

    /// Runs the handshake on `raw` and returns the transport ready for calls.
    pub async fn negotiate(&self, raw: RawTransport) -> Result<RawTransport, Error> {
        match raw {
            RawTransport::Tcp(transport) => {
                self.negotiate_tcp(transport).await.map(RawTransport::Tcp)
            }
            RawTransport::Http(transport) => {
                self.negotiate_http(transport).await.map(RawTransport::Http)
            }
        }
    }

    async fn negotiate_tcp(&self, transport: TcpTransport) -> Result<TcpTransport, Error> {
        debug!(peer = %transport.peer, mechanism = self.name(), "negotiating tcp transport");
        match self {
            Negotiator::NoSasl => Ok(transport),
            Negotiator::Plain(credentials) => plain_sasl(credentials, transport).await,
            Negotiator::Kerberos(kerberos) => gssapi_sasl(kerberos, transport).await,
            Negotiator::HttpCookie(_) => Err(Error::Config(
                "cookie session affinity requires an http transport".into(),
            )),
        }
    }

    async fn negotiate_http(&self, mut transport: HttpTransport) -> Result<HttpTransport, Error> {
        debug!(url = %transport.url, mechanism = self.name(), "negotiating http transport");
        let (scheme, cookie_affinity) = match self {
            Negotiator::HttpCookie(inner) => (&**inner, true),
            scheme => (scheme, false),
        };
        match scheme {
            Negotiator::NoSasl => {}
            Negotiator::Plain(credentials) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(format!(
                    "{}:{}",
                    credentials.username, credentials.password
                ));
                transport.set_header(AUTHORIZATION, header_value(&format!("Basic {encoded}"))?);
            }
            Negotiator::Kerberos(kerberos) => {
                let mut context = kerberos
                    .provider
                    .new_context(&kerberos.service, &kerberos.fqdn)?;
                let token = context.step(None).await?;
                let encoded = base64::engine::general_purpose::STANDARD.encode(token);
                transport.set_header(AUTHORIZATION, header_value(&format!("Negotiate {encoded}"))?);
            }
            Negotiator::HttpCookie(_) => {
                return Err(Error::Config("cookie session affinity cannot be nested".into()));
            }
        }
        transport.cookie_affinity = cookie_affinity;
        Ok(transport)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::Config("credentials are not a valid http header value".into()))
}

async fn next_frame(
    framed: &mut Framed<Conn, SaslCodec>,
) -> Result<SaslFrame, ConnectionError> {
    match framed.next().await {
        Some(frame) => Ok(frame?),
        None => Err(ConnectionError::Closed),
    }
}

fn rejection(mechanism: &'static str, frame: SaslFrame) -> Error {
    match frame.status {
        SaslStatus::Bad | SaslStatus::Error => AuthenticationError::Rejected {
            mechanism,
            message: frame.message(),
        }
        .into(),
        status => AuthenticationError::UnexpectedFrame { mechanism, status }.into(),
    }
}

async fn plain_sasl(
    credentials: &PlainCredentials,
    transport: TcpTransport,
) -> Result<TcpTransport, Error> {
    let (peer, mut framed) = transport.framed::<_, SaslFrame>(SaslCodec);
    framed
        .feed(SaslFrame::new(SaslStatus::Start, PLAIN))
        .await
        .map_err(ConnectionError::from)?;
    framed
        .send(SaslFrame::new(SaslStatus::Complete, credentials.sasl_message()))
        .await
        .map_err(ConnectionError::from)?;

    let frame = next_frame(&mut framed).await?;
    if frame.status != SaslStatus::Complete {
        return Err(rejection(PLAIN, frame));
    }
    debug!(%peer, username = %credentials.username, "plain negotiation complete");
    Ok(TcpTransport::from_framed(peer, framed))
}

async fn gssapi_sasl(
    kerberos: &KerberosConfig,
    transport: TcpTransport,
) -> Result<TcpTransport, Error> {
    let mut context = kerberos
        .provider
        .new_context(&kerberos.service, &kerberos.fqdn)?;
    let initial = context.step(None).await?;

    let (peer, mut framed) = transport.framed::<_, SaslFrame>(SaslCodec);
    framed
        .feed(SaslFrame::new(SaslStatus::Start, GSSAPI))
        .await
        .map_err(ConnectionError::from)?;
    let status = status_for(&*context);
    framed
        .send(SaslFrame::new(status, initial))
        .await
        .map_err(ConnectionError::from)?;

    let mut rounds = 0;
    loop {
        let frame = next_frame(&mut framed).await?;
        match frame.status {
            SaslStatus::Ok => {
                rounds += 1;
                trace!(%peer, rounds, "gssapi challenge");
                let response = context.step(Some(&frame.payload[..])).await?;
                let status = status_for(&*context);
                framed
                    .send(SaslFrame::new(status, response))
                    .await
                    .map_err(ConnectionError::from)?;
            }
            SaslStatus::Complete => {
                if !context.is_complete() {
                    context.step(Some(&frame.payload[..])).await?;
                }
                if !context.is_complete() {
                    return Err(AuthenticationError::SecurityContext(
                        "server completed negotiation before the security context".into(),
                    )
                    .into());
                }
                debug!(%peer, rounds, principal = %kerberos.service, "gssapi negotiation complete");
                return Ok(TcpTransport::from_framed(peer, framed));
            }
            _ => return Err(rejection(GSSAPI, frame)),
        }
    }
}

fn status_for(context: &dyn SecurityContext) -> SaslStatus {
    if context.is_complete() {
        SaslStatus::Complete
    } else {
        SaslStatus::Ok
    }
}
