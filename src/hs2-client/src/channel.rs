// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Negotiated transports that carry one message per call.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::Url;
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, trace};

use crate::error::ConnectionError;
use crate::transport::{Conn, HttpTransport, RawTransport, TcpTransport};

/// The largest message accepted from the server.
pub const MAX_MESSAGE_SIZE: usize = 256 << 20;

const THRIFT_CONTENT_TYPE: &str = "application/x-thrift";

/// A ready-to-use message channel.
///
/// A channel handles one request at a time: concurrent callers are served in
/// the order they acquired the channel, and each reply is returned to the
/// caller whose request produced it.
#[async_trait]
pub trait Channel: fmt::Debug + Send + Sync {
    /// Sends one request message and waits for its reply.
    async fn round_trip(&self, request: Bytes) -> Result<Bytes, ConnectionError>;
}

impl RawTransport {
    /// Wraps a negotiated transport into the channel that matches it.
    pub fn into_channel(self) -> Arc<dyn Channel> {
        match self {
            RawTransport::Tcp(transport) => Arc::new(TcpChannel::new(transport)),
            RawTransport::Http(transport) => Arc::new(HttpChannel::new(transport)),
        }
    }
}

/// A channel over a TCP stream with length-prefixed messages.
pub struct TcpChannel {
    peer: String,
    framed: Mutex<Framed<Conn, LengthDelimitedCodec>>,
}

impl TcpChannel {
    pub fn new(transport: TcpTransport) -> TcpChannel {
        let codec = LengthDelimitedCodec::builder()
            .length_field_length(4)
            .max_frame_length(MAX_MESSAGE_SIZE)
            .new_codec();
        let (peer, framed) = transport.framed::<_, Bytes>(codec);
        TcpChannel {
            peer,
            framed: Mutex::new(framed),
        }
    }
}

impl fmt::Debug for TcpChannel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TcpChannel")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Channel for TcpChannel {
    async fn round_trip(&self, request: Bytes) -> Result<Bytes, ConnectionError> {
        let mut framed = self.framed.lock().await;
        trace!(peer = %self.peer, len = request.len(), "sending message");
        framed.send(request).await?;
        match framed.next().await {
            Some(reply) => Ok(reply?.freeze()),
            None => Err(ConnectionError::Closed),
        }
    }
}

/// Cookies the server asked the client to replay.
///
/// Only the `name=value` pair of each `Set-Cookie` header is kept; a later
/// cookie replaces an earlier one of the same name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    /// Records the cookies set by one response.
    pub fn absorb<'a>(&mut self, set_cookies: impl IntoIterator<Item = &'a HeaderValue>) {
        for header in set_cookies {
            let Ok(header) = header.to_str() else {
                continue;
            };
            let pair = header.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() {
                continue;
            }
            match self.cookies.iter_mut().find(|(n, _)| n == name) {
                Some(existing) => existing.1 = value.to_string(),
                None => self.cookies.push((name.to_string(), value.to_string())),
            }
        }
    }

    /// The `Cookie` header to send, if any cookie was captured.
    pub fn header(&self) -> Option<HeaderValue> {
        if self.cookies.is_empty() {
            return None;
        }
        let joined = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&joined).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// A channel that sends each message as the body of an HTTP POST.
///
/// With cookie affinity enabled, cookies captured from every response are
/// sent with every later request on this channel. The jar is only touched
/// while the exchange lock is held, so no capture is lost to a concurrent
/// request.
pub struct HttpChannel {
    client: reqwest::Client,
    url: Url,
    headers: HeaderMap,
    cookie_affinity: bool,
    exchange: Mutex<CookieJar>,
}

impl HttpChannel {
    pub fn new(transport: HttpTransport) -> HttpChannel {
        let HttpTransport {
            client,
            url,
            mut headers,
            cookie_affinity,
        } = transport;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(THRIFT_CONTENT_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static(THRIFT_CONTENT_TYPE));
        HttpChannel {
            client,
            url,
            headers,
            cookie_affinity,
            exchange: Mutex::new(CookieJar::default()),
        }
    }

    /// A copy of the cookies captured so far.
    pub async fn cookies(&self) -> CookieJar {
        self.exchange.lock().await.clone()
    }
}

impl fmt::Debug for HttpChannel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpChannel")
            .field("url", &self.url.as_str())
            .field("cookie_affinity", &self.cookie_affinity)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Channel for HttpChannel {
    async fn round_trip(&self, request: Bytes) -> Result<Bytes, ConnectionError> {
        let mut jar = self.exchange.lock().await;
        let mut builder = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .body(request);
        if self.cookie_affinity {
            if let Some(cookie) = jar.header() {
                builder = builder.header(COOKIE, cookie);
            }
        }

        let response = builder.send().await?;
        if self.cookie_affinity {
            let before = jar.clone();
            jar.absorb(response.headers().get_all(SET_COOKIE));
            if *jar != before {
                debug!(url = %self.url, "captured session cookie");
            }
        }
        let status = response.status();
        if !status.is_success() {
            return Err(ConnectionError::HttpStatus {
                status,
                url: self.url.to_string(),
            });
        }
        Ok(response.bytes().await?)
    }
}
