// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Raw transports, before and during negotiation.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Url;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_openssl::SslStream;
use tokio_util::codec::{Decoder, Encoder, Framed, FramedParts};

/// A TCP stream, optionally wrapped in TLS.
#[derive(Debug)]
pub enum Conn {
    Unencrypted(TcpStream),
    Ssl(SslStream<TcpStream>),
}

impl AsyncRead for Conn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context,
        buf: &mut ReadBuf,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Unencrypted(inner) => Pin::new(inner).poll_read(cx, buf),
            Conn::Ssl(inner) => Pin::new(inner).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Conn {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Conn::Unencrypted(inner) => Pin::new(inner).poll_write(cx, buf),
            Conn::Ssl(inner) => Pin::new(inner).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Unencrypted(inner) => Pin::new(inner).poll_flush(cx),
            Conn::Ssl(inner) => Pin::new(inner).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Unencrypted(inner) => Pin::new(inner).poll_shutdown(cx),
            Conn::Ssl(inner) => Pin::new(inner).poll_shutdown(cx),
        }
    }
}

/// A connected TCP transport.
///
/// Bytes the server sent past the end of the handshake are kept in
/// `read_buf` so that switching codecs never loses data.
#[derive(Debug)]
pub struct TcpTransport {
    pub peer: String,
    pub io: Conn,
    pub read_buf: BytesMut,
}

impl TcpTransport {
    pub fn new(peer: String, io: Conn) -> TcpTransport {
        TcpTransport {
            peer,
            io,
            read_buf: BytesMut::new(),
        }
    }

    /// Frames the transport with `codec`.
    pub fn framed<C, I>(self, codec: C) -> (String, Framed<Conn, C>)
    where
        C: Decoder + Encoder<I>,
    {
        let mut parts = FramedParts::new::<I>(self.io, codec);
        parts.read_buf = self.read_buf;
        (self.peer, Framed::from_parts(parts))
    }

    /// Recovers the transport from a framed stream. Unflushed writes are
    /// dropped, so callers flush before switching codecs.
    pub fn from_framed<C>(peer: String, framed: Framed<Conn, C>) -> TcpTransport {
        let parts = framed.into_parts();
        TcpTransport {
            peer,
            io: parts.io,
            read_buf: parts.read_buf,
        }
    }
}

/// An HTTP transport: the client that carries each message, the endpoint,
/// and the headers negotiation attached.
#[derive(Clone)]
pub struct HttpTransport {
    pub client: reqwest::Client,
    pub url: Url,
    pub headers: HeaderMap,
    /// Whether `Set-Cookie` values are replayed on later requests.
    pub cookie_affinity: bool,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, url: Url) -> HttpTransport {
        HttpTransport {
            client,
            url,
            headers: HeaderMap::new(),
            cookie_affinity: false,
        }
    }

    pub fn set_header(&mut self, name: reqwest::header::HeaderName, mut value: HeaderValue) {
        value.set_sensitive(name == reqwest::header::AUTHORIZATION);
        self.headers.insert(name, value);
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("cookie_affinity", &self.cookie_affinity)
            .finish()
    }
}

/// A transport that has not yet been wrapped into a [`crate::Channel`].
#[derive(Debug)]
pub enum RawTransport {
    Tcp(TcpTransport),
    Http(HttpTransport),
}
