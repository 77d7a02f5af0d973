// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A tiny utility library for making TLS connectors.

use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use openssl::stack::Stack;
use openssl::x509::X509;
use serde::{Deserialize, Serialize};
use tracing::debug;

macro_rules! bail_generic {
    ($fmt:expr, $($arg:tt)*) => {
        return Err(TlsError::Generic(anyhow::anyhow!($fmt, $($arg)*)))
    };
    ($err:expr $(,)?) => {
        return Err(TlsError::Generic(anyhow::anyhow!($err)))
    };
}

/// An error representing tls failures.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// Any other error we bail on.
    #[error(transparent)]
    Generic(#[from] anyhow::Error),
    /// Error from openssl while assembling the connector.
    #[error(transparent)]
    OpenSsl(#[from] openssl::error::ErrorStack),
}

/// PEM-encoded TLS material for a client connection.
///
/// The client certificate and key must be provided together.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TlsMaterial {
    /// Additional root certificate to trust.
    pub ca: Option<String>,
    /// Client certificate chain.
    pub cert: Option<String>,
    /// Private key for `cert`.
    pub key: Option<String>,
}

impl TlsMaterial {
    /// Returns the client certificate and key, if both are present.
    pub fn identity(&self) -> Result<Option<(&str, &str)>, TlsError> {
        match (&self.cert, &self.key) {
            (Some(cert), Some(key)) => Ok(Some((cert, key))),
            (None, Some(_)) => {
                bail_generic!("must provide both cert and key, but only provided key")
            }
            (Some(_), None) => {
                bail_generic!("must provide both cert and key, but only provided cert")
            }
            (None, None) => Ok(None),
        }
    }
}

/// Creates a TLS connector that verifies the peer against the system roots
/// plus the CA in `material`, presenting the client identity if one is set.
pub fn make_connector(material: &TlsMaterial) -> Result<SslConnector, TlsError> {
    let mut builder = SslConnector::builder(SslMethod::tls_client())?;
    builder.set_verify(SslVerifyMode::PEER);

    if let Some((cert, key)) = material.identity()? {
        builder.set_certificate(&*X509::from_pem(cert.as_bytes())?)?;
        builder.set_private_key(&*PKey::private_key_from_pem(key.as_bytes())?)?;
    }
    if let Some(ca) = &material.ca {
        let mut certs = X509::stack_from_pem(ca.as_bytes())?;
        if certs.is_empty() {
            // A bundle without any well-formed block parses as empty.
            certs.push(X509::from_pem(ca.as_bytes())?);
        }
        for cert in certs {
            builder.cert_store_mut().add_cert(cert)?;
        }
    }

    debug!(
        custom_ca = material.ca.is_some(),
        client_identity = material.cert.is_some(),
        "built tls connector"
    );
    Ok(builder.build())
}

pub struct Pkcs12Archive {
    pub der: Vec<u8>,
    pub pass: String,
}

/// Constructs an identity from a PEM-formatted key and certificate using OpenSSL.
pub fn pkcs12der_from_pem(
    key: &[u8],
    cert: &[u8],
) -> Result<Pkcs12Archive, openssl::error::ErrorStack> {
    let mut buf = Vec::new();
    buf.extend(key);
    buf.push(b'\n');
    buf.extend(cert);
    let pem = buf.as_slice();
    let pkey = PKey::private_key_from_pem(pem)?;
    let mut certs = Stack::new()?;

    // `X509::stack_from_pem` may return no certificates for a malformed
    // certificate block, in which case `X509::from_pem` produces the error.
    let mut cert_iter = X509::stack_from_pem(pem)?.into_iter();
    let cert = match cert_iter.next() {
        Some(cert) => cert,
        None => X509::from_pem(pem)?,
    };
    for cert in cert_iter {
        certs.push(cert)?;
    }
    // The archive only exists to be handed to `reqwest::Identity`, so the
    // password and friendly name don't matter.
    let pass = String::new();
    let der = Pkcs12::builder()
        .name("")
        .pkey(&pkey)
        .cert(&cert)
        .ca(certs)
        .build2(&pass)?
        .to_der()?;
    Ok(Pkcs12Archive { der, pass })
}
