// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::io;

use mz_tls_util::TlsError;
use thiserror::Error;

use crate::codec::SaslStatus;
use crate::operation::OperationState;
use crate::status::Status;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),
    #[error(transparent)]
    RemoteOperation(#[from] RemoteOperationError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("operation ended in state {state}: {detail}")]
    OperationEnded {
        state: OperationState,
        detail: String,
    },
}

impl Error {
    /// Returns the mapped status if the service reported the failure.
    pub fn remote_status(&self) -> Option<&Status> {
        match self {
            Error::RemoteOperation(err) => Some(&err.status),
            _ => None,
        }
    }
}

/// The transport failed or carried something the driver cannot interpret.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("transport: {0}")]
    Io(#[from] io::Error),
    #[error("tls: {0}")]
    Tls(#[from] TlsError),
    #[error("tls handshake: {0}")]
    TlsHandshake(#[from] openssl::ssl::Error),
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),
    #[error("http status {status} from {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("connection closed by server")]
    Closed,
    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("{method}: {message}")]
    Protocol {
        method: &'static str,
        message: String,
    },
    #[error("{method}: remote exception: {message}")]
    Application {
        method: &'static str,
        message: String,
    },
}

/// The remote service refused the handshake, or the handshake could not be
/// carried out.
#[derive(Error, Debug)]
pub enum AuthenticationError {
    #[error("{mechanism} authentication rejected: {message}")]
    Rejected {
        mechanism: &'static str,
        message: String,
    },
    #[error("{mechanism} handshake: unexpected {status:?} frame")]
    UnexpectedFrame {
        mechanism: &'static str,
        status: SaslStatus,
    },
    #[error("security context: {0}")]
    SecurityContext(String),
}

/// The service answered with an error status.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{status}")]
pub struct RemoteOperationError {
    pub status: Status,
}
