// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::path::PathBuf;

use mz_tls_util::TlsMaterial;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::pager::DEFAULT_PAGE_SIZE;
use crate::protocol::{FetchKind, CLIENT_PROTOCOL_V10};

/// How messages reach the service.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportKind {
    /// Length-prefixed messages on a TCP stream.
    #[default]
    Tcp,
    /// One POST per message to `path`.
    Http { path: String, https: bool },
}

#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthConfig {
    NoSasl,
    Plain {
        username: Option<String>,
        password: Option<String>,
    },
    Kerberos {
        service: String,
        /// Defaults to the connection host.
        fqdn: Option<String>,
    },
}

impl Default for AuthConfig {
    fn default() -> AuthConfig {
        AuthConfig::Plain {
            username: None,
            password: None,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AuthConfig::NoSasl => f.write_str("NoSasl"),
            AuthConfig::Plain { username, password } => f
                .debug_struct("Plain")
                .field("username", username)
                .field("password", &password.as_ref().map(|_| "<redacted>"))
                .finish(),
            AuthConfig::Kerberos { service, fqdn } => f
                .debug_struct("Kerberos")
                .field("service", service)
                .field("fqdn", fqdn)
                .finish(),
        }
    }
}

/// Configuration for connecting to a HiveServer2 endpoint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) transport: TransportKind,
    pub(crate) tls: Option<TlsMaterial>,
    pub(crate) auth: AuthConfig,
    pub(crate) http_cookie_affinity: bool,
    pub(crate) max_rows: i64,
    pub(crate) fetch_kind: FetchKind,
    pub(crate) session_configuration: BTreeMap<String, String>,
    pub(crate) client_protocol: i32,
}

impl ConnectionConfig {
    /// Constructs a new `ConnectionConfig` for a plain TCP connection to
    /// `host:port` with anonymous credentials.
    pub fn new(host: impl Into<String>, port: u16) -> ConnectionConfig {
        ConnectionConfig {
            host: host.into(),
            port,
            transport: TransportKind::Tcp,
            tls: None,
            auth: AuthConfig::default(),
            http_cookie_affinity: false,
            max_rows: DEFAULT_PAGE_SIZE,
            fetch_kind: FetchKind::QueryOutput,
            session_configuration: BTreeMap::new(),
            client_protocol: CLIENT_PROTOCOL_V10,
        }
    }

    pub fn transport(mut self, transport: TransportKind) -> ConnectionConfig {
        self.transport = transport;
        self
    }

    /// Attaches TLS material. Connections with TLS material always encrypt.
    pub fn tls(mut self, tls: TlsMaterial) -> ConnectionConfig {
        self.tls = Some(tls);
        self
    }

    pub fn auth(mut self, auth: AuthConfig) -> ConnectionConfig {
        self.auth = auth;
        self
    }

    /// Replays session cookies on HTTP connections.
    pub fn http_cookie_affinity(mut self, enabled: bool) -> ConnectionConfig {
        self.http_cookie_affinity = enabled;
        self
    }

    /// The default number of rows requested per fetch.
    pub fn max_rows(mut self, max_rows: i64) -> ConnectionConfig {
        self.max_rows = max_rows;
        self
    }

    pub fn fetch_kind(mut self, fetch_kind: FetchKind) -> ConnectionConfig {
        self.fetch_kind = fetch_kind;
        self
    }

    /// Adds a session configuration entry sent with `OpenSession`.
    pub fn session_configuration(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> ConnectionConfig {
        self.session_configuration.insert(key.into(), value.into());
        self
    }

    pub fn client_protocol(mut self, client_protocol: i32) -> ConnectionConfig {
        self.client_protocol = client_protocol;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn get_max_rows(&self) -> i64 {
        self.max_rows
    }

    pub fn get_fetch_kind(&self) -> FetchKind {
        self.fetch_kind
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportArg {
    Tcp,
    Http,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum AuthArg {
    Nosasl,
    Plain,
    Kerberos,
}

/// Command line arguments for connecting to HiveServer2.
#[derive(Debug, Clone, clap::Parser)]
pub struct Hs2Args {
    /// Host of the HiveServer2 endpoint.
    #[clap(long, env = "HS2_HOST", default_value = "localhost")]
    pub hs2_host: String,
    /// Port of the HiveServer2 endpoint.
    #[clap(long, env = "HS2_PORT", default_value_t = 10000)]
    pub hs2_port: u16,
    /// Transport used to reach the endpoint.
    #[clap(long, env = "HS2_TRANSPORT", value_enum, default_value_t = TransportArg::Tcp)]
    pub hs2_transport: TransportArg,
    /// URL path of the HTTP endpoint.
    #[clap(long, env = "HS2_HTTP_PATH", default_value = "cliservice")]
    pub hs2_http_path: String,
    /// Authentication mechanism.
    #[clap(long, env = "HS2_AUTH", value_enum, default_value_t = AuthArg::Plain)]
    pub hs2_auth: AuthArg,
    #[clap(long, env = "HS2_USERNAME")]
    pub hs2_username: Option<String>,
    #[clap(long, env = "HS2_PASSWORD", hide_env_values = true)]
    pub hs2_password: Option<String>,
    /// Service name of the Kerberos principal.
    #[clap(long, env = "HS2_KERBEROS_SERVICE", default_value = "hive")]
    pub hs2_kerberos_service: String,
    /// Host part of the Kerberos principal, if not the endpoint host.
    #[clap(long, env = "HS2_KERBEROS_FQDN")]
    pub hs2_kerberos_fqdn: Option<String>,
    /// PEM file with an additional root certificate. Enables TLS.
    #[clap(long, env = "HS2_TLS_CA_FILE")]
    pub hs2_tls_ca_file: Option<PathBuf>,
    /// PEM file with the client certificate. Enables TLS.
    #[clap(long, env = "HS2_TLS_CERT_FILE", requires = "hs2_tls_key_file")]
    pub hs2_tls_cert_file: Option<PathBuf>,
    /// PEM file with the client key.
    #[clap(long, env = "HS2_TLS_KEY_FILE", requires = "hs2_tls_cert_file")]
    pub hs2_tls_key_file: Option<PathBuf>,
    /// Replay session cookies on HTTP connections.
    #[clap(long, env = "HS2_HTTP_COOKIE_AFFINITY")]
    pub hs2_http_cookie_affinity: bool,
    /// Rows requested per fetch.
    #[clap(long, env = "HS2_MAX_ROWS", default_value_t = DEFAULT_PAGE_SIZE)]
    pub hs2_max_rows: i64,
}

impl Hs2Args {
    /// Builds the configuration, reading any TLS files.
    pub fn into_config(self) -> Result<ConnectionConfig, Error> {
        let read = |path: &Option<PathBuf>| -> Result<Option<String>, Error> {
            path.as_ref()
                .map(|path| {
                    std::fs::read_to_string(path).map_err(|e| {
                        Error::Config(format!("reading {}: {e}", path.display()))
                    })
                })
                .transpose()
        };
        let tls = TlsMaterial {
            ca: read(&self.hs2_tls_ca_file)?,
            cert: read(&self.hs2_tls_cert_file)?,
            key: read(&self.hs2_tls_key_file)?,
        };
        let use_tls = tls != TlsMaterial::default();

        let transport = match self.hs2_transport {
            TransportArg::Tcp => TransportKind::Tcp,
            TransportArg::Http => TransportKind::Http {
                path: self.hs2_http_path,
                https: use_tls,
            },
        };
        let auth = match self.hs2_auth {
            AuthArg::Nosasl => AuthConfig::NoSasl,
            AuthArg::Plain => AuthConfig::Plain {
                username: self.hs2_username,
                password: self.hs2_password,
            },
            AuthArg::Kerberos => AuthConfig::Kerberos {
                service: self.hs2_kerberos_service,
                fqdn: self.hs2_kerberos_fqdn,
            },
        };

        let mut config = ConnectionConfig::new(self.hs2_host, self.hs2_port)
            .transport(transport)
            .auth(auth)
            .http_cookie_affinity(self.hs2_http_cookie_affinity)
            .max_rows(self.hs2_max_rows);
        if use_tls {
            config = config.tls(tls);
        }
        Ok(config)
    }
}
