// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::channel::Channel;
use crate::codec;
use crate::config::{ConnectionConfig, TransportKind};
use crate::connection::{ConnectionProvider, Endpoint, HttpConnection, TcpConnection};
use crate::error::Error;
use crate::negotiate::{Negotiator, SecurityContextProvider};
use crate::protocol::{
    CloseSessionReq, DelegationTokenReq, ExecuteStatementReq, FetchResultsReq, FetchResultsResp,
    GetColumnsReq, GetCrossReferenceReq, GetDelegationTokenReq, GetDelegationTokenResp,
    GetFunctionsReq, GetInfoReq, GetInfoResp, GetOperationStatusReq, GetOperationStatusResp,
    GetPrimaryKeysReq, GetQueryIdResp, GetResultSetMetadataResp, GetSchemasReq, GetTablesReq,
    OpenSessionReq, OpenSessionResp, OperationReq, OperationResp, SessionReq, StatusResp,
};
use crate::service::Hs2Service;

/// Issues the service's procedures over a negotiated [`Channel`].
#[derive(Debug)]
pub struct SessionClient {
    channel: Arc<dyn Channel>,
    seq_id: AtomicI32,
}

impl SessionClient {
    pub fn new(channel: Arc<dyn Channel>) -> SessionClient {
        SessionClient {
            channel,
            seq_id: AtomicI32::new(0),
        }
    }

    /// Connects to the endpoint described by `config`, running the
    /// configured handshake.
    ///
    /// `security` supplies Kerberos security contexts and is required only
    /// when `config` selects Kerberos.
    pub async fn connect(
        config: &ConnectionConfig,
        security: Option<Arc<dyn SecurityContextProvider>>,
    ) -> Result<SessionClient, Error> {
        if config.http_cookie_affinity && config.transport == TransportKind::Tcp {
            return Err(Error::Config(
                "cookie session affinity requires an http transport".into(),
            ));
        }
        let negotiator = Negotiator::from_config(
            &config.auth,
            config.http_cookie_affinity,
            &config.host,
            security,
        )?;
        let endpoint = Endpoint::new(config.host.clone(), config.port);
        let channel = match &config.transport {
            TransportKind::Tcp => {
                TcpConnection
                    .connect(&endpoint, config.tls.as_ref(), &negotiator)
                    .await?
            }
            TransportKind::Http { path, https } => {
                HttpConnection::new(path.clone(), *https)
                    .connect(&endpoint, config.tls.as_ref(), &negotiator)
                    .await?
            }
        };
        Ok(SessionClient::new(channel))
    }

    /// Calls `method` with `request` and decodes the reply.
    async fn invoke<Req, Resp>(&self, method: &'static str, request: &Req) -> Result<Resp, Error>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let seq_id = self.seq_id.fetch_add(1, Ordering::Relaxed);
        trace!(method, seq_id, "invoking");
        let frame = codec::encode_call(method, seq_id, request)?;
        let reply = self.channel.round_trip(frame).await?;
        Ok(codec::decode_reply(method, seq_id, &reply)?)
    }
}

#[async_trait]
impl Hs2Service for SessionClient {
    async fn open_session(&self, req: OpenSessionReq) -> Result<OpenSessionResp, Error> {
        self.invoke("OpenSession", &req).await
    }

    async fn close_session(&self, req: CloseSessionReq) -> Result<StatusResp, Error> {
        self.invoke("CloseSession", &req).await
    }

    async fn execute_statement(&self, req: ExecuteStatementReq) -> Result<OperationResp, Error> {
        self.invoke("ExecuteStatement", &req).await
    }

    async fn get_operation_status(
        &self,
        req: GetOperationStatusReq,
    ) -> Result<GetOperationStatusResp, Error> {
        self.invoke("GetOperationStatus", &req).await
    }

    async fn get_result_set_metadata(
        &self,
        req: OperationReq,
    ) -> Result<GetResultSetMetadataResp, Error> {
        self.invoke("GetResultSetMetadata", &req).await
    }

    async fn fetch_results(&self, req: FetchResultsReq) -> Result<FetchResultsResp, Error> {
        self.invoke("FetchResults", &req).await
    }

    async fn cancel_operation(&self, req: OperationReq) -> Result<StatusResp, Error> {
        self.invoke("CancelOperation", &req).await
    }

    async fn close_operation(&self, req: OperationReq) -> Result<StatusResp, Error> {
        self.invoke("CloseOperation", &req).await
    }

    async fn get_query_id(&self, req: OperationReq) -> Result<GetQueryIdResp, Error> {
        self.invoke("GetQueryId", &req).await
    }

    async fn get_info(&self, req: GetInfoReq) -> Result<GetInfoResp, Error> {
        self.invoke("GetInfo", &req).await
    }

    async fn get_type_info(&self, req: SessionReq) -> Result<OperationResp, Error> {
        self.invoke("GetTypeInfo", &req).await
    }

    async fn get_catalogs(&self, req: SessionReq) -> Result<OperationResp, Error> {
        self.invoke("GetCatalogs", &req).await
    }

    async fn get_schemas(&self, req: GetSchemasReq) -> Result<OperationResp, Error> {
        self.invoke("GetSchemas", &req).await
    }

    async fn get_tables(&self, req: GetTablesReq) -> Result<OperationResp, Error> {
        self.invoke("GetTables", &req).await
    }

    async fn get_table_types(&self, req: SessionReq) -> Result<OperationResp, Error> {
        self.invoke("GetTableTypes", &req).await
    }

    async fn get_columns(&self, req: GetColumnsReq) -> Result<OperationResp, Error> {
        self.invoke("GetColumns", &req).await
    }

    async fn get_functions(&self, req: GetFunctionsReq) -> Result<OperationResp, Error> {
        self.invoke("GetFunctions", &req).await
    }

    async fn get_primary_keys(&self, req: GetPrimaryKeysReq) -> Result<OperationResp, Error> {
        self.invoke("GetPrimaryKeys", &req).await
    }

    async fn get_cross_reference(
        &self,
        req: GetCrossReferenceReq,
    ) -> Result<OperationResp, Error> {
        self.invoke("GetCrossReference", &req).await
    }

    async fn get_delegation_token(
        &self,
        req: GetDelegationTokenReq,
    ) -> Result<GetDelegationTokenResp, Error> {
        self.invoke("GetDelegationToken", &req).await
    }

    async fn cancel_delegation_token(&self, req: DelegationTokenReq) -> Result<StatusResp, Error> {
        self.invoke("CancelDelegationToken", &req).await
    }

    async fn renew_delegation_token(&self, req: DelegationTokenReq) -> Result<StatusResp, Error> {
        self.invoke("RenewDelegationToken", &req).await
    }
}
