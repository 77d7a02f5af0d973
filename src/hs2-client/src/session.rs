// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Sessions and the calls that start operations within them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{AuthConfig, ConnectionConfig};
use crate::error::{ConnectionError, Error};
use crate::negotiate::DEFAULT_CREDENTIAL;
use crate::operation::Operation;
use crate::pager::ResultPager;
use crate::protocol::{
    CloseSessionReq, DelegationTokenReq, ExecuteStatementReq, FetchKind, GetColumnsReq,
    GetCrossReferenceReq, GetDelegationTokenReq, GetFunctionsReq, GetInfoReq, GetPrimaryKeysReq,
    GetSchemasReq, GetTablesReq, InfoValue, OpenSessionReq, OperationResp, SessionHandle,
    SessionReq, StatusResp,
};
use crate::service::Hs2Service;
use crate::status::Status;

/// Options for [`Session::execute_statement`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Return as soon as the statement is submitted rather than when it
    /// completes.
    pub run_async: bool,
    /// Seconds after which the service times the statement out. Zero
    /// disables the timeout.
    pub query_timeout: i64,
    /// Session configuration overrides for this statement only.
    pub conf_overlay: BTreeMap<String, String>,
}

impl Default for ExecuteOptions {
    fn default() -> ExecuteOptions {
        ExecuteOptions {
            run_async: true,
            query_timeout: 0,
            conf_overlay: BTreeMap::new(),
        }
    }
}

/// Identifies the two tables of [`Session::get_cross_reference`]. Unset
/// fields match any value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CrossReference {
    pub parent_catalog: Option<String>,
    pub parent_schema: Option<String>,
    pub parent_table: Option<String>,
    pub foreign_catalog: Option<String>,
    pub foreign_schema: Option<String>,
    pub foreign_table: Option<String>,
}

/// An open session on the service.
///
/// Every operation started through a session shares the session's
/// [`Hs2Service`], and with it the underlying channel.
#[derive(Debug)]
pub struct Session {
    service: Arc<dyn Hs2Service>,
    handle: SessionHandle,
    server_protocol_version: i32,
    configuration: BTreeMap<String, String>,
    max_rows: i64,
    fetch_kind: FetchKind,
}

impl Session {
    /// Opens a session with the credentials and session configuration of
    /// `config`.
    pub async fn open(
        service: Arc<dyn Hs2Service>,
        config: &ConnectionConfig,
    ) -> Result<Session, Error> {
        let (username, password) = match &config.auth {
            AuthConfig::Plain { username, password } => (
                Some(username.clone().unwrap_or_else(|| DEFAULT_CREDENTIAL.into())),
                Some(password.clone().unwrap_or_else(|| DEFAULT_CREDENTIAL.into())),
            ),
            AuthConfig::NoSasl | AuthConfig::Kerberos { .. } => (None, None),
        };
        let resp = service
            .open_session(OpenSessionReq {
                client_protocol: config.client_protocol,
                username,
                password,
                configuration: config.session_configuration.clone(),
            })
            .await?;
        Status::from_wire(&resp.status).into_result()?;
        let handle = resp.session_handle.ok_or_else(|| ConnectionError::Protocol {
            method: "OpenSession",
            message: "response carries no session handle".into(),
        })?;
        info!(
            server_protocol_version = resp.server_protocol_version,
            "session opened"
        );
        Ok(Session {
            service,
            handle,
            server_protocol_version: resp.server_protocol_version,
            configuration: resp.configuration,
            max_rows: config.max_rows,
            fetch_kind: config.fetch_kind,
        })
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// The protocol version the service agreed to speak.
    pub fn server_protocol_version(&self) -> i32 {
        self.server_protocol_version
    }

    /// Session configuration as reported back by the service.
    pub fn configuration(&self) -> &BTreeMap<String, String> {
        &self.configuration
    }

    /// Submits `statement` for execution.
    pub async fn execute_statement(
        &self,
        statement: &str,
        options: ExecuteOptions,
    ) -> Result<Operation, Error> {
        debug!(run_async = options.run_async, "executing statement");
        let resp = self
            .service
            .execute_statement(ExecuteStatementReq {
                session_handle: self.handle.clone(),
                statement: statement.into(),
                conf_overlay: options.conf_overlay,
                run_async: options.run_async,
                query_timeout: options.query_timeout,
            })
            .await?;
        self.started("ExecuteStatement", resp)
    }

    /// Returns a pager over `operation`'s results, configured with this
    /// session's page size and fetch kind.
    pub fn pager(&self, operation: Operation) -> ResultPager {
        let mut pager = ResultPager::new(operation);
        pager.set_page_size(self.max_rows);
        pager.set_fetch_kind(self.fetch_kind);
        pager
    }

    pub async fn get_info(&self, info_type: i32) -> Result<InfoValue, Error> {
        let resp = self
            .service
            .get_info(GetInfoReq {
                session_handle: self.handle.clone(),
                info_type,
            })
            .await?;
        Status::from_wire(&resp.status).into_result()?;
        Ok(resp.info_value.unwrap_or_default())
    }

    pub async fn get_type_info(&self) -> Result<Operation, Error> {
        let resp = self.service.get_type_info(self.session_req()).await?;
        self.started("GetTypeInfo", resp)
    }

    pub async fn get_catalogs(&self) -> Result<Operation, Error> {
        let resp = self.service.get_catalogs(self.session_req()).await?;
        self.started("GetCatalogs", resp)
    }

    pub async fn get_schemas(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
    ) -> Result<Operation, Error> {
        let resp = self
            .service
            .get_schemas(GetSchemasReq {
                session_handle: self.handle.clone(),
                catalog_name: catalog.map(Into::into),
                schema_name: schema.map(Into::into),
            })
            .await?;
        self.started("GetSchemas", resp)
    }

    /// Lists tables matching the given patterns. `table_types` restricts the
    /// result to tables of the named types, e.g. `TABLE` or `VIEW`.
    pub async fn get_tables(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        table_types: Option<&[&str]>,
    ) -> Result<Operation, Error> {
        let resp = self
            .service
            .get_tables(GetTablesReq {
                session_handle: self.handle.clone(),
                catalog_name: catalog.map(Into::into),
                schema_name: schema.map(Into::into),
                table_name: table.map(Into::into),
                table_types: table_types.map(|types| types.iter().map(|t| t.to_string()).collect()),
            })
            .await?;
        self.started("GetTables", resp)
    }

    pub async fn get_table_types(&self) -> Result<Operation, Error> {
        let resp = self.service.get_table_types(self.session_req()).await?;
        self.started("GetTableTypes", resp)
    }

    pub async fn get_columns(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        column: Option<&str>,
    ) -> Result<Operation, Error> {
        let resp = self
            .service
            .get_columns(GetColumnsReq {
                session_handle: self.handle.clone(),
                catalog_name: catalog.map(Into::into),
                schema_name: schema.map(Into::into),
                table_name: table.map(Into::into),
                column_name: column.map(Into::into),
            })
            .await?;
        self.started("GetColumns", resp)
    }

    pub async fn get_functions(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        function: &str,
    ) -> Result<Operation, Error> {
        let resp = self
            .service
            .get_functions(GetFunctionsReq {
                session_handle: self.handle.clone(),
                catalog_name: catalog.map(Into::into),
                schema_name: schema.map(Into::into),
                function_name: function.into(),
            })
            .await?;
        self.started("GetFunctions", resp)
    }

    pub async fn get_primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> Result<Operation, Error> {
        let resp = self
            .service
            .get_primary_keys(GetPrimaryKeysReq {
                session_handle: self.handle.clone(),
                catalog_name: catalog.map(Into::into),
                schema_name: schema.map(Into::into),
                table_name: table.map(Into::into),
            })
            .await?;
        self.started("GetPrimaryKeys", resp)
    }

    pub async fn get_cross_reference(&self, tables: CrossReference) -> Result<Operation, Error> {
        let resp = self
            .service
            .get_cross_reference(GetCrossReferenceReq {
                session_handle: self.handle.clone(),
                parent_catalog_name: tables.parent_catalog,
                parent_schema_name: tables.parent_schema,
                parent_table_name: tables.parent_table,
                foreign_catalog_name: tables.foreign_catalog,
                foreign_schema_name: tables.foreign_schema,
                foreign_table_name: tables.foreign_table,
            })
            .await?;
        self.started("GetCrossReference", resp)
    }

    /// Obtains a delegation token for `owner`, renewable by `renewer`.
    pub async fn get_delegation_token(&self, owner: &str, renewer: &str) -> Result<String, Error> {
        let resp = self
            .service
            .get_delegation_token(GetDelegationTokenReq {
                session_handle: self.handle.clone(),
                owner: owner.into(),
                renewer: renewer.into(),
            })
            .await?;
        Status::from_wire(&resp.status).into_result()?;
        Ok(resp.delegation_token.ok_or_else(|| ConnectionError::Protocol {
            method: "GetDelegationToken",
            message: "response carries no token".into(),
        })?)
    }

    pub async fn cancel_delegation_token(&self, token: &str) -> Result<Status, Error> {
        let resp = self
            .service
            .cancel_delegation_token(self.token_req(token))
            .await?;
        Self::reported(resp)
    }

    pub async fn renew_delegation_token(&self, token: &str) -> Result<Status, Error> {
        let resp = self
            .service
            .renew_delegation_token(self.token_req(token))
            .await?;
        Self::reported(resp)
    }

    /// Closes the session. The service releases the session's operations.
    pub async fn close(self) -> Result<Status, Error> {
        let resp = self
            .service
            .close_session(CloseSessionReq {
                session_handle: self.handle,
            })
            .await?;
        let status = Self::reported(resp)?;
        debug!("session closed");
        Ok(status)
    }

    fn started(&self, method: &'static str, resp: OperationResp) -> Result<Operation, Error> {
        Status::from_wire(&resp.status).into_result()?;
        let handle = resp.operation_handle.ok_or_else(|| ConnectionError::Protocol {
            method,
            message: "response carries no operation handle".into(),
        })?;
        Ok(Operation::new(Arc::clone(&self.service), handle))
    }

    fn session_req(&self) -> SessionReq {
        SessionReq {
            session_handle: self.handle.clone(),
        }
    }

    fn token_req(&self, token: &str) -> DelegationTokenReq {
        DelegationTokenReq {
            session_handle: self.handle.clone(),
            delegation_token: token.into(),
        }
    }

    fn reported(resp: StatusResp) -> Result<Status, Error> {
        Ok(Status::from_wire(&resp.status).into_result()?)
    }
}

#[cfg(test)]
mod tests {
    use crate::operation::OperationState;
    use crate::protocol::CLIENT_PROTOCOL_V10;
    use crate::status::StatusCode;
    use crate::testing::{self, MockService};

    use super::*;

    async fn open(mock: &Arc<MockService>, config: &ConnectionConfig) -> Session {
        Session::open(Arc::<MockService>::clone(mock), config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn open_defaults_to_anonymous() {
        let mock = Arc::new(MockService::default());
        let config = ConnectionConfig::new("localhost", 10000)
            .session_configuration("hive.server2.proxy.user", "etl");
        let session = open(&mock, &config).await;
        assert_eq!(session.server_protocol_version(), CLIENT_PROTOCOL_V10);

        let req = &mock.open_requests()[0];
        assert_eq!(req.client_protocol, CLIENT_PROTOCOL_V10);
        assert_eq!(req.username.as_deref(), Some("anonymous"));
        assert_eq!(req.password.as_deref(), Some("anonymous"));
        assert_eq!(
            req.configuration.get("hive.server2.proxy.user").map(String::as_str),
            Some("etl")
        );
    }

    #[tokio::test]
    async fn open_without_credentials_for_nosasl() {
        let mock = Arc::new(MockService::default());
        let config = ConnectionConfig::new("localhost", 10000).auth(AuthConfig::NoSasl);
        open(&mock, &config).await;
        let req = &mock.open_requests()[0];
        assert_eq!((req.username.as_ref(), req.password.as_ref()), (None, None));
    }

    #[tokio::test]
    async fn execute_options() {
        let mock = Arc::new(MockService::default());
        let session = open(&mock, &ConnectionConfig::new("localhost", 10000)).await;

        let op = session
            .execute_statement("SELECT 1", ExecuteOptions::default())
            .await
            .unwrap();
        assert_eq!(op.state(), OperationState::Initialized);
        assert!(!op.has_pending_result_set());

        let mut options = ExecuteOptions {
            run_async: false,
            query_timeout: 30,
            ..Default::default()
        };
        options
            .conf_overlay
            .insert("hive.exec.parallel".into(), "true".into());
        session.execute_statement("SELECT 2", options).await.unwrap();

        let requests = mock.execute_requests();
        assert_eq!(requests[0].statement, "SELECT 1");
        assert!(requests[0].run_async);
        assert_eq!(requests[0].query_timeout, 0);
        assert!(!requests[1].run_async);
        assert_eq!(requests[1].query_timeout, 30);
        assert_eq!(requests[1].conf_overlay.len(), 1);
        assert_eq!(requests[1].session_handle, *session.handle());
    }

    #[tokio::test]
    async fn execute_error_status() {
        let mock = Arc::new(MockService::default());
        let session = open(&mock, &ConnectionConfig::new("localhost", 10000)).await;
        mock.push_operation(testing::OperationResp {
            status: testing::error_status("Table not found 'missing'"),
            operation_handle: None,
        });

        let err = session
            .execute_statement("SELECT * FROM missing", Default::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.remote_status().map(|s| s.code),
            Some(StatusCode::Error)
        );
    }

    #[tokio::test]
    async fn missing_operation_handle() {
        let mock = Arc::new(MockService::default());
        let session = open(&mock, &ConnectionConfig::new("localhost", 10000)).await;
        mock.push_operation(testing::OperationResp {
            status: testing::ok_status(),
            operation_handle: None,
        });

        let err = session.get_catalogs().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::Protocol {
                method: "GetCatalogs",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn metadata_calls_start_operations() {
        let mock = Arc::new(MockService::default());
        let session = open(&mock, &ConnectionConfig::new("localhost", 10000)).await;

        session.get_type_info().await.unwrap();
        session.get_catalogs().await.unwrap();
        session.get_schemas(None, Some("default")).await.unwrap();
        session
            .get_tables(None, Some("default"), Some("%"), Some(&["TABLE", "VIEW"]))
            .await
            .unwrap();
        session.get_table_types().await.unwrap();
        session
            .get_columns(None, Some("default"), Some("t"), None)
            .await
            .unwrap();
        session.get_functions(None, None, "upper").await.unwrap();
        session
            .get_primary_keys(None, Some("default"), Some("t"))
            .await
            .unwrap();
        let op = session
            .get_cross_reference(CrossReference {
                parent_table: Some("a".into()),
                foreign_table: Some("b".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(op.handle(), &testing::operation_handle());

        assert_eq!(
            &mock.calls()[1..],
            &[
                "GetTypeInfo",
                "GetCatalogs",
                "GetSchemas",
                "GetTables",
                "GetTableTypes",
                "GetColumns",
                "GetFunctions",
                "GetPrimaryKeys",
                "GetCrossReference",
            ]
        );
    }

    #[tokio::test]
    async fn info_and_tokens() {
        let mock = Arc::new(MockService::default());
        let session = open(&mock, &ConnectionConfig::new("localhost", 10000)).await;

        let info = session.get_info(18).await.unwrap();
        assert_eq!(info.string_value.as_deref(), Some("Apache Hive"));

        let token = session.get_delegation_token("etl", "hive").await.unwrap();
        assert_eq!(token, "token-for-hive");
        session.renew_delegation_token(&token).await.unwrap();

        mock.push_close(testing::StatusResp {
            status: testing::error_status("token already canceled"),
        });
        let err = session.cancel_delegation_token(&token).await.unwrap_err();
        assert!(err.to_string().contains("token already canceled"));
    }

    #[tokio::test]
    async fn pager_uses_session_settings() {
        let mock = Arc::new(MockService::default());
        let config = ConnectionConfig::new("localhost", 10000)
            .max_rows(7)
            .fetch_kind(FetchKind::Log);
        let session = open(&mock, &config).await;
        let mut op = session
            .execute_statement("SELECT 1", Default::default())
            .await
            .unwrap();
        mock.push_status(testing::status_resp(OperationState::Finished, true));
        op.poll_status(false).await.unwrap();

        let mut pager = session.pager(op);
        mock.push_metadata(testing::schema(&["x"]));
        mock.push_fetch(testing::fetch_resp(Some(false), testing::i32_page(&[1])));
        pager.fetch().await.unwrap();

        let req = &mock.fetch_requests()[0];
        assert_eq!((req.max_rows, req.fetch_type), (7, 1));
    }

    #[tokio::test]
    async fn close_session() {
        let mock = Arc::new(MockService::default());
        let session = open(&mock, &ConnectionConfig::new("localhost", 10000)).await;
        let status = session.close().await.unwrap();
        assert_eq!(status.code, StatusCode::Success);
        assert_eq!(mock.count("CloseSession"), 1);
    }
}
