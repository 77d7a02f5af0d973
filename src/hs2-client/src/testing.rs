// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A scripted in-memory [`Hs2Service`] for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Error;
use crate::operation::OperationState;
pub use crate::protocol::*;
use crate::service::Hs2Service;
use crate::status::code;

#[derive(Debug, Default)]
struct State {
    calls: Vec<&'static str>,
    status: VecDeque<GetOperationStatusResp>,
    metadata: VecDeque<GetResultSetMetadataResp>,
    fetch: VecDeque<FetchResultsResp>,
    close: VecDeque<StatusResp>,
    operations: VecDeque<OperationResp>,
    fetch_requests: Vec<FetchResultsReq>,
    execute_requests: Vec<ExecuteStatementReq>,
    open_requests: Vec<OpenSessionReq>,
}

/// Answers calls from per-procedure queues. Calls whose queue is empty get a
/// successful default answer where one exists, and panic otherwise.
#[derive(Debug, Default)]
pub struct MockService {
    state: Mutex<State>,
}

impl MockService {
    fn record(&self, method: &'static str) -> std::sync::MutexGuard<'_, State> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.calls.push(method);
        state
    }

    pub fn push_status(&self, resp: GetOperationStatusResp) {
        self.state.lock().unwrap().status.push_back(resp);
    }

    pub fn push_metadata(&self, resp: GetResultSetMetadataResp) {
        self.state.lock().unwrap().metadata.push_back(resp);
    }

    pub fn push_fetch(&self, resp: FetchResultsResp) {
        self.state.lock().unwrap().fetch.push_back(resp);
    }

    /// Scripts the next close answer, for operations and sessions alike.
    pub fn push_close(&self, resp: StatusResp) {
        self.state.lock().unwrap().close.push_back(resp);
    }

    /// Scripts the answer of the next call that starts an operation.
    pub fn push_operation(&self, resp: OperationResp) {
        self.state.lock().unwrap().operations.push_back(resp);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls().into_iter().filter(|m| *m == method).count()
    }

    pub fn fetch_requests(&self) -> Vec<FetchResultsReq> {
        self.state.lock().unwrap().fetch_requests.clone()
    }

    pub fn fetch_orientations(&self) -> Vec<i32> {
        self.fetch_requests()
            .into_iter()
            .map(|req| req.orientation)
            .collect()
    }

    pub fn execute_requests(&self) -> Vec<ExecuteStatementReq> {
        self.state.lock().unwrap().execute_requests.clone()
    }

    pub fn open_requests(&self) -> Vec<OpenSessionReq> {
        self.state.lock().unwrap().open_requests.clone()
    }

    fn start_operation(&self, method: &'static str) -> OperationResp {
        self.record(method)
            .operations
            .pop_front()
            .unwrap_or_else(|| OperationResp {
                status: ok_status(),
                operation_handle: Some(operation_handle()),
            })
    }

    fn closed(&self, method: &'static str) -> StatusResp {
        self.record(method)
            .close
            .pop_front()
            .unwrap_or_else(|| StatusResp {
                status: ok_status(),
            })
    }
}

#[async_trait]
impl Hs2Service for MockService {
    async fn open_session(&self, req: OpenSessionReq) -> Result<OpenSessionResp, Error> {
        self.record("OpenSession").open_requests.push(req);
        Ok(OpenSessionResp {
            status: ok_status(),
            server_protocol_version: CLIENT_PROTOCOL_V10,
            session_handle: Some(session_handle()),
            configuration: Default::default(),
        })
    }

    async fn close_session(&self, _: CloseSessionReq) -> Result<StatusResp, Error> {
        Ok(self.closed("CloseSession"))
    }

    async fn execute_statement(&self, req: ExecuteStatementReq) -> Result<OperationResp, Error> {
        self.state.lock().unwrap().execute_requests.push(req);
        Ok(self.start_operation("ExecuteStatement"))
    }

    async fn get_operation_status(
        &self,
        _: GetOperationStatusReq,
    ) -> Result<GetOperationStatusResp, Error> {
        Ok(self
            .record("GetOperationStatus")
            .status
            .pop_front()
            .expect("unscripted GetOperationStatus"))
    }

    async fn get_result_set_metadata(
        &self,
        _: OperationReq,
    ) -> Result<GetResultSetMetadataResp, Error> {
        Ok(self
            .record("GetResultSetMetadata")
            .metadata
            .pop_front()
            .expect("unscripted GetResultSetMetadata"))
    }

    async fn fetch_results(&self, req: FetchResultsReq) -> Result<FetchResultsResp, Error> {
        let mut state = self.record("FetchResults");
        state.fetch_requests.push(req);
        Ok(state.fetch.pop_front().expect("unscripted FetchResults"))
    }

    async fn cancel_operation(&self, _: OperationReq) -> Result<StatusResp, Error> {
        drop(self.record("CancelOperation"));
        Ok(StatusResp {
            status: ok_status(),
        })
    }

    async fn close_operation(&self, _: OperationReq) -> Result<StatusResp, Error> {
        Ok(self.closed("CloseOperation"))
    }

    async fn get_query_id(&self, _: OperationReq) -> Result<GetQueryIdResp, Error> {
        drop(self.record("GetQueryId"));
        Ok(GetQueryIdResp {
            query_id: "hive_20240101000000_0001".into(),
        })
    }

    async fn get_info(&self, _: GetInfoReq) -> Result<GetInfoResp, Error> {
        drop(self.record("GetInfo"));
        Ok(GetInfoResp {
            status: ok_status(),
            info_value: Some(InfoValue {
                string_value: Some("Apache Hive".into()),
                ..Default::default()
            }),
        })
    }

    async fn get_type_info(&self, _: SessionReq) -> Result<OperationResp, Error> {
        Ok(self.start_operation("GetTypeInfo"))
    }

    async fn get_catalogs(&self, _: SessionReq) -> Result<OperationResp, Error> {
        Ok(self.start_operation("GetCatalogs"))
    }

    async fn get_schemas(&self, _: GetSchemasReq) -> Result<OperationResp, Error> {
        Ok(self.start_operation("GetSchemas"))
    }

    async fn get_tables(&self, _: GetTablesReq) -> Result<OperationResp, Error> {
        Ok(self.start_operation("GetTables"))
    }

    async fn get_table_types(&self, _: SessionReq) -> Result<OperationResp, Error> {
        Ok(self.start_operation("GetTableTypes"))
    }

    async fn get_columns(&self, _: GetColumnsReq) -> Result<OperationResp, Error> {
        Ok(self.start_operation("GetColumns"))
    }

    async fn get_functions(&self, _: GetFunctionsReq) -> Result<OperationResp, Error> {
        Ok(self.start_operation("GetFunctions"))
    }

    async fn get_primary_keys(&self, _: GetPrimaryKeysReq) -> Result<OperationResp, Error> {
        Ok(self.start_operation("GetPrimaryKeys"))
    }

    async fn get_cross_reference(&self, _: GetCrossReferenceReq) -> Result<OperationResp, Error> {
        Ok(self.start_operation("GetCrossReference"))
    }

    async fn get_delegation_token(
        &self,
        req: GetDelegationTokenReq,
    ) -> Result<GetDelegationTokenResp, Error> {
        drop(self.record("GetDelegationToken"));
        Ok(GetDelegationTokenResp {
            status: ok_status(),
            delegation_token: Some(format!("token-for-{}", req.renewer)),
        })
    }

    async fn cancel_delegation_token(&self, _: DelegationTokenReq) -> Result<StatusResp, Error> {
        Ok(self.closed("CancelDelegationToken"))
    }

    async fn renew_delegation_token(&self, _: DelegationTokenReq) -> Result<StatusResp, Error> {
        Ok(self.closed("RenewDelegationToken"))
    }
}

pub fn ok_status() -> WireStatus {
    WireStatus::from_code(code::SUCCESS)
}

pub fn error_status(message: &str) -> WireStatus {
    WireStatus {
        status_code: code::ERROR,
        error_message: Some(message.into()),
        ..Default::default()
    }
}

pub fn invalid_handle_status(message: &str) -> WireStatus {
    WireStatus {
        status_code: code::INVALID_HANDLE,
        error_message: Some(message.into()),
        ..Default::default()
    }
}

pub fn session_handle() -> SessionHandle {
    SessionHandle {
        session_id: HandleIdentifier {
            guid: vec![1; 16],
            secret: vec![2; 16],
        },
    }
}

pub fn operation_handle() -> OperationHandle {
    OperationHandle {
        operation_id: HandleIdentifier {
            guid: vec![3; 16],
            secret: vec![4; 16],
        },
        operation_type: 0,
        has_result_set: true,
        modified_row_count: None,
    }
}

pub fn status_resp(state: OperationState, has_result_set: bool) -> GetOperationStatusResp {
    GetOperationStatusResp {
        status: ok_status(),
        operation_state: Some(state.wire_code()),
        has_result_set: Some(has_result_set),
        ..Default::default()
    }
}

pub fn schema(names: &[&str]) -> GetResultSetMetadataResp {
    GetResultSetMetadataResp {
        status: ok_status(),
        schema: Some(TableSchema {
            columns: names
                .iter()
                .enumerate()
                .map(|(i, name)| ColumnDesc {
                    column_name: name.to_string(),
                    type_name: "INT_TYPE".into(),
                    position: i32::try_from(i).expect("small") + 1,
                    comment: None,
                })
                .collect(),
        }),
    }
}

pub fn fetch_resp(has_more_rows: Option<bool>, results: RowSet) -> FetchResultsResp {
    FetchResultsResp {
        status: ok_status(),
        has_more_rows,
        results: Some(results),
    }
}

/// A page with a single `INT` column.
pub fn i32_page(values: &[i32]) -> RowSet {
    RowSet {
        start_row_offset: 0,
        columns: vec![Column {
            i32_val: Some(TypedColumn::new(values.to_vec())),
            ..Default::default()
        }],
    }
}
