// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::Error;
use crate::protocol::{
    CloseSessionReq, DelegationTokenReq, ExecuteStatementReq, FetchResultsReq, FetchResultsResp,
    GetColumnsReq, GetCrossReferenceReq, GetDelegationTokenReq, GetDelegationTokenResp,
    GetFunctionsReq, GetInfoReq, GetInfoResp, GetOperationStatusReq, GetOperationStatusResp,
    GetPrimaryKeysReq, GetQueryIdResp, GetResultSetMetadataResp, GetSchemasReq, GetTablesReq,
    OpenSessionReq, OpenSessionResp, OperationReq, OperationResp, SessionReq, StatusResp,
};

/// The remote procedures of a HiveServer2 service.
///
/// Implementations perform exactly one round trip per call and return the
/// response as sent. Errors are reserved for failures to obtain a response;
/// error statuses inside a response are for the caller to interpret.
#[async_trait]
pub trait Hs2Service: Debug + Send + Sync {
    async fn open_session(&self, req: OpenSessionReq) -> Result<OpenSessionResp, Error>;
    async fn close_session(&self, req: CloseSessionReq) -> Result<StatusResp, Error>;
    async fn execute_statement(&self, req: ExecuteStatementReq) -> Result<OperationResp, Error>;
    async fn get_operation_status(
        &self,
        req: GetOperationStatusReq,
    ) -> Result<GetOperationStatusResp, Error>;
    async fn get_result_set_metadata(
        &self,
        req: OperationReq,
    ) -> Result<GetResultSetMetadataResp, Error>;
    async fn fetch_results(&self, req: FetchResultsReq) -> Result<FetchResultsResp, Error>;
    async fn cancel_operation(&self, req: OperationReq) -> Result<StatusResp, Error>;
    async fn close_operation(&self, req: OperationReq) -> Result<StatusResp, Error>;
    async fn get_query_id(&self, req: OperationReq) -> Result<GetQueryIdResp, Error>;

    async fn get_info(&self, req: GetInfoReq) -> Result<GetInfoResp, Error>;
    async fn get_type_info(&self, req: SessionReq) -> Result<OperationResp, Error>;
    async fn get_catalogs(&self, req: SessionReq) -> Result<OperationResp, Error>;
    async fn get_schemas(&self, req: GetSchemasReq) -> Result<OperationResp, Error>;
    async fn get_tables(&self, req: GetTablesReq) -> Result<OperationResp, Error>;
    async fn get_table_types(&self, req: SessionReq) -> Result<OperationResp, Error>;
    async fn get_columns(&self, req: GetColumnsReq) -> Result<OperationResp, Error>;
    async fn get_functions(&self, req: GetFunctionsReq) -> Result<OperationResp, Error>;
    async fn get_primary_keys(&self, req: GetPrimaryKeysReq) -> Result<OperationResp, Error>;
    async fn get_cross_reference(&self, req: GetCrossReferenceReq)
        -> Result<OperationResp, Error>;
    async fn get_delegation_token(
        &self,
        req: GetDelegationTokenReq,
    ) -> Result<GetDelegationTokenResp, Error>;
    async fn cancel_delegation_token(&self, req: DelegationTokenReq) -> Result<StatusResp, Error>;
    async fn renew_delegation_token(&self, req: DelegationTokenReq) -> Result<StatusResp, Error>;
}
