// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Request and response messages of the HiveServer2 `TCLIService`.
//!
//! These types mirror the service's message definitions field for field, with
//! enums carried as their wire integers. Higher layers translate the integers
//! into Rust enums ([`crate::StatusCode`], [`crate::OperationState`]) at the
//! point of use.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `HIVE_CLI_SERVICE_PROTOCOL_V10`.
pub const CLIENT_PROTOCOL_V10: i32 = 9;

/// Wire status attached to every response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStatus {
    pub status_code: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info_messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WireStatus {
    pub fn from_code(status_code: i32) -> WireStatus {
        WireStatus {
            status_code,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleIdentifier {
    pub guid: Vec<u8>,
    pub secret: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHandle {
    pub session_id: HandleIdentifier,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHandle {
    pub operation_id: HandleIdentifier,
    pub operation_type: i32,
    pub has_result_set: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_row_count: Option<f64>,
}

/// Direction of a fetch relative to the server-side cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOrientation {
    /// Rewind the cursor to the first row.
    First,
    /// Continue from the current cursor position.
    Next,
}

impl FetchOrientation {
    pub fn wire_code(self) -> i32 {
        match self {
            FetchOrientation::Next => 0,
            FetchOrientation::First => 4,
        }
    }
}

/// Selects what a fetch retrieves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchKind {
    /// Result rows of the statement.
    #[default]
    QueryOutput,
    /// Log lines produced while running the statement.
    Log,
}

impl FetchKind {
    pub fn wire_code(self) -> i16 {
        match self {
            FetchKind::QueryOutput => 0,
            FetchKind::Log => 1,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedColumn<T> {
    pub values: Vec<T>,
    #[serde(default)]
    pub nulls: Vec<u8>,
}

impl<T> TypedColumn<T> {
    pub fn new(values: Vec<T>) -> TypedColumn<T> {
        TypedColumn {
            values,
            nulls: Vec::new(),
        }
    }

    /// Reports whether row `i` is null. Bit `i % 8` of byte `i / 8` is set,
    /// least significant bit first, for null rows.
    pub fn is_null(&self, i: usize) -> bool {
        self.nulls
            .get(i / 8)
            .map_or(false, |byte| byte & (1 << (i % 8)) != 0)
    }
}

/// One column of a columnar row set. The service populates exactly one of
/// the typed arrays.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bool_val: Option<TypedColumn<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_val: Option<TypedColumn<i8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i16_val: Option<TypedColumn<i16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i32_val: Option<TypedColumn<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i64_val: Option<TypedColumn<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_val: Option<TypedColumn<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_val: Option<TypedColumn<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_val: Option<TypedColumn<Vec<u8>>>,
}

impl Column {
    /// Returns the number of values in the first populated typed array,
    /// checking binary, bool, byte, double, i16, i32, i64 and string in that
    /// order. A present but empty array wins over later ones.
    pub fn populated_len(&self) -> Option<usize> {
        if let Some(c) = &self.binary_val {
            return Some(c.values.len());
        }
        if let Some(c) = &self.bool_val {
            return Some(c.values.len());
        }
        if let Some(c) = &self.byte_val {
            return Some(c.values.len());
        }
        if let Some(c) = &self.double_val {
            return Some(c.values.len());
        }
        if let Some(c) = &self.i16_val {
            return Some(c.values.len());
        }
        if let Some(c) = &self.i32_val {
            return Some(c.values.len());
        }
        if let Some(c) = &self.i64_val {
            return Some(c.values.len());
        }
        self.string_val.as_ref().map(|c| c.values.len())
    }
}

/// One page of results.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSet {
    #[serde(default)]
    pub start_row_offset: i64,
    #[serde(default)]
    pub columns: Vec<Column>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDesc {
    pub column_name: String,
    /// The primitive type name, e.g. `INT_TYPE` or `STRING_TYPE`.
    pub type_name: String,
    pub position: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub columns: Vec<ColumnDesc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub header_names: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub progressed_percentage: f64,
    pub status: i32,
    pub footer_summary: String,
    pub start_time: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionReq {
    pub client_protocol: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub configuration: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionResp {
    pub status: WireStatus,
    pub server_protocol_version: i32,
    #[serde(default)]
    pub session_handle: Option<SessionHandle>,
    #[serde(default)]
    pub configuration: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionReq {
    pub session_handle: SessionHandle,
}

/// Response of the procedures that only report a status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResp {
    pub status: WireStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteStatementReq {
    pub session_handle: SessionHandle,
    pub statement: String,
    #[serde(default)]
    pub conf_overlay: BTreeMap<String, String>,
    pub run_async: bool,
    #[serde(default)]
    pub query_timeout: i64,
}

/// Response of the procedures that start a remote operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResp {
    pub status: WireStatus,
    #[serde(default)]
    pub operation_handle: Option<OperationHandle>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOperationStatusReq {
    pub operation_handle: OperationHandle,
    pub get_progress_update: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOperationStatusResp {
    pub status: WireStatus,
    #[serde(default)]
    pub operation_state: Option<i32>,
    #[serde(default)]
    pub sql_state: Option<String>,
    #[serde(default)]
    pub error_code: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub task_status: Option<String>,
    #[serde(default)]
    pub operation_started: Option<i64>,
    #[serde(default)]
    pub operation_completed: Option<i64>,
    #[serde(default)]
    pub has_result_set: Option<bool>,
    #[serde(default)]
    pub progress_update_response: Option<ProgressUpdate>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReq {
    pub operation_handle: OperationHandle,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResultSetMetadataResp {
    pub status: WireStatus,
    #[serde(default)]
    pub schema: Option<TableSchema>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResultsReq {
    pub operation_handle: OperationHandle,
    pub orientation: i32,
    pub max_rows: i64,
    pub fetch_type: i16,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResultsResp {
    pub status: WireStatus,
    #[serde(default)]
    pub has_more_rows: Option<bool>,
    #[serde(default)]
    pub results: Option<RowSet>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetQueryIdResp {
    pub query_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInfoReq {
    pub session_handle: SessionHandle,
    pub info_type: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoValue {
    #[serde(default)]
    pub string_value: Option<String>,
    #[serde(default)]
    pub small_int_value: Option<i16>,
    #[serde(default)]
    pub integer_bitmask: Option<i32>,
    #[serde(default)]
    pub integer_flag: Option<i32>,
    #[serde(default)]
    pub binary_value: Option<i32>,
    #[serde(default)]
    pub len_value: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInfoResp {
    pub status: WireStatus,
    #[serde(default)]
    pub info_value: Option<InfoValue>,
}

/// Request of the metadata procedures that only need the session, such as
/// `GetCatalogs`, `GetTableTypes` and `GetTypeInfo`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReq {
    pub session_handle: SessionHandle,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSchemasReq {
    pub session_handle: SessionHandle,
    pub catalog_name: Option<String>,
    pub schema_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTablesReq {
    pub session_handle: SessionHandle,
    pub catalog_name: Option<String>,
    pub schema_name: Option<String>,
    pub table_name: Option<String>,
    pub table_types: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetColumnsReq {
    pub session_handle: SessionHandle,
    pub catalog_name: Option<String>,
    pub schema_name: Option<String>,
    pub table_name: Option<String>,
    pub column_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFunctionsReq {
    pub session_handle: SessionHandle,
    pub catalog_name: Option<String>,
    pub schema_name: Option<String>,
    pub function_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPrimaryKeysReq {
    pub session_handle: SessionHandle,
    pub catalog_name: Option<String>,
    pub schema_name: Option<String>,
    pub table_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCrossReferenceReq {
    pub session_handle: SessionHandle,
    pub parent_catalog_name: Option<String>,
    pub parent_schema_name: Option<String>,
    pub parent_table_name: Option<String>,
    pub foreign_catalog_name: Option<String>,
    pub foreign_schema_name: Option<String>,
    pub foreign_table_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDelegationTokenReq {
    pub session_handle: SessionHandle,
    pub owner: String,
    pub renewer: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDelegationTokenResp {
    pub status: WireStatus,
    #[serde(default)]
    pub delegation_token: Option<String>,
}

/// Request of `CancelDelegationToken` and `RenewDelegationToken`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationTokenReq {
    pub session_handle: SessionHandle,
    pub delegation_token: String,
}
