// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Paginated retrieval of an operation's results.

use tracing::debug;

use crate::error::Error;
use crate::operation::Operation;
use crate::protocol::{
    FetchKind, FetchOrientation, FetchResultsReq, FetchResultsResp, RowSet, TableSchema,
    WireStatus,
};
use crate::status::{code, Status};

/// Rows requested per fetch unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: i64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FetchCursor {
    /// No fetch has succeeded yet; the next one rewinds to the first row.
    Unprimed,
    Primed,
}

/// Fetches an operation's results page by page.
///
/// The schema is resolved once, right before the first fetch. Pages are kept
/// in the order they arrived.
#[derive(Debug)]
pub struct ResultPager {
    operation: Operation,
    schema: Option<TableSchema>,
    cursor: FetchCursor,
    pages: Vec<RowSet>,
    more_rows: bool,
    page_size: i64,
    fetch_kind: FetchKind,
}

impl ResultPager {
    pub fn new(operation: Operation) -> ResultPager {
        ResultPager {
            operation,
            schema: None,
            cursor: FetchCursor::Unprimed,
            pages: Vec::new(),
            more_rows: false,
            page_size: DEFAULT_PAGE_SIZE,
            fetch_kind: FetchKind::QueryOutput,
        }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The operation, for polling or cancelling it.
    pub fn operation_mut(&mut self) -> &mut Operation {
        &mut self.operation
    }

    pub fn into_operation(self) -> Operation {
        self.operation
    }

    /// Sets the rows requested by subsequent fetches.
    pub fn set_page_size(&mut self, page_size: i64) {
        self.page_size = page_size;
    }

    /// Sets what subsequent fetches retrieve.
    pub fn set_fetch_kind(&mut self, fetch_kind: FetchKind) {
        self.fetch_kind = fetch_kind;
    }

    pub fn schema(&self) -> Option<&TableSchema> {
        self.schema.as_ref()
    }

    pub fn pages(&self) -> &[RowSet] {
        &self.pages
    }

    /// Whether the last fetch indicated that more rows remain. Never
    /// performs I/O.
    pub fn more_rows_available(&self) -> bool {
        self.more_rows
    }

    /// Fetches the next page.
    ///
    /// Without a pending result set this succeeds without contacting the
    /// service. If the operation has not finished, returns a
    /// [`crate::StatusCode::StillExecuting`] status, again without contacting
    /// the service: poll the operation and try again.
    pub async fn fetch(&mut self) -> Result<Status, Error> {
        if !self.operation.has_pending_result_set() {
            return Ok(Status::from_wire(&WireStatus::from_code(code::SUCCESS)));
        }
        if !self.operation.is_finished() {
            return Ok(Status::from_wire(&WireStatus::from_code(
                code::STILL_EXECUTING,
            )));
        }

        if self.schema.is_none() {
            self.schema = Some(self.resolve_schema().await?);
        }
        let orientation = match self.cursor {
            FetchCursor::Unprimed => FetchOrientation::First,
            FetchCursor::Primed => FetchOrientation::Next,
        };
        debug!(
            ?orientation,
            max_rows = self.page_size,
            fetch_kind = ?self.fetch_kind,
            "fetching results"
        );
        let resp = self
            .operation
            .service
            .fetch_results(FetchResultsReq {
                operation_handle: self.operation.handle().clone(),
                orientation: orientation.wire_code(),
                max_rows: self.page_size,
                fetch_type: self.fetch_kind.wire_code(),
            })
            .await?;
        let status = Status::from_wire(&resp.status).into_result()?;

        self.cursor = FetchCursor::Primed;
        self.more_rows = more_rows_in(&resp);
        if let Some(results) = resp.results {
            self.pages.push(results);
        }
        Ok(status)
    }

    async fn resolve_schema(&self) -> Result<TableSchema, Error> {
        let resp = self
            .operation
            .service
            .get_result_set_metadata(self.operation.operation_req())
            .await?;
        Status::from_wire(&resp.status).into_result()?;
        Ok(resp.schema.unwrap_or_default())
    }
}

/// Decides whether rows remain after `resp`.
///
/// An explicit `hasMoreRows` is trusted. Services that omit it are handled
/// heuristically: more rows are assumed iff the first column of the returned
/// page holds any values, inspecting its typed arrays in the priority order
/// of [`crate::protocol::Column::populated_len`]. The heuristic can be wrong,
/// for example when a page ends exactly at the last row.
fn more_rows_in(resp: &FetchResultsResp) -> bool {
    if resp.has_more_rows == Some(true) {
        return true;
    }
    resp.results
        .as_ref()
        .and_then(|results| results.columns.first())
        .and_then(|column| column.populated_len())
        .map_or(false, |len| len > 0)
}
