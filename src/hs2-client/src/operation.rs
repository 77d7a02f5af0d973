// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The client-side mirror of one remote operation.
//!
//! The service owns the authoritative state of an operation. An [`Operation`]
//! only holds the last [`OperationSnapshot`] the service reported, and that
//! snapshot is replaced exclusively by a successful status poll (or a
//! successful close). Reading the snapshot never performs I/O, so callers can
//! test [`Operation::is_finished`] in a loop and decide themselves when to
//! pay for another [`Operation::poll_status`].
//!
//! Calls that touch the network take `&mut self`: an operation never has two
//! requests in flight.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Error;
use crate::protocol::{
    GetOperationStatusReq, OperationHandle, OperationReq, ProgressUpdate, StatusResp,
};
use crate::service::Hs2Service;
use crate::status::Status;

/// The lifecycle state of a remote operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationState {
    Initialized,
    Pending,
    Running,
    Finished,
    Canceled,
    Closed,
    Error,
    TimedOut,
    Unknown,
}

impl OperationState {
    /// Maps a `TOperationState` wire value. Unrecognized values map to
    /// [`OperationState::Unknown`].
    pub fn from_wire(state: i32) -> OperationState {
        match state {
            0 => OperationState::Initialized,
            1 => OperationState::Running,
            2 => OperationState::Finished,
            3 => OperationState::Canceled,
            4 => OperationState::Closed,
            5 => OperationState::Error,
            7 => OperationState::Pending,
            8 => OperationState::TimedOut,
            _ => OperationState::Unknown,
        }
    }

    pub fn wire_code(self) -> i32 {
        match self {
            OperationState::Initialized => 0,
            OperationState::Running => 1,
            OperationState::Finished => 2,
            OperationState::Canceled => 3,
            OperationState::Closed => 4,
            OperationState::Error => 5,
            OperationState::Unknown => 6,
            OperationState::Pending => 7,
            OperationState::TimedOut => 8,
        }
    }

    /// Reports whether the operation can no longer make progress.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationState::Finished
                | OperationState::Canceled
                | OperationState::Closed
                | OperationState::Error
                | OperationState::TimedOut
        )
    }

    fn stage(self) -> u8 {
        match self {
            OperationState::Initialized | OperationState::Unknown => 0,
            OperationState::Pending => 1,
            OperationState::Running => 2,
            OperationState::Finished
            | OperationState::Canceled
            | OperationState::Error
            | OperationState::TimedOut => 3,
            OperationState::Closed => 4,
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            OperationState::Initialized => "initialized",
            OperationState::Pending => "pending",
            OperationState::Running => "running",
            OperationState::Finished => "finished",
            OperationState::Canceled => "canceled",
            OperationState::Closed => "closed",
            OperationState::Error => "error",
            OperationState::TimedOut => "timed out",
            OperationState::Unknown => "unknown",
        })
    }
}

/// What the service last reported about an operation.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationSnapshot {
    pub state: OperationState,
    pub has_result_set: bool,
    /// The operation's own error, reported alongside an error state.
    pub error_message: Option<String>,
    pub progress: Option<ProgressUpdate>,
}

impl Default for OperationSnapshot {
    fn default() -> OperationSnapshot {
        OperationSnapshot {
            state: OperationState::Initialized,
            has_result_set: false,
            error_message: None,
            progress: None,
        }
    }
}

/// A remote operation, identified by its handle.
#[derive(Debug)]
pub struct Operation {
    pub(crate) service: Arc<dyn Hs2Service>,
    handle: OperationHandle,
    snapshot: OperationSnapshot,
}

impl Operation {
    pub fn new(service: Arc<dyn Hs2Service>, handle: OperationHandle) -> Operation {
        Operation {
            service,
            handle,
            snapshot: OperationSnapshot::default(),
        }
    }

    pub fn handle(&self) -> &OperationHandle {
        &self.handle
    }

    pub fn snapshot(&self) -> &OperationSnapshot {
        &self.snapshot
    }

    pub fn state(&self) -> OperationState {
        self.snapshot.state
    }

    pub fn is_finished(&self) -> bool {
        self.snapshot.state == OperationState::Finished
    }

    pub fn has_pending_result_set(&self) -> bool {
        self.snapshot.has_result_set
    }

    /// Asks the service for the operation's state.
    ///
    /// On success the local snapshot is replaced by the response. If the
    /// service answers with an error status the snapshot is left as it was.
    pub async fn poll_status(&mut self, want_progress: bool) -> Result<Status, Error> {
        let resp = self
            .service
            .get_operation_status(GetOperationStatusReq {
                operation_handle: self.handle.clone(),
                get_progress_update: want_progress,
            })
            .await?;
        let status = Status::from_wire(&resp.status).into_result()?;

        let previous = self.snapshot.state;
        let state = resp
            .operation_state
            .map(OperationState::from_wire)
            .unwrap_or(previous);
        if state != previous {
            if state.stage() < previous.stage() {
                warn!(%previous, %state, "service reported an earlier operation state");
            } else {
                debug!(%previous, %state, "operation state changed");
            }
        }
        self.snapshot = OperationSnapshot {
            state,
            has_result_set: resp.has_result_set.unwrap_or(false),
            error_message: resp.error_message,
            progress: resp.progress_update_response,
        };
        Ok(status)
    }

    /// Requests cancellation. The local state is not changed: the next
    /// [`Operation::poll_status`] reports whether the service canceled.
    pub async fn cancel(&mut self) -> Result<Status, Error> {
        let resp = self
            .service
            .cancel_operation(self.operation_req())
            .await?;
        debug!("cancel requested");
        Self::reported(resp)
    }

    /// Releases the operation on the service. Closing twice is a caller
    /// error; the second close reports whatever the service answers.
    ///
    /// A closed operation no longer has a result set to fetch.
    pub async fn close(&mut self) -> Result<Status, Error> {
        let resp = self.service.close_operation(self.operation_req()).await?;
        let status = Self::reported(resp)?;
        self.snapshot = OperationSnapshot {
            state: OperationState::Closed,
            has_result_set: false,
            ..self.snapshot.clone()
        };
        Ok(status)
    }

    /// The service-side query id of the operation.
    pub async fn query_id(&self) -> Result<String, Error> {
        let resp = self.service.get_query_id(self.operation_req()).await?;
        Ok(resp.query_id)
    }

    pub(crate) fn operation_req(&self) -> OperationReq {
        OperationReq {
            operation_handle: self.handle.clone(),
        }
    }

    fn reported(resp: StatusResp) -> Result<Status, Error> {
        Ok(Status::from_wire(&resp.status).into_result()?)
    }
}
