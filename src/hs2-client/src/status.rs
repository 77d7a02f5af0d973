// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Translation of wire statuses into [`Status`] values.
//!
//! Every response the service sends carries a [`WireStatus`]. Mapping never
//! fails: codes the driver does not know become [`StatusCode::Error`] with the
//! server's message intact. Callers decide which statuses are failures through
//! [`Status::into_result`].

use std::fmt;

use crate::error::RemoteOperationError;
use crate::protocol::WireStatus;

/// Wire codes of `TStatusCode`.
pub mod code {
    pub const SUCCESS: i32 = 0;
    pub const SUCCESS_WITH_INFO: i32 = 1;
    pub const STILL_EXECUTING: i32 = 2;
    pub const ERROR: i32 = 3;
    pub const INVALID_HANDLE: i32 = 4;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success,
    SuccessWithInfo,
    /// Not a failure: the request should be repeated later.
    StillExecuting,
    Error,
    InvalidHandle,
}

impl StatusCode {
    fn from_wire(status_code: i32) -> Option<StatusCode> {
        match status_code {
            code::SUCCESS => Some(StatusCode::Success),
            code::SUCCESS_WITH_INFO => Some(StatusCode::SuccessWithInfo),
            code::STILL_EXECUTING => Some(StatusCode::StillExecuting),
            code::ERROR => Some(StatusCode::Error),
            code::INVALID_HANDLE => Some(StatusCode::InvalidHandle),
            _ => None,
        }
    }

    /// Reports whether the code denotes a failed request.
    pub fn is_error(self) -> bool {
        matches!(self, StatusCode::Error | StatusCode::InvalidHandle)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            StatusCode::Success => "success",
            StatusCode::SuccessWithInfo => "success with info",
            StatusCode::StillExecuting => "still executing",
            StatusCode::Error => "error",
            StatusCode::InvalidHandle => "invalid handle",
        })
    }
}

/// The outcome of one remote call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    /// The status code exactly as the server sent it.
    pub wire_code: i32,
    pub message: String,
    /// Supplementary detail: a note naming an unmapped wire code, followed by
    /// the server's info messages.
    pub error_detail: Option<String>,
    pub sql_state: Option<String>,
    pub error_code: Option<i32>,
    pub info_messages: Vec<String>,
}

impl Status {
    pub fn from_wire(raw: &WireStatus) -> Status {
        let mut detail = Vec::new();
        let code = match StatusCode::from_wire(raw.status_code) {
            Some(code) => code,
            None => {
                detail.push(format!("unknown status code {}", raw.status_code));
                StatusCode::Error
            }
        };
        detail.extend(raw.info_messages.iter().cloned());
        let message = match &raw.error_message {
            Some(message) => message.clone(),
            None if code == StatusCode::Error => detail.first().cloned().unwrap_or_default(),
            None => String::new(),
        };
        Status {
            code,
            wire_code: raw.status_code,
            message,
            error_detail: (!detail.is_empty()).then(|| detail.join("\n")),
            sql_state: raw.sql_state.clone(),
            error_code: raw.error_code,
            info_messages: raw.info_messages.clone(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.code.is_error()
    }

    fn unmapped_note(&self) -> String {
        format!("unknown status code {}", self.wire_code)
    }

    /// Converts error statuses into a [`RemoteOperationError`]. Success and
    /// still-executing statuses pass through.
    pub fn into_result(self) -> Result<Status, RemoteOperationError> {
        if self.is_error() {
            Err(RemoteOperationError { status: self })
        } else {
            Ok(self)
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(sql_state) = &self.sql_state {
            write!(f, " (SQLSTATE {sql_state})")?;
        }
        let note = self.unmapped_note();
        if StatusCode::from_wire(self.wire_code).is_none() && self.message != note {
            write!(f, " ({note})")?;
        }
        Ok(())
    }
}
