// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Polling and draining policies built on top of [`Operation`] and
//! [`ResultPager`].

use std::time::Duration;

use tracing::debug;

use crate::error::Error;
use crate::operation::{Operation, OperationSnapshot, OperationState};
use crate::pager::ResultPager;
use crate::result::{self, Row};

/// Polls `operation` every `interval` until it finishes.
///
/// `on_poll` observes every snapshot, which carries progress updates when
/// `want_progress` is set. Fails with [`Error::OperationEnded`] if the
/// operation ends in any state other than finished, or reports an unknown
/// state.
pub async fn wait_until_ready<F>(
    operation: &mut Operation,
    want_progress: bool,
    interval: Duration,
    mut on_poll: F,
) -> Result<(), Error>
where
    F: FnMut(&OperationSnapshot),
{
    loop {
        operation.poll_status(want_progress).await?;
        let snapshot = operation.snapshot();
        on_poll(snapshot);
        match snapshot.state {
            OperationState::Finished => return Ok(()),
            OperationState::Initialized | OperationState::Pending | OperationState::Running => {
                debug!(state = %snapshot.state, "operation not ready");
                tokio::time::sleep(interval).await;
            }
            state @ (OperationState::Canceled
            | OperationState::Closed
            | OperationState::Error
            | OperationState::TimedOut
            | OperationState::Unknown) => {
                return Err(Error::OperationEnded {
                    state,
                    detail: snapshot
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "no further detail".into()),
                });
            }
        }
    }
}

/// Fetches pages until the service reports no more rows, then returns every
/// row fetched so far.
///
/// The operation should have finished; otherwise no rows are fetched.
pub async fn fetch_all(pager: &mut ResultPager) -> Result<Vec<Row>, Error> {
    loop {
        pager.fetch().await?;
        if !pager.more_rows_available() {
            break;
        }
    }
    Ok(match pager.schema() {
        Some(schema) => result::rows(schema, pager.pages()),
        None => Vec::new(),
    })
}
