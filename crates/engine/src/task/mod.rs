// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task dispatch to compute-node agents with wait coalescing.

mod dispatcher;

pub use dispatcher::{
    DispatchError, DispatchRequest, DispatchedTask, TaskDispatcher, TaskWaitError,
    DEFAULT_RESULT_CACHE_TTL, DEFAULT_WAIT_TIMEOUT,
};
