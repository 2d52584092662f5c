// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Per-CPU execution context
//!
//! Which thread and which process are current on an execution unit. Every
//! operation that acts on "the current thread" receives the `Cpu` it runs
//! on explicitly.

use super::thread::ThreadId;
use crate::process::ProcessId;

/// Execution unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    id: u32,
    current_thread: Option<ThreadId>,
    current_process: Option<ProcessId>,
}

impl Cpu {
    /// Create an idle execution unit
    pub const fn new(id: u32) -> Self {
        Self {
            id,
            current_thread: None,
            current_process: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn current_thread(&self) -> Option<ThreadId> {
        self.current_thread
    }

    pub fn current_process(&self) -> Option<ProcessId> {
        self.current_process
    }

    /// Check if nothing is running
    pub fn is_idle(&self) -> bool {
        self.current_thread.is_none()
    }

    /// Install `thread` of `process` as current
    pub fn set_current(&mut self, thread: ThreadId, process: Option<ProcessId>) {
        self.current_thread = Some(thread);
        self.current_process = process;
    }

    /// Clear the current thread and process
    pub fn clear_current(&mut self) {
        self.current_thread = None;
        self.current_process = None;
    }
}
