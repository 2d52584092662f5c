// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Integration Tests
//!
//! End-to-end tests of the thread lifecycle against the reference
//! allocators, scheduler and an unwinding process layer.

mod lifecycle_tests;
