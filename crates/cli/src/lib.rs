// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Empty lib target so workspace-level integration tests can depend on
//! this package and gain access to `CARGO_BIN_EXE_orchestra`.
