// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod selection;

pub use selection::{ModelSelector, SelectionError};
