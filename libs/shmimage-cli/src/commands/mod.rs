// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::Path;

use shmimage::SourceConfig;

pub mod publish;
pub mod remove;
pub mod watch;

/// Config file values (or defaults) with command-line overrides applied.
pub fn resolve_config(
    path: Option<&Path>,
    id: Option<String>,
    timeout_ms: Option<u32>,
) -> SourceConfig {
    let mut config = path.map(SourceConfig::load_or_default).unwrap_or_default();
    if let Some(id) = id {
        config.shared_id = id;
    }
    if let Some(timeout_ms) = timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    config.validated()
}
