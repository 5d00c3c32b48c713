// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use anyhow::{Context, Result};
use shmimage::SharedRegion;

pub fn run(id: &str) -> Result<()> {
    let removed =
        SharedRegion::remove(id).with_context(|| format!("Failed to remove region '{}'", id))?;
    if removed {
        tracing::info!("Removed region '{}'", id);
    } else {
        tracing::info!("No region named '{}'", id);
    }
    Ok(())
}
