//! Running external tools.

use std::ffi::OsString;
use std::path::Path;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{RasterError, RasterResult};

/// Keep at most this much of a failing tool's stderr in the error.
const STDERR_TAIL_BYTES: usize = 2048;

/// Run `program` with `args` to completion and map a non-zero exit to an error.
pub async fn run_tool(program: &Path, args: &[OsString]) -> RasterResult<()> {
    let program_name = program.display().to_string();
    debug!(program = %program_name, args = ?args, "Running tool");

    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| RasterError::Spawn {
            program: program_name.clone(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = stderr_tail(&output.stderr);
    warn!(program = %program_name, status = %output.status, stderr = %stderr, "Tool failed");

    Err(RasterError::ToolFailed {
        program: program_name,
        status: output.status.to_string(),
        stderr,
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}
