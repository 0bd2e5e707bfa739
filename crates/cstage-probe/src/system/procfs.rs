//! Thin helpers for reading pseudo-filesystem entries with error
//! classification at the probe boundary.

use cstage_common::types::ProbeError;
use std::path::Path;

/// Reads a procfs/sysfs file, classifying failures for `subsystem`.
pub(crate) fn read(subsystem: &str, path: impl AsRef<Path>) -> Result<String, ProbeError> {
    let path = path.as_ref();
    std::fs::read_to_string(path)
        .map_err(|e| ProbeError::from_read(subsystem, &path.to_string_lossy(), &e))
}

/// Reads a single-value file (e.g. `/proc/sys/...`) as a trimmed string.
pub(crate) fn read_trimmed(subsystem: &str, path: impl AsRef<Path>) -> Result<String, ProbeError> {
    read(subsystem, path).map(|s| s.trim().to_string())
}

/// Reads a single numeric value file.
pub(crate) fn read_u64(subsystem: &str, path: impl AsRef<Path>) -> Result<u64, ProbeError> {
    let path = path.as_ref();
    let raw = read_trimmed(subsystem, path)?;
    raw.parse::<u64>().map_err(|_| {
        ProbeError::internal(format!(
            "unexpected content in {}: '{raw}'",
            path.to_string_lossy()
        ))
    })
}
