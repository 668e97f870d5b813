//! Catalog and library JSON output

use crate::files::write_atomic;
use qlib_common::Result;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Write pretty-printed JSON; non-ASCII text is written as-is.
pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');
    write_atomic(path, &json)?;
    info!(path = %path.display(), "Wrote JSON output");
    Ok(())
}
