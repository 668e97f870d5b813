//! Raw extract JSON reading

use crate::models::RawExtract;
use qlib_common::{Error, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Read one year's extract
pub fn read_extract<P: AsRef<Path>>(path: P) -> Result<RawExtract> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(format!("Extract {}", path.display())),
        _ => Error::Io(e),
    })?;
    let mut extract: RawExtract = serde_json::from_reader(BufReader::new(file))?;

    if extract.source.is_empty() {
        extract.source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
    }

    info!(
        path = %path.display(),
        year = extract.year,
        variables = extract.variables.len(),
        "Loaded extract"
    );
    Ok(extract)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_extract_defaults_source_to_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("som2001.json");
        std::fs::write(
            &path,
            r#"{"year": 2001, "variables": [
                {"variable": "f2", "label": "Hur ofta?", "value_labels": [{"code": 1, "label": "Varje dag"}]}
            ]}"#,
        )
        .unwrap();

        let extract = read_extract(&path).unwrap();
        assert_eq!(extract.year, 2001);
        assert_eq!(extract.source, "som2001.json");
        assert_eq!(extract.variables[0].value_labels[0].code, 1.0);
    }

    #[test]
    fn test_malformed_extract_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"year\": \"tvåtusen\"}").unwrap();
        assert!(matches!(read_extract(&path), Err(Error::Json(_))));
    }

    #[test]
    fn test_missing_extract_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_extract(dir.path().join("saknas.json")), Err(Error::NotFound(_))));
    }
}
