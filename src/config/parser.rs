use super::types::MountSpec;
use crate::error::{Result, UnionwatchError};
use std::path::{Path, PathBuf};

/// Parse the whole configuration file. Each non-comment line declares one
/// mount point; the file is rejected on the first malformed line so the
/// daemon never runs with a partial mount table.
pub fn parse(path: &Path, content: &str) -> Result<Vec<MountSpec>> {
    let mut specs: Vec<MountSpec> = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let spec = parse_line(path, line_no, line)?;
        if specs.iter().any(|s| s.mount_point == spec.mount_point) {
            return Err(invalid(
                path,
                line_no,
                format!("duplicate mount point {}", spec.mount_point.display()),
            ));
        }
        specs.push(spec);
    }

    Ok(specs)
}

fn parse_line(path: &Path, line_no: usize, line: &str) -> Result<MountSpec> {
    let mut fields = line.split_whitespace();
    let (Some(mount_point), Some(sources), None) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(invalid(
            path,
            line_no,
            "expected exactly two fields: <mount-point> <source>[,<source>...]".to_string(),
        ));
    };

    let mount_point = PathBuf::from(mount_point);
    if !mount_point.is_absolute() {
        return Err(invalid(
            path,
            line_no,
            format!("mount point {} is not absolute", mount_point.display()),
        ));
    }

    let mut parsed: Vec<PathBuf> = Vec::new();
    for part in sources.split(',') {
        if part.is_empty() {
            return Err(invalid(path, line_no, "empty source entry".to_string()));
        }
        let source = PathBuf::from(part);
        if !source.is_absolute() {
            return Err(invalid(
                path,
                line_no,
                format!("source {part} is not absolute"),
            ));
        }
        // mergerfs branch lists are colon-joined, so a ':' in a source
        // path can neither be passed to it nor read back from the
        // mount table
        if part.contains(':') {
            return Err(invalid(
                path,
                line_no,
                format!("source {part} contains ':', the mergerfs branch separator"),
            ));
        }
        if parsed.contains(&source) {
            return Err(invalid(path, line_no, format!("duplicate source {part}")));
        }
        parsed.push(source);
    }

    Ok(MountSpec {
        mount_point,
        sources: parsed,
    })
}

fn invalid(path: &Path, line: usize, message: String) -> UnionwatchError {
    UnionwatchError::ConfigInvalid {
        path: path.to_path_buf(),
        line,
        message,
    }
}
