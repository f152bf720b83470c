use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Writes `text` to a sibling temp file, then swaps it into place. The
/// destination is never left partially written: on any failure the temp
/// file is removed and the previous file content survives.
pub(crate) fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_sibling(path);
    fs::write(&tmp_path, text)?;

    let cleanup_and_fail = |error: io::Error| {
        let _ = fs::remove_file(&tmp_path);
        Err(error)
    };

    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return cleanup_and_fail(error),
    }
    match fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(error) => cleanup_and_fail(error),
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("level.json");
    path.with_file_name(format!("{file_name}.tmp"))
}
