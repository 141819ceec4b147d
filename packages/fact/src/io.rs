//! JSON Lines stage files.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{FactError, Result};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> FactError + '_ {
    move |source| FactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read every record from a JSONL file.
///
/// Blank lines are skipped. The first line that fails to parse aborts the
/// read with its 1-based line number.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(FactError::MissingInput(path.to_path_buf()));
    }
    let file = File::open(path).map_err(io_error(path))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error(path))?;
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|e| FactError::MalformedInput {
            path: path.to_path_buf(),
            line: index + 1,
            reason: e.to_string(),
        })?;
        records.push(record);
    }

    tracing::debug!(path = %path.display(), records = records.len(), "Read stage file");
    Ok(records)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_atomically(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> Result<()>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let temp = temp_path(path);
    let file = File::create(&temp).map_err(io_error(&temp))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush().map_err(io_error(&temp))?;
    drop(writer);

    std::fs::rename(&temp, path).map_err(io_error(path))
}

/// Write records as JSONL, replacing `path` only once every line is written.
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    write_atomically(path, |writer| {
        for record in records {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n").map_err(io_error(path))?;
        }
        Ok(())
    })?;

    tracing::debug!(path = %path.display(), records = records.len(), "Wrote stage file");
    Ok(())
}

/// Write one pretty-printed JSON document.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomically(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, value)?;
        writer.write_all(b"\n").map_err(io_error(path))
    })
}
