// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{errors::SaveReportError, serializer::write_json};
use camino::Utf8Path;
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use tracing::debug;

/// Writes a report to `path`, creating missing parent directories.
///
/// The file is replaced atomically, so readers never observe a partially written report.
pub fn save_report<T: Serialize + ?Sized>(
    report: &T,
    path: &Utf8Path,
    indent: Option<usize>,
) -> Result<(), SaveReportError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_str().is_empty()) {
        match std::fs::create_dir_all(dir) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                debug!("report directory {dir} already exists");
            }
            Err(error) => {
                return Err(SaveReportError::CreateDir {
                    dir: dir.to_owned(),
                    error,
                });
            }
        }
    }

    atomicwrites::AtomicFile::new(path, atomicwrites::AllowOverwrite)
        .write(|file| {
            let mut writer = BufWriter::new(file);
            write_json(report, &mut writer, indent)?;
            writer.flush()
        })
        .map_err(|error| SaveReportError::Write {
            path: path.to_owned(),
            error,
        })
}
