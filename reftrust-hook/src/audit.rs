// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit trail.
//!
//! One human-readable event per line, opened in append mode and never
//! rotated or truncated by this system. Every acceptance, skip and
//! rejection lands here with its reason before the process exits. Events
//! are mirrored to `tracing` for operator diagnostics; the file is the
//! ledger of record.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Handle to the audit log file.
#[derive(Debug)]
pub struct AuditLog {
    file: File,
}

impl AuditLog {
    /// Open the audit log, creating it on first use.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        Ok(Self { file })
    }

    /// Append one event.
    pub fn record(&mut self, event: impl AsRef<str>) -> io::Result<()> {
        let event = event.as_ref();
        tracing::info!(target: "reftrust::audit", "{event}");
        writeln!(self.file, "{event}")
    }
}
