//! Host file reader.
//!
//! One host per line: `<host-spec> <username> <password>`, separated by any
//! whitespace. Blank lines and `#` comments are skipped. The host spec may be
//! any form the expander understands.

use std::path::Path;

use crate::error::{Result, SshHerdError};
use crate::session::Credential;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub spec: String,
    pub username: String,
    pub credential: Credential,
}

/// Parse host file contents. Malformed lines are logged and skipped.
pub fn parse(contents: &str) -> Vec<HostEntry> {
    let mut entries = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [spec, username, password, ..] = fields[..] else {
            tracing::warn!(
                "Host file line {}: expected \"host user password\", skipping",
                index + 1
            );
            continue;
        };

        entries.push(HostEntry {
            spec: spec.to_string(),
            username: username.to_string(),
            credential: Credential::new(password),
        });
    }

    entries
}

/// Read and parse a host file.
pub fn read(path: &Path) -> Result<Vec<HostEntry>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        SshHerdError::HostFile(format!("Cannot open file {}: {}", path.display(), e))
    })?;
    let entries = parse(&contents);
    tracing::debug!("Read {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Like [`read`], but an unreadable file is logged and yields no hosts.
pub fn load(path: &Path) -> Vec<HostEntry> {
    read(path).unwrap_or_else(|e| {
        tracing::error!("{}", e);
        Vec::new()
    })
}
