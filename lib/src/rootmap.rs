// Copyright 2021 The Jujutsu Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Persistence for the `old_oid -> new_oid` root-map (§6, §9 "root-map
//! durability").

use std::collections::HashMap;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::error::EngineError;
use crate::error::EngineResult;
use crate::oid::Oid;

/// Append-only writer for the root-map file. Refuses to attach to a
/// pre-existing non-empty map (`StaleState`), matching the driver's "refuse
/// to run if a prior map exists" contract.
///
/// Per the open question in §9, this implementation takes the crash-safety
/// option: every appended line is immediately `sync_data`'d, so a crash
/// mid-run leaves the root-map describing exactly the roots that finished,
/// never a torn line.
pub struct RootMapWriter {
    file: File,
    path: PathBuf,
}

impl RootMapWriter {
    pub fn create(path: impl Into<PathBuf>) -> EngineResult<Self> {
        let path = path.into();
        if let Ok(metadata) = std::fs::metadata(&path) {
            if metadata.len() > 0 {
                return Err(EngineError::StaleState(path));
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one `old_oid new_oid` line and flushes it to disk.
    pub fn append(&mut self, old: &Oid, new: &Oid) -> EngineResult<()> {
        writeln!(self.file, "{} {}", old.hex(), new.hex())?;
        self.file.sync_data()?;
        Ok(())
    }
}

/// Reads a completed root-map back into memory, e.g. for the reference
/// update phase.
pub fn read_root_map(path: impl AsRef<Path>) -> EngineResult<HashMap<Oid, Oid>> {
    let reader = BufReader::new(File::open(path)?);
    let mut map = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let old = parts.next().and_then(|s| Oid::from_hex(s).ok());
        let new = parts.next().and_then(|s| Oid::from_hex(s).ok());
        if let (Some(old), Some(new)) = (old, new) {
            map.insert(old, new);
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn refuses_to_overwrite_a_nonempty_map() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rootmap");
        std::fs::write(&path, "deadbeef cafebabe\n").unwrap();
        assert!(matches!(
            RootMapWriter::create(&path),
            Err(EngineError::StaleState(_))
        ));
    }

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rootmap");
        let old = Oid::from_bytes(vec![0xaa]);
        let new = Oid::from_bytes(vec![0xbb]);
        {
            let mut writer = RootMapWriter::create(&path).unwrap();
            writer.append(&old, &new).unwrap();
        }
        let map = read_root_map(&path).unwrap();
        assert_eq!(map.get(&old), Some(&new));
    }

    #[test]
    fn empty_existing_file_is_not_stale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rootmap");
        std::fs::write(&path, "").unwrap();
        assert!(RootMapWriter::create(&path).is_ok());
    }
}
