// COE: Aggregation of Edge, Cloud, and Vehicular-Cloud offloading traces
// Copyright (C) 2024-2025 The COE authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Scenario tests over complete trace directories.
//!
//! Use the following command to see the diffs:
//!
//! ```shell
//! cargo test -- --nocapture --test-threads 1 --quiet
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

pub fn check_diff(exp: f64, acq: f64, precision: f64, what: &str) {
    let diff = (exp - acq).abs();

    if diff < precision {
        eprintln!(
            "{what}: diff {}{:.3e}{} with precision = {:.1e}",
            termion::color::Fg(termion::color::Green),
            diff,
            termion::color::Fg(termion::color::Reset),
            precision,
        );
    } else {
        eprintln!(
            "{what}: diff {}{:.3e}{} with precision = {:.1e} (expected {exp}, got {acq})",
            termion::color::Fg(termion::color::Red),
            diff,
            termion::color::Fg(termion::color::Reset),
            precision,
        );
        panic!()
    }
}

/// Temporary directory removed on drop.
pub struct TempDir(PathBuf);

impl TempDir {
    pub fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("coe-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn write(&self, file: impl AsRef<Path>, rows: &[String]) {
        let path = self.0.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut content = rows.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(path, content).unwrap();
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

mod campaign;
