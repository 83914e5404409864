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
use std::path::{Path, PathBuf};

use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

/// Initialize logging from `log4rs.yml` in the working directory. If that file is missing or
/// invalid, log to stderr instead (controlled by `RUST_LOG`).
pub fn init_logging() {
    if let Err(e) = log4rs::init_file("log4rs.yml", Default::default()) {
        if pretty_env_logger::try_init().is_ok() {
            log::warn!("Cannot use log4rs.yml ({e}), logging to stderr");
        }
    }
}

/// Initialize logging to stderr such that log lines do not tear the returned progress bars.
pub fn init_progress_logging() -> MultiProgress {
    let logger = pretty_env_logger::formatted_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .build();
    let level = logger.filter();
    let multi = MultiProgress::new();
    if LogWrapper::new(multi.clone(), logger).try_init().is_ok() {
        log::set_max_level(level);
    }
    multi
}

pub trait PathBufExt: Sized {
    fn then(self, p: impl AsRef<Path>) -> PathBuf;

    /// Append `p`, replacing the first `{}` by the timestamp `ts`.
    fn then_ts(self, p: impl AsRef<str>, ts: &str) -> PathBuf {
        self.then(p.as_ref().replacen("{}", ts, 1))
    }
}

impl PathBufExt for PathBuf {
    fn then(mut self, p: impl AsRef<Path>) -> PathBuf {
        self.push(p);
        self
    }
}

impl PathBufExt for &Path {
    fn then(self, p: impl AsRef<Path>) -> PathBuf {
        let mut path = self.to_path_buf();
        path.push(p);
        path
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn path_building() {
        let base = Path::new("/results");
        assert_eq!(
            base.then("RectangleScenario").then("users_number.csv"),
            PathBuf::from("/results/RectangleScenario/users_number.csv")
        );
        assert_eq!(
            PathBuf::from("/out").then_ts("report_{}", "2024-06-13_22-59-00"),
            PathBuf::from("/out/report_2024-06-13_22-59-00")
        );
    }
}
