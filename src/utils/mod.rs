// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod cid;
pub mod db;
pub mod logger;

use std::time::Duration;

/// Formats a duration for log lines, truncated to milliseconds.
pub fn format_elapsed(elapsed: Duration) -> String {
    humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_truncated_to_millis() {
        assert_eq!(format_elapsed(Duration::from_micros(1_500_700)), "1s 500ms");
        assert_eq!(format_elapsed(Duration::ZERO), "0s");
    }
}
