// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ambient environment-driven configuration (`spec.md` §6.7).

const MAX_RETRIES_ENV: &str = "GONUGET_UPDATEFILETIME_MAXRETRIES";
const DEFAULT_MAX_RETRIES: u32 = 3;

/// How many times a modtime-preserving copy should be retried, governed by
/// `GONUGET_UPDATEFILETIME_MAXRETRIES`. Unrelated to lock acquisition
/// retries (`spec.md` §4.F), which are not configurable.
pub fn max_update_filetime_retries() -> u32 {
    std::env::var(MAX_RETRIES_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_RETRIES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        std::env::remove_var(MAX_RETRIES_ENV);
        assert_eq!(max_update_filetime_retries(), DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn reads_override() {
        std::env::set_var(MAX_RETRIES_ENV, "7");
        assert_eq!(max_update_filetime_retries(), 7);
        std::env::remove_var(MAX_RETRIES_ENV);
    }
}
