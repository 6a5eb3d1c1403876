use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::output::{print_debug, print_error, print_warning};

/// The subset of an SSO token cache file we care about.
#[derive(Debug, Deserialize)]
struct SsoCacheEntry {
    #[serde(rename = "expiresAt")]
    expires_at: Option<String>,
}

/// Returns true when any file under `sso_cache_dir` holds a token that
/// expires strictly after `now`. Never fails: unreadable state counts as
/// "no valid session".
pub fn is_session_valid(sso_cache_dir: &Path, now: DateTime<Utc>, verbose: bool) -> bool {
    if !sso_cache_dir.exists() {
        print_debug(
            &format!("SSO cache directory {} not found", sso_cache_dir.display()),
            verbose,
        );
        return false;
    }

    let entries = match fs::read_dir(sso_cache_dir) {
        Ok(entries) => entries,
        Err(e) => {
            print_error(&format!("Error checking SSO session: {}", e));
            return false;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let expiry = match read_expiry(&path) {
            Ok(Some(expiry)) => expiry,
            Ok(None) => continue,
            Err(e) => {
                print_warning(&format!(
                    "Skipping SSO cache file {}: {}",
                    path.display(),
                    e
                ));
                continue;
            }
        };

        if now < expiry {
            print_debug(
                &format!("Valid SSO token in {} (expires {})", path.display(), expiry),
                verbose,
            );
            return true;
        }
    }

    false
}

fn read_expiry(path: &Path) -> Result<Option<DateTime<Utc>>> {
    let content = fs::read_to_string(path)?;
    let entry: SsoCacheEntry = serde_json::from_str(&content)?;

    match entry.expires_at {
        Some(raw) => parse_expiry(&raw).map(Some),
        None => Ok(None),
    }
}

/// Accepts RFC 3339 as well as the `2024-05-01T10:00:00UTC` form written by
/// older CLI versions.
fn parse_expiry(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SUTC")
        .map(|naive| naive.and_utc())
        .map_err(|_| anyhow!("unrecognised expiresAt timestamp '{}'", raw))
}
