//! Shared grammar for the driver-specific segment of connection strings.
//!
//! The segment is a semicolon-separated list: the first component is
//! positional (a filesystem path, a host:port), the rest are `key=value`
//! options. Unknown keys are rejected; durations use the `15s` / `200ms` /
//! `2h` grammar.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// A parsed driver-specific segment.
#[derive(Debug)]
pub(crate) struct BackendUrl {
    /// The positional first component (may be empty).
    pub head: String,
    options: Vec<(String, String)>,
}

impl BackendUrl {
    pub fn parse(backend_url: &str) -> Result<Self, Error> {
        let mut parts = backend_url.split(';');
        let head = parts.next().unwrap_or_default().to_string();
        let mut options = Vec::new();
        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                return Err(Error::Config(
                    "options must have the format \"key=value\"".to_string(),
                ));
            };
            options.push((key.to_string(), value.to_string()));
        }
        Ok(Self { head, options })
    }

    /// Removes every occurrence of `key` and returns the last value, so a
    /// repeated option behaves like the last one given.
    pub fn take(&mut self, key: &str) -> Option<String> {
        let mut value = None;
        self.options.retain(|(k, v)| {
            if k == key {
                value = Some(v.clone());
                false
            } else {
                true
            }
        });
        value
    }

    pub fn take_duration(&mut self, key: &str) -> Result<Option<Duration>, Error> {
        match self.take(key) {
            None => Ok(None),
            Some(value) => humantime::parse_duration(&value)
                .map(Some)
                .map_err(|e| Error::Config(format!("cannot parse duration for {key}: {e}"))),
        }
    }

    /// Rejects any option that was not consumed.
    pub fn finish(self) -> Result<(), Error> {
        match self.options.first() {
            Some((key, _)) => Err(Error::Config(format!("unrecognized option \"{key}\""))),
            None => Ok(()),
        }
    }
}

/// Expands a leading `~/` to the caller's home directory.
pub(crate) fn expand_home(path: &str) -> Result<PathBuf, Error> {
    let Some(rest) = path.strip_prefix("~/") else {
        return Ok(PathBuf::from(path));
    };
    let dirs = directories::BaseDirs::new()
        .ok_or_else(|| Error::Config("cannot determine the home directory".to_string()))?;
    Ok(dirs.home_dir().join(rest))
}
