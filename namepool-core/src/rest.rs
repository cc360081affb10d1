//! Remote proxy driver.
//!
//! Turns the engine interface into HTTP calls against a server that itself
//! holds an engine. The protocol is transparent: the same contract as a
//! local backend, plus the network failure mode. Business errors of
//! `$try_acquire` travel in the 200 body so they stay distinguishable from
//! transport errors.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::{Error, Result, StoreError};
use crate::manager::NameManager;
use crate::types::Name;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RestBackend {
    /// Base URL of the server, e.g. `http://localhost:9008`.
    base_url: String,
    client: reqwest::blocking::Client,
    clock: Arc<dyn Clock>,
    keep_alive_interval: Option<Duration>,
}

impl RestBackend {
    pub fn new(
        host_port: &str,
        keep_alive_interval: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(StoreError::from)?;
        Ok(Self {
            base_url: format!("http://{host_port}"),
            client,
            clock,
            keep_alive_interval,
        })
    }

    fn get(&self, endpoint: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .send()
            .map_err(StoreError::from)?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(StoreError::Backend(format!(
                "{endpoint}: non-200 status code: {status}"
            ))
            .into());
        }
        let body = response.text().map_err(StoreError::from)?;
        Ok(body.trim().to_string())
    }
}

impl NameManager for RestBackend {
    fn acquire(&self, family: &str) -> Result<String> {
        self.get(&format!("/family/{family}/$acquire"))
    }

    fn try_acquire(&self, family: &str, name: &str) -> Result<()> {
        let body = self.get(&format!("/family/{family}/name/{name}/$try_acquire"))?;
        match body.as_str() {
            "ERR_NOT_EXIST" => Err(Error::NotExist),
            "ERR_IN_USE" => Err(Error::InUse),
            _ => Ok(()),
        }
    }

    fn keep_alive(&self, family: &str, name: &str) -> Result<()> {
        self.get(&format!("/family/{family}/name/{name}/$keep_alive"))?;
        Ok(())
    }

    fn release(&self, family: &str, name: &str) -> Result<()> {
        self.get(&format!("/family/{family}/name/{name}/$release"))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<Name>> {
        let body = self.get("/")?;
        let names = serde_json::from_str(&body).map_err(StoreError::from)?;
        Ok(names)
    }

    fn reset(&self) -> Result<()> {
        self.get("/$reset")?;
        Ok(())
    }

    fn keep_alive_interval(&self) -> Option<Duration> {
        self.keep_alive_interval
    }

    fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
