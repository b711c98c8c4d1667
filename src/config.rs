// src/config.rs

//! Connection options: loading from TOML, defaults, and validation.

use crate::core::protocol::DEFAULT_LOCALE;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::time::Duration;
use tracing::warn;

/// Everything a caller supplies to open a connection.
#[derive(Clone, Deserialize)]
pub struct ConnectionOptions {
    pub username: String,
    pub password: String,
    /// Overrides the heartbeat interval proposed by the server, in seconds.
    /// `0` disables heartbeats. When absent the server's proposal is used.
    #[serde(default)]
    pub heartbeat_interval: Option<u16>,
    #[serde(default = "default_virtual_host")]
    pub virtual_host: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Deadline for the whole handshake. `0s` waits forever.
    #[serde(with = "humantime_serde", default = "default_handshake_timeout")]
    pub handshake_timeout: Duration,
    /// Shown by the broker's management tools when set.
    #[serde(default)]
    pub connection_name: Option<String>,
    /// Extra entries merged into the client properties table.
    #[serde(default)]
    pub client_properties: BTreeMap<String, String>,
}

fn default_virtual_host() -> String {
    "/".to_string()
}
fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}
fn default_handshake_timeout() -> Duration {
    Duration::from_secs(30)
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("virtual_host", &self.virtual_host)
            .field("locale", &self.locale)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("connection_name", &self.connection_name)
            .field("client_properties", &self.client_properties)
            .finish()
    }
}

impl ConnectionOptions {
    /// Options with the given credentials and defaults for everything else.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            heartbeat_interval: None,
            virtual_host: default_virtual_host(),
            locale: default_locale(),
            handshake_timeout: default_handshake_timeout(),
            connection_name: None,
            client_properties: BTreeMap::new(),
        }
    }

    pub fn with_heartbeat(mut self, interval_secs: u16) -> Self {
        self.heartbeat_interval = Some(interval_secs);
        self
    }

    pub fn with_virtual_host(mut self, virtual_host: impl Into<String>) -> Self {
        self.virtual_host = virtual_host.into();
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }

    /// The handshake deadline, or `None` when waiting is unbounded.
    pub fn handshake_deadline(&self) -> Option<Duration> {
        (!self.handshake_timeout.is_zero()).then_some(self.handshake_timeout)
    }

    /// Creates a new `ConnectionOptions` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Parses and validates options from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let options: ConnectionOptions =
            toml::from_str(contents).context("Failed to parse connection options TOML")?;
        options.validate()?;
        Ok(options)
    }

    /// Validates the options to ensure the handshake can be attempted at all.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(anyhow!("username cannot be empty"));
        }
        // NUL separates the fields of the PLAIN response.
        if self.username.contains('\0') {
            return Err(anyhow!("username cannot contain NUL bytes"));
        }
        if self.password.contains('\0') {
            return Err(anyhow!("password cannot contain NUL bytes"));
        }
        if self.virtual_host.trim().is_empty() {
            return Err(anyhow!("virtual_host cannot be empty"));
        }
        if self.locale.trim().is_empty() {
            return Err(anyhow!("locale cannot be empty"));
        }
        if self.password.is_empty() {
            warn!("Connecting as '{}' with an empty password.", self.username);
        }
        if self.heartbeat_interval == Some(0) {
            warn!("Heartbeats are disabled. Dead peers will only be noticed by the OS.");
        }
        Ok(())
    }
}
