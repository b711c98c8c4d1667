// src/connection/handshake.rs

//! Drives the connection handshake: start, start-ok, tune, tune-ok, open.
//!
//! Each step waits for the previous one to finish. Failures are tagged with
//! the step they happened in so callers can tell a refused login from a
//! transport that never came up.

use crate::config::ConnectionOptions;
use crate::core::SessionError;
use crate::core::credentials::plain_response;
use crate::core::protocol::{
    CONTROL_CHANNEL, ConnectionOpen, ConnectionStart, ConnectionStartOk, FieldTable, FieldValue,
    PLAIN_MECHANISM, ProtocolCodec, Transport, TuneParams,
};
use tracing::{debug, info, warn};

const PRODUCT: &str = "spinelmq";
const PLATFORM: &str = "Rust";
const CLIENT_VERSION: &str = env!("SPINELMQ_CLIENT_VERSION");

/// Step labels, used in logs and in `HandshakeFailure`.
pub(crate) const STEP_TRANSPORT: &str = "transport.start";
pub(crate) const STEP_START: &str = "connection.start";
pub(crate) const STEP_START_OK: &str = "connection.start-ok";
pub(crate) const STEP_TUNE: &str = "connection.tune";
pub(crate) const STEP_TUNE_OK: &str = "connection.tune-ok";
pub(crate) const STEP_OPEN: &str = "connection.open";

pub(crate) struct Handshake<'a> {
    transport: &'a dyn Transport,
    codec: &'a dyn ProtocolCodec,
    options: &'a ConnectionOptions,
}

impl<'a> Handshake<'a> {
    pub(crate) fn new(
        transport: &'a dyn Transport,
        codec: &'a dyn ProtocolCodec,
        options: &'a ConnectionOptions,
    ) -> Self {
        Self {
            transport,
            codec,
            options,
        }
    }

    /// Runs every step in order and returns the negotiated limits.
    pub(crate) async fn run(&self) -> Result<TuneParams, SessionError> {
        self.transport
            .start()
            .await
            .map_err(|e| e.at_step(STEP_TRANSPORT))?;
        debug!("Transport started. Waiting for connection.start.");

        // Step 1: connection.start
        let start = self
            .codec
            .receive_connection_start(CONTROL_CHANNEL)
            .await
            .map_err(|e| e.at_step(STEP_START))?;
        if !start.offers_mechanism(PLAIN_MECHANISM) {
            return Err(SessionError::HandshakeFailure {
                step: STEP_START,
                reason: format!(
                    "server does not offer the {PLAIN_MECHANISM} mechanism (offered: '{}')",
                    start.mechanisms
                ),
            });
        }
        let locale = select_locale(&start, &self.options.locale);
        info!(
            "Handshake step 1/5 (connection.start) successful. Server speaks AMQP {}-{}.",
            start.version_major, start.version_minor
        );

        // Step 2: connection.start-ok
        let start_ok = ConnectionStartOk {
            client_properties: client_properties(self.options),
            mechanism: PLAIN_MECHANISM.to_string(),
            response: plain_response(&self.options.username, &self.options.password),
            locale,
        };
        self.codec
            .send_connection_start_ok(CONTROL_CHANNEL, start_ok)
            .await
            .map_err(|e| e.at_step(STEP_START_OK))?;
        info!(
            "Handshake step 2/5 (connection.start-ok) successful. Authenticating as '{}'.",
            self.options.username
        );

        // Step 3: connection.tune
        let proposed = self
            .codec
            .receive_connection_tune(CONTROL_CHANNEL)
            .await
            .map_err(|e| e.at_step(STEP_TUNE))?;
        let negotiated = negotiate(&proposed, self.options.heartbeat_interval);
        info!("Handshake step 3/5 (connection.tune) successful. Server proposed {proposed:?}.");

        // Step 4: connection.tune-ok
        self.codec
            .send_connection_tune_ok(CONTROL_CHANNEL, negotiated)
            .await
            .map_err(|e| e.at_step(STEP_TUNE_OK))?;
        self.transport.tune_heartbeat(negotiated.heartbeat);
        info!("Handshake step 4/5 (connection.tune-ok) successful. Using {negotiated:?}.");

        // Step 5: connection.open
        self.codec
            .send_connection_open(
                CONTROL_CHANNEL,
                ConnectionOpen {
                    virtual_host: self.options.virtual_host.clone(),
                },
            )
            .await
            .map_err(|e| e.at_step(STEP_OPEN))?;
        info!(
            "Handshake step 5/5 (connection.open) successful. Virtual host '{}'.",
            self.options.virtual_host
        );

        Ok(negotiated)
    }
}

/// The configured locale if the server offers it, otherwise the server's
/// first offered locale. An empty offer keeps the configured one.
pub(crate) fn select_locale(start: &ConnectionStart, configured: &str) -> String {
    if start.offers_locale(configured) {
        return configured.to_string();
    }
    match start.locales.split_whitespace().next() {
        Some(offered) => {
            warn!("Server does not offer locale '{configured}'. Using '{offered}'.");
            offered.to_string()
        }
        None => configured.to_string(),
    }
}

/// Applies the client's heartbeat preference to the server's proposal.
/// `channel_max` and `frame_max` are taken as proposed.
pub(crate) fn negotiate(proposed: &TuneParams, heartbeat_override: Option<u16>) -> TuneParams {
    TuneParams {
        heartbeat: heartbeat_override.unwrap_or(proposed.heartbeat),
        ..*proposed
    }
}

/// Builds the client properties table sent in connection-start-ok.
pub(crate) fn client_properties(options: &ConnectionOptions) -> FieldTable {
    let mut table = FieldTable::new();
    table.insert("product".into(), FieldValue::LongString(PRODUCT.into()));
    table.insert(
        "version".into(),
        FieldValue::LongString(CLIENT_VERSION.into()),
    );
    table.insert("platform".into(), FieldValue::LongString(PLATFORM.into()));
    // Ask for a connection-close instead of a dropped socket on bad credentials.
    let mut capabilities = FieldTable::new();
    capabilities.insert("authentication_failure_close".into(), FieldValue::Bool(true));
    table.insert("capabilities".into(), FieldValue::Table(capabilities));
    if let Some(name) = &options.connection_name {
        table.insert(
            "connection_name".into(),
            FieldValue::LongString(name.clone()),
        );
    }
    for (key, value) in &options.client_properties {
        table.insert(key.clone(), FieldValue::LongString(value.clone()));
    }
    table
}
