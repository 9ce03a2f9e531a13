//! Game server status probes.
//!
//! The launcher shows the server's player list on several screens at once, so
//! pings are deduplicated by address. A failed ping is returned to the caller
//! and never written to `error`.

use super::Orchestrator;
use crate::bridge::{CommandBridge, ServerStatus};
use crate::core::{PacksyncError, Result};
use tracing::debug;

impl<B: CommandBridge> Orchestrator<B> {
    /// Ping the game server at `address` (`host` or `host:port`).
    pub async fn server_status(&self, address: &str) -> Result<ServerStatus> {
        let bridge = &self.bridge;
        self.servers
            .execute(address, || async move {
                let status = bridge
                    .ping_server(address)
                    .await
                    .map_err(|err| PacksyncError::ping(address, err))?;
                debug!(
                    address,
                    online = status.online,
                    players = ?status.player_count,
                    "Server status received"
                );
                Ok(status)
            })
            .await
    }
}
