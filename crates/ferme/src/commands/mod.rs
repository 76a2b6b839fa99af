//! CLI command implementations.

use std::net::IpAddr;

use anyhow::{Context, Result};

use ferme::client::FermeClient;
use ferme::config::{Config, ServerConfig};

pub mod check;
pub mod notifications;
pub mod serve;
pub mod task;

/// Local URL of the server described by `server`.
///
/// A wildcard bind address is reached through loopback.
pub fn local_url(server: &ServerConfig, port_override: Option<u16>) -> String {
    let port = port_override.unwrap_or(server.port);
    let host = match server.host.parse::<IpAddr>() {
        Ok(ip) if ip.is_unspecified() => "127.0.0.1".to_string(),
        Ok(IpAddr::V6(ip)) => format!("[{}]", ip),
        _ => server.host.clone(),
    };
    format!("http://{}:{}", host, port)
}

/// Build a client for the configured (or given) server and make sure it answers.
pub async fn connect(config_path: &str, server: Option<&str>) -> Result<FermeClient> {
    let config = Config::load(config_path).await?;
    let url = server
        .map(str::to_string)
        .unwrap_or_else(|| local_url(&config.server, None));

    let client = FermeClient::new(&url).with_token(config.server.api_token.clone());
    client
        .health()
        .await
        .with_context(|| format!("No ferme server reachable at {} (start one with `ferme serve`)", url))?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_url_maps_wildcard_to_loopback() {
        let server = ServerConfig {
            host: "0.0.0.0".to_string(),
            ..Default::default()
        };
        assert_eq!(local_url(&server, None), "http://127.0.0.1:8080");
        assert_eq!(local_url(&server, Some(9000)), "http://127.0.0.1:9000");

        let v6 = ServerConfig {
            host: "::1".to_string(),
            ..Default::default()
        };
        assert_eq!(local_url(&v6, None), "http://[::1]:8080");
    }
}
