use super::DeviceInfo;
use crate::{MuxConfig, MuxError, Result};

/// Polls a device's DevTools HTTP endpoint for attachable execution contexts.
#[derive(Debug, Clone)]
pub struct DeviceDiscovery {
    endpoint: String,
    http_client: reqwest::Client,
}

impl DeviceDiscovery {
    pub fn new(config: &MuxConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.discovery_timeout)
            .build()?;

        Ok(Self {
            endpoint: config.discovery_endpoint.clone(),
            http_client,
        })
    }

    pub fn list_url(&self) -> String {
        format!("{}/json/list", self.endpoint.trim_end_matches('/'))
    }

    /// Targets currently advertised by the device. Entries without a WebSocket URL are
    /// already claimed by another debugger and are skipped.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let url = self.list_url();
        tracing::debug!("Listing devices: url={}", url);

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MuxError::InvalidResponse(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let devices: Vec<DeviceInfo> = response.json().await?;
        Ok(attachable(devices))
    }
}

fn attachable(devices: Vec<DeviceInfo>) -> Vec<DeviceInfo> {
    devices
        .into_iter()
        .filter(|device| device.web_socket_debugger_url.is_some())
        .collect()
}
