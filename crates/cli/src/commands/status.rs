use netmap_api::{NetworkMap, NetworkParameters, Signed};

use crate::ansi;
use crate::client::{format_http_error, format_status_error, NetMapApiClient};
use crate::{eprintln, println};

#[derive(Clone, Debug, clap::Args)]
pub struct Status;

impl Status {
    pub async fn execute(self, client: NetMapApiClient) -> Result<(), String> {
        let params_response = client.get("admin/api/network-parameters").send().await.map_err(format_http_error)?;
        if !params_response.status().is_success() {
            return Err(format_status_error(params_response).await);
        }
        let params_bytes = params_response.bytes().await.map_err(format_http_error)?;
        let params: NetworkParameters = Signed::from_bytes(params_bytes)
            .map_err(|_| "malformed signed network parameters".to_string())?
            .decode_payload()
            .map_err(|e| e.to_string())?;

        println!("Network parameters (epoch {}):", params.epoch);
        println!("  Minimum platform version: {}", params.min_platform_version);
        println!("  Maximum message size:     {} bytes", params.max_message_size);
        println!("  Maximum transaction size: {} bytes", params.max_transaction_size);
        println!("  Notaries:                 {}", params.notaries.len());
        println!("  Whitelisted contracts:    {}", params.whitelisted_contracts.len());
        println!();

        let map_response = client.get("network-map").send().await.map_err(format_http_error)?;
        if !map_response.status().is_success() {
            eprintln!("{}no network map has been published yet{}", ansi::YELLOW, ansi::RESET);
            return Ok(());
        }
        let map_bytes = map_response.bytes().await.map_err(format_http_error)?;
        let map: NetworkMap = Signed::from_bytes(map_bytes)
            .map_err(|_| "malformed signed network map".to_string())?
            .decode_payload()
            .map_err(|e| e.to_string())?;

        println!("Network map:");
        println!("  Published nodes: {}", map.node_info_hashes.len());
        match map.parameters_update {
            Some(update) => println!(
                "  {}Pending update{}: {} (activates {})",
                ansi::YELLOW,
                ansi::RESET,
                update.description,
                update.update_deadline
            ),
            None => println!("  {}No pending parameters update{}", ansi::GRAY, ansi::RESET),
        }

        Ok(())
    }
}
