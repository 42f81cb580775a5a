use std::fs;

use camino::Utf8PathBuf;

use crate::client::{format_http_error, format_status_error, NetMapApiClient};
use crate::println;

#[derive(Clone, Debug, clap::Args)]
pub struct Whitelist {
    #[command(subcommand)]
    command: WhitelistCommand,
}

#[derive(Clone, Debug, clap::Subcommand)]
enum WhitelistCommand {
    /// List the contracts currently whitelisted and their approved attachment hashes
    #[command(name = "list")]
    List,

    /// Add attachment hashes to the whitelist, leaving existing entries in place
    #[command(name = "append")]
    Append {
        /// Path to a file of `<fqn>:<sha256>` lines, one per attachment
        path: Utf8PathBuf,
    },

    /// Replace the whole whitelist with the contents of a file
    #[command(name = "replace")]
    Replace {
        /// Path to a file of `<fqn>:<sha256>` lines, one per attachment
        path: Utf8PathBuf,
    },

    /// Empty the whitelist
    #[command(name = "clear")]
    Clear,
}

impl Whitelist {
    pub async fn execute(self, client: NetMapApiClient) -> Result<(), String> {
        match self.command {
            WhitelistCommand::List => {
                let response = client.get("admin/api/whitelist").send().await.map_err(format_http_error)?;
                if !response.status().is_success() {
                    return Err(format_status_error(response).await);
                }
                let result: netmap_api::WhitelistResult = response.json().await.map_err(format_http_error)?;
                if result.entries.is_empty() {
                    println!("The whitelist is empty.");
                }
                for (fqn, hashes) in result.entries {
                    println!("{fqn}:");
                    for hash in hashes {
                        println!("  {hash}");
                    }
                }
                Ok(())
            }

            WhitelistCommand::Append { path } => {
                let body = fs::read_to_string(&path).map_err(|e| format!("{path}: {e}"))?;
                let result = submit_whitelist(&client, "admin/api/whitelist/append", body).await?;
                println!(
                    "Whitelist updated. New network parameters {} activate at {}",
                    result.new_parameters_hash, result.activates_at
                );
                Ok(())
            }

            WhitelistCommand::Replace { path } => {
                let body = fs::read_to_string(&path).map_err(|e| format!("{path}: {e}"))?;
                let result = submit_whitelist(&client, "admin/api/whitelist/replace", body).await?;
                println!(
                    "Whitelist replaced. New network parameters {} activate at {}",
                    result.new_parameters_hash, result.activates_at
                );
                Ok(())
            }

            WhitelistCommand::Clear => {
                let response = client
                    .post("admin/api/whitelist/clear")
                    .send()
                    .await
                    .map_err(format_http_error)?;
                if !response.status().is_success() {
                    return Err(format_status_error(response).await);
                }
                let result: netmap_api::ParametersUpdateResult = response.json().await.map_err(format_http_error)?;
                println!(
                    "Whitelist cleared. New network parameters {} activate at {}",
                    result.new_parameters_hash, result.activates_at
                );
                Ok(())
            }
        }
    }
}

async fn submit_whitelist(
    client: &NetMapApiClient,
    route: &str,
    body: String,
) -> Result<netmap_api::ParametersUpdateResult, String> {
    let response = client.post(route).body(body).send().await.map_err(format_http_error)?;
    if !response.status().is_success() {
        return Err(format_status_error(response).await);
    }
    response.json().await.map_err(format_http_error)
}
