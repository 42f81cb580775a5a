use std::fs;

use camino::Utf8PathBuf;

use crate::client::{format_http_error, format_status_error, NetMapApiClient};
use crate::println;

#[derive(Clone, Debug, clap::Args)]
pub struct Notary {
    #[command(subcommand)]
    command: NotaryCommand,
}

#[derive(Clone, Debug, clap::Subcommand)]
enum NotaryCommand {
    /// List the notaries currently in the network parameters
    #[command(name = "list")]
    List,

    /// Trust a party as a notary, reading its signed node info from a file
    #[command(name = "add")]
    Add {
        /// Path to the notary's signed `NodeInfo` envelope
        path: Utf8PathBuf,

        /// Whether the notary validates transactions before notarizing
        #[arg(long = "validating")]
        validating: bool,
    },

    /// Stop trusting a notary
    #[command(name = "remove")]
    Remove {
        /// The notary's legal name, exactly as it appears in `notary list`
        name: String,
    },
}

impl Notary {
    pub async fn execute(self, client: NetMapApiClient) -> Result<(), String> {
        match self.command {
            NotaryCommand::List => {
                let response = client.get("admin/api/notaries").send().await.map_err(format_http_error)?;
                if !response.status().is_success() {
                    return Err(format_status_error(response).await);
                }
                let result: netmap_api::NotaryListResult = response.json().await.map_err(format_http_error)?;
                if result.notaries.is_empty() {
                    println!("No notaries configured.");
                }
                for notary in result.notaries {
                    let kind = if notary.validating { "validating" } else { "non-validating" };
                    println!("{}  ({kind})", notary.identity.name);
                }
                Ok(())
            }

            NotaryCommand::Add { path, validating } => {
                let bytes = fs::read(&path).map_err(|e| format!("{path}: {e}"))?;
                let route = if validating {
                    "admin/api/notaries/validating"
                } else {
                    "admin/api/notaries/non-validating"
                };
                let response = client.post(route).body(bytes).send().await.map_err(format_http_error)?;
                if !response.status().is_success() {
                    return Err(format_status_error(response).await);
                }
                let result: netmap_api::ParametersUpdateResult = response.json().await.map_err(format_http_error)?;
                println!(
                    "Notary trusted. New network parameters {} activate at {}",
                    result.new_parameters_hash, result.activates_at
                );
                Ok(())
            }

            NotaryCommand::Remove { name } => {
                let response = client
                    .delete(&format!("admin/api/notaries/{name}"))
                    .send()
                    .await
                    .map_err(format_http_error)?;
                if !response.status().is_success() {
                    return Err(format_status_error(response).await);
                }
                let result: netmap_api::ParametersUpdateResult = response.json().await.map_err(format_http_error)?;
                println!(
                    "Notary '{name}' removed. New network parameters {} activate at {}",
                    result.new_parameters_hash, result.activates_at
                );
                Ok(())
            }
        }
    }
}
