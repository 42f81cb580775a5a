use std::fs;

use camino::Utf8PathBuf;
use netmap_api::{NodeInfo, Signed};

use crate::client::{format_http_error, format_status_error, NetMapApiClient};
use crate::println;

#[derive(Clone, Debug, clap::Args)]
pub struct Node {
    #[command(subcommand)]
    command: NodeCommand,
}

#[derive(Clone, Debug, clap::Subcommand)]
enum NodeCommand {
    /// List every published node's hash and legal identities
    #[command(name = "list")]
    List,

    /// Publish a signed node descriptor read from a file
    #[command(name = "publish")]
    Publish {
        /// Path to the raw signed `NodeInfo` bytes
        path: Utf8PathBuf,
    },

    /// Fetch a previously published node descriptor by its hash
    #[command(name = "get")]
    Get {
        /// The node's content hash, as hex
        hash: String,
        /// Where to write the raw signed bytes (stdout if omitted)
        #[arg(long = "out")]
        out: Option<Utf8PathBuf>,
    },

    /// Delete a previously published node descriptor
    #[command(name = "delete")]
    Delete {
        /// The node's content hash, as hex
        hash: String,
    },
}

impl Node {
    pub async fn execute(self, client: NetMapApiClient) -> Result<(), String> {
        match self.command {
            NodeCommand::List => {
                let response = client.get("admin/api/nodes").send().await.map_err(format_http_error)?;
                if !response.status().is_success() {
                    return Err(format_status_error(response).await);
                }
                let result: netmap_api::NodeListResult = response.json().await.map_err(format_http_error)?;
                if result.nodes.is_empty() {
                    println!("No nodes have been published.");
                }
                for node in result.nodes {
                    println!("{}  {}", node.hash, node.legal_identities.join(", "));
                }
                Ok(())
            }

            NodeCommand::Publish { path } => {
                let bytes = fs::read(&path).map_err(|e| format!("{path}: {e}"))?;
                // Validate the envelope shape locally before sending it, so
                // a malformed file fails fast with a useful message rather
                // than a generic 400 from the daemon.
                Signed::<NodeInfo>::from_bytes(bytes.clone())
                    .map_err(|_| format!("{path} does not contain a well-formed signed node info"))?;

                let response = client
                    .post("network-map/publish")
                    .body(bytes)
                    .send()
                    .await
                    .map_err(format_http_error)?;
                if !response.status().is_success() {
                    return Err(format_status_error(response).await);
                }
                let result: netmap_api::PublishNodeResult = response.json().await.map_err(format_http_error)?;
                println!("Published node {}", result.hash);
                Ok(())
            }

            NodeCommand::Get { hash, out } => {
                let response = client
                    .get(&format!("network-map/node-info/{hash}"))
                    .send()
                    .await
                    .map_err(format_http_error)?;
                if !response.status().is_success() {
                    return Err(format_status_error(response).await);
                }
                let bytes = response.bytes().await.map_err(format_http_error)?;
                match out {
                    Some(path) => fs::write(&path, &bytes).map_err(|e| format!("{path}: {e}"))?,
                    None => {
                        use std::io::Write;
                        std::io::stdout().write_all(&bytes).map_err(|e| e.to_string())?;
                    }
                }
                Ok(())
            }

            NodeCommand::Delete { hash } => {
                let response = client
                    .delete(&format!("admin/api/nodes/{hash}"))
                    .send()
                    .await
                    .map_err(format_http_error)?;
                if !response.status().is_success() {
                    return Err(format_status_error(response).await);
                }
                println!("Deleted node {hash}");
                Ok(())
            }
        }
    }
}
