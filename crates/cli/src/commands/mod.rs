//! The subcommands of `netmap`.

pub mod node;
pub mod notary;
pub mod status;
pub mod whitelist;

use super::client::NetMapApiClient;

#[derive(Clone, Debug, clap::Subcommand)]
pub enum Command {
    /// Show a summary of the current network parameters and network map
    #[command(name = "status")]
    Status(self::status::Status),

    /// Publish a node's signed descriptor, or fetch one back by its hash
    #[command(name = "node")]
    Node(self::node::Node),

    /// Manage the notary set
    #[command(name = "notary")]
    Notary(self::notary::Notary),

    /// Manage the contract attachment whitelist
    #[command(name = "whitelist")]
    Whitelist(self::whitelist::Whitelist),
}

impl Command {
    pub async fn execute(self, client: NetMapApiClient) -> Result<(), String> {
        match self {
            Self::Status(status) => status.execute(client).await,
            Self::Node(node) => node.execute(client).await,
            Self::Notary(notary) => notary.execute(client).await,
            Self::Whitelist(whitelist) => whitelist.execute(client).await,
        }
    }
}
