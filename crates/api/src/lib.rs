//! Wire and document types shared between the network map daemon and its
//! command-line client.

mod change;
mod errors;
mod hash;
mod model;
mod signed;

pub use change::Change;
pub use errors::{
    parse_whitelist_line, NodeAddError, NodeListEntry, NodeListResult, NotFoundError,
    NotaryListResult, ParametersUpdateError, ParametersUpdateResult, PublishNodeResult,
    WhitelistResult,
};
pub use hash::{Hash, ParseHashError};
pub use model::{
    LegalIdentity, NetworkMap, NetworkParameters, NodeInfo, NotaryInfo, ParametersUpdate,
    CURRENT_PARAMETERS_KEY, DEFAULT_MAX_MESSAGE_SIZE, LATEST_NETWORK_MAP_KEY,
    MAX_SIGNED_I32, NEXT_PARAMS_UPDATE_KEY,
};
pub use signed::{DecodeError, Signed};
