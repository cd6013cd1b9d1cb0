use thiserror::Error;

use crate::model::{EdgeId, NodeId};

/// Records the graph store refuses to hold.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Edge id {0} does not match its endpoints and relation")]
    EdgeIdMismatch(EdgeId),

    #[error("Edge {0} connects a node to itself")]
    SelfLoop(EdgeId),

    #[error("Node id {id} does not match kind, namespace and name")]
    NodeIdMismatch { id: NodeId },
}
