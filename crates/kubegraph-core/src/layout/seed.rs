use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::model::{EdgeId, NodeId};

/// Deterministic layout seed.
///
/// Derived seeds are the hex SHA-256 of the sorted node and edge ids, so
/// the same topology always gets the same seed regardless of insertion
/// order. Callers may also pin an explicit seed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutSeed(String);

#[derive(Serialize)]
struct SeedMaterial<'a> {
    nodes: Vec<&'a str>,
    edges: Vec<&'a str>,
}

impl LayoutSeed {
    pub fn from_ids<'a>(
        nodes: impl IntoIterator<Item = &'a NodeId>,
        edges: impl IntoIterator<Item = &'a EdgeId>,
    ) -> Self {
        let mut material = SeedMaterial {
            nodes: nodes.into_iter().map(NodeId::as_str).collect(),
            edges: edges.into_iter().map(EdgeId::as_str).collect(),
        };
        material.nodes.sort_unstable();
        material.nodes.dedup();
        material.edges.sort_unstable();
        material.edges.dedup();

        // Serializing a struct of string vectors cannot fail.
        let bytes = serde_json::to_vec(&material).unwrap_or_default();
        Self(hex::encode(Sha256::digest(&bytes)))
    }

    pub fn from_u64(seed: u64) -> Self {
        Self(format!("{:016x}", seed))
    }

    /// Accepts a hex string or a decimal integer.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = text.parse::<u64>() {
                return Self::from_u64(n);
            }
        }
        Self(text.to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Seed for the random number generator: the first eight bytes of the
    /// hex value, or of its SHA-256 when it is not hex.
    pub fn rng_seed(&self) -> u64 {
        let bytes = match hex::decode(&self.0) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => Sha256::digest(self.0.as_bytes()).to_vec(),
        };
        let mut buf = [0u8; 8];
        for (slot, byte) in buf.iter_mut().zip(bytes.iter()) {
            *slot = *byte;
        }
        u64::from_be_bytes(buf)
    }
}

impl fmt::Display for LayoutSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
