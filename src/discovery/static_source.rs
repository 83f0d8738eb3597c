//! Fixed target list given on the command line.

use async_trait::async_trait;

use super::{sha256_hex, DiscoverySource, SnapshotVersion};
use crate::error::BroadcastError;
use crate::registry::TargetAddress;

pub struct StaticSource {
    targets: Vec<TargetAddress>,
}

impl StaticSource {
    #[must_use]
    pub const fn new(targets: Vec<TargetAddress>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl DiscoverySource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn load(&self) -> Result<(Vec<TargetAddress>, SnapshotVersion), BroadcastError> {
        let hash = sha256_hex(self.targets.join(",").as_bytes());
        Ok((self.targets.clone(), SnapshotVersion::Hash(hash)))
    }

    async fn has_changed(&self, _current: &SnapshotVersion) -> Result<bool, BroadcastError> {
        Ok(false)
    }
}
