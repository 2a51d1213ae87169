//! Post-install hook clearing the binary cache
//!
//! Installing or updating dependencies can change any workspace's binaries,
//! so the whole cache is dropped rather than individual keys.

use crate::cache::BinaryCache;
use crate::error::LightrunResult;
use tracing::info;

/// Clears the binary cache when the host reports changed dependencies
pub struct CacheInvalidator<'a> {
    cache: &'a BinaryCache,
}

impl<'a> CacheInvalidator<'a> {
    pub fn new(cache: &'a BinaryCache) -> Self {
        Self { cache }
    }

    /// Called by the host once dependency installation has completed
    pub async fn on_dependencies_changed(&self) -> LightrunResult<usize> {
        info!("Dependencies changed, invalidating binary cache");
        self.cache.invalidate_all().await
    }
}
