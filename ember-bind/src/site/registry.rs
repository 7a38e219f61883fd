//! Call-site registry.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::InternalError;
use crate::operation::OperationDescriptor;

use super::{CallSite, CallSiteId};

/// The call sites of one runtime, by id.
#[derive(Debug, Default)]
pub struct CallSiteRegistry {
    sites: RwLock<FxHashMap<CallSiteId, Arc<CallSite>>>,
    cache: CacheConfig,
}

impl CallSiteRegistry {
    pub fn new(cache: CacheConfig) -> Self {
        Self {
            sites: RwLock::new(FxHashMap::default()),
            cache,
        }
    }

    pub fn get(&self, id: CallSiteId) -> Option<Arc<CallSite>> {
        self.sites.read().get(&id).cloned()
    }

    /// The site registered under `id`, created on first use.
    ///
    /// A site is tied to the operation it was created for; asking for the
    /// same id with a different descriptor is an internal error.
    pub fn get_or_create(
        &self,
        id: CallSiteId,
        descriptor: &OperationDescriptor,
    ) -> Result<Arc<CallSite>, InternalError> {
        let site = match self.get(id) {
            Some(site) => site,
            None => {
                let mut sites = self.sites.write();
                sites
                    .entry(id)
                    .or_insert_with(|| {
                        debug!(site = %id, op = %descriptor, "call site created");
                        Arc::new(CallSite::new(id, descriptor.clone(), &self.cache))
                    })
                    .clone()
            }
        };

        if site.descriptor() != descriptor {
            return Err(InternalError::DescriptorMismatch {
                site: id,
                existing: site.descriptor().to_string(),
                requested: descriptor.to_string(),
            });
        }
        Ok(site)
    }

    pub fn len(&self) -> usize {
        self.sites.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registered site, in no particular order.
    pub fn sites(&self) -> Vec<Arc<CallSite>> {
        self.sites.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_reuses_site() {
        let registry = CallSiteRegistry::new(CacheConfig::default());
        let descriptor = OperationDescriptor::call("f", 1);

        let a = registry.get_or_create(CallSiteId::new(7), &descriptor).unwrap();
        let b = registry.get_or_create(CallSiteId::new(7), &descriptor).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_descriptor_mismatch() {
        let registry = CallSiteRegistry::new(CacheConfig::default());
        registry
            .get_or_create(CallSiteId::new(7), &OperationDescriptor::call("f", 1))
            .unwrap();

        let err = registry
            .get_or_create(CallSiteId::new(7), &OperationDescriptor::call("g", 1))
            .unwrap_err();
        assert!(matches!(err, InternalError::DescriptorMismatch { .. }));
    }
}
