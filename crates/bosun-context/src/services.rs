use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// A type-keyed service locator.
///
/// One instance per type. Clones share the same services.
#[derive(Clone, Default)]
pub struct Services {
  map: Arc<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>>,
}

impl Services {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a service, replacing any previous instance of the same type.
  pub fn insert<T: Any + Send + Sync>(&self, service: Arc<T>) {
    self.map.write().insert(TypeId::of::<T>(), service);
  }

  pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
    let service = self.map.read().get(&TypeId::of::<T>())?.clone();
    service.downcast::<T>().ok()
  }

  pub fn contains<T: Any + Send + Sync>(&self) -> bool {
    self.map.read().contains_key(&TypeId::of::<T>())
  }
}

impl std::fmt::Debug for Services {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Services")
      .field("count", &self.map.read().len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Clock(u64);

  #[test]
  fn test_insert_and_get() {
    let services = Services::new();
    assert!(services.get::<Clock>().is_none());

    services.insert(Arc::new(Clock(7)));
    assert_eq!(services.get::<Clock>().unwrap().0, 7);
    assert!(services.contains::<Clock>());
    assert!(!services.contains::<String>());
  }

  #[test]
  fn test_clones_share_services() {
    let services = Services::new();
    let other = services.clone();
    other.insert(Arc::new(Clock(1)));
    assert!(services.contains::<Clock>());
  }
}
