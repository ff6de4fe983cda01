//! Type-safe registry of resource services.
//!
//! - Key = `type_name::<dyn ResourceService<T>>()`, one service per model type.
//! - Value = `Arc<dyn ResourceService<T>>` stored as `Box<dyn Any + Send + Sync>`
//!   and downcast on read.
//! - Re-registering overwrites atomically; `Arc`s already handed out stay valid.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::service::ResourceService;

/// Stable type key, the fully-qualified `type_name` of the service trait object.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct TypeKey(&'static str);

impl TypeKey {
    #[inline]
    fn of<T: ?Sized + 'static>() -> Self {
        TypeKey(std::any::type_name::<T>())
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("no service registered for {type_key:?}")]
    NotRegistered { type_key: TypeKey },

    #[error("type mismatch in hub for {type_key:?}")]
    TypeMismatch { type_key: TypeKey },
}

type Boxed = Box<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct ServiceHub {
    map: RwLock<HashMap<TypeKey, Boxed>>,
}

impl ServiceHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the service for model `T`, replacing any previous one.
    pub fn register<T: Send + 'static>(&self, service: Arc<dyn ResourceService<T>>) {
        let type_key = TypeKey::of::<dyn ResourceService<T>>();
        tracing::debug!(service = ?type_key, "registering resource service");
        self.map.write().insert(type_key, Box::new(service));
    }

    /// # Errors
    /// `NotRegistered` when nothing was registered for `T`.
    pub fn get<T: Send + 'static>(&self) -> Result<Arc<dyn ResourceService<T>>, HubError> {
        let type_key = TypeKey::of::<dyn ResourceService<T>>();
        let r = self.map.read();
        let boxed = r.get(&type_key).ok_or_else(|| HubError::NotRegistered {
            type_key: type_key.clone(),
        })?;

        if let Some(service) = boxed.downcast_ref::<Arc<dyn ResourceService<T>>>() {
            return Ok(Arc::clone(service));
        }
        Err(HubError::TypeMismatch { type_key })
    }

    #[must_use]
    pub fn contains<T: Send + 'static>(&self) -> bool {
        self.map
            .read()
            .contains_key(&TypeKey::of::<dyn ResourceService<T>>())
    }

    /// Remove a service; returns it if it was present.
    pub fn remove<T: Send + 'static>(&self) -> Option<Arc<dyn ResourceService<T>>> {
        let boxed = self
            .map
            .write()
            .remove(&TypeKey::of::<dyn ResourceService<T>>())?;
        boxed
            .downcast::<Arc<dyn ResourceService<T>>>()
            .ok()
            .map(|b| *b)
    }

    pub fn clear(&self) {
        self.map.write().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pco_errors::PcoError;
    use pco_query::{PagedResult, QueryParameters};
    use tokio_util::sync::CancellationToken;

    struct Fixed(u32);

    #[async_trait]
    impl ResourceService<u32> for Fixed {
        async fn get(&self, _id: &str, _cancel: &CancellationToken) -> Result<u32, PcoError> {
            Ok(self.0)
        }

        async fn list(
            &self,
            _params: QueryParameters,
            _cancel: &CancellationToken,
        ) -> Result<PagedResult<u32>, PcoError> {
            Ok(PagedResult::from_items(vec![self.0]))
        }
    }

    #[tokio::test]
    async fn register_and_get() {
        let hub = ServiceHub::new();
        let svc: Arc<dyn ResourceService<u32>> = Arc::new(Fixed(7));
        hub.register(Arc::clone(&svc));

        let got = hub.get::<u32>().unwrap();
        assert_eq!(got.get("x", &CancellationToken::new()).await.unwrap(), 7);
        assert!(Arc::ptr_eq(&svc, &got));
        assert!(hub.contains::<u32>());
        assert_eq!(hub.len(), 1);
    }

    #[tokio::test]
    async fn existing_arcs_remain_valid_after_re_registration() {
        let hub = ServiceHub::new();
        hub.register::<u32>(Arc::new(Fixed(100)));
        let first = hub.get::<u32>().unwrap();

        hub.register::<u32>(Arc::new(Fixed(200)));
        let second = hub.get::<u32>().unwrap();

        let cancel = CancellationToken::new();
        assert_eq!(first.get("x", &cancel).await.unwrap(), 100);
        assert_eq!(second.get("x", &cancel).await.unwrap(), 200);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn get_unregistered_names_the_service_type() {
        let hub = ServiceHub::new();
        match hub.get::<String>() {
            Err(HubError::NotRegistered { type_key }) => {
                assert!(format!("{type_key:?}").contains("ResourceService<alloc::string::String>"));
            }
            Err(other) => panic!("Expected NotRegistered, got {other:?}"),
            Ok(_) => panic!("Expected NotRegistered, got a service"),
        }
    }

    #[test]
    fn remove_and_clear() {
        let hub = ServiceHub::new();
        hub.register::<u32>(Arc::new(Fixed(1)));
        assert!(hub.remove::<u32>().is_some());
        assert!(hub.remove::<u32>().is_none());
        hub.register::<u32>(Arc::new(Fixed(1)));
        hub.clear();
        assert!(hub.is_empty());
    }
}
