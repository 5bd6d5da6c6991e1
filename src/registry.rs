use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;

/// Zero-argument factory for `T`. Whether it hands out a fresh value or a
/// shared singleton is decided when the binding is declared.
pub type Provider<T> = Arc<dyn Fn() -> Arc<T> + Send + Sync>;

#[derive(Debug)]
pub struct UnboundTypeError {
    pub type_name: &'static str,
}

impl fmt::Display for UnboundTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No binding of type [{}]", self.type_name)
    }
}

impl std::error::Error for UnboundTypeError {}

#[derive(Debug)]
pub struct DuplicateBindingError {
    pub type_name: &'static str,
}

impl fmt::Display for DuplicateBindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type [{}] is bound more than once", self.type_name)
    }
}

impl std::error::Error for DuplicateBindingError {}

struct BindingEntry {
    type_name: &'static str,
    // Always a `Provider<T>` for the `T` whose `TypeId` keys this entry.
    provider: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct RegistryBuilder {
    bindings: HashMap<TypeId, BindingEntry>,
    duplicates: Vec<&'static str>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `T` to a factory invoked on every lookup.
    pub fn bind<T, F>(mut self, factory: F) -> Self
    where
        T: ?Sized + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        let provider: Provider<T> = Arc::new(factory);
        let key = TypeId::of::<T>();
        if self.bindings.contains_key(&key) {
            self.duplicates.push(type_name::<T>());
            return self;
        }
        self.bindings.insert(
            key,
            BindingEntry {
                type_name: type_name::<T>(),
                provider: Box::new(provider),
            },
        );
        self
    }

    /// Binds `T` to a single shared instance.
    pub fn bind_instance<T>(self, instance: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.bind::<T, _>(move || Arc::clone(&instance))
    }

    pub fn build(self) -> Result<Registry> {
        if let Some(&type_name) = self.duplicates.first() {
            return Err(DuplicateBindingError { type_name }.into());
        }
        Ok(Registry {
            bindings: Arc::new(self.bindings),
        })
    }
}

/// Immutable type-to-provider table. Built once, then shared freely; clones
/// share the same bindings.
#[derive(Clone)]
pub struct Registry {
    bindings: Arc<HashMap<TypeId, BindingEntry>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn get_instance<T: ?Sized + 'static>(&self) -> Result<Arc<T>> {
        let provider = self.get_provider::<T>()?;
        Ok(provider())
    }

    pub fn get_instance_or_none<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.provider_or_none::<T>().map(|provider| provider())
    }

    pub fn get_provider<T: ?Sized + 'static>(&self) -> Result<Provider<T>> {
        self.provider_or_none::<T>().ok_or_else(|| {
            UnboundTypeError {
                type_name: type_name::<T>(),
            }
            .into()
        })
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bound_type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.bindings.values().map(|entry| entry.type_name).collect();
        names.sort_unstable();
        names
    }

    fn provider_or_none<T: ?Sized + 'static>(&self) -> Option<Provider<T>> {
        self.bindings
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.provider.downcast_ref::<Provider<T>>())
            .cloned()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("bindings", &self.bound_type_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn resolves_trait_objects() {
        let registry = Registry::builder()
            .bind::<dyn Greeter, _>(|| Arc::new(English) as Arc<dyn Greeter>)
            .build()
            .unwrap();
        let greeter = registry.get_instance::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "hello");
        assert!(registry.contains::<dyn Greeter>());
    }

    #[test]
    fn factories_run_on_every_lookup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = Registry::builder()
            .bind::<String, _>(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Arc::new(format!("instance-{n}"))
            })
            .build()
            .unwrap();
        assert_eq!(*registry.get_instance::<String>().unwrap(), "instance-0");
        assert_eq!(*registry.get_instance::<String>().unwrap(), "instance-1");
        let provider = registry.get_provider::<String>().unwrap();
        assert_eq!(*provider(), "instance-2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn instance_bindings_are_shared() {
        let registry = Registry::builder()
            .bind_instance(Arc::new(42u32))
            .build()
            .unwrap();
        let a = registry.get_instance::<u32>().unwrap();
        let b = registry.get_instance::<u32>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn duplicate_bindings_fail_at_build() {
        let err = Registry::builder()
            .bind_instance(Arc::new(1u8))
            .bind_instance(Arc::new(2u8))
            .build()
            .unwrap_err();
        let dup = err.downcast_ref::<DuplicateBindingError>().unwrap();
        assert_eq!(dup.type_name, "u8");
    }

    #[test]
    fn unbound_lookup_names_the_type() {
        let registry = Registry::builder().build().unwrap();
        let err = registry.get_instance::<u64>().unwrap_err();
        assert_eq!(err.to_string(), "No binding of type [u64]");
        assert!(registry.get_instance_or_none::<u64>().is_none());
        assert!(registry.is_empty());
    }
}
