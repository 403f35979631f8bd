use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

type Shared = Arc<dyn Any + Send + Sync>;
type Slot = Arc<OnceLock<Shared>>;
type Factory = Arc<dyn Fn() -> Shared + Send + Sync>;

/// Default constructors for extensions, keyed by type.
///
/// Registered once on the [`Validator`](crate::Validator) and consulted the
/// first time a context asks for an extension of that type.
#[derive(Clone, Default)]
pub struct ExtensionFactories {
    inner: HashMap<TypeId, Factory>,
}

impl ExtensionFactories {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for `T`, replacing any previous one.
    pub fn register<T, F>(&mut self, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.inner
            .insert(TypeId::of::<T>(), Arc::new(move || Arc::new(factory()) as Shared));
    }

    #[must_use]
    pub fn contains<T: Any>(&self) -> bool {
        self.inner.contains_key(&TypeId::of::<T>())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for ExtensionFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionFactories")
            .field("len", &self.inner.len())
            .finish()
    }
}

/// Type-keyed registry of values shared by every branch of one validation.
///
/// Lookups are compute-if-absent and single-flight: when branches race to
/// create the same extension, one constructor runs and the others block until
/// its value is stored. A constructor may look up extensions of other types,
/// but must not ask for its own type.
#[derive(Default)]
pub struct Extensions {
    slots: DashMap<TypeId, Slot>,
    factories: ExtensionFactories,
}

impl Extensions {
    #[must_use]
    pub fn new(factories: ExtensionFactories) -> Self {
        Self {
            slots: DashMap::new(),
            factories,
        }
    }

    /// The extension of type `T`, created with its registered factory on first
    /// use. `None` if nothing is stored and no factory is registered.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        if let Some(found) = self.lookup::<T>() {
            return Some(found);
        }
        let factory = self.factories.inner.get(&TypeId::of::<T>())?;
        Some(self.init_with::<T>(|| factory()))
    }

    /// The extension of type `T`, created with `init` if absent.
    pub fn get_or_insert_with<T, F>(&self, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(found) = self.get::<T>() {
            return found;
        }
        self.init_with::<T>(|| Arc::new(init()))
    }

    pub fn get_or_default<T: Any + Send + Sync + Default>(&self) -> Arc<T> {
        self.get_or_insert_with(T::default)
    }

    /// Store `value`, replacing any existing extension of the same type.
    pub fn insert<T: Any + Send + Sync>(&self, value: T) {
        let slot = OnceLock::new();
        let _ = slot.set(Arc::new(value) as Shared);
        self.slots.insert(TypeId::of::<T>(), Arc::new(slot));
    }

    /// Number of stored extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value().get().is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let stored = Arc::clone(self.slots.get(&TypeId::of::<T>())?.value().get()?);
        stored.downcast::<T>().ok()
    }

    // The shard lock is held only to fetch the slot; the constructor runs
    // outside it, so nested lookups of other types cannot deadlock.
    fn init_with<T: Any + Send + Sync>(&self, init: impl FnOnce() -> Shared) -> Arc<T> {
        let slot = Arc::clone(self.slots.entry(TypeId::of::<T>()).or_default().value());
        let stored = Arc::clone(slot.get_or_init(init));
        match stored.downcast::<T>() {
            Ok(value) => value,
            Err(_) => unreachable!("extension slots are keyed by the TypeId of their value"),
        }
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.len())
            .field("factories", &self.factories)
            .finish()
    }
}
