use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::{OpDescriptor, OpError};

static REGISTRY: spin::Once<OpRegistry> = spin::Once::new();

/// Maps operator names to their descriptors.
///
/// The process-wide instance is populated once by [`OpRegistry::init`] before
/// any compilation starts and is read-only afterwards, so lookups need no
/// locking. Standalone registries can be built with [`OpRegistry::new`].
#[derive(Debug, Default)]
pub struct OpRegistry {
    ops: HashMap<String, OpDescriptor>,
}

impl OpRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an operator, failing when its name is taken.
    pub fn register(&mut self, op: OpDescriptor) -> Result<(), OpError> {
        if self.ops.contains_key(op.name()) {
            return Err(OpError::DuplicateOperator {
                name: op.name().into(),
            });
        }

        log::debug!("registered operator '{}'", op.name());
        self.ops.insert(op.name().into(), op);
        Ok(())
    }

    /// Looks up an operator by name.
    pub fn get(&self, name: &str) -> Result<&OpDescriptor, OpError> {
        self.ops.get(name).ok_or_else(|| OpError::UnknownOperator {
            name: name.into(),
        })
    }

    /// Whether an operator with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Registered operator names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ops.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered operators.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Populates the process-wide registry.
    ///
    /// Must run once, single-threaded, before any compilation. `f` receives a
    /// registry already holding the built-in operators and may register more.
    /// A failure leaves the global registry uninitialized; a second call fails
    /// with [`OpError::RegistryAlreadyInitialized`].
    pub fn init<F>(f: F) -> Result<&'static OpRegistry, OpError>
    where
        F: FnOnce(&mut OpRegistry) -> Result<(), OpError>,
    {
        if REGISTRY.is_completed() {
            return Err(OpError::RegistryAlreadyInitialized);
        }

        REGISTRY.try_call_once(|| {
            let mut registry = OpRegistry::new();
            crate::ops::register_builtin(&mut registry)?;
            f(&mut registry)?;
            log::debug!("operator registry initialized with {} operator(s)", registry.len());
            Ok(registry)
        })
    }

    /// The process-wide registry, `None` before [`init`](Self::init).
    pub fn global() -> Option<&'static OpRegistry> {
        REGISTRY.get()
    }
}
