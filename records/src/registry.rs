//!
//! Default record handlers, keyed by entity type.
//!

use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::handler::{BoundHandler, Handler, RecordHandler};
use crate::Entity;

#[derive(Default)]
pub struct HandlerRegistry {
    defaults: RwLock<HashMap<TypeId, BoundHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry queries use unless given another one.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<HandlerRegistry> = OnceLock::new();
        GLOBAL.get_or_init(HandlerRegistry::new)
    }

    /// Register the default handler for records of entity `E`,
    /// replacing any previous one.
    pub fn register_default<E, H>(&self, handler: H)
    where
        E: Entity,
        H: RecordHandler,
    {
        self.register_default_handler::<E, H::Record>(Arc::new(handler));
    }

    pub fn register_default_handler<E, R>(&self, handler: Handler<R>)
    where
        E: Entity,
        R: 'static,
    {
        log::debug!(
            "registering default {} handler for '{}'",
            std::any::type_name::<R>(),
            E::table()
        );
        self.defaults
            .write()
            .insert(TypeId::of::<E>(), BoundHandler::new(handler));
    }

    /// Remove the default handler of `E`. Returns whether one was registered.
    pub fn unregister<E: Entity>(&self) -> bool {
        self.defaults.write().remove(&TypeId::of::<E>()).is_some()
    }

    pub fn lookup<E: Entity>(&self) -> Option<BoundHandler> {
        self.defaults.read().get(&TypeId::of::<E>()).cloned()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.defaults.read().values())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::RecordDict;
    use crate::value::Mapping;

    struct Star;

    impl Entity for Star {
        fn table() -> &'static str {
            "star"
        }
    }

    struct Moon;

    impl Entity for Moon {
        fn table() -> &'static str {
            "moon"
        }
    }

    #[test]
    fn keyed_by_entity_type() {
        let registry = HandlerRegistry::new();
        registry.register_default::<Star, _>(RecordDict::<Mapping>::new());

        assert!(registry.lookup::<Star>().is_some());
        assert!(registry.lookup::<Moon>().is_none());

        let bound = registry.lookup::<Star>().unwrap();
        assert!(bound.downcast::<Mapping>().is_some());

        assert!(registry.unregister::<Star>());
        assert!(!registry.unregister::<Star>());
        assert!(registry.lookup::<Star>().is_none());
    }
}
