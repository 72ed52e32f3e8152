#![forbid(unsafe_code)]

//! Shared services a tree needs: types, converters and configuration.
//!
//! Passed explicitly to [`ViewTree::new`](crate::ViewTree::new); there is no
//! process-wide instance.

use std::rc::Rc;

use mbind_core::ConverterRegistry;

use crate::config::RuntimeConfig;
use crate::registry::TypeRegistry;

#[derive(Debug, Clone)]
pub struct UiContext {
    pub registry: Rc<TypeRegistry>,
    pub converters: Rc<ConverterRegistry>,
    pub config: RuntimeConfig,
}

impl UiContext {
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry: Rc::new(registry),
            converters: Rc::new(ConverterRegistry::new()),
            config: RuntimeConfig::default(),
        }
    }

    #[must_use]
    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = Rc::new(converters);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }
}
