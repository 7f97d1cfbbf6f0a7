// src/transform/registry.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::transform::Transform;
use crate::transform::command::CommandTransform;
use crate::transform::concat::ConcatTransform;
use crate::transform::css::CssMinifyTransform;
use crate::transform::image::ImageOptimizeTransform;
use crate::transform::sass::SassTransform;

/// Symbolic adapter name -> implementation.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn Transform>>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in adapters:
    ///
    /// - `typescript`, `js-minify`, `command` (external tools)
    /// - `sass`, `css-minify`, `concat`, `image-optimize` (in-process)
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CommandTransform::typescript()));
        registry.register(Arc::new(CommandTransform::js_minify()));
        registry.register(Arc::new(CommandTransform::generic()));
        registry.register(Arc::new(SassTransform));
        registry.register(Arc::new(CssMinifyTransform));
        registry.register(Arc::new(ConcatTransform));
        registry.register(Arc::new(ImageOptimizeTransform));
        registry
    }

    /// Register an adapter under its own name, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn Transform>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.adapters.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.adapters.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_builtin_adapters() {
        let registry = AdapterRegistry::with_defaults();
        for name in [
            "typescript",
            "js-minify",
            "command",
            "sass",
            "css-minify",
            "concat",
            "image-optimize",
        ] {
            assert!(registry.contains(name), "missing adapter {name}");
        }
        assert!(!registry.contains("less"));
    }
}
