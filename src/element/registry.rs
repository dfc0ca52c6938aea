//! Type tag → constructor table.

use std::collections::HashMap;

use super::{ElementType, LegacyAdapter, LegacyElement};
use crate::error::{ParchmentError, Result};
use crate::model::ElementRecord;

type Constructor = Box<dyn Fn(ElementRecord) -> Result<Box<dyn ElementType>>>;

/// Builds element instances from stored records.
///
/// Registering a constructor is the whole of adding an element type.
/// Nothing else in the engine knows the list of tags.
pub struct ElementRegistry {
    constructors: HashMap<String, Constructor>,
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl ElementRegistry {
    /// A registry with no types at all.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A registry with every element type this crate ships.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        crate::elements::register_builtin(&mut registry);
        registry
    }

    /// Register a capability-based type. Replaces any previous constructor
    /// for the same tag.
    pub fn register<F>(&mut self, tag: &str, constructor: F)
    where
        F: Fn(ElementRecord) -> Result<Box<dyn ElementType>> + 'static,
    {
        self.constructors
            .insert(tag.to_string(), Box::new(constructor));
    }

    /// Register a type written against the legacy element API.
    pub fn register_legacy<T, F>(&mut self, tag: &str, constructor: F)
    where
        T: LegacyElement + 'static,
        F: Fn(ElementRecord) -> T + 'static,
    {
        self.register(tag, move |record| {
            Ok(Box::new(LegacyAdapter::new(constructor(record))) as Box<dyn ElementType>)
        });
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Instantiate the element a record describes.
    pub fn create(&self, record: ElementRecord) -> Result<Box<dyn ElementType>> {
        match self.constructors.get(&record.element_type) {
            Some(constructor) => constructor(record),
            None => Err(ParchmentError::UnknownElementType(record.element_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare(ElementRecord);

    impl ElementType for Bare {
        fn record(&self) -> &ElementRecord {
            &self.0
        }
        fn record_mut(&mut self) -> &mut ElementRecord {
            &mut self.0
        }
    }

    #[test]
    fn test_unknown_tag_is_an_error() {
        let registry = ElementRegistry::empty();
        let result = registry.create(ElementRecord::new(1, "hologram", "H"));
        assert!(matches!(result, Err(ParchmentError::UnknownElementType(t)) if t == "hologram"));
    }

    #[test]
    fn test_registered_constructor_is_used() {
        let mut registry = ElementRegistry::empty();
        registry.register("bare", |r| Ok(Box::new(Bare(r)) as Box<dyn ElementType>));
        let element = registry.create(ElementRecord::new(1, "bare", "B")).unwrap();
        assert_eq!(element.tag(), "bare");
        assert!(element.as_renderable().is_none());
        assert!(element.as_restorable().is_none());
    }

    #[test]
    fn test_builtin_tags() {
        let registry = ElementRegistry::with_builtin();
        for tag in [
            "text", "studentname", "coursename", "categoryname", "date", "code", "grade",
            "image", "bgimage", "signature", "border", "qrcode",
        ] {
            assert!(registry.is_registered(tag), "{} missing", tag);
        }
    }
}
