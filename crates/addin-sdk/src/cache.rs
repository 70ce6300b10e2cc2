//! Descriptor cache for hosts
//!
//! Native reflection is a round trip per query, and a method descriptor costs
//! one query per parameter. Hosts that resolve the same members repeatedly
//! can keep descriptors here, keyed by ordinal, with name lookups memoized.

use rustc_hash::FxHashMap;

use crate::context::RuntimeObject;
use crate::error::BridgeResult;
use crate::types::{MethodInfo, PropertyInfo};

/// Cached descriptors for one object
#[derive(Debug, Default)]
pub struct DescriptorCache {
    /// Method name to ordinal mapping
    method_indices: FxHashMap<String, usize>,
    /// Method descriptors by ordinal
    methods: FxHashMap<usize, MethodInfo>,
    /// Property name to ordinal mapping
    property_indices: FxHashMap<String, usize>,
    /// Property descriptors by ordinal
    properties: FxHashMap<usize, PropertyInfo>,
}

impl DescriptorCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a method name, asking the object only on first use
    pub fn find_method(&mut self, object: &dyn RuntimeObject, name: &str) -> BridgeResult<usize> {
        if let Some(&ordinal) = self.method_indices.get(name) {
            return Ok(ordinal);
        }
        let ordinal = object.find_method(name)?;
        self.method_indices.insert(name.to_string(), ordinal);
        Ok(ordinal)
    }

    /// Resolve a property name, asking the object only on first use
    pub fn find_property(&mut self, object: &dyn RuntimeObject, name: &str) -> BridgeResult<usize> {
        if let Some(&ordinal) = self.property_indices.get(name) {
            return Ok(ordinal);
        }
        let ordinal = object.find_property(name)?;
        self.property_indices.insert(name.to_string(), ordinal);
        Ok(ordinal)
    }

    /// Get a method descriptor, building it on first use
    pub fn method(&mut self, object: &dyn RuntimeObject, ordinal: usize) -> BridgeResult<&MethodInfo> {
        if !self.methods.contains_key(&ordinal) {
            let info = object.method_info(ordinal)?;
            self.methods.insert(ordinal, info);
        }
        Ok(&self.methods[&ordinal])
    }

    /// Get a property descriptor, building it on first use
    pub fn property(
        &mut self,
        object: &dyn RuntimeObject,
        ordinal: usize,
    ) -> BridgeResult<&PropertyInfo> {
        if !self.properties.contains_key(&ordinal) {
            let info = object.property_info(ordinal)?;
            self.properties.insert(ordinal, info);
        }
        Ok(&self.properties[&ordinal])
    }

    /// Number of cached method descriptors
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Number of cached property descriptors
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Drop every cached entry
    pub fn clear(&mut self) {
        self.method_indices.clear();
        self.methods.clear();
        self.property_indices.clear();
        self.properties.clear();
    }
}
