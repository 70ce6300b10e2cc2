//! Reflection bridge
//!
//! Name to ordinal resolution and descriptor construction over a live native
//! object.
//!
//! Building a descriptor only asks questions: it never calls the member it
//! describes and never changes component state.

use addin_sdk::{BridgeError, BridgeResult, MethodInfo, ParameterInfo, PropertyInfo, TypeRef};

use crate::callback::{receive_string, receive_value, Received};
use crate::proxy::{native_ordinal, BoundObject};

/// Name slot of the primary (English) name
const NAME_SLOT: i32 = 0;
/// Name slot of the localized alias
const ALIAS_SLOT: i32 = 1;

impl BoundObject<'_> {
    // ========================================================================
    // Properties
    // ========================================================================

    pub(crate) fn property_count(&self) -> usize {
        let count = unsafe { self.proxy.get_n_props(self.object) };
        usize::try_from(count).unwrap_or(0)
    }

    pub(crate) fn find_property(&self, name: &str) -> BridgeResult<usize> {
        let ordinal = unsafe { self.proxy.find_prop(self.object, name) };
        usize::try_from(ordinal).map_err(|_| BridgeError::PropertyNotFound(name.to_string()))
    }

    pub(crate) fn property_name(&self, ordinal: usize) -> BridgeResult<String> {
        let native = native_ordinal(ordinal)?;
        let name = receive_string(|rx| unsafe {
            self.proxy.get_prop_name(self.object, native, NAME_SLOT, rx)
        });
        Ok(name.unwrap_or_default())
    }

    pub(crate) fn is_property_readable(&self, ordinal: usize) -> BridgeResult<bool> {
        let native = native_ordinal(ordinal)?;
        Ok(unsafe { self.proxy.is_prop_readable(self.object, native) })
    }

    pub(crate) fn is_property_writable(&self, ordinal: usize) -> BridgeResult<bool> {
        let native = native_ordinal(ordinal)?;
        Ok(unsafe { self.proxy.is_prop_writable(self.object, native) })
    }

    pub(crate) fn property_info(&self, ordinal: usize) -> BridgeResult<PropertyInfo> {
        Ok(PropertyInfo::new(
            self.property_name(ordinal)?,
            ordinal,
            self.is_property_readable(ordinal)?,
            self.is_property_writable(ordinal)?,
        ))
    }

    // ========================================================================
    // Methods
    // ========================================================================

    pub(crate) fn method_count(&self) -> usize {
        let count = unsafe { self.proxy.get_n_methods(self.object) };
        usize::try_from(count).unwrap_or(0)
    }

    pub(crate) fn find_method(&self, name: &str) -> BridgeResult<usize> {
        let ordinal = unsafe { self.proxy.find_method(self.object, name) };
        usize::try_from(ordinal).map_err(|_| BridgeError::MethodNotFound(name.to_string()))
    }

    pub(crate) fn method_name(&self, ordinal: usize, slot: i32) -> BridgeResult<String> {
        let native = native_ordinal(ordinal)?;
        let name = receive_string(|rx| unsafe {
            self.proxy.get_method_name(self.object, native, slot, rx)
        });
        Ok(name.unwrap_or_default())
    }

    pub(crate) fn param_count(&self, ordinal: usize) -> BridgeResult<usize> {
        let native = native_ordinal(ordinal)?;
        let count = unsafe { self.proxy.get_n_params(self.object, native) };
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub(crate) fn has_return_value(&self, ordinal: usize) -> BridgeResult<bool> {
        let native = native_ordinal(ordinal)?;
        Ok(unsafe { self.proxy.has_ret_val(self.object, native) })
    }

    /// Ask for the default value of one parameter
    pub(crate) fn param_default(&self, ordinal: usize, param: usize) -> BridgeResult<Option<Received>> {
        let native = native_ordinal(ordinal)?;
        let param = native_ordinal(param)?;
        Ok(receive_value(|rx| unsafe {
            self.proxy.get_param_def_value(self.object, native, param, rx)
        }))
    }

    pub(crate) fn method_info(&self, ordinal: usize) -> BridgeResult<MethodInfo> {
        let name = self.method_name(ordinal, NAME_SLOT)?;
        let alias = self.method_name(ordinal, ALIAS_SLOT)?;

        let count = self.param_count(ordinal)?;
        let mut parameters = Vec::with_capacity(count);
        for position in 0..count {
            // Only presence matters; the probed value is dropped here.
            let has_default = self
                .param_default(ordinal, position)?
                .is_some_and(|received| !received.empty);
            let mut parameter = ParameterInfo::new(position);
            if has_default {
                parameter = parameter.with_default();
            }
            parameters.push(parameter);
        }

        let mut info = MethodInfo::new(name, ordinal)
            .with_alias(alias)
            .with_parameters(parameters);
        if self.has_return_value(ordinal)? {
            info = info.with_return(TypeRef::Any);
        }
        Ok(info)
    }
}
