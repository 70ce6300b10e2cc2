//! Invocation engine
//!
//! One property access or method call, end to end:
//!
//! 1. Ask the native side how many parameters the method takes
//! 2. Allocate an argument block of that size
//! 3. Fetch native defaults for positions the caller left unset
//! 4. Encode the arguments in ordinal order
//! 5. Call as procedure or as function
//! 6. Decode the block back into the caller's arguments
//! 7. Release every variant and free the block
//!
//! Steps 6 and 7 run whatever the native call reported. Step 7 is carried by
//! [`VariantBlock`]'s `Drop`, so an encode failure in step 4 releases the
//! slots filled so far and the native member is never called.

use addin_sdk::{BridgeResult, Value};

use crate::callback::receive_value;
use crate::proxy::{native_ordinal, BoundObject};
use crate::variant::{Variant, VariantBlock};

impl BoundObject<'_> {
    // ========================================================================
    // Properties
    // ========================================================================

    /// Read a property. `Undefined` if the native side delivers nothing.
    pub(crate) fn get_property(&self, ordinal: usize) -> BridgeResult<Value> {
        let native = native_ordinal(ordinal)?;
        let received =
            receive_value(|rx| unsafe { self.proxy.get_prop_val(self.object, native, rx) });
        received.map_or(Ok(Value::Undefined), |received| received.value)
    }

    /// Write a property through one temporary variant
    pub(crate) fn set_property(&self, ordinal: usize, value: &Value) -> BridgeResult<()> {
        let native = native_ordinal(ordinal)?;
        let mut variant = Variant::encode(value)?;
        unsafe { self.proxy.set_prop_val(self.object, native, &mut variant) };
        Ok(())
    }

    // ========================================================================
    // Methods
    // ========================================================================

    pub(crate) fn call_as_procedure(
        &self,
        ordinal: usize,
        args: &mut [Option<Value>],
    ) -> BridgeResult<()> {
        let native = native_ordinal(ordinal)?;
        let mut block = self.prepare(ordinal, args)?;
        unsafe { self.proxy.call_as_proc(self.object, native, block.as_mut_ptr()) };
        finish(block, args)
    }

    /// Call a function. A call the native side reports as failed yields
    /// `Undefined`, whatever it delivered.
    pub(crate) fn call_as_function(
        &self,
        ordinal: usize,
        args: &mut [Option<Value>],
    ) -> BridgeResult<Value> {
        let native = native_ordinal(ordinal)?;
        let mut block = self.prepare(ordinal, args)?;
        let mut ok = false;
        let received = receive_value(|rx| {
            ok = unsafe { self.proxy.call_as_func(self.object, native, block.as_mut_ptr(), rx) };
        });
        finish(block, args)?;

        match received {
            Some(received) if ok => received.value,
            _ => Ok(Value::Undefined),
        }
    }

    /// Build the argument block, filling unset positions with native defaults
    fn prepare(&self, ordinal: usize, args: &[Option<Value>]) -> BridgeResult<VariantBlock> {
        let count = self.param_count(ordinal)?;
        let mut block = VariantBlock::new(count);

        let mut values = Vec::with_capacity(count);
        for position in 0..count {
            let value = match args.get(position) {
                Some(Some(value)) => value.clone(),
                _ => self
                    .param_default(ordinal, position)?
                    .map_or(Ok(Value::Undefined), |received| received.value)?,
            };
            values.push(value);
        }

        block.fill(&values)?;
        Ok(block)
    }
}

/// Write output parameters back, then release the block
fn finish(mut block: VariantBlock, args: &mut [Option<Value>]) -> BridgeResult<()> {
    let result = block.read_back(args);
    block.release_all();
    result
}
