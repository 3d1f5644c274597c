//! Structured data moved across the boundary as a plain object

use crate::coerce;
use crate::error::BridgeError;
use crate::handle::InstanceHandle;
use crate::scope::Scope;
use crate::value::ScriptValue;
use rquickjs::{IntoJs, Object, Value};

/// Dynamically typed property bag backed by a script object.
///
/// Writes use define semantics, so they succeed on objects that would
/// reject plain assignment. Reads look at data properties only and never
/// run accessors, proxies or host dispatch.
pub struct Record<'js> {
    scope: Scope<'js>,
    object: Object<'js>,
}

impl<'js> Record<'js> {
    pub(crate) fn new(scope: Scope<'js>) -> Result<Self, BridgeError> {
        let object = Object::new(scope.ctx().clone())?;
        Ok(Self::from_object(scope, object))
    }

    pub(crate) fn from_object(scope: Scope<'js>, object: Object<'js>) -> Self {
        Self { scope, object }
    }

    pub fn object(&self) -> &Object<'js> {
        &self.object
    }

    pub fn to_value(&self) -> ScriptValue<'js> {
        self.scope.wrap(self.object.clone().into_value())
    }

    pub fn set_int_field(&mut self, name: &str, value: i32) -> Result<(), BridgeError> {
        self.define(name, value)
    }

    pub fn set_double_field(&mut self, name: &str, value: f64) -> Result<(), BridgeError> {
        self.define(name, value)
    }

    pub fn set_bool_field(&mut self, name: &str, value: bool) -> Result<(), BridgeError> {
        self.define(name, value)
    }

    pub fn set_string_field(&mut self, name: &str, value: &str) -> Result<(), BridgeError> {
        self.define(name, value)
    }

    /// Store `instance` as an inert external handle.
    pub fn set_object_field(&mut self, name: &str, instance: InstanceHandle) -> Result<(), BridgeError> {
        let external = self.scope.external(instance)?;
        self.define(name, external)
    }

    pub fn set_value_field(&mut self, name: &str, value: &ScriptValue<'js>) -> Result<(), BridgeError> {
        self.define(name, value.raw().clone())
    }

    pub fn get_int_field(&self, name: &str) -> Result<i32, BridgeError> {
        let value = self.read(name)?;
        Ok(coerce::to_int32(self.scope.ctx(), &value))
    }

    pub fn get_double_field(&self, name: &str) -> Result<f64, BridgeError> {
        let value = self.read(name)?;
        Ok(coerce::to_number(self.scope.ctx(), &value))
    }

    pub fn get_bool_field(&self, name: &str) -> Result<bool, BridgeError> {
        let value = self.read(name)?;
        Ok(coerce::to_boolean(self.scope.ctx(), &value))
    }

    pub fn get_string_field(&self, name: &str) -> Result<String, BridgeError> {
        let value = self.read(name)?;
        Ok(coerce::to_string(self.scope.ctx(), &value))
    }

    /// Host instance stored in `name`; `None` when the field holds something
    /// the bridge never bound.
    pub fn get_object_field(&self, name: &str) -> Result<Option<InstanceHandle>, BridgeError> {
        let value = self.read(name)?;
        let binding = self.scope.binding_of(&value)?;
        Ok(binding.map(|binding| binding.instance()))
    }

    pub fn get_value_field(&self, name: &str) -> Result<ScriptValue<'js>, BridgeError> {
        let value = self.read(name)?;
        Ok(self.scope.wrap(value))
    }

    pub fn has_field(&self, name: &str) -> Result<bool, BridgeError> {
        Ok(self.scope.kit().read_field(&self.object, name)?.is_some())
    }

    /// Enumerable own field names, in the object's key order.
    pub fn field_names(&self) -> Result<Vec<String>, BridgeError> {
        Ok(self.scope.kit().field_names(&self.object)?)
    }

    fn define<V>(&mut self, name: &str, value: V) -> Result<(), BridgeError>
    where
        V: IntoJs<'js>,
    {
        if self.scope.kit().define_data(&self.object, name, value)? {
            Ok(())
        } else {
            Err(BridgeError::FieldRejected {
                name: name.to_string(),
            })
        }
    }

    fn read(&self, name: &str) -> Result<Value<'js>, BridgeError> {
        self.scope
            .kit()
            .read_field(&self.object, name)?
            .ok_or_else(|| BridgeError::MissingField {
                name: name.to_string(),
            })
    }
}
