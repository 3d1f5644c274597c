//! Per-turn engine handle

use crate::array::ValueArray;
use crate::bridge::Bridge;
use crate::coerce;
use crate::descriptor::TemplateId;
use crate::error::BridgeError;
use crate::handle::{Binding, ClassHandle, InstanceBinding, InstanceHandle};
use crate::kit::Kit;
use crate::record::Record;
use crate::value::ScriptValue;
use rquickjs::function::Args;
use rquickjs::{Ctx, Function, Value};
use std::rc::Rc;

/// Everything needed to build or inspect script values during one turn.
///
/// A scope is only valid inside [`Engine::with`](crate::Engine::with) or a
/// dispatch callback. Classes become visible to a scope once the engine has
/// compiled its templates.
#[derive(Clone)]
pub struct Scope<'js> {
    ctx: Ctx<'js>,
    kit: Kit<'js>,
    bridge: Rc<Bridge>,
}

impl<'js> Scope<'js> {
    pub(crate) fn new(ctx: Ctx<'js>, kit: Kit<'js>, bridge: Rc<Bridge>) -> Self {
        Self { ctx, kit, bridge }
    }

    pub fn ctx(&self) -> &Ctx<'js> {
        &self.ctx
    }

    pub(crate) fn kit(&self) -> &Kit<'js> {
        &self.kit
    }

    pub(crate) fn bridge(&self) -> &Rc<Bridge> {
        &self.bridge
    }

    pub(crate) fn wrap(&self, value: Value<'js>) -> ScriptValue<'js> {
        ScriptValue::new(self.clone(), value, None)
    }

    pub fn undefined(&self) -> ScriptValue<'js> {
        self.wrap(Value::new_undefined(self.ctx.clone()))
    }

    pub fn new_integer(&self, value: i32) -> ScriptValue<'js> {
        self.wrap(Value::new_int(self.ctx.clone(), value))
    }

    pub fn new_number(&self, value: f64) -> ScriptValue<'js> {
        self.wrap(Value::new_float(self.ctx.clone(), value))
    }

    pub fn new_bool(&self, value: bool) -> ScriptValue<'js> {
        self.wrap(Value::new_bool(self.ctx.clone(), value))
    }

    pub fn new_string(&self, value: &str) -> Result<ScriptValue<'js>, BridgeError> {
        let text = rquickjs::String::from_str(self.ctx.clone(), value)?;
        Ok(self.wrap(text.into_value()))
    }

    /// Script object bound to `instance` through `class`'s template.
    ///
    /// `None` when the class is unknown or its templates are not compiled.
    pub fn new_object(
        &self,
        instance: InstanceHandle,
        class: ClassHandle,
    ) -> Result<Option<ScriptValue<'js>>, BridgeError> {
        let value = self.instantiate(InstanceBinding::new(instance, class))?;
        Ok(value.map(|value| self.wrap(value)))
    }

    /// Late-bound interface object for `instance`.
    pub fn new_interface(&self, instance: InstanceHandle) -> Result<ScriptValue<'js>, BridgeError> {
        let id = self.bridge.intern(Binding::Interface(instance));
        let object = self.kit.interface_object(id)?;
        Ok(self.wrap(object.into_value()))
    }

    pub fn new_array(&self, count: usize) -> Result<ValueArray<'js>, BridgeError> {
        ValueArray::allocate(self.clone(), count)
    }

    pub fn new_record(&self) -> Result<Record<'js>, BridgeError> {
        Record::new(self.clone())
    }

    /// Opaque handle to `record`; `as_record` on it yields the same record.
    pub fn record_handle(&self, record: &Record<'js>) -> Result<ScriptValue<'js>, BridgeError> {
        let handle = self.kit.wrap_record(record.object())?;
        Ok(self.wrap(handle.into_value()))
    }

    /// Call the global function `name` with `args`.
    ///
    /// A missing or non-callable global yields `Ok(None)`; an exception
    /// raised while looking the global up or by the call itself is cleared
    /// and returned as a script error.
    pub fn call_named_function(
        &self,
        name: &str,
        args: &ValueArray<'js>,
    ) -> Result<Option<ScriptValue<'js>>, BridgeError> {
        let globals = self.ctx.globals();
        let callee: Value<'js> = globals
            .get(name)
            .map_err(|err| coerce::script_error(&self.ctx, err))?;
        let Some(function) = callee.as_function().cloned() else {
            tracing::debug!(name, "named function is not callable");
            return Ok(None);
        };

        let values = args.raw_values()?;
        let result = self.call_function(&function, globals.into_value(), values)?;
        Ok(Some(result))
    }

    pub(crate) fn call_function(
        &self,
        function: &Function<'js>,
        this: Value<'js>,
        values: Vec<Value<'js>>,
    ) -> Result<ScriptValue<'js>, BridgeError> {
        let mut call = Args::new(self.ctx.clone(), values.len());
        call.this(this)?;
        for value in values {
            call.push_arg(value)?;
        }
        function
            .call_arg::<Value<'js>>(call)
            .map(|value| self.wrap(value))
            .map_err(|err| coerce::script_error(&self.ctx, err))
    }

    /// Whether `class` is registered and compiled.
    pub fn is_class_registered(&self, class: ClassHandle) -> bool {
        self.bridge.template_of(class).is_some()
    }

    /// Forward `message` to the engine's error reporter.
    pub fn log_error(&self, message: &str) {
        self.bridge.report(message);
    }

    /// Binding attached to `value`, if the kit ever bound it.
    pub(crate) fn binding_of(&self, value: &Value<'js>) -> Result<Option<Binding>, BridgeError> {
        let id = self.kit.lookup(value)?;
        Ok(id.and_then(|id| self.bridge.binding(id)))
    }

    pub(crate) fn instantiate(&self, binding: InstanceBinding) -> Result<Option<Value<'js>>, BridgeError> {
        let template = match self.bridge.template_of(binding.class()) {
            Some(TemplateId::Class(index)) => index as i32,
            Some(TemplateId::Global) | None => return Ok(None),
        };
        let id = self.bridge.intern(Binding::Instance(binding));
        let object = self.kit.instantiate(template, id)?;
        Ok(Some(object.into_value()))
    }

    pub(crate) fn external(&self, instance: InstanceHandle) -> Result<Value<'js>, BridgeError> {
        let id = self.bridge.intern(Binding::External(instance));
        Ok(self.kit.external(id)?.into_value())
    }

    /// Raise `message` as a script exception; returns the error to propagate.
    pub(crate) fn throw_message(&self, message: &str) -> rquickjs::Error {
        match rquickjs::String::from_str(self.ctx.clone(), message) {
            Ok(text) => self.ctx.throw(text.into_value()),
            Err(err) => err,
        }
    }
}
