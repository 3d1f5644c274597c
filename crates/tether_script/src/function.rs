use crate::error::BridgeError;
use crate::handle::{ClassHandle, InstanceBinding, InstanceHandle};
use crate::scope::Scope;
use crate::value::ScriptValue;
use rquickjs::{Function, Value};

/// A callable script value plus the arguments queued for its next call.
pub struct ScriptFunction<'js> {
    scope: Scope<'js>,
    function: Function<'js>,
    this: Option<Value<'js>>,
    args: Vec<Value<'js>>,
    result: Option<ScriptValue<'js>>,
}

impl<'js> ScriptFunction<'js> {
    pub(crate) fn new(scope: Scope<'js>, function: Function<'js>) -> Self {
        Self {
            scope,
            function,
            this: None,
            args: Vec::new(),
            result: None,
        }
    }

    /// Receiver for subsequent calls; `undefined` when never set.
    pub fn set_this(&mut self, this: &ScriptValue<'js>) {
        self.this = Some(this.raw().clone());
    }

    pub fn add_arg_int(&mut self, value: i32) {
        self.args.push(Value::new_int(self.scope.ctx().clone(), value));
    }

    pub fn add_arg_bool(&mut self, value: bool) {
        self.args.push(Value::new_bool(self.scope.ctx().clone(), value));
    }

    pub fn add_arg_number(&mut self, value: f64) {
        self.args.push(Value::new_float(self.scope.ctx().clone(), value));
    }

    pub fn add_arg_string(&mut self, value: &str) -> Result<(), BridgeError> {
        let text = rquickjs::String::from_str(self.scope.ctx().clone(), value)?;
        self.args.push(text.into_value());
        Ok(())
    }

    pub fn add_arg_value(&mut self, value: &ScriptValue<'js>) {
        self.args.push(value.raw().clone());
    }

    /// Queue a registered host instance. Returns `false`, queueing nothing,
    /// when the class is not registered or its templates are not compiled.
    pub fn add_arg_object(
        &mut self,
        instance: InstanceHandle,
        class: ClassHandle,
    ) -> Result<bool, BridgeError> {
        match self.scope.instantiate(InstanceBinding::new(instance, class))? {
            Some(object) => {
                self.args.push(object);
                Ok(true)
            }
            None => {
                tracing::debug!(%class, "dropping argument of unregistered class");
                Ok(false)
            }
        }
    }

    pub fn pending_args(&self) -> usize {
        self.args.len()
    }

    /// Invoke with the queued arguments, which are cleared either way.
    ///
    /// The returned value is independent of this wrapper; a later call
    /// replaces [`result`](Self::result) without touching it.
    pub fn call(&mut self) -> Result<ScriptValue<'js>, BridgeError> {
        let args = std::mem::take(&mut self.args);
        let this = match &self.this {
            Some(this) => this.clone(),
            None => Value::new_undefined(self.scope.ctx().clone()),
        };
        self.result = None;
        let result = self.scope.call_function(&self.function, this, args)?;
        self.result = Some(result.clone());
        Ok(result)
    }

    /// Result of the most recent successful call.
    pub fn result(&self) -> Option<&ScriptValue<'js>> {
        self.result.as_ref()
    }
}
