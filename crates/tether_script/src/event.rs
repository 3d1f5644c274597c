//! Dispatch events handed to host callbacks
//!
//! One event is built per interception and dropped as soon as the callback
//! returns. A callback either sets a result, sets an error, or does neither
//! (the access then completes as `undefined`). An error always wins over a
//! result, because results are only materialised after the callback has
//! returned and the error slot has been checked.

use crate::callbacks::EventKind;
use crate::error::BridgeError;
use crate::handle::{Binding, CapabilityHandle, ClassHandle, InstanceBinding, InstanceHandle, MethodHandle};
use crate::record::Record;
use crate::scope::Scope;
use crate::value::ScriptValue;
use rquickjs::Value;

/// What a method call is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// Method declared on a registered class.
    Registered { handle: MethodHandle, name: String },
    /// Member of a late-bound interface, resolved by name.
    Interface { interface: InstanceHandle, name: String },
}

impl CallTarget {
    pub fn name(&self) -> &str {
        match self {
            CallTarget::Registered { name, .. } | CallTarget::Interface { name, .. } => name,
        }
    }
}

/// The member an access is aimed at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Member {
    Field(String),
    Property { name: String, capability: CapabilityHandle },
    Index(u32),
    Named(String),
    Call(CallTarget),
}

pub(crate) struct Identity<'js> {
    pub scope: Scope<'js>,
    pub kind: EventKind,
    pub holder: Value<'js>,
    pub binding: Option<Binding>,
    pub class: Option<ClassHandle>,
    pub member: Member,
}

#[derive(Default)]
struct ErrorSlot(Option<String>);

impl ErrorSlot {
    fn set(&mut self, message: &str) {
        if message.is_empty() || self.0.is_some() {
            return;
        }
        self.0 = Some(message.to_string());
    }

    fn get(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

enum Outcome<'js> {
    Undefined,
    Int(i32),
    Bool(bool),
    Double(f64),
    Str(String),
    Interface(InstanceHandle),
    InterfaceFunction(InstanceHandle, String),
    Instance(InstanceBinding),
    Record,
    Value(Value<'js>),
}

struct Reply<'js> {
    outcome: Outcome<'js>,
    record: Option<Record<'js>>,
}

impl<'js> Reply<'js> {
    fn new() -> Self {
        Self {
            outcome: Outcome::Undefined,
            record: None,
        }
    }

    fn record(&mut self, scope: &Scope<'js>) -> Result<&mut Record<'js>, BridgeError> {
        let record = match self.record.take() {
            Some(record) => record,
            None => scope.new_record()?,
        };
        Ok(self.record.insert(record))
    }

    fn materialise(self, scope: &Scope<'js>) -> Result<Value<'js>, BridgeError> {
        let Reply { outcome, record } = self;
        let ctx = scope.ctx().clone();
        let value = match outcome {
            Outcome::Undefined => Value::new_undefined(ctx),
            Outcome::Int(value) => Value::new_int(ctx, value),
            Outcome::Bool(value) => Value::new_bool(ctx, value),
            Outcome::Double(value) => Value::new_float(ctx, value),
            Outcome::Str(text) => rquickjs::String::from_str(ctx, &text)?.into_value(),
            Outcome::Interface(instance) => scope.new_interface(instance)?.into_raw(),
            Outcome::InterfaceFunction(instance, name) => {
                let id = scope.bridge().intern(Binding::Interface(instance));
                scope.kit().interface_function(id, &name)?.into_value()
            }
            Outcome::Instance(binding) => match scope.instantiate(binding)? {
                Some(object) => object,
                None => {
                    tracing::warn!(
                        class = %binding.class(),
                        "result instance has no compiled class; returning undefined"
                    );
                    Value::new_undefined(ctx)
                }
            },
            Outcome::Record => {
                let record = match record {
                    Some(record) => record,
                    None => scope.new_record()?,
                };
                record.object().clone().into_value()
            }
            Outcome::Value(value) => value,
        };
        Ok(value)
    }
}

macro_rules! identity_accessors {
    ($event:ident) => {
        impl<'js> $event<'js> {
            pub fn kind(&self) -> EventKind {
                self.identity.kind
            }

            /// Per-turn handle for building values or calling back into script.
            pub fn scope(&self) -> &Scope<'js> {
                &self.identity.scope
            }

            /// Host instance behind the receiver; `None` when the receiver
            /// was never bound by this engine.
            pub fn host_instance(&self) -> Option<InstanceHandle> {
                self.identity.binding.map(Binding::instance)
            }

            /// Registered class the member belongs to; `None` for interfaces.
            pub fn host_class(&self) -> Option<ClassHandle> {
                self.identity.class
            }

            pub fn property_name(&self) -> Option<&str> {
                match &self.identity.member {
                    Member::Field(name) | Member::Named(name) => Some(name.as_str()),
                    Member::Property { name, .. } => Some(name.as_str()),
                    Member::Index(_) | Member::Call(_) => None,
                }
            }

            pub fn property_index(&self) -> Option<u32> {
                match self.identity.member {
                    Member::Index(index) => Some(index),
                    _ => None,
                }
            }

            /// Owning capability of a computed property.
            pub fn capability(&self) -> Option<CapabilityHandle> {
                match self.identity.member {
                    Member::Property { capability, .. } => Some(capability),
                    _ => None,
                }
            }

            /// The receiver of the access as seen by script.
            pub fn holder(&self) -> ScriptValue<'js> {
                self.identity.scope.wrap(self.identity.holder.clone())
            }

            pub fn holder_value(&self) -> &Value<'js> {
                &self.identity.holder
            }

            /// Fail the access with `message`. Empty messages are ignored and
            /// only the first message is kept.
            pub fn set_error(&mut self, message: impl AsRef<str>) {
                self.error.set(message.as_ref());
            }

            pub fn error(&self) -> Option<&str> {
                self.error.get()
            }
        }
    };
}

macro_rules! result_setters {
    ($event:ident) => {
        impl<'js> $event<'js> {
            pub fn set_result_undefined(&mut self) {
                self.reply.outcome = Outcome::Undefined;
            }

            pub fn set_result_int(&mut self, value: i32) {
                self.reply.outcome = Outcome::Int(value);
            }

            pub fn set_result_bool(&mut self, value: bool) {
                self.reply.outcome = Outcome::Bool(value);
            }

            pub fn set_result_double(&mut self, value: f64) {
                self.reply.outcome = Outcome::Double(value);
            }

            pub fn set_result_string(&mut self, value: impl Into<String>) {
                self.reply.outcome = Outcome::Str(value.into());
            }

            /// Return `instance` as a late-bound interface object.
            pub fn set_result_interface(&mut self, instance: InstanceHandle) {
                self.reply.outcome = Outcome::Interface(instance);
            }

            /// Return `instance` through `class`'s compiled template.
            pub fn set_result_instance(&mut self, instance: InstanceHandle, class: ClassHandle) {
                self.reply.outcome = Outcome::Instance(InstanceBinding::new(instance, class));
            }

            /// Pass an existing script value straight through.
            pub fn set_result_value(&mut self, value: &ScriptValue<'js>) {
                self.reply.outcome = Outcome::Value(value.raw().clone());
            }

            /// Record that becomes the result after
            /// [`set_result_as_record`](Self::set_result_as_record).
            pub fn result_record(&mut self) -> Result<&mut Record<'js>, BridgeError> {
                self.reply.record(&self.identity.scope)
            }

            pub fn set_result_as_record(&mut self) {
                self.reply.outcome = Outcome::Record;
            }
        }
    };
}

/// Read access: properties, fields, indexes and interface members.
pub struct GetterEvent<'js> {
    identity: Identity<'js>,
    reply: Reply<'js>,
    error: ErrorSlot,
}

identity_accessors!(GetterEvent);
result_setters!(GetterEvent);

impl<'js> GetterEvent<'js> {
    pub(crate) fn new(identity: Identity<'js>) -> Self {
        Self {
            identity,
            reply: Reply::new(),
            error: ErrorSlot::default(),
        }
    }

    /// Return a callable that routes to the interface method event for
    /// `name` on `instance`.
    pub fn set_result_interface_function(&mut self, instance: InstanceHandle, name: impl Into<String>) {
        self.reply.outcome = Outcome::InterfaceFunction(instance, name.into());
    }

    pub(crate) fn finish(self) -> Result<Value<'js>, Completion> {
        if let Some(message) = self.error.get() {
            return Err(Completion::Raise(message.to_string()));
        }
        let scope = self.identity.scope;
        self.reply.materialise(&scope).map_err(Completion::Failed)
    }
}

/// Write access: the incoming value is at index 0.
pub struct SetterEvent<'js> {
    identity: Identity<'js>,
    value: ScriptValue<'js>,
    error: ErrorSlot,
}

identity_accessors!(SetterEvent);

impl<'js> SetterEvent<'js> {
    pub(crate) fn new(identity: Identity<'js>, value: Value<'js>) -> Self {
        let value = ScriptValue::new(identity.scope.clone(), value, Some(0));
        Self {
            identity,
            value,
            error: ErrorSlot::default(),
        }
    }

    pub fn value(&mut self) -> &mut ScriptValue<'js> {
        &mut self.value
    }

    pub fn value_as_int(&self) -> i32 {
        self.value.as_integer()
    }

    pub fn value_as_double(&self) -> f64 {
        self.value.as_number()
    }

    pub fn value_as_bool(&self) -> bool {
        self.value.as_boolean()
    }

    pub fn value_as_string(&self) -> String {
        self.value.as_string()
    }

    /// Host instance carried by the incoming value, if any.
    pub fn value_as_instance(&self) -> Result<Option<InstanceHandle>, BridgeError> {
        let binding = self.identity.scope.binding_of(self.value.raw())?;
        Ok(binding.map(Binding::instance))
    }

    pub(crate) fn finish(self) -> Result<(), Completion> {
        match self.error.get() {
            Some(message) => Err(Completion::Raise(message.to_string())),
            None => Ok(()),
        }
    }
}

/// Call of a registered method or of an interface function.
pub struct MethodEvent<'js> {
    identity: Identity<'js>,
    args: Vec<ScriptValue<'js>>,
    reply: Reply<'js>,
    error: ErrorSlot,
}

identity_accessors!(MethodEvent);
result_setters!(MethodEvent);

impl<'js> MethodEvent<'js> {
    pub(crate) fn new(identity: Identity<'js>, args: Vec<Value<'js>>) -> Self {
        let args = args
            .into_iter()
            .enumerate()
            .map(|(index, value)| ScriptValue::new(identity.scope.clone(), value, Some(index)))
            .collect();
        Self {
            identity,
            args,
            reply: Reply::new(),
            error: ErrorSlot::default(),
        }
    }

    pub fn target(&self) -> Option<&CallTarget> {
        match &self.identity.member {
            Member::Call(target) => Some(target),
            _ => None,
        }
    }

    pub fn method_name(&self) -> &str {
        self.target().map(CallTarget::name).unwrap_or_default()
    }

    /// Invocation handle of a registered method.
    pub fn method_handle(&self) -> Option<MethodHandle> {
        match self.target() {
            Some(CallTarget::Registered { handle, .. }) => Some(*handle),
            _ => None,
        }
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[ScriptValue<'js>] {
        &self.args
    }

    /// Argument at `index`; `None` past the end.
    pub fn arg(&mut self, index: usize) -> Option<&mut ScriptValue<'js>> {
        self.args.get_mut(index)
    }

    pub(crate) fn finish(self) -> Result<Value<'js>, Completion> {
        if let Some(message) = self.error.get() {
            return Err(Completion::Raise(message.to_string()));
        }
        let scope = self.identity.scope;
        self.reply.materialise(&scope).map_err(Completion::Failed)
    }
}

/// Why an event did not complete normally.
#[derive(Debug)]
pub(crate) enum Completion {
    /// The callback set an error message.
    Raise(String),
    /// Building the result failed.
    Failed(BridgeError),
}
