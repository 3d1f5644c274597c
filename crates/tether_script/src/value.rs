//! Wrapped script values with lazily cached views

use crate::array::ValueArray;
use crate::coerce;
use crate::error::BridgeError;
use crate::function::ScriptFunction;
use crate::handle::{Binding, ClassHandle, InstanceHandle};
use crate::record::Record;
use crate::scope::Scope;
use rquickjs::{Object, Value};
use std::fmt;

/// Views materialised on first request and reused afterwards.
#[derive(Default)]
struct Views<'js> {
    object: Option<ScriptObject<'js>>,
    array: Option<ValueArray<'js>>,
    record: Option<Record<'js>>,
    function: Option<Box<ScriptFunction<'js>>>,
}

/// One script value plus its position in an argument list or array.
///
/// Scalar type tests also accept `undefined`, so an omitted optional
/// argument coerces to the default of whatever type the host asks for.
pub struct ScriptValue<'js> {
    scope: Scope<'js>,
    value: Value<'js>,
    index: Option<usize>,
    views: Views<'js>,
}

impl<'js> ScriptValue<'js> {
    pub(crate) fn new(scope: Scope<'js>, value: Value<'js>, index: Option<usize>) -> Self {
        Self {
            scope,
            value,
            index,
            views: Views::default(),
        }
    }

    pub(crate) fn with_index(mut self, index: Option<usize>) -> Self {
        self.index = index;
        self
    }

    /// Position in the argument list or array that produced this value;
    /// `None` for a free-standing value.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn raw(&self) -> &Value<'js> {
        &self.value
    }

    pub fn into_raw(self) -> Value<'js> {
        self.value
    }

    pub fn scope(&self) -> &Scope<'js> {
        &self.scope
    }

    pub fn is_undefined(&self) -> bool {
        self.value.is_undefined()
    }

    pub fn is_number(&self) -> bool {
        self.value.is_int() || self.value.is_float() || self.is_undefined()
    }

    /// Any number that is exactly representable as an `i32`, however the
    /// engine happens to store it. Negative zero is not an integer here.
    pub fn is_integer(&self) -> bool {
        if self.value.is_int() || self.is_undefined() {
            return true;
        }
        self.value.as_float().is_some_and(|n| {
            n.fract() == 0.0
                && n >= f64::from(i32::MIN)
                && n <= f64::from(i32::MAX)
                && !(n == 0.0 && n.is_sign_negative())
        })
    }

    pub fn is_boolean(&self) -> bool {
        self.value.is_bool() || self.is_undefined()
    }

    pub fn is_string(&self) -> bool {
        self.value.is_string() || self.is_undefined()
    }

    pub fn is_object(&self) -> bool {
        self.value.is_object()
    }

    pub fn is_array(&self) -> bool {
        self.value.is_array()
    }

    pub fn is_function(&self) -> bool {
        self.value.is_function()
    }

    pub fn as_number(&self) -> f64 {
        coerce::to_number(self.scope.ctx(), &self.value)
    }

    pub fn as_integer(&self) -> i32 {
        coerce::to_int32(self.scope.ctx(), &self.value)
    }

    pub fn as_boolean(&self) -> bool {
        coerce::to_boolean(self.scope.ctx(), &self.value)
    }

    pub fn as_string(&self) -> String {
        coerce::to_string(self.scope.ctx(), &self.value)
    }

    pub fn as_object(&mut self) -> Result<&mut ScriptObject<'js>, BridgeError> {
        let object = match self.views.object.take() {
            Some(object) => object,
            None => {
                let raw = self.expect_object("object")?;
                ScriptObject::new(self.scope.clone(), raw)?
            }
        };
        Ok(self.views.object.insert(object))
    }

    pub fn as_array(&mut self) -> Result<&mut ValueArray<'js>, BridgeError> {
        let array = match self.views.array.take() {
            Some(array) => array,
            None => match self.value.as_array() {
                Some(array) => ValueArray::wrap(self.scope.clone(), array.clone())?,
                None => return Err(self.mismatch("array")),
            },
        };
        Ok(self.views.array.insert(array))
    }

    /// Record view. An opaque record handle unwraps to the record it
    /// stands for; any other object is read as a record directly.
    pub fn as_record(&mut self) -> Result<&mut Record<'js>, BridgeError> {
        let record = match self.views.record.take() {
            Some(record) => record,
            None => match self.scope.kit().unwrap_record(&self.value)? {
                Some(object) => Record::from_object(self.scope.clone(), object),
                None => Record::from_object(self.scope.clone(), self.expect_object("record")?),
            },
        };
        Ok(self.views.record.insert(record))
    }

    pub fn as_function(&mut self) -> Result<&mut ScriptFunction<'js>, BridgeError> {
        let function = match self.views.function.take() {
            Some(function) => function,
            None => match self.value.as_function() {
                Some(function) => Box::new(ScriptFunction::new(self.scope.clone(), function.clone())),
                None => return Err(self.mismatch("function")),
            },
        };
        Ok(&mut **self.views.function.insert(function))
    }

    fn expect_object(&self, expected: &'static str) -> Result<Object<'js>, BridgeError> {
        self.value
            .as_object()
            .cloned()
            .ok_or_else(|| self.mismatch(expected))
    }

    fn mismatch(&self, expected: &'static str) -> BridgeError {
        BridgeError::TypeMismatch {
            expected,
            found: format!("{:?}", self.value.type_of()),
        }
    }
}

impl<'js> Clone for ScriptValue<'js> {
    /// The clone shares the value, not the cached views.
    fn clone(&self) -> Self {
        Self::new(self.scope.clone(), self.value.clone(), self.index)
    }
}

impl fmt::Debug for ScriptValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptValue")
            .field("type", &self.value.type_of())
            .field("index", &self.index)
            .finish()
    }
}

/// Object view; knows whether the object stands for a host instance.
pub struct ScriptObject<'js> {
    scope: Scope<'js>,
    object: Object<'js>,
    binding: Option<Binding>,
}

impl<'js> ScriptObject<'js> {
    pub(crate) fn new(scope: Scope<'js>, object: Object<'js>) -> Result<Self, BridgeError> {
        let binding = scope.binding_of(object.as_value())?;
        Ok(Self {
            scope,
            object,
            binding,
        })
    }

    pub fn object(&self) -> &Object<'js> {
        &self.object
    }

    pub fn binding(&self) -> Option<Binding> {
        self.binding
    }

    pub fn is_host_object(&self) -> bool {
        self.binding.is_some()
    }

    pub fn host_instance(&self) -> Option<InstanceHandle> {
        self.binding.map(Binding::instance)
    }

    /// Class of a registered-class instance; `None` for interface and
    /// external objects.
    pub fn host_class(&self) -> Option<ClassHandle> {
        self.binding.and_then(Binding::class)
    }

    /// Read `name` with ordinary property semantics. A getter that throws
    /// yields a `Script` error with the exception cleared.
    pub fn get(&self, name: &str) -> Result<ScriptValue<'js>, BridgeError> {
        self.object
            .get::<_, Value<'js>>(name)
            .map(|value| self.scope.wrap(value))
            .map_err(|err| coerce::script_error(self.scope.ctx(), err))
    }
}

#[cfg(test)]
mod tests {
    use crate::{BridgeError, Engine};
    use rquickjs::Value;

    #[test]
    fn undefined_passes_scalar_tests_and_coerces_to_defaults() {
        let engine = Engine::new().unwrap();
        engine
            .with(|scope| {
                let value = scope.undefined();
                assert!(value.is_boolean());
                assert!(!value.as_boolean());
                assert!(value.is_number());
                assert!(value.is_integer());
                assert!(value.is_string());
                assert!(!value.is_object());
                assert!(!value.is_array());
                assert!(!value.is_function());
                assert_eq!(value.as_number(), 0.0);
                assert_eq!(value.as_integer(), 0);
                assert_eq!(value.as_string(), "undefined");
                assert_eq!(value.index(), None);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn scalars_use_standard_conversions() {
        let engine = Engine::new().unwrap();
        engine
            .with(|scope| {
                let text = scope.new_string("42")?;
                assert!(text.is_string());
                assert!(!text.is_number());
                assert_eq!(text.as_integer(), 42);

                let number = scope.new_number(3.9);
                assert!(number.is_number());
                assert!(!number.is_integer());
                assert_eq!(number.as_integer(), 3);

                assert!(!scope.new_string("")?.as_boolean());
                assert!(scope.new_bool(true).as_boolean());
                assert_eq!(scope.new_integer(-7).as_string(), "-7");
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn whole_floats_count_as_integers() {
        let engine = Engine::new().unwrap();
        engine
            .with(|scope| {
                let whole = scope.wrap(scope.ctx().eval::<Value, _>("1.5 + 1.5")?);
                assert!(whole.is_integer());
                assert_eq!(whole.as_integer(), 3);

                let fraction = scope.wrap(scope.ctx().eval::<Value, _>("1.5")?);
                assert!(!fraction.is_integer());
                assert!(scope.new_number(-2.0).is_integer());
                assert!(!scope.new_number(-0.0).is_integer());
                assert!(!scope.new_number(4294967296.0).is_integer());
                assert!(!scope.new_number(f64::NAN).is_integer());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn array_view_is_cached_after_first_use() {
        let mut engine = Engine::new().unwrap();
        assert_eq!(engine.run_string("var items = [1, 2];"), crate::STATUS_OK);
        engine
            .with(|scope| {
                let raw: Value = scope.ctx().globals().get("items")?;
                let mut value = scope.wrap(raw);
                assert_eq!(value.as_array()?.get_value(0)?.as_integer(), 1);

                let _: Value = scope.ctx().eval("items[0] = 99;")?;
                assert_eq!(value.as_array()?.get_value(0)?.as_integer(), 1);
                assert_eq!(value.clone().as_array()?.get_value(0)?.as_integer(), 99);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn wrong_shapes_are_type_mismatches() {
        let engine = Engine::new().unwrap();
        engine
            .with(|scope| {
                let mut number = scope.new_integer(1);
                assert!(matches!(
                    number.as_function(),
                    Err(BridgeError::TypeMismatch { expected: "function", .. })
                ));
                assert!(matches!(
                    number.as_array(),
                    Err(BridgeError::TypeMismatch { expected: "array", .. })
                ));
                assert!(matches!(
                    number.as_record(),
                    Err(BridgeError::TypeMismatch { expected: "record", .. })
                ));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn plain_objects_are_not_host_objects() {
        let engine = Engine::new().unwrap();
        engine
            .with(|scope| {
                let raw: Value = scope.ctx().eval("({ a: 1 })")?;
                let mut value = scope.wrap(raw);
                let object = value.as_object()?;
                assert!(!object.is_host_object());
                assert_eq!(object.host_instance(), None);
                assert_eq!(object.get("a")?.as_integer(), 1);
                Ok(())
            })
            .unwrap();
    }
}
