use crate::error::BridgeError;
use crate::scope::Scope;
use crate::value::ScriptValue;
use rquickjs::{Array, Value};

/// Fixed-length sequence of script values.
///
/// Wrapping an existing array materialises each element the first time it
/// is read; an allocated array starts out filled with `undefined`.
pub struct ValueArray<'js> {
    scope: Scope<'js>,
    array: Array<'js>,
    slots: Vec<Option<ScriptValue<'js>>>,
}

impl<'js> ValueArray<'js> {
    pub(crate) fn wrap(scope: Scope<'js>, array: Array<'js>) -> Result<Self, BridgeError> {
        let len = array.len();
        Ok(Self {
            scope,
            array,
            slots: std::iter::repeat_with(|| None).take(len).collect(),
        })
    }

    pub(crate) fn allocate(scope: Scope<'js>, count: usize) -> Result<Self, BridgeError> {
        let array = Array::new(scope.ctx().clone())?;
        for index in 0..count {
            array.set(index, Value::new_undefined(scope.ctx().clone()))?;
        }
        Self::wrap(scope, array)
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn get_value(&mut self, index: usize) -> Result<&mut ScriptValue<'js>, BridgeError> {
        self.check(index)?;
        let value = match self.slots[index].take() {
            Some(value) => value,
            None => {
                let raw: Value<'js> = self.array.get(index)?;
                ScriptValue::new(self.scope.clone(), raw, Some(index))
            }
        };
        Ok(self.slots[index].insert(value))
    }

    pub fn set_value(&mut self, value: &ScriptValue<'js>, index: usize) -> Result<(), BridgeError> {
        self.check(index)?;
        self.array.set(index, value.raw().clone())?;
        self.slots[index] = Some(value.clone().with_index(Some(index)));
        Ok(())
    }

    /// The backing array as a free-standing value.
    pub fn to_value(&self) -> ScriptValue<'js> {
        self.scope.wrap(self.array.clone().into_value())
    }

    pub(crate) fn raw_values(&self) -> Result<Vec<Value<'js>>, BridgeError> {
        (0..self.count())
            .map(|index| match &self.slots[index] {
                Some(value) => Ok(value.raw().clone()),
                None => Ok(self.array.get(index)?),
            })
            .collect()
    }

    fn check(&self, index: usize) -> Result<(), BridgeError> {
        if index >= self.slots.len() {
            return Err(BridgeError::IndexOutOfRange {
                index,
                len: self.slots.len(),
            });
        }
        Ok(())
    }
}
