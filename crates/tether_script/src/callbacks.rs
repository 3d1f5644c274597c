//! One re-bindable host callback per dispatch event kind

use crate::event::{GetterEvent, MethodEvent, SetterEvent};
use std::fmt;
use std::rc::Rc;

/// Every boundary crossing the engine intercepts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Getter,
    Setter,
    FieldGetter,
    FieldSetter,
    IndexedGetter,
    IndexedSetter,
    Method,
    InterfaceGetter,
    InterfaceSetter,
    InterfaceMethod,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Getter => "getter",
            EventKind::Setter => "setter",
            EventKind::FieldGetter => "field getter",
            EventKind::FieldSetter => "field setter",
            EventKind::IndexedGetter => "indexed getter",
            EventKind::IndexedSetter => "indexed setter",
            EventKind::Method => "method",
            EventKind::InterfaceGetter => "interface getter",
            EventKind::InterfaceSetter => "interface setter",
            EventKind::InterfaceMethod => "interface method",
        };
        f.write_str(name)
    }
}

pub(crate) type GetterCallback = Rc<dyn for<'js> Fn(&mut GetterEvent<'js>)>;
pub(crate) type SetterCallback = Rc<dyn for<'js> Fn(&mut SetterEvent<'js>)>;
pub(crate) type MethodCallback = Rc<dyn for<'js> Fn(&mut MethodEvent<'js>)>;

#[derive(Default)]
pub(crate) struct Callbacks {
    getter: Option<GetterCallback>,
    field_getter: Option<GetterCallback>,
    indexed_getter: Option<GetterCallback>,
    interface_getter: Option<GetterCallback>,
    setter: Option<SetterCallback>,
    field_setter: Option<SetterCallback>,
    indexed_setter: Option<SetterCallback>,
    interface_setter: Option<SetterCallback>,
    method: Option<MethodCallback>,
    interface_method: Option<MethodCallback>,
}

impl Callbacks {
    fn getter_slot(&mut self, kind: EventKind) -> Option<&mut Option<GetterCallback>> {
        match kind {
            EventKind::Getter => Some(&mut self.getter),
            EventKind::FieldGetter => Some(&mut self.field_getter),
            EventKind::IndexedGetter => Some(&mut self.indexed_getter),
            EventKind::InterfaceGetter => Some(&mut self.interface_getter),
            _ => None,
        }
    }

    fn setter_slot(&mut self, kind: EventKind) -> Option<&mut Option<SetterCallback>> {
        match kind {
            EventKind::Setter => Some(&mut self.setter),
            EventKind::FieldSetter => Some(&mut self.field_setter),
            EventKind::IndexedSetter => Some(&mut self.indexed_setter),
            EventKind::InterfaceSetter => Some(&mut self.interface_setter),
            _ => None,
        }
    }

    fn method_slot(&mut self, kind: EventKind) -> Option<&mut Option<MethodCallback>> {
        match kind {
            EventKind::Method => Some(&mut self.method),
            EventKind::InterfaceMethod => Some(&mut self.interface_method),
            _ => None,
        }
    }

    /// Replace the getter-shaped callback for `kind`. Kinds of another
    /// shape are ignored.
    pub fn bind_getter(&mut self, kind: EventKind, callback: GetterCallback) {
        if let Some(slot) = self.getter_slot(kind) {
            *slot = Some(callback);
        }
    }

    pub fn bind_setter(&mut self, kind: EventKind, callback: SetterCallback) {
        if let Some(slot) = self.setter_slot(kind) {
            *slot = Some(callback);
        }
    }

    pub fn bind_method(&mut self, kind: EventKind, callback: MethodCallback) {
        if let Some(slot) = self.method_slot(kind) {
            *slot = Some(callback);
        }
    }

    pub fn getter(&mut self, kind: EventKind) -> Option<GetterCallback> {
        self.getter_slot(kind).and_then(|slot| slot.clone())
    }

    pub fn setter(&mut self, kind: EventKind) -> Option<SetterCallback> {
        self.setter_slot(kind).and_then(|slot| slot.clone())
    }

    pub fn method(&mut self, kind: EventKind) -> Option<MethodCallback> {
        self.method_slot(kind).and_then(|slot| slot.clone())
    }
}
