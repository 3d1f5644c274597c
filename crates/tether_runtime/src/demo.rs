//! Demonstration host
//!
//! A global namespace that hands out `CallBack` objects. Each `CallBack`
//! keeps an integer `Value` (notifying a script-assigned `OnValueChange`
//! listener when it changes), a small indexed store, and a `Peer`
//! interface view onto the same state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tether_script::{
    BridgeError, CallTarget, CapabilityHandle, ClassHandle, Engine, GetterEvent, InstanceHandle,
    MethodEvent, MethodHandle, SetterEvent,
};

pub const HOST_CLASS: ClassHandle = ClassHandle(0x100);
pub const CALLBACK_CLASS: ClassHandle = ClassHandle(0x101);
const HOST_INSTANCE: InstanceHandle = InstanceHandle(1);

const NEW_CALLBACK: MethodHandle = MethodHandle(1);
const HOST_LOG: MethodHandle = MethodHandle(2);
const DESCRIBE: MethodHandle = MethodHandle(3);

const HOST_VERSION: CapabilityHandle = CapabilityHandle(1);
const VALUE: CapabilityHandle = CapabilityHandle(2);
const CAPACITY: CapabilityHandle = CapabilityHandle(3);
const PEER: CapabilityHandle = CapabilityHandle(4);

/// Cells in every `CallBack` indexed store.
const CELLS: usize = 8;

const LOG_LEVELS: [(&str, i32); 4] = [("LogDebug", 0), ("LogInfo", 1), ("LogWarn", 2), ("LogError", 3)];

#[derive(Debug, Clone, PartialEq)]
pub struct CallBack {
    pub value: i32,
    pub cells: Vec<i32>,
}

impl Default for CallBack {
    fn default() -> Self {
        Self {
            value: 0,
            cells: vec![0; CELLS],
        }
    }
}

#[derive(Default)]
struct DemoState {
    // Instance handles start above the global's.
    next_id: u64,
    callbacks: HashMap<InstanceHandle, CallBack>,
}

impl DemoState {
    fn create(&mut self) -> InstanceHandle {
        self.next_id += 1;
        let instance = InstanceHandle(HOST_INSTANCE.0 + self.next_id);
        self.callbacks.insert(instance, CallBack::default());
        instance
    }
}

/// Shared state behind every callback the demonstration host binds.
#[derive(Clone, Default)]
pub struct DemoHost {
    state: Rc<RefCell<DemoState>>,
}

impl DemoHost {
    /// Register the demonstration classes on `engine` and bind its callbacks.
    pub fn install(engine: &mut Engine) -> Result<Self, BridgeError> {
        let host = Self::default();

        let global = engine
            .register_global(HOST_CLASS, HOST_INSTANCE)?
            .add_method("NewCallBackClass", NEW_CALLBACK)?
            .add_method("HostLog", HOST_LOG)?
            .add_property("HostVersion", HOST_VERSION, true, false)?;
        for (name, level) in LOG_LEVELS {
            global.add_enum_constant(name, level)?;
        }

        engine
            .register_class(CALLBACK_CLASS)?
            .set_indexed_access(true)?
            .add_property("Value", VALUE, true, true)?
            .add_property("Capacity", CAPACITY, true, false)?
            .add_property("Peer", PEER, true, false)?
            .add_method("describe", DESCRIBE)?;

        let state = host.state.clone();
        engine.set_getter_callback(move |event| read_property(&state, event));
        let state = host.state.clone();
        engine.set_setter_callback(move |event| write_property(&state, event));
        let state = host.state.clone();
        engine.set_indexed_getter_callback(move |event| read_cell(&state, event));
        let state = host.state.clone();
        engine.set_indexed_setter_callback(move |event| write_cell(&state, event));
        let state = host.state.clone();
        engine.set_method_callback(move |event| call_method(&state, event));
        let state = host.state.clone();
        engine.set_interface_getter_callback(move |event| read_peer(&state, event));
        let state = host.state.clone();
        engine.set_interface_setter_callback(move |event| write_peer(&state, event));
        engine.set_interface_method_callback(call_peer);

        tracing::debug!(class = %CALLBACK_CLASS, "demonstration host installed");
        Ok(host)
    }

    /// Number of `CallBack` objects handed out so far.
    pub fn len(&self) -> usize {
        self.state.borrow().callbacks.len()
    }
}

fn read_property(state: &RefCell<DemoState>, event: &mut GetterEvent<'_>) {
    let capability = event.capability();
    if capability == Some(HOST_VERSION) {
        return event.set_result_string(tether_script::VERSION);
    }
    let Some(instance) = event.host_instance() else {
        return event.set_error("CallBack member read without a receiver");
    };
    let state = state.borrow();
    let Some(callback) = state.callbacks.get(&instance) else {
        return event.set_error(format!("unknown CallBack {instance}"));
    };
    match capability {
        Some(VALUE) => event.set_result_int(callback.value),
        Some(CAPACITY) => event.set_result_int(callback.cells.len() as i32),
        Some(PEER) => event.set_result_interface(instance),
        _ => {}
    }
}

fn write_property(state: &RefCell<DemoState>, event: &mut SetterEvent<'_>) {
    if event.capability() != Some(VALUE) {
        return;
    }
    let Some(instance) = event.host_instance() else {
        return event.set_error("CallBack member written without a receiver");
    };
    let value = event.value_as_int();
    let previous = match state.borrow_mut().callbacks.get_mut(&instance) {
        Some(callback) => std::mem::replace(&mut callback.value, value),
        None => return event.set_error(format!("unknown CallBack {instance}")),
    };
    if previous != value {
        notify_change(event, value, previous);
    }
}

/// Call `OnValueChange(value, previous)` on the holder when script set one.
fn notify_change(event: &mut SetterEvent<'_>, value: i32, previous: i32) {
    let holder = event.holder();
    let mut view = holder.clone();
    let mut listener = match view.as_object().and_then(|object| object.get("OnValueChange")) {
        Ok(listener) => listener,
        Err(err) => return event.set_error(err.to_string()),
    };
    if !listener.is_function() {
        return;
    }
    let outcome = listener.as_function().and_then(|function| {
        function.set_this(&holder);
        function.add_arg_int(value);
        function.add_arg_int(previous);
        function.call()
    });
    match outcome {
        Ok(_) => {}
        // Rethrow the listener's own message.
        Err(BridgeError::Script { message }) => event.set_error(message),
        Err(err) => event.set_error(err.to_string()),
    }
}

fn read_cell(state: &RefCell<DemoState>, event: &mut GetterEvent<'_>) {
    let (Some(instance), Some(index)) = (event.host_instance(), event.property_index()) else {
        return event.set_error("indexed read without a receiver");
    };
    let cell = state
        .borrow()
        .callbacks
        .get(&instance)
        .and_then(|callback| callback.cells.get(index as usize).copied());
    match cell {
        Some(cell) => event.set_result_int(cell),
        None => event.set_error(format!("index {index} out of range")),
    }
}

fn write_cell(state: &RefCell<DemoState>, event: &mut SetterEvent<'_>) {
    let (Some(instance), Some(index)) = (event.host_instance(), event.property_index()) else {
        return event.set_error("indexed write without a receiver");
    };
    let value = event.value_as_int();
    let mut state = state.borrow_mut();
    let cell = state
        .callbacks
        .get_mut(&instance)
        .and_then(|callback| callback.cells.get_mut(index as usize));
    match cell {
        Some(cell) => *cell = value,
        None => event.set_error(format!("index {index} out of range")),
    }
}

fn call_method(state: &RefCell<DemoState>, event: &mut MethodEvent<'_>) {
    match event.method_handle() {
        Some(NEW_CALLBACK) => {
            let instance = state.borrow_mut().create();
            event.set_result_instance(instance, CALLBACK_CLASS);
        }
        Some(HOST_LOG) => {
            let level = event.arg(0).map(|arg| arg.as_integer()).unwrap_or(1);
            let message = event.arg(1).map(|arg| arg.as_string()).unwrap_or_default();
            match level {
                0 => tracing::debug!(target: "script.host", "{message}"),
                1 => tracing::info!(target: "script.host", "{message}"),
                2 => tracing::warn!(target: "script.host", "{message}"),
                _ => tracing::error!(target: "script.host", "{message}"),
            }
        }
        Some(DESCRIBE) => describe(state, event),
        _ => event.set_error(format!("unknown method {}", event.method_name())),
    }
}

/// `describe()`: a snapshot record of the receiver.
fn describe(state: &RefCell<DemoState>, event: &mut MethodEvent<'_>) {
    let Some(instance) = event.host_instance() else {
        return event.set_error("describe() called without a receiver");
    };
    let Some(callback) = state.borrow().callbacks.get(&instance).cloned() else {
        return event.set_error(format!("unknown CallBack {instance}"));
    };
    let outcome = event.result_record().and_then(|record| {
        record.set_string_field("Class", "CallBack")?;
        record.set_int_field("Value", callback.value)?;
        record.set_int_field("Capacity", callback.cells.len() as i32)?;
        record.set_object_field("Self", instance)?;
        Ok(())
    });
    match outcome {
        Ok(()) => event.set_result_as_record(),
        Err(err) => event.set_error(err.to_string()),
    }
}

fn read_peer(state: &RefCell<DemoState>, event: &mut GetterEvent<'_>) {
    let Some(instance) = event.host_instance() else {
        return;
    };
    match event.property_name() {
        Some("Value") => match state.borrow().callbacks.get(&instance) {
            Some(callback) => event.set_result_int(callback.value),
            None => event.set_error(format!("unknown peer {instance}")),
        },
        Some("ping") => event.set_result_interface_function(instance, "ping"),
        _ => {}
    }
}

/// Peer writes bypass the change listener.
fn write_peer(state: &RefCell<DemoState>, event: &mut SetterEvent<'_>) {
    let Some(instance) = event.host_instance() else {
        return;
    };
    if event.property_name() != Some("Value") {
        return event.set_error("peer members are read-only");
    }
    let value = event.value_as_int();
    match state.borrow_mut().callbacks.get_mut(&instance) {
        Some(callback) => callback.value = value,
        None => event.set_error(format!("unknown peer {instance}")),
    }
}

fn call_peer(event: &mut MethodEvent<'_>) {
    let is_ping = matches!(
        event.target(),
        Some(CallTarget::Interface { name, .. }) if name == "ping"
    );
    if !is_ping {
        return event.set_error(format!("peer has no method {}", event.method_name()));
    }
    let args: Vec<String> = event.args().iter().map(|arg| arg.as_string()).collect();
    event.set_result_string(format!("pong {}", args.join(",")));
}
