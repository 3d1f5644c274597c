//! Engine: registry, compiled templates, callbacks and run entry points

use crate::bridge::Bridge;
use crate::callbacks::EventKind;
use crate::coerce;
use crate::compile;
use crate::console;
use crate::descriptor::ClassDescriptor;
use crate::dispatch;
use crate::error::BridgeError;
use crate::event::{GetterEvent, MethodEvent, SetterEvent};
use crate::handle::{ClassHandle, InstanceHandle};
use crate::kit::Kit;
use crate::launch::{self, LaunchArgs};
use crate::registry::Registry;
use crate::scope::Scope;
use crate::settings::EngineSettings;
use crate::{STATUS_EXCEPTION, STATUS_LOAD_FAILURE, STATUS_OK};
use rquickjs::{Context, Object, Persistent, Runtime};
use std::path::Path;
use std::rc::Rc;

/// One embedded script runtime plus the host bridge projected into it.
///
/// Classes and the global namespace are registered first; templates are
/// compiled once (explicitly, or implicitly by the first run) and the
/// registry is frozen from then on. If compilation fails the engine stays
/// failed: every later run is a load failure.
pub struct Engine {
    // Declared first: released before the context and runtime it lives in.
    kit: Persistent<Object<'static>>,
    bridge: Rc<Bridge>,
    pending: Option<Registry>,
    compile_failure: Option<String>,
    include_code: String,
    debug: bool,
    exe_identifier: String,
    context: Context,
    runtime: Runtime,
}

impl Engine {
    pub fn new() -> Result<Self, BridgeError> {
        Self::with_settings(&EngineSettings::default())
    }

    pub fn with_settings(settings: &EngineSettings) -> Result<Self, BridgeError> {
        let runtime = Runtime::new()?;
        if let Some(limit) = settings.limits.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(limit) = settings.limits.max_stack_size {
            runtime.set_max_stack_size(limit);
        }
        if let Some(threshold) = settings.limits.gc_threshold {
            runtime.set_gc_threshold(threshold);
        }
        let context = Context::full(&runtime)?;
        let bridge = Bridge::new();

        let kit = context.with(|ctx| -> Result<_, BridgeError> {
            let host = dispatch::host_object(&ctx, &bridge)?;
            let kit = Kit::install(&ctx, host).map_err(|err| coerce::script_error(&ctx, err))?;
            if settings.console {
                console::install(&ctx)?;
            }
            Ok(Persistent::save(&ctx, kit.object().clone()))
        })?;

        let mut engine = Self {
            kit,
            bridge,
            pending: Some(Registry::new()),
            compile_failure: None,
            include_code: String::new(),
            debug: settings.debug,
            exe_identifier: settings.exe_identifier.clone(),
            context,
            runtime,
        };
        for path in &settings.include_files {
            let code = std::fs::read_to_string(path)?;
            engine.add_include_code(&code);
        }
        tracing::debug!(console = settings.console, debug = settings.debug, "engine created");
        Ok(engine)
    }

    /// Register `class` and return its open descriptor.
    pub fn register_class(&mut self, class: ClassHandle) -> Result<&mut ClassDescriptor, BridgeError> {
        self.open_registry()?.register_class(class)
    }

    /// Register the global namespace, bound to the live `instance`.
    pub fn register_global(
        &mut self,
        class: ClassHandle,
        instance: InstanceHandle,
    ) -> Result<&mut ClassDescriptor, BridgeError> {
        self.open_registry()?.register_global(class, instance)
    }

    fn open_registry(&mut self) -> Result<&mut Registry, BridgeError> {
        self.pending.as_mut().ok_or(BridgeError::RegistryFrozen)
    }

    /// Freeze the registry and build every template. Fails on a second call.
    ///
    /// A failed compilation publishes no registry, so nothing the script
    /// could reach is half bound.
    pub fn compile_templates(&mut self) -> Result<(), BridgeError> {
        if let Some(message) = &self.compile_failure {
            return Err(BridgeError::CompileFailed {
                message: message.clone(),
            });
        }
        let mut registry = self.pending.take().ok_or(BridgeError::AlreadyCompiled)?;
        registry.freeze()?;
        if let Err(err) = self.with(|scope| compile::compile_registry(scope, &registry)) {
            tracing::error!(error = %err, "template compilation failed");
            self.compile_failure = Some(err.to_string());
            return Err(err);
        }
        tracing::debug!(classes = registry.len(), "templates compiled");
        self.bridge.install_registry(registry);
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.pending.is_none() && self.compile_failure.is_none()
    }

    fn ensure_compiled(&mut self) -> Result<(), BridgeError> {
        if self.is_compiled() {
            return Ok(());
        }
        self.compile_templates()
    }

    pub fn resolve_descriptor(&self, class: ClassHandle) -> Option<&ClassDescriptor> {
        match &self.pending {
            Some(registry) => registry.resolve(class),
            None => self.bridge.resolve(class),
        }
    }

    pub fn is_class_registered(&self, class: ClassHandle) -> bool {
        self.resolve_descriptor(class).is_some()
    }

    pub fn set_getter_callback<F>(&mut self, callback: F)
    where
        F: for<'js> Fn(&mut GetterEvent<'js>) + 'static,
    {
        self.bind_getter(EventKind::Getter, callback);
    }

    pub fn set_setter_callback<F>(&mut self, callback: F)
    where
        F: for<'js> Fn(&mut SetterEvent<'js>) + 'static,
    {
        self.bind_setter(EventKind::Setter, callback);
    }

    pub fn set_field_getter_callback<F>(&mut self, callback: F)
    where
        F: for<'js> Fn(&mut GetterEvent<'js>) + 'static,
    {
        self.bind_getter(EventKind::FieldGetter, callback);
    }

    pub fn set_field_setter_callback<F>(&mut self, callback: F)
    where
        F: for<'js> Fn(&mut SetterEvent<'js>) + 'static,
    {
        self.bind_setter(EventKind::FieldSetter, callback);
    }

    pub fn set_indexed_getter_callback<F>(&mut self, callback: F)
    where
        F: for<'js> Fn(&mut GetterEvent<'js>) + 'static,
    {
        self.bind_getter(EventKind::IndexedGetter, callback);
    }

    pub fn set_indexed_setter_callback<F>(&mut self, callback: F)
    where
        F: for<'js> Fn(&mut SetterEvent<'js>) + 'static,
    {
        self.bind_setter(EventKind::IndexedSetter, callback);
    }

    pub fn set_method_callback<F>(&mut self, callback: F)
    where
        F: for<'js> Fn(&mut MethodEvent<'js>) + 'static,
    {
        self.bridge
            .callbacks()
            .borrow_mut()
            .bind_method(EventKind::Method, Rc::new(callback));
    }

    pub fn set_interface_getter_callback<F>(&mut self, callback: F)
    where
        F: for<'js> Fn(&mut GetterEvent<'js>) + 'static,
    {
        self.bind_getter(EventKind::InterfaceGetter, callback);
    }

    pub fn set_interface_setter_callback<F>(&mut self, callback: F)
    where
        F: for<'js> Fn(&mut SetterEvent<'js>) + 'static,
    {
        self.bind_setter(EventKind::InterfaceSetter, callback);
    }

    pub fn set_interface_method_callback<F>(&mut self, callback: F)
    where
        F: for<'js> Fn(&mut MethodEvent<'js>) + 'static,
    {
        self.bridge
            .callbacks()
            .borrow_mut()
            .bind_method(EventKind::InterfaceMethod, Rc::new(callback));
    }

    fn bind_getter<F>(&mut self, kind: EventKind, callback: F)
    where
        F: for<'js> Fn(&mut GetterEvent<'js>) + 'static,
    {
        self.bridge.callbacks().borrow_mut().bind_getter(kind, Rc::new(callback));
    }

    fn bind_setter<F>(&mut self, kind: EventKind, callback: F)
    where
        F: for<'js> Fn(&mut SetterEvent<'js>) + 'static,
    {
        self.bridge.callbacks().borrow_mut().bind_setter(kind, Rc::new(callback));
    }

    /// Receive every uncaught script error and every `log_error` message.
    pub fn set_error_reporter<F>(&mut self, reporter: F)
    where
        F: Fn(&str) + 'static,
    {
        self.bridge.set_reporter(Some(Rc::new(reporter)));
    }

    pub fn log_error(&self, message: &str) {
        self.bridge.report(message);
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn debug_mode(&self) -> bool {
        self.debug
    }

    pub fn exe_identifier(&self) -> &str {
        &self.exe_identifier
    }

    /// Run `f` inside a script turn.
    pub fn with<F, R>(&self, f: F) -> Result<R, BridgeError>
    where
        F: for<'js> FnOnce(&Scope<'js>) -> Result<R, BridgeError>,
    {
        let kit = self.kit.clone();
        let bridge = self.bridge.clone();
        self.context.with(|ctx| {
            let kit = Kit::new(kit.restore(&ctx)?);
            let scope = Scope::new(ctx, kit, bridge);
            f(&scope)
        })
    }

    /// Run a script file or inline code and return the run status.
    ///
    /// Pending include code runs first. An uncaught exception yields
    /// [`STATUS_EXCEPTION`]; otherwise the status is `process.exitCode`.
    pub fn run_source(&mut self, code: &str, is_file: bool, exe: &str) -> i32 {
        if let Err(err) = self.ensure_compiled() {
            self.report_failure(&err.to_string());
            return STATUS_LOAD_FAILURE;
        }
        let status = self.exec_include_code();
        if status != STATUS_OK {
            return status;
        }

        let (source, args) = if is_file {
            match std::fs::read_to_string(code) {
                Ok(source) => (source, LaunchArgs::for_file(exe, self.debug, code)),
                Err(err) => {
                    self.report_failure(&format!("cannot read script '{code}': {err}"));
                    return STATUS_LOAD_FAILURE;
                }
            }
        } else {
            (code.to_string(), LaunchArgs::for_code(exe, self.debug, code))
        };
        tracing::debug!(argv = ?args.as_slice(), "launching script");
        self.evaluate(&source, Some(&args))
    }

    pub fn run_string(&mut self, code: &str) -> i32 {
        let exe = self.exe_identifier.clone();
        self.run_source(code, false, &exe)
    }

    pub fn run_file(&mut self, path: impl AsRef<Path>) -> i32 {
        let exe = self.exe_identifier.clone();
        let path = path.as_ref().to_string_lossy().into_owned();
        self.run_source(&path, true, &exe)
    }

    /// Evaluate one file without publishing `process.argv`.
    pub fn run_include_file(&mut self, path: impl AsRef<Path>) -> i32 {
        if let Err(err) = self.ensure_compiled() {
            self.report_failure(&err.to_string());
            return STATUS_LOAD_FAILURE;
        }
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(source) => self.evaluate(&source, None),
            Err(err) => {
                self.report_failure(&format!("cannot read include '{}': {err}", path.display()));
                STATUS_LOAD_FAILURE
            }
        }
    }

    /// Queue bootstrap code for the next [`exec_include_code`](Self::exec_include_code).
    pub fn add_include_code(&mut self, code: &str) {
        self.include_code.push_str(code);
        self.include_code.push('\n');
    }

    /// Run and clear the queued include code.
    pub fn exec_include_code(&mut self) -> i32 {
        if self.include_code.is_empty() {
            return STATUS_OK;
        }
        if let Err(err) = self.ensure_compiled() {
            self.report_failure(&err.to_string());
            return STATUS_LOAD_FAILURE;
        }
        let code = std::mem::take(&mut self.include_code);
        self.evaluate(&code, None)
    }

    fn evaluate(&mut self, source: &str, args: Option<&LaunchArgs>) -> i32 {
        let failure = self.context.with(|ctx| {
            if let Some(args) = args {
                if let Err(err) = launch::publish(&ctx, args) {
                    return Some(coerce::describe_error(&ctx, &err));
                }
            }
            ctx.eval::<(), _>(source)
                .err()
                .map(|err| coerce::describe_error(&ctx, &err))
        });
        if let Some(message) = failure.or_else(|| self.drain_jobs()) {
            self.report_uncaught(&message);
            return STATUS_EXCEPTION;
        }
        match args {
            Some(_) => self.context.with(|ctx| launch::exit_code(&ctx)),
            None => STATUS_OK,
        }
    }

    fn drain_jobs(&self) -> Option<String> {
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(_) => return Some(self.context.with(|ctx| coerce::take_exception(&ctx))),
            }
        }
    }

    fn report_uncaught(&self, message: &str) {
        tracing::warn!(message, "uncaught script exception");
        self.bridge.report(message);
    }

    fn report_failure(&self, message: &str) {
        tracing::error!(message, "script could not be started");
        self.bridge.report(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CallTarget;
    use crate::handle::{CapabilityHandle, MethodHandle};
    use std::cell::RefCell;
    use std::io::Write;

    const GLOBAL: ClassHandle = ClassHandle(0x1);
    const POINT: ClassHandle = ClassHandle(0x10);
    const GRID: ClassHandle = ClassHandle(0x20);
    const HOST: InstanceHandle = InstanceHandle(0xa0);
    const PEER: InstanceHandle = InstanceHandle(0x77);

    fn capture_reports(engine: &mut Engine) -> Rc<RefCell<Vec<String>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        engine.set_error_reporter(move |message| sink.borrow_mut().push(message.to_string()));
        seen
    }

    /// Global `make(id)` returning a `POINT` instance, `X` property on points
    /// and a `sum(a, b)` method.
    fn point_engine() -> Engine {
        let mut engine = Engine::new().unwrap();
        engine
            .register_global(GLOBAL, HOST)
            .unwrap()
            .add_method("make", MethodHandle(1))
            .unwrap();
        engine
            .register_class(POINT)
            .unwrap()
            .add_property("X", CapabilityHandle(7), true, true)
            .and_then(|d| d.add_method("sum", MethodHandle(2)))
            .and_then(|d| d.add_field("label"))
            .and_then(|d| d.add_enum_constant("Origin", 0))
            .unwrap();
        engine.set_method_callback(|event| match event.method_handle() {
            Some(MethodHandle(1)) => {
                let id = event.arg(0).map(|arg| arg.as_integer()).unwrap_or(0);
                event.set_result_instance(InstanceHandle(id as u64), POINT);
            }
            Some(MethodHandle(2)) => {
                let total: i32 = event.args().iter().map(|arg| arg.as_integer()).sum();
                event.set_result_int(total);
            }
            _ => event.set_error("unknown method"),
        });
        engine
    }

    #[test]
    fn getter_error_becomes_exception_status_and_report() {
        let mut engine = Engine::new().unwrap();
        engine
            .register_global(GLOBAL, HOST)
            .unwrap()
            .add_property("Boom", CapabilityHandle(1), true, false)
            .unwrap();
        engine.set_getter_callback(|event| event.set_error("boom"));
        let reports = capture_reports(&mut engine);

        assert_eq!(engine.run_string("Boom;"), STATUS_EXCEPTION);
        assert_eq!(*reports.borrow(), ["boom".to_string()]);
    }

    #[test]
    fn dispatch_errors_are_catchable_in_script() {
        let mut engine = Engine::new().unwrap();
        engine
            .register_global(GLOBAL, HOST)
            .unwrap()
            .add_property("Boom", CapabilityHandle(1), true, false)
            .unwrap();
        engine.set_getter_callback(|event| {
            event.set_result_int(1);
            event.set_error("");
            event.set_error("first");
            event.set_error("second");
        });

        let status = engine.run_string(
            "let caught; try { Boom; } catch (e) { caught = e; }
             if (caught !== 'first') throw new Error('caught ' + caught);",
        );
        assert_eq!(status, STATUS_OK);
    }

    #[test]
    fn instances_carry_identity_into_events() {
        let mut engine = point_engine();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        engine.set_getter_callback(move |event| {
            sink.borrow_mut().push((
                event.host_instance(),
                event.host_class(),
                event.property_name().map(str::to_string),
                event.capability(),
            ));
            event.set_result_double(2.5);
        });

        let status = engine.run_string(
            "const p = make(42);
             if (p.X !== 2.5) throw new Error('X');
             if (p.sum(1, 2, 3) !== 6) throw new Error('sum');
             if (p.Origin !== 0) throw new Error('enum');",
        );
        assert_eq!(status, STATUS_OK);
        assert_eq!(
            *seen.borrow(),
            [(
                Some(InstanceHandle(42)),
                Some(POINT),
                Some("X".to_string()),
                Some(CapabilityHandle(7))
            )]
        );
    }

    #[test]
    fn setters_and_fields_use_their_own_callbacks() {
        let mut engine = point_engine();
        let writes = Rc::new(RefCell::new(Vec::new()));

        let sink = writes.clone();
        engine.set_setter_callback(move |event| {
            sink.borrow_mut().push(format!("prop {}", event.value_as_int()));
        });
        let sink = writes.clone();
        engine.set_field_setter_callback(move |event| {
            let name = event.property_name().unwrap_or_default().to_string();
            sink.borrow_mut().push(format!("field {name}={}", event.value_as_string()));
        });
        engine.set_field_getter_callback(|event| event.set_result_string("from host"));

        let status = engine.run_string(
            "const p = make(1);
             p.X = 12;
             p.label = 'tag';
             if (p.label !== 'from host') throw new Error('label');",
        );
        assert_eq!(status, STATUS_OK);
        assert_eq!(
            *writes.borrow(),
            ["prop 12".to_string(), "field label=tag".to_string()]
        );
    }

    #[test]
    fn unbound_callbacks_complete_as_undefined() {
        let mut engine = point_engine();
        let status = engine.run_string(
            "const p = make(3);
             if (p.X !== undefined) throw new Error('X');
             p.X = 5;",
        );
        assert_eq!(status, STATUS_OK);
    }

    #[test]
    fn unbound_receivers_reach_callbacks_without_an_instance() {
        let mut engine = point_engine();
        engine.set_getter_callback(|event| {
            if event.host_instance().is_none() {
                event.set_error("unbound receiver");
            }
        });
        let reports = capture_reports(&mut engine);

        let status = engine.run_string(
            "const proto = Object.getPrototypeOf(make(1));
             Object.getOwnPropertyDescriptor(proto, 'X').get.call({});",
        );
        assert_eq!(status, STATUS_EXCEPTION);
        assert_eq!(*reports.borrow(), ["unbound receiver".to_string()]);
    }

    #[test]
    fn indexed_classes_route_integer_keys() {
        let mut engine = Engine::new().unwrap();
        engine
            .register_global(GLOBAL, HOST)
            .unwrap()
            .add_property("Grid", CapabilityHandle(1), true, false)
            .unwrap();
        engine
            .register_class(GRID)
            .unwrap()
            .set_indexed_access(true)
            .and_then(|d| d.add_property("Size", CapabilityHandle(2), true, false))
            .unwrap();

        let cells = Rc::new(RefCell::new(vec![0; 4]));
        engine.set_getter_callback(|event| match event.property_name() {
            Some("Grid") => event.set_result_instance(InstanceHandle(5), GRID),
            Some("Size") => event.set_result_int(4),
            _ => {}
        });
        let store = cells.clone();
        engine.set_indexed_getter_callback(move |event| {
            let index = event.property_index().unwrap_or(u32::MAX) as usize;
            match store.borrow().get(index) {
                Some(&value) => event.set_result_int(value),
                None => event.set_error(format!("index {index} out of range")),
            }
        });
        let store = cells.clone();
        engine.set_indexed_setter_callback(move |event| {
            if event.host_class() != Some(GRID) {
                return event.set_error("not a grid");
            }
            let index = event.property_index().unwrap_or(u32::MAX) as usize;
            let value = event.value_as_int();
            if let Some(cell) = store.borrow_mut().get_mut(index) {
                *cell = value;
            }
        });

        let status = engine.run_string(
            "const g = Grid;
             for (let i = 0; i < g.Size; i++) g[i] = i * 10;
             if (g[3] !== 30) throw new Error('cell');
             g.note = 'plain keys fall through';
             if (g.note !== 'plain keys fall through') throw new Error('note');",
        );
        assert_eq!(status, STATUS_OK);
        assert_eq!(*cells.borrow(), [0, 10, 20, 30]);
    }

    #[test]
    fn interfaces_resolve_members_by_name() {
        let mut engine = Engine::new().unwrap();
        engine
            .register_global(GLOBAL, HOST)
            .unwrap()
            .add_property("Peer", CapabilityHandle(1), true, false)
            .unwrap();
        engine.set_getter_callback(|event| event.set_result_interface(PEER));
        engine.set_interface_getter_callback(|event| {
            let instance = event.host_instance();
            match event.property_name() {
                Some("level") => event.set_result_int(3),
                Some("greet") => {
                    if let Some(instance) = instance {
                        event.set_result_interface_function(instance, "greet");
                    }
                }
                _ => {}
            }
        });
        let assigned = Rc::new(RefCell::new(None));
        let sink = assigned.clone();
        engine.set_interface_setter_callback(move |event| {
            *sink.borrow_mut() = Some((event.host_instance(), event.value_as_int()));
        });
        engine.set_interface_method_callback(|event| {
            let greeting = match event.target() {
                Some(CallTarget::Interface { interface, name }) if *interface == PEER => {
                    format!("{name} {}", event.args()[0].as_string())
                }
                _ => String::new(),
            };
            event.set_result_string(greeting);
        });

        let status = engine.run_string(
            "if (Peer.level !== 3) throw new Error('level');
             if (Peer.greet('bob') !== 'greet bob') throw new Error('greet');
             if (Peer.missing !== undefined) throw new Error('missing');
             Peer.level = 9;",
        );
        assert_eq!(status, STATUS_OK);
        assert_eq!(*assigned.borrow(), Some((Some(PEER), 9)));
    }

    #[test]
    fn global_enum_constants_are_read_only() {
        let mut engine = Engine::new().unwrap();
        engine
            .register_global(GLOBAL, HOST)
            .unwrap()
            .add_enum_constant("Red", 1)
            .and_then(|d| d.add_enum_constant("Blue", 4))
            .unwrap();

        let status = engine.run_string(
            "if (Red + Blue !== 5) throw new Error('sum');
             let threw = false;
             try { Red = 2; } catch (e) { threw = true; }
             if (!threw || Red !== 1) throw new Error('mutable');",
        );
        assert_eq!(status, STATUS_OK);
    }

    #[test]
    fn read_only_members_ignore_writes() {
        let mut engine = Engine::new().unwrap();
        engine
            .register_global(GLOBAL, HOST)
            .unwrap()
            .add_property("Version", CapabilityHandle(1), true, false)
            .and_then(|d| d.add_property("Grid", CapabilityHandle(2), true, false))
            .and_then(|d| d.add_property("Point", CapabilityHandle(5), true, false))
            .unwrap();
        engine
            .register_class(GRID)
            .unwrap()
            .set_indexed_access(true)
            .and_then(|d| d.add_property("Size", CapabilityHandle(3), true, false))
            .and_then(|d| d.add_enum_constant("Rows", 2))
            .unwrap();
        engine
            .register_class(POINT)
            .unwrap()
            .add_property("Y", CapabilityHandle(4), true, false)
            .unwrap();
        engine.set_getter_callback(|event| match event.capability() {
            Some(CapabilityHandle(1)) => event.set_result_string("1.0"),
            Some(CapabilityHandle(2)) => event.set_result_instance(InstanceHandle(5), GRID),
            Some(CapabilityHandle(3)) => event.set_result_int(4),
            Some(CapabilityHandle(4)) => event.set_result_int(7),
            _ => event.set_result_instance(InstanceHandle(6), POINT),
        });
        let writes = Rc::new(RefCell::new(0));
        let sink = writes.clone();
        engine.set_setter_callback(move |_| *sink.borrow_mut() += 1);

        let status = engine.run_string(
            "Version = 'changed';
             if (Version !== '1.0') throw new Error('global ' + Version);
             const g = Grid;
             g.Size = 9;
             g.Rows = 5;
             if (g.Size !== 4 || g.Rows !== 2) throw new Error('indexed');
             const p = Point;
             p.Y = 1;
             if (p.Y !== 7) throw new Error('plain');",
        );
        assert_eq!(status, STATUS_OK);
        assert_eq!(*writes.borrow(), 0);
    }

    #[test]
    fn failed_compilation_blocks_every_run() {
        let mut engine = Engine::new().unwrap();
        engine
            .register_global(GLOBAL, HOST)
            .unwrap()
            .add_property("Alpha", CapabilityHandle(1), true, false)
            .and_then(|d| d.add_property("NaN", CapabilityHandle(2), true, false))
            .unwrap();
        engine.set_getter_callback(|event| event.set_result_int(1));
        let reports = capture_reports(&mut engine);

        assert_eq!(engine.run_string("Alpha;"), STATUS_LOAD_FAILURE);
        assert_eq!(engine.run_string("Alpha;"), STATUS_LOAD_FAILURE);
        assert!(!engine.is_compiled());
        assert!(matches!(
            engine.compile_templates(),
            Err(BridgeError::CompileFailed { ref message }) if message.contains("'NaN'")
        ));

        let reports = reports.borrow();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].contains("member 'NaN'"), "{}", reports[0]);
        assert!(reports[0].contains(&GLOBAL.to_string()), "{}", reports[0]);
        assert!(reports[1].contains("'NaN'"), "{}", reports[1]);
    }

    #[test]
    fn setter_callbacks_can_call_back_into_script() {
        let mut engine = point_engine();
        engine.set_setter_callback(|event| {
            let mut holder = event.holder();
            let mut listener = match holder.as_object().and_then(|object| object.get("onChange")) {
                Ok(listener) => listener,
                Err(err) => return event.set_error(err.to_string()),
            };
            if !listener.is_function() {
                return;
            }
            let value = event.value_as_int();
            let outcome = listener.as_function().and_then(|function| {
                function.add_arg_int(value);
                function.call()
            });
            if let Err(err) = outcome {
                event.set_error(err.to_string());
            }
        });

        let status = engine.run_string(
            "const p = make(8);
             let seen = 0;
             p.onChange = (v) => { seen = v; };
             p.X = 40;
             if (seen !== 40) throw new Error('listener saw ' + seen);",
        );
        assert_eq!(status, STATUS_OK);
    }

    #[test]
    fn exit_code_and_argv_are_published() {
        let mut engine = Engine::new().unwrap();
        engine.set_debug(true);
        let status = engine.run_source(
            "if (process.argv.join(' ') !== 'host --debug-brk --nolazy -e ' + process.argv[4]) throw new Error('argv');
             process.exitCode = 7;",
            false,
            "host",
        );
        assert_eq!(status, 7);

        assert_eq!(engine.run_string("1;"), STATUS_OK);
    }

    #[test]
    fn pending_jobs_run_before_the_status_is_read() {
        let mut engine = Engine::new().unwrap();
        let status = engine.run_string("Promise.resolve(5).then((v) => { process.exitCode = v; });");
        assert_eq!(status, 5);
    }

    #[test]
    fn syntax_errors_are_uncaught_exceptions() {
        let mut engine = Engine::new().unwrap();
        let reports = capture_reports(&mut engine);
        assert_eq!(engine.run_string("let = = ;"), STATUS_EXCEPTION);
        assert_eq!(reports.borrow().len(), 1);
    }

    #[test]
    fn unreadable_files_report_a_load_failure() {
        let mut engine = Engine::new().unwrap();
        let reports = capture_reports(&mut engine);
        let missing = std::env::temp_dir().join("tether-does-not-exist.js");

        assert_eq!(engine.run_file(&missing), STATUS_LOAD_FAILURE);
        assert_eq!(engine.run_include_file(&missing), STATUS_LOAD_FAILURE);
        assert_eq!(reports.borrow().len(), 2);
    }

    #[test]
    fn files_and_includes_run() {
        let mut include = tempfile::NamedTempFile::new().unwrap();
        writeln!(include, "var fromInclude = 'yes';").unwrap();
        let mut script = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            script,
            "if (fromInclude !== 'yes' || counter !== 1) throw new Error('bootstrap');"
        )
        .unwrap();

        let mut engine = Engine::new().unwrap();
        engine.add_include_code("var counter = (typeof counter === 'number' ? counter : 0) + 1;");
        assert_eq!(engine.exec_include_code(), STATUS_OK);
        assert_eq!(engine.exec_include_code(), STATUS_OK);
        assert_eq!(engine.run_include_file(include.path()), STATUS_OK);
        assert_eq!(engine.run_file(script.path()), STATUS_OK);
    }

    #[test]
    fn failing_include_code_stops_the_run() {
        let mut engine = Engine::new().unwrap();
        engine.add_include_code("throw new Error('bootstrap failed');");
        assert_eq!(engine.run_string("process.exitCode = 4;"), STATUS_EXCEPTION);
    }

    #[test]
    fn settings_preload_include_files() {
        let mut include = tempfile::NamedTempFile::new().unwrap();
        writeln!(include, "var preloaded = 11;").unwrap();
        let settings = EngineSettings {
            exe_identifier: "custom".to_string(),
            console: false,
            include_files: vec![include.path().to_path_buf()],
            ..EngineSettings::default()
        };

        let mut engine = Engine::with_settings(&settings).unwrap();
        assert_eq!(engine.exe_identifier(), "custom");
        let status = engine.run_string(
            "if (typeof console !== 'undefined') throw new Error('console');
             if (process.argv[0] !== 'custom') throw new Error('argv');
             process.exitCode = preloaded;",
        );
        assert_eq!(status, 11);
    }

    #[test]
    fn registry_freezes_after_compilation() {
        let mut engine = Engine::new().unwrap();
        engine.register_class(POINT).unwrap();
        assert!(matches!(
            engine.register_class(POINT),
            Err(BridgeError::DuplicateClass { .. })
        ));
        engine.compile_templates().unwrap();

        assert!(engine.is_compiled());
        assert!(engine.is_class_registered(POINT));
        assert!(!engine.is_class_registered(GRID));
        assert!(engine.resolve_descriptor(POINT).unwrap().is_frozen());
        assert!(matches!(engine.register_class(GRID), Err(BridgeError::RegistryFrozen)));
        assert!(matches!(
            engine.register_global(GLOBAL, HOST),
            Err(BridgeError::RegistryFrozen)
        ));
        assert!(matches!(engine.compile_templates(), Err(BridgeError::AlreadyCompiled)));

        let mut copy = engine.resolve_descriptor(POINT).unwrap().clone();
        assert!(matches!(copy.add_field("late"), Err(BridgeError::RegistryFrozen)));
    }

    #[test]
    fn missing_named_function_is_absent() {
        let mut engine = Engine::new().unwrap();
        assert_eq!(engine.run_string("var notCallable = 3;"), STATUS_OK);
        let absent = engine
            .with(|scope| {
                let args = scope.new_array(0)?;
                let missing = scope.call_named_function("doesNotExist", &args)?;
                let plain = scope.call_named_function("notCallable", &args)?;
                Ok(missing.is_none() && plain.is_none())
            })
            .unwrap();
        assert!(absent);
    }

    #[test]
    fn named_functions_receive_array_values() {
        let mut engine = Engine::new().unwrap();
        assert_eq!(
            engine.run_string("function join(a, b) { return a + '-' + b; }"),
            STATUS_OK
        );
        let joined = engine
            .with(|scope| {
                let mut args = scope.new_array(2)?;
                args.set_value(&scope.new_string("left")?, 0)?;
                args.set_value(&scope.new_integer(9), 1)?;
                let result = scope.call_named_function("join", &args)?;
                Ok(result.map(|value| value.as_string()))
            })
            .unwrap();
        assert_eq!(joined.as_deref(), Some("left-9"));
    }

    #[test]
    fn named_function_exceptions_are_script_errors() {
        let mut engine = Engine::new().unwrap();
        assert_eq!(
            engine.run_string("function fail() { throw new RangeError('bad range'); }"),
            STATUS_OK
        );
        let err = engine
            .with(|scope| {
                let args = scope.new_array(0)?;
                scope.call_named_function("fail", &args).map(|_| ())
            })
            .unwrap_err();
        assert!(matches!(err, BridgeError::Script { ref message } if message == "bad range"));
    }

    #[test]
    fn named_function_lookup_errors_are_script_errors() {
        let mut engine = Engine::new().unwrap();
        engine
            .register_global(GLOBAL, HOST)
            .unwrap()
            .add_property("Boom", CapabilityHandle(1), true, false)
            .unwrap();
        engine.set_getter_callback(|event| event.set_error("boom"));
        engine.compile_templates().unwrap();

        let err = engine
            .with(|scope| {
                let args = scope.new_array(0)?;
                scope.call_named_function("Boom", &args).map(|_| ())
            })
            .unwrap_err();
        assert!(matches!(err, BridgeError::Script { ref message } if message == "boom"));
    }

    #[test]
    fn host_objects_are_recognised_when_passed_back() {
        let mut engine = point_engine();
        engine.set_method_callback(|event| {
            if event.method_name() == "make" {
                event.set_result_instance(InstanceHandle(31), POINT);
                return;
            }
            let found = event
                .arg(0)
                .map(|arg| arg.as_object().map(|object| (object.host_instance(), object.host_class())));
            match found {
                Some(Ok((Some(instance), Some(class)))) if instance == InstanceHandle(31) && class == POINT => {
                    event.set_result_bool(true)
                }
                _ => event.set_result_bool(false),
            }
        });

        let status = engine.run_string(
            "const p = make();
             if (p.sum(p) !== true) throw new Error('identity');
             if (p.sum({}) !== false) throw new Error('plain object');",
        );
        assert_eq!(status, STATUS_OK);
    }
}
