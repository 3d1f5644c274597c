//! Native state shared by every host entry point of one engine

use crate::callbacks::Callbacks;
use crate::descriptor::{ClassDescriptor, TemplateId};
use crate::handle::{Binding, ClassHandle, InstanceBinding};
use crate::registry::Registry;
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub(crate) type ErrorReporter = Rc<dyn Fn(&str)>;

/// Interned bindings. The numeric id is what the script side stores in its
/// binding map, so a binding handed out twice resolves to the same id.
///
/// Entries are never released: the table lives exactly as long as its
/// engine and grows with the number of distinct bindings handed out.
#[derive(Debug, Default)]
pub(crate) struct BindingTable {
    bindings: Vec<Binding>,
    lookup: HashMap<Binding, i32>,
}

impl BindingTable {
    pub fn intern(&mut self, binding: Binding) -> i32 {
        if let Some(&id) = self.lookup.get(&binding) {
            return id;
        }
        // Ids past i32::MAX would collide with the kit's "unbound" marker.
        let Ok(id) = i32::try_from(self.bindings.len()) else {
            tracing::error!("binding table exhausted; value left unbound");
            return -1;
        };
        self.bindings.push(binding);
        self.lookup.insert(binding, id);
        id
    }

    /// Negative or unknown ids resolve to nothing.
    pub fn get(&self, id: i32) -> Option<Binding> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.bindings.get(index))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}

#[derive(Default)]
pub(crate) struct Bridge {
    registry: OnceCell<Registry>,
    callbacks: RefCell<Callbacks>,
    bindings: RefCell<BindingTable>,
    reporter: RefCell<Option<ErrorReporter>>,
}

impl Bridge {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Compiled registry; absent until templates are compiled.
    pub fn registry(&self) -> Option<&Registry> {
        self.registry.get()
    }

    /// Publish the frozen registry. Only the first call has an effect.
    pub fn install_registry(&self, registry: Registry) {
        if self.registry.set(registry).is_err() {
            tracing::debug!("registry already published");
        }
    }

    pub fn callbacks(&self) -> &RefCell<Callbacks> {
        &self.callbacks
    }

    pub fn descriptor(&self, template: TemplateId) -> Option<&ClassDescriptor> {
        self.registry()?.by_template(template)
    }

    pub fn resolve(&self, class: ClassHandle) -> Option<&ClassDescriptor> {
        self.registry()?.resolve(class)
    }

    /// Template of a registered class whose templates have been compiled.
    pub fn template_of(&self, class: ClassHandle) -> Option<TemplateId> {
        self.resolve(class)?.template()
    }

    pub fn global_binding(&self) -> Option<InstanceBinding> {
        self.registry()?.global_binding()
    }

    pub fn intern(&self, binding: Binding) -> i32 {
        self.bindings.borrow_mut().intern(binding)
    }

    pub fn binding(&self, id: i32) -> Option<Binding> {
        self.bindings.borrow().get(id)
    }

    pub fn set_reporter(&self, reporter: Option<ErrorReporter>) {
        *self.reporter.borrow_mut() = reporter;
    }

    /// Forward `message` to the host reporter, if one is installed.
    pub fn report(&self, message: &str) {
        let reporter = self.reporter.borrow().clone();
        if let Some(reporter) = reporter {
            reporter(message);
        }
    }
}
