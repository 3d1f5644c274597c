use crate::descriptor::{ClassDescriptor, TemplateId};
use crate::error::BridgeError;
use crate::handle::{ClassHandle, InstanceBinding, InstanceHandle};
use std::collections::HashMap;

/// Insertion-ordered table of class descriptors plus the global namespace.
///
/// Lookup is keyed by class handle; the vector keeps declaration order,
/// which is also the template order once the registry is frozen.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    classes: Vec<ClassDescriptor>,
    class_lookup: HashMap<ClassHandle, usize>,
    global: Option<RegisteredGlobal>,
    frozen: bool,
}

#[derive(Debug)]
struct RegisteredGlobal {
    instance: InstanceHandle,
    descriptor: ClassDescriptor,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_class(
        &mut self,
        class: ClassHandle,
    ) -> Result<&mut ClassDescriptor, BridgeError> {
        self.ensure_open()?;
        if self.class_lookup.contains_key(&class) {
            return Err(BridgeError::DuplicateClass { class });
        }

        let index = self.classes.len();
        self.class_lookup.insert(class, index);
        self.classes.push(ClassDescriptor::new(class));
        Ok(&mut self.classes[index])
    }

    pub fn register_global(
        &mut self,
        class: ClassHandle,
        instance: InstanceHandle,
    ) -> Result<&mut ClassDescriptor, BridgeError> {
        self.ensure_open()?;
        if self.global.is_some() {
            return Err(BridgeError::GlobalAlreadyRegistered);
        }

        let global = self.global.insert(RegisteredGlobal {
            instance,
            descriptor: ClassDescriptor::new(class),
        });
        Ok(&mut global.descriptor)
    }

    /// Descriptor registered for `class`; the global descriptor is found
    /// when no ordinary class claims the handle.
    pub fn resolve(&self, class: ClassHandle) -> Option<&ClassDescriptor> {
        if let Some(&index) = self.class_lookup.get(&class) {
            return self.classes.get(index);
        }
        self.global
            .as_ref()
            .map(|global| &global.descriptor)
            .filter(|descriptor| descriptor.class() == class)
    }

    pub fn by_template(&self, template: TemplateId) -> Option<&ClassDescriptor> {
        match template {
            TemplateId::Class(index) => self.classes.get(index as usize),
            TemplateId::Global => self.global.as_ref().map(|global| &global.descriptor),
        }
    }

    pub fn global_binding(&self) -> Option<InstanceBinding> {
        self.global
            .as_ref()
            .map(|global| InstanceBinding::new(global.instance, global.descriptor.class()))
    }

    pub fn global(&self) -> Option<&ClassDescriptor> {
        self.global.as_ref().map(|global| &global.descriptor)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Assign template ids in declaration order and lock every descriptor.
    pub fn freeze(&mut self) -> Result<(), BridgeError> {
        if self.frozen {
            return Err(BridgeError::AlreadyCompiled);
        }
        for (index, descriptor) in self.classes.iter_mut().enumerate() {
            descriptor.freeze(TemplateId::Class(index as u32));
        }
        if let Some(global) = self.global.as_mut() {
            global.descriptor.freeze(TemplateId::Global);
        }
        self.frozen = true;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), BridgeError> {
        if self.frozen {
            return Err(BridgeError::RegistryFrozen);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::MethodHandle;

    #[test]
    fn resolve_is_exact_per_class() {
        let mut registry = Registry::new();
        registry
            .register_class(ClassHandle(10))
            .unwrap()
            .add_field("a")
            .unwrap();
        registry
            .register_class(ClassHandle(11))
            .unwrap()
            .add_field("b")
            .unwrap();

        let first = registry.resolve(ClassHandle(10)).unwrap();
        let second = registry.resolve(ClassHandle(11)).unwrap();
        assert_eq!(first.class(), ClassHandle(10));
        assert_eq!(first.fields(), ["a".to_string()]);
        assert_eq!(second.class(), ClassHandle(11));
        assert_eq!(second.fields(), ["b".to_string()]);
        assert!(registry.resolve(ClassHandle(1)).is_none());
        assert!(registry.resolve(ClassHandle(110)).is_none());
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let mut registry = Registry::new();
        registry.register_class(ClassHandle(5)).unwrap();
        let err = registry.register_class(ClassHandle(5)).unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateClass { class: ClassHandle(5) }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn global_may_be_registered_once() {
        let mut registry = Registry::new();
        registry
            .register_global(ClassHandle(1), InstanceHandle(2))
            .unwrap()
            .add_method("hello", MethodHandle(3))
            .unwrap();
        assert!(matches!(
            registry.register_global(ClassHandle(4), InstanceHandle(5)),
            Err(BridgeError::GlobalAlreadyRegistered)
        ));

        let binding = registry.global_binding().unwrap();
        assert_eq!(binding.instance(), InstanceHandle(2));
        assert_eq!(binding.class(), ClassHandle(1));
        assert_eq!(registry.resolve(ClassHandle(1)).unwrap().methods().len(), 1);
    }

    #[test]
    fn freeze_assigns_templates_in_declaration_order() {
        let mut registry = Registry::new();
        registry.register_class(ClassHandle(30)).unwrap();
        registry.register_class(ClassHandle(20)).unwrap();
        registry
            .register_global(ClassHandle(99), InstanceHandle(1))
            .unwrap();
        registry.freeze().unwrap();

        let templates: Vec<_> = registry.classes().map(|d| d.template()).collect();
        assert_eq!(
            templates,
            [Some(TemplateId::Class(0)), Some(TemplateId::Class(1))]
        );
        assert_eq!(
            registry.by_template(TemplateId::Class(1)).unwrap().class(),
            ClassHandle(20)
        );
        assert_eq!(
            registry.by_template(TemplateId::Global).unwrap().class(),
            ClassHandle(99)
        );
        assert!(registry.by_template(TemplateId::Class(2)).is_none());
    }

    #[test]
    fn frozen_registry_rejects_registration_and_recompilation() {
        let mut registry = Registry::new();
        registry.freeze().unwrap();
        assert!(matches!(
            registry.register_class(ClassHandle(1)),
            Err(BridgeError::RegistryFrozen)
        ));
        assert!(matches!(
            registry.register_global(ClassHandle(1), InstanceHandle(1)),
            Err(BridgeError::RegistryFrozen)
        ));
        assert!(matches!(registry.freeze(), Err(BridgeError::AlreadyCompiled)));
    }
}
