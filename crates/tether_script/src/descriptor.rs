use crate::error::BridgeError;
use crate::handle::{CapabilityHandle, ClassHandle, MethodHandle};
use std::collections::HashSet;
use std::fmt;

/// Compiled form of a descriptor inside the interception kit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TemplateId {
    Class(u32),
    Global,
}

impl TemplateId {
    const GLOBAL_SLOT: i32 = -1;

    /// Encoding used on the script side of the kit.
    pub(crate) fn to_js(self) -> i32 {
        match self {
            TemplateId::Class(index) => index as i32,
            TemplateId::Global => Self::GLOBAL_SLOT,
        }
    }

    pub(crate) fn from_js(raw: i32) -> Option<Self> {
        match raw {
            Self::GLOBAL_SLOT => Some(TemplateId::Global),
            index if index >= 0 => Some(TemplateId::Class(index as u32)),
            _ => None,
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateId::Class(index) => write!(f, "class#{index}"),
            TemplateId::Global => f.write_str("global"),
        }
    }
}

/// A computed property and its access flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDescriptor {
    name: String,
    capability: CapabilityHandle,
    readable: bool,
    writable: bool,
}

impl PropertyDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capability(&self) -> CapabilityHandle {
        self.capability
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

/// A method and the handle the host uses to invoke it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    handle: MethodHandle,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> MethodHandle {
        self.handle
    }
}

/// Named integer constant exposed alongside a class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumConstant {
    name: String,
    value: i32,
}

impl EnumConstant {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> i32 {
        self.value
    }
}

/// Script-visible surface of one host class.
///
/// Descriptors are open for mutation until the engine compiles its
/// templates. Every member name is unique within a descriptor, so each
/// member stays independently reachable once compiled.
#[derive(Clone, Debug)]
pub struct ClassDescriptor {
    class: ClassHandle,
    fields: Vec<String>,
    properties: Vec<PropertyDescriptor>,
    methods: Vec<MethodDescriptor>,
    enums: Vec<EnumConstant>,
    indexed: bool,
    template: Option<TemplateId>,
    names: HashSet<String>,
}

impl ClassDescriptor {
    pub(crate) fn new(class: ClassHandle) -> Self {
        Self {
            class,
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            enums: Vec::new(),
            indexed: false,
            template: None,
            names: HashSet::new(),
        }
    }

    /// Declare a plain field, dispatched to the field getter/setter events.
    pub fn add_field(&mut self, name: impl Into<String>) -> Result<&mut Self, BridgeError> {
        let name = self.claim(name.into())?;
        self.fields.push(name);
        Ok(self)
    }

    /// Declare a computed property with independent read/write access.
    pub fn add_property(
        &mut self,
        name: impl Into<String>,
        capability: CapabilityHandle,
        readable: bool,
        writable: bool,
    ) -> Result<&mut Self, BridgeError> {
        let name = self.claim(name.into())?;
        self.properties.push(PropertyDescriptor {
            name,
            capability,
            readable,
            writable,
        });
        Ok(self)
    }

    /// Declare a method; `handle` travels with every call to it.
    pub fn add_method(
        &mut self,
        name: impl Into<String>,
        handle: MethodHandle,
    ) -> Result<&mut Self, BridgeError> {
        let name = self.claim(name.into())?;
        self.methods.push(MethodDescriptor { name, handle });
        Ok(self)
    }

    /// Declare a read-only integer constant.
    pub fn add_enum_constant(
        &mut self,
        name: impl Into<String>,
        value: i32,
    ) -> Result<&mut Self, BridgeError> {
        let name = self.claim(name.into())?;
        self.enums.push(EnumConstant { name, value });
        Ok(self)
    }

    /// Route integer-keyed access to the indexed getter/setter events.
    pub fn set_indexed_access(&mut self, enabled: bool) -> Result<&mut Self, BridgeError> {
        self.ensure_open()?;
        self.indexed = enabled;
        Ok(self)
    }

    pub fn class(&self) -> ClassHandle {
        self.class
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn enum_constants(&self) -> &[EnumConstant] {
        &self.enums
    }

    pub fn has_indexed_access(&self) -> bool {
        self.indexed
    }

    /// Compiled template, present once the engine has frozen the registry.
    pub fn template(&self) -> Option<TemplateId> {
        self.template
    }

    pub fn is_frozen(&self) -> bool {
        self.template.is_some()
    }

    pub(crate) fn freeze(&mut self, template: TemplateId) {
        self.template = Some(template);
    }

    fn ensure_open(&self) -> Result<(), BridgeError> {
        if self.is_frozen() {
            return Err(BridgeError::RegistryFrozen);
        }
        Ok(())
    }

    fn claim(&mut self, name: String) -> Result<String, BridgeError> {
        self.ensure_open()?;
        if name.is_empty() {
            return Err(BridgeError::EmptyMemberName { class: self.class });
        }
        if !self.names.insert(name.clone()) {
            return Err(BridgeError::DuplicateMember {
                class: self.class,
                name,
            });
        }
        Ok(name)
    }
}
