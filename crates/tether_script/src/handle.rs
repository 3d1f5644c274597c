//! Opaque host handles carried across the script boundary
//!
//! The bridge never dereferences any of these. They are identity tokens the
//! host hands out when registering or returning objects, and receives back
//! unchanged inside dispatch events.

use std::fmt;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl $name {
            /// Return the raw bits backing this handle.
            #[inline]
            pub fn to_bits(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(bits: u64) -> Self {
                $name(bits)
            }
        }

        impl From<$name> for u64 {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

opaque_handle!(
    /// A live host object. Also used as the pointer of a late-bound interface
    /// and as the payload of external record fields.
    InstanceHandle
);

opaque_handle!(
    /// A host class. Unique and stable for the lifetime of the process.
    ClassHandle
);

opaque_handle!(
    /// Invocation handle attached to a registered method.
    MethodHandle
);

opaque_handle!(
    /// Owning capability of a computed property.
    CapabilityHandle
);

/// Identity of a host instance exposed through a registered class.
///
/// Both halves are supplied together and can never be changed afterwards,
/// so a script object is either bound to a complete pair or to nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InstanceBinding {
    instance: InstanceHandle,
    class: ClassHandle,
}

impl InstanceBinding {
    pub fn new(instance: InstanceHandle, class: ClassHandle) -> Self {
        Self { instance, class }
    }

    #[inline]
    pub fn instance(self) -> InstanceHandle {
        self.instance
    }

    #[inline]
    pub fn class(self) -> ClassHandle {
        self.class
    }
}

/// Everything a script-side object can be bound to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Instance of a registered class.
    Instance(InstanceBinding),
    /// Late-bound interface object; resolved by name at access time.
    Interface(InstanceHandle),
    /// Inert handle stored in a record field.
    External(InstanceHandle),
}

impl Binding {
    /// Host instance this binding refers to.
    pub fn instance(self) -> InstanceHandle {
        match self {
            Binding::Instance(binding) => binding.instance(),
            Binding::Interface(instance) | Binding::External(instance) => instance,
        }
    }

    /// Class of the bound instance, present only for registered classes.
    pub fn class(self) -> Option<ClassHandle> {
        match self {
            Binding::Instance(binding) => Some(binding.class()),
            Binding::Interface(_) | Binding::External(_) => None,
        }
    }
}
