use crate::handle::ClassHandle;
use thiserror::Error;

/// Errors surfaced to the host by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("class {class} is already registered")]
    DuplicateClass { class: ClassHandle },

    #[error("a global namespace is already registered")]
    GlobalAlreadyRegistered,

    #[error("member '{name}' is declared more than once on class {class}")]
    DuplicateMember { class: ClassHandle, name: String },

    #[error("class {class} declares a member with an empty name")]
    EmptyMemberName { class: ClassHandle },

    #[error("the class registry is frozen; templates have been compiled")]
    RegistryFrozen,

    #[error("templates have already been compiled")]
    AlreadyCompiled,

    #[error("class {class} cannot install member '{member}': {message}")]
    MemberRejected {
        class: ClassHandle,
        member: String,
        message: String,
    },

    #[error("template compilation failed earlier: {message}")]
    CompileFailed { message: String },

    #[error("class {class} is not registered")]
    ClassNotRegistered { class: ClassHandle },

    #[error("record has no field '{name}'")]
    MissingField { name: String },

    #[error("record refused to define field '{name}'")]
    FieldRejected { name: String },

    #[error("index {index} is out of range for an array of {len} values")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },

    #[error("script raised an exception: {message}")]
    Script { message: String },

    #[error(transparent)]
    Js(#[from] rquickjs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Settings(#[from] serde_json::Error),
}
