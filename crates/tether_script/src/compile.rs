//! Template compilation: descriptors become prototypes and accessors

use crate::coerce;
use crate::descriptor::ClassDescriptor;
use crate::error::BridgeError;
use crate::handle::Binding;
use crate::registry::Registry;
use crate::scope::Scope;
use rquickjs::Object;

/// Install every descriptor of a frozen registry into the kit.
///
/// Class templates are created in registry order so the kit's template
/// index equals the descriptor's template id. The global descriptor is
/// installed directly on the global object. The first member the runtime
/// refuses to define aborts compilation with an error naming it.
pub(crate) fn compile_registry<'js>(scope: &Scope<'js>, registry: &Registry) -> Result<(), BridgeError> {
    let kit = scope.kit();
    let ctx = scope.ctx();

    for descriptor in registry.classes() {
        let Some(template) = descriptor.template() else {
            continue;
        };
        let created = kit
            .create_template(descriptor.has_indexed_access())
            .map_err(|err| coerce::script_error(ctx, err))?;
        debug_assert_eq!(created, template.to_js());
        let prototype = kit.prototype(created).map_err(|err| coerce::script_error(ctx, err))?;
        install_members(scope, &prototype, created, descriptor)?;
        tracing::debug!(
            class = %descriptor.class(),
            %template,
            fields = descriptor.fields().len(),
            properties = descriptor.properties().len(),
            methods = descriptor.methods().len(),
            indexed = descriptor.has_indexed_access(),
            "compiled class template"
        );
    }

    if let (Some(descriptor), Some(binding)) = (registry.global(), registry.global_binding()) {
        let globals = ctx.globals();
        let template = descriptor.template().map(|id| id.to_js()).unwrap_or(-1);
        install_members(scope, &globals, template, descriptor)?;
        let id = scope.bridge().intern(Binding::Instance(binding));
        kit.bind_global(id).map_err(|err| coerce::script_error(ctx, err))?;
        tracing::debug!(class = %descriptor.class(), "compiled global template");
    }

    Ok(())
}

fn install_members<'js>(
    scope: &Scope<'js>,
    target: &Object<'js>,
    template: i32,
    descriptor: &ClassDescriptor,
) -> Result<(), BridgeError> {
    let kit = scope.kit();
    let rejected = |member: &str, err: rquickjs::Error| BridgeError::MemberRejected {
        class: descriptor.class(),
        member: member.to_string(),
        message: coerce::describe_error(scope.ctx(), &err),
    };

    for (slot, name) in descriptor.fields().iter().enumerate() {
        kit.define_field(target, template, name, slot as i32)
            .map_err(|err| rejected(name.as_str(), err))?;
    }
    for (slot, property) in descriptor.properties().iter().enumerate() {
        kit.define_property(
            target,
            template,
            property.name(),
            slot as i32,
            property.is_readable(),
            property.is_writable(),
        )
        .map_err(|err| rejected(property.name(), err))?;
    }
    for (slot, method) in descriptor.methods().iter().enumerate() {
        kit.define_method(target, template, method.name(), slot as i32)
            .map_err(|err| rejected(method.name(), err))?;
    }
    for constant in descriptor.enum_constants() {
        kit.define_constant(target, constant.name(), constant.value())
            .map_err(|err| rejected(constant.name(), err))?;
    }
    Ok(())
}
