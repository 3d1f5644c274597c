//! Native entry points called by the interception kit
//!
//! Every entry receives the kit as its first argument, so no script value
//! is ever captured by a native closure. The receiver's binding and the
//! member identity are resolved here, an event is built, the single
//! callback for its kind runs, and the event is completed or raised.

use crate::bridge::Bridge;
use crate::callbacks::EventKind;
use crate::descriptor::{ClassDescriptor, TemplateId};
use crate::error::BridgeError;
use crate::event::{CallTarget, Completion, GetterEvent, Identity, Member, MethodEvent, SetterEvent};
use crate::handle::Binding;
use crate::kit::Kit;
use crate::scope::Scope;
use rquickjs::{Array, Ctx, Function, Object, Value};
use std::rc::Rc;

/// Object handed to the prelude as `host`.
pub(crate) fn host_object<'js>(ctx: &Ctx<'js>, bridge: &Rc<Bridge>) -> rquickjs::Result<Object<'js>> {
    let host = Object::new(ctx.clone())?;

    let b = bridge.clone();
    host.set(
        "fieldGet",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, kit: Object<'js>, receiver: Value<'js>, template: i32, slot: i32| {
                let scope = Scope::new(ctx, Kit::new(kit), b.clone());
                member_get(&scope, EventKind::FieldGetter, receiver, template, slot)
            },
        )?,
    )?;

    let b = bridge.clone();
    host.set(
        "fieldSet",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  kit: Object<'js>,
                  receiver: Value<'js>,
                  template: i32,
                  slot: i32,
                  value: Value<'js>| {
                let scope = Scope::new(ctx, Kit::new(kit), b.clone());
                member_set(&scope, EventKind::FieldSetter, receiver, template, slot, value)
            },
        )?,
    )?;

    let b = bridge.clone();
    host.set(
        "get",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, kit: Object<'js>, receiver: Value<'js>, template: i32, slot: i32| {
                let scope = Scope::new(ctx, Kit::new(kit), b.clone());
                member_get(&scope, EventKind::Getter, receiver, template, slot)
            },
        )?,
    )?;

    let b = bridge.clone();
    host.set(
        "set",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  kit: Object<'js>,
                  receiver: Value<'js>,
                  template: i32,
                  slot: i32,
                  value: Value<'js>| {
                let scope = Scope::new(ctx, Kit::new(kit), b.clone());
                member_set(&scope, EventKind::Setter, receiver, template, slot, value)
            },
        )?,
    )?;

    let b = bridge.clone();
    host.set(
        "call",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  kit: Object<'js>,
                  receiver: Value<'js>,
                  template: i32,
                  slot: i32,
                  args: Array<'js>| {
                let scope = Scope::new(ctx, Kit::new(kit), b.clone());
                method_call(&scope, receiver, template, slot, args)
            },
        )?,
    )?;

    let b = bridge.clone();
    host.set(
        "indexGet",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, kit: Object<'js>, receiver: Value<'js>, index: f64| {
                let scope = Scope::new(ctx, Kit::new(kit), b.clone());
                index_get(&scope, receiver, index)
            },
        )?,
    )?;

    let b = bridge.clone();
    host.set(
        "indexSet",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, kit: Object<'js>, receiver: Value<'js>, index: f64, value: Value<'js>| {
                let scope = Scope::new(ctx, Kit::new(kit), b.clone());
                index_set(&scope, receiver, index, value)
            },
        )?,
    )?;

    let b = bridge.clone();
    host.set(
        "interfaceGet",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, kit: Object<'js>, receiver: Value<'js>, name: String| {
                let scope = Scope::new(ctx, Kit::new(kit), b.clone());
                interface_get(&scope, receiver, name)
            },
        )?,
    )?;

    let b = bridge.clone();
    host.set(
        "interfaceSet",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, kit: Object<'js>, receiver: Value<'js>, name: String, value: Value<'js>| {
                let scope = Scope::new(ctx, Kit::new(kit), b.clone());
                interface_set(&scope, receiver, name, value)
            },
        )?,
    )?;

    let b = bridge.clone();
    host.set(
        "interfaceCall",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  kit: Object<'js>,
                  receiver: Value<'js>,
                  binding: i32,
                  name: String,
                  args: Array<'js>| {
                let scope = Scope::new(ctx, Kit::new(kit), b.clone());
                interface_call(&scope, receiver, binding, name, args)
            },
        )?,
    )?;

    Ok(host)
}

/// Turn a bridge failure into a pending script exception.
fn raise<'js>(scope: &Scope<'js>, err: BridgeError) -> rquickjs::Error {
    match err {
        BridgeError::Js(err) => err,
        BridgeError::Script { message } => scope.throw_message(&message),
        other => scope.throw_message(&other.to_string()),
    }
}

fn complete<'js, T>(scope: &Scope<'js>, kind: EventKind, outcome: Result<T, Completion>) -> rquickjs::Result<T> {
    match outcome {
        Ok(value) => Ok(value),
        Err(Completion::Raise(message)) => {
            tracing::debug!(%kind, message = %message, "dispatch raised an error");
            Err(scope.throw_message(&message))
        }
        Err(Completion::Failed(err)) => Err(raise(scope, err)),
    }
}

fn template_of<'js>(scope: &Scope<'js>, template: i32) -> rquickjs::Result<TemplateId> {
    TemplateId::from_js(template).ok_or_else(|| scope.throw_message(&format!("unknown template {template}")))
}

fn descriptor<'a, 'js>(scope: &'a Scope<'js>, template: TemplateId) -> rquickjs::Result<&'a ClassDescriptor> {
    scope
        .bridge()
        .descriptor(template)
        .ok_or_else(|| scope.throw_message(&format!("{template} is not compiled")))
}

/// Binding of the receiver of a registered-class member. Global members
/// always resolve to the global instance; anything else must be bound to
/// an instance of the member's own class.
fn receiver_binding<'js>(
    scope: &Scope<'js>,
    receiver: &Value<'js>,
    template: TemplateId,
    descriptor: &ClassDescriptor,
) -> Result<Option<Binding>, BridgeError> {
    if template == TemplateId::Global {
        return Ok(scope.bridge().global_binding().map(Binding::Instance));
    }
    let binding = scope.binding_of(receiver)?;
    Ok(binding.filter(|binding| binding.class() == Some(descriptor.class())))
}

fn member_identity<'js>(
    scope: &Scope<'js>,
    kind: EventKind,
    receiver: Value<'js>,
    template: i32,
    slot: i32,
) -> rquickjs::Result<Identity<'js>> {
    let template = template_of(scope, template)?;
    let descriptor = descriptor(scope, template)?;
    let slot = usize::try_from(slot).unwrap_or(usize::MAX);

    let member = match kind {
        EventKind::FieldGetter | EventKind::FieldSetter => {
            descriptor.fields().get(slot).map(|name| Member::Field(name.clone()))
        }
        EventKind::Getter | EventKind::Setter => descriptor.properties().get(slot).map(|property| Member::Property {
            name: property.name().to_string(),
            capability: property.capability(),
        }),
        EventKind::Method => descriptor.methods().get(slot).map(|method| {
            Member::Call(CallTarget::Registered {
                handle: method.handle(),
                name: method.name().to_string(),
            })
        }),
        _ => None,
    };
    let Some(member) = member else {
        return Err(scope.throw_message(&format!("{template} has no {kind} in slot {slot}")));
    };

    let binding = receiver_binding(scope, &receiver, template, descriptor).map_err(|err| raise(scope, err))?;
    let class = Some(descriptor.class());

    Ok(Identity {
        scope: scope.clone(),
        kind,
        holder: receiver,
        binding,
        class,
        member,
    })
}

fn run_getter<'js>(scope: &Scope<'js>, identity: Identity<'js>) -> rquickjs::Result<Value<'js>> {
    let kind = identity.kind;
    tracing::trace!(%kind, "dispatch");
    let callback = scope.bridge().callbacks().borrow_mut().getter(kind);
    let mut event = GetterEvent::new(identity);
    if let Some(callback) = callback {
        callback(&mut event);
    }
    complete(scope, kind, event.finish())
}

fn run_setter<'js>(scope: &Scope<'js>, identity: Identity<'js>, value: Value<'js>) -> rquickjs::Result<()> {
    let kind = identity.kind;
    tracing::trace!(%kind, "dispatch");
    let callback = scope.bridge().callbacks().borrow_mut().setter(kind);
    let mut event = SetterEvent::new(identity, value);
    if let Some(callback) = callback {
        callback(&mut event);
    }
    complete(scope, kind, event.finish())
}

fn run_method<'js>(scope: &Scope<'js>, identity: Identity<'js>, args: Array<'js>) -> rquickjs::Result<Value<'js>> {
    let kind = identity.kind;
    tracing::trace!(%kind, "dispatch");
    let args = args.iter::<Value<'js>>().collect::<rquickjs::Result<Vec<_>>>()?;
    let callback = scope.bridge().callbacks().borrow_mut().method(kind);
    let mut event = MethodEvent::new(identity, args);
    if let Some(callback) = callback {
        callback(&mut event);
    }
    complete(scope, kind, event.finish())
}

fn member_get<'js>(
    scope: &Scope<'js>,
    kind: EventKind,
    receiver: Value<'js>,
    template: i32,
    slot: i32,
) -> rquickjs::Result<Value<'js>> {
    let identity = member_identity(scope, kind, receiver, template, slot)?;
    run_getter(scope, identity)
}

fn member_set<'js>(
    scope: &Scope<'js>,
    kind: EventKind,
    receiver: Value<'js>,
    template: i32,
    slot: i32,
    value: Value<'js>,
) -> rquickjs::Result<()> {
    let identity = member_identity(scope, kind, receiver, template, slot)?;
    run_setter(scope, identity, value)
}

fn method_call<'js>(
    scope: &Scope<'js>,
    receiver: Value<'js>,
    template: i32,
    slot: i32,
    args: Array<'js>,
) -> rquickjs::Result<Value<'js>> {
    let identity = member_identity(scope, EventKind::Method, receiver, template, slot)?;
    run_method(scope, identity, args)
}

fn indexed_identity<'js>(
    scope: &Scope<'js>,
    kind: EventKind,
    receiver: Value<'js>,
    index: f64,
) -> rquickjs::Result<Identity<'js>> {
    let binding = scope
        .binding_of(&receiver)
        .map_err(|err| raise(scope, err))?
        .filter(|binding| matches!(binding, Binding::Instance(_)));
    Ok(Identity {
        scope: scope.clone(),
        kind,
        holder: receiver,
        binding,
        class: binding.and_then(Binding::class),
        member: Member::Index(index as u32),
    })
}

fn index_get<'js>(scope: &Scope<'js>, receiver: Value<'js>, index: f64) -> rquickjs::Result<Value<'js>> {
    let identity = indexed_identity(scope, EventKind::IndexedGetter, receiver, index)?;
    run_getter(scope, identity)
}

fn index_set<'js>(scope: &Scope<'js>, receiver: Value<'js>, index: f64, value: Value<'js>) -> rquickjs::Result<()> {
    let identity = indexed_identity(scope, EventKind::IndexedSetter, receiver, index)?;
    run_setter(scope, identity, value)
}

fn interface_identity<'js>(
    scope: &Scope<'js>,
    kind: EventKind,
    receiver: Value<'js>,
    binding: Option<Binding>,
    member: Member,
) -> Identity<'js> {
    Identity {
        scope: scope.clone(),
        kind,
        holder: receiver,
        binding: binding.filter(|binding| matches!(binding, Binding::Interface(_))),
        class: None,
        member,
    }
}

fn interface_get<'js>(scope: &Scope<'js>, receiver: Value<'js>, name: String) -> rquickjs::Result<Value<'js>> {
    let binding = scope.binding_of(&receiver).map_err(|err| raise(scope, err))?;
    let identity = interface_identity(scope, EventKind::InterfaceGetter, receiver, binding, Member::Named(name));
    run_getter(scope, identity)
}

fn interface_set<'js>(
    scope: &Scope<'js>,
    receiver: Value<'js>,
    name: String,
    value: Value<'js>,
) -> rquickjs::Result<()> {
    let binding = scope.binding_of(&receiver).map_err(|err| raise(scope, err))?;
    let identity = interface_identity(scope, EventKind::InterfaceSetter, receiver, binding, Member::Named(name));
    run_setter(scope, identity, value)
}

fn interface_call<'js>(
    scope: &Scope<'js>,
    receiver: Value<'js>,
    binding: i32,
    name: String,
    args: Array<'js>,
) -> rquickjs::Result<Value<'js>> {
    let Some(Binding::Interface(interface)) = scope.bridge().binding(binding) else {
        return Err(scope.throw_message(&format!("interface function '{name}' lost its binding")));
    };
    let target = CallTarget::Interface { interface, name };
    let identity = interface_identity(
        scope,
        EventKind::InterfaceMethod,
        receiver,
        Some(Binding::Interface(interface)),
        Member::Call(target),
    );
    run_method(scope, identity, args)
}
