//! `console` routed to tracing

use crate::coerce;
use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Object, Value};

fn join<'js>(ctx: &Ctx<'js>, values: &[Value<'js>]) -> String {
    values
        .iter()
        .map(|value| coerce::to_string(ctx, value))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn install<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;

    console.set(
        "log",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
            tracing::info!(target: "script.console", "{}", join(&ctx, &args.0));
        })?,
    )?;
    console.set(
        "info",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
            tracing::info!(target: "script.console", "{}", join(&ctx, &args.0));
        })?,
    )?;
    console.set(
        "warn",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
            tracing::warn!(target: "script.console", "{}", join(&ctx, &args.0));
        })?,
    )?;
    console.set(
        "error",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
            tracing::error!(target: "script.console", "{}", join(&ctx, &args.0));
        })?,
    )?;
    console.set(
        "debug",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
            tracing::debug!(target: "script.console", "{}", join(&ctx, &args.0));
        })?,
    )?;
    console.set(
        "assert",
        Function::new(ctx.clone(), |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
            let holds = args
                .0
                .first()
                .map(|condition| coerce::to_boolean(&ctx, condition))
                .unwrap_or(false);
            if !holds {
                let detail = join(&ctx, args.0.get(1..).unwrap_or_default());
                tracing::error!(target: "script.console", "assertion failed: {}", detail);
            }
        })?,
    )?;

    ctx.globals().set("console", console)?;
    Ok(())
}
