//! Permissive JS-to-host conversions

use crate::error::BridgeError;
use rquickjs::convert::Coerced;
use rquickjs::{Ctx, FromJs, Value};

/// Apply the runtime's standard conversion for `T`, returning `None` when
/// the conversion throws. The pending exception is cleared so the engine
/// is left in a consistent state.
pub(crate) fn coerce<'js, T>(ctx: &Ctx<'js>, value: &Value<'js>) -> Option<T>
where
    Coerced<T>: FromJs<'js>,
{
    match Coerced::<T>::from_js(ctx, value.clone()) {
        Ok(Coerced(converted)) => Some(converted),
        Err(err) => {
            if matches!(err, rquickjs::Error::Exception) {
                let _ = ctx.catch();
            }
            tracing::trace!(error = %err, "coercion failed; using default");
            None
        }
    }
}

/// ToNumber, with `undefined` reading as zero.
pub(crate) fn to_number<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> f64 {
    if value.is_undefined() {
        return 0.0;
    }
    coerce::<f64>(ctx, value).unwrap_or(0.0)
}

pub(crate) fn to_int32<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> i32 {
    coerce::<i32>(ctx, value).unwrap_or(0)
}

pub(crate) fn to_boolean<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> bool {
    coerce::<bool>(ctx, value).unwrap_or(false)
}

pub(crate) fn to_string<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    coerce::<String>(ctx, value).unwrap_or_default()
}

/// Human-readable form of a thrown value: strings as-is, otherwise the
/// `message` property, otherwise ToString.
pub(crate) fn describe_exception<'js>(ctx: &Ctx<'js>, thrown: &Value<'js>) -> String {
    if let Some(text) = thrown.as_string() {
        if let Ok(text) = text.to_string() {
            return text;
        }
    }
    if let Some(object) = thrown.as_object() {
        if let Ok(message) = object.get::<_, Value<'js>>("message") {
            if !message.is_undefined() {
                return to_string(ctx, &message);
            }
        }
    }
    to_string(ctx, thrown)
}

/// Take the pending exception and describe it.
pub(crate) fn take_exception<'js>(ctx: &Ctx<'js>) -> String {
    let thrown = ctx.catch();
    describe_exception(ctx, &thrown)
}

/// Describe a failed runtime call, consuming the pending exception if any.
pub(crate) fn describe_error<'js>(ctx: &Ctx<'js>, err: &rquickjs::Error) -> String {
    if matches!(err, rquickjs::Error::Exception) {
        take_exception(ctx)
    } else {
        err.to_string()
    }
}

/// Turn a failed runtime call into a bridge error, taking the pending
/// exception so its message survives.
pub(crate) fn script_error<'js>(ctx: &Ctx<'js>, err: rquickjs::Error) -> BridgeError {
    match err {
        rquickjs::Error::Exception => BridgeError::Script {
            message: take_exception(ctx),
        },
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    fn with_ctx(f: impl for<'js> FnOnce(Ctx<'js>)) {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(f);
    }

    #[test]
    fn numbers_follow_standard_conversion() {
        with_ctx(|ctx| {
            let text: Value = ctx.eval("'12.5'").unwrap();
            assert_eq!(to_number(&ctx, &text), 12.5);
            assert_eq!(to_int32(&ctx, &text), 12);

            let undefined = Value::new_undefined(ctx.clone());
            assert_eq!(to_number(&ctx, &undefined), 0.0);
            assert!(!to_boolean(&ctx, &undefined));
            assert_eq!(to_string(&ctx, &undefined), "undefined");
        });
    }

    #[test]
    fn throwing_conversion_defaults_and_clears_the_exception() {
        with_ctx(|ctx| {
            let hostile: Value = ctx
                .eval("({ valueOf() { throw new Error('nope'); } })")
                .unwrap();
            assert_eq!(to_number(&ctx, &hostile), 0.0);
            let after: i32 = ctx.eval("1 + 1").unwrap();
            assert_eq!(after, 2);
        });
    }

    #[test]
    fn exceptions_are_described_by_message_or_text() {
        with_ctx(|ctx| {
            let error: Value = ctx.eval("new TypeError('bad input')").unwrap();
            assert_eq!(describe_exception(&ctx, &error), "bad input");

            let text: Value = ctx.eval("'boom'").unwrap();
            assert_eq!(describe_exception(&ctx, &text), "boom");

            let number: Value = ctx.eval("42").unwrap();
            assert_eq!(describe_exception(&ctx, &number), "42");
        });
    }
}
