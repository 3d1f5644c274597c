//! Typed access to the script-side interception kit
//!
//! The kit is a frozen object produced by `prelude.js`. It owns every
//! script-visible table (templates, bindings, record handles); native code
//! reaches it only through the wrappers below.

use rquickjs::{Array, Ctx, FromJs, Function, IntoJs, Object, Value};

pub(crate) const PRELUDE: &str = include_str!("prelude.js");

#[derive(Clone, Debug)]
pub(crate) struct Kit<'js> {
    object: Object<'js>,
}

impl<'js> Kit<'js> {
    pub fn new(object: Object<'js>) -> Self {
        Self { object }
    }

    /// Evaluate the prelude and hand it the native entry points in `host`.
    pub fn install(ctx: &Ctx<'js>, host: Object<'js>) -> rquickjs::Result<Self> {
        let factory: Function<'js> = ctx.eval(PRELUDE)?;
        let object: Object<'js> = factory.call((host,))?;
        Ok(Self::new(object))
    }

    pub fn object(&self) -> &Object<'js> {
        &self.object
    }

    fn invoke<A, R>(&self, name: &str, args: A) -> rquickjs::Result<R>
    where
        A: rquickjs::function::IntoArgs<'js>,
        R: FromJs<'js>,
    {
        let method: Function<'js> = self.object.get(name)?;
        method.call(args)
    }

    pub fn create_template(&self, indexed: bool) -> rquickjs::Result<i32> {
        self.invoke("createTemplate", (indexed,))
    }

    pub fn prototype(&self, template: i32) -> rquickjs::Result<Object<'js>> {
        self.invoke("prototype", (template,))
    }

    pub fn define_field(
        &self,
        target: &Object<'js>,
        template: i32,
        name: &str,
        slot: i32,
    ) -> rquickjs::Result<()> {
        self.invoke("defineField", (target.clone(), template, name, slot))
    }

    pub fn define_property(
        &self,
        target: &Object<'js>,
        template: i32,
        name: &str,
        slot: i32,
        readable: bool,
        writable: bool,
    ) -> rquickjs::Result<()> {
        self.invoke(
            "defineProperty",
            (target.clone(), template, name, slot, readable, writable),
        )
    }

    pub fn define_method(
        &self,
        target: &Object<'js>,
        template: i32,
        name: &str,
        slot: i32,
    ) -> rquickjs::Result<()> {
        self.invoke("defineMethod", (target.clone(), template, name, slot))
    }

    pub fn define_constant(&self, target: &Object<'js>, name: &str, value: i32) -> rquickjs::Result<()> {
        self.invoke("defineConstant", (target.clone(), name, value))
    }

    pub fn instantiate(&self, template: i32, binding: i32) -> rquickjs::Result<Object<'js>> {
        self.invoke("instantiate", (template, binding))
    }

    pub fn bind_global(&self, binding: i32) -> rquickjs::Result<()> {
        self.invoke("bindGlobal", (binding,))
    }

    pub fn interface_object(&self, binding: i32) -> rquickjs::Result<Object<'js>> {
        self.invoke("interfaceObject", (binding,))
    }

    pub fn interface_function(&self, binding: i32, name: &str) -> rquickjs::Result<Function<'js>> {
        self.invoke("interfaceFunction", (binding, name))
    }

    pub fn external(&self, binding: i32) -> rquickjs::Result<Object<'js>> {
        self.invoke("external", (binding,))
    }

    /// Binding id attached to `value`, or `None` for anything unbound.
    pub fn lookup(&self, value: &Value<'js>) -> rquickjs::Result<Option<i32>> {
        let id: i32 = self.invoke("lookup", (value.clone(),))?;
        Ok((id >= 0).then_some(id))
    }

    pub fn wrap_record(&self, object: &Object<'js>) -> rquickjs::Result<Object<'js>> {
        self.invoke("wrapRecord", (object.clone(),))
    }

    pub fn unwrap_record(&self, value: &Value<'js>) -> rquickjs::Result<Option<Object<'js>>> {
        self.invoke("unwrapRecord", (value.clone(),))
    }

    /// Define-semantics write; `false` when the object refuses the field.
    pub fn define_data<V>(&self, object: &Object<'js>, name: &str, value: V) -> rquickjs::Result<bool>
    where
        V: IntoJs<'js>,
    {
        self.invoke("defineData", (object.clone(), name, value))
    }

    pub fn read_field(&self, object: &Object<'js>, name: &str) -> rquickjs::Result<Option<Value<'js>>> {
        let slot: Option<Object<'js>> = self.invoke("readField", (object.clone(), name))?;
        slot.map(|slot| slot.get("value")).transpose()
    }

    pub fn field_names(&self, object: &Object<'js>) -> rquickjs::Result<Vec<String>> {
        let names: Array<'js> = self.invoke("fieldNames", (object.clone(),))?;
        names.iter::<String>().collect()
    }
}
