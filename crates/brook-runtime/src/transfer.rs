//! Moving values between engine instances.
//!
//! Instances never share a heap. Primitives and strings are copied, arrays
//! and objects are copied structurally, error objects are recreated with the
//! same name and message, and functions become proxies that enter the
//! instance owning the original to run it.
//!
//! Objects whose prototype is not `Object.prototype` (class instances,
//! `Date`, `Map`, ...) also get a proxy for every method found on their
//! prototype chain, bound to the original object. A proxy releases the
//! function it stands for when the engine holding it collects it.

use std::collections::HashSet;
use std::rc::{Rc, Weak};

use rquickjs::function::{Rest, This};
use rquickjs::{Array, Ctx, Exception, Filter, IntoJs, Object, Type, Value};

use crate::bindings::native;
use crate::error::RuntimeError;
use crate::instance::{EngineInstance, InstanceId};

/// Deepest nesting copied before giving up (also stops cycles).
pub const MAX_TRANSFER_DEPTH: usize = 64;

/// Copies values owned by `source` into `dest`.
pub(crate) struct Transfer {
    source: Rc<EngineInstance>,
    dest: Rc<EngineInstance>,
}

impl Transfer {
    pub(crate) fn new(source: Rc<EngineInstance>, dest: Rc<EngineInstance>) -> Self {
        Self { source, dest }
    }

    /// Copy `value` from the source context into the destination context.
    pub(crate) fn copy<'f, 't>(
        &self,
        from: &Ctx<'f>,
        to: &Ctx<'t>,
        value: Value<'f>,
    ) -> Result<Value<'t>, RuntimeError> {
        self.copy_value(from, to, value, None, 0)
    }

    fn copy_value<'f, 't>(
        &self,
        from: &Ctx<'f>,
        to: &Ctx<'t>,
        value: Value<'f>,
        this: Option<&Value<'f>>,
        depth: usize,
    ) -> Result<Value<'t>, RuntimeError> {
        if depth > MAX_TRANSFER_DEPTH {
            return Err(RuntimeError::InvalidArgument(format!(
                "value nested deeper than {MAX_TRANSFER_DEPTH} levels cannot cross instances"
            )));
        }

        if value.is_undefined() {
            return Ok(Value::new_undefined(to.clone()));
        }
        if value.is_null() {
            return Ok(Value::new_null(to.clone()));
        }
        if let Some(b) = value.as_bool() {
            return Ok(Value::new_bool(to.clone(), b));
        }
        if let Some(i) = value.as_int() {
            return Ok(Value::new_int(to.clone(), i));
        }
        if let Some(f) = value.as_float() {
            return Ok(Value::new_float(to.clone(), f));
        }
        if let Some(s) = value.as_string() {
            return Ok(s.to_string()?.into_js(to)?);
        }
        if let Some(function) = value.as_function() {
            let slot = self.source.retain_function(from, function.clone(), this.cloned());
            return self.proxy(to, slot);
        }
        if let Some(array) = value.as_array() {
            let copy = Array::new(to.clone())?;
            for (index, item) in array.iter::<Value>().enumerate() {
                copy.set(index, self.copy_value(from, to, item?, None, depth + 1)?)?;
            }
            return Ok(copy.into_value());
        }
        if value.type_of() == Type::Promise {
            return Err(RuntimeError::InvalidArgument(
                "promises cannot cross instances".to_string(),
            ));
        }
        if let Some(object) = value.as_object() {
            if let Some(exception) = Exception::from_object(object.clone()) {
                return copy_error(to, &exception);
            }
            let copy = Object::new(to.clone())?;
            let mut copied = HashSet::new();
            for prop in object.props::<String, Value>() {
                let (key, item) = prop?;
                copy.set(
                    key.as_str(),
                    self.copy_value(from, to, item, Some(&value), depth + 1)?,
                )?;
                copied.insert(key);
            }
            self.copy_inherited_methods(from, to, object, &copy, copied, depth)?;
            return Ok(copy.into_value());
        }

        Err(RuntimeError::InvalidArgument(format!(
            "{:?} values cannot cross instances",
            value.type_of()
        )))
    }

    /// Proxy the methods `object` inherits from prototypes below
    /// `Object.prototype`, skipping `constructor` and shadowed names.
    fn copy_inherited_methods<'f, 't>(
        &self,
        from: &Ctx<'f>,
        to: &Ctx<'t>,
        object: &Object<'f>,
        copy: &Object<'t>,
        mut copied: HashSet<String>,
        depth: usize,
    ) -> Result<(), RuntimeError> {
        let object_prototype = Object::new(from.clone())?.get_prototype();
        let receiver = object.as_value();

        let mut prototype = object.get_prototype();
        while let Some(current) = prototype {
            if object_prototype.as_ref().map(Object::as_value) == Some(current.as_value()) {
                break;
            }
            for key in current.own_keys::<String>(Filter::new().string()) {
                let key = key?;
                if key == "constructor" || !copied.insert(key.clone()) {
                    continue;
                }
                let item: Value = object.get(key.as_str())?;
                if item.is_function() {
                    let method = self.copy_value(from, to, item, Some(receiver), depth + 1)?;
                    copy.set(key.as_str(), method)?;
                }
            }
            prototype = current.get_prototype();
        }
        Ok(())
    }

    fn proxy<'t>(&self, to: &Ctx<'t>, slot: usize) -> Result<Value<'t>, RuntimeError> {
        let proxy = Proxy {
            target_id: self.source.id(),
            target: Rc::downgrade(&self.source),
            home: Rc::downgrade(&self.dest),
            slot,
        };
        Ok(native(move |ctx, args| proxy.call(&ctx, args)).into_js(to)?)
    }
}

fn copy_error<'f, 't>(to: &Ctx<'t>, exception: &Exception<'f>) -> Result<Value<'t>, RuntimeError> {
    let message = exception.message().unwrap_or_default();
    let name: Option<String> = exception.as_object().get("name").ok().flatten();
    let copy = Exception::from_message(to.clone(), &message)?;
    if let Some(name) = name {
        copy.as_object().set("name", name)?;
    }
    if let Some(stack) = exception.stack() {
        copy.as_object().set("stack", stack)?;
    }
    Ok(copy.into_object().into_value())
}

/// Native function standing in for a function of another instance.
struct Proxy {
    target_id: InstanceId,
    target: Weak<EngineInstance>,
    /// Instance the proxy lives in
    home: Weak<EngineInstance>,
    slot: usize,
}

impl Drop for Proxy {
    fn drop(&mut self) {
        if let Some(target) = self.target.upgrade() {
            target.release_function(self.slot);
        }
    }
}

impl Proxy {
    fn call<'c>(&self, ctx: &Ctx<'c>, args: Rest<Value<'c>>) -> rquickjs::Result<Value<'c>> {
        let (target, home) = match (self.target.upgrade(), self.home.upgrade()) {
            (Some(target), Some(home)) => (target, home),
            _ => return Err(RuntimeError::InstanceGone(self.target_id).throw(ctx)),
        };
        let inbound = Transfer::new(home.clone(), target.clone());
        let outbound = Transfer::new(target.clone(), home);

        let outcome = target.enter(|tctx| {
            let (function, this) = target.retained_function(&tctx, self.slot)?;
            let mut forwarded = Vec::with_capacity(args.0.len());
            for arg in args.0 {
                forwarded.push(inbound.copy(ctx, &tctx, arg)?);
            }
            match function.call::<_, Value>((This(this), Rest(forwarded))) {
                Ok(result) => Ok(Ok(outbound.copy(&tctx, ctx, result)?)),
                Err(rquickjs::Error::Exception) => {
                    let thrown = tctx.catch();
                    Ok(Err(outbound.copy(&tctx, ctx, thrown)?))
                }
                Err(err) => Err(err.into()),
            }
        });

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(thrown)) => Err(ctx.throw(thrown)),
            Err(err) => Err(err.throw(ctx)),
        }
    }
}
