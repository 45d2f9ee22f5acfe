//! # esvm-host
//!
//! The stack-based, context-centric embedding API (spec section 6.1): the
//! surface a host application links against to push arguments, call a
//! script function, and read back results, without ever touching a
//! [`esvm_core::Value`] or a bytecode register directly.
//!
//! Modeled on the register/stack-machine embedding APIs in this
//! engine's own lineage (Lua's `lua_State`, QuickJS's `JSContext`): one
//! `Context` owns an isolate and a single flat value stack that pushes
//! and pops grow/shrink, indexed either from the bottom (`0, 1, 2, ...`)
//! or the top (`-1` is the topmost value).

pub mod error;

use std::cell::RefCell;
use std::rc::Rc;

use esvm_core::{
    ErrorKind as CoreErrorKind, FunctionData, GcRef, Isolate, IsolateConfig, JsBuffer, JsObject,
    JsString, ObjectClass, PropertyAttributes, PropertyDescriptor, PropertyKey, Value, VmError,
};

pub use error::{HostError, HostResult};

/// Maximum number of slots a [`Context`]'s value stack may grow to
/// (spec section 8, testable property 2).
pub const MAX_STACK_SIZE: usize = 1_000_000;

/// The error-kind enum exposed to a host application (spec section 6.3).
/// Each non-internal variant corresponds to a built-in JS error name a
/// thrown value's `name` property may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    UriError,
    UnimplementedError,
    InternalError,
    AllocError,
    AssertionError,
    ApiError,
    UncaughtError,
}

impl From<CoreErrorKind> for ErrorKind {
    fn from(kind: CoreErrorKind) -> Self {
        match kind {
            CoreErrorKind::Error => ErrorKind::Error,
            CoreErrorKind::EvalError => ErrorKind::EvalError,
            CoreErrorKind::RangeError => ErrorKind::RangeError,
            CoreErrorKind::ReferenceError => ErrorKind::ReferenceError,
            CoreErrorKind::SyntaxError => ErrorKind::SyntaxError,
            CoreErrorKind::TypeError => ErrorKind::TypeError,
            CoreErrorKind::UriError => ErrorKind::UriError,
            CoreErrorKind::UnimplementedError => ErrorKind::UnimplementedError,
            CoreErrorKind::InternalError => ErrorKind::InternalError,
            CoreErrorKind::AllocError => ErrorKind::AllocError,
            CoreErrorKind::AssertionError => ErrorKind::AssertionError,
            CoreErrorKind::ApiError => ErrorKind::ApiError,
            CoreErrorKind::UncaughtError => ErrorKind::UncaughtError,
        }
    }
}

/// The idiomatic-Rust rendering of a native function's C-style return
/// code (spec section 6.2): `0` -> `Undefined`, `1` -> `Value` (one
/// value already pushed), negative -> `Throw`.
pub enum CallResult {
    Undefined,
    Value(Value),
    Throw(ErrorKind, String),
}

/// `Fn(&mut Context) -> Result<CallResult, VmError>`, called with the
/// stack bottom at its first argument; `this` is reachable via
/// [`Context::push_this`].
pub type HostFn = Rc<dyn Fn(&mut Context) -> Result<CallResult, VmError>>;

/// Signature the host's fatal-error handler must implement (spec
/// section 6.5): invoked when an error has no catchpoint to propagate
/// to. Must not return.
pub type FatalHandler = Box<dyn Fn(&Context, FatalCode) -> !>;

/// Conditions severe enough to invoke the fatal handler rather than
/// propagate as a normal `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalCode {
    OutOfMemory,
    StackOverflowUnrecoverable,
    DoubleFault,
}

fn default_fatal_handler(_ctx: &Context, code: FatalCode) -> ! {
    panic!("esvm fatal error: {code:?}");
}

/// The stack-based embedding context: one [`Isolate`] plus the host API's
/// own value stack, separate from any bytecode register window (spec
/// section 4.1 describes the register stack; this is the C-API-facing
/// stack layered above it).
pub struct Context {
    pub isolate: Isolate,
    stack: RefCell<Vec<Value>>,
    fatal_handler: FatalHandler,
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(IsolateConfig::default())
    }

    pub fn with_config(config: IsolateConfig) -> Self {
        Self {
            isolate: Isolate::new(config),
            stack: RefCell::new(Vec::new()),
            fatal_handler: Box::new(default_fatal_handler),
        }
    }

    /// Installs a custom fatal-error handler (spec section 6.5); the
    /// default panics.
    pub fn set_fatal_handler(&mut self, handler: FatalHandler) {
        self.fatal_handler = handler;
    }

    pub fn fatal(&self, code: FatalCode) -> ! {
        (self.fatal_handler)(self, code)
    }

    // -----------------------------------------------------------------
    // Stack discipline
    // -----------------------------------------------------------------

    pub fn get_top(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Truncates or extends (with `undefined`) the stack to exactly
    /// `n` slots.
    pub fn set_top(&self, n: usize) {
        let mut stack = self.stack.borrow_mut();
        stack.resize(n, Value::undefined());
    }

    /// Resolves a possibly-negative index (`-1` = top) to an absolute
    /// one, or `None` if it falls outside the current stack.
    pub fn normalize_index(&self, index: i32) -> Option<usize> {
        let len = self.stack.borrow().len() as i32;
        let abs = if index < 0 { len + index } else { index };
        if abs < 0 || abs >= len { None } else { Some(abs as usize) }
    }

    pub fn require_normalize_index(&self, index: i32) -> HostResult<usize> {
        self.normalize_index(index)
            .ok_or(HostError::InvalidIndex(index))
    }

    /// `true` if `n` more slots can be pushed without exceeding
    /// [`MAX_STACK_SIZE`].
    pub fn check_stack(&self, n: usize) -> bool {
        self.stack.borrow().len() + n <= MAX_STACK_SIZE
    }

    pub fn require_stack(&self, n: usize) -> HostResult<()> {
        if self.check_stack(n) {
            Ok(())
        } else {
            Err(HostError::StackOverflow { max: MAX_STACK_SIZE })
        }
    }

    /// `true` if the top `top_n` slots are present (i.e. the stack has
    /// at least `top_n` entries).
    pub fn check_stack_top(&self, top_n: usize) -> bool {
        self.stack.borrow().len() >= top_n
    }

    pub fn require_stack_top(&self, top_n: usize) -> HostResult<()> {
        let available = self.stack.borrow().len();
        if available >= top_n {
            Ok(())
        } else {
            Err(HostError::StackUnderflow { requested: top_n, available })
        }
    }

    pub fn pop(&self, n: usize) -> HostResult<()> {
        self.require_stack_top(n)?;
        let mut stack = self.stack.borrow_mut();
        let new_len = stack.len() - n;
        stack.truncate(new_len);
        Ok(())
    }

    pub fn pop_1(&self) -> HostResult<()> {
        self.pop(1)
    }

    pub fn pop_2(&self) -> HostResult<()> {
        self.pop(2)
    }

    pub fn pop_3(&self) -> HostResult<()> {
        self.pop(3)
    }

    pub fn pop_n(&self, n: usize) -> HostResult<()> {
        self.pop(n)
    }

    /// Pushes a copy of the value at `index`.
    pub fn dup(&self, index: i32) -> HostResult<()> {
        let abs = self.require_normalize_index(index)?;
        let value = self.stack.borrow()[abs].clone();
        self.require_stack(1)?;
        self.stack.borrow_mut().push(value);
        Ok(())
    }

    /// Pops the top value and inserts it at `index`, shifting later
    /// entries up.
    pub fn insert(&self, index: i32) -> HostResult<()> {
        let abs = self.require_normalize_index(index)?;
        let mut stack = self.stack.borrow_mut();
        let top = stack.pop().ok_or(HostError::StackUnderflow { requested: 1, available: 0 })?;
        stack.insert(abs, top);
        Ok(())
    }

    /// Pops the top value and writes it over the value at `index`.
    pub fn replace(&self, index: i32) -> HostResult<()> {
        let abs = self.require_normalize_index(index)?;
        let mut stack = self.stack.borrow_mut();
        let top = stack.pop().ok_or(HostError::StackUnderflow { requested: 1, available: 0 })?;
        stack[abs] = top;
        Ok(())
    }

    /// Removes the value at `index`, shifting later entries down.
    pub fn remove(&self, index: i32) -> HostResult<()> {
        let abs = self.require_normalize_index(index)?;
        self.stack.borrow_mut().remove(abs);
        Ok(())
    }

    fn push(&self, value: Value) -> HostResult<()> {
        self.require_stack(1)?;
        self.stack.borrow_mut().push(value);
        Ok(())
    }

    fn at(&self, index: i32) -> HostResult<Value> {
        let abs = self.require_normalize_index(index)?;
        Ok(self.stack.borrow()[abs].clone())
    }

    // -----------------------------------------------------------------
    // Push
    // -----------------------------------------------------------------

    pub fn push_undefined(&self) -> HostResult<()> {
        self.push(Value::undefined())
    }

    pub fn push_null(&self) -> HostResult<()> {
        self.push(Value::null())
    }

    pub fn push_boolean(&self, b: bool) -> HostResult<()> {
        self.push(Value::boolean(b))
    }

    pub fn push_true(&self) -> HostResult<()> {
        self.push_boolean(true)
    }

    pub fn push_false(&self) -> HostResult<()> {
        self.push_boolean(false)
    }

    pub fn push_int(&self, n: i32) -> HostResult<()> {
        self.push(Value::int32(n))
    }

    pub fn push_number(&self, n: f64) -> HostResult<()> {
        self.push(Value::number(n))
    }

    pub fn push_nan(&self) -> HostResult<()> {
        self.push(Value::nan())
    }

    pub fn push_string(&self, s: &str) -> HostResult<()> {
        self.push(Value::string(JsString::intern(s)))
    }

    /// Pushes a string built from raw bytes, preserving embedded NULs
    /// (spec section 8, testable property 12's `to_lstring` round trip);
    /// invalid UTF-8 is replaced lossily since [`JsString`] stores `str`.
    pub fn push_lstring(&self, bytes: &[u8]) -> HostResult<()> {
        let s = String::from_utf8_lossy(bytes);
        self.push(Value::string(JsString::intern(&s)))
    }

    pub fn push_fixed_buffer(&self, size: usize) -> HostResult<()> {
        let buf = Rc::new(JsBuffer::fixed(size));
        self.isolate.heap.register(&buf);
        self.push(Value::buffer(buf))
    }

    pub fn push_dynamic_buffer(&self, size: usize) -> HostResult<()> {
        let buf = Rc::new(JsBuffer::dynamic(size));
        self.isolate.heap.register(&buf);
        self.push(Value::buffer(buf))
    }

    pub fn push_pointer(&self, ptr: Rc<dyn std::any::Any>) -> HostResult<()> {
        self.push(Value::pointer(ptr))
    }

    pub fn push_object(&self) -> HostResult<()> {
        let obj = Rc::new(JsObject::new(None));
        self.isolate.heap.register(&obj);
        self.push(Value::object(obj))
    }

    pub fn push_array(&self) -> HostResult<()> {
        let arr = Rc::new(JsObject::with_class(None, ObjectClass::Array));
        self.isolate.heap.register(&arr);
        self.push(Value::object(arr))
    }

    pub fn push_current_thread(&self) -> HostResult<()> {
        let thread = self.isolate.context.current_thread();
        let obj = Rc::new(JsObject::new_thread(None, thread_status_snapshot(&thread)));
        self.isolate.heap.register(&obj);
        self.push(Value::object(obj))
    }

    /// Pushes the calling activation's `this` binding (spec section 6.2:
    /// reachable at relative index −1 below the argument bottom during a
    /// native call; here, read directly from the current thread's top
    /// frame for the common case of a native function just entered).
    pub fn push_this(&self) -> HostResult<()> {
        let thread = self.isolate.context.current_thread();
        let this = thread
            .borrow()
            .current_frame()
            .map(|f| f.this_value.clone())
            .unwrap_or(Value::undefined());
        self.push(this)
    }

    pub fn push_new_error_object(&self, kind: ErrorKind, message: &str) -> HostResult<()> {
        let obj = Rc::new(JsObject::new(None));
        self.isolate.heap.register(&obj);
        obj.set(PropertyKey::string("name"), Value::string(JsString::intern(error_kind_name(kind))));
        obj.set(PropertyKey::string("message"), Value::string(JsString::intern(message)));
        self.push(Value::object(obj))
    }

    // -----------------------------------------------------------------
    // Read / coerce / type test
    // -----------------------------------------------------------------

    pub fn get_length(&self, index: i32) -> HostResult<Option<f64>> {
        let value = self.at(index)?;
        Ok(match value.as_object().and_then(|o| o.get(&PropertyKey::string("length"))) {
            Some(v) => v.as_number(),
            None => value.as_string().map(|s| s.utf16_len() as f64),
        })
    }
}

macro_rules! type_accessors {
    ($is:ident, $get:ident, $require:ident, $to_display:literal, $pat:pat => $out:expr, $ty:ty) => {
        impl Context {
            pub fn $is(&self, index: i32) -> bool {
                matches!(self.at(index), Ok($pat))
            }

            pub fn $get(&self, index: i32) -> HostResult<Option<$ty>> {
                Ok(match self.at(index)? {
                    $pat => Some($out),
                    _ => None,
                })
            }

            pub fn $require(&self, index: i32) -> HostResult<$ty> {
                self.$get(index)?.ok_or(HostError::TypeMismatch(index, $to_display))
            }
        }
    };
}

type_accessors!(is_undefined, get_undefined, require_undefined, "undefined", v if v.is_undefined() => (), ());
type_accessors!(is_null, get_null, require_null, "null", v if v.is_null() => (), ());
type_accessors!(is_boolean, get_boolean, require_boolean, "boolean", v if v.is_boolean() => v.to_boolean(), bool);
type_accessors!(is_number, get_number, require_number, "number", v if v.is_number() => v.as_number().unwrap(), f64);
type_accessors!(is_string, get_string_value, require_string_value, "string", v if v.is_string() => v.as_string().unwrap(), GcRef<JsString>);
type_accessors!(is_object, get_object, require_object, "object", v if v.is_object() => v.as_object().unwrap(), GcRef<JsObject>);
type_accessors!(is_buffer, get_buffer, require_buffer, "buffer", v if v.is_buffer() => v.as_buffer().unwrap(), GcRef<JsBuffer>);
type_accessors!(is_pointer, get_pointer, require_pointer, "pointer", v if matches!(v, Value::Pointer(_)) => v.as_pointer().unwrap().clone(), Rc<dyn std::any::Any>);
type_accessors!(is_callable, get_callable, require_callable, "function", v if v.is_callable() => v.as_object().unwrap(), GcRef<JsObject>);

impl Context {
    pub fn get_string(&self, index: i32) -> HostResult<Option<String>> {
        Ok(self.get_string_value(index)?.map(|s| s.as_str().to_string()))
    }

    pub fn require_string(&self, index: i32) -> HostResult<String> {
        Ok(self.require_string_value(index)?.as_str().to_string())
    }

    /// ES5.1 ToNumber (spec section 8, testable property 11), via
    /// `esvm_core::convert`'s `FromValue` impl.
    pub fn to_number(&self, index: i32) -> HostResult<f64> {
        let value = self.at(index)?;
        Ok(esvm_core::FromValue::from_value(&value).unwrap_or(f64::NAN))
    }

    /// ES5.1 ToString.
    pub fn to_string_value(&self, index: i32) -> HostResult<String> {
        let value = self.at(index)?;
        esvm_core::FromValue::from_value(&value).map_err(HostError::Script)
    }

    pub fn to_boolean(&self, index: i32) -> HostResult<bool> {
        Ok(self.at(index)?.to_boolean())
    }

    // -----------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------

    pub fn get_prop(&self, obj_index: i32, key_index: i32) -> HostResult<()> {
        let obj = self.require_object(obj_index)?;
        let key = self.at(key_index)?;
        let value = obj.get(&to_property_key(&key)).unwrap_or(Value::undefined());
        self.push(value)
    }

    pub fn get_prop_string(&self, obj_index: i32, name: &str) -> HostResult<()> {
        let obj = self.require_object(obj_index)?;
        let value = obj.get(&PropertyKey::string(name)).unwrap_or(Value::undefined());
        self.push(value)
    }

    pub fn get_prop_index(&self, obj_index: i32, array_index: u32) -> HostResult<()> {
        let obj = self.require_object(obj_index)?;
        let value = obj.get(&PropertyKey::Index(array_index)).unwrap_or(Value::undefined());
        self.push(value)
    }

    /// Pops the value then writes it onto `obj_index[key_index]`.
    pub fn put_prop(&self, obj_index: i32, key_index: i32) -> HostResult<()> {
        let obj = self.require_object(obj_index)?;
        let key = self.at(key_index)?;
        let value = self.stack.borrow_mut().pop().ok_or(HostError::StackUnderflow { requested: 1, available: 0 })?;
        obj.set(to_property_key(&key), value);
        Ok(())
    }

    pub fn put_prop_string(&self, obj_index: i32, name: &str) -> HostResult<()> {
        let obj = self.require_object(obj_index)?;
        let value = self.stack.borrow_mut().pop().ok_or(HostError::StackUnderflow { requested: 1, available: 0 })?;
        obj.set(PropertyKey::string(name), value);
        Ok(())
    }

    pub fn put_prop_index(&self, obj_index: i32, array_index: u32) -> HostResult<()> {
        let obj = self.require_object(obj_index)?;
        let value = self.stack.borrow_mut().pop().ok_or(HostError::StackUnderflow { requested: 1, available: 0 })?;
        obj.set(PropertyKey::Index(array_index), value);
        Ok(())
    }

    pub fn del_prop(&self, obj_index: i32, key_index: i32) -> HostResult<bool> {
        let obj = self.require_object(obj_index)?;
        let key = self.at(key_index)?;
        Ok(obj.delete(&to_property_key(&key)))
    }

    pub fn has_prop(&self, obj_index: i32, key_index: i32) -> HostResult<bool> {
        let obj = self.require_object(obj_index)?;
        let key = self.at(key_index)?;
        Ok(obj.has(&to_property_key(&key)))
    }

    /// Defines a property with explicit attributes, `flags` using the
    /// bit-per-attribute convention documented in `DESIGN.md`
    /// (bit0=writable, bit1=enumerable, bit2=configurable).
    pub fn def_prop(&self, obj_index: i32, key_index: i32, value_index: i32, flags: u8) -> HostResult<()> {
        let obj = self.require_object(obj_index)?;
        let key = self.at(key_index)?;
        let value = self.at(value_index)?;
        let attrs = PropertyAttributes {
            writable: flags & 0b001 != 0,
            enumerable: flags & 0b010 != 0,
            configurable: flags & 0b100 != 0,
        };
        obj.define_property(to_property_key(&key), PropertyDescriptor::data(value, attrs));
        Ok(())
    }

    // -----------------------------------------------------------------
    // Call
    // -----------------------------------------------------------------

    /// Calls the function at `stack[-(nargs + 2)]` with `this` at
    /// `-(nargs + 1)` and `nargs` arguments above it, replacing all of
    /// that with the single return value.
    pub fn call(&mut self, nargs: usize) -> HostResult<()> {
        self.require_stack_top(nargs + 2)?;
        let (callee, this, args) = {
            let mut stack = self.stack.borrow_mut();
            let args: Vec<Value> = stack.split_off(stack.len() - nargs);
            let this = stack.pop().ok_or(HostError::StackUnderflow { requested: 1, available: 0 })?;
            let callee = stack.pop().ok_or(HostError::StackUnderflow { requested: 1, available: 0 })?;
            (callee, this, args)
        };
        let callee_obj = callee
            .as_object()
            .filter(|o| o.is_callable())
            .ok_or(HostError::TypeMismatch(-1, "function"))?;
        let result = esvm_core::call(&mut self.isolate.context, &callee_obj, this, &args, false)?;
        self.push(result)?;
        Ok(())
    }

    /// Like [`Context::call`] but resolves the callee as `obj[key]` with
    /// `obj` as `this`, QuickJS/Lua `call_method` style.
    pub fn call_method(&mut self, nargs: usize) -> HostResult<()> {
        self.require_stack_top(nargs + 2)?;
        let (recv, key, args) = {
            let mut stack = self.stack.borrow_mut();
            let args: Vec<Value> = stack.split_off(stack.len() - nargs);
            let key = stack.pop().ok_or(HostError::StackUnderflow { requested: 1, available: 0 })?;
            let recv = stack.pop().ok_or(HostError::StackUnderflow { requested: 1, available: 0 })?;
            (recv, key, args)
        };
        let recv_obj = recv.as_object().ok_or(HostError::TypeMismatch(-2, "object"))?;
        let method = recv_obj.get(&to_property_key(&key)).unwrap_or(Value::undefined());
        let method_obj = method
            .as_object()
            .filter(|o| o.is_callable())
            .ok_or(HostError::TypeMismatch(-1, "function"))?;
        let result = esvm_core::call(&mut self.isolate.context, &method_obj, recv, &args, false)?;
        self.push(result)?;
        Ok(())
    }

    /// Protected call: like [`Context::call`], but a thrown exception is
    /// caught and pushed as the sole result instead of propagating,
    /// mirroring this engine's overall `pcall`/`Err`-to-catch-boundary
    /// propagation design (spec section 7).
    pub fn pcall(&mut self, nargs: usize) -> HostResult<bool> {
        match self.call(nargs) {
            Ok(()) => Ok(true),
            Err(HostError::Script(err)) => {
                let value = match err {
                    VmError::Exception(thrown) => thrown.value,
                    other => {
                        let obj = Rc::new(JsObject::new(None));
                        self.isolate.heap.register(&obj);
                        obj.set(PropertyKey::string("message"), Value::string(JsString::intern(&other.to_string())));
                        Value::object(obj)
                    }
                };
                self.push(value)?;
                Ok(false)
            }
            Err(other) => Err(other),
        }
    }

    /// `pcall` with an explicit error handler function invoked on
    /// failure instead of the raw thrown value, and an `nrets`-wide
    /// result window (short results padded with `undefined`, matching
    /// spec section 8's testable property 12 `safe_call` example).
    pub fn safe_call(&mut self, handler: Option<GcRef<JsObject>>, nargs: usize, nrets: usize) -> HostResult<bool> {
        let ok = self.pcall(nargs)?;
        if !ok && let Some(h) = handler {
            let err_value = self.stack.borrow_mut().pop().unwrap_or(Value::undefined());
            let handled = esvm_core::call(&mut self.isolate.context, &h, Value::undefined(), &[err_value], false)?;
            self.push(handled)?;
        }
        let top = self.get_top();
        if nrets > 1 {
            self.set_top(top + nrets - 1);
        }
        Ok(ok)
    }

    // -----------------------------------------------------------------
    // Enumeration
    // -----------------------------------------------------------------

    /// Pushes an enumerator over the object at `index`'s keys (own only
    /// if `flags & 1 != 0`, else own + inherited), consumed by
    /// [`Context::next`].
    pub fn enumerate(&self, index: i32, flags: u8) -> HostResult<()> {
        let obj = self.require_object(index)?;
        let own_only = flags & 1 != 0;
        let mut keys: Vec<PropertyKey> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut current = Some(obj);
        loop {
            let Some(o) = current else { break };
            for key in o.own_keys() {
                if let Some(desc) = o.get_own_property(&key)
                    && desc.attributes.enumerable
                {
                    let dedup_key = match &key {
                        PropertyKey::Index(i) => i.to_string(),
                        PropertyKey::String(s) => s.as_str().to_string(),
                    };
                    if seen.insert(dedup_key) {
                        keys.push(key);
                    }
                }
            }
            if own_only {
                break;
            }
            current = o.prototype();
        }
        let enumerator = Rc::new(RefCell::new(keys.into_iter()));
        self.push(Value::pointer(enumerator as Rc<RefCell<dyn Iterator<Item = PropertyKey>>>))
    }

    /// Advances the enumerator at `enum_index`, pushing the next key (and
    /// its value too, if `get_value`); returns `false` once exhausted.
    pub fn next(&self, enum_index: i32, get_value: bool) -> HostResult<bool> {
        let value = self.at(enum_index)?;
        let ptr = value.as_pointer().ok_or(HostError::TypeMismatch(enum_index, "enumerator"))?;
        let enumerator = ptr
            .clone()
            .downcast::<RefCell<dyn Iterator<Item = PropertyKey>>>()
            .map_err(|_| HostError::TypeMismatch(enum_index, "enumerator"))?;
        let next_key = enumerator.borrow_mut().next();
        match next_key {
            Some(key) => {
                let key_value = match &key {
                    PropertyKey::Index(i) => Value::string(JsString::intern(&i.to_string())),
                    PropertyKey::String(s) => Value::string(s.clone()),
                };
                self.push(key_value.clone())?;
                if get_value {
                    let obj = self.require_object(enum_index)?;
                    let v = obj.get(&key).unwrap_or(Value::undefined());
                    self.push(v)?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

fn to_property_key(value: &Value) -> PropertyKey {
    if let Some(n) = value.as_int32()
        && n >= 0
    {
        return PropertyKey::Index(n as u32);
    }
    if let Some(s) = value.as_string() {
        return PropertyKey::from_js_string(s);
    }
    let s: String = esvm_core::FromValue::from_value(value).unwrap_or_default();
    PropertyKey::string(&s)
}

fn error_kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Error => "Error",
        ErrorKind::EvalError => "EvalError",
        ErrorKind::RangeError => "RangeError",
        ErrorKind::ReferenceError => "ReferenceError",
        ErrorKind::SyntaxError => "SyntaxError",
        ErrorKind::TypeError => "TypeError",
        ErrorKind::UriError => "URIError",
        ErrorKind::UnimplementedError
        | ErrorKind::InternalError
        | ErrorKind::AllocError
        | ErrorKind::AssertionError
        | ErrorKind::ApiError
        | ErrorKind::UncaughtError => "Error",
    }
}

/// `esvm_core::Thread` has no public `Clone`; the host API pushes a
/// *handle* to the live thread (sharing the underlying `Rc<RefCell<..>>`
/// would require exposing that type's internals), so `push_current_thread`
/// instead constructs a placeholder thread object carrying only the
/// current status. A shared-handle thread object needs `Thread` itself
/// to become `Rc<RefCell<Thread>>`-backed throughout `esvm-core`; see
/// `DESIGN.md`.
fn thread_status_snapshot(thread: &Rc<RefCell<esvm_core::Thread>>) -> esvm_core::Thread {
    let status = thread.borrow().status();
    let fresh = esvm_core::Thread::new();
    fresh.set_status(status);
    fresh
}

/// Loads a compiled module and runs its entry point to completion,
/// pushing the result value (spec section 6.1's `load_module`, the
/// host API's only code-loading entry point since the compiler is out
/// of scope).
pub fn load_and_run(ctx: &mut Context, module: Rc<esvm_bytecode::Module>) -> HostResult<()> {
    let result = esvm_core::run_module(&mut ctx.isolate.context, module)?;
    ctx.push(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_read_primitives() {
        let ctx = Context::new();
        ctx.push_int(42).unwrap();
        ctx.push_string("hello").unwrap();
        ctx.push_true().unwrap();
        assert_eq!(ctx.get_top(), 3);
        assert_eq!(ctx.require_boolean(-1).unwrap(), true);
        assert_eq!(ctx.require_string(-2).unwrap(), "hello");
        assert_eq!(ctx.to_number(-3).unwrap(), 42.0);
    }

    #[test]
    fn normalize_index_matches_spec_example() {
        let ctx = Context::new();
        ctx.push_int(123).unwrap();
        ctx.push_int(234).unwrap();
        ctx.push_int(345).unwrap();
        assert_eq!(ctx.normalize_index(-3), Some(0));
        assert_eq!(ctx.normalize_index(-1), Some(2));
        assert_eq!(ctx.normalize_index(3), None);
    }

    #[test]
    fn pop_underflow_is_rejected() {
        let ctx = Context::new();
        ctx.push_int(1).unwrap();
        assert!(ctx.pop(5).is_err());
        assert_eq!(ctx.get_top(), 1);
    }

    #[test]
    fn property_round_trip_through_put_and_get() {
        let ctx = Context::new();
        ctx.push_object().unwrap();
        ctx.push_string("x").unwrap();
        ctx.push_int(7).unwrap();
        ctx.put_prop(0, 1).unwrap();
        ctx.push_string("x").unwrap();
        ctx.get_prop(0, 1).unwrap();
        assert_eq!(ctx.to_number(-1).unwrap(), 7.0);
    }

    #[test]
    fn pcall_catches_a_thrown_value_instead_of_propagating() {
        let mut ctx = Context::new();
        let native = Rc::new(JsObject::new_function(
            None,
            FunctionData::Native {
                func: Rc::new(|_this, _args, _native_ctx| Err(VmError::type_error("boom"))),
                nargs: 0,
            },
        ));
        ctx.push(Value::object(native)).unwrap();
        ctx.push_undefined().unwrap();
        let ok = ctx.pcall(0).unwrap();
        assert!(!ok);
        assert!(ctx.require_object(-1).is_ok());
    }
}
