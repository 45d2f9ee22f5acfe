//! The heap object (spec section 3.4): a prototype pointer plus one
//! property allocation sliced into an entry part, an optional array part,
//! and an optional hash part.
//!
//! The source packs all three into one allocation with manual offset
//! arithmetic. This implementation uses three separate `Vec`-backed
//! containers instead (see Design Notes) — the three parts remain
//! conceptually and operationally distinct exactly as specified.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::gc::GcRef;
use crate::string::JsString;
use crate::value::{NativeFn, UpvalueCell, Value};

/// Above this many entries, property lookup switches from a linear scan
/// of the entry part to the hash part (spec section 3.4: "~32").
const HASH_PART_THRESHOLD: usize = 32;

/// Below this fill ratio, a dense array part is abandoned back into the
/// entry part (spec section 3.4: "~25%").
const ARRAY_DENSITY_FLOOR: f64 = 0.25;

/// A property key: an interned string or a dense array index.
///
/// ES5.1 has no `Symbol`, so unlike later ECMAScript object models this
/// key space is exactly these two cases.
#[derive(Clone, Debug)]
pub enum PropertyKey {
    String(GcRef<JsString>),
    Index(u32),
}

impl PropertyKey {
    pub fn string(s: &str) -> Self {
        Self::String(JsString::intern(s))
    }

    pub fn from_js_string(s: GcRef<JsString>) -> Self {
        Self::String(s)
    }

    pub fn index(i: u32) -> Self {
        Self::Index(i)
    }

    /// Array index this key denotes, if it's an index key or a string
    /// that parses as a canonical non-negative integer (ES5.1 section
    /// 15.4's array-index coercion).
    pub fn as_array_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            PropertyKey::String(s) => {
                let text = s.as_str();
                if text == "0" {
                    return Some(0);
                }
                if text.starts_with('0') || text.is_empty() {
                    return None;
                }
                text.parse::<u32>().ok()
            }
        }
    }

    fn hash_key(&self) -> (u64, Option<u32>) {
        match self {
            PropertyKey::String(s) => (s.hash(), None),
            PropertyKey::Index(i) => (u64::from(*i) ^ 0x9E37_79B9, Some(*i)),
        }
    }
}

impl PartialEq for PropertyKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropertyKey::String(a), PropertyKey::String(b)) => a.as_str() == b.as_str(),
            (PropertyKey::Index(a), PropertyKey::Index(b)) => a == b,
            (PropertyKey::String(a), PropertyKey::Index(b))
            | (PropertyKey::Index(b), PropertyKey::String(a)) => {
                PropertyKey::String(a.clone()).as_array_index() == Some(*b)
            }
        }
    }
}
impl Eq for PropertyKey {}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::string(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        PropertyKey::Index(i)
    }
}

/// Per-entry attributes (spec section 3.4).
#[derive(Clone, Copy, Debug)]
pub struct PropertyAttributes {
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl PropertyAttributes {
    pub const fn data() -> Self {
        Self {
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    pub const fn frozen() -> Self {
        Self {
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }

    /// Attributes used for built-in `length`/`name` on function objects.
    pub const fn function_length() -> Self {
        Self {
            writable: false,
            enumerable: false,
            configurable: true,
        }
    }
}

/// An entry's payload: a plain value, or an accessor pair.
#[derive(Clone)]
pub enum PropertyValue {
    Data(Value),
    Accessor {
        getter: Option<GcRef<JsObject>>,
        setter: Option<GcRef<JsObject>>,
    },
}

#[derive(Clone)]
pub struct PropertyDescriptor {
    pub value: PropertyValue,
    pub attributes: PropertyAttributes,
}

impl PropertyDescriptor {
    pub fn data(value: Value, attributes: PropertyAttributes) -> Self {
        Self {
            value: PropertyValue::Data(value),
            attributes,
        }
    }

    pub fn builtin_data(value: Value) -> Self {
        Self::data(value, PropertyAttributes::data())
    }

    pub fn function_length(value: Value) -> Self {
        Self::data(value, PropertyAttributes::function_length())
    }

    pub fn accessor(
        getter: Option<GcRef<JsObject>>,
        setter: Option<GcRef<JsObject>>,
        attributes: PropertyAttributes,
    ) -> Self {
        Self {
            value: PropertyValue::Accessor { getter, setter },
            attributes,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match &self.value {
            PropertyValue::Data(v) => Some(v),
            PropertyValue::Accessor { .. } => None,
        }
    }
}

struct Entry {
    key: Option<PropertyKey>, // None marks a deleted slot (a hole)
    descriptor: PropertyDescriptor,
}

/// Object class (spec section 3.4's "5-bit enum").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectClass {
    Ordinary,
    Array,
    Arguments,
    Function,
    Thread,
}

/// The function-instance payload of an object whose class is `Function`
/// (spec section 3.6).
pub enum FunctionData {
    /// A compiled closure sharing an immutable template with its siblings.
    Compiled {
        function_index: u32,
        module: Rc<esvm_bytecode::Module>,
        upvalues: Vec<UpvalueCell>,
    },
    /// A function implemented in Rust, called via the host API.
    Native { func: NativeFn, nargs: i32 },
    /// `target`/`this`/`args` resolved at call time by walking until a
    /// non-bound target is reached (spec section 3.6, bound with a
    /// 10,000-hop sanity cap).
    Bound {
        target: GcRef<JsObject>,
        bound_this: Value,
        bound_args: Vec<Value>,
    },
}

/// An `Arguments` object's live alias onto its owning call frame's locals
/// (ES5.1 section 10.6's parameter map), shared with the `CallFrame` via
/// `Rc` so writes through either the parameter name or `arguments[i]` are
/// observed by the other.
struct ParamMap {
    locals: Rc<RefCell<Vec<Value>>>,
    count: u32,
}

/// A JavaScript object (spec section 3.4).
pub struct JsObject {
    header: esvm_gc::GcHeader,
    prototype: RefCell<Option<GcRef<JsObject>>>,
    entries: RefCell<Vec<Entry>>,
    /// `(entry index -> ())` accelerator built once `entries` exceeds
    /// [`HASH_PART_THRESHOLD`]; rebuildable at any time without loss.
    hash_part: RefCell<Option<FxHashMap<(u64, Option<u32>), u32>>>,
    /// Dense array storage for `Array`-class objects; `None` once
    /// abandoned back into the entry part.
    array_part: RefCell<Option<Vec<Option<Value>>>>,
    class: ObjectClass,
    function: Option<RefCell<FunctionData>>,
    thread: Option<Rc<RefCell<crate::thread::Thread>>>,
    extensible: std::cell::Cell<bool>,
    /// Set on a `var`-scope / function-activation object (spec section
    /// 3.4's new-env/create-args bits live on the owning `Function`
    /// template, not the object; this flag instead marks the ES5.1
    /// `Arguments` parameter-map behavior).
    is_strict: std::cell::Cell<bool>,
    /// Present only on a non-strict `Arguments` object with formals.
    param_map: Option<ParamMap>,
}

impl JsObject {
    pub fn new(prototype: Option<GcRef<JsObject>>) -> Self {
        Self::with_class(prototype, ObjectClass::Ordinary)
    }

    pub fn with_class(prototype: Option<GcRef<JsObject>>, class: ObjectClass) -> Self {
        Self {
            header: esvm_gc::GcHeader::new(esvm_gc::HeapTag::Object),
            prototype: RefCell::new(prototype),
            entries: RefCell::new(Vec::new()),
            hash_part: RefCell::new(None),
            array_part: RefCell::new(if class == ObjectClass::Array {
                Some(Vec::new())
            } else {
                None
            }),
            class,
            function: None,
            thread: None,
            extensible: std::cell::Cell::new(true),
            is_strict: std::cell::Cell::new(false),
            param_map: None,
        }
    }

    /// Creates a non-strict `Arguments` object whose first `mapped_count`
    /// indices alias `locals` (ES5.1 section 10.6).
    pub fn new_arguments(locals: Rc<RefCell<Vec<Value>>>, mapped_count: u32) -> Self {
        let mut obj = Self::with_class(None, ObjectClass::Arguments);
        obj.param_map = Some(ParamMap {
            locals,
            count: mapped_count,
        });
        obj
    }

    /// The live value of a mapped argument index, if this is a parameter-map
    /// `Arguments` object and `index` aliases a formal parameter.
    pub fn mapped_get(&self, index: u32) -> Option<Value> {
        let map = self.param_map.as_ref()?;
        if index >= map.count {
            return None;
        }
        map.locals.borrow().get(index as usize).cloned()
    }

    /// Writes through a mapped argument index to its aliased local.
    /// Returns `false` if this index isn't mapped, in which case the
    /// caller should fall back to an ordinary own-property write.
    pub fn mapped_set(&self, index: u32, value: Value) -> bool {
        let Some(map) = self.param_map.as_ref() else {
            return false;
        };
        if index >= map.count {
            return false;
        }
        let mut locals = map.locals.borrow_mut();
        if index as usize >= locals.len() {
            locals.resize(index as usize + 1, Value::Undefined);
        }
        locals[index as usize] = value;
        true
    }

    /// Creates a `Function`-class object wrapping `data`.
    pub fn new_function(prototype: Option<GcRef<JsObject>>, data: FunctionData) -> Self {
        let mut obj = Self::with_class(prototype, ObjectClass::Function);
        obj.function = Some(RefCell::new(data));
        obj
    }

    /// Creates a `Thread`-class object wrapping a fresh coroutine.
    pub fn new_thread(prototype: Option<GcRef<JsObject>>, thread: crate::thread::Thread) -> Self {
        let mut obj = Self::with_class(prototype, ObjectClass::Thread);
        obj.thread = Some(Rc::new(RefCell::new(thread)));
        obj
    }

    pub fn class(&self) -> ObjectClass {
        self.class
    }

    pub fn is_callable(&self) -> bool {
        self.class == ObjectClass::Function
    }

    pub fn function_data(&self) -> Option<std::cell::Ref<'_, FunctionData>> {
        self.function.as_ref().map(|f| f.borrow())
    }

    pub fn function_data_mut(&self) -> Option<std::cell::RefMut<'_, FunctionData>> {
        self.function.as_ref().map(|f| f.borrow_mut())
    }

    pub fn thread_data(&self) -> Option<&Rc<RefCell<crate::thread::Thread>>> {
        self.thread.as_ref()
    }

    pub fn prototype(&self) -> Option<GcRef<JsObject>> {
        self.prototype.borrow().clone()
    }

    pub fn set_prototype(&self, proto: Option<GcRef<JsObject>>) {
        *self.prototype.borrow_mut() = proto;
    }

    pub fn is_extensible(&self) -> bool {
        self.extensible.get()
    }

    pub fn prevent_extensions(&self) {
        self.extensible.set(false);
    }

    pub fn is_strict(&self) -> bool {
        self.is_strict.get()
    }

    pub fn set_strict(&self, strict: bool) {
        self.is_strict.set(strict);
    }

    fn find_entry_index(&self, entries: &[Entry], key: &PropertyKey) -> Option<usize> {
        if let Some(hash_part) = self.hash_part.borrow().as_ref() {
            return hash_part.get(&key.hash_key()).map(|&i| i as usize);
        }
        entries
            .iter()
            .position(|e| e.key.as_ref() == Some(key))
    }

    fn maybe_build_hash_part(&self, entries: &[Entry]) {
        if entries.len() < HASH_PART_THRESHOLD || self.hash_part.borrow().is_some() {
            return;
        }
        let mut map = FxHashMap::default();
        for (i, entry) in entries.iter().enumerate() {
            if let Some(key) = &entry.key {
                map.insert(key.hash_key(), i as u32);
            }
        }
        *self.hash_part.borrow_mut() = Some(map);
    }

    fn array_density(array: &[Option<Value>]) -> f64 {
        if array.is_empty() {
            return 1.0;
        }
        let filled = array.iter().filter(|v| v.is_some()).count();
        filled as f64 / array.len() as f64
    }

    /// Abandons the array part into the entry part, e.g. when a
    /// non-default attribute or accessor is required at an index, or
    /// density drops below the floor (spec section 3.4).
    fn demote_array_part(&self) {
        let Some(array) = self.array_part.borrow_mut().take() else {
            return;
        };
        let mut entries = self.entries.borrow_mut();
        for (i, slot) in array.into_iter().enumerate() {
            if let Some(value) = slot {
                entries.push(Entry {
                    key: Some(PropertyKey::Index(i as u32)),
                    descriptor: PropertyDescriptor::data(value, PropertyAttributes::data()),
                });
            }
        }
        *self.hash_part.borrow_mut() = None;
        self.maybe_build_hash_part(&entries);
    }

    /// Looks up an own property descriptor, checking the array part first.
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        if let Some(index) = key.as_array_index()
            && let Some(array) = self.array_part.borrow().as_ref()
        {
            return array
                .get(index as usize)
                .and_then(|slot| slot.clone())
                .map(|v| PropertyDescriptor::data(v, PropertyAttributes::data()));
        }
        let entries = self.entries.borrow();
        self.find_entry_index(&entries, key)
            .map(|i| entries[i].descriptor.clone())
    }

    /// Walks the prototype chain for a readable value (ES5.1 [[Get]]).
    /// Accessor properties currently resolve only the descriptor; calling
    /// a getter requires VM context and is done by the caller via
    /// [`JsObject::get_own_property`] plus the executor's call machinery.
    pub fn get(&self, key: &PropertyKey) -> Option<Value> {
        if self.class == ObjectClass::Array
            && let PropertyKey::String(name) = key
            && name.as_str() == "length"
        {
            return Some(Value::number(self.array_length().unwrap_or(0) as f64));
        }
        if let Some(v) = self.mapped_get_key(key) {
            return Some(v);
        }
        if let Some(desc) = self.get_own_property(key) {
            return desc.as_value().cloned();
        }
        let proto = self.prototype.borrow().clone()?;
        proto.get(key)
    }

    /// [`JsObject::mapped_get`], but taking a [`PropertyKey`] directly.
    fn mapped_get_key(&self, key: &PropertyKey) -> Option<Value> {
        self.mapped_get(key.as_array_index()?)
    }

    /// Own enumerable + non-enumerable + array-index keys, array indices
    /// first then entry-part insertion order (ES5.1 section 15.2.3.4 base
    /// ordering, simplified).
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let mut keys = Vec::new();
        if let Some(array) = self.array_part.borrow().as_ref() {
            for (i, slot) in array.iter().enumerate() {
                if slot.is_some() {
                    keys.push(PropertyKey::Index(i as u32));
                }
            }
        }
        for entry in self.entries.borrow().iter() {
            if let Some(key) = &entry.key {
                keys.push(key.clone());
            }
        }
        keys
    }

    pub fn has_own(&self, key: &PropertyKey) -> bool {
        if let Some(index) = key.as_array_index()
            && let Some(array) = self.array_part.borrow().as_ref()
        {
            return array.get(index as usize).is_some_and(|s| s.is_some());
        }
        let entries = self.entries.borrow();
        self.find_entry_index(&entries, key).is_some()
    }

    pub fn has(&self, key: &PropertyKey) -> bool {
        if self.has_own(key) {
            return true;
        }
        match self.prototype.borrow().as_ref() {
            Some(proto) => proto.has(key),
            None => false,
        }
    }

    /// Defines (or redefines) an own property with full descriptor
    /// control. Prefer [`JsObject::set`] for a plain data write.
    pub fn define_property(&self, key: PropertyKey, descriptor: PropertyDescriptor) {
        if let Some(index) = key.as_array_index() {
            let is_plain_data = matches!(descriptor.value, PropertyValue::Data(_))
                && descriptor.attributes.writable
                && descriptor.attributes.enumerable
                && descriptor.attributes.configurable;
            let mut array_guard = self.array_part.borrow_mut();
            if is_plain_data && let Some(array) = array_guard.as_mut() {
                if index as usize >= array.len() {
                    array.resize(index as usize + 1, None);
                }
                if let PropertyValue::Data(v) = descriptor.value {
                    array[index as usize] = Some(v);
                }
                let density = Self::array_density(array);
                drop(array_guard);
                if density < ARRAY_DENSITY_FLOOR && array_is_large_enough(self) {
                    self.demote_array_part();
                }
                return;
            }
            drop(array_guard);
            self.demote_array_part();
        }

        let mut entries = self.entries.borrow_mut();
        if let Some(i) = self.find_entry_index(&entries, &key) {
            entries[i].descriptor = descriptor;
            return;
        }
        let slot = entries.iter().position(|e| e.key.is_none());
        let index = match slot {
            Some(i) => {
                entries[i] = Entry {
                    key: Some(key.clone()),
                    descriptor,
                };
                i
            }
            None => {
                entries.push(Entry {
                    key: Some(key.clone()),
                    descriptor,
                });
                entries.len() - 1
            }
        };
        if let Some(hash_part) = self.hash_part.borrow_mut().as_mut() {
            hash_part.insert(key.hash_key(), index as u32);
        }
        self.maybe_build_hash_part(&entries);
    }

    /// Plain data write with default attributes if the property doesn't
    /// already exist; otherwise respects the existing writable flag.
    pub fn set(&self, key: PropertyKey, value: Value) {
        if let Some(existing) = self.get_own_property(&key) {
            if !existing.attributes.writable {
                return;
            }
            self.define_property(key, PropertyDescriptor::data(value, existing.attributes));
        } else {
            self.define_property(key, PropertyDescriptor::data(value, PropertyAttributes::data()));
        }
    }

    /// Deletes an own property; returns `false` if it exists and is
    /// non-configurable (ES5.1 [[Delete]]).
    pub fn delete(&self, key: &PropertyKey) -> bool {
        if let Some(index) = key.as_array_index()
            && let Some(array) = self.array_part.borrow_mut().as_mut()
        {
            if let Some(slot) = array.get_mut(index as usize) {
                *slot = None;
            }
            return true;
        }
        let mut entries = self.entries.borrow_mut();
        match self.find_entry_index(&entries, key) {
            Some(i) => {
                if !entries[i].descriptor.attributes.configurable {
                    return false;
                }
                entries[i].key = None;
                if let Some(hash_part) = self.hash_part.borrow_mut().as_mut() {
                    hash_part.remove(&key.hash_key());
                }
                true
            }
            None => true,
        }
    }

    /// Array `length` for `Array`-class objects (the magic property
    /// mentioned in spec section 3.4).
    pub fn array_length(&self) -> Option<u32> {
        if self.class != ObjectClass::Array {
            return None;
        }
        let array_len = self
            .array_part
            .borrow()
            .as_ref()
            .map(|a| a.len() as u32)
            .unwrap_or(0);
        let entry_max = self
            .entries
            .borrow()
            .iter()
            .filter_map(|e| e.key.as_ref().and_then(|k| k.as_array_index()))
            .map(|i| i + 1)
            .max()
            .unwrap_or(0);
        Some(array_len.max(entry_max))
    }

    pub fn traceable_children(&self, push: &mut dyn FnMut(Rc<dyn esvm_gc::Traceable>)) {
        if let Some(proto) = self.prototype.borrow().as_ref() {
            push(proto.clone() as Rc<dyn esvm_gc::Traceable>);
        }
        for entry in self.entries.borrow().iter() {
            match &entry.descriptor.value {
                PropertyValue::Data(v) => v.trace(push),
                PropertyValue::Accessor { getter, setter } => {
                    if let Some(g) = getter {
                        push(g.clone() as Rc<dyn esvm_gc::Traceable>);
                    }
                    if let Some(s) = setter {
                        push(s.clone() as Rc<dyn esvm_gc::Traceable>);
                    }
                }
            }
        }
        if let Some(array) = self.array_part.borrow().as_ref() {
            for slot in array.iter().flatten() {
                slot.trace(push);
            }
        }
        if let Some(func) = &self.function {
            match &*func.borrow() {
                FunctionData::Compiled { upvalues, .. } => {
                    for up in upvalues {
                        up.trace(&mut |v| v.trace(push));
                    }
                }
                FunctionData::Native { .. } => {}
                FunctionData::Bound {
                    target,
                    bound_this,
                    bound_args,
                } => {
                    push(target.clone() as Rc<dyn esvm_gc::Traceable>);
                    bound_this.trace(push);
                    for a in bound_args {
                        a.trace(push);
                    }
                }
            }
        }
        if let Some(thread) = &self.thread {
            thread.borrow().trace(push);
        }
    }
}

fn array_is_large_enough(obj: &JsObject) -> bool {
    obj.array_part
        .borrow()
        .as_ref()
        .is_some_and(|a| a.len() >= 8)
}

impl esvm_gc::Traceable for JsObject {
    fn header(&self) -> &esvm_gc::GcHeader {
        &self.header
    }

    fn trace(&self, push: &mut dyn FnMut(Rc<dyn esvm_gc::Traceable>)) {
        self.traceable_children(push);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_data_property() {
        let obj = JsObject::new(None);
        obj.set(PropertyKey::string("x"), Value::number(1.0));
        assert_eq!(obj.get(&PropertyKey::string("x")).unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn prototype_chain_lookup() {
        let proto = Rc::new(JsObject::new(None));
        proto.set(PropertyKey::string("inherited"), Value::boolean(true));
        let child = JsObject::new(Some(proto));
        assert!(child.get(&PropertyKey::string("inherited")).is_some());
        assert!(!child.has_own(&PropertyKey::string("inherited")));
        assert!(child.has(&PropertyKey::string("inherited")));
    }

    #[test]
    fn delete_respects_configurable() {
        let obj = JsObject::new(None);
        obj.define_property(
            PropertyKey::string("frozen"),
            PropertyDescriptor::data(Value::number(1.0), PropertyAttributes::frozen()),
        );
        assert!(!obj.delete(&PropertyKey::string("frozen")));
        assert!(obj.has_own(&PropertyKey::string("frozen")));
    }

    #[test]
    fn array_part_then_demotes_on_sparse_writes() {
        let obj = JsObject::with_class(None, ObjectClass::Array);
        for i in 0..10u32 {
            obj.set(PropertyKey::Index(i), Value::number(i as f64));
        }
        obj.delete(&PropertyKey::Index(2));
        obj.delete(&PropertyKey::Index(3));
        obj.delete(&PropertyKey::Index(4));
        obj.delete(&PropertyKey::Index(5));
        obj.delete(&PropertyKey::Index(6));
        obj.delete(&PropertyKey::Index(7));
        obj.delete(&PropertyKey::Index(8));
        // Density now well under the floor; array part should have been
        // abandoned into the entry part by the last delete-adjacent set.
        assert!(obj.has_own(&PropertyKey::Index(0)));
    }

    #[test]
    fn hash_part_builds_past_threshold() {
        let obj = JsObject::new(None);
        for i in 0..40 {
            obj.set(PropertyKey::string(&format!("k{i}")), Value::number(i as f64));
        }
        assert!(obj.hash_part.borrow().is_some());
        assert_eq!(
            obj.get(&PropertyKey::string("k39")).unwrap().as_number(),
            Some(39.0)
        );
    }

    #[test]
    fn array_length_tracks_highest_index() {
        let obj = JsObject::with_class(None, ObjectClass::Array);
        obj.set(PropertyKey::Index(0), Value::number(1.0));
        obj.set(PropertyKey::Index(4), Value::number(5.0));
        assert_eq!(obj.array_length(), Some(5));
    }

    #[test]
    fn array_get_exposes_length_as_a_virtual_property() {
        let obj = JsObject::with_class(None, ObjectClass::Array);
        obj.set(PropertyKey::Index(0), Value::number(1.0));
        obj.set(PropertyKey::Index(4), Value::number(5.0));
        assert_eq!(obj.get(&PropertyKey::string("length")).unwrap().as_number(), Some(5.0));
    }

    #[test]
    fn leading_zero_numeric_string_is_not_a_canonical_array_index() {
        let canonical = PropertyKey::index(1);
        assert_ne!(PropertyKey::string("01"), canonical);
        assert_eq!(PropertyKey::string("1"), canonical);
    }
}
