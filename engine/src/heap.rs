// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::concrete_value::ConcreteValue;
use crate::reference::{ConcreteObject, ObjectKind, ObjectReference, Reference};
use crate::symbolic_value::SymbolicValue;

use log_derive::{logfn, logfn_inputs};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result};
use std::rc::Rc;

/// Identifies a field by the class that declares it and its name.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct FieldKey {
    pub owner: Rc<str>,
    pub name: Rc<str>,
}

impl Debug for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

impl FieldKey {
    pub fn new(owner: &str, name: &str) -> FieldKey {
        FieldKey {
            owner: Rc::from(owner),
            name: Rc::from(name),
        }
    }
}

/// The symbolic contents of memory, for the locations that hold values derived from inputs.
///
/// Only symbolic values are stored. Storing anything else removes the location, and a location
/// that is not present reads as a constant with whatever value the concrete machine reports.
/// This keeps the heap about as large as the part of the program state that depends on inputs.
///
/// Locations are keyed by shadow references. Since those are only ever weakly linked to the
/// concrete objects they stand for, entries keyed by references to reclaimed objects become
/// unreachable. A sweep that runs every `gc_threshold` heap operations removes them.
pub struct SymbolicHeap {
    instance_fields: HashMap<FieldKey, HashMap<Rc<Reference>, Rc<SymbolicValue>>>,
    static_fields: HashMap<FieldKey, Rc<SymbolicValue>>,
    array_elements: HashMap<Rc<Reference>, HashMap<i32, Rc<SymbolicValue>>>,
    /// The text of string builders. Unlike the other maps this one also keeps constant text,
    /// since appending a symbolic value to a builder needs the concrete prefix. A builder
    /// without an entry has text the engine does not know.
    string_builders: HashMap<Rc<Reference>, Rc<SymbolicValue>>,
    /// Maps identity hash codes to the most recent reference minted for an object with that hash.
    identities: HashMap<i32, Rc<Reference>>,
    null_reference: Rc<Reference>,
    next_instance_id: u64,
    mutations_since_gc: u64,
    gc_threshold: u64,
    gc_runs: u64,
    collected_entries: u64,
}

impl Debug for SymbolicHeap {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("SymbolicHeap")
            .field("instance_fields", &self.instance_fields)
            .field("static_fields", &self.static_fields)
            .field("array_elements", &self.array_elements)
            .field("string_builders", &self.string_builders)
            .finish()
    }
}

/// Constructors and references
impl SymbolicHeap {
    pub fn new(gc_threshold: u64) -> SymbolicHeap {
        SymbolicHeap {
            instance_fields: HashMap::new(),
            static_fields: HashMap::new(),
            array_elements: HashMap::new(),
            string_builders: HashMap::new(),
            identities: HashMap::new(),
            null_reference: Rc::new(Reference::Null),
            next_instance_id: 1,
            mutations_since_gc: 0,
            gc_threshold,
            gc_runs: 0,
            collected_entries: 0,
        }
    }

    pub fn null_reference(&self) -> Rc<Reference> {
        self.null_reference.clone()
    }

    fn next_object(&mut self, type_name: Rc<str>) -> ObjectReference {
        let instance_id = self.next_instance_id;
        self.next_instance_id += 1;
        ObjectReference::new(instance_id, type_name)
    }

    /// A reference for an object whose concrete counterpart has not been observed yet, such as
    /// the result of `new`.
    #[logfn(TRACE)]
    pub fn new_uninitialized_reference(&mut self, type_name: &str) -> Rc<Reference> {
        Rc::new(Reference::Object(self.next_object(Rc::from(type_name))))
    }

    /// A new, not yet linked, string reference with the given contents.
    #[logfn_inputs(TRACE)]
    pub fn new_string_reference(&mut self, value: Rc<SymbolicValue>) -> Rc<Reference> {
        let object = self.next_object(Rc::from("java/lang/String"));
        Rc::new(Reference::String(object, value))
    }

    /// Returns the reference that stands for the given concrete object, minting a new one if
    /// the object has not been seen before.
    ///
    /// References are found by identity hash. Since hash codes can collide, and since a code can
    /// be reused once its object is reclaimed, a hit is only returned if it is linked to exactly
    /// the given object. Otherwise the stale entry is replaced by a fresh reference.
    #[logfn_inputs(TRACE)]
    pub fn get_reference(&mut self, concrete: Option<&Rc<ConcreteObject>>) -> Rc<Reference> {
        let concrete = match concrete {
            Some(concrete) => concrete,
            None => return self.null_reference(),
        };
        if let Some(reference) = self.identities.get(&concrete.identity_hash) {
            if reference.points_to(concrete) {
                return reference.clone();
            }
            debug!(
                "discarding stale reference {:?} for identity hash {}",
                reference, concrete.identity_hash
            );
        }
        let object = self.next_object(concrete.class_name.clone());
        let reference = Rc::new(match &concrete.kind {
            ObjectKind::String { value } => Reference::String(
                object,
                SymbolicValue::make_constant(ConcreteValue::Str(value.clone())),
            ),
            _ => Reference::Object(object),
        });
        reference.initialize(concrete);
        self.identities
            .insert(concrete.identity_hash, reference.clone());
        reference
    }

    /// Links a reference to its concrete object the first time the object is observed. The
    /// reference becomes the canonical reference for the object unless a reference to that
    /// same live object already claims the identity hash. A stale claim is discarded.
    #[logfn_inputs(TRACE)]
    pub fn initialize_reference(&mut self, reference: &Rc<Reference>, concrete: &Rc<ConcreteObject>) {
        if !reference.initialize(concrete) {
            return;
        }
        if let Some(existing) = self.identities.get(&concrete.identity_hash) {
            if existing.points_to(concrete) {
                return;
            }
            debug!(
                "discarding stale reference {:?} for identity hash {}",
                existing, concrete.identity_hash
            );
        }
        self.identities
            .insert(concrete.identity_hash, reference.clone());
    }

    /// Makes the given reference the canonical reference for the concrete object, replacing
    /// whatever reference was registered for its identity hash.
    #[logfn_inputs(TRACE)]
    pub fn rebind_reference(&mut self, reference: &Rc<Reference>, concrete: &Rc<ConcreteObject>) {
        reference.initialize(concrete);
        self.identities
            .insert(concrete.identity_hash, reference.clone());
    }
}

/// Reads and writes
impl SymbolicHeap {
    /// Returns the stored value for the field of the given object, provided it still agrees
    /// with the concrete value. A stale entry is removed and a constant is returned instead.
    #[logfn_inputs(TRACE)]
    pub fn get_field(
        &mut self,
        field: &FieldKey,
        holder: &Rc<Reference>,
        concrete: ConcreteValue,
    ) -> Rc<SymbolicValue> {
        self.monitor_gc();
        if let Some(values) = self.instance_fields.get_mut(field) {
            if let Some(value) = check_stored(values.get(holder), &concrete) {
                return value;
            }
            values.remove(holder);
        }
        SymbolicValue::make_constant(concrete)
    }

    #[logfn_inputs(TRACE)]
    pub fn put_field(&mut self, field: &FieldKey, holder: &Rc<Reference>, value: Rc<SymbolicValue>) {
        self.monitor_gc();
        if value.is_symbolic() {
            self.instance_fields
                .entry(field.clone())
                .or_default()
                .insert(holder.clone(), value);
        } else if let Some(values) = self.instance_fields.get_mut(field) {
            values.remove(holder);
        }
    }

    #[logfn_inputs(TRACE)]
    pub fn get_static(&mut self, field: &FieldKey, concrete: ConcreteValue) -> Rc<SymbolicValue> {
        self.monitor_gc();
        if let Some(value) = check_stored(self.static_fields.get(field), &concrete) {
            return value;
        }
        self.static_fields.remove(field);
        SymbolicValue::make_constant(concrete)
    }

    #[logfn_inputs(TRACE)]
    pub fn put_static(&mut self, field: &FieldKey, value: Rc<SymbolicValue>) {
        self.monitor_gc();
        if value.is_symbolic() {
            self.static_fields.insert(field.clone(), value);
        } else {
            self.static_fields.remove(field);
        }
    }

    #[logfn_inputs(TRACE)]
    pub fn get_array_element(
        &mut self,
        array: &Rc<Reference>,
        index: i32,
        concrete: ConcreteValue,
    ) -> Rc<SymbolicValue> {
        self.monitor_gc();
        if let Some(elements) = self.array_elements.get_mut(array) {
            if let Some(value) = check_stored(elements.get(&index), &concrete) {
                return value;
            }
            elements.remove(&index);
        }
        SymbolicValue::make_constant(concrete)
    }

    #[logfn_inputs(TRACE)]
    pub fn put_array_element(&mut self, array: &Rc<Reference>, index: i32, value: Rc<SymbolicValue>) {
        self.monitor_gc();
        if value.is_symbolic() {
            self.array_elements
                .entry(array.clone())
                .or_default()
                .insert(index, value);
        } else if let Some(elements) = self.array_elements.get_mut(array) {
            elements.remove(&index);
        }
    }
}

/// String builders
impl SymbolicHeap {
    /// The text of the builder, if the engine has followed every change made to it.
    pub fn builder_text(&self, builder: &Rc<Reference>) -> Option<Rc<SymbolicValue>> {
        self.string_builders.get(builder).cloned()
    }

    /// Sets the text of the builder. None forgets it, after a change the engine cannot follow.
    #[logfn_inputs(TRACE)]
    pub fn set_builder_text(&mut self, builder: &Rc<Reference>, text: Option<Rc<SymbolicValue>>) {
        self.monitor_gc();
        match text {
            Some(text) => {
                self.string_builders.insert(builder.clone(), text);
            }
            None => {
                self.string_builders.remove(builder);
            }
        }
    }
}

fn check_stored(
    stored: Option<&Rc<SymbolicValue>>,
    concrete: &ConcreteValue,
) -> Option<Rc<SymbolicValue>> {
    match stored {
        Some(value) if value.concrete.matches(concrete) => Some(value.clone()),
        Some(value) => {
            debug!("stored value {:?} no longer matches {}", value, concrete);
            None
        }
        None => None,
    }
}

/// Garbage collection
impl SymbolicHeap {
    fn monitor_gc(&mut self) {
        self.mutations_since_gc += 1;
        if self.mutations_since_gc > self.gc_threshold {
            self.symbolic_gc();
        }
    }

    /// Removes every entry that is keyed by a reference to a reclaimed concrete object, and
    /// returns how many entries were removed.
    #[logfn(TRACE)]
    pub fn symbolic_gc(&mut self) -> usize {
        self.mutations_since_gc = 0;
        self.gc_runs += 1;
        let mut removed = 0;
        for values in self.instance_fields.values_mut() {
            let before = values.len();
            values.retain(|holder, _| !holder.is_collectible());
            removed += before - values.len();
        }
        self.instance_fields.retain(|_, values| !values.is_empty());
        let before = self.array_elements.len();
        self.array_elements
            .retain(|array, _| !array.is_collectible());
        removed += before - self.array_elements.len();
        let before = self.string_builders.len();
        self.string_builders
            .retain(|builder, _| !builder.is_collectible());
        removed += before - self.string_builders.len();
        let before = self.identities.len();
        self.identities
            .retain(|_, reference| !reference.is_collectible());
        removed += before - self.identities.len();
        debug!("symbolic gc removed {} entries", removed);
        self.collected_entries += removed as u64;
        removed
    }

    pub fn gc_runs(&self) -> u64 {
        self.gc_runs
    }

    pub fn collected_entries(&self) -> u64 {
        self.collected_entries
    }

    /// The number of references in the identity table.
    pub fn live_references(&self) -> usize {
        self.identities.len()
    }

    /// The number of stored field, static and array element values.
    pub fn stored_values(&self) -> usize {
        self.instance_fields.values().map(|v| v.len()).sum::<usize>()
            + self.static_fields.len()
            + self
                .array_elements
                .values()
                .map(|v| v.len())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ValueKind;

    #[test]
    fn gc_runs_once_the_threshold_is_exceeded() {
        let mut heap = SymbolicHeap::new(2);
        let field = FieldKey::new("Foo", "f");
        heap.get_static(&field, 1.into());
        heap.get_static(&field, 1.into());
        assert_eq!(heap.gc_runs(), 0);
        heap.get_static(&field, 1.into());
        assert_eq!(heap.gc_runs(), 1);
    }

    #[test]
    fn a_linked_reference_displaces_a_stale_identity() {
        let mut heap = SymbolicHeap::new(100);
        let first = ConcreteObject::new(5, "A", ObjectKind::Instance);
        let stale = heap.get_reference(Some(&first));
        drop(first);

        let second = ConcreteObject::new(5, "B", ObjectKind::Instance);
        let allocated = heap.new_uninitialized_reference("B");
        heap.initialize_reference(&allocated, &second);
        let field = FieldKey::new("B", "x");
        let x = SymbolicValue::make_variable("x", 3.into(), ValueKind::Int);
        heap.put_field(&field, &allocated, x.clone());

        let found = heap.get_reference(Some(&second));
        assert!(Rc::ptr_eq(&found, &allocated));
        assert!(!Rc::ptr_eq(&found, &stale));
        assert!(Rc::ptr_eq(&heap.get_field(&field, &found, 3.into()), &x));
    }

    #[test]
    fn a_live_identity_keeps_its_reference() {
        let mut heap = SymbolicHeap::new(100);
        let object = ConcreteObject::new(5, "A", ObjectKind::Instance);
        let canonical = heap.get_reference(Some(&object));
        let other = heap.new_uninitialized_reference("A");
        heap.initialize_reference(&other, &object);
        assert!(Rc::ptr_eq(&heap.get_reference(Some(&object)), &canonical));
    }

    #[test]
    fn stale_static_values_are_dropped() {
        let mut heap = SymbolicHeap::new(100);
        let field = FieldKey::new("Foo", "f");
        let x = SymbolicValue::make_variable("x", 3.into(), ValueKind::Int);
        heap.put_static(&field, x);
        assert_eq!(heap.stored_values(), 1);
        let read = heap.get_static(&field, 4.into());
        assert!(!read.is_symbolic());
        assert_eq!(heap.stored_values(), 0);
    }
}
