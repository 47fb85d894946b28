// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::concrete_value::ConcreteValue;
use crate::symbolic_value::SymbolicValue;

use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::fmt::{Debug, Formatter, Result};
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

/// An object that lives in the program under test.
///
/// The host owns these through `Rc` for as long as the concrete program can reach them. The
/// engine only ever keeps a `Weak` to them, so dropping the host's last `Rc` is how the engine
/// learns that an object is gone.
#[derive(Debug, Eq, PartialEq)]
pub struct ConcreteObject {
    /// The identity hash code the runtime reports for the object. Not necessarily unique.
    pub identity_hash: i32,
    pub class_name: Rc<str>,
    pub kind: ObjectKind,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum ObjectKind {
    /// A plain object whose fields live in the symbolic heap.
    Instance,
    Array { length: i32 },
    String { value: Rc<str> },
    /// An instance of one of the primitive wrapper classes.
    Boxed { value: ConcreteValue },
}

impl ConcreteObject {
    pub fn new(identity_hash: i32, class_name: &str, kind: ObjectKind) -> Rc<ConcreteObject> {
        Rc::new(ConcreteObject {
            identity_hash,
            class_name: Rc::from(class_name),
            kind,
        })
    }

    pub fn string_value(&self) -> Option<&Rc<str>> {
        if let ObjectKind::String { value } = &self.kind {
            Some(value)
        } else {
            None
        }
    }

    pub fn array_length(&self) -> Option<i32> {
        if let ObjectKind::Array { length } = &self.kind {
            Some(*length)
        } else {
            None
        }
    }
}

/// The symbolic identity of a non-null object.
pub struct ObjectReference {
    /// Assigned by the heap when the reference is minted. Never reused within a run.
    pub instance_id: u64,
    pub type_name: Rc<str>,
    // Set once, when the concrete object is first observed.
    link: OnceCell<(Weak<ConcreteObject>, i32)>,
}

impl ObjectReference {
    pub fn new(instance_id: u64, type_name: Rc<str>) -> ObjectReference {
        ObjectReference {
            instance_id,
            type_name,
            link: OnceCell::new(),
        }
    }
}

/// A shadow reference value.
///
/// Equality and hashing are by identity: two references are the same only if they were minted
/// by the same call to the heap. This is what the heap maps are keyed on.
pub enum Reference {
    Null,
    Object(ObjectReference),
    /// A reference to a string, together with the symbolic expression for its contents.
    String(ObjectReference, Rc<SymbolicValue>),
}

impl Debug for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Reference::Null => f.write_str("null"),
            Reference::Object(object) => {
                write!(f, "{}#{}", object.type_name, object.instance_id)
            }
            Reference::String(object, value) => {
                write!(f, "string#{}({})", object.instance_id, value)
            }
        }
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Reference) -> bool {
        self.instance_id() == other.instance_id()
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instance_id().hash(state);
    }
}

impl Reference {
    pub fn is_null(&self) -> bool {
        matches!(self, Reference::Null)
    }

    fn object(&self) -> Option<&ObjectReference> {
        match self {
            Reference::Null => None,
            Reference::Object(object) | Reference::String(object, _) => Some(object),
        }
    }

    /// None for the null reference.
    pub fn instance_id(&self) -> Option<u64> {
        self.object().map(|o| o.instance_id)
    }

    pub fn type_name(&self) -> Option<&Rc<str>> {
        self.object().map(|o| &o.type_name)
    }

    /// The symbolic contents, for string references.
    pub fn string_value(&self) -> Option<&Rc<SymbolicValue>> {
        if let Reference::String(_, value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// True once the concrete object behind this reference has been observed.
    pub fn is_initialized(&self) -> bool {
        self.object().map_or(false, |o| o.link.get().is_some())
    }

    /// Links this reference to its concrete object. Returns false if the reference is null or
    /// was already linked, in which case nothing changes.
    pub fn initialize(&self, concrete: &Rc<ConcreteObject>) -> bool {
        match self.object() {
            Some(object) => object
                .link
                .set((Rc::downgrade(concrete), concrete.identity_hash))
                .is_ok(),
            None => false,
        }
    }

    /// The identity hash of the linked concrete object.
    pub fn identity_hash(&self) -> Option<i32> {
        self.object().and_then(|o| o.link.get()).map(|(_, hash)| *hash)
    }

    /// The linked concrete object, if it is still alive.
    pub fn concrete_object(&self) -> Option<Rc<ConcreteObject>> {
        self.object()
            .and_then(|o| o.link.get())
            .and_then(|(weak, _)| weak.upgrade())
    }

    /// True if this reference is linked to exactly the given concrete object.
    pub fn points_to(&self, concrete: &Rc<ConcreteObject>) -> bool {
        self.concrete_object()
            .map_or(false, |object| Rc::ptr_eq(&object, concrete))
    }

    /// An initialized reference whose concrete object has been reclaimed. Nothing that is keyed
    /// by it can ever be looked up again.
    pub fn is_collectible(&self) -> bool {
        match self.object().and_then(|o| o.link.get()) {
            Some((weak, _)) => weak.strong_count() == 0,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_is_set_once_and_does_not_keep_the_object_alive() {
        let reference = Reference::Object(ObjectReference::new(1, Rc::from("Foo")));
        assert!(!reference.is_initialized());
        let first = ConcreteObject::new(7, "Foo", ObjectKind::Instance);
        let second = ConcreteObject::new(7, "Foo", ObjectKind::Instance);
        assert!(reference.initialize(&first));
        assert!(!reference.initialize(&second));
        assert!(reference.points_to(&first));
        assert!(!reference.points_to(&second));
        assert!(!reference.is_collectible());
        drop(first);
        assert!(reference.is_collectible());
        assert_eq!(reference.identity_hash(), Some(7));
    }

    #[test]
    fn null_is_never_collectible() {
        let object = ConcreteObject::new(1, "Foo", ObjectKind::Instance);
        assert!(!Reference::Null.initialize(&object));
        assert!(!Reference::Null.is_collectible());
        assert_eq!(Reference::Null, Reference::Null);
    }
}
