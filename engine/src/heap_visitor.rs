// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::concrete_value::ConcreteValue;
use crate::descriptor::ValueKind;
use crate::environment::SymbolicEnvironment;
use crate::errors::{Result, VmError};
use crate::heap::FieldKey;
use crate::operand::HostValue;
use crate::path_constraint::{BranchKind, Comparator, Constraint};
use crate::reference::{ConcreteObject, Reference};
use crate::symbolic_value::{SymbolicValue, SymbolicValueTrait};

use log_derive::logfn_inputs;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Handles field and array access and allocation.
///
/// Numeric values go through the symbolic heap. References are never symbolic, so a reference
/// read from memory is simply the reference that stands for the concrete object the host
/// reports, and a reference written to memory is not recorded anywhere.
///
/// Instructions that fault on the concrete machine, such as a field access through null,
/// consume their operands and push nothing.
pub struct HeapVisitor<'env> {
    pub env: &'env mut SymbolicEnvironment,
}

impl Debug for HeapVisitor<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        "HeapVisitor".fmt(f)
    }
}

impl<'env> HeapVisitor<'env> {
    pub fn new(env: &'env mut SymbolicEnvironment) -> HeapVisitor<'env> {
        HeapVisitor { env }
    }

    /// NEW
    #[logfn_inputs(TRACE)]
    pub fn visit_new(&mut self, class_name: &str) -> Result<()> {
        let reference = self.env.heap.new_uninitialized_reference(class_name);
        self.env.stack()?.push_reference(reference);
        Ok(())
    }

    /// Pops the receiver of a field access and links it. Returns None for null.
    fn pop_holder(&mut self, holder: Option<&Rc<ConcreteObject>>) -> Result<Option<Rc<Reference>>> {
        let reference = self.env.stack()?.pop_reference()?;
        if reference.is_null() || holder.is_none() {
            return Ok(None);
        }
        self.env.link_reference(&reference, holder);
        Ok(Some(reference))
    }

    /// Pushes a value read from memory. Numeric values come from the given reader, references
    /// from the identity table.
    fn push_read<F>(&mut self, kind: ValueKind, value: &HostValue, read: F) -> Result<()>
    where
        F: FnOnce(&mut SymbolicEnvironment, ConcreteValue) -> Rc<SymbolicValue>,
    {
        if kind == ValueKind::Reference {
            let reference = self.env.heap.get_reference(value.object());
            self.env.stack()?.push_reference(reference);
            return Ok(());
        }
        let concrete = value.numeric_value(kind)?.normalize(kind);
        let result = read(&mut *self.env, concrete);
        self.env.stack()?.push_value(kind, result)
    }

    /// GETFIELD. The value is what the concrete machine read.
    #[logfn_inputs(TRACE)]
    pub fn visit_get_field(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        holder: Option<Rc<ConcreteObject>>,
        value: HostValue,
    ) -> Result<()> {
        let kind = ValueKind::from_field_descriptor(descriptor)?;
        let holder = match self.pop_holder(holder.as_ref())? {
            Some(holder) => holder,
            None => return Ok(()),
        };
        let field = FieldKey::new(owner, name);
        self.push_read(kind, &value, |env, concrete| {
            env.heap.get_field(&field, &holder, concrete)
        })
    }

    /// PUTFIELD
    #[logfn_inputs(TRACE)]
    pub fn visit_put_field(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        holder: Option<Rc<ConcreteObject>>,
    ) -> Result<()> {
        let kind = ValueKind::from_field_descriptor(descriptor)?;
        let value = self.env.stack()?.pop()?;
        if value.kind() != kind {
            return Err(VmError::OperandMismatch {
                expected: kind.name(),
                found: value.kind().name(),
            });
        }
        let holder = match self.pop_holder(holder.as_ref())? {
            Some(holder) => holder,
            None => return Ok(()),
        };
        if let Some(value) = value.any_value() {
            self.env
                .heap
                .put_field(&FieldKey::new(owner, name), &holder, value.clone());
        }
        Ok(())
    }

    /// GETSTATIC
    #[logfn_inputs(TRACE)]
    pub fn visit_get_static(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        value: HostValue,
    ) -> Result<()> {
        let kind = ValueKind::from_field_descriptor(descriptor)?;
        let field = FieldKey::new(owner, name);
        self.push_read(kind, &value, |env, concrete| {
            env.heap.get_static(&field, concrete)
        })
    }

    /// PUTSTATIC
    #[logfn_inputs(TRACE)]
    pub fn visit_put_static(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let kind = ValueKind::from_field_descriptor(descriptor)?;
        let value = self.env.stack()?.pop()?;
        if value.kind() != kind {
            return Err(VmError::OperandMismatch {
                expected: kind.name(),
                found: value.kind().name(),
            });
        }
        if let Some(value) = value.any_value() {
            self.env
                .heap
                .put_static(&FieldKey::new(owner, name), value.clone());
        }
        Ok(())
    }

    /// Checks an array length. Returns false if the length is negative and the allocation
    /// faults.
    fn check_length(&mut self, length: &Rc<SymbolicValue>) -> bool {
        let negative = length.concrete.as_i64() < 0;
        if length.is_symbolic() {
            let zero = SymbolicValue::make_constant(0.into());
            let comparator = if negative {
                Comparator::Lt
            } else {
                Comparator::Ge
            };
            self.env
                .path_constraint
                .add_supporting_constraint(Constraint::new(length.clone(), comparator, zero));
        }
        !negative
    }

    /// NEWARRAY and ANEWARRAY
    #[logfn_inputs(TRACE)]
    pub fn visit_new_array(&mut self, type_name: &str) -> Result<()> {
        let length = self.env.stack()?.pop_value(ValueKind::Int)?;
        if !self.check_length(&length) {
            return Ok(());
        }
        let reference = self.env.heap.new_uninitialized_reference(type_name);
        self.env.stack()?.push_reference(reference);
        Ok(())
    }

    /// MULTIANEWARRAY
    #[logfn_inputs(TRACE)]
    pub fn visit_multi_new_array(&mut self, type_name: &str, dimensions: usize) -> Result<()> {
        let mut lengths = Vec::with_capacity(dimensions);
        for _ in 0..dimensions {
            lengths.push(self.env.stack()?.pop_value(ValueKind::Int)?);
        }
        let mut ok = true;
        for length in lengths.iter().rev() {
            ok &= self.check_length(length);
        }
        if ok {
            let reference = self.env.heap.new_uninitialized_reference(type_name);
            self.env.stack()?.push_reference(reference);
        }
        Ok(())
    }

    /// ARRAYLENGTH
    #[logfn_inputs(TRACE)]
    pub fn visit_array_length(&mut self, array: Option<Rc<ConcreteObject>>) -> Result<()> {
        let reference = self.env.stack()?.pop_reference()?;
        let array = match array {
            Some(array) if !reference.is_null() => array,
            _ => return Ok(()),
        };
        self.env.link_reference(&reference, Some(&array));
        let length = array_length(&array)?;
        self.env
            .stack()?
            .push_value(ValueKind::Int, SymbolicValue::make_constant(length.into()))
    }

    /// Records the bounds checks of an array access with a symbolic index. Returns false if
    /// the access faults.
    fn check_index(&mut self, index: &Rc<SymbolicValue>, length: i32) -> bool {
        let concrete_index = index.concrete.as_i32();
        let symbolic = index.is_symbolic();
        let location = self.env.implicit_location();
        let zero = SymbolicValue::make_constant(0.into());
        let negative = concrete_index < 0;
        if symbolic {
            let comparator = if negative {
                Comparator::Lt
            } else {
                Comparator::Ge
            };
            self.env.record_branch(
                location.clone(),
                BranchKind::ArrayAccess { violated: negative },
                index.clone(),
                comparator,
                zero,
            );
        }
        if negative {
            return false;
        }
        let too_big = concrete_index >= length;
        if symbolic {
            let comparator = if too_big {
                Comparator::Ge
            } else {
                Comparator::Lt
            };
            self.env.record_branch(
                location,
                BranchKind::ArrayAccess { violated: too_big },
                index.clone(),
                comparator,
                SymbolicValue::make_constant(length.into()),
            );
        }
        !too_big
    }

    /// xALOAD. The value is the element the concrete machine read.
    #[logfn_inputs(TRACE)]
    pub fn visit_array_load(
        &mut self,
        kind: ValueKind,
        array: Option<Rc<ConcreteObject>>,
        value: HostValue,
    ) -> Result<()> {
        let stack = self.env.stack()?;
        let index = stack.pop_value(ValueKind::Int)?.canonical();
        let reference = stack.pop_reference()?;
        let array = match array {
            Some(array) if !reference.is_null() => array,
            _ => return Ok(()),
        };
        self.env.link_reference(&reference, Some(&array));
        if !self.check_index(&index, array_length(&array)?) {
            return Ok(());
        }
        let index = index.concrete.as_i32();
        self.push_read(kind, &value, |env, concrete| {
            env.heap.get_array_element(&reference, index, concrete)
        })
    }

    /// xASTORE
    #[logfn_inputs(TRACE)]
    pub fn visit_array_store(
        &mut self,
        kind: ValueKind,
        array: Option<Rc<ConcreteObject>>,
    ) -> Result<()> {
        let stack = self.env.stack()?;
        let value = stack.pop()?;
        if value.kind() != kind {
            return Err(VmError::OperandMismatch {
                expected: kind.name(),
                found: value.kind().name(),
            });
        }
        let index = stack.pop_value(ValueKind::Int)?.canonical();
        let reference = stack.pop_reference()?;
        let array = match array {
            Some(array) if !reference.is_null() => array,
            _ => return Ok(()),
        };
        self.env.link_reference(&reference, Some(&array));
        if !self.check_index(&index, array_length(&array)?) {
            return Ok(());
        }
        if let Some(value) = value.any_value() {
            self.env
                .heap
                .put_array_element(&reference, index.concrete.as_i32(), value.clone());
        }
        Ok(())
    }

    /// CHECKCAST. The reference stays on the stack.
    #[logfn_inputs(TRACE)]
    pub fn visit_check_cast(&mut self, value: Option<Rc<ConcreteObject>>) -> Result<()> {
        let reference = self.env.stack()?.peek(0)?.reference()?.clone();
        self.env.link_reference(&reference, value.as_ref());
        Ok(())
    }

    /// INSTANCEOF
    #[logfn_inputs(TRACE)]
    pub fn visit_instance_of(
        &mut self,
        value: Option<Rc<ConcreteObject>>,
        result: bool,
    ) -> Result<()> {
        let reference = self.env.stack()?.pop_reference()?;
        self.env.link_reference(&reference, value.as_ref());
        self.env
            .stack()?
            .push_value(ValueKind::Int, SymbolicValue::make_constant(result.into()))
    }
}

fn array_length(array: &ConcreteObject) -> Result<i32> {
    array.array_length().ok_or_else(|| {
        VmError::unexpected(format!("{} is not an array", array.class_name))
    })
}
