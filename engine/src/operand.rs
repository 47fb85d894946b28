// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::concrete_value::ConcreteValue;
use crate::descriptor::ValueKind;
use crate::errors::{Result, VmError};
use crate::k_limits;
use crate::reference::{ConcreteObject, Reference};
use crate::symbolic_value::SymbolicValue;

use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// A value as the concrete machine reports it to the engine.
#[derive(Clone, Debug)]
pub enum HostValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// None is the null reference.
    Reference(Option<Rc<ConcreteObject>>),
}

impl HostValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            HostValue::Int(..) => ValueKind::Int,
            HostValue::Long(..) => ValueKind::Long,
            HostValue::Float(..) => ValueKind::Float,
            HostValue::Double(..) => ValueKind::Double,
            HostValue::Reference(..) => ValueKind::Reference,
        }
    }

    /// The concrete value for numeric values and strings. Other references have no concrete
    /// value the expression model can represent.
    pub fn concrete_value(&self) -> Option<ConcreteValue> {
        match self {
            HostValue::Int(i) => Some((*i).into()),
            HostValue::Long(i) => Some((*i).into()),
            HostValue::Float(f) => Some((*f).into()),
            HostValue::Double(f) => Some((*f).into()),
            HostValue::Reference(object) => object
                .as_ref()
                .and_then(|o| o.string_value())
                .map(|s| ConcreteValue::Str(s.clone())),
        }
    }

    /// The concrete value of a numeric value, or an error naming the expected kind.
    pub fn numeric_value(&self, kind: ValueKind) -> Result<ConcreteValue> {
        if self.kind() != kind || kind == ValueKind::Reference {
            return Err(VmError::OperandMismatch {
                expected: kind.name(),
                found: self.kind().name(),
            });
        }
        self.concrete_value().ok_or(VmError::OperandMismatch {
            expected: kind.name(),
            found: self.kind().name(),
        })
    }

    pub fn object(&self) -> Option<&Rc<ConcreteObject>> {
        if let HostValue::Reference(Some(object)) = self {
            Some(object)
        } else {
            None
        }
    }
}

/// A shadow stack slot. The variant must agree with the word width and category the concrete
/// machine uses for the value in the same position.
#[derive(Clone)]
pub enum Operand {
    SingleInteger(Rc<SymbolicValue>),
    DoubleInteger(Rc<SymbolicValue>),
    SingleReal(Rc<SymbolicValue>),
    DoubleReal(Rc<SymbolicValue>),
    Reference(Rc<Reference>),
}

impl Debug for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::SingleInteger(v)
            | Operand::DoubleInteger(v)
            | Operand::SingleReal(v)
            | Operand::DoubleReal(v) => write!(f, "{}:{:?}", self.kind().name(), v),
            Operand::Reference(r) => r.fmt(f),
        }
    }
}

impl Operand {
    /// Wraps a numeric value into the operand for the given kind.
    pub fn from_value(kind: ValueKind, value: Rc<SymbolicValue>) -> Result<Operand> {
        Ok(match kind {
            ValueKind::Int => Operand::SingleInteger(value),
            ValueKind::Long => Operand::DoubleInteger(value),
            ValueKind::Float => Operand::SingleReal(value),
            ValueKind::Double => Operand::DoubleReal(value),
            ValueKind::Reference => {
                return Err(VmError::OperandMismatch {
                    expected: "numeric value",
                    found: ValueKind::Reference.name(),
                })
            }
        })
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Operand::SingleInteger(..) => ValueKind::Int,
            Operand::DoubleInteger(..) => ValueKind::Long,
            Operand::SingleReal(..) => ValueKind::Float,
            Operand::DoubleReal(..) => ValueKind::Double,
            Operand::Reference(..) => ValueKind::Reference,
        }
    }

    pub fn is_double_slot(&self) -> bool {
        self.kind().is_double_slot()
    }

    /// The numeric value of the operand, if it has the given kind.
    pub fn value(&self, kind: ValueKind) -> Result<&Rc<SymbolicValue>> {
        match self {
            Operand::SingleInteger(v)
            | Operand::DoubleInteger(v)
            | Operand::SingleReal(v)
            | Operand::DoubleReal(v)
                if self.kind() == kind =>
            {
                Ok(v)
            }
            _ => Err(self.mismatch(kind)),
        }
    }

    pub fn reference(&self) -> Result<&Rc<Reference>> {
        if let Operand::Reference(r) = self {
            Ok(r)
        } else {
            Err(self.mismatch(ValueKind::Reference))
        }
    }

    /// The numeric value of the operand regardless of its kind. None for references.
    pub fn any_value(&self) -> Option<&Rc<SymbolicValue>> {
        match self {
            Operand::SingleInteger(v)
            | Operand::DoubleInteger(v)
            | Operand::SingleReal(v)
            | Operand::DoubleReal(v) => Some(v),
            Operand::Reference(..) => None,
        }
    }

    /// True if the operand depends on an input, including string references with symbolic
    /// contents.
    pub fn is_symbolic(&self) -> bool {
        match self {
            Operand::Reference(r) => r.string_value().map_or(false, |v| v.is_symbolic()),
            _ => self.any_value().map_or(false, |v| v.is_symbolic()),
        }
    }

    fn mismatch(&self, expected: ValueKind) -> VmError {
        VmError::OperandMismatch {
            expected: expected.name(),
            found: self.kind().name(),
        }
    }
}

/// The shadow of a frame's operand stack. Each entry is one operand, whatever its width.
#[derive(Clone, Debug)]
pub struct OperandStack {
    operands: Vec<Operand>,
}

impl Default for OperandStack {
    fn default() -> Self {
        OperandStack {
            operands: Vec::with_capacity(k_limits::DEFAULT_STACK_CAPACITY),
        }
    }
}

impl OperandStack {
    pub fn push(&mut self, operand: Operand) {
        self.operands.push(operand);
    }

    pub fn push_value(&mut self, kind: ValueKind, value: Rc<SymbolicValue>) -> Result<()> {
        self.operands.push(Operand::from_value(kind, value)?);
        Ok(())
    }

    pub fn push_reference(&mut self, reference: Rc<Reference>) {
        self.operands.push(Operand::Reference(reference));
    }

    pub fn pop(&mut self) -> Result<Operand> {
        self.operands.pop().ok_or(VmError::EmptyOperandStack)
    }

    pub fn pop_value(&mut self, kind: ValueKind) -> Result<Rc<SymbolicValue>> {
        let operand = self.pop()?;
        Ok(operand.value(kind)?.clone())
    }

    pub fn pop_reference(&mut self) -> Result<Rc<Reference>> {
        let operand = self.pop()?;
        Ok(operand.reference()?.clone())
    }

    /// Pops the given number of operands, discarding them.
    pub fn pop_many(&mut self, count: usize) -> Result<()> {
        if count > self.operands.len() {
            return Err(VmError::EmptyOperandStack);
        }
        self.operands.truncate(self.operands.len() - count);
        Ok(())
    }

    /// The operand `depth` entries below the top. Zero is the top.
    pub fn peek(&self, depth: usize) -> Result<&Operand> {
        self.operands
            .len()
            .checked_sub(depth + 1)
            .and_then(|i| self.operands.get(i))
            .ok_or(VmError::EmptyOperandStack)
    }

    /// Replaces the top operand.
    pub fn replace_top(&mut self, operand: Operand) -> Result<()> {
        let top = self.operands.last_mut().ok_or(VmError::EmptyOperandStack)?;
        *top = operand;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.operands.clear();
    }

    pub fn len(&self) -> usize {
        self.operands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    /// Bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &Operand> {
        self.operands.iter()
    }
}

/// The shadow of a frame's local variables, indexed by slot. A double-slot value stored at `i`
/// makes slot `i + 1` unreadable.
#[derive(Clone, Debug)]
pub struct LocalsTable {
    slots: Vec<Option<Operand>>,
}

impl Default for LocalsTable {
    fn default() -> Self {
        LocalsTable {
            slots: Vec::with_capacity(k_limits::DEFAULT_LOCALS_CAPACITY),
        }
    }
}

impl LocalsTable {
    pub fn store(&mut self, index: usize, operand: Operand) {
        let width = operand.kind().slot_count();
        if self.slots.len() < index + width {
            self.slots.resize(index + width, None);
        }
        // Overwriting the second half of a double-slot value invalidates the whole value.
        if index > 0 {
            if let Some(previous) = &self.slots[index - 1] {
                if previous.is_double_slot() {
                    self.slots[index - 1] = None;
                }
            }
        }
        self.slots[index] = Some(operand);
        if width == 2 {
            self.slots[index + 1] = None;
        }
    }

    pub fn load(&self, index: usize) -> Result<&Operand> {
        self.slots
            .get(index)
            .and_then(|slot| slot.as_ref())
            .ok_or(VmError::UndefinedLocal { index })
    }

    /// Loads a local and checks that it has the category the instruction expects.
    pub fn load_kind(&self, index: usize, kind: ValueKind) -> Result<&Operand> {
        let operand = self.load(index)?;
        if operand.kind() != kind {
            return Err(VmError::LocalMismatch {
                index,
                expected: kind.name(),
                found: operand.kind().name(),
            });
        }
        Ok(operand)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
