// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::descriptor::ValueKind;
use crate::environment::SymbolicEnvironment;
use crate::errors::{Result, VmError};
use crate::operand::{HostValue, Operand, OperandStack};
use crate::symbolic_value::SymbolicValue;

use log_derive::logfn_inputs;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StackInstruction {
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
}

/// Handles constants, locals and the instructions that shuffle the operand stack.
///
/// The shuffles are defined in terms of stack words, while the shadow stack holds one entry per
/// value. Which entries move therefore depends on whether the values involved take up one word
/// or two, and every form below mirrors one of the forms in the instruction set definition.
pub struct StackVisitor<'env> {
    pub env: &'env mut SymbolicEnvironment,
}

impl Debug for StackVisitor<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        "StackVisitor".fmt(f)
    }
}

impl<'env> StackVisitor<'env> {
    pub fn new(env: &'env mut SymbolicEnvironment) -> StackVisitor<'env> {
        StackVisitor { env }
    }

    /// Pushes a constant, such as the operand of `ldc` or `bipush`.
    #[logfn_inputs(TRACE)]
    pub fn visit_constant(&mut self, value: HostValue) -> Result<()> {
        let operand = self.env.operand_for(&value)?;
        self.env.stack()?.push(operand);
        Ok(())
    }

    /// Pushes an input of the program under test. Numbers become variables. A string becomes a
    /// string reference whose contents are a variable.
    #[logfn_inputs(TRACE)]
    pub fn visit_symbolic_input(&mut self, name: &str, value: HostValue) -> Result<()> {
        let kind = value.kind();
        let operand = match &value {
            HostValue::Reference(Some(object)) => {
                let contents = object.string_value().ok_or_else(|| {
                    VmError::unexpected(format!(
                        "symbolic input {} is a {} rather than a string",
                        name, object.class_name
                    ))
                })?;
                let variable = SymbolicValue::make_variable(
                    name,
                    contents.clone().into(),
                    ValueKind::Reference,
                );
                let reference = self.env.heap.new_string_reference(variable);
                self.env.heap.rebind_reference(&reference, object);
                Operand::Reference(reference)
            }
            HostValue::Reference(None) => {
                return Err(VmError::unexpected(format!(
                    "symbolic input {} is null",
                    name
                )))
            }
            _ => {
                let concrete = value.numeric_value(kind)?;
                Operand::from_value(kind, SymbolicValue::make_variable(name, concrete, kind))?
            }
        };
        self.env.stack()?.push(operand);
        Ok(())
    }

    /// xLOAD
    #[logfn_inputs(TRACE)]
    pub fn visit_load(&mut self, kind: ValueKind, index: usize) -> Result<()> {
        let frame = self.env.top_frame_mut()?;
        let operand = frame.locals.load_kind(index, kind)?.clone();
        frame.operand_stack.push(operand);
        Ok(())
    }

    /// xSTORE
    #[logfn_inputs(TRACE)]
    pub fn visit_store(&mut self, kind: ValueKind, index: usize) -> Result<()> {
        let frame = self.env.top_frame_mut()?;
        let operand = frame.operand_stack.pop()?;
        if operand.kind() != kind {
            return Err(VmError::OperandMismatch {
                expected: kind.name(),
                found: operand.kind().name(),
            });
        }
        frame.locals.store(index, operand);
        Ok(())
    }

    #[logfn_inputs(TRACE)]
    pub fn visit_stack(&mut self, instruction: StackInstruction) -> Result<()> {
        let stack = self.env.stack()?;
        match instruction {
            StackInstruction::Pop => {
                pop_single(stack)?;
            }
            StackInstruction::Pop2 => {
                if !stack.pop()?.is_double_slot() {
                    pop_single(stack)?;
                }
            }
            StackInstruction::Dup => {
                let a = stack.peek(0)?.clone();
                check_single(&a)?;
                stack.push(a);
            }
            StackInstruction::DupX1 => {
                let a = pop_single(stack)?;
                let b = pop_single(stack)?;
                stack.push(a.clone());
                stack.push(b);
                stack.push(a);
            }
            StackInstruction::DupX2 => {
                let a = pop_single(stack)?;
                let b = stack.pop()?;
                if b.is_double_slot() {
                    // Form 2: a single value over a double one.
                    stack.push(a.clone());
                    stack.push(b);
                    stack.push(a);
                } else {
                    // Form 1: three single values.
                    let c = pop_single(stack)?;
                    stack.push(a.clone());
                    stack.push(c);
                    stack.push(b);
                    stack.push(a);
                }
            }
            StackInstruction::Dup2 => {
                let a = stack.pop()?;
                if a.is_double_slot() {
                    // Form 2
                    stack.push(a.clone());
                    stack.push(a);
                } else {
                    // Form 1
                    let b = pop_single(stack)?;
                    stack.push(b.clone());
                    stack.push(a.clone());
                    stack.push(b);
                    stack.push(a);
                }
            }
            StackInstruction::Dup2X1 => {
                let a = stack.pop()?;
                if a.is_double_slot() {
                    // Form 2
                    let b = pop_single(stack)?;
                    stack.push(a.clone());
                    stack.push(b);
                    stack.push(a);
                } else {
                    // Form 1
                    let b = pop_single(stack)?;
                    let c = pop_single(stack)?;
                    stack.push(b.clone());
                    stack.push(a.clone());
                    stack.push(c);
                    stack.push(b);
                    stack.push(a);
                }
            }
            StackInstruction::Dup2X2 => {
                let a = stack.pop()?;
                if a.is_double_slot() {
                    let b = stack.pop()?;
                    if b.is_double_slot() {
                        // Form 4
                        stack.push(a.clone());
                        stack.push(b);
                        stack.push(a);
                    } else {
                        // Form 2
                        let c = pop_single(stack)?;
                        stack.push(a.clone());
                        stack.push(c);
                        stack.push(b);
                        stack.push(a);
                    }
                } else {
                    let b = pop_single(stack)?;
                    let c = stack.pop()?;
                    if c.is_double_slot() {
                        // Form 3
                        stack.push(b.clone());
                        stack.push(a.clone());
                        stack.push(c);
                        stack.push(b);
                        stack.push(a);
                    } else {
                        // Form 1
                        let d = pop_single(stack)?;
                        stack.push(b.clone());
                        stack.push(a.clone());
                        stack.push(d);
                        stack.push(c);
                        stack.push(b);
                        stack.push(a);
                    }
                }
            }
            StackInstruction::Swap => {
                let a = pop_single(stack)?;
                let b = pop_single(stack)?;
                stack.push(a);
                stack.push(b);
            }
        }
        Ok(())
    }
}

fn check_single(operand: &Operand) -> Result<()> {
    if operand.is_double_slot() {
        return Err(VmError::OperandMismatch {
            expected: "single slot value",
            found: operand.kind().name(),
        });
    }
    Ok(())
}

fn pop_single(stack: &mut OperandStack) -> Result<Operand> {
    let operand = stack.pop()?;
    check_single(&operand)?;
    Ok(operand)
}
