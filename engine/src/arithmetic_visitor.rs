// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::descriptor::ValueKind;
use crate::environment::SymbolicEnvironment;
use crate::errors::Result;
use crate::expression::NarrowWidth;
use crate::operand::Operand;
use crate::path_constraint::{Comparator, Constraint};
use crate::symbolic_value::{SymbolicValue, SymbolicValueTrait};

use log_derive::logfn_inputs;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BinaryOperation {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    UShr,
    And,
    Or,
    Xor,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BinaryInstruction {
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    IShl,
    LShl,
    IShr,
    LShr,
    IUShr,
    LUShr,
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
}

impl BinaryInstruction {
    /// The operation and the kind of its result, which is also the kind of the left operand.
    pub fn decode(self) -> (BinaryOperation, ValueKind) {
        use BinaryInstruction::*;
        use BinaryOperation as Op;
        use ValueKind::*;
        match self {
            IAdd => (Op::Add, Int),
            LAdd => (Op::Add, Long),
            FAdd => (Op::Add, Float),
            DAdd => (Op::Add, Double),
            ISub => (Op::Sub, Int),
            LSub => (Op::Sub, Long),
            FSub => (Op::Sub, Float),
            DSub => (Op::Sub, Double),
            IMul => (Op::Mul, Int),
            LMul => (Op::Mul, Long),
            FMul => (Op::Mul, Float),
            DMul => (Op::Mul, Double),
            IDiv => (Op::Div, Int),
            LDiv => (Op::Div, Long),
            FDiv => (Op::Div, Float),
            DDiv => (Op::Div, Double),
            IRem => (Op::Rem, Int),
            LRem => (Op::Rem, Long),
            FRem => (Op::Rem, Float),
            DRem => (Op::Rem, Double),
            IShl => (Op::Shl, Int),
            LShl => (Op::Shl, Long),
            IShr => (Op::Shr, Int),
            LShr => (Op::Shr, Long),
            IUShr => (Op::UShr, Int),
            LUShr => (Op::UShr, Long),
            IAnd => (Op::And, Int),
            LAnd => (Op::And, Long),
            IOr => (Op::Or, Int),
            LOr => (Op::Or, Long),
            IXor => (Op::Xor, Int),
            LXor => (Op::Xor, Long),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum UnaryInstruction {
    INeg,
    LNeg,
    FNeg,
    DNeg,
}

impl UnaryInstruction {
    pub fn kind(self) -> ValueKind {
        match self {
            UnaryInstruction::INeg => ValueKind::Int,
            UnaryInstruction::LNeg => ValueKind::Long,
            UnaryInstruction::FNeg => ValueKind::Float,
            UnaryInstruction::DNeg => ValueKind::Double,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ComparisonInstruction {
    LCmp,
    FCmpL,
    FCmpG,
    DCmpL,
    DCmpG,
}

impl ComparisonInstruction {
    /// The kind of both operands and the result when either of them is NaN.
    pub fn decode(self) -> (ValueKind, i32) {
        match self {
            ComparisonInstruction::LCmp => (ValueKind::Long, 0),
            ComparisonInstruction::FCmpL => (ValueKind::Float, -1),
            ComparisonInstruction::FCmpG => (ValueKind::Float, 1),
            ComparisonInstruction::DCmpL => (ValueKind::Double, -1),
            ComparisonInstruction::DCmpG => (ValueKind::Double, 1),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ConversionInstruction {
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
}

impl ConversionInstruction {
    /// The kinds of the operand and the result.
    pub fn decode(self) -> (ValueKind, ValueKind) {
        use ConversionInstruction::*;
        use ValueKind::*;
        match self {
            I2L => (Int, Long),
            I2F => (Int, Float),
            I2D => (Int, Double),
            L2I => (Long, Int),
            L2F => (Long, Float),
            L2D => (Long, Double),
            F2I => (Float, Int),
            F2L => (Float, Long),
            F2D => (Float, Double),
            D2I => (Double, Int),
            D2L => (Double, Long),
            D2F => (Double, Float),
            I2B | I2C | I2S => (Int, Int),
        }
    }
}

/// Builds the expressions for the numeric instructions.
///
/// Every handler pops its operands, replaces operands that are not symbolic with fresh
/// constants, builds one new node whose concrete value is what the concrete machine computed,
/// and pushes it with the slot category of the result.
pub struct ArithmeticVisitor<'env> {
    pub env: &'env mut SymbolicEnvironment,
}

impl Debug for ArithmeticVisitor<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        "ArithmeticVisitor".fmt(f)
    }
}

impl<'env> ArithmeticVisitor<'env> {
    pub fn new(env: &'env mut SymbolicEnvironment) -> ArithmeticVisitor<'env> {
        ArithmeticVisitor { env }
    }

    #[logfn_inputs(TRACE)]
    pub fn visit_binary(&mut self, instruction: BinaryInstruction) -> Result<()> {
        let (operation, kind) = instruction.decode();
        // Shift distances are always ints, even when shifting longs.
        let right_kind = match operation {
            BinaryOperation::Shl | BinaryOperation::Shr | BinaryOperation::UShr => ValueKind::Int,
            _ => kind,
        };
        let stack = self.env.stack()?;
        let right = stack.pop_value(right_kind)?.canonical();
        let left = stack.pop_value(kind)?.canonical();
        let result = match operation {
            BinaryOperation::Add => left.addition(right, kind),
            BinaryOperation::Sub => left.subtract(right, kind),
            BinaryOperation::Mul => left.multiply(right, kind),
            BinaryOperation::Div | BinaryOperation::Rem => {
                if kind.is_integral() && self.check_zero(&right) {
                    // The concrete machine throws, so there is no result.
                    return Ok(());
                }
                let result = if operation == BinaryOperation::Div {
                    left.divide(right, kind)
                } else {
                    left.remainder(right, kind)
                };
                match result {
                    Some(result) => result,
                    None => return Ok(()),
                }
            }
            BinaryOperation::Shl => left.shift_left(right, kind),
            BinaryOperation::Shr => left.shr(right, kind),
            BinaryOperation::UShr => left.unsigned_shr(right, kind),
            BinaryOperation::And => left.bit_and(right, kind),
            BinaryOperation::Or => left.bit_or(right, kind),
            BinaryOperation::Xor => left.bit_xor(right, kind),
        };
        self.env.stack()?.push_value(kind, result)
    }

    /// Records whether the divisor of an integer division is zero, if the divisor depends on an
    /// input or if the division faults. Returns true if it faults.
    fn check_zero(&mut self, divisor: &Rc<SymbolicValue>) -> bool {
        let is_zero = divisor.concrete.as_i64() == 0;
        if is_zero || divisor.is_symbolic() {
            let zero = SymbolicValue::make_constant(0.into());
            let comparator = if is_zero {
                Comparator::Eq
            } else {
                Comparator::Ne
            };
            self.env
                .path_constraint
                .add_supporting_constraint(Constraint::new(divisor.clone(), comparator, zero));
        }
        is_zero
    }

    #[logfn_inputs(TRACE)]
    pub fn visit_unary(&mut self, instruction: UnaryInstruction) -> Result<()> {
        let kind = instruction.kind();
        let stack = self.env.stack()?;
        let operand = stack.pop_value(kind)?.canonical();
        stack.push_value(kind, operand.negate(kind))
    }

    #[logfn_inputs(TRACE)]
    pub fn visit_comparison(&mut self, instruction: ComparisonInstruction) -> Result<()> {
        let (kind, nan_result) = instruction.decode();
        let stack = self.env.stack()?;
        let right = stack.pop_value(kind)?.canonical();
        let left = stack.pop_value(kind)?.canonical();
        stack.push_value(ValueKind::Int, left.compare(right, kind, nan_result))
    }

    #[logfn_inputs(TRACE)]
    pub fn visit_conversion(&mut self, instruction: ConversionInstruction) -> Result<()> {
        let (from, to) = instruction.decode();
        let stack = self.env.stack()?;
        let operand = stack.pop_value(from)?.canonical();
        let result = match instruction {
            // Widening without loss. The concrete value model does not care about widths.
            ConversionInstruction::I2L | ConversionInstruction::F2D => operand,
            ConversionInstruction::L2I => {
                let value = operand.concrete.as_i64();
                narrow_if_lossy(operand, NarrowWidth::Int, value, value as i32 as i64)
            }
            ConversionInstruction::I2B => {
                let value = operand.concrete.as_i64();
                narrow_if_lossy(operand, NarrowWidth::Byte, value, value as i8 as i64)
            }
            ConversionInstruction::I2C => {
                let value = operand.concrete.as_i64();
                narrow_if_lossy(operand, NarrowWidth::Char, value, value as u16 as i64)
            }
            ConversionInstruction::I2S => {
                let value = operand.concrete.as_i64();
                narrow_if_lossy(operand, NarrowWidth::Short, value, value as i16 as i64)
            }
            ConversionInstruction::D2F => {
                let value = operand.concrete.as_f64();
                let narrowed = value as f32 as f64;
                if narrowed == value || value.is_nan() {
                    operand
                } else {
                    operand.narrow(NarrowWidth::Float, narrowed.into())
                }
            }
            _ => operand.cast(from, to),
        };
        stack.push_value(to, result)
    }

    /// IINC: adds a constant to an int local.
    #[logfn_inputs(TRACE)]
    pub fn visit_increment(&mut self, index: usize, delta: i32) -> Result<()> {
        let frame = self.env.top_frame_mut()?;
        let value = frame
            .locals
            .load_kind(index, ValueKind::Int)?
            .value(ValueKind::Int)?
            .canonical();
        let result = value.addition(SymbolicValue::make_constant(delta.into()), ValueKind::Int);
        frame.locals.store(index, Operand::SingleInteger(result));
        Ok(())
    }
}

fn narrow_if_lossy(
    operand: Rc<SymbolicValue>,
    width: NarrowWidth,
    value: i64,
    narrowed: i64,
) -> Rc<SymbolicValue> {
    if value == narrowed {
        operand
    } else {
        operand.narrow(width, narrowed.into())
    }
}
