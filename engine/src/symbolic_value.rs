// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::concrete_value::ConcreteValue;
use crate::descriptor::ValueKind;
use crate::expression::{
    CharacterFunction, Expression, ExpressionType, MathBinaryFunction, MathFunction, NarrowWidth,
    StringComparison, StringOperation, StringToNumberFunction,
};

use log_derive::logfn_inputs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Debug, Formatter, Result};
use std::rc::Rc;

/// The shadow of a value computed by the program under test.
///
/// Every value pairs a record of how it was computed (the expression) with the value the
/// concrete execution actually computed. The two never disagree: the concrete value of a
/// composite expression is always the result of applying its operator to the concrete values of
/// its operands, with the semantics of the instruction that produced it.
///
/// A value is symbolic if its expression transitively mentions an input variable. Values that
/// are not symbolic are still tracked, but handlers replace them with fresh constants before
/// using them as operands, so that stale expression trees do not survive.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash)]
pub struct SymbolicValue {
    /// A representation of how this value has been constructed.
    pub expression: Expression,
    /// Integer, real or string.
    pub expression_type: ExpressionType,
    /// What the concrete execution computed for this value.
    pub concrete: ConcreteValue,
    // Computed once, at construction, from the operands.
    is_symbolic: bool,
    // Keeps track of how large the expression is.
    expression_size: u64,
}

impl Debug for SymbolicValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{} = {}", self, self.concrete)
    }
}

impl SymbolicValue {
    /// Creates a value that does not depend on any input.
    #[logfn_inputs(TRACE)]
    pub fn make_constant(concrete: ConcreteValue) -> Rc<SymbolicValue> {
        let expression_type = match &concrete {
            ConcreteValue::Integer(..) => ExpressionType::Integer,
            ConcreteValue::Real(..) => ExpressionType::Real,
            ConcreteValue::Str(..) => ExpressionType::String,
        };
        Rc::new(SymbolicValue {
            expression: Expression::Constant,
            expression_type,
            concrete,
            is_symbolic: false,
            expression_size: 1,
        })
    }

    /// Creates an input variable with the given current value. Numeric variables get the value
    /// range of their kind as bounds.
    #[logfn_inputs(TRACE)]
    pub fn make_variable(name: &str, concrete: ConcreteValue, kind: ValueKind) -> Rc<SymbolicValue> {
        let (expression_type, bounds) = match kind {
            ValueKind::Int => (
                ExpressionType::Integer,
                Some((i32::MIN.into(), i32::MAX.into())),
            ),
            ValueKind::Long => (
                ExpressionType::Integer,
                Some((i64::MIN.into(), i64::MAX.into())),
            ),
            ValueKind::Float => (
                ExpressionType::Real,
                Some((f32::MIN.into(), f32::MAX.into())),
            ),
            ValueKind::Double => (
                ExpressionType::Real,
                Some((f64::MIN.into(), f64::MAX.into())),
            ),
            ValueKind::Reference => (ExpressionType::String, None),
        };
        Rc::new(SymbolicValue {
            expression: Expression::Variable {
                name: Rc::from(name),
                bounds,
            },
            expression_type,
            concrete: concrete.normalize(kind),
            is_symbolic: true,
            expression_size: 1,
        })
    }

    /// Creates a value from the given expression. The symbolic flag and the size are derived
    /// from the operands of the expression.
    #[logfn_inputs(TRACE)]
    pub fn make_from(
        expression: Expression,
        expression_type: ExpressionType,
        concrete: ConcreteValue,
    ) -> Rc<SymbolicValue> {
        let operands = expression.operands();
        let is_symbolic = operands.iter().any(|o| o.is_symbolic);
        let expression_size = operands
            .iter()
            .fold(1u64, |size, o| size.saturating_add(o.expression_size));
        Rc::new(SymbolicValue {
            expression,
            expression_type,
            concrete,
            is_symbolic,
            expression_size,
        })
    }

    fn make_binary(
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
        concrete: ConcreteValue,
        operation: fn(Rc<SymbolicValue>, Rc<SymbolicValue>) -> Expression,
    ) -> Rc<SymbolicValue> {
        let expression_type = left.expression_type;
        Self::make_from(operation(left, right), expression_type, concrete)
    }

    /// True if this value depends on an input variable.
    pub fn is_symbolic(&self) -> bool {
        self.is_symbolic
    }

    /// The number of nodes in the expression tree, counting shared nodes once per use.
    pub fn expression_size(&self) -> u64 {
        self.expression_size
    }

    /// The names of the input variables this value depends on.
    pub fn variables(&self) -> HashSet<Rc<str>> {
        let mut result = HashSet::new();
        self.expression.record_variables(&mut result);
        result
    }
}

pub trait SymbolicValueTrait: Sized {
    fn addition(&self, other: Self, kind: ValueKind) -> Self;
    fn bit_and(&self, other: Self, kind: ValueKind) -> Self;
    fn bit_or(&self, other: Self, kind: ValueKind) -> Self;
    fn bit_xor(&self, other: Self, kind: ValueKind) -> Self;
    fn canonical(&self) -> Self;
    fn cast(&self, from: ValueKind, to: ValueKind) -> Self;
    fn character_function(&self, function: CharacterFunction, concrete: ConcreteValue) -> Self;
    fn compare(&self, other: Self, kind: ValueKind, nan_result: i32) -> Self;
    fn divide(&self, other: Self, kind: ValueKind) -> Option<Self>;
    fn math_function(&self, function: MathFunction, concrete: ConcreteValue) -> Self;
    fn math_binary_function(
        &self,
        function: MathBinaryFunction,
        other: Self,
        concrete: ConcreteValue,
    ) -> Self;
    fn multiply(&self, other: Self, kind: ValueKind) -> Self;
    fn narrow(&self, width: NarrowWidth, concrete: ConcreteValue) -> Self;
    fn negate(&self, kind: ValueKind) -> Self;
    fn remainder(&self, other: Self, kind: ValueKind) -> Option<Self>;
    fn shift_left(&self, other: Self, kind: ValueKind) -> Self;
    fn shr(&self, other: Self, kind: ValueKind) -> Self;
    fn string_comparison(&self, comparison: StringComparison, other: Self, concrete: bool) -> Self;
    fn string_operation(
        &self,
        operation: StringOperation,
        arguments: Vec<Self>,
        concrete: ConcreteValue,
    ) -> Self;
    fn string_to_number(
        &self,
        function: StringToNumberFunction,
        arguments: Vec<Self>,
        concrete: ConcreteValue,
    ) -> Self;
    fn subtract(&self, other: Self, kind: ValueKind) -> Self;
    fn unsigned_shr(&self, other: Self, kind: ValueKind) -> Self;
}

impl SymbolicValueTrait for Rc<SymbolicValue> {
    /// Returns an element that is "self + other".
    #[logfn_inputs(TRACE)]
    fn addition(&self, other: Rc<SymbolicValue>, kind: ValueKind) -> Rc<SymbolicValue> {
        let concrete = self.concrete.add(&other.concrete, kind);
        SymbolicValue::make_binary(self.clone(), other, concrete, |left, right| {
            Expression::Add { left, right }
        })
    }

    /// Returns an element that is "self & other".
    #[logfn_inputs(TRACE)]
    fn bit_and(&self, other: Rc<SymbolicValue>, kind: ValueKind) -> Rc<SymbolicValue> {
        let concrete = self.concrete.bit_and(&other.concrete, kind);
        SymbolicValue::make_binary(self.clone(), other, concrete, |left, right| {
            Expression::BitAnd { left, right }
        })
    }

    /// Returns an element that is "self | other".
    #[logfn_inputs(TRACE)]
    fn bit_or(&self, other: Rc<SymbolicValue>, kind: ValueKind) -> Rc<SymbolicValue> {
        let concrete = self.concrete.bit_or(&other.concrete, kind);
        SymbolicValue::make_binary(self.clone(), other, concrete, |left, right| {
            Expression::BitOr { left, right }
        })
    }

    /// Returns an element that is "self ^ other".
    #[logfn_inputs(TRACE)]
    fn bit_xor(&self, other: Rc<SymbolicValue>, kind: ValueKind) -> Rc<SymbolicValue> {
        let concrete = self.concrete.bit_xor(&other.concrete, kind);
        SymbolicValue::make_binary(self.clone(), other, concrete, |left, right| {
            Expression::BitXor { left, right }
        })
    }

    /// Returns self if it is symbolic, otherwise a freshly minted constant with the same value.
    fn canonical(&self) -> Rc<SymbolicValue> {
        if self.is_symbolic {
            self.clone()
        } else {
            SymbolicValue::make_constant(self.concrete.clone())
        }
    }

    /// Returns an element that is self converted between an integer kind and a real kind.
    #[logfn_inputs(TRACE)]
    fn cast(&self, from: ValueKind, to: ValueKind) -> Rc<SymbolicValue> {
        let target_type = if to.is_real() {
            ExpressionType::Real
        } else {
            ExpressionType::Integer
        };
        let concrete = self.concrete.convert(from, to);
        SymbolicValue::make_from(
            Expression::Cast {
                operand: self.clone(),
                target_type,
            },
            target_type,
            concrete,
        )
    }

    /// Returns an element that applies the given Character function to self.
    #[logfn_inputs(TRACE)]
    fn character_function(
        &self,
        function: CharacterFunction,
        concrete: ConcreteValue,
    ) -> Rc<SymbolicValue> {
        SymbolicValue::make_from(
            Expression::CharacterFunction {
                function,
                operand: self.clone(),
            },
            ExpressionType::Integer,
            concrete,
        )
    }

    /// Returns an element that is -1, 0 or 1 depending on how self compares to other.
    #[logfn_inputs(TRACE)]
    fn compare(&self, other: Rc<SymbolicValue>, kind: ValueKind, nan_result: i32) -> Rc<SymbolicValue> {
        let concrete = self.concrete.compare(&other.concrete, kind, nan_result);
        SymbolicValue::make_from(
            Expression::Compare {
                left: self.clone(),
                right: other,
                nan_result,
            },
            ExpressionType::Integer,
            concrete,
        )
    }

    /// Returns an element that is "self / other", or None if the division faults.
    #[logfn_inputs(TRACE)]
    fn divide(&self, other: Rc<SymbolicValue>, kind: ValueKind) -> Option<Rc<SymbolicValue>> {
        let concrete = self.concrete.div(&other.concrete, kind)?;
        Some(SymbolicValue::make_binary(
            self.clone(),
            other,
            concrete,
            |left, right| Expression::Div { left, right },
        ))
    }

    /// Returns an element that applies the given Math function to self.
    #[logfn_inputs(TRACE)]
    fn math_function(&self, function: MathFunction, concrete: ConcreteValue) -> Rc<SymbolicValue> {
        // Math.round maps a double to a long.
        let expression_type = if function == MathFunction::Round {
            ExpressionType::Integer
        } else {
            self.expression_type
        };
        SymbolicValue::make_from(
            Expression::MathFunction {
                function,
                operand: self.clone(),
            },
            expression_type,
            concrete,
        )
    }

    /// Returns an element that applies the given binary Math function to self and other.
    #[logfn_inputs(TRACE)]
    fn math_binary_function(
        &self,
        function: MathBinaryFunction,
        other: Rc<SymbolicValue>,
        concrete: ConcreteValue,
    ) -> Rc<SymbolicValue> {
        SymbolicValue::make_from(
            Expression::MathBinaryFunction {
                function,
                left: self.clone(),
                right: other,
            },
            self.expression_type,
            concrete,
        )
    }

    /// Returns an element that is "self * other".
    #[logfn_inputs(TRACE)]
    fn multiply(&self, other: Rc<SymbolicValue>, kind: ValueKind) -> Rc<SymbolicValue> {
        let concrete = self.concrete.mul(&other.concrete, kind);
        SymbolicValue::make_binary(self.clone(), other, concrete, |left, right| {
            Expression::Mul { left, right }
        })
    }

    /// Returns an element that is self truncated to a smaller type.
    #[logfn_inputs(TRACE)]
    fn narrow(&self, width: NarrowWidth, concrete: ConcreteValue) -> Rc<SymbolicValue> {
        SymbolicValue::make_from(
            Expression::Narrow {
                operand: self.clone(),
                width,
            },
            self.expression_type,
            concrete,
        )
    }

    /// Returns an element that is "-self".
    #[logfn_inputs(TRACE)]
    fn negate(&self, kind: ValueKind) -> Rc<SymbolicValue> {
        let concrete = self.concrete.neg(kind);
        SymbolicValue::make_from(
            Expression::Neg {
                operand: self.clone(),
            },
            self.expression_type,
            concrete,
        )
    }

    /// Returns an element that is "self % other", or None if the division faults.
    #[logfn_inputs(TRACE)]
    fn remainder(&self, other: Rc<SymbolicValue>, kind: ValueKind) -> Option<Rc<SymbolicValue>> {
        let concrete = self.concrete.rem(&other.concrete, kind)?;
        Some(SymbolicValue::make_binary(
            self.clone(),
            other,
            concrete,
            |left, right| Expression::Rem { left, right },
        ))
    }

    /// Returns an element that is "self << other".
    #[logfn_inputs(TRACE)]
    fn shift_left(&self, other: Rc<SymbolicValue>, kind: ValueKind) -> Rc<SymbolicValue> {
        let concrete = self.concrete.shl(&other.concrete, kind);
        SymbolicValue::make_binary(self.clone(), other, concrete, |left, right| {
            Expression::Shl { left, right }
        })
    }

    /// Returns an element that is "self >> other".
    #[logfn_inputs(TRACE)]
    fn shr(&self, other: Rc<SymbolicValue>, kind: ValueKind) -> Rc<SymbolicValue> {
        let concrete = self.concrete.shr(&other.concrete, kind);
        SymbolicValue::make_binary(self.clone(), other, concrete, |left, right| {
            Expression::Shr { left, right }
        })
    }

    /// Returns an integer element that is 1 if the string predicate holds and 0 otherwise.
    #[logfn_inputs(TRACE)]
    fn string_comparison(
        &self,
        comparison: StringComparison,
        other: Rc<SymbolicValue>,
        concrete: bool,
    ) -> Rc<SymbolicValue> {
        SymbolicValue::make_from(
            Expression::StringComparison {
                comparison,
                left: self.clone(),
                right: other,
            },
            ExpressionType::Integer,
            concrete.into(),
        )
    }

    /// Returns a string element computed from self and the arguments.
    #[logfn_inputs(TRACE)]
    fn string_operation(
        &self,
        operation: StringOperation,
        arguments: Vec<Rc<SymbolicValue>>,
        concrete: ConcreteValue,
    ) -> Rc<SymbolicValue> {
        let mut operands = Vec::with_capacity(arguments.len() + 1);
        operands.push(self.clone());
        operands.extend(arguments);
        SymbolicValue::make_from(
            Expression::StringOperation {
                operation,
                operands,
            },
            ExpressionType::String,
            concrete,
        )
    }

    /// Returns a numeric element computed from self, which must be a string, and the arguments.
    #[logfn_inputs(TRACE)]
    fn string_to_number(
        &self,
        function: StringToNumberFunction,
        arguments: Vec<Rc<SymbolicValue>>,
        concrete: ConcreteValue,
    ) -> Rc<SymbolicValue> {
        let mut operands = Vec::with_capacity(arguments.len() + 1);
        operands.push(self.clone());
        operands.extend(arguments);
        SymbolicValue::make_from(
            Expression::StringToNumber { function, operands },
            function.result_type(),
            concrete,
        )
    }

    /// Returns an element that is "self - other".
    #[logfn_inputs(TRACE)]
    fn subtract(&self, other: Rc<SymbolicValue>, kind: ValueKind) -> Rc<SymbolicValue> {
        let concrete = self.concrete.sub(&other.concrete, kind);
        SymbolicValue::make_binary(self.clone(), other, concrete, |left, right| {
            Expression::Sub { left, right }
        })
    }

    /// Returns an element that is "self >>> other".
    #[logfn_inputs(TRACE)]
    fn unsigned_shr(&self, other: Rc<SymbolicValue>, kind: ValueKind) -> Rc<SymbolicValue> {
        let concrete = self.concrete.ushr(&other.concrete, kind);
        SymbolicValue::make_binary(self.clone(), other, concrete, |left, right| {
            Expression::UnsignedShr { left, right }
        })
    }
}
