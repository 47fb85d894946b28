// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::concrete_value::ConcreteValue;
use crate::symbolic_value::SymbolicValue;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result};
use std::rc::Rc;

/// Closely based on the values that a JVM instruction stream computes with.
/// Sub expressions are shared and immutable, so a node can be referenced from many stack slots,
/// locals and heap locations at once.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Expression {
    /// A value that does not depend on any symbolic input. The value itself is the concrete
    /// value of the enclosing SymbolicValue.
    Constant,

    /// A designated input of the program under test.
    Variable {
        /// Used by the solver to report assignments.
        name: Rc<str>,
        /// The smallest and largest values the variable can take, for numeric variables.
        bounds: Option<(ConcreteValue, ConcreteValue)>,
    },

    /// An expression that is the sum of left and right. +
    Add {
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },

    /// An expression that is the bitwise and of left and right. &
    BitAnd {
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },

    /// An expression that is the bitwise or of left and right. |
    BitOr {
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },

    /// An expression that is the bitwise xor of left and right. ^
    BitXor {
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },

    /// An expression that converts an integer to a real or a real to an integer.
    /// The source type is the type of the operand.
    Cast {
        operand: Rc<SymbolicValue>,
        target_type: ExpressionType,
    },

    /// A helper function of java.lang.Character applied to a char value.
    CharacterFunction {
        function: CharacterFunction,
        operand: Rc<SymbolicValue>,
    },

    /// The -1/0/1 result of lcmp, fcmpl, fcmpg, dcmpl or dcmpg.
    Compare {
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
        /// The result when either operand is NaN. Zero for integer comparisons.
        nan_result: i32,
    },

    /// An expression that is left divided by right. /
    Div {
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },

    /// A unary function from java.lang.Math.
    MathFunction {
        function: MathFunction,
        operand: Rc<SymbolicValue>,
    },

    /// A binary function from java.lang.Math.
    MathBinaryFunction {
        function: MathBinaryFunction,
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },

    /// An expression that is left multiplied by right. *
    Mul {
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },

    /// A narrowing conversion that lost information, such as i2b or l2i applied to a value
    /// that does not fit the smaller type.
    Narrow {
        operand: Rc<SymbolicValue>,
        width: NarrowWidth,
    },

    /// An expression that is zero minus operand. -
    Neg { operand: Rc<SymbolicValue> },

    /// An expression that is the remainder of left divided by right. %
    Rem {
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },

    /// An expression that is left shifted left by right bits. <<
    Shl {
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },

    /// An expression that is left shifted right by right bits, with sign extension. >>
    Shr {
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },

    /// A string predicate that is 1 if true and 0 otherwise.
    StringComparison {
        comparison: StringComparison,
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },

    /// A numeric value computed from a string, such as its length or the index of a substring.
    /// The first operand is always the string.
    StringToNumber {
        function: StringToNumberFunction,
        operands: Vec<Rc<SymbolicValue>>,
    },

    /// A new string computed from other values. Operands are the receiver first, then the
    /// arguments of the operation.
    StringOperation {
        operation: StringOperation,
        operands: Vec<Rc<SymbolicValue>>,
    },

    /// An expression that is left minus right. -
    Sub {
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },

    /// An expression that is left shifted right by right bits, shifting in zeros. >>>
    UnsignedShr {
        left: Rc<SymbolicValue>,
        right: Rc<SymbolicValue>,
    },
}

/// The mathematical domain of an expression. Bit widths are a property of the instruction that
/// produced the value, not of the value.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ExpressionType {
    Integer,
    Real,
    String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NarrowWidth {
    Byte,
    Char,
    Short,
    Int,
    Float,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CharacterFunction {
    GetNumericValue,
    IsDigit,
    IsLetter,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MathFunction {
    Abs,
    Ceil,
    Cos,
    Exp,
    Floor,
    Log,
    Log10,
    Round,
    Sin,
    Sqrt,
    Tan,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MathBinaryFunction {
    Atan2,
    Max,
    Min,
    Pow,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StringComparison {
    Contains,
    EndsWith,
    Equals,
    EqualsIgnoreCase,
    /// The left operand matches the regular expression on the right.
    Matches,
    StartsWith,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StringToNumberFunction {
    CharAt,
    CompareTo,
    CompareToIgnoreCase,
    IndexOfChar,
    IndexOfCharFrom,
    IndexOfString,
    IndexOfStringFrom,
    LastIndexOfChar,
    LastIndexOfCharFrom,
    LastIndexOfString,
    LastIndexOfStringFrom,
    Length,
    ParseDouble,
    ParseInt,
    ParseLong,
    /// 1 if the regions match, 0 otherwise. The operands are the receiver, its offset, the
    /// other string, its offset and the region length.
    RegionMatches,
    /// Like RegionMatches, with the ignore case flag as the second operand.
    RegionMatchesIgnoreCase,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StringOperation {
    Concat,
    /// Replaces every occurrence of a character or character sequence.
    Replace,
    ReplaceAll,
    ReplaceFirst,
    Substring,
    ToLowerCase,
    ToUpperCase,
    Trim,
    /// String.valueOf of a primitive value.
    ValueOf,
}

impl StringToNumberFunction {
    pub fn result_type(self) -> ExpressionType {
        if self == StringToNumberFunction::ParseDouble {
            ExpressionType::Real
        } else {
            ExpressionType::Integer
        }
    }
}

impl Expression {
    /// The immediate sub expressions of this expression, left to right.
    pub fn operands(&self) -> Vec<&Rc<SymbolicValue>> {
        match self {
            Expression::Constant | Expression::Variable { .. } => Vec::new(),
            Expression::Add { left, right }
            | Expression::BitAnd { left, right }
            | Expression::BitOr { left, right }
            | Expression::BitXor { left, right }
            | Expression::Compare { left, right, .. }
            | Expression::Div { left, right }
            | Expression::MathBinaryFunction { left, right, .. }
            | Expression::Mul { left, right }
            | Expression::Rem { left, right }
            | Expression::Shl { left, right }
            | Expression::Shr { left, right }
            | Expression::StringComparison { left, right, .. }
            | Expression::Sub { left, right }
            | Expression::UnsignedShr { left, right } => vec![left, right],
            Expression::Cast { operand, .. }
            | Expression::CharacterFunction { operand, .. }
            | Expression::MathFunction { operand, .. }
            | Expression::Narrow { operand, .. }
            | Expression::Neg { operand } => vec![operand],
            Expression::StringToNumber { operands, .. }
            | Expression::StringOperation { operands, .. } => operands.iter().collect(),
        }
    }

    /// Adds the names of all variables found in the expression to the given set.
    pub fn record_variables(&self, result: &mut HashSet<Rc<str>>) {
        if let Expression::Variable { name, .. } = self {
            result.insert(name.clone());
        }
        for operand in self.operands() {
            if operand.is_symbolic() {
                operand.expression.record_variables(result);
            }
        }
    }

    /// True for the integer encoding of a string predicate.
    pub fn is_string_comparison(&self) -> bool {
        matches!(self, Expression::StringComparison { .. })
    }

    fn operator_symbol(&self) -> Option<&'static str> {
        Some(match self {
            Expression::Add { .. } => "+",
            Expression::BitAnd { .. } => "&",
            Expression::BitOr { .. } => "|",
            Expression::BitXor { .. } => "^",
            Expression::Div { .. } => "/",
            Expression::Mul { .. } => "*",
            Expression::Rem { .. } => "%",
            Expression::Shl { .. } => "<<",
            Expression::Shr { .. } => ">>",
            Expression::Sub { .. } => "-",
            Expression::UnsignedShr { .. } => ">>>",
            _ => return None,
        })
    }
}

impl Display for SymbolicValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let expression = &self.expression;
        if let Some(symbol) = expression.operator_symbol() {
            let operands = expression.operands();
            return write!(f, "({} {} {})", operands[0], symbol, operands[1]);
        }
        match expression {
            Expression::Constant => write!(f, "{}", self.concrete),
            Expression::Variable { name, .. } => write!(f, "{}", name),
            Expression::Cast {
                operand,
                target_type,
            } => write!(f, "({:?}) {}", target_type, operand),
            Expression::CharacterFunction { function, operand } => {
                write!(f, "{:?}({})", function, operand)
            }
            Expression::Compare { left, right, .. } => write!(f, "cmp({}, {})", left, right),
            Expression::MathFunction { function, operand } => {
                write!(f, "{:?}({})", function, operand)
            }
            Expression::MathBinaryFunction {
                function,
                left,
                right,
            } => write!(f, "{:?}({}, {})", function, left, right),
            Expression::Narrow { operand, width } => write!(f, "({:?}) {}", width, operand),
            Expression::Neg { operand } => write!(f, "-{}", operand),
            Expression::StringComparison {
                comparison,
                left,
                right,
            } => write!(f, "{:?}({}, {})", comparison, left, right),
            Expression::StringToNumber { function, operands } => {
                write!(f, "{:?}(", function)?;
                write_operand_list(f, operands)
            }
            Expression::StringOperation {
                operation,
                operands,
            } => {
                write!(f, "{:?}(", operation)?;
                write_operand_list(f, operands)
            }
            _ => write!(f, "{:?}", expression),
        }
    }
}

fn write_operand_list(f: &mut Formatter<'_>, operands: &[Rc<SymbolicValue>]) -> Result {
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", operand)?;
    }
    f.write_str(")")
}
