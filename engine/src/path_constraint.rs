// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::expression::{Expression, ExpressionType};
use crate::symbolic_value::SymbolicValue;

use log_derive::{logfn, logfn_inputs};
use rpds::List;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter, Result};
use std::rc::Rc;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    /// The comparator that holds exactly when self does not.
    pub fn negate(self) -> Comparator {
        match self {
            Comparator::Eq => Comparator::Ne,
            Comparator::Ne => Comparator::Eq,
            Comparator::Lt => Comparator::Ge,
            Comparator::Le => Comparator::Gt,
            Comparator::Gt => Comparator::Le,
            Comparator::Ge => Comparator::Lt,
        }
    }

    /// The comparator to use when the operands trade places.
    pub fn swap(self) -> Comparator {
        match self {
            Comparator::Lt => Comparator::Gt,
            Comparator::Le => Comparator::Ge,
            Comparator::Gt => Comparator::Lt,
            Comparator::Ge => Comparator::Le,
            other => other,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ConstraintKind {
    Integer,
    Real,
    String,
}

/// A comparison between two expressions that held on the path taken.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub left: Rc<SymbolicValue>,
    pub comparator: Comparator,
    pub right: Rc<SymbolicValue>,
}

impl Debug for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self)
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{} {} {}",
            self.left,
            self.comparator.symbol(),
            self.right
        )
    }
}

impl Constraint {
    /// A numeric constraint. Its kind is real if either side is real.
    pub fn new(left: Rc<SymbolicValue>, comparator: Comparator, right: Rc<SymbolicValue>) -> Self {
        let kind = if left.expression_type == ExpressionType::Real
            || right.expression_type == ExpressionType::Real
        {
            ConstraintKind::Real
        } else {
            ConstraintKind::Integer
        };
        Constraint {
            kind,
            left,
            comparator,
            right,
        }
    }

    /// True if either side depends on an input. Constraints that are not symbolic hold on every
    /// path and tell the solver nothing.
    pub fn is_symbolic(&self) -> bool {
        self.left.is_symbolic() || self.right.is_symbolic()
    }

    /// Rewrites an integer comparison between the 0/1 result of a string predicate and a
    /// constant into a string constraint, with the predicate on the left.
    #[logfn(TRACE)]
    pub fn normalize(self) -> Constraint {
        if self.kind != ConstraintKind::Integer
            || !matches!(self.comparator, Comparator::Eq | Comparator::Ne)
        {
            return self;
        }
        let is_constant = |v: &Rc<SymbolicValue>| v.expression == Expression::Constant;
        if self.left.expression.is_string_comparison() && is_constant(&self.right) {
            Constraint {
                kind: ConstraintKind::String,
                ..self
            }
        } else if self.right.expression.is_string_comparison() && is_constant(&self.left) {
            Constraint {
                kind: ConstraintKind::String,
                left: self.right,
                comparator: self.comparator.swap(),
                right: self.left,
            }
        } else {
            self
        }
    }
}

/// Where a branch happened. Implicit checks, such as array bounds checks, have no index.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BranchLocation {
    pub class_name: Rc<str>,
    pub method_name: Rc<str>,
    pub branch_index: Option<u32>,
}

impl BranchLocation {
    pub fn new(class_name: &str, method_name: &str, branch_index: u32) -> BranchLocation {
        BranchLocation {
            class_name: Rc::from(class_name),
            method_name: Rc::from(method_name),
            branch_index: Some(branch_index),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BranchKind {
    If { taken: bool },
    Switch { goal: i32 },
    DefaultSwitch,
    /// An array index check. Violated if the check failed and the access faulted.
    ArrayAccess { violated: bool },
}

/// One link of the path constraint.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct BranchCondition {
    pub location: BranchLocation,
    pub kind: BranchKind,
    pub constraint: Constraint,
    /// The side conditions that accumulated since the previous branch.
    pub supporting_constraints: Vec<Constraint>,
}

/// Side conditions waiting for the next branch.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ConstraintBuffer {
    constraints: Vec<Constraint>,
}

impl ConstraintBuffer {
    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Hands over the buffered constraints and leaves the buffer empty.
    pub fn drain(&mut self) -> Vec<Constraint> {
        std::mem::take(&mut self.constraints)
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }
}

/// The conditions of the branches taken so far, most recent first.
///
/// Earlier links are never changed once recorded, so the chain is kept as a persistent list
/// that snapshots can share with the live builder.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PathConstraint {
    branches: List<Rc<BranchCondition>>,
    supporting_constraints: ConstraintBuffer,
}

impl PathConstraint {
    /// Buffers a side condition until the next branch is recorded.
    #[logfn_inputs(TRACE)]
    pub fn add_supporting_constraint(&mut self, constraint: Constraint) {
        self.supporting_constraints.push(constraint.normalize());
    }

    /// Appends a branch to the chain. The buffered side conditions go with it.
    #[logfn_inputs(TRACE)]
    pub fn record_branch(
        &mut self,
        location: BranchLocation,
        kind: BranchKind,
        constraint: Constraint,
    ) -> Rc<BranchCondition> {
        let branch = Rc::new(BranchCondition {
            location,
            kind,
            constraint: constraint.normalize(),
            supporting_constraints: self.supporting_constraints.drain(),
        });
        self.branches.push_front_mut(branch.clone());
        branch
    }

    /// The recorded branches, oldest first.
    pub fn snapshot(&self) -> Vec<Rc<BranchCondition>> {
        let mut result: Vec<Rc<BranchCondition>> = self.branches.iter().cloned().collect();
        result.reverse();
        result
    }

    /// The most recently recorded branch.
    pub fn last_branch(&self) -> Option<&Rc<BranchCondition>> {
        self.branches.first()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Side conditions that have not been attached to a branch yet.
    pub fn pending_supporting_constraints(&self) -> &ConstraintBuffer {
        &self.supporting_constraints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ValueKind;

    #[test]
    fn drain_empties_the_buffer() {
        let x = SymbolicValue::make_variable("x", 1.into(), ValueKind::Int);
        let zero = SymbolicValue::make_constant(0.into());
        let mut buffer = ConstraintBuffer::default();
        buffer.push(Constraint::new(x, Comparator::Ne, zero));
        assert_eq!(buffer.drain().len(), 1);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn negation_and_swapping_are_involutions() {
        for c in [
            Comparator::Eq,
            Comparator::Ne,
            Comparator::Lt,
            Comparator::Le,
            Comparator::Gt,
            Comparator::Ge,
        ] {
            assert_eq!(c.negate().negate(), c);
            assert_eq!(c.swap().swap(), c);
        }
        assert_eq!(Comparator::Lt.swap(), Comparator::Gt);
        assert_eq!(Comparator::Lt.negate(), Comparator::Ge);
    }

    #[test]
    fn real_operands_make_real_constraints() {
        let x = SymbolicValue::make_variable("x", 1.5f64.into(), ValueKind::Double);
        let one = SymbolicValue::make_constant(1.into());
        assert_eq!(Constraint::new(one, Comparator::Lt, x).kind, ConstraintKind::Real);
    }
}
