// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::descriptor::ValueKind;
use crate::environment::SymbolicEnvironment;
use crate::errors::Result;
use crate::expression::Expression;
use crate::path_constraint::{BranchKind, BranchLocation, Comparator, Constraint};
use crate::reference::ConcreteObject;
use crate::symbolic_value::{SymbolicValue, SymbolicValueTrait};

use log_derive::logfn_inputs;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// The condition of a conditional jump, as in IFEQ or IF_ICMPEQ.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Condition {
    pub fn comparator(self) -> Comparator {
        match self {
            Condition::Eq => Comparator::Eq,
            Condition::Ne => Comparator::Ne,
            Condition::Lt => Comparator::Lt,
            Condition::Ge => Comparator::Ge,
            Condition::Gt => Comparator::Gt,
            Condition::Le => Comparator::Le,
        }
    }

    pub fn holds(self, left: i32, right: i32) -> bool {
        match self {
            Condition::Eq => left == right,
            Condition::Ne => left != right,
            Condition::Lt => left < right,
            Condition::Ge => left >= right,
            Condition::Gt => left > right,
            Condition::Le => left <= right,
        }
    }
}

/// Handles conditional jumps and switches, which is where the path constraint grows.
pub struct JumpVisitor<'env> {
    pub env: &'env mut SymbolicEnvironment,
}

impl Debug for JumpVisitor<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        "JumpVisitor".fmt(f)
    }
}

impl<'env> JumpVisitor<'env> {
    pub fn new(env: &'env mut SymbolicEnvironment) -> JumpVisitor<'env> {
        JumpVisitor { env }
    }

    /// IFEQ, IFNE, IFLT, IFGE, IFGT and IFLE, which compare the top of the stack with zero.
    /// The value is what the concrete machine compared.
    #[logfn_inputs(TRACE)]
    pub fn visit_if_zero(
        &mut self,
        condition: Condition,
        location: BranchLocation,
        value: i32,
    ) -> Result<()> {
        let operand = self.env.stack()?.pop_value(ValueKind::Int)?;
        let taken = condition.holds(value, 0);
        let comparator = if taken {
            condition.comparator()
        } else {
            condition.comparator().negate()
        };
        if !operand.is_symbolic() {
            return Ok(());
        }
        // A jump on the result of a three way comparison is a comparison of its operands,
        // unless an operand is NaN and the result is the comparison's fixed sentinel.
        if let Expression::Compare { left, right, .. } = &operand.expression {
            if !left.concrete.is_nan() && !right.concrete.is_nan() {
                self.env.record_branch(
                    location,
                    BranchKind::If { taken },
                    left.clone(),
                    comparator,
                    right.clone(),
                );
                return Ok(());
            }
        }
        let zero = SymbolicValue::make_constant(0.into());
        self.env
            .record_branch(location, BranchKind::If { taken }, operand, comparator, zero);
        Ok(())
    }

    /// IF_ICMPxx
    #[logfn_inputs(TRACE)]
    pub fn visit_if_compare(
        &mut self,
        condition: Condition,
        location: BranchLocation,
        left: i32,
        right: i32,
    ) -> Result<()> {
        let stack = self.env.stack()?;
        let right_value = stack.pop_value(ValueKind::Int)?.canonical();
        let left_value = stack.pop_value(ValueKind::Int)?.canonical();
        let taken = condition.holds(left, right);
        let comparator = if taken {
            condition.comparator()
        } else {
            condition.comparator().negate()
        };
        self.env.record_branch(
            location,
            BranchKind::If { taken },
            left_value,
            comparator,
            right_value,
        );
        Ok(())
    }

    /// IF_ACMPEQ and IF_ACMPNE. References are never symbolic, so this only keeps the stack in
    /// step and links the references to their objects.
    #[logfn_inputs(TRACE)]
    pub fn visit_if_reference(
        &mut self,
        left: Option<Rc<ConcreteObject>>,
        right: Option<Rc<ConcreteObject>>,
    ) -> Result<()> {
        let stack = self.env.stack()?;
        let right_reference = stack.pop_reference()?;
        let left_reference = stack.pop_reference()?;
        self.env.link_reference(&right_reference, right.as_ref());
        self.env.link_reference(&left_reference, left.as_ref());
        Ok(())
    }

    /// IFNULL and IFNONNULL
    #[logfn_inputs(TRACE)]
    pub fn visit_if_null(&mut self, value: Option<Rc<ConcreteObject>>) -> Result<()> {
        let reference = self.env.stack()?.pop_reference()?;
        self.env.link_reference(&reference, value.as_ref());
        Ok(())
    }

    /// TABLESWITCH, with the cases low to high.
    #[logfn_inputs(TRACE)]
    pub fn visit_table_switch(
        &mut self,
        location: BranchLocation,
        value: i32,
        low: i32,
        high: i32,
    ) -> Result<()> {
        let goals: Vec<i32> = if low <= high {
            (low..=high).collect()
        } else {
            Vec::new()
        };
        self.visit_switch(location, value, &goals)
    }

    /// LOOKUPSWITCH
    #[logfn_inputs(TRACE)]
    pub fn visit_lookup_switch(
        &mut self,
        location: BranchLocation,
        value: i32,
        goals: &[i32],
    ) -> Result<()> {
        self.visit_switch(location, value, goals)
    }

    /// The cases that were not taken become side conditions of the branch. If no case matched,
    /// the last of them is the branch itself.
    fn visit_switch(&mut self, location: BranchLocation, value: i32, goals: &[i32]) -> Result<()> {
        let operand = self.env.stack()?.pop_value(ValueKind::Int)?;
        if !operand.is_symbolic() {
            return Ok(());
        }
        let constant = |goal: i32| SymbolicValue::make_constant(goal.into());
        let mut skipped: Vec<i32> = goals.iter().copied().filter(|g| *g != value).collect();
        let (kind, comparator, goal) = if goals.contains(&value) {
            (BranchKind::Switch { goal: value }, Comparator::Eq, value)
        } else {
            match skipped.pop() {
                Some(last) => (BranchKind::DefaultSwitch, Comparator::Ne, last),
                None => return Ok(()),
            }
        };
        for skipped_goal in skipped {
            self.env.path_constraint.add_supporting_constraint(Constraint::new(
                operand.clone(),
                Comparator::Ne,
                constant(skipped_goal),
            ));
        }
        self.env
            .record_branch(location, kind, operand, comparator, constant(goal));
        Ok(())
    }

    /// ATHROW
    #[logfn_inputs(TRACE)]
    pub fn visit_throw(&mut self, exception: Option<Rc<ConcreteObject>>) -> Result<()> {
        let reference = self.env.stack()?.pop_reference()?;
        self.env.link_reference(&reference, exception.as_ref());
        Ok(())
    }
}
