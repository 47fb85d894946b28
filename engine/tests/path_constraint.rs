// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use common::{location, setup_executor, top_value};
use shadow_vm::arithmetic_visitor::{BinaryInstruction, ComparisonInstruction};
use shadow_vm::descriptor::ValueKind;
use shadow_vm::expression::Expression;
use shadow_vm::jump_visitor::Condition;
use shadow_vm::operand::HostValue;
use shadow_vm::path_constraint::{BranchKind, Comparator};
use std::rc::Rc;

#[test]
fn branches_are_recorded_in_order_with_their_side_conditions() {
    let mut executor = setup_executor();
    executor.symbolic_input("x", HostValue::Int(5)).unwrap();
    executor.store(ValueKind::Int, 0).unwrap();

    // if (x > 0)
    executor.load(ValueKind::Int, 0).unwrap();
    executor.if_zero(Condition::Gt, location(1), 5).unwrap();

    // if (10 / x == 0)
    executor.constant(HostValue::Int(10)).unwrap();
    executor.load(ValueKind::Int, 0).unwrap();
    executor.binary(BinaryInstruction::IDiv).unwrap();
    executor.if_zero(Condition::Eq, location(2), 2).unwrap();

    // if (x < 3)
    executor.load(ValueKind::Int, 0).unwrap();
    executor.constant(HostValue::Int(3)).unwrap();
    executor.if_compare(Condition::Lt, location(3), 5, 3).unwrap();

    let snapshot = executor.snapshot();
    assert_eq!(snapshot.len(), 3);

    assert_eq!(snapshot[0].location, location(1));
    assert_eq!(snapshot[0].kind, BranchKind::If { taken: true });
    assert_eq!(snapshot[0].constraint.comparator, Comparator::Gt);
    assert!(snapshot[0].supporting_constraints.is_empty());

    assert_eq!(snapshot[1].kind, BranchKind::If { taken: false });
    assert_eq!(snapshot[1].constraint.comparator, Comparator::Ne);
    assert!(matches!(
        snapshot[1].constraint.left.expression,
        Expression::Div { .. }
    ));
    assert_eq!(snapshot[1].supporting_constraints.len(), 1);
    assert_eq!(
        snapshot[1].supporting_constraints[0].comparator,
        Comparator::Ne
    );

    assert_eq!(snapshot[2].kind, BranchKind::If { taken: false });
    assert_eq!(snapshot[2].constraint.comparator, Comparator::Ge);
    assert_eq!(snapshot[2].constraint.right.concrete.as_i64(), 3);
    assert!(snapshot[2].supporting_constraints.is_empty());
    assert!(executor
        .env()
        .path_constraint
        .pending_supporting_constraints()
        .is_empty());
}

#[test]
fn concrete_branches_are_not_recorded() {
    let mut executor = setup_executor();
    executor.constant(HostValue::Int(1)).unwrap();
    executor.if_zero(Condition::Ne, location(0), 1).unwrap();
    executor.constant(HostValue::Int(1)).unwrap();
    executor.constant(HostValue::Int(2)).unwrap();
    executor.if_compare(Condition::Lt, location(1), 1, 2).unwrap();
    assert!(executor.snapshot().is_empty());
    assert_eq!(common::stack_len(&executor), 0);
}

#[test]
fn jumps_on_a_three_way_comparison_compare_its_operands() {
    let mut executor = setup_executor();
    executor.symbolic_input("x", HostValue::Long(3)).unwrap();
    let x = top_value(&executor, ValueKind::Long);
    executor.constant(HostValue::Long(9)).unwrap();
    executor.comparison(ComparisonInstruction::LCmp).unwrap();
    executor.if_zero(Condition::Lt, location(0), -1).unwrap();

    let snapshot = executor.snapshot();
    assert_eq!(snapshot.len(), 1);
    let constraint = &snapshot[0].constraint;
    assert!(Rc::ptr_eq(&constraint.left, &x));
    assert_eq!(constraint.comparator, Comparator::Lt);
    assert_eq!(constraint.right.concrete.as_i64(), 9);
}

#[test]
fn jumps_on_a_nan_comparison_keep_the_sentinel() {
    let mut executor = setup_executor();
    executor.symbolic_input("x", HostValue::Double(f64::NAN)).unwrap();
    executor.constant(HostValue::Double(1.0)).unwrap();
    executor.comparison(ComparisonInstruction::DCmpG).unwrap();
    let sentinel = top_value(&executor, ValueKind::Int);
    assert_eq!(sentinel.concrete.as_i64(), 1);
    executor.if_zero(Condition::Gt, location(0), 1).unwrap();

    let snapshot = executor.snapshot();
    assert_eq!(snapshot.len(), 1);
    let constraint = &snapshot[0].constraint;
    assert!(Rc::ptr_eq(&constraint.left, &sentinel));
    assert!(matches!(
        constraint.left.expression,
        Expression::Compare { .. }
    ));
    assert_eq!(constraint.comparator, Comparator::Gt);
    assert_eq!(constraint.right.concrete.as_i64(), 0);
}

#[test]
fn a_matching_table_switch_case_excludes_the_others() {
    let mut executor = setup_executor();
    executor.symbolic_input("x", HostValue::Int(2)).unwrap();
    executor.table_switch(location(0), 2, 1, 3).unwrap();
    let snapshot = executor.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].kind, BranchKind::Switch { goal: 2 });
    assert_eq!(snapshot[0].constraint.comparator, Comparator::Eq);
    let excluded: Vec<i64> = snapshot[0]
        .supporting_constraints
        .iter()
        .map(|c| {
            assert_eq!(c.comparator, Comparator::Ne);
            c.right.concrete.as_i64()
        })
        .collect();
    assert_eq!(excluded, vec![1, 3]);
}

#[test]
fn a_lookup_switch_default_excludes_every_case() {
    let mut executor = setup_executor();
    executor.symbolic_input("x", HostValue::Int(7)).unwrap();
    executor.lookup_switch(location(0), 7, &[1, 5]).unwrap();
    let snapshot = executor.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].kind, BranchKind::DefaultSwitch);
    assert_eq!(snapshot[0].constraint.comparator, Comparator::Ne);
    assert_eq!(snapshot[0].constraint.right.concrete.as_i64(), 5);
    assert_eq!(snapshot[0].supporting_constraints.len(), 1);
    assert_eq!(
        snapshot[0].supporting_constraints[0].right.concrete.as_i64(),
        1
    );
}

#[test]
fn an_empty_switch_records_nothing() {
    let mut executor = setup_executor();
    executor.symbolic_input("x", HostValue::Int(7)).unwrap();
    executor.lookup_switch(location(0), 7, &[]).unwrap();
    assert!(executor.snapshot().is_empty());
}

#[test]
fn snapshots_do_not_change_afterwards() {
    let mut executor = setup_executor();
    executor.symbolic_input("x", HostValue::Int(5)).unwrap();
    executor.store(ValueKind::Int, 0).unwrap();
    executor.load(ValueKind::Int, 0).unwrap();
    executor.if_zero(Condition::Ne, location(0), 5).unwrap();
    let first = executor.snapshot();

    executor.load(ValueKind::Int, 0).unwrap();
    executor.if_zero(Condition::Lt, location(1), 5).unwrap();
    let second = executor.snapshot();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 2);
    assert!(Rc::ptr_eq(&first[0], &second[0]));
    assert_eq!(second[1].kind, BranchKind::If { taken: false });
    assert_eq!(second[1].constraint.comparator, Comparator::Ge);
}

#[test]
fn snapshots_serialize_for_the_solver() {
    let mut executor = setup_executor();
    executor.symbolic_input("x", HostValue::Int(5)).unwrap();
    executor.if_zero(Condition::Gt, location(4), 5).unwrap();
    let json = serde_json::to_value(executor.snapshot()).unwrap();
    let branch = &json[0];
    assert_eq!(branch["location"]["branch_index"], 4);
    assert_eq!(branch["kind"]["If"]["taken"], true);
    assert_eq!(branch["constraint"]["comparator"], "Gt");
}
