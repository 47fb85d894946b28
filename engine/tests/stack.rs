// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use common::{setup_executor, stack_len};
use shadow_vm::descriptor::ValueKind;
use shadow_vm::errors::VmError;
use shadow_vm::executor::SymbolicExecutor;
use shadow_vm::operand::HostValue;
use shadow_vm::stack_visitor::StackInstruction;

/// The stack from bottom to top, as (kind, value) pairs.
fn contents(executor: &SymbolicExecutor) -> Vec<(ValueKind, i64)> {
    let stack = &executor.env().top_frame().unwrap().operand_stack;
    stack
        .iter()
        .map(|operand| {
            let value = operand.any_value().map_or(-1, |v| v.concrete.as_i64());
            (operand.kind(), value)
        })
        .collect()
}

fn push(executor: &mut SymbolicExecutor, values: &[HostValue]) {
    for value in values {
        executor.constant(value.clone()).unwrap();
    }
}

use HostValue::{Int as I, Long as L};
use ValueKind::{Int, Long};

/// Runs the instruction on top of a marker and checks that the marker is untouched.
fn shuffle(values: &[HostValue], instruction: StackInstruction) -> Vec<(ValueKind, i64)> {
    let mut executor = setup_executor();
    executor.constant(I(99)).unwrap();
    push(&mut executor, values);
    executor.stack(instruction).unwrap();
    let mut result = contents(&executor);
    assert_eq!(result.remove(0), (Int, 99), "{:?} disturbed the stack", instruction);
    result
}

#[test]
fn pop_and_pop2() {
    assert_eq!(shuffle(&[I(1), I(2)], StackInstruction::Pop), vec![(Int, 1)]);
    assert_eq!(shuffle(&[I(1), I(2), I(3)], StackInstruction::Pop2), vec![(Int, 1)]);
    assert_eq!(shuffle(&[I(1), L(2)], StackInstruction::Pop2), vec![(Int, 1)]);
}

#[test]
fn dup_forms() {
    assert_eq!(
        shuffle(&[I(1)], StackInstruction::Dup),
        vec![(Int, 1), (Int, 1)]
    );
    assert_eq!(
        shuffle(&[I(1), I(2)], StackInstruction::DupX1),
        vec![(Int, 2), (Int, 1), (Int, 2)]
    );
    // Three single values.
    assert_eq!(
        shuffle(&[I(1), I(2), I(3)], StackInstruction::DupX2),
        vec![(Int, 3), (Int, 1), (Int, 2), (Int, 3)]
    );
    // A single value over a double one.
    assert_eq!(
        shuffle(&[L(1), I(2)], StackInstruction::DupX2),
        vec![(Int, 2), (Long, 1), (Int, 2)]
    );
}

#[test]
fn dup2_forms() {
    assert_eq!(
        shuffle(&[I(1), I(2)], StackInstruction::Dup2),
        vec![(Int, 1), (Int, 2), (Int, 1), (Int, 2)]
    );
    assert_eq!(
        shuffle(&[L(1)], StackInstruction::Dup2),
        vec![(Long, 1), (Long, 1)]
    );
    assert_eq!(
        shuffle(&[I(1), I(2), I(3)], StackInstruction::Dup2X1),
        vec![(Int, 2), (Int, 3), (Int, 1), (Int, 2), (Int, 3)]
    );
    assert_eq!(
        shuffle(&[I(1), L(2)], StackInstruction::Dup2X1),
        vec![(Long, 2), (Int, 1), (Long, 2)]
    );
}

#[test]
fn dup2_x2_forms() {
    // Form 1
    assert_eq!(
        shuffle(&[I(1), I(2), I(3), I(4)], StackInstruction::Dup2X2),
        vec![(Int, 3), (Int, 4), (Int, 1), (Int, 2), (Int, 3), (Int, 4)]
    );
    // Form 2
    assert_eq!(
        shuffle(&[I(1), I(2), L(3)], StackInstruction::Dup2X2),
        vec![(Long, 3), (Int, 1), (Int, 2), (Long, 3)]
    );
    // Form 3
    assert_eq!(
        shuffle(&[L(1), I(2), I(3)], StackInstruction::Dup2X2),
        vec![(Int, 2), (Int, 3), (Long, 1), (Int, 2), (Int, 3)]
    );
    // Form 4
    assert_eq!(
        shuffle(&[L(1), L(2)], StackInstruction::Dup2X2),
        vec![(Long, 2), (Long, 1), (Long, 2)]
    );
}

#[test]
fn swap_exchanges_single_values() {
    assert_eq!(
        shuffle(&[I(1), I(2)], StackInstruction::Swap),
        vec![(Int, 2), (Int, 1)]
    );
}

#[test]
fn single_slot_forms_reject_double_values() {
    for instruction in [
        StackInstruction::Pop,
        StackInstruction::Dup,
        StackInstruction::Swap,
    ] {
        let mut executor = setup_executor();
        push(&mut executor, &[I(1), L(2)]);
        let error = executor.stack(instruction).unwrap_err();
        assert!(
            matches!(error, VmError::OperandMismatch { .. }),
            "{:?}",
            instruction
        );
    }
}

#[test]
fn loads_check_the_slot_category() {
    let mut executor = setup_executor();
    executor.constant(L(5)).unwrap();
    executor.store(Long, 0).unwrap();
    assert_eq!(stack_len(&executor), 0);
    executor.load(Long, 0).unwrap();
    assert_eq!(contents(&executor), vec![(Long, 5)]);
    assert!(matches!(
        executor.load(Int, 0),
        Err(VmError::LocalMismatch { index: 0, .. })
    ));
}

#[test]
fn a_double_value_invalidates_the_next_local() {
    let mut executor = setup_executor();
    executor.constant(I(1)).unwrap();
    executor.store(Int, 1).unwrap();
    executor.constant(L(2)).unwrap();
    executor.store(Long, 0).unwrap();
    assert_eq!(
        executor.load(Int, 1).unwrap_err(),
        VmError::UndefinedLocal { index: 1 }
    );
}

#[test]
fn store_checks_the_operand_kind() {
    let mut executor = setup_executor();
    executor.constant(HostValue::Float(1.5)).unwrap();
    assert!(matches!(
        executor.store(Int, 0),
        Err(VmError::OperandMismatch { .. })
    ));
}

#[test]
fn popping_an_empty_stack_fails() {
    let mut executor = setup_executor();
    assert_eq!(
        executor.stack(StackInstruction::Pop).unwrap_err(),
        VmError::EmptyOperandStack
    );
}
