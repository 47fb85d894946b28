// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
#![allow(dead_code)]

use shadow_vm::descriptor::ValueKind;
use shadow_vm::executor::SymbolicExecutor;
use shadow_vm::operand::{HostValue, Operand};
use shadow_vm::options::Options;
use shadow_vm::path_constraint::BranchLocation;
use shadow_vm::reference::{ConcreteObject, ObjectKind, Reference};
use shadow_vm::symbolic_value::SymbolicValue;
use std::rc::Rc;

/// An executor that is already inside `Main.run()V`, as if called by code that is not
/// instrumented.
pub fn setup_executor() -> SymbolicExecutor {
    let mut executor = SymbolicExecutor::new(Options::default());
    executor.method_begin("Main", "run", "()V", true).unwrap();
    executor
}

pub fn location(branch_index: u32) -> BranchLocation {
    BranchLocation::new("Main", "run", branch_index)
}

pub fn operand(executor: &SymbolicExecutor, depth: usize) -> Operand {
    executor
        .env()
        .top_frame()
        .unwrap()
        .operand_stack
        .peek(depth)
        .unwrap()
        .clone()
}

pub fn top_value(executor: &SymbolicExecutor, kind: ValueKind) -> Rc<SymbolicValue> {
    operand(executor, 0).value(kind).unwrap().clone()
}

pub fn top_reference(executor: &SymbolicExecutor) -> Rc<Reference> {
    operand(executor, 0).reference().unwrap().clone()
}

pub fn stack_len(executor: &SymbolicExecutor) -> usize {
    executor.env().top_frame().unwrap().operand_stack.len()
}

pub fn object(identity_hash: i32, class_name: &str) -> Rc<ConcreteObject> {
    ConcreteObject::new(identity_hash, class_name, ObjectKind::Instance)
}

pub fn string(identity_hash: i32, value: &str) -> Rc<ConcreteObject> {
    ConcreteObject::new(
        identity_hash,
        "java/lang/String",
        ObjectKind::String {
            value: Rc::from(value),
        },
    )
}

pub fn array(identity_hash: i32, length: i32) -> Rc<ConcreteObject> {
    ConcreteObject::new(identity_hash, "[I", ObjectKind::Array { length })
}

pub fn reference(object: &Rc<ConcreteObject>) -> HostValue {
    HostValue::Reference(Some(object.clone()))
}
