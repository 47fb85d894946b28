// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use common::{
    location, object, reference, setup_executor, stack_len, string, top_reference, top_value,
};
use shadow_vm::arithmetic_visitor::BinaryInstruction;
use shadow_vm::concrete_value::ConcreteValue;
use shadow_vm::descriptor::ValueKind;
use shadow_vm::errors::VmError;
use shadow_vm::executor::SymbolicExecutor;
use shadow_vm::expression::{
    Expression, MathFunction, StringComparison, StringToNumberFunction,
};
use shadow_vm::frame::{Dispatch, FrameKind};
use shadow_vm::jump_visitor::Condition;
use shadow_vm::operand::{HostValue, Operand};
use shadow_vm::options::Options;
use shadow_vm::path_constraint::{Comparator, ConstraintKind};
use shadow_vm::reference::{ConcreteObject, ObjectKind};
use std::rc::Rc;

#[test]
fn instrumented_callees_compute_on_the_callers_operands() {
    let mut executor = setup_executor();
    executor.symbolic_input("a", HostValue::Int(3)).unwrap();
    executor.constant(HostValue::Int(5)).unwrap();
    executor
        .invoke(Dispatch::Static, "Main", "add", "(II)I", None)
        .unwrap();
    executor.caller_stack_param(0, HostValue::Int(3)).unwrap();
    executor.caller_stack_param(1, HostValue::Int(5)).unwrap();

    executor.method_begin("Main", "add", "(II)I", true).unwrap();
    executor.method_begin_param(0, HostValue::Int(3)).unwrap();
    executor.method_begin_param(1, HostValue::Int(5)).unwrap();
    executor.load(ValueKind::Int, 0).unwrap();
    executor.load(ValueKind::Int, 1).unwrap();
    executor.binary(BinaryInstruction::IAdd).unwrap();
    executor.method_return(Some(ValueKind::Int)).unwrap();
    executor
        .call_result("Main", "add", "(II)I", Some(HostValue::Int(8)))
        .unwrap();

    assert_eq!(stack_len(&executor), 1);
    let sum = top_value(&executor, ValueKind::Int);
    assert!(matches!(sum.expression, Expression::Add { .. }));
    assert_eq!(sum.concrete.as_i64(), 8);
    assert_eq!(executor.statistics().opaque_calls, 0);
}

#[test]
fn opaque_calls_produce_constants() {
    let mut executor = setup_executor();
    executor.symbolic_input("a", HostValue::Int(3)).unwrap();
    executor
        .invoke(Dispatch::Static, "Lib", "f", "(I)I", None)
        .unwrap();
    executor.caller_stack_param(0, HostValue::Int(3)).unwrap();
    executor
        .call_result("Lib", "f", "(I)I", Some(HostValue::Int(9)))
        .unwrap();
    assert_eq!(stack_len(&executor), 1);
    let result = top_value(&executor, ValueKind::Int);
    assert!(!result.is_symbolic());
    assert_eq!(result.concrete.as_i64(), 9);
    assert_eq!(executor.statistics().opaque_calls, 1);
}

#[test]
fn instance_methods_receive_the_callers_reference() {
    let mut executor = setup_executor();
    let point = object(1, "Point");
    executor.constant(reference(&point)).unwrap();
    executor.symbolic_input("x", HostValue::Int(4)).unwrap();
    let x = top_value(&executor, ValueKind::Int);
    executor
        .invoke(Dispatch::Virtual, "Point", "setX", "(I)V", Some(point.clone()))
        .unwrap();
    executor.caller_stack_param(0, HostValue::Int(4)).unwrap();

    executor.method_begin("Point", "setX", "(I)V", false).unwrap();
    executor.method_begin_receiver(Some(point.clone())).unwrap();
    executor.method_begin_param(0, HostValue::Int(4)).unwrap();
    executor.load(ValueKind::Reference, 0).unwrap();
    executor.load(ValueKind::Int, 1).unwrap();
    executor
        .put_field("Point", "x", "I", Some(point.clone()))
        .unwrap();
    executor.method_return(None).unwrap();
    executor.call_result("Point", "setX", "(I)V", None).unwrap();
    assert_eq!(stack_len(&executor), 0);

    executor.constant(reference(&point)).unwrap();
    executor
        .get_field("Point", "x", "I", Some(point), HostValue::Int(4))
        .unwrap();
    assert!(Rc::ptr_eq(&top_value(&executor, ValueKind::Int), &x));
}

#[test]
fn a_static_entry_for_an_instance_call_is_a_desynchronization() {
    let mut executor = setup_executor();
    let point = object(1, "Point");
    executor.constant(reference(&point)).unwrap();
    executor
        .invoke(Dispatch::Virtual, "Point", "reset", "()V", Some(point))
        .unwrap();
    let error = executor
        .method_begin("Point", "reset", "()V", true)
        .unwrap_err();
    assert!(error.is_desynchronization());
}

#[test]
fn uninstrumented_callers_seed_the_parameters() {
    let mut executor = SymbolicExecutor::new(Options::default());
    executor.method_begin("Main", "go", "(IJ)V", true).unwrap();
    executor.method_begin_param(0, HostValue::Int(1)).unwrap();
    executor.method_begin_param(1, HostValue::Long(2)).unwrap();
    executor.load(ValueKind::Int, 0).unwrap();
    executor.load(ValueKind::Long, 1).unwrap();
    assert_eq!(top_value(&executor, ValueKind::Long).concrete.as_i64(), 2);
    assert!(matches!(
        executor.method_begin_param(0, HostValue::Long(1)),
        Err(VmError::OperandMismatch { .. })
    ));
}

#[test]
fn the_receiver_of_an_uninstrumented_call_is_the_canonical_reference() {
    let mut executor = SymbolicExecutor::new(Options::default());
    let point = object(1, "Point");
    executor.method_begin("Point", "getX", "()I", false).unwrap();
    executor.method_begin_receiver(Some(point.clone())).unwrap();
    let receiver = match executor.env().top_frame().unwrap().locals.load(0).unwrap() {
        Operand::Reference(receiver) => receiver.clone(),
        operand => panic!("unexpected receiver {:?}", operand.kind()),
    };
    assert!(receiver.points_to(&point));
}

#[test]
fn constructors_entered_from_uninstrumented_code_allocate_their_receiver() {
    let mut executor = SymbolicExecutor::new(Options::default());
    let point = object(1, "Point");
    executor.method_begin("Point", "<init>", "()V", false).unwrap();
    let allocated = match executor.env().top_frame().unwrap().locals.load(0).unwrap() {
        Operand::Reference(allocated) => allocated.clone(),
        operand => panic!("unexpected receiver {:?}", operand.kind()),
    };
    assert!(!allocated.is_initialized());
    executor.method_begin_receiver(Some(point.clone())).unwrap();
    assert!(allocated.points_to(&point));
    executor.constant(reference(&point)).unwrap();
    assert!(Rc::ptr_eq(&top_reference(&executor), &allocated));
}

#[test]
fn string_length_is_summarized() {
    let mut executor = setup_executor();
    let s = string(1, "hello");
    executor.symbolic_input("s", reference(&s)).unwrap();
    executor
        .invoke(Dispatch::Virtual, "java/lang/String", "length", "()I", Some(s))
        .unwrap();
    executor
        .call_result("java/lang/String", "length", "()I", Some(HostValue::Int(5)))
        .unwrap();
    let length = top_value(&executor, ValueKind::Int);
    assert_eq!(length.concrete.as_i64(), 5);
    assert!(matches!(
        length.expression,
        Expression::StringToNumber {
            function: StringToNumberFunction::Length,
            ..
        }
    ));
    let statistics = executor.statistics();
    assert_eq!(statistics.summarized_calls, 1);
    assert_eq!(statistics.opaque_calls, 0);
}

#[test]
fn string_equality_becomes_a_string_constraint() {
    let mut executor = setup_executor();
    let s = string(1, "abc");
    let literal = string(2, "abc");
    executor.symbolic_input("s", reference(&s)).unwrap();
    executor.constant(reference(&literal)).unwrap();
    let equals = "(Ljava/lang/Object;)Z";
    executor
        .invoke(Dispatch::Virtual, "java/lang/String", "equals", equals, Some(s))
        .unwrap();
    executor.caller_stack_param(0, reference(&literal)).unwrap();
    executor
        .call_result("java/lang/String", "equals", equals, Some(HostValue::Int(1)))
        .unwrap();
    let result = top_value(&executor, ValueKind::Int);
    assert!(matches!(
        result.expression,
        Expression::StringComparison {
            comparison: StringComparison::Equals,
            ..
        }
    ));

    executor.if_zero(Condition::Ne, location(0), 1).unwrap();
    let snapshot = executor.snapshot();
    assert_eq!(snapshot.len(), 1);
    let constraint = &snapshot[0].constraint;
    assert_eq!(constraint.kind, ConstraintKind::String);
    assert_eq!(constraint.comparator, Comparator::Ne);
    assert!(constraint.left.expression.is_string_comparison());
}

#[test]
fn boxing_and_unboxing_preserve_the_expression() {
    let mut executor = setup_executor();
    executor.symbolic_input("x", HostValue::Int(5)).unwrap();
    let x = top_value(&executor, ValueKind::Int);
    let value_of = "(I)Ljava/lang/Integer;";
    executor
        .invoke(Dispatch::Static, "java/lang/Integer", "valueOf", value_of, None)
        .unwrap();
    executor.caller_stack_param(0, HostValue::Int(5)).unwrap();
    let boxed = ConcreteObject::new(
        10,
        "java/lang/Integer",
        ObjectKind::Boxed {
            value: ConcreteValue::Integer(5),
        },
    );
    executor
        .call_result("java/lang/Integer", "valueOf", value_of, Some(reference(&boxed)))
        .unwrap();

    executor
        .invoke(
            Dispatch::Virtual,
            "java/lang/Integer",
            "intValue",
            "()I",
            Some(boxed),
        )
        .unwrap();
    executor
        .call_result("java/lang/Integer", "intValue", "()I", Some(HostValue::Int(5)))
        .unwrap();
    assert!(Rc::ptr_eq(&top_value(&executor, ValueKind::Int), &x));
    assert_eq!(executor.statistics().summarized_calls, 2);
}

#[test]
fn math_functions_are_summarized() {
    let mut executor = setup_executor();
    executor.symbolic_input("d", HostValue::Double(4.0)).unwrap();
    executor
        .invoke(Dispatch::Static, "java/lang/Math", "sqrt", "(D)D", None)
        .unwrap();
    executor.caller_stack_param(0, HostValue::Double(4.0)).unwrap();
    executor
        .call_result("java/lang/Math", "sqrt", "(D)D", Some(HostValue::Double(2.0)))
        .unwrap();
    let root = top_value(&executor, ValueKind::Double);
    assert_eq!(root.concrete.as_f64(), 2.0);
    assert!(matches!(
        root.expression,
        Expression::MathFunction {
            function: MathFunction::Sqrt,
            ..
        }
    ));
}

#[test]
fn handlers_unwind_to_their_frame() {
    let mut executor = setup_executor();
    executor.constant(HostValue::Int(7)).unwrap();
    executor
        .invoke(Dispatch::Static, "Main", "fail", "()V", None)
        .unwrap();
    executor.method_begin("Main", "fail", "()V", true).unwrap();
    executor.constant(HostValue::Int(1)).unwrap();
    let exception = object(3, "java/lang/RuntimeException");
    executor
        .handler_begin("Main", "run", Some(exception.clone()))
        .unwrap();

    assert_eq!(executor.env().frames.len(), 2);
    let frame = executor.env().top_frame().unwrap();
    assert!(frame.is_method("Main", "run"));
    assert!(frame.pending_call.is_none());
    assert_eq!(stack_len(&executor), 1);
    assert!(top_reference(&executor).points_to(&exception));
}

#[test]
fn a_handler_without_a_frame_is_a_desynchronization() {
    let mut executor = setup_executor();
    let error = executor.handler_begin("Other", "run", None).unwrap_err();
    assert!(error.is_desynchronization());
}

#[test]
fn a_mismatched_result_poisons_the_executor() {
    let mut executor = setup_executor();
    executor
        .invoke(Dispatch::Static, "Lib", "f", "()I", None)
        .unwrap();
    let error = executor
        .call_result("Lib", "g", "()I", Some(HostValue::Int(0)))
        .unwrap_err();
    assert!(matches!(error, VmError::UnexpectedInstruction { .. }));
    assert_eq!(executor.poisoned(), Some(&error));
    assert_eq!(executor.constant(HostValue::Int(0)).unwrap_err(), error);
}

#[test]
fn a_missing_result_is_a_mismatch() {
    let mut executor = setup_executor();
    executor
        .invoke(Dispatch::Static, "Lib", "f", "()I", None)
        .unwrap();
    assert!(matches!(
        executor.call_result("Lib", "f", "()I", None),
        Err(VmError::OperandMismatch {
            expected: "int",
            found: "void"
        })
    ));
}

#[test]
fn a_result_without_a_call_is_a_desynchronization() {
    let mut executor = setup_executor();
    let error = executor.call_result("Lib", "f", "()V", None).unwrap_err();
    assert!(error.is_desynchronization());
}

#[test]
fn static_initializers_run_on_their_own_frame() {
    let mut executor = setup_executor();
    executor.constant(HostValue::Int(9)).unwrap();
    executor.method_begin("Config", "<clinit>", "()V", true).unwrap();
    assert!(matches!(
        &executor.env().top_frame().unwrap().kind,
        FrameKind::ClassInitializer { class_name } if &**class_name == "Config"
    ));
    executor.constant(HostValue::Int(1)).unwrap();
    executor.put_static("Config", "x", "I").unwrap();
    executor.method_return(None).unwrap();

    assert_eq!(executor.env().frames.len(), 2);
    assert!(executor.env().top_frame().unwrap().is_method("Main", "run"));
    assert_eq!(top_value(&executor, ValueKind::Int).concrete.as_i64(), 9);
}
