// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use common::{object, reference, setup_executor, string, top_reference, top_value};
use shadow_vm::concrete_value::ConcreteValue;
use shadow_vm::descriptor::ValueKind;
use shadow_vm::executor::SymbolicExecutor;
use shadow_vm::expression::{
    Expression, StringComparison, StringOperation, StringToNumberFunction,
};
use shadow_vm::frame::Dispatch;
use shadow_vm::operand::HostValue;
use shadow_vm::reference::{ConcreteObject, ObjectKind};
use shadow_vm::stack_visitor::StackInstruction;
use shadow_vm::symbolic_value::SymbolicValue;
use std::rc::Rc;

const BUILDER: &str = "java/lang/StringBuilder";
const APPEND_STRING: &str = "(Ljava/lang/String;)Ljava/lang/StringBuilder;";
const APPEND_INT: &str = "(I)Ljava/lang/StringBuilder;";
const APPEND_OBJECT: &str = "(Ljava/lang/Object;)Ljava/lang/StringBuilder;";
const TO_STRING: &str = "()Ljava/lang/String;";

// NEW StringBuilder, DUP, INVOKESPECIAL <init>()V. Leaves the builder on the stack.
fn new_builder(executor: &mut SymbolicExecutor) {
    executor.new_object(BUILDER).unwrap();
    executor.stack(StackInstruction::Dup).unwrap();
    executor
        .invoke(Dispatch::Special, BUILDER, "<init>", "()V", None)
        .unwrap();
    executor.call_result(BUILDER, "<init>", "()V", None).unwrap();
}

// Appends the value on top of the stack to the builder below it.
fn append(
    executor: &mut SymbolicExecutor,
    builder: &Rc<ConcreteObject>,
    descriptor: &str,
    argument: HostValue,
) {
    executor
        .invoke(
            Dispatch::Virtual,
            BUILDER,
            "append",
            descriptor,
            Some(builder.clone()),
        )
        .unwrap();
    executor.caller_stack_param(0, argument).unwrap();
    executor
        .call_result(BUILDER, "append", descriptor, Some(reference(builder)))
        .unwrap();
}

fn to_string(
    executor: &mut SymbolicExecutor,
    builder: &Rc<ConcreteObject>,
    text: &Rc<ConcreteObject>,
) {
    executor
        .invoke(
            Dispatch::Virtual,
            BUILDER,
            "toString",
            TO_STRING,
            Some(builder.clone()),
        )
        .unwrap();
    executor
        .call_result(BUILDER, "toString", TO_STRING, Some(reference(text)))
        .unwrap();
}

fn top_string(executor: &SymbolicExecutor) -> Rc<SymbolicValue> {
    top_reference(executor).string_value().unwrap().clone()
}

#[test]
fn concatenation_through_a_builder_keeps_the_expression() {
    let mut executor = setup_executor();
    executor.symbolic_input("x", HostValue::Int(7)).unwrap();
    let x = top_value(&executor, ValueKind::Int);
    executor.store(ValueKind::Int, 0).unwrap();

    // "id=" + x
    let builder = object(20, BUILDER);
    new_builder(&mut executor);
    let allocated = top_reference(&executor);
    let prefix = string(21, "id=");
    executor.constant(reference(&prefix)).unwrap();
    append(&mut executor, &builder, APPEND_STRING, reference(&prefix));
    assert!(Rc::ptr_eq(&top_reference(&executor), &allocated));
    executor.load(ValueKind::Int, 0).unwrap();
    append(&mut executor, &builder, APPEND_INT, HostValue::Int(7));
    to_string(&mut executor, &builder, &string(22, "id=7"));

    let text = top_string(&executor);
    assert!(text.is_symbolic());
    assert_eq!(text.concrete.as_str(), Some("id=7"));
    match &text.expression {
        Expression::StringOperation {
            operation: StringOperation::Concat,
            operands,
        } => {
            assert_eq!(operands[0].concrete.as_str(), Some("id="));
            match &operands[1].expression {
                Expression::StringOperation {
                    operation: StringOperation::ValueOf,
                    operands,
                } => assert!(Rc::ptr_eq(&operands[0], &x)),
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
    let statistics = executor.statistics();
    assert_eq!(statistics.summarized_calls, 4);
    assert_eq!(statistics.opaque_calls, 0);
}

#[test]
fn constant_concatenation_yields_a_constant() {
    let mut executor = setup_executor();
    let builder = object(20, BUILDER);
    new_builder(&mut executor);
    let prefix = string(21, "a");
    executor.constant(reference(&prefix)).unwrap();
    append(&mut executor, &builder, APPEND_STRING, reference(&prefix));
    let text = string(22, "a");
    to_string(&mut executor, &builder, &text);
    assert!(!top_string(&executor).is_symbolic());
    assert!(top_reference(&executor).points_to(&text));
}

#[test]
fn a_builder_with_unknown_text_catches_up_at_to_string() {
    let mut executor = setup_executor();
    let builder = object(20, BUILDER);
    new_builder(&mut executor);
    // The text of an arbitrary object comes from its own toString, which is not followed.
    let point = object(30, "Point");
    executor.constant(reference(&point)).unwrap();
    append(&mut executor, &builder, APPEND_OBJECT, reference(&point));
    executor.stack(StackInstruction::Dup).unwrap();
    to_string(&mut executor, &builder, &string(22, "Point@1e"));
    assert!(!top_string(&executor).is_symbolic());
    executor.stack(StackInstruction::Pop).unwrap();

    // The builder is still on the stack, and its text is known again.
    let s = string(23, "!");
    executor.symbolic_input("s", reference(&s)).unwrap();
    append(&mut executor, &builder, APPEND_STRING, reference(&s));
    to_string(&mut executor, &builder, &string(24, "Point@1e!"));
    let text = top_string(&executor);
    assert!(text.is_symbolic());
    assert_eq!(text.concrete.as_str(), Some("Point@1e!"));
}

#[test]
fn pattern_matches_compares_the_input_with_the_regex() {
    let mut executor = setup_executor();
    let regex = string(1, "[a-z]+");
    let input = string(2, "abc");
    executor.constant(reference(&regex)).unwrap();
    executor.symbolic_input("s", reference(&input)).unwrap();
    let s = top_string(&executor);
    let descriptor = "(Ljava/lang/String;Ljava/lang/CharSequence;)Z";
    let pattern = "java/util/regex/Pattern";
    executor
        .invoke(Dispatch::Static, pattern, "matches", descriptor, None)
        .unwrap();
    executor.caller_stack_param(0, reference(&regex)).unwrap();
    executor.caller_stack_param(1, reference(&input)).unwrap();
    executor
        .call_result(pattern, "matches", descriptor, Some(HostValue::Int(1)))
        .unwrap();
    let result = top_value(&executor, ValueKind::Int);
    assert_eq!(result.concrete.as_i64(), 1);
    match &result.expression {
        Expression::StringComparison {
            comparison: StringComparison::Matches,
            left,
            right,
        } => {
            assert!(Rc::ptr_eq(left, &s));
            assert_eq!(right.concrete.as_str(), Some("[a-z]+"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn replace_produces_a_new_symbolic_string() {
    let mut executor = setup_executor();
    let input = string(1, "banana");
    executor.symbolic_input("s", reference(&input)).unwrap();
    executor.constant(HostValue::Int('a' as i32)).unwrap();
    executor.constant(HostValue::Int('o' as i32)).unwrap();
    let descriptor = "(CC)Ljava/lang/String;";
    executor
        .invoke(
            Dispatch::Virtual,
            "java/lang/String",
            "replace",
            descriptor,
            Some(input),
        )
        .unwrap();
    executor
        .caller_stack_param(0, HostValue::Int('a' as i32))
        .unwrap();
    executor
        .caller_stack_param(1, HostValue::Int('o' as i32))
        .unwrap();
    let replaced = string(2, "bonono");
    executor
        .call_result(
            "java/lang/String",
            "replace",
            descriptor,
            Some(reference(&replaced)),
        )
        .unwrap();
    let text = top_string(&executor);
    assert_eq!(text.concrete.as_str(), Some("bonono"));
    assert!(matches!(
        text.expression,
        Expression::StringOperation {
            operation: StringOperation::Replace,
            ..
        }
    ));
    assert!(top_reference(&executor).points_to(&replaced));
}

#[test]
fn index_of_from_an_offset_is_summarized() {
    let mut executor = setup_executor();
    let input = string(1, "abcabc");
    executor.symbolic_input("s", reference(&input)).unwrap();
    executor.constant(HostValue::Int('b' as i32)).unwrap();
    executor.constant(HostValue::Int(2)).unwrap();
    executor
        .invoke(
            Dispatch::Virtual,
            "java/lang/String",
            "indexOf",
            "(II)I",
            Some(input),
        )
        .unwrap();
    executor
        .caller_stack_param(0, HostValue::Int('b' as i32))
        .unwrap();
    executor.caller_stack_param(1, HostValue::Int(2)).unwrap();
    executor
        .call_result("java/lang/String", "indexOf", "(II)I", Some(HostValue::Int(4)))
        .unwrap();
    let index = top_value(&executor, ValueKind::Int);
    assert_eq!(index.concrete.as_i64(), 4);
    match &index.expression {
        Expression::StringToNumber {
            function: StringToNumberFunction::IndexOfCharFrom,
            operands,
        } => assert_eq!(operands.len(), 3),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn starts_with_offsets_count_utf16_units() {
    let mut executor = setup_executor();
    // The emoji takes two UTF-16 code units.
    let input = string(1, "\u{1F600}ab");
    let prefix = string(2, "ab");
    executor.symbolic_input("s", reference(&input)).unwrap();
    executor.constant(reference(&prefix)).unwrap();
    executor.constant(HostValue::Int(2)).unwrap();
    let descriptor = "(Ljava/lang/String;I)Z";
    executor
        .invoke(
            Dispatch::Virtual,
            "java/lang/String",
            "startsWith",
            descriptor,
            Some(input),
        )
        .unwrap();
    executor.caller_stack_param(0, reference(&prefix)).unwrap();
    executor.caller_stack_param(1, HostValue::Int(2)).unwrap();
    executor
        .call_result(
            "java/lang/String",
            "startsWith",
            descriptor,
            Some(HostValue::Int(1)),
        )
        .unwrap();
    match &top_value(&executor, ValueKind::Int).expression {
        Expression::StringComparison {
            comparison: StringComparison::StartsWith,
            left,
            ..
        } => assert_eq!(left.concrete.as_str(), Some("ab")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn boolean_boxes_keep_the_expression() {
    let mut executor = setup_executor();
    executor.symbolic_input("b", HostValue::Int(1)).unwrap();
    let b = top_value(&executor, ValueKind::Int);
    let boolean = "java/lang/Boolean";
    let value_of = "(Z)Ljava/lang/Boolean;";
    executor
        .invoke(Dispatch::Static, boolean, "valueOf", value_of, None)
        .unwrap();
    executor.caller_stack_param(0, HostValue::Int(1)).unwrap();
    let boxed = ConcreteObject::new(
        10,
        boolean,
        ObjectKind::Boxed {
            value: ConcreteValue::Integer(1),
        },
    );
    executor
        .call_result(boolean, "valueOf", value_of, Some(reference(&boxed)))
        .unwrap();
    executor
        .invoke(Dispatch::Virtual, boolean, "booleanValue", "()Z", Some(boxed))
        .unwrap();
    executor
        .call_result(boolean, "booleanValue", "()Z", Some(HostValue::Int(1)))
        .unwrap();
    assert!(Rc::ptr_eq(&top_value(&executor, ValueKind::Int), &b));
}
