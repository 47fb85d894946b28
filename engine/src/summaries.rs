// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::concrete_value::ConcreteValue;
use crate::errors::{Result, VmError};
use crate::expression::{
    CharacterFunction, MathBinaryFunction, MathFunction, StringComparison, StringOperation,
    StringToNumberFunction,
};
use crate::heap::{FieldKey, SymbolicHeap};
use crate::known_names::KnownNames;
use crate::operand::{HostValue, Operand};
use crate::symbolic_value::{SymbolicValue, SymbolicValueTrait};

use log_derive::logfn_inputs;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// A summary is a hand written description of what a library method computes, in terms of
/// the expression model.
///
/// Library methods are not instrumented, so the engine never sees the instructions they
/// execute. Without a summary, the result of such a call is just a constant, and whatever
/// dependence the result has on symbolic arguments is lost. A summary puts it back: given the
/// shadow arguments of the call and the concrete result, it builds an expression that says how
/// the result was computed from the arguments.
///
/// Arguments trickle in one at a time, as the caller pushes them, so a summary never needs a
/// frame of its own. The receiver of an instance method is argument 0 and the declared
/// parameters follow it.
pub trait SymbolicFunction: Debug {
    /// The number of arguments, counting the receiver of an instance method.
    fn arity(&self) -> usize;

    /// Returns the operand that should replace the result of the call on the caller's stack,
    /// or None if the constant that is already there is as good as it gets.
    fn apply(
        &self,
        arguments: &[Argument],
        result: &CallResult<'_>,
        heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>>;

    /// Runs the summary of a method that returns nothing, such as a constructor. Only its
    /// effect on the heap matters.
    fn apply_void(&self, _arguments: &[Argument], _heap: &mut SymbolicHeap) -> Result<()> {
        Ok(())
    }
}

/// An argument of a summarized call, as both the shadow and the concrete machine see it.
#[derive(Clone, Debug)]
pub struct Argument {
    pub operand: Operand,
    pub concrete: HostValue,
}

impl Argument {
    /// The symbolic contents of a string argument. None if the argument is null or not a string.
    fn string_value(&self) -> Option<Rc<SymbolicValue>> {
        if let Operand::Reference(reference) = &self.operand {
            if let Some(value) = reference.string_value() {
                return Some(value.clone());
            }
        }
        match self.concrete.concrete_value()? {
            value @ ConcreteValue::Str(..) => Some(SymbolicValue::make_constant(value)),
            _ => None,
        }
    }

    /// The argument as an expression, whether it is a number or a string.
    fn value(&self) -> Option<Rc<SymbolicValue>> {
        match self.operand.any_value() {
            Some(value) => Some(value.clone()),
            None => self.string_value(),
        }
    }
}

/// The result of a call, after the engine has pushed a shadow for it.
#[derive(Debug)]
pub struct CallResult<'a> {
    /// The operand on top of the caller's stack.
    pub operand: &'a Operand,
    pub concrete: &'a HostValue,
}

impl CallResult<'_> {
    fn numeric_value(&self) -> Result<ConcreteValue> {
        self.concrete.numeric_value(self.concrete.kind())
    }

    fn wrap(&self, value: Rc<SymbolicValue>) -> Result<Option<Operand>> {
        Ok(Some(Operand::from_value(self.concrete.kind(), value)?))
    }
}

/// A call to a summarized method that is waiting for its arguments or its result.
#[derive(Clone)]
pub struct SummaryCall {
    pub function: KnownNames,
    summary: Rc<dyn SymbolicFunction>,
    arguments: Vec<Option<Argument>>,
}

impl Debug for SummaryCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryCall")
            .field("function", &self.function)
            .field("arguments", &self.arguments)
            .finish()
    }
}

impl SummaryCall {
    pub fn new(function: KnownNames, summary: Rc<dyn SymbolicFunction>) -> SummaryCall {
        let arguments = vec![None; summary.arity()];
        SummaryCall {
            function,
            summary,
            arguments,
        }
    }

    #[logfn_inputs(TRACE)]
    pub fn set_argument(&mut self, index: usize, argument: Argument) -> Result<()> {
        match self.arguments.get_mut(index) {
            Some(slot) => {
                *slot = Some(argument);
                Ok(())
            }
            None => Err(self.missing(index)),
        }
    }

    /// Runs the summary. Every argument must have been delivered.
    #[logfn_inputs(TRACE)]
    pub fn apply(&self, result: &CallResult<'_>, heap: &mut SymbolicHeap) -> Result<Option<Operand>> {
        let arguments = self.delivered_arguments()?;
        self.summary.apply(&arguments, result, heap)
    }

    /// Runs the summary of a void method. Every argument must have been delivered.
    #[logfn_inputs(TRACE)]
    pub fn apply_void(&self, heap: &mut SymbolicHeap) -> Result<()> {
        let arguments = self.delivered_arguments()?;
        self.summary.apply_void(&arguments, heap)
    }

    fn delivered_arguments(&self) -> Result<Vec<Argument>> {
        let mut arguments = Vec::with_capacity(self.arguments.len());
        for (index, argument) in self.arguments.iter().enumerate() {
            arguments.push(argument.clone().ok_or_else(|| self.missing(index))?);
        }
        Ok(arguments)
    }

    fn missing(&self, index: usize) -> VmError {
        VmError::MissingSummaryArgument {
            function: format!("{:?}", self.function),
            index,
        }
    }
}

fn any_symbolic(arguments: &[Argument]) -> bool {
    arguments.iter().any(|a| a.operand.is_symbolic())
}

/// String predicates such as `equals` and `startsWith`. A reversed predicate takes the
/// right operand first, like `Pattern.matches(regex, input)`.
#[derive(Debug)]
struct StringPredicate {
    comparison: StringComparison,
    reversed: bool,
}

impl SymbolicFunction for StringPredicate {
    fn arity(&self) -> usize {
        2
    }

    fn apply(
        &self,
        arguments: &[Argument],
        result: &CallResult<'_>,
        _heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>> {
        if !any_symbolic(arguments) {
            return Ok(None);
        }
        let (first, second) = match (arguments[0].string_value(), arguments[1].string_value()) {
            (Some(first), Some(second)) => (first, second),
            _ => return Ok(None),
        };
        let (receiver, other) = if self.reversed {
            (second, first)
        } else {
            (first, second)
        };
        let holds = result.numeric_value()?.as_i64() != 0;
        result.wrap(receiver.string_comparison(self.comparison, other, holds))
    }
}

/// `startsWith(prefix, offset)`, which is `startsWith` applied to the suffix at the offset.
#[derive(Debug)]
struct StartsWithOffset;

impl SymbolicFunction for StartsWithOffset {
    fn arity(&self) -> usize {
        3
    }

    fn apply(
        &self,
        arguments: &[Argument],
        result: &CallResult<'_>,
        _heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>> {
        if !any_symbolic(arguments) {
            return Ok(None);
        }
        let (receiver, prefix, offset) = match (
            arguments[0].string_value(),
            arguments[1].string_value(),
            arguments[2].value(),
        ) {
            (Some(receiver), Some(prefix), Some(offset)) => (receiver, prefix, offset),
            _ => return Ok(None),
        };
        // Offsets count UTF-16 code units, as they do on the host.
        let suffix = match receiver.concrete.as_str() {
            Some(s) => {
                let units: Vec<u16> = s
                    .encode_utf16()
                    .skip(offset.concrete.as_i32().max(0) as usize)
                    .collect();
                String::from_utf16_lossy(&units)
            }
            None => String::new(),
        };
        let suffix = receiver.string_operation(
            StringOperation::Substring,
            vec![offset],
            ConcreteValue::from(suffix.as_str()),
        );
        let holds = result.numeric_value()?.as_i64() != 0;
        result.wrap(suffix.string_comparison(StringComparison::StartsWith, prefix, holds))
    }
}

/// Numbers computed from strings. The first argument is the string, which is the receiver
/// for instance methods and the sole parameter of the parse methods.
#[derive(Debug)]
struct StringToNumber {
    function: StringToNumberFunction,
    arity: usize,
}

impl SymbolicFunction for StringToNumber {
    fn arity(&self) -> usize {
        self.arity
    }

    fn apply(
        &self,
        arguments: &[Argument],
        result: &CallResult<'_>,
        _heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>> {
        if !any_symbolic(arguments) {
            return Ok(None);
        }
        let string = match arguments[0].string_value() {
            Some(string) => string,
            None => return Ok(None),
        };
        let mut rest = Vec::with_capacity(arguments.len() - 1);
        for argument in &arguments[1..] {
            match argument.value() {
                Some(value) => rest.push(value),
                None => return Ok(None),
            }
        }
        let concrete = result.numeric_value()?;
        result.wrap(string.string_to_number(self.function, rest, concrete))
    }
}

/// Operations that produce a new string. The result gets a fresh string reference that
/// carries the expression and becomes the canonical reference for the concrete result.
#[derive(Debug)]
struct StringProducer {
    operation: StringOperation,
    arity: usize,
}

impl SymbolicFunction for StringProducer {
    fn arity(&self) -> usize {
        self.arity
    }

    fn apply(
        &self,
        arguments: &[Argument],
        result: &CallResult<'_>,
        heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>> {
        if !any_symbolic(arguments) {
            return Ok(None);
        }
        let object = match result.concrete.object() {
            Some(object) => object,
            None => return Ok(None),
        };
        let concrete = match object.string_value() {
            Some(value) => ConcreteValue::Str(value.clone()),
            None => return Ok(None),
        };
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match argument.value() {
                Some(value) => values.push(value),
                None => return Ok(None),
            }
        }
        let first = values.remove(0);
        let value = first.string_operation(self.operation, values, concrete);
        let reference = heap.new_string_reference(value);
        heap.rebind_reference(&reference, object);
        Ok(Some(Operand::Reference(reference)))
    }
}

#[derive(Debug)]
struct MathUnary {
    function: MathFunction,
}

impl SymbolicFunction for MathUnary {
    fn arity(&self) -> usize {
        1
    }

    fn apply(
        &self,
        arguments: &[Argument],
        result: &CallResult<'_>,
        _heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>> {
        match arguments[0].operand.any_value() {
            Some(operand) if operand.is_symbolic() => {
                let concrete = result.numeric_value()?;
                result.wrap(operand.math_function(self.function, concrete))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug)]
struct MathBinary {
    function: MathBinaryFunction,
}

impl SymbolicFunction for MathBinary {
    fn arity(&self) -> usize {
        2
    }

    fn apply(
        &self,
        arguments: &[Argument],
        result: &CallResult<'_>,
        _heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>> {
        if !any_symbolic(arguments) {
            return Ok(None);
        }
        match (arguments[0].operand.any_value(), arguments[1].operand.any_value()) {
            (Some(left), Some(right)) => {
                let concrete = result.numeric_value()?;
                result.wrap(left.canonical().math_binary_function(
                    self.function,
                    right.canonical(),
                    concrete,
                ))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug)]
struct CharacterPredicate {
    function: CharacterFunction,
}

impl SymbolicFunction for CharacterPredicate {
    fn arity(&self) -> usize {
        1
    }

    fn apply(
        &self,
        arguments: &[Argument],
        result: &CallResult<'_>,
        _heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>> {
        match arguments[0].operand.any_value() {
            Some(operand) if operand.is_symbolic() => {
                let concrete = result.numeric_value()?;
                result.wrap(operand.character_function(self.function, concrete))
            }
            _ => Ok(None),
        }
    }
}

/// `valueOf` of a wrapper class. The primitive ends up in a pseudo field of the box, so that
/// unboxing can recover it.
#[derive(Debug)]
struct Boxing {
    field: FieldKey,
}

impl SymbolicFunction for Boxing {
    fn arity(&self) -> usize {
        1
    }

    fn apply(
        &self,
        arguments: &[Argument],
        result: &CallResult<'_>,
        heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>> {
        let holder = result.operand.reference()?;
        if holder.is_null() {
            return Ok(None);
        }
        if let Some(value) = arguments[0].operand.any_value() {
            heap.put_field(&self.field, holder, value.clone());
        }
        Ok(None)
    }
}

/// `intValue` and friends. Reads back what boxing stored.
#[derive(Debug)]
struct Unboxing {
    field: FieldKey,
}

impl SymbolicFunction for Unboxing {
    fn arity(&self) -> usize {
        1
    }

    fn apply(
        &self,
        arguments: &[Argument],
        result: &CallResult<'_>,
        heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>> {
        let holder = arguments[0].operand.reference()?;
        if holder.is_null() {
            return Ok(None);
        }
        let value = heap.get_field(&self.field, holder, result.numeric_value()?);
        if value.is_symbolic() {
            result.wrap(value)
        } else {
            Ok(None)
        }
    }
}

/// How `append` turns its argument into text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Appended {
    Boolean,
    Char,
    Double,
    Float,
    Int,
    Long,
    /// A string, character sequence or object. Only strings and null have text the engine
    /// can tell.
    Text,
}

/// The text that appending the argument adds, or None if the engine cannot tell what it is.
fn appended_text(appended: Appended, argument: &Argument) -> Option<Rc<SymbolicValue>> {
    if appended == Appended::Text {
        if let HostValue::Reference(None) = argument.concrete {
            return Some(SymbolicValue::make_constant(ConcreteValue::from("null")));
        }
        return argument.string_value();
    }
    let value = argument.operand.any_value()?;
    let text = match appended {
        Appended::Boolean => (value.concrete.as_i64() != 0).to_string(),
        Appended::Char => char::from_u32(value.concrete.as_i64() as u32)?.to_string(),
        Appended::Double => real_text(value.concrete.as_f64(), false),
        Appended::Float => real_text(value.concrete.as_f64(), true),
        Appended::Int | Appended::Long | Appended::Text => value.concrete.as_i64().to_string(),
    };
    let concrete = ConcreteValue::from(text.as_str());
    if value.is_symbolic() {
        Some(value.string_operation(StringOperation::ValueOf, Vec::new(), concrete))
    } else {
        Some(SymbolicValue::make_constant(concrete))
    }
}

/// Formats a real the way `Double.toString` and `Float.toString` do: plain notation from
/// 10^-3 up to 10^7 and computerized scientific notation outside of that range.
fn real_text(value: f64, single: bool) -> String {
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{}Infinity", sign);
    }
    let magnitude = value.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        return if single {
            format!("{:?}", value as f32)
        } else {
            format!("{:?}", value)
        };
    }
    let scientific = if single {
        format!("{:e}", value as f32)
    } else {
        format!("{:e}", value)
    };
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => {
            format!("{}E{}", mantissa, exponent)
        }
        Some((mantissa, exponent)) => format!("{}.0E{}", mantissa, exponent),
        None => scientific,
    }
}

/// The constructors of StringBuilder and StringBuffer. The receiver is argument 0.
#[derive(Debug)]
struct BuilderInit {
    arity: usize,
    with_text: bool,
}

impl SymbolicFunction for BuilderInit {
    fn arity(&self) -> usize {
        self.arity
    }

    fn apply(
        &self,
        _arguments: &[Argument],
        _result: &CallResult<'_>,
        _heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>> {
        Ok(None)
    }

    fn apply_void(&self, arguments: &[Argument], heap: &mut SymbolicHeap) -> Result<()> {
        let builder = arguments[0].operand.reference()?;
        if builder.is_null() {
            return Ok(());
        }
        let text = if self.with_text {
            arguments[1].string_value()
        } else {
            Some(SymbolicValue::make_constant(ConcreteValue::from("")))
        };
        heap.set_builder_text(builder, text);
        Ok(())
    }
}

/// `append`, which concatenates the text of the argument to the text of the builder. The
/// result of the call is the builder itself.
#[derive(Debug)]
struct BuilderAppend {
    appended: Appended,
}

impl SymbolicFunction for BuilderAppend {
    fn arity(&self) -> usize {
        2
    }

    fn apply(
        &self,
        arguments: &[Argument],
        _result: &CallResult<'_>,
        heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>> {
        let builder = arguments[0].operand.reference()?;
        if builder.is_null() {
            return Ok(None);
        }
        let text = match (
            heap.builder_text(builder),
            appended_text(self.appended, &arguments[1]),
        ) {
            (Some(prefix), Some(suffix)) => match (prefix.concrete.as_str(), suffix.concrete.as_str()) {
                (Some(left), Some(right)) => {
                    let concrete = ConcreteValue::from(format!("{}{}", left, right).as_str());
                    Some(prefix.string_operation(StringOperation::Concat, vec![suffix], concrete))
                }
                _ => None,
            },
            _ => None,
        };
        heap.set_builder_text(builder, text);
        Ok(None)
    }
}

/// `toString` of a builder. If the text the engine followed is what the host produced, the
/// result carries its expression. Either way the builder's text is known from here on.
#[derive(Debug)]
struct BuilderToString;

impl SymbolicFunction for BuilderToString {
    fn arity(&self) -> usize {
        1
    }

    fn apply(
        &self,
        arguments: &[Argument],
        result: &CallResult<'_>,
        heap: &mut SymbolicHeap,
    ) -> Result<Option<Operand>> {
        let builder = arguments[0].operand.reference()?;
        if builder.is_null() {
            return Ok(None);
        }
        let object = match result.concrete.object() {
            Some(object) => object,
            None => return Ok(None),
        };
        let host_text = match object.string_value() {
            Some(value) => value.clone(),
            None => return Ok(None),
        };
        match heap.builder_text(builder) {
            Some(text) if text.concrete.as_str() == Some(&*host_text) => {
                if !text.is_symbolic() {
                    return Ok(None);
                }
                let reference = heap.new_string_reference(text);
                heap.rebind_reference(&reference, object);
                Ok(Some(Operand::Reference(reference)))
            }
            followed => {
                if let Some(text) = followed {
                    debug!("builder text {} is out of date, the host has {:?}", text, host_text);
                }
                let text = SymbolicValue::make_constant(ConcreteValue::Str(host_text));
                heap.set_builder_text(builder, Some(text));
                Ok(None)
            }
        }
    }
}

/// The summaries of all known names.
pub struct FunctionRegistry {
    summaries: HashMap<KnownNames, Rc<dyn SymbolicFunction>>,
}

impl Debug for FunctionRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.summaries.keys()).finish()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        let summaries = KnownNames::all()
            .filter_map(|name| summary_for(name).map(|summary| (name, summary)))
            .collect();
        FunctionRegistry { summaries }
    }
}

impl FunctionRegistry {
    pub fn get(&self, name: KnownNames) -> Option<Rc<dyn SymbolicFunction>> {
        self.summaries.get(&name).cloned()
    }

    /// Starts a summarized call of the given method, if it has a summary.
    pub fn start_call(&self, owner: &str, name: &str, descriptor: &str) -> Option<SummaryCall> {
        let known_name = KnownNames::lookup(owner, name, descriptor);
        self.get(known_name)
            .map(|summary| SummaryCall::new(known_name, summary))
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}

fn summary_for(name: KnownNames) -> Option<Rc<dyn SymbolicFunction>> {
    use KnownNames::*;
    let predicate = |comparison| -> Rc<dyn SymbolicFunction> {
        Rc::new(StringPredicate {
            comparison,
            reversed: false,
        })
    };
    let to_number = |function, arity| -> Rc<dyn SymbolicFunction> {
        Rc::new(StringToNumber { function, arity })
    };
    let producer = |operation, arity| -> Rc<dyn SymbolicFunction> {
        Rc::new(StringProducer { operation, arity })
    };
    let unary = |function| -> Rc<dyn SymbolicFunction> { Rc::new(MathUnary { function }) };
    let binary = |function| -> Rc<dyn SymbolicFunction> { Rc::new(MathBinary { function }) };
    let character =
        |function| -> Rc<dyn SymbolicFunction> { Rc::new(CharacterPredicate { function }) };
    let boxing = |owner, field| -> Rc<dyn SymbolicFunction> {
        Rc::new(Boxing {
            field: FieldKey::new(owner, field),
        })
    };
    let unboxing = |owner, field| -> Rc<dyn SymbolicFunction> {
        Rc::new(Unboxing {
            field: FieldKey::new(owner, field),
        })
    };
    let append = |appended| -> Rc<dyn SymbolicFunction> { Rc::new(BuilderAppend { appended }) };
    Some(match name {
        None => return Option::None,
        BooleanBooleanValue => unboxing("java/lang/Boolean", "$booleanValue"),
        BooleanValueOf => boxing("java/lang/Boolean", "$booleanValue"),
        ByteByteValue => unboxing("java/lang/Byte", "$byteValue"),
        ByteValueOf => boxing("java/lang/Byte", "$byteValue"),
        CharacterCharValue => unboxing("java/lang/Character", "$charValue"),
        CharacterGetNumericValue => character(CharacterFunction::GetNumericValue),
        CharacterIsDigit => character(CharacterFunction::IsDigit),
        CharacterIsLetter => character(CharacterFunction::IsLetter),
        CharacterValueOf => boxing("java/lang/Character", "$charValue"),
        DoubleDoubleValue => unboxing("java/lang/Double", "$doubleValue"),
        DoubleParseDouble => to_number(StringToNumberFunction::ParseDouble, 1),
        DoubleValueOf => boxing("java/lang/Double", "$doubleValue"),
        FloatFloatValue => unboxing("java/lang/Float", "$floatValue"),
        FloatValueOf => boxing("java/lang/Float", "$floatValue"),
        IntegerIntValue => unboxing("java/lang/Integer", "$intValue"),
        IntegerParseInt => to_number(StringToNumberFunction::ParseInt, 1),
        IntegerValueOf => boxing("java/lang/Integer", "$intValue"),
        LongLongValue => unboxing("java/lang/Long", "$longValue"),
        LongParseLong => to_number(StringToNumberFunction::ParseLong, 1),
        LongValueOf => boxing("java/lang/Long", "$longValue"),
        MathAbsDouble | MathAbsFloat | MathAbsInt | MathAbsLong => unary(MathFunction::Abs),
        MathAtan2 => binary(MathBinaryFunction::Atan2),
        MathCeil => unary(MathFunction::Ceil),
        MathCos => unary(MathFunction::Cos),
        MathExp => unary(MathFunction::Exp),
        MathFloor => unary(MathFunction::Floor),
        MathLog => unary(MathFunction::Log),
        MathLog10 => unary(MathFunction::Log10),
        MathMaxDouble | MathMaxFloat | MathMaxInt | MathMaxLong => {
            binary(MathBinaryFunction::Max)
        }
        MathMinDouble | MathMinFloat | MathMinInt | MathMinLong => {
            binary(MathBinaryFunction::Min)
        }
        MathPow => binary(MathBinaryFunction::Pow),
        MathRound => unary(MathFunction::Round),
        MathSin => unary(MathFunction::Sin),
        MathSqrt => unary(MathFunction::Sqrt),
        MathTan => unary(MathFunction::Tan),
        PatternMatches => Rc::new(StringPredicate {
            comparison: StringComparison::Matches,
            reversed: true,
        }),
        ShortShortValue => unboxing("java/lang/Short", "$shortValue"),
        ShortValueOf => boxing("java/lang/Short", "$shortValue"),
        StringBuilderAppendBoolean => append(Appended::Boolean),
        StringBuilderAppendChar => append(Appended::Char),
        StringBuilderAppendCharSequence
        | StringBuilderAppendObject
        | StringBuilderAppendString => append(Appended::Text),
        StringBuilderAppendDouble => append(Appended::Double),
        StringBuilderAppendFloat => append(Appended::Float),
        StringBuilderAppendInt => append(Appended::Int),
        StringBuilderAppendLong => append(Appended::Long),
        StringBuilderInit => Rc::new(BuilderInit {
            arity: 1,
            with_text: false,
        }),
        StringBuilderInitCapacity => Rc::new(BuilderInit {
            arity: 2,
            with_text: false,
        }),
        StringBuilderInitCharSequence | StringBuilderInitString => Rc::new(BuilderInit {
            arity: 2,
            with_text: true,
        }),
        StringBuilderToString => Rc::new(BuilderToString),
        StringCharAt => to_number(StringToNumberFunction::CharAt, 2),
        StringCompareTo => to_number(StringToNumberFunction::CompareTo, 2),
        StringCompareToIgnoreCase => to_number(StringToNumberFunction::CompareToIgnoreCase, 2),
        StringConcat => producer(StringOperation::Concat, 2),
        StringContains => predicate(StringComparison::Contains),
        StringEndsWith => predicate(StringComparison::EndsWith),
        StringEquals => predicate(StringComparison::Equals),
        StringEqualsIgnoreCase => predicate(StringComparison::EqualsIgnoreCase),
        StringIndexOfChar => to_number(StringToNumberFunction::IndexOfChar, 2),
        StringIndexOfCharFrom => to_number(StringToNumberFunction::IndexOfCharFrom, 3),
        StringIndexOfString => to_number(StringToNumberFunction::IndexOfString, 2),
        StringIndexOfStringFrom => to_number(StringToNumberFunction::IndexOfStringFrom, 3),
        StringLastIndexOfChar => to_number(StringToNumberFunction::LastIndexOfChar, 2),
        StringLastIndexOfCharFrom => to_number(StringToNumberFunction::LastIndexOfCharFrom, 3),
        StringLastIndexOfString => to_number(StringToNumberFunction::LastIndexOfString, 2),
        StringLastIndexOfStringFrom => {
            to_number(StringToNumberFunction::LastIndexOfStringFrom, 3)
        }
        StringLength => to_number(StringToNumberFunction::Length, 1),
        StringMatches => predicate(StringComparison::Matches),
        StringRegionMatches => to_number(StringToNumberFunction::RegionMatches, 5),
        StringRegionMatchesIgnoreCase => {
            to_number(StringToNumberFunction::RegionMatchesIgnoreCase, 6)
        }
        StringReplaceChar | StringReplaceCharSequence => producer(StringOperation::Replace, 3),
        StringReplaceAll => producer(StringOperation::ReplaceAll, 3),
        StringReplaceFirst => producer(StringOperation::ReplaceFirst, 3),
        StringStartsWith => predicate(StringComparison::StartsWith),
        StringStartsWithOffset => Rc::new(StartsWithOffset),
        StringSubstring => producer(StringOperation::Substring, 2),
        StringSubstringRange => producer(StringOperation::Substring, 3),
        StringToLowerCase => producer(StringOperation::ToLowerCase, 1),
        StringToUpperCase => producer(StringOperation::ToUpperCase, 1),
        StringTrim => producer(StringOperation::Trim, 1),
        StringValueOfBoolean | StringValueOfChar | StringValueOfDouble | StringValueOfInt
        | StringValueOfLong => producer(StringOperation::ValueOf, 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_name_has_a_summary() {
        let registry = FunctionRegistry::default();
        assert_eq!(registry.len(), KnownNames::all().count());
        assert!(registry.get(KnownNames::None).is_none());
    }

    #[test]
    fn reals_are_formatted_like_the_host() {
        assert_eq!(real_text(1.0, false), "1.0");
        assert_eq!(real_text(-0.5, false), "-0.5");
        assert_eq!(real_text(0.001, false), "0.001");
        assert_eq!(real_text(1e7, false), "1.0E7");
        assert_eq!(real_text(1.5e-4, false), "1.5E-4");
        assert_eq!(real_text(0.1, true), "0.1");
        assert_eq!(real_text(f64::NAN, true), "NaN");
        assert_eq!(real_text(f64::NEG_INFINITY, false), "-Infinity");
    }

    #[test]
    fn missing_arguments_are_reported() {
        let registry = FunctionRegistry::default();
        let mut call = registry
            .start_call("java/lang/Math", "max", "(II)I")
            .unwrap();
        let x = SymbolicValue::make_variable("x", 4.into(), crate::descriptor::ValueKind::Int);
        call.set_argument(
            0,
            Argument {
                operand: Operand::SingleInteger(x),
                concrete: HostValue::Int(4),
            },
        )
        .unwrap();
        assert!(call
            .set_argument(
                2,
                Argument {
                    operand: Operand::SingleInteger(SymbolicValue::make_constant(1.into())),
                    concrete: HostValue::Int(1),
                }
            )
            .is_err());
        let result_operand = Operand::SingleInteger(SymbolicValue::make_constant(4.into()));
        let result = CallResult {
            operand: &result_operand,
            concrete: &HostValue::Int(4),
        };
        let mut heap = SymbolicHeap::new(100);
        assert_eq!(
            call.apply(&result, &mut heap).unwrap_err(),
            VmError::MissingSummaryArgument {
                function: "MathMaxInt".to_owned(),
                index: 1
            }
        );
    }
}
