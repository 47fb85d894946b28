// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use itertools::Itertools;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well known library methods that are summarized rather than executed symbolically.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialOrd, PartialEq, Hash, Ord)]
pub enum KnownNames {
    /// This is not a known name
    None,
    BooleanBooleanValue,
    BooleanValueOf,
    ByteByteValue,
    ByteValueOf,
    CharacterCharValue,
    CharacterGetNumericValue,
    CharacterIsDigit,
    CharacterIsLetter,
    CharacterValueOf,
    DoubleDoubleValue,
    DoubleParseDouble,
    DoubleValueOf,
    FloatFloatValue,
    FloatValueOf,
    IntegerIntValue,
    IntegerParseInt,
    IntegerValueOf,
    LongLongValue,
    LongParseLong,
    LongValueOf,
    MathAbsDouble,
    MathAbsFloat,
    MathAbsInt,
    MathAbsLong,
    MathAtan2,
    MathCeil,
    MathCos,
    MathExp,
    MathFloor,
    MathLog,
    MathLog10,
    MathMaxDouble,
    MathMaxFloat,
    MathMaxInt,
    MathMaxLong,
    MathMinDouble,
    MathMinFloat,
    MathMinInt,
    MathMinLong,
    MathPow,
    MathRound,
    MathSin,
    MathSqrt,
    MathTan,
    PatternMatches,
    ShortShortValue,
    ShortValueOf,
    /// The string builder summaries also cover StringBuffer, which has the same methods.
    StringBuilderAppendBoolean,
    StringBuilderAppendChar,
    StringBuilderAppendCharSequence,
    StringBuilderAppendDouble,
    StringBuilderAppendFloat,
    StringBuilderAppendInt,
    StringBuilderAppendLong,
    StringBuilderAppendObject,
    StringBuilderAppendString,
    StringBuilderInit,
    StringBuilderInitCapacity,
    StringBuilderInitCharSequence,
    StringBuilderInitString,
    StringBuilderToString,
    StringCharAt,
    StringCompareTo,
    StringCompareToIgnoreCase,
    StringConcat,
    StringContains,
    StringEndsWith,
    StringEquals,
    StringEqualsIgnoreCase,
    StringIndexOfChar,
    StringIndexOfCharFrom,
    StringIndexOfString,
    StringIndexOfStringFrom,
    StringLastIndexOfChar,
    StringLastIndexOfCharFrom,
    StringLastIndexOfString,
    StringLastIndexOfStringFrom,
    StringLength,
    StringMatches,
    StringRegionMatches,
    StringRegionMatchesIgnoreCase,
    StringReplaceChar,
    StringReplaceCharSequence,
    StringReplaceAll,
    StringReplaceFirst,
    StringStartsWith,
    StringStartsWithOffset,
    StringSubstring,
    StringSubstringRange,
    StringToLowerCase,
    StringToUpperCase,
    StringTrim,
    StringValueOfBoolean,
    StringValueOfChar,
    StringValueOfDouble,
    StringValueOfInt,
    StringValueOfLong,
}

const BOOLEAN: &str = "java/lang/Boolean";
const BYTE: &str = "java/lang/Byte";
const CHARACTER: &str = "java/lang/Character";
const DOUBLE: &str = "java/lang/Double";
const FLOAT: &str = "java/lang/Float";
const INTEGER: &str = "java/lang/Integer";
const LONG: &str = "java/lang/Long";
const MATH: &str = "java/lang/Math";
const PATTERN: &str = "java/util/regex/Pattern";
const SHORT: &str = "java/lang/Short";
const STRING: &str = "java/lang/String";
const STRING_BUFFER: &str = "java/lang/StringBuffer";
const STRING_BUILDER: &str = "java/lang/StringBuilder";

lazy_static! {
    /// Maps (owner, method name, method descriptor) to the known name of the method.
    static ref KNOWN_NAMES: HashMap<(&'static str, &'static str, &'static str), KnownNames> = {
        use KnownNames::*;
        [
            ((BOOLEAN, "booleanValue", "()Z"), BooleanBooleanValue),
            ((BOOLEAN, "valueOf", "(Z)Ljava/lang/Boolean;"), BooleanValueOf),
            ((BYTE, "byteValue", "()B"), ByteByteValue),
            ((BYTE, "valueOf", "(B)Ljava/lang/Byte;"), ByteValueOf),
            ((CHARACTER, "charValue", "()C"), CharacterCharValue),
            ((CHARACTER, "getNumericValue", "(C)I"), CharacterGetNumericValue),
            ((CHARACTER, "isDigit", "(C)Z"), CharacterIsDigit),
            ((CHARACTER, "isLetter", "(C)Z"), CharacterIsLetter),
            ((CHARACTER, "valueOf", "(C)Ljava/lang/Character;"), CharacterValueOf),
            ((DOUBLE, "doubleValue", "()D"), DoubleDoubleValue),
            ((DOUBLE, "parseDouble", "(Ljava/lang/String;)D"), DoubleParseDouble),
            ((DOUBLE, "valueOf", "(D)Ljava/lang/Double;"), DoubleValueOf),
            ((FLOAT, "floatValue", "()F"), FloatFloatValue),
            ((FLOAT, "valueOf", "(F)Ljava/lang/Float;"), FloatValueOf),
            ((INTEGER, "intValue", "()I"), IntegerIntValue),
            ((INTEGER, "parseInt", "(Ljava/lang/String;)I"), IntegerParseInt),
            ((INTEGER, "valueOf", "(I)Ljava/lang/Integer;"), IntegerValueOf),
            ((LONG, "longValue", "()J"), LongLongValue),
            ((LONG, "parseLong", "(Ljava/lang/String;)J"), LongParseLong),
            ((LONG, "valueOf", "(J)Ljava/lang/Long;"), LongValueOf),
            ((MATH, "abs", "(D)D"), MathAbsDouble),
            ((MATH, "abs", "(F)F"), MathAbsFloat),
            ((MATH, "abs", "(I)I"), MathAbsInt),
            ((MATH, "abs", "(J)J"), MathAbsLong),
            ((MATH, "atan2", "(DD)D"), MathAtan2),
            ((MATH, "ceil", "(D)D"), MathCeil),
            ((MATH, "cos", "(D)D"), MathCos),
            ((MATH, "exp", "(D)D"), MathExp),
            ((MATH, "floor", "(D)D"), MathFloor),
            ((MATH, "log", "(D)D"), MathLog),
            ((MATH, "log10", "(D)D"), MathLog10),
            ((MATH, "max", "(DD)D"), MathMaxDouble),
            ((MATH, "max", "(FF)F"), MathMaxFloat),
            ((MATH, "max", "(II)I"), MathMaxInt),
            ((MATH, "max", "(JJ)J"), MathMaxLong),
            ((MATH, "min", "(DD)D"), MathMinDouble),
            ((MATH, "min", "(FF)F"), MathMinFloat),
            ((MATH, "min", "(II)I"), MathMinInt),
            ((MATH, "min", "(JJ)J"), MathMinLong),
            ((MATH, "pow", "(DD)D"), MathPow),
            ((MATH, "round", "(D)J"), MathRound),
            ((MATH, "sin", "(D)D"), MathSin),
            ((MATH, "sqrt", "(D)D"), MathSqrt),
            ((MATH, "tan", "(D)D"), MathTan),
            ((PATTERN, "matches", "(Ljava/lang/String;Ljava/lang/CharSequence;)Z"), PatternMatches),
            ((SHORT, "shortValue", "()S"), ShortShortValue),
            ((SHORT, "valueOf", "(S)Ljava/lang/Short;"), ShortValueOf),
            ((STRING, "charAt", "(I)C"), StringCharAt),
            ((STRING, "compareTo", "(Ljava/lang/String;)I"), StringCompareTo),
            ((STRING, "compareToIgnoreCase", "(Ljava/lang/String;)I"), StringCompareToIgnoreCase),
            ((STRING, "concat", "(Ljava/lang/String;)Ljava/lang/String;"), StringConcat),
            ((STRING, "contains", "(Ljava/lang/CharSequence;)Z"), StringContains),
            ((STRING, "endsWith", "(Ljava/lang/String;)Z"), StringEndsWith),
            ((STRING, "equals", "(Ljava/lang/Object;)Z"), StringEquals),
            ((STRING, "equalsIgnoreCase", "(Ljava/lang/String;)Z"), StringEqualsIgnoreCase),
            ((STRING, "indexOf", "(I)I"), StringIndexOfChar),
            ((STRING, "indexOf", "(II)I"), StringIndexOfCharFrom),
            ((STRING, "indexOf", "(Ljava/lang/String;)I"), StringIndexOfString),
            ((STRING, "indexOf", "(Ljava/lang/String;I)I"), StringIndexOfStringFrom),
            ((STRING, "lastIndexOf", "(I)I"), StringLastIndexOfChar),
            ((STRING, "lastIndexOf", "(II)I"), StringLastIndexOfCharFrom),
            ((STRING, "lastIndexOf", "(Ljava/lang/String;)I"), StringLastIndexOfString),
            ((STRING, "lastIndexOf", "(Ljava/lang/String;I)I"), StringLastIndexOfStringFrom),
            ((STRING, "length", "()I"), StringLength),
            ((STRING, "matches", "(Ljava/lang/String;)Z"), StringMatches),
            ((STRING, "regionMatches", "(ILjava/lang/String;II)Z"), StringRegionMatches),
            ((STRING, "regionMatches", "(ZILjava/lang/String;II)Z"), StringRegionMatchesIgnoreCase),
            ((STRING, "replace", "(CC)Ljava/lang/String;"), StringReplaceChar),
            (
                (
                    STRING,
                    "replace",
                    "(Ljava/lang/CharSequence;Ljava/lang/CharSequence;)Ljava/lang/String;",
                ),
                StringReplaceCharSequence,
            ),
            (
                (STRING, "replaceAll", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;"),
                StringReplaceAll,
            ),
            (
                (STRING, "replaceFirst", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;"),
                StringReplaceFirst,
            ),
            ((STRING, "startsWith", "(Ljava/lang/String;)Z"), StringStartsWith),
            ((STRING, "startsWith", "(Ljava/lang/String;I)Z"), StringStartsWithOffset),
            ((STRING, "substring", "(I)Ljava/lang/String;"), StringSubstring),
            ((STRING, "substring", "(II)Ljava/lang/String;"), StringSubstringRange),
            ((STRING, "toLowerCase", "()Ljava/lang/String;"), StringToLowerCase),
            ((STRING, "toUpperCase", "()Ljava/lang/String;"), StringToUpperCase),
            ((STRING, "trim", "()Ljava/lang/String;"), StringTrim),
            ((STRING, "valueOf", "(Z)Ljava/lang/String;"), StringValueOfBoolean),
            ((STRING, "valueOf", "(C)Ljava/lang/String;"), StringValueOfChar),
            ((STRING, "valueOf", "(D)Ljava/lang/String;"), StringValueOfDouble),
            ((STRING, "valueOf", "(I)Ljava/lang/String;"), StringValueOfInt),
            ((STRING, "valueOf", "(J)Ljava/lang/String;"), StringValueOfLong),
            ((STRING_BUFFER, "<init>", "()V"), StringBuilderInit),
            ((STRING_BUFFER, "<init>", "(I)V"), StringBuilderInitCapacity),
            ((STRING_BUFFER, "<init>", "(Ljava/lang/CharSequence;)V"), StringBuilderInitCharSequence),
            ((STRING_BUFFER, "<init>", "(Ljava/lang/String;)V"), StringBuilderInitString),
            ((STRING_BUFFER, "append", "(C)Ljava/lang/StringBuffer;"), StringBuilderAppendChar),
            ((STRING_BUFFER, "append", "(D)Ljava/lang/StringBuffer;"), StringBuilderAppendDouble),
            ((STRING_BUFFER, "append", "(F)Ljava/lang/StringBuffer;"), StringBuilderAppendFloat),
            ((STRING_BUFFER, "append", "(I)Ljava/lang/StringBuffer;"), StringBuilderAppendInt),
            ((STRING_BUFFER, "append", "(J)Ljava/lang/StringBuffer;"), StringBuilderAppendLong),
            ((STRING_BUFFER, "append", "(Z)Ljava/lang/StringBuffer;"), StringBuilderAppendBoolean),
            (
                (STRING_BUFFER, "append", "(Ljava/lang/CharSequence;)Ljava/lang/StringBuffer;"),
                StringBuilderAppendCharSequence,
            ),
            (
                (STRING_BUFFER, "append", "(Ljava/lang/Object;)Ljava/lang/StringBuffer;"),
                StringBuilderAppendObject,
            ),
            (
                (STRING_BUFFER, "append", "(Ljava/lang/String;)Ljava/lang/StringBuffer;"),
                StringBuilderAppendString,
            ),
            ((STRING_BUFFER, "toString", "()Ljava/lang/String;"), StringBuilderToString),
            ((STRING_BUILDER, "<init>", "()V"), StringBuilderInit),
            ((STRING_BUILDER, "<init>", "(I)V"), StringBuilderInitCapacity),
            ((STRING_BUILDER, "<init>", "(Ljava/lang/CharSequence;)V"), StringBuilderInitCharSequence),
            ((STRING_BUILDER, "<init>", "(Ljava/lang/String;)V"), StringBuilderInitString),
            ((STRING_BUILDER, "append", "(C)Ljava/lang/StringBuilder;"), StringBuilderAppendChar),
            ((STRING_BUILDER, "append", "(D)Ljava/lang/StringBuilder;"), StringBuilderAppendDouble),
            ((STRING_BUILDER, "append", "(F)Ljava/lang/StringBuilder;"), StringBuilderAppendFloat),
            ((STRING_BUILDER, "append", "(I)Ljava/lang/StringBuilder;"), StringBuilderAppendInt),
            ((STRING_BUILDER, "append", "(J)Ljava/lang/StringBuilder;"), StringBuilderAppendLong),
            ((STRING_BUILDER, "append", "(Z)Ljava/lang/StringBuilder;"), StringBuilderAppendBoolean),
            (
                (STRING_BUILDER, "append", "(Ljava/lang/CharSequence;)Ljava/lang/StringBuilder;"),
                StringBuilderAppendCharSequence,
            ),
            (
                (STRING_BUILDER, "append", "(Ljava/lang/Object;)Ljava/lang/StringBuilder;"),
                StringBuilderAppendObject,
            ),
            (
                (STRING_BUILDER, "append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;"),
                StringBuilderAppendString,
            ),
            ((STRING_BUILDER, "toString", "()Ljava/lang/String;"), StringBuilderToString),
        ]
        .into_iter()
        .collect()
    };
}

impl KnownNames {
    /// Returns KnownNames::None unless the method is one of the well known ones.
    pub fn lookup(owner: &str, name: &str, descriptor: &str) -> KnownNames {
        KNOWN_NAMES
            .get(&(owner, name, descriptor))
            .copied()
            .unwrap_or(KnownNames::None)
    }

    /// All the known names, other than None. Names shared by several methods appear once.
    pub fn all() -> impl Iterator<Item = KnownNames> {
        KNOWN_NAMES.values().copied().unique()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overloads_are_told_apart_by_descriptor() {
        assert_eq!(
            KnownNames::lookup("java/lang/Math", "abs", "(I)I"),
            KnownNames::MathAbsInt
        );
        assert_eq!(
            KnownNames::lookup("java/lang/Math", "abs", "(D)D"),
            KnownNames::MathAbsDouble
        );
        assert_eq!(
            KnownNames::lookup("java/lang/Math", "abs", "(S)S"),
            KnownNames::None
        );
        assert_eq!(
            KnownNames::lookup("java/lang/StringBuilder", "length", "()I"),
            KnownNames::None
        );
    }

    #[test]
    fn string_buffers_share_the_string_builder_names() {
        assert_eq!(
            KnownNames::lookup(
                "java/lang/StringBuffer",
                "append",
                "(I)Ljava/lang/StringBuffer;"
            ),
            KnownNames::StringBuilderAppendInt
        );
        assert_eq!(
            KnownNames::lookup("java/lang/StringBuilder", "<init>", "(I)V"),
            KnownNames::StringBuilderInitCapacity
        );
        // The builder's own return type is part of the descriptor.
        assert_eq!(
            KnownNames::lookup(
                "java/lang/StringBuilder",
                "append",
                "(I)Ljava/lang/StringBuffer;"
            ),
            KnownNames::None
        );
    }
}
