// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::{Result, VmError};

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

/// The computational category of a value as seen by the operand stack and the locals table.
/// Booleans, bytes, chars and shorts are all Int once they are on the stack.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl ValueKind {
    /// Longs and doubles take up two slots in the locals table and two words on the stack.
    pub fn is_double_slot(self) -> bool {
        matches!(self, ValueKind::Long | ValueKind::Double)
    }

    pub fn slot_count(self) -> usize {
        if self.is_double_slot() {
            2
        } else {
            1
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(self, ValueKind::Int | ValueKind::Long)
    }

    pub fn is_real(self) -> bool {
        matches!(self, ValueKind::Float | ValueKind::Double)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Reference => "reference",
        }
    }

    /// Maps a field descriptor such as `I`, `J` or `Ljava/lang/String;` to its category.
    pub fn from_field_descriptor(descriptor: &str) -> Result<ValueKind> {
        let mut chars = descriptor.chars();
        let kind = parse_value_kind(&mut chars, descriptor)?;
        if chars.next().is_some() {
            return Err(malformed(descriptor));
        }
        Ok(kind)
    }
}

/// The parameter and result categories of a method descriptor such as `(IJLjava/lang/String;)V`.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct MethodDescriptor {
    /// The original descriptor text, used as part of summary keys.
    pub text: Box<str>,
    /// One entry per declared parameter, in declaration order. The receiver is not included.
    pub parameters: Vec<ValueKind>,
    /// None for void methods.
    pub result: Option<ValueKind>,
}

impl Debug for MethodDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<MethodDescriptor> {
        let mut chars = descriptor.chars().peekable();
        if chars.next() != Some('(') {
            return Err(malformed(descriptor));
        }
        let mut parameters = Vec::new();
        loop {
            match chars.peek() {
                Some(')') => {
                    chars.next();
                    break;
                }
                Some(_) => parameters.push(parse_value_kind(&mut chars, descriptor)?),
                None => return Err(malformed(descriptor)),
            }
        }
        let result = match chars.peek() {
            Some('V') => {
                chars.next();
                None
            }
            Some(_) => Some(parse_value_kind(&mut chars, descriptor)?),
            None => return Err(malformed(descriptor)),
        };
        if chars.next().is_some() {
            return Err(malformed(descriptor));
        }
        Ok(MethodDescriptor {
            text: descriptor.into(),
            parameters,
            result,
        })
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// The number of locals slots taken up by the parameters, not counting the receiver.
    pub fn parameter_slots(&self) -> usize {
        self.parameters.iter().map(|k| k.slot_count()).sum()
    }
}

fn parse_value_kind<I: Iterator<Item = char>>(chars: &mut I, descriptor: &str) -> Result<ValueKind> {
    match chars.next() {
        Some('Z') | Some('B') | Some('C') | Some('S') | Some('I') => Ok(ValueKind::Int),
        Some('J') => Ok(ValueKind::Long),
        Some('F') => Ok(ValueKind::Float),
        Some('D') => Ok(ValueKind::Double),
        Some('L') => {
            for c in chars.by_ref() {
                if c == ';' {
                    return Ok(ValueKind::Reference);
                }
            }
            Err(malformed(descriptor))
        }
        Some('[') => {
            // The element type is consumed but the array itself is just a reference.
            parse_value_kind(chars, descriptor)?;
            Ok(ValueKind::Reference)
        }
        _ => Err(malformed(descriptor)),
    }
}

fn malformed(descriptor: &str) -> VmError {
    VmError::MalformedDescriptor {
        descriptor: descriptor.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_parameters() {
        let d = MethodDescriptor::parse("(IJLjava/lang/String;[[DZ)Ljava/lang/Object;").unwrap();
        assert_eq!(
            d.parameters,
            vec![
                ValueKind::Int,
                ValueKind::Long,
                ValueKind::Reference,
                ValueKind::Reference,
                ValueKind::Int
            ]
        );
        assert_eq!(d.result, Some(ValueKind::Reference));
        assert_eq!(d.parameter_slots(), 6);
    }

    #[test]
    fn parses_void_without_parameters() {
        let d = MethodDescriptor::parse("()V").unwrap();
        assert!(d.parameters.is_empty());
        assert_eq!(d.result, None);
    }

    #[test]
    fn rejects_truncated_descriptors() {
        assert!(MethodDescriptor::parse("(Ljava/lang/String").is_err());
        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("I)V").is_err());
        assert!(ValueKind::from_field_descriptor("II").is_err());
    }
}
