//! The dynamically-typed value representation every opcode operates on.

use std::fmt;

use gc_arena::{Collect, MutationContext};

use crate::obj::{self, Obj, ObjExt};

/// A tagged union over every value the VM can hold on its stack, in a
/// local slot, or in a heap field. Cheap to copy; heap-backed variants hold
/// a GC reference rather than owned data.
///
/// There is no separate boolean variant: `true`/`false` compile to
/// `Integer(1)`/`Integer(0)`, matching the original engine pushing
/// `INTEGER_VAL(1)`/`INTEGER_VAL(0)` for those literals and `typeof`
/// never reporting anything but `"integer"` for them.
#[derive(Clone, Copy, Collect)]
#[collect(no_drop)]
pub enum Value<'gc> {
    Null,
    Integer(i32),
    Decimal(f32),
    Object(Obj<'gc>),
    LinkedInteger(Obj<'gc>),
    LinkedDecimal(Obj<'gc>),
}

impl<'gc> Value<'gc> {
    pub const fn null() -> Self {
        Value::Null
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by `JUMP_IF_FALSE`, `LG_AND`/`LG_OR`, and the `!`
    /// operator: `null` and numeric zero (integer or decimal, linked or
    /// not) are falsy, matching `false`'s `Integer(0)` encoding; every
    /// other value, including objects and non-zero numbers, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Object(_) => true,
            _ => self.as_number().map(|n| n != 0.0).unwrap_or(true),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) | Value::LinkedInteger(_) => "integer",
            Value::Decimal(_) | Value::LinkedDecimal(_) => "decimal",
            Value::Object(obj) => obj.type_name(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Decimal(d) => Some(*d as f64),
            Value::LinkedInteger(obj) => obj.as_linked_integer().map(|i| i as f64),
            Value::LinkedDecimal(obj) => obj.as_linked_decimal().map(|d| d as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::LinkedInteger(obj) => obj.as_linked_integer(),
            _ => None,
        }
    }

    /// Stringifies a value for `+`-concatenation and `Print`: the bare
    /// text a string operand would display, not a debug-quoted form.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::LinkedInteger(_) => self.as_integer().map(|i| i.to_string()).unwrap_or_default(),
            Value::LinkedDecimal(_) => self.as_number().map(|d| d.to_string()).unwrap_or_default(),
            Value::Object(obj) => obj.as_string().unwrap_or_else(|| format!("{obj:?}")),
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::LinkedInteger(obj) => write!(f, "&{:?}", obj.as_linked_integer()),
            Value::LinkedDecimal(obj) => write!(f, "&{:?}", obj.as_linked_decimal()),
            Value::Object(obj) => write!(f, "{obj:?}"),
        }
    }
}

/// Strict equality (`==`): numeric variants compare by numeric value
/// regardless of integer/decimal/linked tagging; objects compare by
/// identity unless they define their own equality.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Object(x), Value::Object(y)) => Obj::ptr_eq(x, y),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// "Sorta-equal" as used by `switch` dispatch: like [`values_equal`], but
/// also treats a string whose contents parse as a number and a numeric
/// value as equal, so `switch (x) { case 5: ... }` matches both `5` and
/// the string object `"5"`.
pub fn values_sorta_equal(a: &Value, b: &Value) -> bool {
    if values_equal(a, b) {
        return true;
    }
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => match (x.as_string(), y.as_string()) {
            (Some(s), Some(t)) => s == t,
            _ => false,
        },
        (Value::Object(obj), other) | (other, Value::Object(obj)) => {
            if let (Some(text), Some(num)) = (obj.as_string(), other.as_number()) {
                return text.trim().parse::<f64>().map(|v| v == num).unwrap_or(false);
            }
            false
        }
        _ => false,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArithmeticError {
    #[error("cannot apply operator to {0} and {1}")]
    Unsupported(&'static str, &'static str),
    #[error("division by zero")]
    DivideByZero,
}

/// `+`: numeric add when both sides are numbers, otherwise string
/// concatenation after stringifying both operands (matching `"a" + 0`
/// producing `"a0"`), and only erroring when neither side is a string.
pub fn add<'gc>(mc: MutationContext<'gc, '_>, a: &Value<'gc>, b: &Value<'gc>) -> Result<Value<'gc>, ArithmeticError> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(x.wrapping_add(*y))),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => Ok(Value::Decimal((x + y) as f32)),
            _ => {
                let a_is_string = matches!(a, Value::Object(obj) if obj.as_string().is_some());
                let b_is_string = matches!(b, Value::Object(obj) if obj.as_string().is_some());
                if a_is_string || b_is_string {
                    let mut text = a.stringify();
                    text.push_str(&b.stringify());
                    Ok(Value::Object(obj::new_string(mc, text)))
                } else {
                    Err(ArithmeticError::Unsupported(a.type_name(), b.type_name()))
                }
            }
        },
    }
}

pub fn subtract<'gc>(a: &Value<'gc>, b: &Value<'gc>) -> Result<Value<'gc>, ArithmeticError> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(x.wrapping_sub(*y))),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => Ok(Value::Decimal((x - y) as f32)),
            _ => Err(ArithmeticError::Unsupported(a.type_name(), b.type_name())),
        },
    }
}

pub fn multiply<'gc>(a: &Value<'gc>, b: &Value<'gc>) -> Result<Value<'gc>, ArithmeticError> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(x.wrapping_mul(*y))),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => Ok(Value::Decimal((x * y) as f32)),
            _ => Err(ArithmeticError::Unsupported(a.type_name(), b.type_name())),
        },
    }
}

pub fn divide<'gc>(a: &Value<'gc>, b: &Value<'gc>) -> Result<Value<'gc>, ArithmeticError> {
    match (a.as_number(), b.as_number()) {
        (Some(_), Some(y)) if y == 0.0 => Err(ArithmeticError::DivideByZero),
        (Some(x), Some(y)) => match (a, b) {
            (Value::Integer(xi), Value::Integer(yi)) if xi % yi == 0 => Ok(Value::Integer(xi / yi)),
            _ => Ok(Value::Decimal((x / y) as f32)),
        },
        _ => Err(ArithmeticError::Unsupported(a.type_name(), b.type_name())),
    }
}

pub fn modulo<'gc>(a: &Value<'gc>, b: &Value<'gc>) -> Result<Value<'gc>, ArithmeticError> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => {
            if *y == 0 {
                return Err(ArithmeticError::DivideByZero);
            }
            Ok(Value::Integer(x.wrapping_rem(*y)))
        }
        _ => match (a.as_number(), b.as_number()) {
            (Some(_), Some(y)) if y == 0.0 => Err(ArithmeticError::DivideByZero),
            (Some(x), Some(y)) => Ok(Value::Decimal((x % y) as f32)),
            _ => Err(ArithmeticError::Unsupported(a.type_name(), b.type_name())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{HatchArena, Root};

    #[test]
    fn truthiness_excludes_only_null_and_zero() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(Value::Integer(1).is_truthy());
        assert!(!Value::Decimal(0.0).is_truthy());
    }

    #[test]
    fn false_and_true_are_plain_integers() {
        assert_eq!(Value::Integer(0).type_name(), "integer");
        assert_eq!(Value::Integer(1).type_name(), "integer");
    }

    #[test]
    fn integer_add_stays_integer() {
        let arena: HatchArena = HatchArena::new(Default::default(), |mc| Root::new(mc));
        arena.mutate(|mc, _root| {
            let result = add(mc, &Value::Integer(2), &Value::Integer(3)).unwrap();
            assert!(matches!(result, Value::Integer(5)));
        });
    }

    #[test]
    fn mixed_add_promotes_to_decimal() {
        let arena: HatchArena = HatchArena::new(Default::default(), |mc| Root::new(mc));
        arena.mutate(|mc, _root| {
            let result = add(mc, &Value::Integer(2), &Value::Decimal(0.5)).unwrap();
            match result {
                Value::Decimal(d) => assert_eq!(d, 2.5),
                _ => panic!("expected decimal"),
            }
        });
    }

    #[test]
    fn string_plus_integer_concatenates_after_stringifying() {
        let arena: HatchArena = HatchArena::new(Default::default(), |mc| Root::new(mc));
        arena.mutate(|mc, _root| {
            let a = Value::Object(obj::new_string(mc, "a"));
            let result = add(mc, &a, &Value::Integer(0)).unwrap();
            match result {
                Value::Object(o) => assert_eq!(o.as_string().as_deref(), Some("a0")),
                _ => panic!("expected string object"),
            }
        });
    }

    #[test]
    fn divide_by_zero_is_an_error() {
        assert!(matches!(divide(&Value::Integer(1), &Value::Integer(0)), Err(ArithmeticError::DivideByZero)));
    }

    #[test]
    fn integer_division_stays_integer_when_exact() {
        let result = divide(&Value::Integer(10), &Value::Integer(5)).unwrap();
        assert!(matches!(result, Value::Integer(2)));
    }
}
