use serde_json::{Number, Value};

/// A `[@attribute=literal]` filter over the elements of an array.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub attribute: String,
    pub literal: Value,
}

impl Predicate {
    #[must_use]
    pub fn new(attribute: impl Into<String>, literal: Value) -> Self {
        Self {
            attribute: attribute.into(),
            literal,
        }
    }

    /// Reports whether `candidate` is an object whose `attribute` member equals the literal.
    ///
    /// Values only compare equal to values of the same JSON type; a number never equals a
    /// string, even when they read the same. Missing members and non object candidates are
    /// simply a non match.
    #[must_use]
    pub fn matches(&self, candidate: &Value) -> bool {
        match candidate {
            Value::Object(map) => map
                .get(&self.attribute)
                .map_or(false, |member| same_type_eq(member, &self.literal)),
            _ => false,
        }
    }
}

fn same_type_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(b1), Value::Bool(b2)) => b1 == b2,
        (Value::String(s1), Value::String(s2)) => s1 == s2,
        (Value::Number(n1), Value::Number(n2)) => numbers_eq(n1, n2),
        _ => false,
    }
}

#[allow(clippy::float_cmp)]
fn numbers_eq(n1: &Number, n2: &Number) -> bool {
    if let (Some(i1), Some(i2)) = (n1.as_i64(), n2.as_i64()) {
        return i1 == i2;
    }
    if let (Some(u1), Some(u2)) = (n1.as_u64(), n2.as_u64()) {
        return u1 == u2;
    }
    match (n1.as_f64(), n2.as_f64()) {
        (Some(f1), Some(f2)) => f1 == f2,
        _ => false,
    }
}
