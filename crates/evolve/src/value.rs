use itertools::{EitherOrBoth, Itertools};
use std::cmp::Ordering;
use std::fmt;

/// Value is the generic tagged tree over which migrations operate.
/// It's schema-less at runtime: a Value carries its own structure and
/// can be walked, rewritten, and re-assembled without the source or
/// target types being linked into the process.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Primitive(Primitive),
    /// Ordered record fields. Order is significant and preserved across
    /// all transformations unless an action explicitly reorders.
    /// Producers must not emit duplicate names; the first occurrence of
    /// a name is authoritative wherever one is looked up.
    Record(Vec<(String, Value)>),
    /// A tagged union case and its payload, usually a Record.
    Variant(String, Box<Value>),
    Sequence(Vec<Value>),
    /// Ordered map entries. Entry order is preserved for reproducibility
    /// but carries no other meaning.
    Map(Vec<(Value, Value)>),
}

/// Primitive is a leaf scalar of the Value tree.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Primitive {
    Unit,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

// Floats compare bitwise so that Value equality is structural and total.
impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        use Primitive::*;

        match (self, other) {
            (Unit, Unit) => true,
            (Bool(l), Bool(r)) => l == r,
            (Int(l), Int(r)) => l == r,
            (Long(l), Long(r)) => l == r,
            (Float(l), Float(r)) => l.to_bits() == r.to_bits(),
            (Double(l), Double(r)) => l.to_bits() == r.to_bits(),
            (String(l), String(r)) => l == r,
            (Bytes(l), Bytes(r)) => l == r,
            _ => false,
        }
    }
}

impl Eq for Primitive {}

/// Kind names the shape of a Value or Primitive. It's used in error
/// reporting and as the primitive tag pair of a Convert expression.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Kind {
    Unit,
    Bool,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
    Record,
    Variant,
    Sequence,
    Map,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Unit => "unit",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Long => "long",
            Kind::Float => "float",
            Kind::Double => "double",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::Record => "record",
            Kind::Variant => "variant",
            Kind::Sequence => "sequence",
            Kind::Map => "map",
        };
        f.write_str(name)
    }
}

impl Primitive {
    pub fn kind(&self) -> Kind {
        match self {
            Primitive::Unit => Kind::Unit,
            Primitive::Bool(_) => Kind::Bool,
            Primitive::Int(_) => Kind::Int,
            Primitive::Long(_) => Kind::Long,
            Primitive::Float(_) => Kind::Float,
            Primitive::Double(_) => Kind::Double,
            Primitive::String(_) => Kind::String,
            Primitive::Bytes(_) => Kind::Bytes,
        }
    }
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Primitive(p) => p.kind(),
            Value::Record(_) => Kind::Record,
            Value::Variant(..) => Kind::Variant,
            Value::Sequence(_) => Kind::Sequence,
            Value::Map(_) => Kind::Map,
        }
    }

    pub fn unit() -> Value {
        Value::Primitive(Primitive::Unit)
    }
    pub fn bool(b: bool) -> Value {
        Value::Primitive(Primitive::Bool(b))
    }
    pub fn int(i: i32) -> Value {
        Value::Primitive(Primitive::Int(i))
    }
    pub fn long(l: i64) -> Value {
        Value::Primitive(Primitive::Long(l))
    }
    pub fn float(f: f32) -> Value {
        Value::Primitive(Primitive::Float(f))
    }
    pub fn double(d: f64) -> Value {
        Value::Primitive(Primitive::Double(d))
    }
    pub fn string(s: impl Into<String>) -> Value {
        Value::Primitive(Primitive::String(s.into()))
    }
    pub fn bytes(b: impl Into<Vec<u8>>) -> Value {
        Value::Primitive(Primitive::Bytes(b.into()))
    }

    pub fn record<S: Into<String>>(fields: impl IntoIterator<Item = (S, Value)>) -> Value {
        Value::Record(fields.into_iter().map(|(n, v)| (n.into(), v)).collect())
    }
    pub fn variant(case: impl Into<String>, payload: Value) -> Value {
        Value::Variant(case.into(), Box::new(payload))
    }
    pub fn sequence(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Sequence(items.into_iter().collect())
    }
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Value {
        Value::Map(entries.into_iter().collect())
    }

    /// The mandated wire representation of an absent optional value:
    /// `Variant("None", Record([]))`.
    pub fn none() -> Value {
        Value::variant("None", Value::Record(Vec::new()))
    }

    /// The mandated wire representation of a present optional value:
    /// `Variant("Some", Record([("value", inner)]))`.
    pub fn some(inner: Value) -> Value {
        Value::variant("Some", Value::record([("value", inner)]))
    }

    /// Interpret this Value as an encoded option.
    /// Returns None if it isn't one, Some(None) for an encoded `None`,
    /// and Some(Some(inner)) for an encoded `Some`.
    pub fn as_option(&self) -> Option<Option<&Value>> {
        let Value::Variant(case, payload) = self else {
            return None;
        };
        match (case.as_str(), payload.as_ref()) {
            ("None", Value::Record(fields)) if fields.is_empty() => Some(None),
            ("Some", Value::Record(fields)) => match fields.as_slice() {
                [(name, inner)] if name == "value" => Some(Some(inner)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Look up a record field by name. The first occurrence of the name
    /// is authoritative.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// compare evaluates the deep, total ordering of |lhs| and |rhs|.
/// Values of the same kind order structurally; Records and Sequences
/// compare lexicographically, and differing kinds order by an arbitrary
/// but stable kind ladder. The ordering exists for reproducibility
/// (sorting fixtures, keyed sets), not for any semantic promise.
pub fn compare(lhs: &Value, rhs: &Value) -> Ordering {
    match (lhs, rhs) {
        (Value::Primitive(l), Value::Primitive(r)) => compare_primitive(l, r),
        (Value::Record(l), Value::Record(r)) => l
            .iter()
            .zip_longest(r.iter())
            .map(|eob| match eob {
                EitherOrBoth::Both((ln, lv), (rn, rv)) => {
                    ln.cmp(rn).then_with(|| compare(lv, rv))
                }
                EitherOrBoth::Right(_) => Ordering::Less,
                EitherOrBoth::Left(_) => Ordering::Greater,
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal),
        (Value::Variant(lc, lp), Value::Variant(rc, rp)) => {
            lc.cmp(rc).then_with(|| compare(lp, rp))
        }
        (Value::Sequence(l), Value::Sequence(r)) => l
            .iter()
            .zip_longest(r.iter())
            .map(|eob| match eob {
                EitherOrBoth::Both(lv, rv) => compare(lv, rv),
                EitherOrBoth::Right(_) => Ordering::Less,
                EitherOrBoth::Left(_) => Ordering::Greater,
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal),
        (Value::Map(l), Value::Map(r)) => l
            .iter()
            .zip_longest(r.iter())
            .map(|eob| match eob {
                EitherOrBoth::Both((lk, lv), (rk, rv)) => {
                    compare(lk, rk).then_with(|| compare(lv, rv))
                }
                EitherOrBoth::Right(_) => Ordering::Less,
                EitherOrBoth::Left(_) => Ordering::Greater,
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal),

        // Kinds are not equal. Order by the kind ladder.
        (lhs, rhs) => lhs.kind().cmp(&rhs.kind()),
    }
}

fn compare_primitive(lhs: &Primitive, rhs: &Primitive) -> Ordering {
    use Primitive::*;

    match (lhs, rhs) {
        (Unit, Unit) => Ordering::Equal,
        (Bool(l), Bool(r)) => l.cmp(r),
        (Int(l), Int(r)) => l.cmp(r),
        (Long(l), Long(r)) => l.cmp(r),
        (Float(l), Float(r)) => l.total_cmp(r),
        (Double(l), Double(r)) => l.total_cmp(r),
        (String(l), String(r)) => l.cmp(r),
        (Bytes(l), Bytes(r)) => l.cmp(r),
        (lhs, rhs) => lhs.kind().cmp(&rhs.kind()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_option_representation() {
        assert_eq!(Value::none(), Value::variant("None", Value::Record(Vec::new())));
        assert_eq!(
            Value::some(Value::int(5)),
            Value::variant("Some", Value::record([("value", Value::int(5))]))
        );

        assert_eq!(Value::none().as_option(), Some(None));
        assert_eq!(
            Value::some(Value::string("x")).as_option(),
            Some(Some(&Value::string("x")))
        );

        // Shapes which are not the mandated representation.
        assert_eq!(Value::string("None").as_option(), None);
        assert_eq!(Value::variant("None", Value::unit()).as_option(), None);
        assert_eq!(
            Value::variant("Some", Value::record([("other", Value::unit())])).as_option(),
            None
        );
    }

    #[test]
    fn test_field_lookup_is_first_occurrence() {
        let v = Value::record([
            ("a", Value::int(1)),
            ("b", Value::int(2)),
            ("a", Value::int(3)),
        ]);
        assert_eq!(v.field("a"), Some(&Value::int(1)));
        assert_eq!(v.field("b"), Some(&Value::int(2)));
        assert_eq!(v.field("c"), None);
        assert_eq!(Value::int(1).field("a"), None);
    }

    #[test]
    fn test_structural_equality() {
        let v = Value::record([
            ("name", Value::string("n")),
            ("tags", Value::sequence([Value::string("a"), Value::string("b")])),
            ("status", Value::variant("Active", Value::unit())),
        ]);
        assert_eq!(v, v.clone());

        // Field order is significant.
        assert_ne!(
            Value::record([("a", Value::int(1)), ("b", Value::int(2))]),
            Value::record([("b", Value::int(2)), ("a", Value::int(1))]),
        );

        // Floats are bitwise-equal, including NaN.
        assert_eq!(Value::double(f64::NAN), Value::double(f64::NAN));
        assert_ne!(Value::double(0.0), Value::double(-0.0));
    }

    #[test]
    fn test_compare_ordering() {
        let cases = [
            (Value::int(1), Value::int(2), Ordering::Less),
            (Value::string("a"), Value::string("a"), Ordering::Equal),
            (Value::string("foo"), Value::string("fp"), Ordering::Less),
            // Lexicographic over sequences, shorter first on a tie.
            (
                Value::sequence([Value::int(1)]),
                Value::sequence([Value::int(1), Value::int(2)]),
                Ordering::Less,
            ),
            // Records compare name first, then value.
            (
                Value::record([("a", Value::int(9))]),
                Value::record([("b", Value::int(0))]),
                Ordering::Less,
            ),
            // Variants compare case name first.
            (
                Value::variant("A", Value::int(9)),
                Value::variant("B", Value::int(0)),
                Ordering::Less,
            ),
            // Mixed kinds fall back to the kind ladder.
            (Value::bool(true), Value::int(0), Ordering::Less),
            (Value::string("z"), Value::Record(Vec::new()), Ordering::Less),
        ];

        for (lhs, rhs, expect) in cases {
            assert_eq!(compare(&lhs, &rhs), expect, "case {lhs:?} vs {rhs:?}");
            assert_eq!(compare(&rhs, &lhs), expect.reverse());
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let v = Value::record([
            ("unit", Value::unit()),
            ("long", Value::long(1 << 40)),
            ("bytes", Value::bytes(vec![8, 6, 7, 5, 3, 0, 9])),
            ("opt", Value::some(Value::double(56.789))),
            (
                "by_key",
                Value::map([(Value::string("k"), Value::sequence([Value::bool(false)]))]),
            ),
        ]);

        let encoded = serde_json::to_string(&v).unwrap();
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(v, decoded);
    }
}
