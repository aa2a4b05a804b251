use crate::apply::{Error, Result};
use crate::ptr::Path;
use crate::value::{Kind, Primitive, Value};

/// Expr is a pure data expression, evaluated against a focused Value to
/// produce a new Value. Expressions are a closed sum: there is no
/// variant which can carry a host-language function, which is what
/// keeps a serialized migration executable in another process.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    /// A constant Value.
    Literal(Value),
    /// The focused Value, unchanged.
    Identity,
    /// Project a field of a focused record.
    Field(String),
    /// A positional binding introduced by an enclosing Join.
    Arg(usize),
    /// Evaluate |inner|, then coerce between primitive kinds.
    Convert {
        from: Kind,
        to: Kind,
        inner: Box<Expr>,
    },
    /// Evaluate each part to a string, and join with |separator|.
    Concat { parts: Vec<Expr>, separator: String },
    /// Evaluate each argument against the current focus, bind the
    /// results positionally, and evaluate |body| under those bindings.
    Join { args: Vec<Expr>, body: Box<Expr> },
}

/// Scope is the positional environment a Join introduces for its body.
pub struct Scope<'s>(&'s [Value]);

impl<'s> Scope<'s> {
    pub fn empty() -> Scope<'static> {
        Scope(&[])
    }

    pub fn new(bindings: &'s [Value]) -> Scope<'s> {
        Scope(bindings)
    }
}

impl Expr {
    /// Evaluate this expression against |focus| under |scope|.
    /// Evaluation is a pure function: equal inputs give equal outputs.
    pub fn eval(&self, scope: &Scope<'_>, focus: &Value) -> Result<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Identity => Ok(focus.clone()),

            Expr::Field(name) => match focus {
                Value::Record(_) => focus.field(name).cloned().ok_or_else(|| Error::MissingPath {
                    path: Path::root().field(name),
                }),
                other => Err(Error::TypeMismatch {
                    path: Path::root(),
                    expected: Kind::Record,
                    actual: other.kind(),
                }),
            },

            Expr::Arg(index) => {
                scope.0.get(*index).cloned().ok_or_else(|| Error::ImpureExpr {
                    reason: format!(
                        "argument {index} is referenced outside its join scope (arity {})",
                        scope.0.len()
                    ),
                })
            }

            Expr::Convert { from, to, inner } => {
                let value = inner.eval(scope, focus)?;
                coerce(*from, *to, &value)
            }

            Expr::Concat { parts, separator } => {
                let parts = parts
                    .iter()
                    .map(|part| part.eval(scope, focus))
                    .collect::<Result<Vec<_>>>()?;

                let mut out = String::new();
                for (index, part) in parts.iter().enumerate() {
                    let Value::Primitive(Primitive::String(s)) = part else {
                        return Err(Error::TypeMismatch {
                            path: Path::root(),
                            expected: Kind::String,
                            actual: part.kind(),
                        });
                    };
                    if index != 0 {
                        out.push_str(separator);
                    }
                    out.push_str(s);
                }
                Ok(Value::string(out))
            }

            Expr::Join { args, body } => {
                let bound = args
                    .iter()
                    .map(|arg| arg.eval(scope, focus))
                    .collect::<Result<Vec<_>>>()?;
                body.eval(&Scope(&bound), focus)
            }
        }
    }
}

// Coerce |value|, which must be a |from| primitive, to a |to| primitive.
// The supported pairs are a fixed, directional table; everything else
// fails ConversionFailed.
fn coerce(from: Kind, to: Kind, value: &Value) -> Result<Value> {
    use Primitive::*;

    let fail = |reason: std::string::String| Error::ConversionFailed { from, to, reason };

    let Value::Primitive(p) = value else {
        return Err(fail(format!("input is a {}, not a {from}", value.kind())));
    };
    if p.kind() != from {
        return Err(fail(format!("input is a {}, not a {from}", p.kind())));
    }

    let out = match (p, to) {
        (Int(i), Kind::Long) => Long(i64::from(*i)),
        (Int(i), Kind::Float) => Float(*i as f32),
        (Int(i), Kind::Double) => Double(f64::from(*i)),
        (Int(i), Kind::String) => String(i.to_string()),

        (Long(l), Kind::String) => String(l.to_string()),
        (Long(l), Kind::Int) => Int(i32::try_from(*l)
            .map_err(|_| fail(format!("{l} is out of range for int")))?),

        (Float(f), Kind::Double) => Double(f64::from(*f)),
        (Float(f), Kind::String) => String(f.to_string()),

        // Narrowing, and documented as lossy.
        (Double(d), Kind::Float) => Float(*d as f32),
        (Double(d), Kind::String) => String(d.to_string()),

        (String(s), Kind::Int) => Int(s
            .parse()
            .map_err(|err| fail(format!("{s:?} is not an int: {err}")))?),
        (String(s), Kind::Long) => Long(s
            .parse()
            .map_err(|err| fail(format!("{s:?} is not a long: {err}")))?),
        (String(s), Kind::Float) => Float(s
            .parse()
            .map_err(|err| fail(format!("{s:?} is not a float: {err}")))?),
        (String(s), Kind::Double) => Double(s
            .parse()
            .map_err(|err| fail(format!("{s:?} is not a double: {err}")))?),

        (Bool(b), Kind::String) => String(b.to_string()),
        (String(s), Kind::Bool) => match s.as_str() {
            "true" => Bool(true),
            "false" => Bool(false),
            _ => return Err(fail(format!("{s:?} is not a bool literal"))),
        },

        _ => return Err(fail("unsupported conversion".to_string())),
    };
    Ok(Value::Primitive(out))
}
