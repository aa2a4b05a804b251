use crate::action::Action;
use crate::expr::Scope;
use crate::migration::DynamicMigration;
use crate::ptr::{Node, Path};
use crate::value::{Kind, Value};
use std::collections::BTreeSet;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no value at {path}")]
    MissingPath { path: Path },
    #[error("variant at {path} is case {actual:?}, not {expected:?}")]
    NoMatch {
        path: Path,
        expected: String,
        actual: String,
    },
    #[error("value at {path} is a {actual}, expected a {expected}")]
    TypeMismatch {
        path: Path,
        expected: Kind,
        actual: Kind,
    },
    #[error("case {name:?} at {path} is removed by this migration")]
    CaseRemoved { path: Path, name: String },
    #[error("cannot convert {from} to {to}: {reason}")]
    ConversionFailed { from: Kind, to: Kind, reason: String },
    #[error("expression is not pure: {reason}")]
    ImpureExpr { reason: String },
    #[error(
        "migration does not carry the source shape onto the target shape \
         ({} source paths unhandled, {} target paths unprovided)",
        .missing_source_fields.len(),
        .missing_target_fields.len()
    )]
    Incomplete {
        missing_source_fields: BTreeSet<Path>,
        missing_target_fields: BTreeSet<Path>,
    },
    #[error("failed to encode or decode a host document")]
    Codec(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    // Rebase the location carried by this error under |prefix|.
    // Errors surfaced from a nested interpretation (a case payload, an
    // expression evaluated at a focus) carry paths relative to that
    // focus, and are rebased as they propagate.
    pub(crate) fn prefixed(self, prefix: &Path) -> Error {
        match self {
            Error::MissingPath { path } => Error::MissingPath {
                path: prefix.and_then(&path),
            },
            Error::NoMatch {
                path,
                expected,
                actual,
            } => Error::NoMatch {
                path: prefix.and_then(&path),
                expected,
                actual,
            },
            Error::TypeMismatch {
                path,
                expected,
                actual,
            } => Error::TypeMismatch {
                path: prefix.and_then(&path),
                expected,
                actual,
            },
            Error::CaseRemoved { path, name } => Error::CaseRemoved {
                path: prefix.and_then(&path),
                name,
            },
            other => other,
        }
    }
}

/// Apply |migration| to |value|, producing the migrated Value.
/// Actions apply left to right: the output of each is the input of the
/// next, and the first error short-circuits.
pub fn apply(migration: &DynamicMigration, value: &Value) -> Result<Value> {
    migration
        .actions
        .iter()
        .enumerate()
        .try_fold(value.clone(), |value, (index, action)| {
            tracing::trace!(index, at = %action.at(), "applying action");
            apply_action(&value, action)
        })
}

/// Apply one action to |root|.
pub fn apply_action(root: &Value, action: &Action) -> Result<Value> {
    match action {
        // A join reads its sources from the root, binds them
        // positionally, and writes the evaluated body at |at|.
        Action::Join { at, sources, body } => {
            let mut bound = Vec::with_capacity(sources.len());
            for source in sources {
                bound.push(query(root, source)?.clone());
            }
            let out = body.eval(&Scope::new(&bound), root)?;
            write(root, at.as_slice(), &mut Path::root(), &out)
        }
        _ => walk(root, action.at().as_slice(), &mut Path::root(), action),
    }
}

// Does a mismatched case at the action's focus skip the action, rather
// than fail it? The rename and transform families are conditioned on
// the case they name, and pass through non-matching alternatives.
fn tolerates_no_match(action: &Action) -> bool {
    matches!(
        action,
        Action::Rename { .. }
            | Action::RenameCase { .. }
            | Action::TransformCase { .. }
            | Action::TransformValue { .. }
            | Action::TransformElements { .. }
            | Action::TransformKeys { .. }
            | Action::TransformValues { .. }
    )
}

// Walk |path| down from |v|, apply the action's local rewrite at the
// focus, and re-assemble each ancestor container on the way back up.
// |walked| is the prefix already descended, for error reporting.
fn walk(v: &Value, path: &[Node], walked: &mut Path, action: &Action) -> Result<Value> {
    let Some((node, rest)) = path.split_first() else {
        return rewrite(v, walked, action);
    };

    match (node, v) {
        (Node::Field(name), Value::Record(fields)) => {
            let index = fields
                .iter()
                .position(|(n, _)| n == name)
                .ok_or_else(|| Error::MissingPath {
                    path: walked.clone().field(name),
                })?;

            let mut fields = fields.clone();
            walked.push(Node::Field(name.clone()));
            let child = walk(&fields[index].1, rest, walked, action)?;
            walked.pop();

            fields[index].1 = child;
            Ok(Value::Record(fields))
        }

        (Node::Case(name), Value::Variant(case, payload)) => {
            if case != name {
                // A mismatch which would require descending through the
                // payload is a missing location. At the final node, the
                // action's policy decides.
                return if !rest.is_empty() {
                    Err(Error::MissingPath {
                        path: walked.clone().case(name),
                    })
                } else if tolerates_no_match(action) {
                    Ok(v.clone())
                } else {
                    Err(Error::NoMatch {
                        path: walked.clone().case(name),
                        expected: name.clone(),
                        actual: case.clone(),
                    })
                };
            }

            walked.push(Node::Case(name.clone()));
            let child = walk(payload, rest, walked, action)?;
            walked.pop();

            Ok(Value::Variant(case.clone(), Box::new(child)))
        }

        (Node::Elements, Value::Sequence(items)) => {
            walked.push(Node::Elements);
            let items = items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    walk(item, rest, walked, action).map_err(|err| {
                        tracing::debug!(index, at = %walked, %err, "broadcast element failed");
                        err
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            walked.pop();

            Ok(Value::Sequence(items))
        }

        (Node::MapKeys, Value::Map(entries)) => {
            walked.push(Node::MapKeys);
            let entries = entries
                .iter()
                .map(|(key, value)| Ok((walk(key, rest, walked, action)?, value.clone())))
                .collect::<Result<Vec<_>>>()?;
            walked.pop();

            Ok(Value::Map(entries))
        }

        (Node::MapValues, Value::Map(entries)) => {
            walked.push(Node::MapValues);
            let entries = entries
                .iter()
                .map(|(key, value)| Ok((key.clone(), walk(value, rest, walked, action)?)))
                .collect::<Result<Vec<_>>>()?;
            walked.pop();

            Ok(Value::Map(entries))
        }

        (Node::Optional, Value::Variant(case, _)) => match v.as_option() {
            // An absent optional is a non-error skip.
            Some(None) => Ok(v.clone()),
            Some(Some(inner)) => {
                walked.push(Node::Optional);
                let child = walk(inner, rest, walked, action)?;
                walked.pop();
                Ok(Value::some(child))
            }
            None => Err(Error::NoMatch {
                path: walked.clone().optional(),
                expected: "Some".to_string(),
                actual: case.clone(),
            }),
        },

        // The focus kind does not admit this path node.
        (node, v) => Err(Error::TypeMismatch {
            path: walked.clone(),
            expected: expected_kind(node),
            actual: v.kind(),
        }),
    }
}

fn expected_kind(node: &Node) -> Kind {
    match node {
        Node::Field(_) => Kind::Record,
        Node::Case(_) | Node::Optional => Kind::Variant,
        Node::Elements => Kind::Sequence,
        Node::MapKeys | Node::MapValues => Kind::Map,
    }
}

// Compute the action's local rewrite of the focused value.
fn rewrite(v: &Value, walked: &Path, action: &Action) -> Result<Value> {
    let require_record = |v: &Value| -> Result<Vec<(String, Value)>> {
        match v {
            Value::Record(fields) => Ok(fields.clone()),
            other => Err(Error::TypeMismatch {
                path: walked.clone(),
                expected: Kind::Record,
                actual: other.kind(),
            }),
        }
    };

    match action {
        Action::AddField { name, default, .. } => {
            let mut fields = require_record(v)?;
            // The default evaluates with the focused record, so it may
            // project sibling fields.
            let value = default
                .eval(&Scope::empty(), v)
                .map_err(|err| err.prefixed(walked))?;
            fields.push((name.clone(), value));
            Ok(Value::Record(fields))
        }

        Action::DropField { name, .. } => {
            let mut fields = require_record(v)?;
            let index = fields
                .iter()
                .position(|(n, _)| n == name)
                .ok_or_else(|| Error::MissingPath {
                    path: walked.clone().field(name),
                })?;
            fields.remove(index);
            Ok(Value::Record(fields))
        }

        Action::Rename { from, to, .. } => {
            let mut fields = require_record(v)?;
            let index = fields
                .iter()
                .position(|(n, _)| n == from)
                .ok_or_else(|| Error::MissingPath {
                    path: walked.clone().field(from),
                })?;
            fields[index].0 = to.clone();
            Ok(Value::Record(fields))
        }

        Action::Mandate { name, default, .. } => {
            let mut fields = require_record(v)?;
            let index = fields
                .iter()
                .position(|(n, _)| n == name)
                .ok_or_else(|| Error::MissingPath {
                    path: walked.clone().field(name),
                })?;

            fields[index].1 = match fields[index].1.as_option() {
                Some(Some(inner)) => inner.clone(),
                Some(None) => default
                    .eval(&Scope::empty(), v)
                    .map_err(|err| err.prefixed(walked))?,
                None => {
                    return Err(Error::TypeMismatch {
                        path: walked.clone().field(name),
                        expected: Kind::Variant,
                        actual: fields[index].1.kind(),
                    })
                }
            };
            Ok(Value::Record(fields))
        }

        Action::Optionalize { name, .. } => {
            let mut fields = require_record(v)?;
            let index = fields
                .iter()
                .position(|(n, _)| n == name)
                .ok_or_else(|| Error::MissingPath {
                    path: walked.clone().field(name),
                })?;
            fields[index].1 = Value::some(fields[index].1.clone());
            Ok(Value::Record(fields))
        }

        Action::RenameCase { from, to, .. } => match v {
            Value::Variant(case, payload) if case == from => {
                Ok(Value::Variant(to.clone(), payload.clone()))
            }
            Value::Variant(..) => Ok(v.clone()),
            other => Err(Error::TypeMismatch {
                path: walked.clone(),
                expected: Kind::Variant,
                actual: other.kind(),
            }),
        },

        Action::RemoveCase { name, .. } => match v {
            Value::Variant(case, _) if case == name => Err(Error::CaseRemoved {
                path: walked.clone(),
                name: name.clone(),
            }),
            Value::Variant(..) => Ok(v.clone()),
            other => Err(Error::TypeMismatch {
                path: walked.clone(),
                expected: Kind::Variant,
                actual: other.kind(),
            }),
        },

        Action::TransformCase { name, inner, .. } => match v {
            Value::Variant(case, payload) if case == name => {
                // Inner actions run against the payload as their root.
                let prefix = walked.clone().case(name);
                let payload = inner
                    .iter()
                    .try_fold(payload.as_ref().clone(), |acc, action| {
                        apply_action(&acc, action)
                    })
                    .map_err(|err| err.prefixed(&prefix))?;
                Ok(Value::Variant(case.clone(), Box::new(payload)))
            }
            Value::Variant(..) => Ok(v.clone()),
            other => Err(Error::TypeMismatch {
                path: walked.clone(),
                expected: Kind::Variant,
                actual: other.kind(),
            }),
        },

        Action::TransformValue { forward, .. } => forward
            .eval(&Scope::empty(), v)
            .map_err(|err| err.prefixed(walked)),

        Action::TransformElements { forward, .. } => match v {
            Value::Sequence(items) => {
                let prefix = walked.clone().elements();
                let items = items
                    .iter()
                    .map(|item| {
                        forward
                            .eval(&Scope::empty(), item)
                            .map_err(|err| err.prefixed(&prefix))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Sequence(items))
            }
            other => Err(Error::TypeMismatch {
                path: walked.clone(),
                expected: Kind::Sequence,
                actual: other.kind(),
            }),
        },

        Action::TransformKeys { forward, .. } => match v {
            Value::Map(entries) => {
                let prefix = walked.clone().map_keys();
                let entries = entries
                    .iter()
                    .map(|(key, value)| {
                        let key = forward
                            .eval(&Scope::empty(), key)
                            .map_err(|err| err.prefixed(&prefix))?;
                        Ok((key, value.clone()))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Map(entries))
            }
            other => Err(Error::TypeMismatch {
                path: walked.clone(),
                expected: Kind::Map,
                actual: other.kind(),
            }),
        },

        Action::TransformValues { forward, .. } => match v {
            Value::Map(entries) => {
                let prefix = walked.clone().map_values();
                let entries = entries
                    .iter()
                    .map(|(key, value)| {
                        let value = forward
                            .eval(&Scope::empty(), value)
                            .map_err(|err| err.prefixed(&prefix))?;
                        Ok((key.clone(), value))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Map(entries))
            }
            other => Err(Error::TypeMismatch {
                path: walked.clone(),
                expected: Kind::Map,
                actual: other.kind(),
            }),
        },

        Action::Join { .. } => unreachable!("joins are applied against the root"),
    }
}

// Resolve |path| to the single value it addresses, reading only.
// Join sources must be single-valued: broadcast nodes do not resolve.
fn query<'v>(root: &'v Value, path: &Path) -> Result<&'v Value> {
    let mut v = root;
    let mut walked = Path::root();

    for node in path.iter() {
        v = match (node, v) {
            (Node::Field(name), Value::Record(_)) => {
                v.field(name).ok_or_else(|| Error::MissingPath {
                    path: walked.clone().field(name),
                })?
            }
            (Node::Case(name), Value::Variant(case, payload)) => {
                if case != name {
                    return Err(Error::NoMatch {
                        path: walked.clone().case(name),
                        expected: name.clone(),
                        actual: case.clone(),
                    });
                }
                payload
            }
            (Node::Optional, Value::Variant(..)) => match v.as_option() {
                Some(Some(inner)) => inner,
                _ => {
                    return Err(Error::MissingPath {
                        path: walked.clone().optional(),
                    })
                }
            },
            (Node::Elements | Node::MapKeys | Node::MapValues, _) => {
                return Err(Error::MissingPath {
                    path: walked.clone(),
                })
            }
            (node, v) => {
                return Err(Error::TypeMismatch {
                    path: walked.clone(),
                    expected: expected_kind(node),
                    actual: v.kind(),
                })
            }
        };
        walked.push(node.clone());
    }
    Ok(v)
}

// Write |out| at |path|. An absent record field named by the final node
// is appended; every other location must already exist.
fn write(v: &Value, path: &[Node], walked: &mut Path, out: &Value) -> Result<Value> {
    let Some((node, rest)) = path.split_first() else {
        return Ok(out.clone());
    };

    match (node, v) {
        (Node::Field(name), Value::Record(fields)) => {
            let mut fields = fields.clone();
            match fields.iter().position(|(n, _)| n == name) {
                Some(index) => {
                    walked.push(Node::Field(name.clone()));
                    let child = write(&fields[index].1, rest, walked, out)?;
                    walked.pop();
                    fields[index].1 = child;
                }
                None if rest.is_empty() => fields.push((name.clone(), out.clone())),
                None => {
                    return Err(Error::MissingPath {
                        path: walked.clone().field(name),
                    })
                }
            }
            Ok(Value::Record(fields))
        }

        (Node::Case(name), Value::Variant(case, payload)) => {
            if case != name {
                return Err(Error::NoMatch {
                    path: walked.clone().case(name),
                    expected: name.clone(),
                    actual: case.clone(),
                });
            }
            walked.push(Node::Case(name.clone()));
            let child = write(payload, rest, walked, out)?;
            walked.pop();
            Ok(Value::Variant(case.clone(), Box::new(child)))
        }

        (Node::Optional, Value::Variant(..)) => match v.as_option() {
            Some(Some(inner)) => {
                walked.push(Node::Optional);
                let child = write(inner, rest, walked, out)?;
                walked.pop();
                Ok(Value::some(child))
            }
            _ => Err(Error::MissingPath {
                path: walked.clone().optional(),
            }),
        },

        (Node::Elements | Node::MapKeys | Node::MapValues, _) => Err(Error::MissingPath {
            path: walked.clone(),
        }),

        (node, v) => Err(Error::TypeMismatch {
            path: walked.clone(),
            expected: expected_kind(node),
            actual: v.kind(),
        }),
    }
}
