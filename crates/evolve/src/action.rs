use crate::expr::Expr;
use crate::ptr::Path;
use crate::value::Value;

/// Action is one atomic migration step: a location given by |at|, and a
/// structural rewrite to perform there. The set is closed and every
/// variant is plain data, so a vector of actions serializes and is
/// executable in a process which never linked the source or target
/// types. Adding a variant is an intentional, schema-breaking change.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Action {
    /// Append a field to the focused record, valued by |default|.
    AddField { at: Path, name: String, default: Expr },
    /// Remove a field of the focused record. The |reverse_default|
    /// is what a reversed migration would re-add the field with; when
    /// absent, the drop discards information and the action is lossy.
    DropField {
        at: Path,
        name: String,
        reverse_default: Option<Expr>,
    },
    /// Rename a field of the focused record, keeping its position.
    Rename { at: Path, from: String, to: String },
    /// Unwrap an optional field: `Some(x)` becomes `x`, and `None`
    /// becomes the evaluated |default|.
    Mandate { at: Path, name: String, default: Expr },
    /// Wrap a field value `x` as `Some(x)`.
    Optionalize { at: Path, name: String },
    /// Rename the focused variant's case when it matches |from|.
    RenameCase { at: Path, from: String, to: String },
    /// Fail when the focused variant's case matches |name|. A removed
    /// case has no representation on the target side.
    RemoveCase { at: Path, name: String },
    /// Run |inner| actions against the payload of a matching case.
    TransformCase {
        at: Path,
        name: String,
        inner: Vec<Action>,
    },
    /// Replace the focused value with `forward(focus)`.
    TransformValue {
        at: Path,
        forward: Expr,
        inverse: Option<Expr>,
    },
    /// Apply |forward| to each element of the focused sequence.
    TransformElements { at: Path, forward: Expr, inverse: Expr },
    /// Apply |forward| to each key of the focused map.
    TransformKeys { at: Path, forward: Expr, inverse: Expr },
    /// Apply |forward| to each value of the focused map.
    TransformValues { at: Path, forward: Expr, inverse: Expr },
    /// Read each |sources| path from the root, bind the results
    /// positionally, evaluate |body|, and write the result at |at|.
    Join {
        at: Path,
        sources: Vec<Path>,
        body: Expr,
    },
}

impl Action {
    /// The Path at which this action applies.
    pub fn at(&self) -> &Path {
        match self {
            Action::AddField { at, .. }
            | Action::DropField { at, .. }
            | Action::Rename { at, .. }
            | Action::Mandate { at, .. }
            | Action::Optionalize { at, .. }
            | Action::RenameCase { at, .. }
            | Action::RemoveCase { at, .. }
            | Action::TransformCase { at, .. }
            | Action::TransformValue { at, .. }
            | Action::TransformElements { at, .. }
            | Action::TransformKeys { at, .. }
            | Action::TransformValues { at, .. }
            | Action::Join { at, .. } => at,
        }
    }

    /// Is this action lossy? A lossy action has no structural reverse
    /// which recovers its input.
    pub fn is_lossy(&self) -> bool {
        match self {
            Action::AddField { .. }
            | Action::Rename { .. }
            | Action::Mandate { .. }
            | Action::Optionalize { .. }
            | Action::RenameCase { .. } => false,

            Action::DropField {
                reverse_default, ..
            } => reverse_default.is_none(),

            // A removed case cannot be reconstructed.
            Action::RemoveCase { .. } => true,

            Action::TransformCase { inner, .. } => inner.iter().any(Action::is_lossy),

            Action::TransformValue { inverse, .. } => inverse.is_none(),

            // The inverse expression is required at construction, and
            // supplying it is the author's assertion of invertibility.
            Action::TransformElements { .. }
            | Action::TransformKeys { .. }
            | Action::TransformValues { .. } => false,

            // The closed set has no split action to pair with a join.
            Action::Join { .. } => true,
        }
    }

    /// The structural reverse of this action, defined iff it's not
    /// lossy.
    pub fn reverse(&self) -> Option<Action> {
        let reversed = match self {
            Action::AddField { at, name, default } => Action::DropField {
                at: at.clone(),
                name: name.clone(),
                reverse_default: Some(default.clone()),
            },
            Action::DropField {
                at,
                name,
                reverse_default,
            } => Action::AddField {
                at: at.clone(),
                name: name.clone(),
                default: reverse_default.clone()?,
            },
            Action::Rename { at, from, to } => Action::Rename {
                at: at.clone(),
                from: to.clone(),
                to: from.clone(),
            },
            Action::Mandate { at, name, .. } => Action::Optionalize {
                at: at.clone(),
                name: name.clone(),
            },
            // An optionalized field is always `Some`, so the mandate
            // default on the way back is never consulted.
            Action::Optionalize { at, name } => Action::Mandate {
                at: at.clone(),
                name: name.clone(),
                default: Expr::Literal(Value::unit()),
            },
            Action::RenameCase { at, from, to } => Action::RenameCase {
                at: at.clone(),
                from: to.clone(),
                to: from.clone(),
            },
            Action::RemoveCase { .. } => return None,
            Action::TransformCase { at, name, inner } => {
                let mut inner = inner
                    .iter()
                    .map(Action::reverse)
                    .collect::<Option<Vec<_>>>()?;
                inner.reverse();
                Action::TransformCase {
                    at: at.clone(),
                    name: name.clone(),
                    inner,
                }
            }
            Action::TransformValue { at, forward, inverse } => Action::TransformValue {
                at: at.clone(),
                forward: inverse.clone()?,
                inverse: Some(forward.clone()),
            },
            Action::TransformElements { at, forward, inverse } => Action::TransformElements {
                at: at.clone(),
                forward: inverse.clone(),
                inverse: forward.clone(),
            },
            Action::TransformKeys { at, forward, inverse } => Action::TransformKeys {
                at: at.clone(),
                forward: inverse.clone(),
                inverse: forward.clone(),
            },
            Action::TransformValues { at, forward, inverse } => Action::TransformValues {
                at: at.clone(),
                forward: inverse.clone(),
                inverse: forward.clone(),
            },
            Action::Join { .. } => return None,
        };
        Some(reversed)
    }
}
