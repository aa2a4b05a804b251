use crate::action::Action;
use crate::apply::{Error, Result};
use crate::migration::DynamicMigration;
use crate::ptr::Path;
use crate::shape::Shape;
use std::collections::BTreeSet;

/// Coverage accumulates, per action, the source-side paths a migration
/// handles and the target-side paths it provides. Case-level actions
/// touch entire subtrees and are tracked as prefixes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Coverage {
    pub handled_from_source: BTreeSet<Path>,
    pub provided_to_target: BTreeSet<Path>,
    handled_prefixes: BTreeSet<Path>,
    provided_prefixes: BTreeSet<Path>,
}

impl Coverage {
    pub fn of(migration: &DynamicMigration) -> Coverage {
        let mut coverage = Coverage::default();
        coverage.accumulate(&migration.actions, &Path::root());
        coverage
    }

    fn accumulate(&mut self, actions: &[Action], base: &Path) {
        for action in actions {
            let at = base.and_then(action.at());

            match action {
                Action::AddField { name, .. } => {
                    self.provided_to_target.insert(at.field(name));
                }
                Action::DropField { name, .. } => {
                    self.handled_from_source.insert(at.field(name));
                }
                Action::Rename { from, to, .. } => {
                    self.handled_from_source.insert(at.clone().field(from));
                    self.provided_to_target.insert(at.field(to));
                }
                // A mandated or optionalized field keeps its path on
                // both sides; only its optionality changes.
                Action::Mandate { name, .. } | Action::Optionalize { name, .. } => {
                    let path = at.field(name);
                    self.handled_from_source.insert(path.clone());
                    self.provided_to_target.insert(path);
                }
                Action::RenameCase { from, to, .. } => {
                    self.handled_prefixes.insert(at.clone().case(from));
                    self.provided_prefixes.insert(at.case(to));
                }
                Action::RemoveCase { name, .. } => {
                    self.handled_prefixes.insert(at.case(name));
                }
                Action::TransformCase { name, inner, .. } => {
                    self.accumulate(inner, &at.case(name));
                }
                // In-place transforms consume their subtree from the
                // source and produce it for the target.
                Action::TransformValue { .. }
                | Action::TransformElements { .. }
                | Action::TransformKeys { .. }
                | Action::TransformValues { .. } => {
                    self.handled_prefixes.insert(at.clone());
                    self.provided_prefixes.insert(at);
                }
                Action::Join { sources, .. } => {
                    for source in sources {
                        self.handled_from_source.insert(base.and_then(source));
                    }
                    self.provided_to_target.insert(at);
                }
            }
        }
    }

    pub fn handles(&self, path: &Path) -> bool {
        self.handled_from_source.contains(path)
            || self.handled_prefixes.iter().any(|p| path.starts_with(p))
    }

    pub fn provides(&self, path: &Path) -> bool {
        self.provided_to_target.contains(path)
            || self.provided_prefixes.iter().any(|p| path.starts_with(p))
    }
}

/// Outcome of a shape validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every source path is handled or carried through unchanged, and
    /// every target path is provided or carried through unchanged.
    Complete,
    Incomplete {
        missing_source_fields: BTreeSet<Path>,
        missing_target_fields: BTreeSet<Path>,
    },
}

impl Outcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete)
    }

    /// Require completeness, for strict builds.
    pub fn ok(self) -> Result<()> {
        match self {
            Outcome::Complete => Ok(()),
            Outcome::Incomplete {
                missing_source_fields,
                missing_target_fields,
            } => Err(Error::Incomplete {
                missing_source_fields,
                missing_target_fields,
            }),
        }
    }
}

/// Does |migration| carry |source| fully onto |target|?
/// A source path is covered when an action handles it, or when it also
/// appears, untouched, in the target; and symmetrically for targets.
pub fn validate(migration: &DynamicMigration, source: &Shape, target: &Shape) -> Outcome {
    let coverage = Coverage::of(migration);

    let missing_source_fields = source
        .fields
        .iter()
        .filter(|path| {
            !coverage.handles(path) && !(target.contains(path) && !coverage.provides(path))
        })
        .cloned()
        .collect::<BTreeSet<_>>();

    let missing_target_fields = target
        .fields
        .iter()
        .filter(|path| {
            !coverage.provides(path) && !(source.contains(path) && !coverage.handles(path))
        })
        .cloned()
        .collect::<BTreeSet<_>>();

    if missing_source_fields.is_empty() && missing_target_fields.is_empty() {
        Outcome::Complete
    } else {
        Outcome::Incomplete {
            missing_source_fields,
            missing_target_fields,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expr::Expr;
    use crate::schema::Schema;
    use crate::value::Value;

    fn shape(schema: &Schema) -> Shape {
        Shape::infer(schema)
    }

    #[test]
    fn test_rename_and_add_complete() {
        let source = Schema::record([("user_name", Schema::String), ("age", Schema::Int)]);
        let target = Schema::record([
            ("full_name", Schema::String),
            ("age", Schema::Int),
            ("country", Schema::String),
        ]);

        let m = DynamicMigration::new(vec![
            Action::Rename {
                at: Path::root(),
                from: "user_name".to_string(),
                to: "full_name".to_string(),
            },
            Action::AddField {
                at: Path::root(),
                name: "country".to_string(),
                default: Expr::Literal(Value::string("USA")),
            },
        ]);

        // /age is untouched and present on both sides, which covers it.
        assert_eq!(validate(&m, &shape(&source), &shape(&target)), Outcome::Complete);
    }

    #[test]
    fn test_incomplete_reports_both_directions() {
        let source = Schema::record([("a", Schema::Int), ("b", Schema::Int)]);
        let target = Schema::record([("a", Schema::Int), ("c", Schema::Int)]);

        // The empty migration covers /a (unchanged) but neither handles
        // /b nor provides /c.
        let outcome = validate(&DynamicMigration::identity(), &shape(&source), &shape(&target));
        assert_eq!(
            outcome,
            Outcome::Incomplete {
                missing_source_fields: [Path::root().field("b")].into_iter().collect(),
                missing_target_fields: [Path::root().field("c")].into_iter().collect(),
            }
        );
        assert!(!outcome.is_complete());
        assert!(outcome.ok().is_err());
    }

    #[test]
    fn test_renamed_source_field_no_longer_covers_target() {
        // A rename consumes its source path, so a target which still
        // declares the old name is not covered by it.
        let source = Schema::record([("a", Schema::Int)]);
        let target = Schema::record([("a", Schema::Int)]);

        let m = DynamicMigration::new(vec![Action::Rename {
            at: Path::root(),
            from: "a".to_string(),
            to: "b".to_string(),
        }]);

        let outcome = validate(&m, &shape(&source), &shape(&target));
        assert_eq!(
            outcome,
            Outcome::Incomplete {
                missing_source_fields: BTreeSet::new(),
                missing_target_fields: [Path::root().field("a")].into_iter().collect(),
            }
        );
    }

    #[test]
    fn test_case_transform_covers_nested_paths() {
        let source = Schema::record([(
            "status",
            Schema::variant([("Active", Schema::record([("since", Schema::Long)]))]),
        )]);
        let target = Schema::record([(
            "status",
            Schema::variant([("Active", Schema::record([("activated", Schema::Long)]))]),
        )]);

        let m = DynamicMigration::new(vec![Action::TransformCase {
            at: Path::root().field("status"),
            name: "Active".to_string(),
            inner: vec![Action::Rename {
                at: Path::root(),
                from: "since".to_string(),
                to: "activated".to_string(),
            }],
        }]);

        assert_eq!(validate(&m, &shape(&source), &shape(&target)), Outcome::Complete);

        let coverage = Coverage::of(&m);
        assert!(coverage.handles(&Path::root().field("status").case("Active").field("since")));
        assert!(coverage.provides(&Path::root().field("status").case("Active").field("activated")));
    }

    #[test]
    fn test_transform_covers_its_subtree() {
        let source = Schema::record([(
            "tags",
            Schema::sequence(Schema::record([("t", Schema::String)])),
        )]);
        let target = source.clone();

        let m = DynamicMigration::new(vec![Action::TransformElements {
            at: Path::root().field("tags"),
            forward: Expr::Identity,
            inverse: Expr::Identity,
        }]);

        assert_eq!(validate(&m, &shape(&source), &shape(&target)), Outcome::Complete);

        let coverage = Coverage::of(&m);
        assert!(coverage.handles(&Path::root().field("tags").elements().field("t")));
        assert!(coverage.provides(&Path::root().field("tags")));
    }

    #[test]
    fn test_case_rename_covers_moved_subtree() {
        let source = Schema::record([(
            "status",
            Schema::variant([("Active", Schema::record([("since", Schema::Long)]))]),
        )]);
        let target = Schema::record([(
            "status",
            Schema::variant([("Enabled", Schema::record([("since", Schema::Long)]))]),
        )]);

        let m = DynamicMigration::new(vec![Action::RenameCase {
            at: Path::root().field("status"),
            from: "Active".to_string(),
            to: "Enabled".to_string(),
        }]);

        assert_eq!(validate(&m, &shape(&source), &shape(&target)), Outcome::Complete);
    }

    #[test]
    fn test_join_handles_sources_and_provides_target() {
        let source = Schema::record([
            ("first", Schema::String),
            ("last", Schema::String),
        ]);
        let target = Schema::record([("full", Schema::String)]);

        let m = DynamicMigration::new(vec![
            Action::Join {
                at: Path::root().field("full"),
                sources: vec![Path::root().field("first"), Path::root().field("last")],
                body: Expr::Concat {
                    parts: vec![Expr::Arg(0), Expr::Arg(1)],
                    separator: " ".to_string(),
                },
            },
            Action::DropField {
                at: Path::root(),
                name: "first".to_string(),
                reverse_default: None,
            },
            Action::DropField {
                at: Path::root(),
                name: "last".to_string(),
                reverse_default: None,
            },
        ]);

        assert_eq!(validate(&m, &shape(&source), &shape(&target)), Outcome::Complete);
    }
}
