use crate::action::Action;
use crate::apply;
use crate::value::Value;

/// DynamicMigration is an ordered vector of actions, applied left to
/// right. Migrations compose by concatenation, and a lossless migration
/// has a structural reverse. The algebra obeys identity, associativity,
/// and double-reverse laws exactly, at the level of action vectors.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DynamicMigration {
    pub actions: Vec<Action>,
}

impl DynamicMigration {
    /// The identity migration: no actions, `apply` returns its input.
    pub fn identity() -> DynamicMigration {
        DynamicMigration::default()
    }

    pub fn new(actions: Vec<Action>) -> DynamicMigration {
        DynamicMigration { actions }
    }

    /// Compose with |other|: this migration's actions, then |other|'s.
    pub fn and_then(&self, other: &DynamicMigration) -> DynamicMigration {
        let mut actions = self.actions.clone();
        actions.extend(other.actions.iter().cloned());
        DynamicMigration { actions }
    }

    /// A migration is lossy when any of its actions is.
    pub fn is_lossy(&self) -> bool {
        self.actions.iter().any(Action::is_lossy)
    }

    /// The structural reverse: each action reversed, in reverse order.
    /// Defined iff this migration is lossless.
    pub fn reverse(&self) -> Option<DynamicMigration> {
        let mut actions = self
            .actions
            .iter()
            .map(Action::reverse)
            .collect::<Option<Vec<_>>>()?;
        actions.reverse();
        Some(DynamicMigration { actions })
    }

    /// Reverse without the lossiness check.
    /// Panics when the migration is lossy. This is a convenience for
    /// tests and tooling, not a library call path.
    pub fn unsafe_reverse(&self) -> DynamicMigration {
        self.reverse()
            .expect("migration is lossy and has no reverse")
    }

    /// Apply this migration to |value|.
    pub fn apply(&self, value: &Value) -> apply::Result<Value> {
        apply::apply(self, value)
    }
}
