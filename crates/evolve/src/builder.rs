use crate::action::Action;
use crate::apply::Result;
use crate::expr::Expr;
use crate::migration::DynamicMigration;
use crate::ptr::Path;
use crate::schema::Schema;
use crate::shape::Shape;
use crate::validate::validate;

/// MigrationBuilder authors a DynamicMigration one operation at a time.
/// Each operation emits exactly one action; the builder is sugar over
/// the action vector and nothing more.
#[derive(Clone, Debug, Default)]
pub struct MigrationBuilder {
    actions: Vec<Action>,
}

impl MigrationBuilder {
    pub fn new() -> MigrationBuilder {
        MigrationBuilder::default()
    }

    pub fn add_field(mut self, at: Path, name: impl Into<String>, default: Expr) -> Self {
        self.actions.push(Action::AddField {
            at,
            name: name.into(),
            default,
        });
        self
    }

    pub fn drop_field(
        mut self,
        at: Path,
        name: impl Into<String>,
        reverse_default: Option<Expr>,
    ) -> Self {
        self.actions.push(Action::DropField {
            at,
            name: name.into(),
            reverse_default,
        });
        self
    }

    pub fn rename_field(
        mut self,
        at: Path,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.actions.push(Action::Rename {
            at,
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn mandate(mut self, at: Path, name: impl Into<String>, default: Expr) -> Self {
        self.actions.push(Action::Mandate {
            at,
            name: name.into(),
            default,
        });
        self
    }

    pub fn optionalize(mut self, at: Path, name: impl Into<String>) -> Self {
        self.actions.push(Action::Optionalize {
            at,
            name: name.into(),
        });
        self
    }

    pub fn rename_case(
        mut self,
        at: Path,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.actions.push(Action::RenameCase {
            at,
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn remove_case(mut self, at: Path, name: impl Into<String>) -> Self {
        self.actions.push(Action::RemoveCase {
            at,
            name: name.into(),
        });
        self
    }

    /// Transform the payload of a matching case with a nested builder.
    pub fn transform_case(
        mut self,
        at: Path,
        name: impl Into<String>,
        inner: MigrationBuilder,
    ) -> Self {
        self.actions.push(Action::TransformCase {
            at,
            name: name.into(),
            inner: inner.actions,
        });
        self
    }

    pub fn transform_value(mut self, at: Path, forward: Expr, inverse: Option<Expr>) -> Self {
        self.actions.push(Action::TransformValue {
            at,
            forward,
            inverse,
        });
        self
    }

    pub fn transform_elements(mut self, at: Path, forward: Expr, inverse: Expr) -> Self {
        self.actions.push(Action::TransformElements {
            at,
            forward,
            inverse,
        });
        self
    }

    pub fn transform_keys(mut self, at: Path, forward: Expr, inverse: Expr) -> Self {
        self.actions.push(Action::TransformKeys {
            at,
            forward,
            inverse,
        });
        self
    }

    pub fn transform_values(mut self, at: Path, forward: Expr, inverse: Expr) -> Self {
        self.actions.push(Action::TransformValues {
            at,
            forward,
            inverse,
        });
        self
    }

    pub fn join(mut self, at: Path, sources: Vec<Path>, body: Expr) -> Self {
        self.actions.push(Action::Join { at, sources, body });
        self
    }

    /// Build the migration without shape validation.
    pub fn build_partial(self) -> DynamicMigration {
        DynamicMigration::new(self.actions)
    }

    /// Build the migration, first validating that it carries |source|
    /// fully onto |target|.
    pub fn build_strict(self, source: &Schema, target: &Schema) -> Result<DynamicMigration> {
        let migration = DynamicMigration::new(self.actions);
        validate(&migration, &Shape::infer(source), &Shape::infer(target)).ok()?;
        Ok(migration)
    }
}
