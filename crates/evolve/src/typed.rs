use crate::apply::Result;
use crate::migration::DynamicMigration;
use crate::schema::{self, Schema};
use crate::shape::Shape;
use crate::validate::validate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Migration<A, B> is a DynamicMigration paired with the schema
/// descriptors of its source and target types. It applies to host
/// values: A is encoded to a Value through the source schema, the
/// dynamic migration interprets it, and the result decodes to B
/// through the target schema.
pub struct Migration<A, B> {
    dynamic: DynamicMigration,
    source: Schema,
    target: Schema,
    _marker: PhantomData<fn(A) -> B>,
}

impl<A, B> Migration<A, B> {
    /// Wrap |dynamic| without shape validation.
    pub fn partial(dynamic: DynamicMigration, source: Schema, target: Schema) -> Migration<A, B> {
        Migration {
            dynamic,
            source,
            target,
            _marker: PhantomData,
        }
    }

    /// Wrap |dynamic|, first validating that it carries the source
    /// shape fully onto the target shape.
    pub fn strict(
        dynamic: DynamicMigration,
        source: Schema,
        target: Schema,
    ) -> Result<Migration<A, B>> {
        validate(&dynamic, &Shape::infer(&source), &Shape::infer(&target)).ok()?;
        Ok(Migration::partial(dynamic, source, target))
    }

    pub fn dynamic(&self) -> &DynamicMigration {
        &self.dynamic
    }

    pub fn source_schema(&self) -> &Schema {
        &self.source
    }

    pub fn target_schema(&self) -> &Schema {
        &self.target
    }

    /// The reverse migration, from B back to A, defined iff the
    /// underlying dynamic migration is lossless.
    pub fn reverse(&self) -> Option<Migration<B, A>> {
        Some(Migration {
            dynamic: self.dynamic.reverse()?,
            source: self.target.clone(),
            target: self.source.clone(),
            _marker: PhantomData,
        })
    }
}

impl<A, B> Clone for Migration<A, B> {
    fn clone(&self) -> Self {
        Migration {
            dynamic: self.dynamic.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A, B> std::fmt::Debug for Migration<A, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("dynamic", &self.dynamic)
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

impl<A: Serialize, B: DeserializeOwned> Migration<A, B> {
    /// Migrate one host value.
    pub fn apply(&self, a: &A) -> Result<B> {
        let doc = serde_json::to_value(a)?;
        let value = schema::encode(&self.source, &doc)?;
        let value = self.dynamic.apply(&value)?;
        let doc = schema::decode(&self.target, &value)?;
        Ok(serde_json::from_value(doc)?)
    }
}
