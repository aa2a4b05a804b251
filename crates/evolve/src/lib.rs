// Evolve is a declarative schema-migration engine. A migration is a
// vector of plain-data actions over a generic tagged tree of values:
// it's authored once, serialized, and later executed against raw data
// in a process which never linked the original or migrated types.
// Migrations compose, lossless migrations reverse, and the algebra
// obeys identity and associativity laws exactly.

// Value is the generic tagged tree over which migrations operate.
pub mod value;
pub use value::{compare, Kind, Primitive, Value};

// Path selects a location (or broadcast set of locations) in a Value.
pub mod ptr;
pub use ptr::{Node, Path};

// Expr is the pure, serializable expression language actions embed.
pub mod expr;
pub use expr::{Expr, Scope};

// Action is the closed sum of atomic migration steps.
pub mod action;
pub use action::Action;

// DynamicMigration is an action vector with its algebra: composition,
// lossiness, and reversal.
pub mod migration;
pub use migration::DynamicMigration;

// The interpreter executes one migration against one Value, and owns
// the crate-wide Error surface.
pub mod apply;
pub use apply::{apply, apply_action, Error};

// Schema is the external type descriptor the engine consumes, with the
// codec between JSON documents and Values.
pub mod schema;
pub use schema::Schema;

// Shape extracts the set of field paths a schema reaches.
pub mod shape;
pub use shape::Shape;

// The validator decides whether a migration carries a source shape
// fully onto a target shape.
pub mod validate;
pub use validate::{validate, Coverage, Outcome};

// Migration<A, B> wraps a DynamicMigration with typed endpoints.
pub mod typed;
pub use typed::Migration;

// MigrationBuilder is authoring sugar over the action vector.
pub mod builder;
pub use builder::MigrationBuilder;
