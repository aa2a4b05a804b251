use crate::ptr::{Node, Path};
use crate::schema::Schema;
use std::collections::BTreeSet;

/// Shape is the set of field paths reachable from a schema descriptor's
/// root. It's the skeleton a coverage validation compares against:
/// only structure, no primitive detail.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Shape {
    pub fields: BTreeSet<Path>,
}

impl Shape {
    /// Infer the Shape of |schema| by walking its descriptor and
    /// collecting every reachable path which names a field. Variant
    /// cases contribute case segments, sequences and maps contribute
    /// broadcast segments, and optional wrappers are transparent.
    pub fn infer(schema: &Schema) -> Shape {
        let mut fields = BTreeSet::new();
        walk(schema, &mut Path::root(), &mut fields);
        Shape { fields }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.fields.contains(path)
    }
}

fn walk(schema: &Schema, prefix: &mut Path, out: &mut BTreeSet<Path>) {
    match schema {
        Schema::Record(fields) => {
            for (name, child) in fields {
                prefix.push(Node::Field(name.clone()));
                out.insert(prefix.clone());
                walk(child, prefix, out);
                prefix.pop();
            }
        }
        Schema::Variant(cases) => {
            for (name, child) in cases {
                prefix.push(Node::Case(name.clone()));
                walk(child, prefix, out);
                prefix.pop();
            }
        }
        Schema::Sequence(inner) => {
            prefix.push(Node::Elements);
            walk(inner, prefix, out);
            prefix.pop();
        }
        Schema::Map(key, value) => {
            prefix.push(Node::MapKeys);
            walk(key, prefix, out);
            prefix.pop();

            prefix.push(Node::MapValues);
            walk(value, prefix, out);
            prefix.pop();
        }
        Schema::Optional(inner) => walk(inner, prefix, out),

        Schema::Unit
        | Schema::Bool
        | Schema::Int
        | Schema::Long
        | Schema::Float
        | Schema::Double
        | Schema::String
        | Schema::Bytes => {}
    }
}
