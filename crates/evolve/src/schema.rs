use crate::apply::{Error, Result};
use crate::ptr::{Node, Path};
use crate::value::{Kind, Primitive, Value};
use serde_json as sj;

/// Schema is the descriptor of a typed data shape, as handed to the
/// engine by an external deriver. The engine never reflects over live
/// host types: everything it needs to know about a type arrives here.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Schema {
    Unit,
    Bool,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
    /// Ordered record fields. Field order here is the order encoded
    /// documents carry.
    Record(Vec<(String, Schema)>),
    /// Tagged union cases.
    Variant(Vec<(String, Schema)>),
    Sequence(Box<Schema>),
    Map(Box<Schema>, Box<Schema>),
    Optional(Box<Schema>),
}

impl Schema {
    pub fn record<S: Into<String>>(fields: impl IntoIterator<Item = (S, Schema)>) -> Schema {
        Schema::Record(fields.into_iter().map(|(n, s)| (n.into(), s)).collect())
    }
    pub fn variant<S: Into<String>>(cases: impl IntoIterator<Item = (S, Schema)>) -> Schema {
        Schema::Variant(cases.into_iter().map(|(n, s)| (n.into(), s)).collect())
    }
    pub fn sequence(inner: Schema) -> Schema {
        Schema::Sequence(Box::new(inner))
    }
    pub fn map(key: Schema, value: Schema) -> Schema {
        Schema::Map(Box::new(key), Box::new(value))
    }
    pub fn optional(inner: Schema) -> Schema {
        Schema::Optional(Box::new(inner))
    }

    /// The Kind of values this schema describes.
    pub fn kind(&self) -> Kind {
        match self {
            Schema::Unit => Kind::Unit,
            Schema::Bool => Kind::Bool,
            Schema::Int => Kind::Int,
            Schema::Long => Kind::Long,
            Schema::Float => Kind::Float,
            Schema::Double => Kind::Double,
            Schema::String => Kind::String,
            Schema::Bytes => Kind::Bytes,
            Schema::Record(_) => Kind::Record,
            Schema::Variant(_) | Schema::Optional(_) => Kind::Variant,
            Schema::Sequence(_) => Kind::Sequence,
            Schema::Map(..) => Kind::Map,
        }
    }
}

/// Encode a JSON document into a Value, guided by |schema|.
/// Records take the schema's field order, variants use the externally
/// tagged convention, and optional locations map JSON null to `None`.
pub fn encode(schema: &Schema, doc: &sj::Value) -> Result<Value> {
    encode_at(schema, doc, &mut Path::root())
}

/// Decode a migrated Value back into a JSON document, guided by
/// |schema|. This is the inverse of `encode` over documents which
/// conform to the schema.
pub fn decode(schema: &Schema, value: &Value) -> Result<sj::Value> {
    decode_at(schema, value, &mut Path::root())
}

fn json_kind(doc: &sj::Value) -> Kind {
    match doc {
        sj::Value::Null => Kind::Unit,
        sj::Value::Bool(_) => Kind::Bool,
        sj::Value::Number(_) => Kind::Double,
        sj::Value::String(_) => Kind::String,
        sj::Value::Array(_) => Kind::Sequence,
        sj::Value::Object(_) => Kind::Record,
    }
}

fn encode_at(schema: &Schema, doc: &sj::Value, at: &mut Path) -> Result<Value> {
    let mismatch = |at: &Path| Error::TypeMismatch {
        path: at.clone(),
        expected: schema.kind(),
        actual: json_kind(doc),
    };

    match schema {
        Schema::Unit => match doc {
            sj::Value::Null => Ok(Value::unit()),
            _ => Err(mismatch(at)),
        },
        Schema::Bool => doc.as_bool().map(Value::bool).ok_or_else(|| mismatch(at)),
        Schema::Int => {
            let long = doc.as_i64().ok_or_else(|| mismatch(at))?;
            let int = i32::try_from(long).map_err(|_| Error::ConversionFailed {
                from: Kind::Long,
                to: Kind::Int,
                reason: format!("{long} is out of range for int"),
            })?;
            Ok(Value::int(int))
        }
        Schema::Long => doc.as_i64().map(Value::long).ok_or_else(|| mismatch(at)),
        Schema::Float => doc
            .as_f64()
            .map(|f| Value::float(f as f32))
            .ok_or_else(|| mismatch(at)),
        Schema::Double => doc.as_f64().map(Value::double).ok_or_else(|| mismatch(at)),
        Schema::String => doc
            .as_str()
            .map(Value::string)
            .ok_or_else(|| mismatch(at)),
        Schema::Bytes => {
            let encoded = doc.as_str().ok_or_else(|| mismatch(at))?;
            let bytes = base64::decode(encoded).map_err(|err| Error::ConversionFailed {
                from: Kind::String,
                to: Kind::Bytes,
                reason: err.to_string(),
            })?;
            Ok(Value::bytes(bytes))
        }

        Schema::Record(schema_fields) => {
            let obj = doc.as_object().ok_or_else(|| mismatch(at))?;

            let mut fields = Vec::with_capacity(schema_fields.len());
            for (name, child) in schema_fields {
                let value = match obj.get(name) {
                    Some(doc) => {
                        at.push(Node::Field(name.clone()));
                        let value = encode_at(child, doc, at)?;
                        at.pop();
                        value
                    }
                    // An absent optional field is an encoded None.
                    None if matches!(child, Schema::Optional(_)) => Value::none(),
                    None => {
                        return Err(Error::MissingPath {
                            path: at.clone().field(name),
                        })
                    }
                };
                fields.push((name.clone(), value));
            }
            Ok(Value::Record(fields))
        }

        Schema::Variant(cases) => {
            // Externally tagged: a bare string for empty-record cases,
            // else an object with exactly the case name as its key.
            if let Some(name) = doc.as_str() {
                return match cases.iter().find(|(n, _)| n == name) {
                    Some((_, Schema::Record(fields))) if fields.is_empty() => {
                        Ok(Value::variant(name, Value::Record(Vec::new())))
                    }
                    Some(_) => Err(mismatch(at)),
                    None => Err(Error::NoMatch {
                        path: at.clone(),
                        expected: case_names(cases),
                        actual: name.to_string(),
                    }),
                };
            }

            let obj = doc.as_object().ok_or_else(|| mismatch(at))?;
            let (name, payload) = match obj.iter().next() {
                Some(entry) if obj.len() == 1 => entry,
                _ => return Err(mismatch(at)),
            };
            let (_, child) = cases
                .iter()
                .find(|(n, _)| n == name)
                .ok_or_else(|| Error::NoMatch {
                    path: at.clone(),
                    expected: case_names(cases),
                    actual: name.clone(),
                })?;

            at.push(Node::Case(name.clone()));
            let payload = encode_at(child, payload, at)?;
            at.pop();

            Ok(Value::variant(name.clone(), payload))
        }

        Schema::Optional(inner) => match doc {
            sj::Value::Null => Ok(Value::none()),
            _ => {
                at.push(Node::Optional);
                let inner = encode_at(inner, doc, at)?;
                at.pop();
                Ok(Value::some(inner))
            }
        },

        Schema::Sequence(inner) => {
            let items = doc.as_array().ok_or_else(|| mismatch(at))?;

            at.push(Node::Elements);
            let items = items
                .iter()
                .map(|item| encode_at(inner, item, at))
                .collect::<Result<Vec<_>>>()?;
            at.pop();

            Ok(Value::Sequence(items))
        }

        Schema::Map(key, value) => {
            // String-keyed maps are JSON objects. Any other key type is
            // an array of [key, value] pairs.
            if **key == Schema::String {
                let obj = doc.as_object().ok_or_else(|| mismatch(at))?;

                at.push(Node::MapValues);
                let entries = obj
                    .iter()
                    .map(|(k, v)| Ok((Value::string(k.clone()), encode_at(value, v, at)?)))
                    .collect::<Result<Vec<_>>>()?;
                at.pop();

                Ok(Value::Map(entries))
            } else {
                let pairs = doc.as_array().ok_or_else(|| mismatch(at))?;

                let entries = pairs
                    .iter()
                    .map(|pair| {
                        let Some([k, v]) = pair.as_array().map(Vec::as_slice) else {
                            return Err(mismatch(at));
                        };
                        at.push(Node::MapKeys);
                        let k = encode_at(key, k, at)?;
                        at.pop();
                        at.push(Node::MapValues);
                        let v = encode_at(value, v, at)?;
                        at.pop();
                        Ok((k, v))
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(Value::Map(entries))
            }
        }
    }
}

fn case_names(cases: &[(String, Schema)]) -> String {
    cases
        .iter()
        .map(|(n, _)| n.as_str())
        .collect::<Vec<_>>()
        .join("|")
}

fn decode_at(schema: &Schema, value: &Value, at: &mut Path) -> Result<sj::Value> {
    let mismatch = |at: &Path| Error::TypeMismatch {
        path: at.clone(),
        expected: schema.kind(),
        actual: value.kind(),
    };

    // Non-finite floats have no JSON representation.
    let finite = |f: f64, kind: Kind| {
        sj::Number::from_f64(f)
            .map(sj::Value::Number)
            .ok_or_else(|| Error::ConversionFailed {
                from: kind,
                to: Kind::String,
                reason: format!("{f} has no JSON representation"),
            })
    };

    match (schema, value) {
        (Schema::Unit, Value::Primitive(Primitive::Unit)) => Ok(sj::Value::Null),
        (Schema::Bool, Value::Primitive(Primitive::Bool(b))) => Ok(sj::Value::Bool(*b)),
        (Schema::Int, Value::Primitive(Primitive::Int(i))) => Ok(sj::Value::from(*i)),
        (Schema::Long, Value::Primitive(Primitive::Long(l))) => Ok(sj::Value::from(*l)),
        (Schema::Float, Value::Primitive(Primitive::Float(f))) => {
            finite(f64::from(*f), Kind::Float)
        }
        (Schema::Double, Value::Primitive(Primitive::Double(d))) => finite(*d, Kind::Double),
        (Schema::String, Value::Primitive(Primitive::String(s))) => {
            Ok(sj::Value::String(s.clone()))
        }
        (Schema::Bytes, Value::Primitive(Primitive::Bytes(b))) => {
            Ok(sj::Value::String(base64::encode(b)))
        }

        (Schema::Record(schema_fields), Value::Record(_)) => {
            let mut obj = sj::Map::new();
            for (name, child) in schema_fields {
                let field = value.field(name).ok_or_else(|| Error::MissingPath {
                    path: at.clone().field(name),
                })?;

                at.push(Node::Field(name.clone()));
                let decoded = decode_at(child, field, at)?;
                at.pop();

                obj.insert(name.clone(), decoded);
            }
            Ok(sj::Value::Object(obj))
        }

        (Schema::Variant(cases), Value::Variant(case, payload)) => {
            let (_, child) = cases
                .iter()
                .find(|(n, _)| n == case)
                .ok_or_else(|| Error::NoMatch {
                    path: at.clone(),
                    expected: case_names(cases),
                    actual: case.clone(),
                })?;

            // Empty-record cases decode as a bare string tag.
            if matches!(payload.as_ref(), Value::Record(fields) if fields.is_empty()) {
                if matches!(child, Schema::Record(fields) if fields.is_empty()) {
                    return Ok(sj::Value::String(case.clone()));
                }
            }

            at.push(Node::Case(case.clone()));
            let payload = decode_at(child, payload, at)?;
            at.pop();

            let mut obj = sj::Map::new();
            obj.insert(case.clone(), payload);
            Ok(sj::Value::Object(obj))
        }

        (Schema::Optional(inner), Value::Variant(..)) => match value.as_option() {
            Some(None) => Ok(sj::Value::Null),
            Some(Some(present)) => {
                at.push(Node::Optional);
                let decoded = decode_at(inner, present, at)?;
                at.pop();
                Ok(decoded)
            }
            None => Err(mismatch(at)),
        },

        (Schema::Sequence(inner), Value::Sequence(items)) => {
            at.push(Node::Elements);
            let items = items
                .iter()
                .map(|item| decode_at(inner, item, at))
                .collect::<Result<Vec<_>>>()?;
            at.pop();
            Ok(sj::Value::Array(items))
        }

        (Schema::Map(key, value_schema), Value::Map(entries)) => {
            if **key == Schema::String {
                let mut obj = sj::Map::new();
                for (k, v) in entries {
                    let Value::Primitive(Primitive::String(k)) = k else {
                        return Err(Error::TypeMismatch {
                            path: at.clone().map_keys(),
                            expected: Kind::String,
                            actual: k.kind(),
                        });
                    };
                    at.push(Node::MapValues);
                    let v = decode_at(value_schema, v, at)?;
                    at.pop();
                    obj.insert(k.clone(), v);
                }
                Ok(sj::Value::Object(obj))
            } else {
                let pairs = entries
                    .iter()
                    .map(|(k, v)| {
                        at.push(Node::MapKeys);
                        let k = decode_at(key, k, at)?;
                        at.pop();
                        at.push(Node::MapValues);
                        let v = decode_at(value_schema, v, at)?;
                        at.pop();
                        Ok(sj::Value::Array(vec![k, v]))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(sj::Value::Array(pairs))
            }
        }

        _ => Err(mismatch(at)),
    }
}
