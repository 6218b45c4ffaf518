//! Input schemas for tools.
//!
//! A tool's input schema is a JSON object schema derived either from an
//! explicit parameter list ([`build_schema`]) or from a typed argument struct
//! ([`json_schema_for`]).

use schemars::JsonSchema;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// JSON type of a single tool parameter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// Map a declared type name to a JSON type.
    ///
    /// Understands plain names (`str`, `int`, `float`, `bool`, `list`,
    /// `dict`), Rust types (`String`, `&str`, `i64`, `u32`, `f64`,
    /// `Vec<T>`, `HashMap<K, V>`, `Option<T>`), and module-qualified paths.
    /// Unknown or empty names are treated as strings.
    pub fn from_annotation(annotation: &str) -> Self {
        let mut ty = annotation.trim();
        if let Some(rest) = ty.strip_prefix('&') {
            ty = rest.trim_start();
            ty = ty.strip_prefix("mut ").unwrap_or(ty).trim_start();
            ty = ty.strip_prefix("'static ").unwrap_or(ty).trim_start();
        }
        if ty.starts_with('[') {
            return ParamType::Array;
        }
        if ty.starts_with('(') {
            return if ty == "()" {
                ParamType::String
            } else {
                ParamType::Array
            };
        }

        let (base, inner) = match ty.split_once(['<', '[']) {
            Some((base, rest)) => (base, rest.strip_suffix(['>', ']']).unwrap_or(rest)),
            None => (ty, ""),
        };
        let base = base.rsplit("::").next().unwrap_or(base).trim();

        match base {
            "Option" | "Optional" | "Box" | "Arc" | "Rc" | "Cow" => {
                ParamType::from_annotation(inner)
            }
            "str" | "String" | "string" | "char" | "Path" | "PathBuf" | "OsString" => {
                ParamType::String
            }
            "int" | "integer" | "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8"
            | "u16" | "u32" | "u64" | "u128" | "usize" => ParamType::Integer,
            "float" | "number" | "f32" | "f64" => ParamType::Number,
            "bool" | "boolean" => ParamType::Boolean,
            "list" | "List" | "array" | "tuple" | "Tuple" | "set" | "Set" | "Vec" | "VecDeque"
            | "HashSet" | "BTreeSet" | "Sequence" => ParamType::Array,
            "dict" | "Dict" | "object" | "map" | "Map" | "Mapping" | "HashMap" | "BTreeMap"
            | "IndexMap" => ParamType::Object,
            _ => ParamType::String,
        }
    }
}

/// A declared tool parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: ParamType,
    /// Present for optional parameters.
    pub default: Option<Value>,
}

impl Param {
    /// A required string parameter. Refine it with [`typed`](Self::typed),
    /// [`of`](Self::of) and [`default`](Self::default).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ParamType::String,
            default: None,
        }
    }

    /// Set the type from a declared type name.
    pub fn typed(mut self, annotation: &str) -> Self {
        self.ty = ParamType::from_annotation(annotation);
        self
    }

    pub fn of(mut self, ty: ParamType) -> Self {
        self.ty = ty;
        self
    }

    /// Make the parameter optional with the given default.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Whether this is a method receiver rather than a real argument.
    pub fn is_receiver(&self) -> bool {
        matches!(
            self.name.trim(),
            "self" | "&self" | "&mut self" | "mut self"
        )
    }
}

/// `"type": "object"` marker.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    #[default]
    Object,
}

/// Schema of one property.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Object schema describing a tool's input.
///
/// Properties keep declaration order when serialized.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    #[serde(serialize_with = "ordered_properties")]
    pub properties: Vec<(String, PropertySchema)>,
    pub required: Vec<String>,
}

fn ordered_properties<S: Serializer>(
    properties: &[(String, PropertySchema)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(properties.len()))?;
    for (name, prop) in properties {
        map.serialize_entry(name, prop)?;
    }
    map.end()
}

impl InputSchema {
    /// Schema of the named property.
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, prop)| prop)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(
            |_| serde_json::json!({"type": "object", "properties": {}, "required": []}),
        )
    }
}

/// Build the input schema for a parameter list.
///
/// Parameters without a default are required. Properties and `required`
/// both follow declaration order. A
/// leading receiver (`self`, `&self`, ...) is skipped. When a name repeats,
/// the first declaration wins.
pub fn build_schema(params: &[Param]) -> InputSchema {
    let mut schema = InputSchema::default();
    for (idx, param) in params.iter().enumerate() {
        if idx == 0 && param.is_receiver() {
            continue;
        }
        if schema.property(&param.name).is_some() {
            continue;
        }
        schema.properties.push((
            param.name.clone(),
            PropertySchema {
                ty: param.ty,
                default: param.default.clone(),
            },
        ));
        if param.is_required() {
            schema.required.push(param.name.clone());
        }
    }
    schema
}

/// Generate a JSON Schema value from a type implementing [`JsonSchema`].
///
/// Use with `#[derive(JsonSchema)]` on a typed argument struct to avoid
/// hand-writing schemas.
pub fn json_schema_for<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}
