use crate::engine::EngineError;
use crate::value::Value;

/// A bound statement parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    IntArray(Vec<i64>),
    TextArray(Vec<String>),
    Json(Value),
}

impl Param {
    /// Convert a non-null value. Homogeneous integer or string lists become
    /// arrays; any other list or object is passed as `jsonb`.
    pub fn from_value(value: &Value) -> Result<Self, EngineError> {
        match value {
            Value::Null => Err(EngineError::InvalidExpression(
                "NULL cannot be bound as a parameter".to_string(),
            )),
            Value::Bool(value) => Ok(Self::Bool(*value)),
            Value::Number(number) => match number.as_i64() {
                Some(int) => Ok(Self::Int(int)),
                None => number.as_f64().map(Self::Float).ok_or_else(|| {
                    EngineError::InvalidExpression(format!("{} does not fit a float8", number))
                }),
            },
            Value::String(text) => Ok(Self::Text(text.clone())),
            Value::Array(items) => {
                if let Some(ints) = items.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
                    if !ints.is_empty() {
                        return Ok(Self::IntArray(ints));
                    }
                }
                match items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                {
                    Some(texts) => Ok(Self::TextArray(texts)),
                    None => Ok(Self::Json(value.clone())),
                }
            }
            Value::Object(_) => Ok(Self::Json(value.clone())),
        }
    }

    pub fn cast(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int8",
            Self::Float(_) => "float8",
            Self::Text(_) => "text",
            Self::IntArray(_) => "int8[]",
            Self::TextArray(_) => "text[]",
            Self::Json(_) => "jsonb",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::IntArray(_) | Self::TextArray(_))
    }
}

pub struct QueryBuilder {
    indent: u16,
    buf: String,
    params: Vec<Param>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self {
            indent: 0,
            buf: String::new(),
            params: vec![],
        }
    }

    pub fn build(self) -> (String, Vec<Param>) {
        (self.buf, self.params)
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn outdent(&mut self) {
        self.indent -= 1;
    }

    pub fn newline(&mut self) {
        self.push("\n");
        self.buf.extend((0..self.indent).map(|_| "  "));
    }

    pub fn push(&mut self, str: &str) {
        self.buf.push_str(str);
    }

    /// Push a double-quoted identifier.
    pub fn push_ident(&mut self, ident: &str) {
        self.buf.push('"');
        self.buf.push_str(&ident.replace('"', "\"\""));
        self.buf.push('"');
    }

    /// Push a numbered placeholder with an explicit cast.
    pub fn push_param(&mut self, param: Param) {
        let cast = param.cast();
        self.params.push(param);
        let placeholder = format!("${}::{}", self.params.len(), cast);
        self.push(&placeholder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_are_numbered_and_cast() {
        let mut builder = QueryBuilder::new();
        builder.push("SELECT");
        builder.indent();
        builder.newline();
        builder.push_param(Param::from_value(&json!("Sol")).unwrap());
        builder.push(", ");
        builder.push_param(Param::from_value(&json!([1, 2])).unwrap());
        builder.outdent();
        builder.newline();
        builder.push_ident("we\"ird");

        let (sql, params) = builder.build();
        assert_eq!(sql, "SELECT\n  $1::text, $2::int8[]\n\"we\"\"ird\"");
        assert_eq!(params, vec![Param::Text("Sol".into()), Param::IntArray(vec![1, 2])]);
    }

    #[test]
    fn value_conversion() {
        assert_eq!(Param::from_value(&json!(1.5)).unwrap(), Param::Float(1.5));
        assert_eq!(
            Param::from_value(&json!(["a", "b"])).unwrap(),
            Param::TextArray(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            Param::from_value(&json!([1, "b"])).unwrap(),
            Param::Json(json!([1, "b"]))
        );
        assert!(Param::from_value(&Value::Null).is_err());
    }
}
