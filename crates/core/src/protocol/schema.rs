//! Delta `schemaString` parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A top-level table column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Parse the top-level columns of a Delta `schemaString`.
///
/// Nested types are rendered as `struct<a:int,...>`, `array<...>` and
/// `map<k,v>`.
pub fn parse_schema_columns(schema_string: &str) -> crate::Result<Vec<Column>> {
    let schema: Value = serde_json::from_str(schema_string)
        .map_err(|e| crate::Error::Decode(format!("invalid schemaString: {e}")))?;

    if schema.get("type").and_then(Value::as_str) != Some("struct") {
        return Err(crate::Error::Decode(
            "schemaString must describe a struct".to_string(),
        ));
    }

    let fields = schema
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| crate::Error::Decode("schemaString has no fields array".to_string()))?;

    fields.iter().map(parse_field).collect()
}

fn parse_field(field: &Value) -> crate::Result<Column> {
    let name = field
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| crate::Error::Decode("schema field without a name".to_string()))?;
    let data_type = field
        .get("type")
        .ok_or_else(|| crate::Error::Decode(format!("schema field '{name}' has no type")))?;

    Ok(Column {
        name: name.to_string(),
        data_type: render_type(data_type)?,
        nullable: field.get("nullable").and_then(Value::as_bool).unwrap_or(true),
    })
}

fn render_type(data_type: &Value) -> crate::Result<String> {
    if let Some(primitive) = data_type.as_str() {
        return Ok(primitive.to_string());
    }

    match data_type.get("type").and_then(Value::as_str) {
        Some("struct") => {
            let fields = data_type
                .get("fields")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let inner = fields
                .iter()
                .map(|f| parse_field(f).map(|c| format!("{}:{}", c.name, c.data_type)))
                .collect::<crate::Result<Vec<_>>>()?;
            Ok(format!("struct<{}>", inner.join(",")))
        }
        Some("array") => {
            let element = data_type
                .get("elementType")
                .ok_or_else(|| crate::Error::Decode("array type without elementType".into()))?;
            Ok(format!("array<{}>", render_type(element)?))
        }
        Some("map") => {
            let key = data_type
                .get("keyType")
                .ok_or_else(|| crate::Error::Decode("map type without keyType".into()))?;
            let value = data_type
                .get("valueType")
                .ok_or_else(|| crate::Error::Decode("map type without valueType".into()))?;
            Ok(format!("map<{},{}>", render_type(key)?, render_type(value)?))
        }
        other => Err(crate::Error::Decode(format!(
            "unsupported schema type: {}",
            other.unwrap_or("<missing>")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_schema() {
        let schema = r#"{"type":"struct","fields":[
            {"name":"id","type":"long","nullable":false,"metadata":{}},
            {"name":"region","type":"string","nullable":true,"metadata":{}}
        ]}"#;
        let columns = parse_schema_columns(schema).unwrap();
        assert_eq!(
            columns,
            vec![
                Column {
                    name: "id".to_string(),
                    data_type: "long".to_string(),
                    nullable: false,
                },
                Column {
                    name: "region".to_string(),
                    data_type: "string".to_string(),
                    nullable: true,
                },
            ]
        );
    }

    #[test]
    fn test_parse_nested_schema() {
        let schema = r#"{"type":"struct","fields":[
            {"name":"tags","type":{"type":"array","elementType":"string","containsNull":true},"nullable":true},
            {"name":"attrs","type":{"type":"map","keyType":"string","valueType":"integer"},"nullable":true},
            {"name":"addr","type":{"type":"struct","fields":[{"name":"zip","type":"string","nullable":true}]},"nullable":true}
        ]}"#;
        let columns = parse_schema_columns(schema).unwrap();
        assert_eq!(columns[0].data_type, "array<string>");
        assert_eq!(columns[1].data_type, "map<string,integer>");
        assert_eq!(columns[2].data_type, "struct<zip:string>");
    }

    #[test]
    fn test_rejects_non_struct() {
        assert!(parse_schema_columns(r#"{"type":"array"}"#).is_err());
        assert!(parse_schema_columns("not json").is_err());
    }
}
