//! Share and table references.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A share addressed either by its ID or by its unique name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShareRef {
    Id(Uuid),
    Name(String),
}

impl ShareRef {
    /// Interpret a path segment: a UUID is an ID, anything else a name.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(crate::Error::InvalidTableRef(
                "share reference is empty".to_string(),
            ));
        }
        Ok(match Uuid::parse_str(s) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(s.to_string()),
        })
    }
}

impl fmt::Display for ShareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<Uuid> for ShareRef {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

/// Fully qualified table reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub share: ShareRef,
    pub schema: String,
    pub table: String,
    /// Storage location overriding the catalog entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl TableRef {
    pub fn new(
        share: ShareRef,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> crate::Result<Self> {
        let schema = schema.into();
        let table = table.into();
        validate_name("schema", &schema)?;
        validate_name("table", &table)?;
        Ok(Self {
            share,
            schema,
            table,
            location: None,
        })
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.share, self.schema, self.table)
    }
}

/// Validate a catalog object name (share, schema or table).
pub fn validate_name(kind: &str, name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(crate::Error::InvalidTableRef(format!("{kind} name is empty")));
    }
    if name.len() > 255 {
        return Err(crate::Error::InvalidTableRef(format!(
            "{kind} name exceeds 255 characters"
        )));
    }
    if name.chars().any(|c| c == '/' || c.is_control()) {
        return Err(crate::Error::InvalidTableRef(format!(
            "{kind} name contains invalid characters: {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_ref_parse() {
        let id = Uuid::new_v4();
        assert_eq!(ShareRef::parse(&id.to_string()).unwrap(), ShareRef::Id(id));
        assert_eq!(
            ShareRef::parse("acme").unwrap(),
            ShareRef::Name("acme".to_string())
        );
        assert!(ShareRef::parse("  ").is_err());
    }

    #[test]
    fn test_table_ref_validation() {
        let share = ShareRef::Name("acme".to_string());
        let table = TableRef::new(share.clone(), "sales", "orders").unwrap();
        assert_eq!(table.to_string(), "acme.sales.orders");
        assert!(TableRef::new(share.clone(), "", "orders").is_err());
        assert!(TableRef::new(share, "sales", "a/b").is_err());
    }
}
