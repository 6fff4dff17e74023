//! Paginated list responses for shares, schemas and tables.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One page of a list response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            next_page_token,
        }
    }
}

/// Decode a `{items, nextPageToken}` list response body.
pub fn decode_paginated_list<T: DeserializeOwned>(json: &str) -> crate::Result<Page<T>> {
    serde_json::from_str(json).map_err(|e| crate::Error::Decode(format!("invalid list page: {e}")))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
    pub share: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub name: String,
    pub schema: String,
    pub share: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Paging position encoded in `pageToken`: the number of items already served.
///
/// Tokens are opaque to clients.
pub fn encode_page_token(offset: usize) -> String {
    format!("o{offset}")
}

pub fn decode_page_token(token: &str) -> crate::Result<usize> {
    token
        .strip_prefix('o')
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| crate::Error::InvalidArgument(format!("invalid page token: {token}")))
}

/// Slice an in-memory listing into one page.
pub fn paginate<T: Clone>(
    all: &[T],
    max_results: usize,
    page_token: Option<&str>,
) -> crate::Result<Page<T>> {
    let start = match page_token {
        Some(token) => decode_page_token(token)?,
        None => 0,
    };
    let max_results = max_results.max(1);
    let end = start.saturating_add(max_results).min(all.len());
    let items = all.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
    let next_page_token = (end < all.len()).then(|| encode_page_token(end));
    Ok(Page::new(items, next_page_token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_paginated_list() {
        let json = r#"{"items":[{"name":"acme","id":"1"},{"name":"globex"}],"nextPageToken":"abc"}"#;
        let page: Page<ShareInfo> = decode_paginated_list(json).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[1].id, None);
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_decode_empty_list_without_items() {
        let page: Page<SchemaInfo> = decode_paginated_list("{}").unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_paginate() {
        let all: Vec<u32> = (0..5).collect();
        let first = paginate(&all, 2, None).unwrap();
        assert_eq!(first.items, vec![0, 1]);
        let second = paginate(&all, 2, first.next_page_token.as_deref()).unwrap();
        assert_eq!(second.items, vec![2, 3]);
        let third = paginate(&all, 2, second.next_page_token.as_deref()).unwrap();
        assert_eq!(third.items, vec![4]);
        assert!(third.next_page_token.is_none());

        assert!(paginate(&all, 2, Some("bogus")).is_err());
        assert!(paginate(&all, 2, Some("o99")).unwrap().items.is_empty());
    }
}
