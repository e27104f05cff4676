//! Route table for the `/todos` resource.
//!
//! # Invariants
//! - The literal `recycle-bin` segment always wins over an `:id` capture.
//! - Query flags are true only for the exact string `"true"`, compared after
//!   percent-decoding.

use std::collections::HashMap;

/// HTTP method subset served by the todo resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One resolved endpoint. Captured ids are kept raw; parsing happens later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Create,
    FindActive,
    FindDeleted,
    FindDeletedById(String),
    FindById(String),
    Update(String),
    Restore(String),
    SoftDelete(String),
    DeleteAllHard,
}

impl Route {
    /// Maps a method and path (without query string) to a route.
    pub fn resolve(method: Method, path: &str) -> Option<Self> {
        let segments: Vec<&str> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        match (method, segments.as_slice()) {
            (Method::Post, ["todos"]) => Some(Self::Create),
            (Method::Get, ["todos"]) => Some(Self::FindActive),
            (Method::Delete, ["todos"]) => Some(Self::DeleteAllHard),
            (Method::Get, ["todos", "recycle-bin"]) => Some(Self::FindDeleted),
            (Method::Get, ["todos", "recycle-bin", id]) => {
                Some(Self::FindDeletedById((*id).to_string()))
            }
            (Method::Get, ["todos", id]) => Some(Self::FindById((*id).to_string())),
            (Method::Put, ["todos", id]) => Some(Self::Update((*id).to_string())),
            (Method::Delete, ["todos", id]) => Some(Self::SoftDelete((*id).to_string())),
            (Method::Post, ["todos", id, "restore"]) => Some(Self::Restore((*id).to_string())),
            _ => None,
        }
    }
}

/// Splits `"/todos/1?includeDeleted=true"` into path and decoded query pairs.
///
/// Keys and values are form-urlencoded decoded. A repeated key keeps its
/// first value.
pub fn split_target(
    target: &str,
) -> Result<(&str, HashMap<String, String>), serde_urlencoded::de::Error> {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };

    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)?;
    let mut params = HashMap::new();
    for (key, value) in pairs {
        params.entry(key).or_insert(value);
    }
    Ok((path, params))
}

/// Reads a boolean query flag: only the literal `"true"` counts.
pub fn parse_flag(value: Option<&str>) -> bool {
    value == Some("true")
}

#[cfg(test)]
mod tests {
    use super::{parse_flag, split_target, Method, Route};

    #[test]
    fn recycle_bin_segment_wins_over_id_capture() {
        assert_eq!(
            Route::resolve(Method::Get, "/todos/recycle-bin"),
            Some(Route::FindDeleted)
        );
        assert_eq!(
            Route::resolve(Method::Get, "/todos/recycle-bin/abc"),
            Some(Route::FindDeletedById("abc".to_string()))
        );
        assert_eq!(
            Route::resolve(Method::Get, "/todos/abc"),
            Some(Route::FindById("abc".to_string()))
        );
    }

    #[test]
    fn resolves_mutating_routes() {
        assert_eq!(Route::resolve(Method::Post, "/todos"), Some(Route::Create));
        assert_eq!(
            Route::resolve(Method::Put, "/todos/1/"),
            Some(Route::Update("1".to_string()))
        );
        assert_eq!(
            Route::resolve(Method::Post, "/todos/1/restore"),
            Some(Route::Restore("1".to_string()))
        );
        assert_eq!(
            Route::resolve(Method::Delete, "/todos/1"),
            Some(Route::SoftDelete("1".to_string()))
        );
        assert_eq!(
            Route::resolve(Method::Delete, "/todos"),
            Some(Route::DeleteAllHard)
        );
        assert_eq!(Route::resolve(Method::Put, "/todos"), None);
        assert_eq!(Route::resolve(Method::Get, "/notes"), None);
    }

    #[test]
    fn flags_compare_literally_to_true() {
        assert!(parse_flag(Some("true")));
        assert!(!parse_flag(Some("TRUE")));
        assert!(!parse_flag(Some("1")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn split_target_separates_query_pairs() {
        let (path, params) = split_target("/todos/1?includeDeleted=true&x").unwrap();
        assert_eq!(path, "/todos/1");
        assert_eq!(params.get("includeDeleted").map(String::as_str), Some("true"));
        assert_eq!(params.get("x").map(String::as_str), Some(""));

        let (path, params) = split_target("/todos").unwrap();
        assert_eq!(path, "/todos");
        assert!(params.is_empty());
    }

    #[test]
    fn split_target_decodes_values_and_keeps_first_repeat() {
        let (_, params) =
            split_target("/todos/1?overrideDeleted=tru%65&overrideDeleted=false").unwrap();
        let flag = params.get("overrideDeleted").map(String::as_str);
        assert_eq!(flag, Some("true"));
        assert!(parse_flag(flag));

        let (_, params) = split_target("/todos/1?includeDeleted=%20true").unwrap();
        assert!(!parse_flag(params.get("includeDeleted").map(String::as_str)));
    }

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!(Method::parse("put"), Some(Method::Put));
        assert_eq!(Method::parse("PATCH"), None);
    }
}
