//! # Property Paths
//!
//! Grammar of the addresses a store understands:
//!
//! - `name`: a property of a directly attached provider (or a
//!   `collection.length` counter)
//! - `collection[index].name`: a property of the provider at `index`
//! - `collection[uuid].name`: a property of the item whose uuid matches
//!
//! Property names may contain dots but never square brackets.
//!
//! Paths may also carry `${variable}` / `$variable` placeholders, resolved
//! against a variable map with `resolve_variables` before lookup.

use std::collections::HashMap;

use crate::error::{DataError, DataResult};

/// Suffix of the per-collection length property.
pub const LENGTH_SUFFIX: &str = ".length";

/// How a collection item is addressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemKey<'a> {
    /// Positional access.
    Index(usize),
    /// Access by provider uuid.
    Uuid(&'a str),
}

/// A parsed property path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyPath<'a> {
    /// Bare property name.
    Plain(&'a str),
    /// Property of a collection item.
    Item {
        /// Collection name.
        collection: &'a str,
        /// Item selector.
        key: ItemKey<'a>,
        /// Property name on the item.
        property: &'a str,
    },
}

impl<'a> PropertyPath<'a> {
    /// Parses a path.
    ///
    /// # Errors
    ///
    /// `InvalidPath` if brackets are unbalanced, the item key or the
    /// property name is empty, or the closing bracket is not followed by `.`.
    pub fn parse(path: &'a str) -> DataResult<Self> {
        let invalid = |reason| DataError::InvalidPath {
            path: path.to_owned(),
            reason,
        };

        let Some(open) = path.find('[') else {
            if path.contains(']') {
                return Err(invalid("unbalanced ']'"));
            }
            if path.is_empty() {
                return Err(invalid("empty path"));
            }
            return Ok(Self::Plain(path));
        };

        let collection = &path[..open];
        if collection.is_empty() {
            return Err(invalid("missing collection name"));
        }

        let rest = &path[open + 1..];
        let close = rest.find(']').ok_or_else(|| invalid("missing ']'"))?;
        let key = &rest[..close];
        if key.is_empty() {
            return Err(invalid("empty item key"));
        }
        if key.contains('[') {
            return Err(invalid("nested '['"));
        }

        let property = rest[close + 1..]
            .strip_prefix('.')
            .ok_or_else(|| invalid("expected '.' after ']'"))?;
        if property.is_empty() {
            return Err(invalid("empty property name"));
        }
        if property.contains('[') || property.contains(']') {
            return Err(invalid("brackets in property name"));
        }

        let key = if key.bytes().all(|b| b.is_ascii_digit()) {
            let index = key.parse().map_err(|_| invalid("index overflow"))?;
            ItemKey::Index(index)
        } else {
            ItemKey::Uuid(key)
        };

        Ok(Self::Item {
            collection,
            key,
            property,
        })
    }
}

/// Positional path of a collection item's property.
#[inline]
#[must_use]
pub fn item_path(collection: &str, index: usize, property: &str) -> String {
    format!("{collection}[{index}].{property}")
}

/// Uuid-keyed path of a collection item's property.
#[inline]
#[must_use]
pub fn uuid_path(collection: &str, uuid: &str, property: &str) -> String {
    format!("{collection}[{uuid}].{property}")
}

/// Name of the length property of a collection.
#[inline]
#[must_use]
pub fn length_path(collection: &str) -> String {
    format!("{collection}{LENGTH_SUFFIX}")
}

/// Substitutes `${name}` and `$name` placeholders in `path`.
///
/// Longer variable names are substituted first, so `$materialUuid` is never
/// clobbered by a shorter `$material`. Unknown placeholders are left as is.
///
/// # Example
///
/// ```rust,ignore
/// let vars = HashMap::from([("materialUuid".to_owned(), "01H...".to_owned())]);
/// let path = resolve_variables(&vars, "material[${materialUuid}].diffuseColor");
/// assert_eq!(path, "material[01H...].diffuseColor");
/// ```
#[must_use]
pub fn resolve_variables(variables: &HashMap<String, String>, path: &str) -> String {
    if !path.contains('$') || variables.is_empty() {
        return path.to_owned();
    }

    let mut names: Vec<(&String, &String)> = variables.iter().collect();
    names.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut resolved = path.to_owned();
    for (name, value) in names {
        resolved = resolved.replace(&format!("${{{name}}}"), value);
        resolved = resolved.replace(&format!("${name}"), value);
    }
    resolved
}
