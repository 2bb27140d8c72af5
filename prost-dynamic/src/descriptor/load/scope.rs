use std::iter;

use crate::descriptor::{load::flatten::qualify, FileIndex, KindIndex, PoolData, Target};

/// Why a type name could not be resolved.
pub(super) enum Unresolved {
    Missing,
    NotAType(String),
    NotImported { name: String, defined_in: FileIndex },
}

/// Resolves the type name `name` as written in a file, relative to `scope`.
///
/// A name starting with `.` is fully-qualified. Otherwise the name is looked up in `scope`,
/// then in each enclosing scope out to the root, and the innermost match wins. If nothing
/// matches, the first candidate that exists but cannot be used is reported.
pub(super) fn resolve(
    pool: &PoolData,
    file: FileIndex,
    scope: &str,
    name: &str,
) -> Result<KindIndex, Unresolved> {
    if let Some(absolute) = name.strip_prefix('.') {
        return candidate(pool, file, absolute).unwrap_or(Err(Unresolved::Missing));
    }

    let mut unusable = None;
    for scope in enclosing_scopes(scope) {
        match candidate(pool, file, &qualify(scope, name)) {
            Some(Ok(kind)) => return Ok(kind),
            Some(Err(err)) => {
                unusable.get_or_insert(err);
            }
            None => {}
        }
    }
    Err(unusable.unwrap_or(Unresolved::Missing))
}

/// Checks a single fully-qualified name. Gives `None` if nothing is declared under it.
fn candidate(
    pool: &PoolData,
    file: FileIndex,
    name: &str,
) -> Option<Result<KindIndex, Unresolved>> {
    let symbol = pool.symbols.get(name)?;
    if !pool.files[file as usize].visible.contains(&symbol.origin.file) {
        return Some(Err(Unresolved::NotImported {
            name: name.to_owned(),
            defined_in: symbol.origin.file,
        }));
    }
    Some(match symbol.target {
        Target::Message(index) => Ok(KindIndex::Message(index)),
        Target::Enum(index) => Ok(KindIndex::Enum(index)),
        _ => Err(Unresolved::NotAType(name.to_owned())),
    })
}

/// `a.b.C` gives `a.b.C`, `a.b`, `a` and finally the root scope.
fn enclosing_scopes(scope: &str) -> impl Iterator<Item = &str> {
    iter::successors(Some(scope), |scope| {
        if scope.is_empty() {
            None
        } else {
            Some(scope.rsplit_once('.').map_or("", |(outer, _)| outer))
        }
    })
}

/// The default JSON name of a field: `snake_case` becomes `lowerCamelCase`.
pub(super) fn json_name(name: &str) -> String {
    let mut words = name.split('_');
    let mut json = String::with_capacity(name.len());
    json.extend(words.next());
    for word in words {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            json.push(first.to_ascii_uppercase());
            json.push_str(chars.as_str());
        }
    }
    json
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_names() {
        assert_eq!(json_name("foo_bar"), "fooBar");
        assert_eq!(json_name("foo_bar_baz_1"), "fooBarBaz1");
        assert_eq!(json_name("foo__bar"), "fooBar");
        assert_eq!(json_name("_leading"), "Leading");
        assert_eq!(json_name("trailing_"), "trailing");
        assert_eq!(json_name("already"), "already");
    }

    #[test]
    fn scopes_widen_to_root() {
        let scopes: Vec<_> = enclosing_scopes("a.b.C").collect();
        assert_eq!(scopes, ["a.b.C", "a.b", "a", ""]);
        assert_eq!(enclosing_scopes("").collect::<Vec<_>>(), [""]);
    }
}
