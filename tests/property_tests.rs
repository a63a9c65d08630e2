//! Property-based tests for loading and lookup.
//!
//! Test coverage:
//! - Round-trip: `name=value` lines written out are recovered by `get`.
//! - Trailing newline has no observable effect on lookups.
//! - Duplicate names resolve to the first occurrence.

use std::collections::HashMap;
use std::io::Write;

use kvconf::{load_bytes, load_file, Lookup};
use proptest::prelude::*;
use tempfile::NamedTempFile;

/// Names are non-empty and contain neither `=` nor `\n`.
fn name_strategy() -> impl Strategy<Value = String> {
    "[^=\\n\\x00]{1,24}"
}

/// Values may contain `=` and spaces but no `\n`.
fn value_strategy() -> impl Strategy<Value = String> {
    "[^\\n\\x00]{0,40}"
}

fn pairs_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec((name_strategy(), value_strategy()), 0..20)
}

fn render(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{}={}\n", name, value))
        .collect()
}

fn first_values(pairs: &[(String, String)]) -> HashMap<&str, &str> {
    let mut first = HashMap::new();
    for (name, value) in pairs {
        first.entry(name.as_str()).or_insert(value.as_str());
    }
    first
}

proptest! {
    #[test]
    fn prop_round_trip_from_buffer(pairs in pairs_strategy()) {
        let store = load_bytes(render(&pairs).as_bytes()).unwrap();
        prop_assert_eq!(store.len(), pairs.len());
        for (name, value) in first_values(&pairs) {
            prop_assert_eq!(store.get(name), Lookup::Found(value.as_bytes()));
        }
    }

    #[test]
    fn prop_round_trip_from_file(pairs in pairs_strategy()) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(render(&pairs).as_bytes()).unwrap();
        file.flush().unwrap();

        let store = load_file(file.path()).unwrap();
        for (name, value) in first_values(&pairs) {
            prop_assert_eq!(store.get(name), Lookup::Found(value.as_bytes()));
        }
    }

    #[test]
    fn prop_trailing_newline_is_invisible(pairs in pairs_strategy(), probe in name_strategy()) {
        let with = render(&pairs);
        let without = with.strip_suffix('\n').unwrap_or(&with);

        let a = load_bytes(with.as_bytes()).unwrap();
        let b = load_bytes(without.as_bytes()).unwrap();
        prop_assert!(a.entries().eq(b.entries()));
        prop_assert_eq!(a.get(&probe), b.get(&probe));
    }

    #[test]
    fn prop_absent_names_are_not_found(pairs in pairs_strategy(), probe in name_strategy()) {
        prop_assume!(!pairs.iter().any(|(name, _)| *name == probe));
        let store = load_bytes(render(&pairs).as_bytes()).unwrap();
        prop_assert_eq!(store.get(&probe), Lookup::NotFound);
    }

    #[test]
    fn prop_bare_names_have_no_value(name in name_strategy()) {
        let store = load_bytes(format!("{}\n", name).as_bytes()).unwrap();
        prop_assert_eq!(store.get(&name), Lookup::NoValue);
    }
}
