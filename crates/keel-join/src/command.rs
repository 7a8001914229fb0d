//! Command-line assembly for generated units.

use std::collections::BTreeMap;

/// `binary --key=value ...` with flags sorted by key.
///
/// `extra` is merged over `defaults`, so a user-supplied flag replaces
/// the generated one of the same name instead of repeating it.
pub fn build_command(binary: &str, defaults: BTreeMap<String, String>, extra: &BTreeMap<String, String>) -> Vec<String> {
    let mut flags = defaults;
    for (k, v) in extra {
        flags.insert(k.clone(), v.clone());
    }

    std::iter::once(binary.to_string())
        .chain(flags.into_iter().map(|(k, v)| format!("--{k}={v}")))
        .collect()
}

/// Small helper for building a flag map from literals.
pub(crate) fn flags<const N: usize>(pairs: [(&str, String); N]) -> BTreeMap<String, String> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
