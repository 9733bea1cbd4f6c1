//! Which stores an activating generation deletes.

/// Stores owned by this system (name starts with `prefix`) that do not belong
/// to the current generation, in the order given.
///
/// Stores created by anything else are left alone.
pub fn stale_stores<S: AsRef<str>>(names: &[S], prefix: &str, current: &str) -> Vec<String> {
    names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| name.starts_with(prefix) && *name != current)
        .map(str::to_string)
        .collect()
}
