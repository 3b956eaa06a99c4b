/// Composite task identity helpers
///
/// Task ids are plain strings with structure layered on by convention:
///
/// - base identity: `<name>.<uuid>`
/// - retry attempts: the uuid carries a `-retry<K>` suffix, so the full
///   id of attempt K is `<name>.<uuid>-retry<K>`
/// - persisted composites: multi-part ids are joined with `:` into one
///   opaque string
///
/// All parse/format logic lives here so split/join rules are not
/// scattered across components.

/// Separator between a task name and its uuid tag
pub const ID_SEPARATOR: char = '.';

/// Separator used when persisting composite id sequences
pub const COMPOSITE_SEPARATOR: char = ':';

const RETRY_PREFIX: &str = "retry";

/// Formats the composite identity `<name>.<uuid>`
pub fn task_id(name: &str, uuid: &str) -> String {
    format!("{}{}{}", name, ID_SEPARATOR, uuid)
}

/// Tags a uuid with an attempt number: `<uuid>-retry<attempt>`
pub fn with_retry_suffix(uuid: &str, attempt: i32) -> String {
    format!("{}-{}{}", uuid, RETRY_PREFIX, attempt)
}

/// Splits a retry-tagged id into its base form and attempt number
///
/// The suffix is the last `-`-separated segment; uuids themselves
/// contain hyphens, so only that final segment is inspected. Returns
/// None when the id carries no well-formed attempt tag.
///
/// ```
/// use taskproc_shared::task_id::strip_retry_suffix;
///
/// let (base, attempt) = strip_retry_suffix("job.1b2c-d3e4-retry2").unwrap();
/// assert_eq!(base, "job.1b2c-d3e4");
/// assert_eq!(attempt, 2);
/// ```
pub fn strip_retry_suffix(id: &str) -> Option<(String, i32)> {
    let (base, suffix) = id.rsplit_once('-')?;
    let attempt = suffix.strip_prefix(RETRY_PREFIX)?.parse().ok()?;
    Some((base.to_string(), attempt))
}

/// Splits a composite identity into its name and uuid halves
///
/// The uuid half never contains the separator, so the split is taken at
/// the last `.`. Returns None for ids without one.
pub fn split_task_id(id: &str) -> Option<(&str, &str)> {
    id.rsplit_once(ID_SEPARATOR)
}

/// Joins a composite id sequence into one opaque persisted string
pub fn join_composite(parts: &[String]) -> String {
    parts.join(&COMPOSITE_SEPARATOR.to_string())
}

/// Splits a persisted composite id back into its parts
pub fn split_composite(id: &str) -> Vec<String> {
    id.split(COMPOSITE_SEPARATOR).map(str::to_string).collect()
}

/// Renders a task id in its persisted form: the id's segment sequence
/// joined into one opaque `:`-separated string
pub fn to_composite(id: &str) -> String {
    match split_task_id(id) {
        Some((name, uuid)) => join_composite(&[name.to_string(), uuid.to_string()]),
        None => id.to_string(),
    }
}

/// Restores a task id from its persisted form
///
/// Composites that do not split into the two-segment runtime layout are
/// returned unchanged.
pub fn from_composite(composite: &str) -> String {
    let parts = split_composite(composite);
    match parts.as_slice() {
        [name, uuid] => task_id(name, uuid),
        _ => composite.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_format() {
        assert_eq!(task_id("fake_name", "u1"), "fake_name.u1");
    }

    #[test]
    fn test_retry_suffix_round_trip() {
        let tagged = with_retry_suffix("1b2c-d3e4", 3);
        assert_eq!(tagged, "1b2c-d3e4-retry3");

        let (base, attempt) = strip_retry_suffix(&tagged).unwrap();
        assert_eq!(base, "1b2c-d3e4");
        assert_eq!(attempt, 3);
    }

    #[test]
    fn test_strip_retry_suffix_on_full_task_id() {
        let (base, attempt) = strip_retry_suffix("fake_name.1b2c-d3e4-retry1").unwrap();
        assert_eq!(base, "fake_name.1b2c-d3e4");
        assert_eq!(attempt, 1);
    }

    #[test]
    fn test_strip_retry_suffix_rejects_untagged_ids() {
        assert_eq!(strip_retry_suffix("fake_name.u1"), None);
        assert_eq!(strip_retry_suffix("plain"), None);
        assert_eq!(strip_retry_suffix("fake_name.u1-retryx"), None);
    }

    #[test]
    fn test_composite_round_trip() {
        let parts = vec!["fake_name".to_string(), "u1".to_string()];
        let joined = join_composite(&parts);
        assert_eq!(joined, "fake_name:u1");
        assert_eq!(split_composite(&joined), parts);
    }

    #[test]
    fn test_split_task_id() {
        assert_eq!(split_task_id("fake_name.u1"), Some(("fake_name", "u1")));
        assert_eq!(split_task_id("a.b.u1"), Some(("a.b", "u1")));
        assert_eq!(split_task_id("plain"), None);
    }

    #[test]
    fn test_persisted_composite_round_trip() {
        assert_eq!(to_composite("fake_name.u1"), "fake_name:u1");
        assert_eq!(from_composite("fake_name:u1"), "fake_name.u1");

        // Dotted names split at the uuid boundary and restore intact.
        assert_eq!(to_composite("a.b.u1"), "a.b:u1");
        assert_eq!(from_composite("a.b:u1"), "a.b.u1");
    }

    #[test]
    fn test_unparseable_ids_persist_unchanged() {
        assert_eq!(to_composite("plain"), "plain");
        assert_eq!(from_composite("plain"), "plain");
        assert_eq!(from_composite("a:b:c"), "a:b:c");
    }
}
