use serde::{Deserialize, Deserializer};

/// Deserialize a field that distinguishes "absent" from an explicit `null`.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: a missing key stays `None`, `null` becomes `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Apply a string patch only when it differs from the current value.
///
/// Returns `true` if the value changed.
pub(crate) fn set_if_changed(current: &mut String, next: Option<&String>) -> bool {
    match next {
        Some(next) if next != current => {
            current.clone_from(next);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        field: Option<Option<String>>,
    }

    #[test]
    fn absent_null_and_value_are_distinct() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.field, None);
        let null: Patch = serde_json::from_str(r#"{"field":null}"#).unwrap();
        assert_eq!(null.field, Some(None));
        let set: Patch = serde_json::from_str(r#"{"field":"x"}"#).unwrap();
        assert_eq!(set.field, Some(Some("x".to_owned())));
    }

    #[test]
    fn set_if_changed_reports_changes() {
        let mut value = "a".to_owned();
        assert!(!set_if_changed(&mut value, None));
        assert!(!set_if_changed(&mut value, Some(&"a".to_owned())));
        assert!(set_if_changed(&mut value, Some(&"b".to_owned())));
        assert_eq!(value, "b");
    }
}
