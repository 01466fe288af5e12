use uuid::Uuid;

/// Generate a unique identifier for flows, reports and runs.
///
/// UUIDs rather than timestamp-derived ids, so uniqueness does not depend
/// on clock resolution.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
