use ulid::Ulid;

/// Fresh session identifier, used as the owner token for lock proxies.
pub fn new_session_id() -> String {
    Ulid::new().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique_ulids() {
        let a = new_session_id();
        let b = new_session_id();
        assert!(Ulid::from_string(&a).is_ok());
        assert!(Ulid::from_string(&b).is_ok());
        assert_ne!(a, b);
    }
}
