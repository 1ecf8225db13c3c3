//! Share id generation.

use uuid::Uuid;

use crate::defaults::SHARE_ID_LEN;

/// Generate a short opaque share id: the first 8 hex chars of a random UUIDv4.
///
/// Collisions are not defended against.
pub fn new_share_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(SHARE_ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_id_shape() {
        let id = new_share_id();
        assert_eq!(id.len(), SHARE_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_share_ids_vary() {
        assert_ne!(new_share_id(), new_share_id());
    }
}
