use shelf_core::AppError;
use uuid::Uuid;

/// Allow the call only when `requester_id` owns the record.
///
/// Pure check; callers run it before any upload, remote delete or record write.
pub fn ensure_owner(author: Uuid, requester_id: Uuid, action: &str) -> Result<(), AppError> {
    if author == requester_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("You cannot {} others book", action)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_allowed() {
        let id = Uuid::new_v4();
        assert!(ensure_owner(id, id, "update").is_ok());
    }

    #[test]
    fn test_other_user_forbidden() {
        let err = ensure_owner(Uuid::new_v4(), Uuid::new_v4(), "delete").unwrap_err();
        match err {
            AppError::Forbidden(msg) => assert_eq!(msg, "You cannot delete others book"),
            other => panic!("expected Forbidden, got {:?}", other),
        }
    }
}
