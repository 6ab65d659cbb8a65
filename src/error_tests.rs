use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AclError::input("empty_assignments", "no data").http_status(), 400);
    assert_eq!(AclError::not_found("/a/b").http_status(), 404);
    assert_eq!(AclError::conflict("stale").http_status(), 409);
    assert_eq!(AclError::storage("disk").http_status(), 500);
    assert_eq!(AclError::inconsistent("/a", "container unreadable").http_status(), 500);
    assert_eq!(AclError::malformed("/a", "empty principal").http_status(), 500);
}

#[test]
fn inconsistency_counts_as_storage_failure() {
    assert!(AclError::inconsistent("/a", "x").is_storage_failure());
    assert!(AclError::storage("x").is_storage_failure());
    assert!(!AclError::not_found("x").is_storage_failure());
    assert!(AclError::not_found("x").is_not_found());
}

#[test]
fn code_and_display() {
    let e = AclError::input("empty_principal", "principal name is blank");
    assert_eq!(e.code_str(), "empty_principal");
    assert_eq!(e.to_string(), "empty_principal: principal name is blank");
    assert_eq!(AclError::storage("boom").code_str(), "storage_failure");
}

#[test]
fn io_errors_split_on_kind() {
    let nf = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    assert!(AclError::from(nf).is_not_found());
    let other = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
    assert!(AclError::from(other).is_storage_failure());
}

#[test]
fn serializes_with_type_tag() {
    let v = serde_json::to_value(AclError::storage("x")).unwrap();
    assert_eq!(v["type"], "storage");
    assert_eq!(v["message"], "x");
}
