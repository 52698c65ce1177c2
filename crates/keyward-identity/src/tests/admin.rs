//! Admin role tests.

use super::helpers::*;
use crate::*;

async fn with_admin(fingerprint: &str) -> Harness {
    let h = harness();
    let seeded = h
        .service
        .bootstrap_admins_at(&[fingerprint.to_string()], NOW)
        .await
        .unwrap();
    assert_eq!(seeded, 1);
    h
}

#[tokio::test]
async fn test_bootstrap_seeds_empty_set_once() {
    let h = harness();

    let seeded = h
        .service
        .bootstrap_admins_at(&[ALICE_FP.into(), "sha256:aliceKey1".into(), BOB_FP.into()], NOW)
        .await
        .unwrap();
    assert_eq!(seeded, 2);

    let again = h.service.bootstrap_admins(&[CAROL_FP.into()]).await.unwrap();
    assert_eq!(again, 0);
    assert!(!h.service.is_admin(CAROL_FP).await.unwrap());
    assert!(h.service.is_admin(BOB_FP).await.unwrap());
}

#[tokio::test]
async fn test_bootstrap_with_nothing_configured() {
    let h = harness();

    assert_eq!(h.service.bootstrap_admins(&[]).await.unwrap(), 0);
    assert!(!h.service.is_admin(ALICE_FP).await.unwrap());
}

#[tokio::test]
async fn test_bootstrap_rejects_malformed_fingerprint() {
    let h = harness();

    let err = h.service.bootstrap_admins(&["".to_string()]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_admin_role_needs_no_registration() {
    let h = with_admin(ALICE_FP).await;

    h.service.add_admin(ALICE_FP, BOB_FP).await.unwrap();

    assert!(h.service.is_admin(BOB_FP).await.unwrap());
}

#[tokio::test]
async fn test_add_admin_requires_admin() {
    let h = with_admin(ALICE_FP).await;

    let err = h.service.add_admin(BOB_FP, CAROL_FP).await.unwrap_err();

    assert_eq!(err.to_string(), "unauthorized: only admins can add new admins");
    assert!(!h.service.is_admin(CAROL_FP).await.unwrap());
}

#[tokio::test]
async fn test_add_existing_admin() {
    let h = with_admin(ALICE_FP).await;

    let err = h.service.add_admin(ALICE_FP, ALICE_FP).await.unwrap_err();

    assert!(matches!(err, IdentityError::AdminExists));
}

#[tokio::test]
async fn test_last_admin_cannot_be_removed() {
    let h = with_admin(ALICE_FP).await;

    let own = h.service.remove_admin(ALICE_FP, ALICE_FP).await.unwrap_err();
    assert!(matches!(own, IdentityError::LastAdmin));

    // The floor applies before the target is looked up
    let other = h.service.remove_admin(ALICE_FP, BOB_FP).await.unwrap_err();
    assert!(matches!(other, IdentityError::LastAdmin));

    assert!(h.service.is_admin(ALICE_FP).await.unwrap());
}

#[tokio::test]
async fn test_remove_admin() {
    let h = with_admin(ALICE_FP).await;
    h.service.add_admin(ALICE_FP, BOB_FP).await.unwrap();

    let missing = h.service.remove_admin(ALICE_FP, CAROL_FP).await.unwrap_err();
    assert!(matches!(missing, IdentityError::AdminNotFound));

    h.service.remove_admin(BOB_FP, ALICE_FP).await.unwrap();
    assert!(!h.service.is_admin(ALICE_FP).await.unwrap());

    let err = h.service.remove_admin(ALICE_FP, BOB_FP).await.unwrap_err();
    assert_eq!(err.to_string(), "unauthorized: only admins can remove admins");
}

#[tokio::test]
async fn test_list_admins_in_insertion_order() {
    let h = with_admin(CAROL_FP).await;
    h.service.add_admin_at(CAROL_FP, ALICE_FP, NOW + 10).await.unwrap();
    h.service.add_admin_at(CAROL_FP, BOB_FP, NOW + 20).await.unwrap();

    let admins = h.service.list_admins(BOB_FP).await.unwrap();

    let listed: Vec<(&str, u64)> = admins.iter().map(|a| (a.fingerprint.as_str(), a.created_at)).collect();
    assert_eq!(listed, vec![(CAROL_FP, NOW), (ALICE_FP, NOW + 10), (BOB_FP, NOW + 20)]);
}

#[tokio::test]
async fn test_list_admins_requires_admin() {
    let h = with_admin(ALICE_FP).await;

    let err = h.service.list_admins(BOB_FP).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}
