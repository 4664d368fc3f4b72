//! Property-based tests for project identity and relay fidelity.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

use bokchoi_cli::application::services::tunnel::{CHUNK_SIZE, relay};
use bokchoi_cli::domain::Project;
use bokchoi_cli::domain::project::{project_id, validate_project_id};

// ============================================================================
// project_id() property tests
// ============================================================================

proptest! {
    /// The same name and account always map to the same id.
    #[test]
    fn prop_project_id_is_deterministic(
        name in "[a-z][a-z0-9-]{0,20}[a-z0-9]",
        account in "[0-9]{12}",
    ) {
        prop_assert_eq!(project_id(&name, &account), project_id(&name, &account));
    }

    /// Every accepted project yields an id usable as a bucket name, and all
    /// derived resource names contain it.
    #[test]
    fn prop_project_names_are_owned(
        name in "[a-z][a-z0-9-]{0,20}[a-z0-9]",
        account in "[0-9]{12}",
    ) {
        let project = Project::new(&name, &account).unwrap();
        prop_assert!(validate_project_id(project.id()).is_ok());
        for derived in [
            project.bucket().to_string(),
            project.role_name().to_string(),
            project.instance_profile_name().to_string(),
            project.security_group_name().to_string(),
            project.default_policy_name(),
            project.custom_policy_name(),
        ] {
            prop_assert!(project.owns_name(&derived), "{} not owned", derived);
        }
    }

    /// Distinct accounts never share a project id.
    #[test]
    fn prop_accounts_are_separated(
        name in "[a-z]{1,10}",
        a in "[0-9]{12}",
        b in "[0-9]{12}",
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(project_id(&name, &a), project_id(&name, &b));
    }
}

// ============================================================================
// relay() property tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever the client sends arrives unchanged and in order.
    #[test]
    fn prop_relay_delivers_bytes_unchanged(
        payload in proptest::collection::vec(any::<u8>(), 0..CHUNK_SIZE * 4),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let received = runtime.block_on(async {
            let (mut local, mut local_peer) = duplex(CHUNK_SIZE);
            let (mut channel, mut remote) = duplex(CHUNK_SIZE);

            let task = tokio::spawn(async move { relay(&mut local_peer, &mut channel).await });
            let reader = tokio::spawn(async move {
                let mut received = Vec::new();
                remote.read_to_end(&mut received).await.unwrap();
                received
            });

            local.write_all(&payload).await.unwrap();
            drop(local);

            let received = reader.await.unwrap();
            let stats = task.await.unwrap().unwrap();
            assert_eq!(stats.to_remote, payload.len() as u64);
            received
        });
        prop_assert_eq!(received, payload);
    }
}
