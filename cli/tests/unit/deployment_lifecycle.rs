//! Deploy, run, status, stop and undeploy against the in-memory account.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use base64::Engine as _;
use bokchoi_cli::application::services::deployment::{
    DeployRequest, DeploymentState, Orchestrator, RunRequest, UploadOutcome,
};
use bokchoi_cli::domain::{
    Entrypoint, ExecutionMode, IngressRule, InstanceState, LaunchSpecification, Project,
    SpotRequestState,
};

use crate::mocks::{FakeCloud, RecordingReporter, artifact, launch_spec};

const CALLER_IP: &str = "198.51.100.7";

fn demo() -> Project {
    Project::new("demo", "123").unwrap()
}

async fn deploy(cloud: &FakeCloud, project: &Project, fingerprint: &str) -> UploadOutcome {
    let reporter = RecordingReporter::default();
    let package = artifact(fingerprint);
    Orchestrator::new(cloud, &reporter, project)
        .deploy(&DeployRequest {
            package: &package,
            subnet_id: "subnet-0001",
            custom_policy: None,
            ssh_source_ip: CALLER_IP,
        })
        .await
        .unwrap()
}

async fn run(cloud: &FakeCloud, project: &Project, spec: &LaunchSpecification) -> Vec<String> {
    let reporter = RecordingReporter::default();
    let entrypoint = Entrypoint::Script("app.py".to_string());
    Orchestrator::new(cloud, &reporter, project)
        .run(&RunRequest {
            launch: spec,
            spot_price: "0.05",
            entrypoint: Some(&entrypoint),
            notebook_mode: false,
            shutdown_on_exit: true,
            public_key: None,
        })
        .await
        .unwrap()
        .instance_ids
}

// ── deploy ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deploy_twice_converges_to_the_same_resources() {
    let cloud = FakeCloud::new("123");
    let project = demo();

    assert_eq!(deploy(&cloud, &project, "aaa").await, UploadOutcome::Uploaded);
    let first = cloud.owned_by(project.id());
    assert_eq!(deploy(&cloud, &project, "aaa").await, UploadOutcome::Unchanged);
    let second = cloud.owned_by(project.id());

    assert_eq!(first, second);
    cloud.with(|a| {
        assert_eq!(a.uploads, 1);
        assert_eq!(a.buckets.len(), 1);
        assert_eq!(a.policies.len(), 1);
        assert_eq!(a.roles.len(), 1);
        assert_eq!(a.profiles.len(), 1);
        assert_eq!(a.groups.len(), 1);
        assert_eq!(a.log_groups.len(), 1);
    });
}

#[tokio::test]
async fn changed_package_is_uploaded_again() {
    let cloud = FakeCloud::new("123");
    let project = demo();

    deploy(&cloud, &project, "aaa").await;
    assert_eq!(deploy(&cloud, &project, "bbb").await, UploadOutcome::Uploaded);

    cloud.with(|a| {
        assert_eq!(a.uploads, 2);
        assert_eq!(a.buckets["demo-123"]["bokchoi-demo.zip"], "bbb");
    });
}

#[tokio::test]
async fn deploy_names_everything_after_the_project() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    deploy(&cloud, &project, "aaa").await;

    cloud.with(|a| {
        assert!(a.buckets.contains_key("demo-123"));
        assert!(a.policies.contains_key("demo-123-default-policy"));
        assert_eq!(
            a.roles["demo-123"],
            vec!["arn:aws:iam::123:policy/demo-123-default-policy".to_string()]
        );
        assert_eq!(a.profiles["demo-123"], vec!["demo-123".to_string()]);
        assert_eq!(a.groups[0].name, "demo-123");
        assert_eq!(a.tags[&a.groups[0].id], "demo-123");
    });
}

#[tokio::test]
async fn security_group_admits_only_the_caller() {
    let cloud = FakeCloud::new("123");
    deploy(&cloud, &demo(), "aaa").await;

    cloud.with(|a| {
        assert_eq!(a.groups[0].ingress, vec![IngressRule::ssh_from(CALLER_IP)]);
        assert_eq!(a.groups[0].ingress[0].cidr, "198.51.100.7/32");
    });
}

#[tokio::test]
async fn existing_security_group_is_not_authorized_twice() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    deploy(&cloud, &project, "aaa").await;
    deploy(&cloud, &project, "aaa").await;

    cloud.with(|a| assert_eq!(a.groups[0].ingress.len(), 1));
}

#[tokio::test]
async fn deploy_restores_ssh_access_after_a_failed_authorization() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    let reporter = RecordingReporter::default();
    let package = artifact("aaa");
    cloud.fail_once("authorize_ingress");

    let first = Orchestrator::new(&cloud, &reporter, &project)
        .deploy(&DeployRequest {
            package: &package,
            subnet_id: "subnet-0001",
            custom_policy: None,
            ssh_source_ip: CALLER_IP,
        })
        .await;
    assert!(format!("{:#}", first.unwrap_err()).contains("authorizing SSH"));
    cloud.with(|a| {
        assert_eq!(a.tags[&a.groups[0].id], "demo-123");
        assert!(a.groups[0].ingress.is_empty());
    });

    deploy(&cloud, &project, "aaa").await;

    cloud.with(|a| {
        assert_eq!(a.groups.len(), 1);
        assert_eq!(a.groups[0].ingress, vec![IngressRule::ssh_from(CALLER_IP)]);
    });
}

#[tokio::test]
async fn custom_policy_is_attached_next_to_the_default_one() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    let reporter = RecordingReporter::default();
    let package = artifact("aaa");
    Orchestrator::new(&cloud, &reporter, &project)
        .deploy(&DeployRequest {
            package: &package,
            subnet_id: "subnet-0001",
            custom_policy: Some(r#"{"Version":"2012-10-17","Statement":[]}"#),
            ssh_source_ip: CALLER_IP,
        })
        .await
        .unwrap();

    cloud.with(|a| {
        assert!(a.policies.contains_key("demo-123-custom-policy"));
        assert_eq!(a.roles["demo-123"].len(), 2);
    });
}

#[tokio::test]
async fn unknown_subnet_fails_the_deploy() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    let reporter = RecordingReporter::default();
    let package = artifact("aaa");
    let result = Orchestrator::new(&cloud, &reporter, &project)
        .deploy(&DeployRequest {
            package: &package,
            subnet_id: "subnet-missing",
            custom_policy: None,
            ssh_source_ip: CALLER_IP,
        })
        .await;

    assert!(format!("{:#}", result.unwrap_err()).contains("subnet-missing"));
}

// ── run ───────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn run_tags_request_and_instance_with_the_project() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    deploy(&cloud, &project, "aaa").await;
    let instances = run(&cloud, &project, &launch_spec()).await;

    assert_eq!(instances.len(), 1);
    cloud.with(|a| {
        let request = &a.spot_requests[0];
        assert_eq!(a.tags[&request.id], "demo-123");
        assert_eq!(a.tags[&instances[0]], "demo-123");
        assert_eq!(request.price, "0.05");
        assert_eq!(request.spec.iam_instance_profile.as_deref(), Some("demo-123"));
    });
}

#[tokio::test]
async fn run_ships_the_bootstrap_script_as_user_data() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    deploy(&cloud, &project, "aaa").await;
    run(&cloud, &project, &launch_spec()).await;

    let user_data = cloud.with(|a| a.spot_requests[0].spec.user_data.clone().unwrap());
    let script = String::from_utf8(
        base64::engine::general_purpose::STANDARD
            .decode(user_data)
            .unwrap(),
    )
    .unwrap();
    assert!(script.contains("demo-123"));
    assert!(script.contains("bokchoi-demo.zip"));
    assert!(script.contains("app.py"));
}

#[tokio::test]
async fn notebook_run_joins_the_project_security_group() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    deploy(&cloud, &project, "aaa").await;

    let reporter = RecordingReporter::default();
    let key = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIFake bokchoi-demo-123";
    Orchestrator::new(&cloud, &reporter, &project)
        .run(&RunRequest {
            launch: &launch_spec(),
            spot_price: "0.05",
            entrypoint: None,
            notebook_mode: true,
            shutdown_on_exit: false,
            public_key: Some(key),
        })
        .await
        .unwrap();

    cloud.with(|a| {
        let group_id = a.groups[0].id.clone();
        let spec = &a.spot_requests[0].spec;
        assert_eq!(spec.security_group_ids, vec![group_id]);
        let script = String::from_utf8(
            base64::engine::general_purpose::STANDARD
                .decode(spec.user_data.as_deref().unwrap())
                .unwrap(),
        )
        .unwrap();
        assert!(script.contains(key));
    });
}

#[tokio::test]
async fn notebook_run_before_deploy_is_refused() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    let reporter = RecordingReporter::default();
    let result = Orchestrator::new(&cloud, &reporter, &project)
        .run(&RunRequest {
            launch: &launch_spec(),
            spot_price: "0.05",
            entrypoint: None,
            notebook_mode: true,
            shutdown_on_exit: false,
            public_key: None,
        })
        .await;

    assert!(result.unwrap_err().to_string().contains("bokchoi deploy"));
    assert!(cloud.with(|a| a.spot_requests.is_empty()));
}

#[tokio::test]
async fn request_left_by_a_failed_wait_is_cancelled_by_stop() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    deploy(&cloud, &project, "aaa").await;
    cloud.fail_once("wait_spot_fulfilled");

    let reporter = RecordingReporter::default();
    let orchestrator = Orchestrator::new(&cloud, &reporter, &project);
    let entrypoint = Entrypoint::Script("app.py".to_string());
    let result = orchestrator
        .run(&RunRequest {
            launch: &launch_spec(),
            spot_price: "0.05",
            entrypoint: Some(&entrypoint),
            notebook_mode: false,
            shutdown_on_exit: true,
            public_key: None,
        })
        .await;
    assert!(format!("{:#}", result.unwrap_err()).contains("bokchoi stop"));
    let request_id = cloud.with(|a| a.spot_requests[0].id.clone());
    let pending = cloud.owned_by(project.id());
    assert!(pending.contains(&format!("spot request {request_id}")), "{pending:?}");

    let report = orchestrator.stop(ExecutionMode::Apply).await.unwrap();

    assert_eq!(report.cancelled, vec![request_id]);
    cloud.with(|a| assert_eq!(a.spot_requests[0].state, SpotRequestState::Cancelled));
}

// ── status / observe ──────────────────────────────────────────────────────────

#[tokio::test]
async fn status_only_lists_instances_tagged_with_the_project() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    let other = Project::new("other", "123").unwrap();
    deploy(&cloud, &project, "aaa").await;
    deploy(&cloud, &other, "aaa").await;
    let mine = run(&cloud, &project, &launch_spec()).await;
    run(&cloud, &other, &launch_spec()).await;

    let reporter = RecordingReporter::default();
    let listed = Orchestrator::new(&cloud, &reporter, &project)
        .status()
        .await
        .unwrap();

    assert_eq!(listed.iter().map(|i| i.id.clone()).collect::<Vec<_>>(), mine);
}

#[tokio::test]
async fn observed_state_follows_the_lifecycle() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    let reporter = RecordingReporter::default();
    let orchestrator = Orchestrator::new(&cloud, &reporter, &project);

    assert_eq!(orchestrator.observe().await.unwrap(), DeploymentState::Undeployed);
    deploy(&cloud, &project, "aaa").await;
    assert_eq!(orchestrator.observe().await.unwrap(), DeploymentState::Deployed);
    let ids = run(&cloud, &project, &launch_spec()).await;
    assert_eq!(orchestrator.observe().await.unwrap(), DeploymentState::Running);
    cloud.set_instance_state(&ids[0], InstanceState::Stopped);
    assert_eq!(orchestrator.observe().await.unwrap(), DeploymentState::Stopped);
}

#[tokio::test]
async fn missing_bucket_means_undeployed_even_with_stopped_instances() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    deploy(&cloud, &project, "aaa").await;
    let ids = run(&cloud, &project, &launch_spec()).await;
    cloud.set_instance_state(&ids[0], InstanceState::Stopped);
    cloud.with(|a| a.buckets.clear());

    let reporter = RecordingReporter::default();
    let state = Orchestrator::new(&cloud, &reporter, &project)
        .observe()
        .await
        .unwrap();

    assert_eq!(state, DeploymentState::Undeployed);
}

// ── stop / undeploy ───────────────────────────────────────────────────────────

#[tokio::test]
async fn stop_cancels_requests_and_terminates_instances() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    deploy(&cloud, &project, "aaa").await;
    let ids = run(&cloud, &project, &launch_spec()).await;

    let reporter = RecordingReporter::default();
    let report = Orchestrator::new(&cloud, &reporter, &project)
        .stop(ExecutionMode::Apply)
        .await
        .unwrap();

    assert_eq!(report.terminated, ids);
    assert_eq!(report.cancelled.len(), 1);
    cloud.with(|a| assert_eq!(a.instances[0].state, InstanceState::Terminated));
}

#[tokio::test]
async fn stop_with_nothing_running_succeeds() {
    let cloud = FakeCloud::new("123");
    let reporter = RecordingReporter::default();
    let report = Orchestrator::new(&cloud, &reporter, &demo())
        .stop(ExecutionMode::Apply)
        .await
        .unwrap();

    assert!(report.cancelled.is_empty());
    assert!(report.terminated.is_empty());
    assert_eq!(cloud.mutation_count(), 0);
}

#[tokio::test]
async fn deploy_then_undeploy_leaves_nothing_behind() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    deploy(&cloud, &project, "aaa").await;
    run(&cloud, &project, &launch_spec()).await;
    assert!(!cloud.owned_by(project.id()).is_empty());

    let reporter = RecordingReporter::default();
    let report = Orchestrator::new(&cloud, &reporter, &project)
        .undeploy(ExecutionMode::Apply)
        .await
        .unwrap();

    assert!(cloud.owned_by(project.id()).is_empty(), "{:?}", cloud.owned_by(project.id()));
    assert!(report.bucket_deleted);
    assert!(report.log_group_deleted);
    assert_eq!(report.identity.roles, vec!["demo-123".to_string()]);
}

#[tokio::test]
async fn undeploy_is_repeatable() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    deploy(&cloud, &project, "aaa").await;

    let reporter = RecordingReporter::default();
    let orchestrator = Orchestrator::new(&cloud, &reporter, &project);
    orchestrator.undeploy(ExecutionMode::Apply).await.unwrap();
    let again = orchestrator.undeploy(ExecutionMode::Apply).await.unwrap();

    assert!(!again.bucket_deleted);
    assert!(!again.log_group_deleted);
    assert!(again.security_groups.is_empty());
}

#[tokio::test]
async fn dry_run_undeploy_changes_nothing() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    deploy(&cloud, &project, "aaa").await;
    run(&cloud, &project, &launch_spec()).await;
    let before = cloud.mutation_count();
    let owned = cloud.owned_by(project.id());

    let reporter = RecordingReporter::default();
    let report = Orchestrator::new(&cloud, &reporter, &project)
        .undeploy(ExecutionMode::DryRun)
        .await
        .unwrap();

    assert_eq!(cloud.mutation_count(), before);
    assert_eq!(cloud.owned_by(project.id()), owned);
    assert_eq!(report.stop.terminated.len(), 1);
    assert_eq!(report.security_groups.len(), 1);
    assert!(
        reporter
            .warnings()
            .iter()
            .all(|w| w.starts_with("dry run: would "))
    );
}

#[tokio::test]
async fn undeploy_spares_other_projects() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    let other = Project::new("other", "123").unwrap();
    deploy(&cloud, &project, "aaa").await;
    deploy(&cloud, &other, "aaa").await;
    run(&cloud, &other, &launch_spec()).await;
    let others = cloud.owned_by(other.id());

    let reporter = RecordingReporter::default();
    Orchestrator::new(&cloud, &reporter, &project)
        .undeploy(ExecutionMode::Apply)
        .await
        .unwrap();

    assert_eq!(cloud.owned_by(other.id()), others);
}

#[tokio::test]
async fn undeploy_spares_projects_sharing_a_name_suffix() {
    let cloud = FakeCloud::new("123");
    let a = Project::new("a", "123").unwrap();
    let ba = Project::new("ba", "123").unwrap();
    deploy(&cloud, &a, "aaa").await;
    deploy(&cloud, &ba, "aaa").await;
    let kept = cloud.owned_by(ba.id());

    let reporter = RecordingReporter::default();
    let report = Orchestrator::new(&cloud, &reporter, &a)
        .undeploy(ExecutionMode::Apply)
        .await
        .unwrap();

    assert_eq!(report.identity.policies, vec!["a-123-default-policy".to_string()]);
    assert_eq!(report.identity.instance_profiles, vec!["a-123".to_string()]);
    assert_eq!(report.identity.roles, vec!["a-123".to_string()]);
    assert!(cloud.owned_by(a.id()).is_empty());
    assert_eq!(cloud.owned_by(ba.id()), kept);
    cloud.with(|acc| {
        assert!(acc.policies.contains_key("ba-123-default-policy"));
        assert!(acc.roles.contains_key("ba-123"));
        assert!(acc.profiles.contains_key("ba-123"));
    });
}

// ── end to end ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn demo_project_full_lifecycle() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    assert_eq!(project.id(), "demo-123");
    let reporter = RecordingReporter::default();
    let orchestrator = Orchestrator::new(&cloud, &reporter, &project);

    deploy(&cloud, &project, "aaa").await;
    cloud.with(|a| {
        assert!(a.buckets["demo-123"].contains_key("bokchoi-demo.zip"));
        assert_eq!(a.groups[0].ingress, vec![IngressRule::ssh_from(CALLER_IP)]);
    });

    let ids = run(&cloud, &project, &launch_spec()).await;
    let listed = orchestrator.status().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].state, InstanceState::Pending);

    cloud.set_instance_state(&ids[0], InstanceState::Running);
    let listed = orchestrator.status().await.unwrap();
    assert_eq!(listed[0].state, InstanceState::Running);
    assert_eq!(orchestrator.connect_target().await.unwrap(), "203.0.113.10");

    orchestrator.stop(ExecutionMode::Apply).await.unwrap();
    assert!(orchestrator.status().await.unwrap().is_empty());

    orchestrator.undeploy(ExecutionMode::Apply).await.unwrap();
    assert!(cloud.owned_by("demo-123").is_empty());
    assert_eq!(orchestrator.observe().await.unwrap(), DeploymentState::Undeployed);
}

#[tokio::test]
async fn connect_without_a_running_instance_points_at_run() {
    let cloud = FakeCloud::new("123");
    let project = demo();
    deploy(&cloud, &project, "aaa").await;
    run(&cloud, &project, &launch_spec()).await;

    let reporter = RecordingReporter::default();
    let err = Orchestrator::new(&cloud, &reporter, &project)
        .connect_target()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("bokchoi run"));
}
