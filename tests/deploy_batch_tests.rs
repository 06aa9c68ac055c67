//! Deploy requests walking a kustomization tree

mod common;

use common::{deployment_descriptor, fast_policy, Call, FakeCluster, Fixture, StaticReleases};
use deploy_operator::api::{Action, DeployRequest, DeployResponse, ServerMode, ServiceResult};
use deploy_operator::controller::batch::Deployer;
use std::sync::Arc;

fn request(path: Option<&str>, recreate: bool) -> DeployRequest {
    DeployRequest {
        path: path.map(str::to_string),
        recreate,
        mode: ServerMode::Production,
    }
}

fn services(response: DeployResponse) -> Vec<ServiceResult> {
    match response {
        DeployResponse::Services(services) => services,
        DeployResponse::ErrorDescription(e) => panic!("unexpected batch error: {e}"),
    }
}

fn deployer(fixture: &Fixture, cluster: &Arc<FakeCluster>, max_services: usize) -> Deployer {
    let reconciler = fixture.reconciler(Arc::clone(cluster), StaticReleases::tag("v3.1.0"), fast_policy());
    Deployer::new(Arc::new(reconciler), fixture.root().to_path_buf(), max_services)
}

#[tokio::test]
async fn test_malformed_descriptor_does_not_abort_batch() {
    let fixture = Fixture::new();
    fixture.descriptor("a-billing", &deployment_descriptor("billing", "billing-api"));
    fixture.descriptor("b-payments", "ns: payments\nname: [unclosed\n");
    let cluster = FakeCluster::new();

    let results = services(deployer(&fixture, &cluster, 32).deploy(&request(None, false)).await);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].path, "a-billing");
    assert_eq!(results[0].action(), Some(Action::Created));
    assert_eq!(results[1].path, "b-payments");
    let description = results[1].error_description().unwrap();
    assert!(description.starts_with("can not parse `kustomization.yaml`"), "{description}");
}

#[tokio::test]
async fn test_results_follow_file_name_order() {
    let fixture = Fixture::new();
    fixture.descriptor("payments/api", &deployment_descriptor("payments", "payments-api"));
    fixture.descriptor("billing/worker", &deployment_descriptor("billing", "billing-worker"));
    fixture.descriptor("billing/api", &deployment_descriptor("billing", "billing-api"));
    fixture.file("billing/api/NOTES.txt", "not a descriptor");
    let cluster = FakeCluster::new();

    let results = services(deployer(&fixture, &cluster, 32).deploy(&request(None, false)).await);

    let paths: Vec<_> = results.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["billing/api", "billing/api", "billing/worker", "payments/api"]);
    assert_eq!(
        results[0].error_description(),
        Some("file with customization must be `kustomization.yaml`, actual: NOTES.txt")
    );
    assert!(results[1..].iter().all(|r| r.action() == Some(Action::Created)));
}

#[tokio::test]
async fn test_sub_path_limits_the_walk() {
    let fixture = Fixture::new();
    fixture.descriptor("billing/api", &deployment_descriptor("billing", "billing-api"));
    fixture.descriptor("payments/api", &deployment_descriptor("payments", "payments-api"));
    let cluster = FakeCluster::new();

    let results = services(
        deployer(&fixture, &cluster, 32)
            .deploy(&request(Some("payments"), false))
            .await,
    );

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].path, "payments/api");
}

#[tokio::test]
async fn test_limit_exceeded_fails_without_side_effects() {
    let fixture = Fixture::new();
    for i in 0..3 {
        fixture.descriptor(&format!("svc{i}"), &deployment_descriptor("apps", &format!("svc{i}")));
    }
    let cluster = FakeCluster::new();

    let response = deployer(&fixture, &cluster, 2).deploy(&request(None, false)).await;

    assert_eq!(
        response,
        DeployResponse::ErrorDescription(
            "Maximum number of services in one deployment call exceeded: 2".to_string()
        )
    );
    assert!(cluster.calls().is_empty());
}

#[tokio::test]
async fn test_limit_is_inclusive() {
    let fixture = Fixture::new();
    for i in 0..2 {
        fixture.descriptor(&format!("svc{i}"), &deployment_descriptor("apps", &format!("svc{i}")));
    }
    let cluster = FakeCluster::new();

    let results = services(deployer(&fixture, &cluster, 2).deploy(&request(None, false)).await);
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_invalid_and_missing_paths() {
    let fixture = Fixture::new();
    let cluster = FakeCluster::new();
    let deployer = deployer(&fixture, &cluster, 32);

    let escaping = deployer.deploy(&request(Some("../etc"), false)).await;
    assert!(matches!(escaping, DeployResponse::ErrorDescription(ref e) if e.contains("../etc")));

    let missing = deployer.deploy(&request(Some("nope"), false)).await;
    assert!(matches!(missing, DeployResponse::ErrorDescription(ref e) if e.starts_with("error walk dir")));
}

#[tokio::test]
async fn test_recreate_request_applies_to_every_descriptor() {
    let fixture = Fixture::new();
    fixture.descriptor("billing/api", &deployment_descriptor("billing", "billing-api"));
    let cluster = FakeCluster::new();
    cluster.insert(common::live_deployment("billing", "billing-api", "v3.0.0"));

    let results = services(deployer(&fixture, &cluster, 32).deploy(&request(None, true)).await);

    assert_eq!(results[0].action(), Some(Action::Recreated));
    assert!(matches!(cluster.mutations()[0], Call::Delete(..)));
}
