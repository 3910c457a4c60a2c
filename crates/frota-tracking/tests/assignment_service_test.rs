//! Integration tests for the assignment service.

use std::sync::Arc;

use frota_core::error::{ErrorKind, FrotaError};
use frota_core::models::movement::{Movement, replay_current_site};
use frota_core::models::resource::{CreateResource, Resource, ResourceKind, UpdateResource};
use frota_core::models::site::{CreateSite, Site, SiteState, UpdateSite};
use frota_core::repository::{MovementLedger, ResourceRepository, SiteRepository};
use frota_db::repository::{SurrealMovementLedger, SurrealResourceRepository, SurrealSiteRepository};
use frota_tracking::service::{AssignInput, AssignmentService, ReturnInput};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Service = AssignmentService<
    SurrealResourceRepository<Db>,
    SurrealSiteRepository<Db>,
    SurrealMovementLedger<Db>,
>;

struct Fixture {
    service: Service,
    resources: SurrealResourceRepository<Db>,
    sites: SurrealSiteRepository<Db>,
    ledger: SurrealMovementLedger<Db>,
}

/// Spin up in-memory DB, run migrations, wire the service.
async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    frota_db::run_migrations(&db).await.unwrap();

    let resources = SurrealResourceRepository::new(db.clone());
    let sites = SurrealSiteRepository::new(db.clone());
    let ledger = SurrealMovementLedger::new(db);

    Fixture {
        service: AssignmentService::new(resources.clone(), sites.clone(), ledger.clone()),
        resources,
        sites,
        ledger,
    }
}

impl Fixture {
    async fn resource(&self, kind: ResourceKind, code: &str) -> Resource {
        self.resources
            .create(CreateResource {
                kind,
                code: code.into(),
                description: format!("{kind} {code}"),
                active: None,
                metadata: None,
            })
            .await
            .unwrap()
    }

    async fn site(&self, code: &str, state: SiteState) -> Site {
        self.sites
            .create(CreateSite {
                code: code.into(),
                name: format!("Obra {code}"),
                address: None,
                client: None,
                state: Some(state),
            })
            .await
            .unwrap()
    }

    async fn assert_pointer_matches_ledger(&self, resource_id: Uuid) {
        let history = self.ledger.history(resource_id).await.unwrap();
        let cached = self.resources.get_by_id(resource_id).await.unwrap();
        assert_eq!(cached.current_site_id, replay_current_site(&history));
    }
}

fn assign_input(resource: &Resource, site: &Site, by: &str) -> AssignInput {
    AssignInput {
        resource_id: resource.id,
        resource_kind: resource.kind,
        site_id: site.id,
        handed_over_by: by.into(),
        notes: None,
    }
}

fn return_input(resource: &Resource, by: &str) -> ReturnInput {
    ReturnInput {
        resource_id: resource.id,
        resource_kind: resource.kind,
        received_by: by.into(),
        notes: None,
    }
}

#[tokio::test]
async fn assign_then_return_round_trip() {
    let fx = setup().await;
    let v1 = fx.resource(ResourceKind::Vehicle, "V1").await;
    let s1 = fx.site("S1", SiteState::Active).await;

    let event = fx.service.assign(assign_input(&v1, &s1, "Ana")).await.unwrap();
    assert_eq!(event.sequence, 1);
    assert_eq!(
        event.movement,
        Movement::Assign {
            site_id: s1.id,
            handed_over_by: "Ana".into(),
        }
    );
    assert_eq!(fx.service.current_site(v1.id).await.unwrap(), Some(s1.id));

    let event = fx
        .service
        .return_resource(return_input(&v1, "Bruno"))
        .await
        .unwrap();
    assert_eq!(event.sequence, 2);
    assert_eq!(
        event.movement,
        Movement::Return {
            site_id: s1.id,
            received_by: "Bruno".into(),
        }
    );
    assert_eq!(fx.service.current_site(v1.id).await.unwrap(), None);

    let history = fx.service.history(v1.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].timestamp <= history[1].timestamp);
    fx.assert_pointer_matches_ledger(v1.id).await;
}

#[tokio::test]
async fn second_assign_is_rejected_and_pointer_stays() {
    let fx = setup().await;
    let v1 = fx.resource(ResourceKind::Vehicle, "V1").await;
    let s1 = fx.site("S1", SiteState::Active).await;
    let s2 = fx.site("S2", SiteState::Active).await;

    fx.service.assign(assign_input(&v1, &s1, "Ana")).await.unwrap();
    let err = fx
        .service
        .assign(assign_input(&v1, &s2, "Ana"))
        .await
        .unwrap_err();

    assert!(
        matches!(err, FrotaError::AlreadyAssigned { site_id, .. } if site_id == s1.id),
        "expected AlreadyAssigned, got: {err:?}"
    );
    assert_eq!(fx.service.current_site(v1.id).await.unwrap(), Some(s1.id));
    assert_eq!(fx.service.history(v1.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn double_return_is_rejected() {
    let fx = setup().await;
    let e1 = fx.resource(ResourceKind::Equipment, "E1").await;
    let s1 = fx.site("S1", SiteState::Active).await;

    fx.service.assign(assign_input(&e1, &s1, "Ana")).await.unwrap();
    fx.service
        .return_resource(return_input(&e1, ""))
        .await
        .unwrap();
    let err = fx
        .service
        .return_resource(return_input(&e1, ""))
        .await
        .unwrap_err();

    assert!(matches!(err, FrotaError::NotAssigned { .. }));
    assert_eq!(fx.service.history(e1.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn return_from_pool_is_rejected() {
    let fx = setup().await;
    let e1 = fx.resource(ResourceKind::Equipment, "E1").await;

    let err = fx
        .service
        .return_resource(return_input(&e1, "Bruno"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAssigned);
    assert!(fx.service.history(e1.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn inactive_resource_cannot_be_assigned_but_can_be_returned() {
    let fx = setup().await;
    let m1 = fx.resource(ResourceKind::Material, "M1").await;
    let s1 = fx.site("S1", SiteState::Active).await;

    let inactive = UpdateResource {
        active: Some(false),
        ..Default::default()
    };

    fx.resources.update(m1.id, inactive.clone()).await.unwrap();
    let err = fx
        .service
        .assign(assign_input(&m1, &s1, "Ana"))
        .await
        .unwrap_err();
    assert!(matches!(err, FrotaError::ResourceInactive { .. }));
    assert_eq!(fx.service.current_site(m1.id).await.unwrap(), None);

    fx.resources
        .update(
            m1.id,
            UpdateResource {
                active: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    fx.service.assign(assign_input(&m1, &s1, "Ana")).await.unwrap();
    fx.resources.update(m1.id, inactive).await.unwrap();

    fx.service
        .return_resource(return_input(&m1, "Bruno"))
        .await
        .unwrap();
    assert_eq!(fx.service.current_site(m1.id).await.unwrap(), None);
}

#[tokio::test]
async fn paused_and_completed_sites_refuse_assignments() {
    let fx = setup().await;
    let v1 = fx.resource(ResourceKind::Vehicle, "V1").await;

    for (code, state) in [("P1", SiteState::Paused), ("C1", SiteState::Completed)] {
        let site = fx.site(code, state).await;
        let err = fx
            .service
            .assign(assign_input(&v1, &site, "Ana"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, FrotaError::SiteNotEligible { state: s, .. } if s == state),
            "expected SiteNotEligible, got: {err:?}"
        );
    }

    assert_eq!(fx.service.current_site(v1.id).await.unwrap(), None);
    assert!(fx.service.history(v1.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn pausing_a_site_keeps_its_occupants() {
    let fx = setup().await;
    let v1 = fx.resource(ResourceKind::Vehicle, "V1").await;
    let s1 = fx.site("S1", SiteState::Active).await;

    fx.service.assign(assign_input(&v1, &s1, "Ana")).await.unwrap();
    fx.sites
        .update(
            s1.id,
            UpdateSite {
                state: Some(SiteState::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(fx.service.current_site(v1.id).await.unwrap(), Some(s1.id));
    let err = fx.sites.delete(s1.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Returning from a completed site is still allowed.
    fx.service
        .return_resource(return_input(&v1, "Bruno"))
        .await
        .unwrap();
    fx.sites.delete(s1.id).await.unwrap();
}

#[tokio::test]
async fn unknown_entities_and_kind_mismatch_are_not_found() {
    let fx = setup().await;
    let v1 = fx.resource(ResourceKind::Vehicle, "V1").await;
    let s1 = fx.site("S1", SiteState::Active).await;

    let mut input = assign_input(&v1, &s1, "Ana");
    input.site_id = Uuid::new_v4();
    let err = fx.service.assign(input).await.unwrap_err();
    assert!(matches!(err, FrotaError::NotFound { .. }));

    let mut input = assign_input(&v1, &s1, "Ana");
    input.resource_id = Uuid::new_v4();
    let err = fx.service.assign(input).await.unwrap_err();
    assert!(matches!(err, FrotaError::NotFound { .. }));

    let mut input = assign_input(&v1, &s1, "Ana");
    input.resource_kind = ResourceKind::Equipment;
    let err = fx.service.assign(input).await.unwrap_err();
    assert!(matches!(err, FrotaError::NotFound { .. }));

    let err = fx.service.history(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, FrotaError::NotFound { .. }));
}

#[tokio::test]
async fn blank_handover_is_recorded_as_empty() {
    let fx = setup().await;
    let v1 = fx.resource(ResourceKind::Vehicle, "V1").await;
    let s1 = fx.site("S1", SiteState::Active).await;

    let event = fx.service.assign(assign_input(&v1, &s1, "   ")).await.unwrap();
    assert_eq!(
        event.movement,
        Movement::Assign {
            site_id: s1.id,
            handed_over_by: String::new(),
        }
    );
    assert_eq!(fx.service.current_site(v1.id).await.unwrap(), Some(s1.id));
    fx.assert_pointer_matches_ledger(v1.id).await;
}

#[tokio::test]
async fn notes_are_trimmed_and_kept() {
    let fx = setup().await;
    let e1 = fx.resource(ResourceKind::Equipment, "E1").await;
    let s1 = fx.site("S1", SiteState::Active).await;

    let mut input = assign_input(&e1, &s1, " Ana ");
    input.notes = Some("  com carregador  ".into());
    let event = fx.service.assign(input).await.unwrap();
    assert_eq!(event.notes.as_deref(), Some("com carregador"));

    let mut input = return_input(&e1, "Bruno");
    input.notes = Some("   ".into());
    let event = fx.service.return_resource(input).await.unwrap();
    assert_eq!(event.notes, None);

    let history = fx.service.history(e1.id).await.unwrap();
    assert!(matches!(
        &history[0].movement,
        Movement::Assign { handed_over_by, .. } if handed_over_by == "Ana"
    ));
}

#[tokio::test]
async fn concurrent_assigns_admit_exactly_one() {
    let fx = setup().await;
    let v1 = fx.resource(ResourceKind::Vehicle, "V1").await;
    let mut targets = Vec::new();
    for i in 0..8 {
        targets.push(fx.site(&format!("S{i}"), SiteState::Active).await);
    }

    let service = Arc::new(fx.service);
    let handles: Vec<_> = targets
        .iter()
        .map(|site| {
            let service = Arc::clone(&service);
            let input = assign_input(&v1, site, "Ana");
            tokio::spawn(async move { service.assign(input).await })
        })
        .collect();

    let mut won = Vec::new();
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(event) => won.push(event),
            Err(FrotaError::AlreadyAssigned { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(won.len(), 1);
    assert_eq!(rejected, targets.len() - 1);

    let history = fx.ledger.history(v1.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(
        service.current_site(v1.id).await.unwrap(),
        Some(won[0].movement.site_id())
    );
}

#[tokio::test]
async fn ledger_never_has_two_assigns_in_a_row() {
    let fx = setup().await;
    let v1 = fx.resource(ResourceKind::Vehicle, "V1").await;
    let s1 = fx.site("S1", SiteState::Active).await;
    let s2 = fx.site("S2", SiteState::Active).await;

    fx.service.assign(assign_input(&v1, &s1, "Ana")).await.unwrap();
    let _ = fx.service.assign(assign_input(&v1, &s2, "Ana")).await;
    fx.service
        .return_resource(return_input(&v1, "Bruno"))
        .await
        .unwrap();
    let _ = fx.service.return_resource(return_input(&v1, "Bruno")).await;
    fx.service.assign(assign_input(&v1, &s2, "Ana")).await.unwrap();

    let history = fx.service.history(v1.id).await.unwrap();
    let sequences: Vec<u64> = history.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    for pair in history.windows(2) {
        assert_ne!(pair[0].movement.is_assign(), pair[1].movement.is_assign());
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
    fx.assert_pointer_matches_ledger(v1.id).await;
}

#[tokio::test]
async fn reconcile_repairs_tampered_pointer() {
    let fx = setup().await;
    let v1 = fx.resource(ResourceKind::Vehicle, "V1").await;
    let e1 = fx.resource(ResourceKind::Equipment, "E1").await;
    let s1 = fx.site("S1", SiteState::Active).await;

    fx.service.assign(assign_input(&v1, &s1, "Ana")).await.unwrap();

    // Corrupt both caches behind the service's back.
    fx.resources.set_assignment(v1.id, None).await.unwrap();
    fx.resources.set_assignment(e1.id, Some(s1.id)).await.unwrap();

    let verified = fx.service.verify_consistency().await.unwrap();
    assert_eq!(verified.checked, 2);
    assert_eq!(verified.drifts.len(), 2);
    assert!(!verified.repaired);
    assert_eq!(fx.service.current_site(v1.id).await.unwrap(), None);

    let drift = fx.service.reconcile(v1.id).await.unwrap().unwrap();
    assert_eq!(drift.cached, None);
    assert_eq!(drift.ledger, Some(s1.id));
    assert_eq!(fx.service.current_site(v1.id).await.unwrap(), Some(s1.id));

    let report = fx.service.reconcile_all().await.unwrap();
    assert_eq!(report.drifts.len(), 1);
    assert_eq!(report.drifts[0].resource_id, e1.id);

    let clean = fx.service.verify_consistency().await.unwrap();
    assert!(clean.is_consistent());
    fx.assert_pointer_matches_ledger(v1.id).await;
    fx.assert_pointer_matches_ledger(e1.id).await;
}

#[tokio::test]
async fn assign_trusts_ledger_over_stale_cache() {
    let fx = setup().await;
    let v1 = fx.resource(ResourceKind::Vehicle, "V1").await;
    let s1 = fx.site("S1", SiteState::Active).await;
    let s2 = fx.site("S2", SiteState::Active).await;

    fx.service.assign(assign_input(&v1, &s1, "Ana")).await.unwrap();
    fx.resources.set_assignment(v1.id, None).await.unwrap();

    let err = fx
        .service
        .assign(assign_input(&v1, &s2, "Ana"))
        .await
        .unwrap_err();
    assert!(matches!(err, FrotaError::AlreadyAssigned { site_id, .. } if site_id == s1.id));
}

#[tokio::test]
async fn assign_to_deleted_site_is_not_found() {
    let fx = setup().await;
    let v1 = fx.resource(ResourceKind::Vehicle, "V1").await;
    let s1 = fx.site("S1", SiteState::Active).await;

    fx.sites.delete(s1.id).await.unwrap();

    let err = fx
        .service
        .assign(assign_input(&v1, &s1, "Ana"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(fx.ledger.history(v1.id).await.unwrap().is_empty());
    assert_eq!(fx.service.current_site(v1.id).await.unwrap(), None);
}

#[tokio::test]
async fn assign_for_deleted_resource_is_not_found() {
    let fx = setup().await;
    let v1 = fx.resource(ResourceKind::Vehicle, "V1").await;
    let s1 = fx.site("S1", SiteState::Active).await;

    fx.resources.delete(v1.id).await.unwrap();

    let err = fx
        .service
        .assign(assign_input(&v1, &s1, "Ana"))
        .await
        .unwrap_err();
    assert!(matches!(err, FrotaError::NotFound { .. }), "got: {err:?}");
    assert!(fx.ledger.history(v1.id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn site_delete_racing_assigns_never_strands_a_resource() {
    let fx = setup().await;
    let mut fleet = Vec::new();
    for i in 0..4 {
        fleet.push(fx.resource(ResourceKind::Equipment, &format!("E{i}")).await);
    }
    let mut rounds = Vec::new();
    for round in 0..6 {
        rounds.push(fx.site(&format!("R{round}"), SiteState::Active).await);
    }

    let Fixture {
        service,
        resources,
        sites,
        ledger,
    } = fx;
    let service = Arc::new(service);

    for site in &rounds {
        let mut assigns = Vec::new();
        for resource in &fleet {
            let service = Arc::clone(&service);
            let input = assign_input(resource, site, "Ana");
            assigns.push(tokio::spawn(async move { service.assign(input).await }));
        }
        let delete = {
            let sites = sites.clone();
            let site_id = site.id;
            tokio::spawn(async move { sites.delete(site_id).await })
        };

        for handle in assigns {
            match handle.await.unwrap() {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound || e.is_retryable() => {}
                Err(other) => panic!("unexpected assign error: {other:?}"),
            }
        }
        match delete.await.unwrap() {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::Validation || e.is_retryable() => {}
            Err(other) => panic!("unexpected delete error: {other:?}"),
        }

        let site_exists = sites.get_by_id(site.id).await.is_ok();
        for resource in &fleet {
            let history = ledger.history(resource.id).await.unwrap();
            let cached = resources.get_by_id(resource.id).await.unwrap();
            assert_eq!(cached.current_site_id, replay_current_site(&history));
            if cached.current_site_id == Some(site.id) {
                assert!(site_exists, "{} points at deleted site", resource.code);
            }
        }

        // Empty the fleet for the next round.
        for resource in &fleet {
            if service.current_site(resource.id).await.unwrap().is_some() {
                service
                    .return_resource(return_input(resource, "Bruno"))
                    .await
                    .unwrap();
            }
        }
    }
}
