//! Integration tests for material stock movements.

use std::sync::Arc;

use frota_core::error::{ErrorKind, FrotaError};
use frota_core::models::resource::{CreateResource, Resource, ResourceKind};
use frota_core::models::site::{CreateSite, Site};
use frota_core::models::stock::StockDirection;
use frota_core::repository::{Pagination, ResourceRepository, SiteRepository};
use frota_db::repository::{
    SurrealMovementLedger, SurrealResourceRepository, SurrealSiteRepository, SurrealStockLedger,
};
use frota_tracking::service::{AssignInput, AssignmentService};
use frota_tracking::stock::{StockInput, StockService};
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Stock = StockService<
    SurrealResourceRepository<Db>,
    SurrealSiteRepository<Db>,
    SurrealStockLedger<Db>,
>;

struct Fixture {
    stock: Stock,
    assignments: AssignmentService<
        SurrealResourceRepository<Db>,
        SurrealSiteRepository<Db>,
        SurrealMovementLedger<Db>,
    >,
    resources: SurrealResourceRepository<Db>,
    sites: SurrealSiteRepository<Db>,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    frota_db::run_migrations(&db).await.unwrap();

    let resources = SurrealResourceRepository::new(db.clone());
    let sites = SurrealSiteRepository::new(db.clone());
    let assignments = AssignmentService::new(
        resources.clone(),
        sites.clone(),
        SurrealMovementLedger::new(db.clone()),
    );
    let stock = StockService::new(
        resources.clone(),
        sites.clone(),
        SurrealStockLedger::new(db),
        assignments.locks(),
    );

    Fixture {
        stock,
        assignments,
        resources,
        sites,
    }
}

impl Fixture {
    async fn material(&self, code: &str, stock_current: f64) -> Resource {
        self.resources
            .create(CreateResource {
                kind: ResourceKind::Material,
                code: code.into(),
                description: code.into(),
                active: None,
                metadata: Some(json!({ "stock_current": stock_current, "stock_minimum": 5 })),
            })
            .await
            .unwrap()
    }

    async fn site(&self, code: &str) -> Site {
        self.sites
            .create(CreateSite {
                code: code.into(),
                name: format!("Obra {code}"),
                address: None,
                client: None,
                state: None,
            })
            .await
            .unwrap()
    }

    async fn on_hand(&self, material_id: Uuid) -> f64 {
        self.resources
            .get_by_id(material_id)
            .await
            .unwrap()
            .stock_current()
    }
}

fn stock_input(material: &Resource, direction: StockDirection, quantity: f64) -> StockInput {
    StockInput {
        material_id: material.id,
        direction,
        quantity,
        site_id: None,
        supplier: String::new(),
        document: String::new(),
        responsible: "Carla".into(),
        notes: None,
    }
}

#[tokio::test]
async fn inbound_and_outbound_move_the_balance() {
    let fx = setup().await;
    let cement = fx.material("CIM-25", 10.0).await;
    let s1 = fx.site("OB-1").await;

    let mut delivery = stock_input(&cement, StockDirection::Inbound, 30.0);
    delivery.supplier = "  Cimpor ".into();
    delivery.document = "GR-118".into();
    let first = fx.stock.record(delivery).await.unwrap();
    assert_eq!(first.sequence, 1);
    assert_eq!(first.balance_after, 40.0);
    assert_eq!(first.supplier, "Cimpor");

    let mut dispatch = stock_input(&cement, StockDirection::Outbound, 12.5);
    dispatch.site_id = Some(s1.id);
    dispatch.notes = Some("   ".into());
    let second = fx.stock.record(dispatch).await.unwrap();
    assert_eq!(second.sequence, 2);
    assert_eq!(second.balance_after, 27.5);
    assert_eq!(second.notes, None);
    assert!(second.timestamp >= first.timestamp);

    assert_eq!(fx.on_hand(cement.id).await, 27.5);

    let history = fx.stock.history(cement.id).await.unwrap();
    assert_eq!(history.len(), 2);
    let log = fx.stock.site_log(s1.id, Pagination::default()).await.unwrap();
    assert_eq!(log.total, 1);
    assert_eq!(log.items[0].direction, StockDirection::Outbound);
}

#[tokio::test]
async fn outbound_beyond_stock_is_rejected_and_changes_nothing() {
    let fx = setup().await;
    let sand = fx.material("AREIA", 4.0).await;

    let err = fx
        .stock
        .record(stock_input(&sand, StockDirection::Outbound, 4.5))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            FrotaError::InsufficientStock { available, requested, .. }
                if available == 4.0 && requested == 4.5
        ),
        "got: {err:?}"
    );
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);

    assert_eq!(fx.on_hand(sand.id).await, 4.0);
    assert!(fx.stock.history(sand.id).await.unwrap().is_empty());

    let emptied = fx
        .stock
        .record(stock_input(&sand, StockDirection::Outbound, 4.0))
        .await
        .unwrap();
    assert_eq!(emptied.balance_after, 0.0);
}

#[tokio::test]
async fn quantity_must_be_positive() {
    let fx = setup().await;
    let sand = fx.material("AREIA", 4.0).await;

    for quantity in [0.0, -3.0, f64::NAN, f64::INFINITY] {
        let err = fx
            .stock
            .record(stock_input(&sand, StockDirection::Inbound, quantity))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "quantity {quantity}");
    }
    assert_eq!(fx.on_hand(sand.id).await, 4.0);
}

#[tokio::test]
async fn only_materials_and_known_sites_are_accepted() {
    let fx = setup().await;
    let cement = fx.material("CIM-25", 10.0).await;
    let truck = fx
        .resources
        .create(CreateResource {
            kind: ResourceKind::Vehicle,
            code: "12-AB-34".into(),
            description: "Camiao".into(),
            active: None,
            metadata: None,
        })
        .await
        .unwrap();

    let err = fx
        .stock
        .record(stock_input(&truck, StockDirection::Inbound, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, FrotaError::NotFound { ref entity, .. } if entity == "material"));

    let mut to_nowhere = stock_input(&cement, StockDirection::Outbound, 1.0);
    to_nowhere.site_id = Some(Uuid::new_v4());
    let err = fx.stock.record(to_nowhere).await.unwrap_err();
    assert!(matches!(err, FrotaError::NotFound { ref entity, .. } if entity == "site"));

    let err = fx.stock.history(truck.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(fx.on_hand(cement.id).await, 10.0);
}

#[tokio::test]
async fn concurrent_outbounds_never_overdraw() {
    let fx = setup().await;
    let gravel = fx.material("BRITA", 20.0).await;

    let stock = Arc::new(fx.stock);
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let stock = Arc::clone(&stock);
            let input = stock_input(&gravel, StockDirection::Outbound, 3.0);
            tokio::spawn(async move { stock.record(input).await })
        })
        .collect();

    let mut served = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => served += 1,
            Err(FrotaError::InsufficientStock { .. }) => refused += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(served, 6);
    assert_eq!(refused, 4);

    let on_hand = fx.resources.get_by_id(gravel.id).await.unwrap().stock_current();
    assert_eq!(on_hand, 2.0);
    let history = stock.history(gravel.id).await.unwrap();
    let sequences: Vec<u64> = history.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, (1..=6).collect::<Vec<u64>>());
}

#[tokio::test]
async fn stock_moves_while_material_is_assigned() {
    let fx = setup().await;
    let cement = fx.material("CIM-25", 10.0).await;
    let s1 = fx.site("OB-1").await;

    fx.assignments
        .assign(AssignInput {
            resource_id: cement.id,
            resource_kind: ResourceKind::Material,
            site_id: s1.id,
            handed_over_by: "Ana".into(),
            notes: None,
        })
        .await
        .unwrap();
    fx.stock
        .record(stock_input(&cement, StockDirection::Outbound, 3.0))
        .await
        .unwrap();

    let cached = fx.resources.get_by_id(cement.id).await.unwrap();
    assert_eq!(cached.current_site_id, Some(s1.id));
    assert_eq!(cached.stock_current(), 7.0);
    assert_eq!(cached.metadata["stock_minimum"], 5);
}
