//! End-to-end lifecycle flows through the in-memory data service.

use std::sync::Arc;

use chrono::Utc;
use comanda_client::error::{FlowError, FlowStage};
use comanda_client::feed::ChangeFeed;
use comanda_client::hub::StoreHub;
use comanda_client::remote::{DataService, MemoryDataService};
use comanda_client::tables::FloorControl;
use serde_json::json;
use shared::models::{
    Order, OrderItem, OrderItemStatus, OrderStatus, SessionStatus, TableStatus,
};
use shared::Collection;
use tokio_util::sync::CancellationToken;

struct Fixture {
    service: Arc<MemoryDataService>,
    hub: Arc<StoreHub>,
    floor: FloorControl,
}

async fn fixture() -> Fixture {
    let service = Arc::new(MemoryDataService::new());
    service.seed(
        Collection::Zones,
        json!({"id": "z1", "name": "Terraza", "active": true}),
    );
    service.seed(
        Collection::Tables,
        json!({
            "id": "t1", "zone_id": "z1", "number": 1, "capacity": 4,
            "status": "free", "current_session_id": null, "qr_code": null
        }),
    );

    let hub = StoreHub::new();
    let feed = ChangeFeed::new(
        Arc::clone(&service) as Arc<dyn DataService>,
        Arc::clone(&hub),
        CancellationToken::new(),
    );
    feed.bootstrap().await.unwrap();

    let floor = FloorControl::new(
        Arc::clone(&service) as Arc<dyn DataService>,
        Arc::clone(&hub),
        "/client/menu".into(),
    );

    Fixture {
        service,
        hub,
        floor,
    }
}

fn order_for_session(id: &str, session_id: &str, status: OrderStatus) -> Order {
    let now = Utc::now();
    Order {
        id: id.into(),
        session_id: session_id.into(),
        status,
        created_at: now,
        updated_at: now,
        kitchen_started_at: None,
        kitchen_finished_at: None,
        items: vec![OrderItem {
            id: format!("{id}-i1"),
            order_id: id.into(),
            product_id: "p1".into(),
            product_name: "Paella".into(),
            quantity: 2,
            unit_price: 15.0,
            status: OrderItemStatus::Ready,
            created_at: Some(now),
            started_at: None,
            finished_at: None,
        }],
    }
}

async fn seed_order(fx: &Fixture, order: &Order) {
    fx.service
        .insert(Collection::Orders, serde_json::to_value(order).unwrap())
        .await
        .unwrap();
    fx.hub
        .orders
        .apply_optimistic(comanda_client::store::Mutation::Insert(order.clone()));
}

#[tokio::test]
async fn test_occupy_establishes_invariant() {
    let fx = fixture().await;

    let session = fx.floor.occupy("t1", 3, Some("ana")).await.unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.client_count, 3);

    let table = fx.hub.tables.get("t1").unwrap();
    assert_eq!(table.status, TableStatus::Occupied);
    assert_eq!(table.current_session_id.as_deref(), Some(session.id.as_str()));

    // status == occupied iff the referenced session is active
    let referenced = fx.hub.sessions.get(&session.id).unwrap();
    assert_eq!(referenced.status, SessionStatus::Active);
}

#[tokio::test]
async fn test_occupy_non_free_table_rejected_locally() {
    let fx = fixture().await;
    fx.floor.occupy("t1", 2, None).await.unwrap();

    let sessions_before = fx.hub.sessions.len();
    let err = fx.floor.occupy("t1", 2, None).await.unwrap_err();
    assert!(matches!(err, FlowError::Validation(_)));
    // rejected synchronously, no session was created
    assert_eq!(fx.hub.sessions.len(), sessions_before);
}

#[tokio::test]
async fn test_free_pays_orders_then_closes_session() {
    let fx = fixture().await;
    let session = fx.floor.occupy("t1", 2, None).await.unwrap();

    seed_order(&fx, &order_for_session("o1", &session.id, OrderStatus::Pending)).await;
    seed_order(&fx, &order_for_session("o2", &session.id, OrderStatus::InProgress)).await;
    seed_order(&fx, &order_for_session("o3", &session.id, OrderStatus::Cancelled)).await;

    fx.floor.free("t1", None).await.unwrap();

    // every non-cancelled order of the session is paid
    for id in ["o1", "o2"] {
        let order = fx.hub.orders.get(id).unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }
    assert_eq!(
        fx.hub.orders.get("o3").unwrap().status,
        OrderStatus::Cancelled
    );

    // the session closed exactly once, with an end time
    let closed = fx.hub.sessions.get(&session.id).unwrap();
    assert_eq!(closed.status, SessionStatus::Closed);
    assert!(closed.end_time.is_some());

    // the occupied⇔active-session invariant no longer holds for t1
    let table = fx.hub.tables.get("t1").unwrap();
    assert_eq!(table.status, TableStatus::Free);
    assert_eq!(table.current_session_id, None);
}

#[tokio::test]
async fn test_occupy_surfaces_orphaned_session() {
    let fx = fixture().await;
    fx.service.fail_next(Collection::Tables, "update");

    let err = fx.floor.occupy("t1", 2, None).await.unwrap_err();
    let FlowError::Interrupted { stage, .. } = err else {
        panic!("expected Interrupted, got {err:?}");
    };
    assert_eq!(stage, FlowStage::AttachSessionToTable);

    // the session exists and stays active; nothing silently retried
    let sessions = fx.hub.sessions.snapshot();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, SessionStatus::Active);
    // the table itself is untouched
    assert_eq!(fx.hub.tables.get("t1").unwrap().status, TableStatus::Free);
}

#[tokio::test]
async fn test_free_reports_session_close_failure_after_orders_paid() {
    let fx = fixture().await;
    let session = fx.floor.occupy("t1", 2, None).await.unwrap();
    seed_order(&fx, &order_for_session("o1", &session.id, OrderStatus::Pending)).await;

    fx.service.fail_next(Collection::TableSessions, "update");
    let err = fx.floor.free("t1", None).await.unwrap_err();
    let FlowError::Interrupted { stage, .. } = err else {
        panic!("expected Interrupted, got {err:?}");
    };
    assert_eq!(stage, FlowStage::CloseSession);

    // the order update committed before the failure; state is
    // recoverable, not masked
    assert_eq!(fx.hub.orders.get("o1").unwrap().status, OrderStatus::Paid);
    assert_eq!(
        fx.hub.sessions.get(&session.id).unwrap().status,
        SessionStatus::Active
    );
}

#[tokio::test]
async fn test_change_status_escape_hatch() {
    let fx = fixture().await;

    fx.floor
        .change_status("t1", TableStatus::Waiting)
        .await
        .unwrap();
    let table = fx.hub.tables.get("t1").unwrap();
    assert_eq!(table.status, TableStatus::Waiting);
    // session untouched: none was created
    assert!(fx.hub.sessions.is_empty());
}

#[tokio::test]
async fn test_echo_reconciliation_does_not_duplicate() {
    let fx = fixture().await;
    let shutdown = CancellationToken::new();
    let feed = ChangeFeed::new(
        Arc::clone(&fx.service) as Arc<dyn DataService>,
        Arc::clone(&fx.hub),
        shutdown.clone(),
    );
    let pumps = feed.spawn_pumps();

    let session = fx.floor.occupy("t1", 2, None).await.unwrap();

    // let every echo drain through the pumps
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    // optimistic write + feed echo merged into a single entity each
    assert_eq!(fx.hub.sessions.len(), 1);
    let table = fx.hub.tables.get("t1").unwrap();
    assert_eq!(table.status, TableStatus::Occupied);
    assert_eq!(table.current_session_id.as_deref(), Some(session.id.as_str()));

    fx.floor.free("t1", None).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    assert_eq!(fx.hub.sessions.len(), 1);
    assert_eq!(
        fx.hub.sessions.get(&session.id).unwrap().status,
        SessionStatus::Closed
    );
    assert_eq!(fx.hub.tables.get("t1").unwrap().status, TableStatus::Free);

    shutdown.cancel();
    for pump in pumps {
        pump.await.unwrap();
    }
}

#[tokio::test]
async fn test_create_table_stamps_qr_code() {
    let fx = fixture().await;

    let table = fx
        .floor
        .create_table(shared::models::TableCreate {
            zone_id: "z1".into(),
            number: 7,
            capacity: Some(6),
        })
        .await
        .unwrap();

    let qr = table.qr_code.expect("qr stamped");
    assert_eq!(qr, format!("/client/menu/{}", table.id));
    assert_eq!(fx.hub.tables.len(), 2);
}
