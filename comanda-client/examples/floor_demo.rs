//! Floor demo: occupy a table, watch the kitchen ranking, settle and
//! report, all against the in-memory data service.
//!
//! Run with: cargo run --example floor_demo

use std::sync::Arc;

use chrono::Utc;
use comanda_client::cash::CashDesk;
use comanda_client::feed::ChangeFeed;
use comanda_client::hub::StoreHub;
use comanda_client::kitchen::{rank_orders, StationIndex, StationScope};
use comanda_client::remote::{DataService, MemoryDataService};
use comanda_client::reports::{monthly_report, ReportWindow};
use comanda_client::tables::FloorControl;
use comanda_client::{logger, SyncConfig};
use serde_json::json;
use shared::models::TransactionType;
use shared::Collection;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();
    let config = SyncConfig::from_env();

    let service = Arc::new(MemoryDataService::new());
    service.seed(
        Collection::Zones,
        json!({"id": "z1", "name": "Salón Principal", "active": true}),
    );
    service.seed(
        Collection::Tables,
        json!({"id": "t1", "zone_id": "z1", "number": 1, "capacity": 4,
               "status": "free", "current_session_id": null, "qr_code": null}),
    );

    let hub = StoreHub::new();
    let shutdown = CancellationToken::new();
    let feed = ChangeFeed::new(
        Arc::clone(&service) as Arc<dyn DataService>,
        Arc::clone(&hub),
        shutdown.clone(),
    );
    feed.bootstrap().await?;
    let pumps = feed.spawn_pumps();

    let floor = FloorControl::new(
        Arc::clone(&service) as Arc<dyn DataService>,
        Arc::clone(&hub),
        config.menu_base_url.clone(),
    );
    let desk = CashDesk::new(
        Arc::clone(&service) as Arc<dyn DataService>,
        Arc::clone(&hub),
    );

    let shift = desk.open_shift(100.0, "ana").await?;
    let session = floor.occupy("t1", 2, Some("ana")).await?;
    tracing::info!(session = %session.id, "party seated");

    // an order arrives from another terminal through the change feed
    service
        .insert(
            Collection::Orders,
            json!({
                "id": "o1", "session_id": session.id, "status": "pending",
                "created_at": Utc::now(), "updated_at": Utc::now(),
                "kitchen_started_at": null, "kitchen_finished_at": null,
                "items": [{
                    "id": "o1-i1", "order_id": "o1", "product_id": "p1",
                    "product_name": "Paella", "quantity": 2, "unit_price": 15.0,
                    "status": "pending", "created_at": Utc::now(),
                    "started_at": null, "finished_at": null
                }]
            }),
        )
        .await?;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let index = StationIndex::build(&hub.products.snapshot(), &hub.categories.snapshot());
    let ranked = rank_orders(
        &hub.orders.snapshot(),
        &index,
        &StationScope::All,
        &config.kitchen,
        Utc::now(),
    );
    tracing::info!(tickets = ranked.len(), "kitchen queue");

    desk.add_transaction(&shift.id, TransactionType::Income, 20.0, "tips", "ana")
        .await?;
    floor.free("t1", None).await?;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let summary = desk.summary(&hub.shifts.get(&shift.id).unwrap());
    tracing::info!(expected = summary.expected_total, "drawer expected");

    let report = monthly_report(
        &hub.orders.snapshot(),
        &hub.sessions.snapshot(),
        &hub.transactions.snapshot(),
        ReportWindow::month_of(Utc::now()),
    );
    tracing::info!(
        sales = report.total_sales,
        orders = report.order_count,
        "monthly rollup"
    );

    shutdown.cancel();
    for pump in pumps {
        pump.await?;
    }
    Ok(())
}
