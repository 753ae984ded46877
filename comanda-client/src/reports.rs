//! Aggregation Engine
//!
//! Pure, stateless fold functions over store snapshots plus a time
//! window. Controllers and UI bindings never recompute these inline;
//! [`ReportCache`] memoizes on store versions so unchanged snapshots
//! return the cached result.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use parking_lot::Mutex;
use shared::models::{CashShift, CashTransaction, Order, OrderStatus, TableSession, TransactionType};

use crate::hub::StoreHub;

/// Cash-shift expected-cash breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftSummary {
    pub base: f64,
    pub total_sales: f64,
    pub total_income: f64,
    pub total_expense: f64,
    /// base + sales + income − expense
    pub expected_total: f64,
}

/// Expected cash for a shift
///
/// Sales are the item subtotals of paid orders whose `updated_at` is at
/// or after the shift opening; transactions count only when they belong
/// to the shift.
pub fn shift_summary(
    shift: &CashShift,
    transactions: &[CashTransaction],
    orders: &[Order],
) -> ShiftSummary {
    let total_sales: f64 = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Paid && o.updated_at >= shift.opened_at)
        .map(|o| o.items.iter().map(|i| i.subtotal()).sum::<f64>())
        .sum();

    let (total_income, total_expense) = transactions
        .iter()
        .filter(|t| t.shift_id == shift.id)
        .fold((0.0, 0.0), |(income, expense), t| match t.tx_type {
            TransactionType::Income => (income + t.amount, expense),
            TransactionType::Expense => (income, expense + t.amount),
        });

    ShiftSummary {
        base: shift.base_amount,
        total_sales,
        total_income,
        total_expense,
        expected_total: shift.base_amount + total_sales + total_income - total_expense,
    }
}

/// Closed time window, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    /// Calendar month containing `now`
    pub fn month_of(now: DateTime<Utc>) -> Self {
        let start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);
        let (next_year, next_month) = if now.month() == 12 {
            (now.year() + 1, 1)
        } else {
            (now.year(), now.month() + 1)
        };
        let end = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()
            .map(|next| next - Duration::seconds(1))
            .unwrap_or(now);
        Self { start, end }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

/// One row of the top-products ranking
#[derive(Debug, Clone, PartialEq)]
pub struct TopProduct {
    pub name: String,
    pub quantity: i32,
    pub revenue: f64,
}

/// Monthly operational and financial rollup
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyReport {
    // Sales
    pub total_sales: f64,
    pub order_count: usize,
    pub average_ticket: f64,

    // Financial
    pub total_expenses: f64,
    pub net_profit: f64,
    pub profit_margin: f64,

    // Operational
    pub customer_count: i32,
    pub items_sold: i32,
    pub avg_items_per_order: f64,
    pub table_turnover_rate: f64,

    // Efficiency (minutes)
    pub avg_prep_minutes: f64,
    pub avg_attention_minutes: f64,

    // Analytics
    pub top_products: Vec<TopProduct>,
    pub peak_hours: [u32; 24],
}

/// Fold paid orders, closed sessions and transactions into the monthly
/// report
///
/// Orders enter by `updated_at` (payment time), sessions by `end_time`,
/// transactions by `created_at`.
pub fn monthly_report(
    orders: &[Order],
    sessions: &[TableSession],
    transactions: &[CashTransaction],
    window: ReportWindow,
) -> MonthlyReport {
    let paid: Vec<&Order> = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Paid && window.contains(o.updated_at))
        .collect();

    let mut total_sales = 0.0;
    let mut items_sold = 0;
    let mut peak_hours = [0u32; 24];
    // stable encounter order for the quantity tie-break
    let mut product_order: Vec<String> = Vec::new();
    let mut product_totals: HashMap<String, (i32, f64)> = HashMap::new();
    let mut prep_durations: Vec<Duration> = Vec::new();

    for order in &paid {
        for item in &order.items {
            let subtotal = item.subtotal();
            total_sales += subtotal;
            items_sold += item.quantity;

            let entry = product_totals.entry(item.product_name.clone()).or_insert_with(|| {
                product_order.push(item.product_name.clone());
                (0, 0.0)
            });
            entry.0 += item.quantity;
            entry.1 += subtotal;

            // item prep time: finished − (started ?? item created ?? order created)
            if let Some(finished) = item.finished_at {
                let started = item
                    .started_at
                    .or(item.created_at)
                    .unwrap_or(order.created_at);
                let duration = finished.signed_duration_since(started);
                if duration > Duration::zero() {
                    prep_durations.push(duration);
                }
            }
        }

        peak_hours[order.created_at.hour() as usize] += 1;
    }

    // order-level kitchen timestamps only when zero items qualified
    if prep_durations.is_empty() {
        for order in &paid {
            if let (Some(started), Some(finished)) =
                (order.kitchen_started_at, order.kitchen_finished_at)
            {
                let duration = finished.signed_duration_since(started);
                if duration > Duration::zero() {
                    prep_durations.push(duration);
                }
            }
        }
    }

    let order_count = paid.len();
    let average_ticket = if order_count > 0 {
        total_sales / order_count as f64
    } else {
        0.0
    };
    let avg_items_per_order = if order_count > 0 {
        items_sold as f64 / order_count as f64
    } else {
        0.0
    };

    let mut top_products: Vec<TopProduct> = product_order
        .into_iter()
        .map(|name| {
            let (quantity, revenue) = product_totals[&name];
            TopProduct {
                name,
                quantity,
                revenue,
            }
        })
        .collect();
    // stable sort: ties keep encounter order
    top_products.sort_by(|a, b| b.quantity.cmp(&a.quantity));
    top_products.truncate(5);

    let closed: Vec<&TableSession> = sessions
        .iter()
        .filter(|s| {
            s.status == shared::models::SessionStatus::Closed
                && s.end_time.is_some_and(|end| window.contains(end))
        })
        .collect();

    let customer_count: i32 = closed.iter().map(|s| s.client_count).sum();

    let attention_durations: Vec<Duration> = closed
        .iter()
        .filter_map(|s| {
            let duration = s.end_time?.signed_duration_since(s.start_time);
            (duration > Duration::zero()).then_some(duration)
        })
        .collect();

    let distinct_tables: HashSet<&str> = closed.iter().map(|s| s.table_id.as_str()).collect();
    let table_turnover_rate = if distinct_tables.is_empty() {
        0.0
    } else {
        closed.len() as f64 / distinct_tables.len() as f64
    };

    let total_expenses: f64 = transactions
        .iter()
        .filter(|t| t.tx_type == TransactionType::Expense && window.contains(t.created_at))
        .map(|t| t.amount)
        .sum();

    let net_profit = total_sales - total_expenses;
    let profit_margin = if total_sales > 0.0 {
        (net_profit / total_sales) * 100.0
    } else {
        0.0
    };

    MonthlyReport {
        total_sales,
        order_count,
        average_ticket,
        total_expenses,
        net_profit,
        profit_margin,
        customer_count,
        items_sold,
        avg_items_per_order,
        table_turnover_rate,
        avg_prep_minutes: mean_minutes(&prep_durations),
        avg_attention_minutes: mean_minutes(&attention_durations),
        top_products,
        peak_hours,
    }
}

fn mean_minutes(durations: &[Duration]) -> f64 {
    if durations.is_empty() {
        return 0.0;
    }
    let total_ms: i64 = durations.iter().map(|d| d.num_milliseconds()).sum();
    (total_ms as f64 / durations.len() as f64) / 60_000.0
}

/// Version-keyed monthly report cache
///
/// Recomputes only when one of the contributing stores mutated or the
/// window moved; otherwise returns the cached report.
pub struct ReportCache {
    state: Mutex<Option<CacheState>>,
}

struct CacheState {
    versions: (u64, u64, u64),
    window: ReportWindow,
    report: MonthlyReport,
}

impl ReportCache {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    pub fn monthly(&self, hub: &StoreHub, window: ReportWindow) -> MonthlyReport {
        let versions = (
            hub.orders.version(),
            hub.sessions.version(),
            hub.transactions.version(),
        );

        let mut state = self.state.lock();
        if let Some(cached) = state.as_ref()
            && cached.versions == versions
            && cached.window == window
        {
            return cached.report.clone();
        }

        let report = monthly_report(
            &hub.orders.snapshot(),
            &hub.sessions.snapshot(),
            &hub.transactions.snapshot(),
            window,
        );
        *state = Some(CacheState {
            versions,
            window,
            report: report.clone(),
        });
        report
    }
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new()
    }
}
