//! Dashboard metrics derived from the data store.
//!
//! Every metric compares the requested window `(start, end]` against the
//! window of equal length ending at `start`. Bundles are cached per filter
//! set for a fixed TTL; data changes do not invalidate them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use moka::future::Cache;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use agencia_check_core::{Money, Permission, ResellerId, SaleStatus};

use crate::clock::SharedClock;
use crate::config::ServiceSettings;
use crate::models::{CurrentUser, Sale};

use super::data_store::{DataSnapshot, DataStore};
use super::error::{ServiceError, ServiceResult, require};

const DEFAULT_WINDOW_DAYS: i64 = 30;
const TOP_RESELLERS: usize = 5;

/// Percent change from `previous` to `current`.
///
/// A zero baseline yields `100` for any positive current value and `0`
/// otherwise.
#[must_use]
pub fn calculate_percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    (current - previous) / previous.abs() * 100.0
}

/// Trend of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Stable,
}

/// A value with its previous-window comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub value: f64,
    pub previous_value: f64,
    pub percent_change: f64,
    pub direction: Direction,
}

impl Metric {
    /// Compare `value` against `previous_value`.
    #[must_use]
    pub fn compare(value: f64, previous_value: f64) -> Self {
        let percent_change = calculate_percent_change(value, previous_value);
        let direction = if percent_change > f64::EPSILON {
            Direction::Up
        } else if percent_change < -f64::EPSILON {
            Direction::Down
        } else {
            Direction::Stable
        };
        Self {
            value,
            previous_value,
            percent_change,
            direction,
        }
    }

    /// A point-in-time figure with no history.
    #[must_use]
    pub fn current(value: f64) -> Self {
        Self::compare(value, value)
    }
}

/// Query filters. Missing bounds default to the last 30 days ending now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsFilters {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub reseller_id: Option<ResellerId>,
    pub status: Option<SaleStatus>,
}

impl AnalyticsFilters {
    fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }

    fn window(&self, now: DateTime<Utc>) -> ServiceResult<Window> {
        let end = self.end.unwrap_or(now);
        let start = self
            .start
            .unwrap_or(end - chrono::Duration::days(DEFAULT_WINDOW_DAYS));
        if start >= end {
            return Err(ServiceError::Validation(
                "a data inicial deve ser anterior à data final".into(),
            ));
        }
        Ok(Window { start, end })
    }

    fn accepts(&self, sale: &Sale) -> bool {
        self.reseller_id.is_none_or(|id| sale.reseller_id == Some(id))
            && self.status.is_none_or(|status| sale.status == status)
    }
}

/// A time range, exclusive of `start` and inclusive of `end`, so a sale
/// recorded at the current instant counts in a window ending now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    fn contains(&self, at: DateTime<Utc>) -> bool {
        at > self.start && at <= self.end
    }

    /// The window of equal length ending where this one starts.
    #[must_use]
    pub fn previous(&self) -> Self {
        let length = self.end - self.start;
        Self {
            start: self.start - length,
            end: self.start,
        }
    }
}

/// Revenue and volume for one reseller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResellerPerformance {
    pub reseller_id: ResellerId,
    pub name: Option<String>,
    pub revenue: Money,
    pub sales: usize,
}

/// The dashboard bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub window: Window,
    pub generated_at: DateTime<Utc>,
    pub total_revenue: Metric,
    pub sales_count: Metric,
    pub average_ticket: Metric,
    /// Paid or completed sales as a percentage of all sales.
    pub conversion_rate: Metric,
    pub active_resellers: Metric,
    pub unique_customers: Metric,
    /// Customers whose first purchase falls in the window.
    pub new_customers: Metric,
    /// Share of the previous window's customers who bought again.
    pub retention_rate: Metric,
    /// Revenue per customer, all time up to the window end.
    pub customer_lifetime_value: Metric,
    pub average_fulfillment_hours: Metric,
    pub low_stock_items: Metric,
    pub inventory_value: Metric,
    /// Share of the window the service has been running.
    pub uptime: Metric,
    /// Local calendar day to revenue.
    pub revenue_by_day: BTreeMap<NaiveDate, Money>,
    pub top_resellers: Vec<ResellerPerformance>,
    pub sales_by_status: BTreeMap<String, usize>,
}

fn to_f64(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or_default()
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Figures for a single window.
#[derive(Debug, Default)]
struct WindowStats {
    revenue: Decimal,
    sales: usize,
    revenue_sales: usize,
    resellers: usize,
    customers: usize,
    new_customers: usize,
    retention: f64,
    lifetime_value: f64,
    fulfillment_hours: f64,
}

impl WindowStats {
    #[allow(clippy::cast_precision_loss)]
    fn compute(
        sales: &[&Sale],
        first_purchase: &HashMap<&str, DateTime<Utc>>,
        window: Window,
    ) -> Self {
        let in_window: Vec<&Sale> = sales
            .iter()
            .copied()
            .filter(|s| window.contains(s.date))
            .collect();

        let revenue_sales: Vec<&Sale> = in_window
            .iter()
            .copied()
            .filter(|s| s.status.is_revenue())
            .collect();
        let revenue: Decimal = revenue_sales.iter().map(|s| s.value.amount()).sum();

        let resellers: HashSet<ResellerId> =
            in_window.iter().filter_map(|s| s.reseller_id).collect();
        let customers = customers_in(&in_window);
        let new_customers = customers
            .iter()
            .filter(|c| first_purchase.get(*c).is_some_and(|at| window.contains(*at)))
            .count();

        let previous_customers = customers_in(
            &sales
                .iter()
                .copied()
                .filter(|s| window.previous().contains(s.date))
                .collect::<Vec<_>>(),
        );
        let retained = previous_customers.intersection(&customers).count();

        let (lifetime_revenue, lifetime_customers) = {
            let until_end: Vec<&Sale> = sales
                .iter()
                .copied()
                .filter(|s| s.date <= window.end)
                .collect();
            let revenue: Decimal = until_end
                .iter()
                .filter(|s| s.status.is_revenue())
                .map(|s| s.value.amount())
                .sum();
            (revenue, customers_in(&until_end).len())
        };
        let lifetime_value = if lifetime_customers == 0 {
            0.0
        } else {
            to_f64(lifetime_revenue) / lifetime_customers as f64
        };

        let fulfillment: Vec<f64> = in_window
            .iter()
            .filter_map(|s| s.delivered_at.map(|at| (at - s.date).num_minutes() as f64 / 60.0))
            .filter(|hours| *hours >= 0.0)
            .collect();
        let fulfillment_hours = if fulfillment.is_empty() {
            0.0
        } else {
            fulfillment.iter().sum::<f64>() / fulfillment.len() as f64
        };

        Self {
            revenue,
            sales: in_window.len(),
            revenue_sales: revenue_sales.len(),
            resellers: resellers.len(),
            customers: customers.len(),
            new_customers,
            retention: ratio(retained, previous_customers.len()),
            lifetime_value,
            fulfillment_hours,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn average_ticket(&self) -> f64 {
        if self.revenue_sales == 0 {
            0.0
        } else {
            to_f64(self.revenue) / self.revenue_sales as f64
        }
    }
}

fn customers_in<'a>(sales: &[&'a Sale]) -> HashSet<&'a str> {
    sales
        .iter()
        .filter_map(|s| s.customer.as_deref())
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn uptime(window: Window, started_at: DateTime<Utc>) -> f64 {
    let total = (window.end - window.start).num_seconds();
    if total <= 0 {
        return 0.0;
    }
    let running_from = window.start.max(started_at);
    let running = (window.end - running_from).num_seconds().clamp(0, total);
    running as f64 / total as f64 * 100.0
}

/// Compute the bundle from a snapshot.
///
/// # Errors
///
/// Returns `Validation` when the window is empty or inverted.
pub fn compute_dashboard(
    snapshot: &DataSnapshot,
    filters: &AnalyticsFilters,
    now: DateTime<Utc>,
    started_at: DateTime<Utc>,
    timezone: FixedOffset,
) -> ServiceResult<DashboardMetrics> {
    let window = filters.window(now)?;
    let previous = window.previous();

    let sales: Vec<&Sale> = snapshot.sales.iter().filter(|s| filters.accepts(s)).collect();
    let mut first_purchase: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for sale in &sales {
        if let Some(customer) = sale.customer.as_deref() {
            first_purchase
                .entry(customer)
                .and_modify(|at| *at = (*at).min(sale.date))
                .or_insert(sale.date);
        }
    }

    let current = WindowStats::compute(&sales, &first_purchase, window);
    let before = WindowStats::compute(&sales, &first_purchase, previous);

    let mut revenue_by_day: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    let mut sales_by_status: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_reseller: HashMap<ResellerId, (Money, usize)> = HashMap::new();
    for sale in sales.iter().filter(|s| window.contains(s.date)) {
        *sales_by_status.entry(sale.status.as_str().to_string()).or_default() += 1;
        if sale.status.is_revenue() {
            let day = sale.date.with_timezone(&timezone).date_naive();
            *revenue_by_day.entry(day).or_default() += sale.value;
            if let Some(id) = sale.reseller_id {
                let entry = by_reseller.entry(id).or_insert((Money::ZERO, 0));
                entry.0 += sale.value;
                entry.1 += 1;
            }
        }
    }

    let mut top_resellers: Vec<ResellerPerformance> = by_reseller
        .into_iter()
        .map(|(reseller_id, (revenue, count))| ResellerPerformance {
            reseller_id,
            name: snapshot
                .resellers
                .iter()
                .find(|r| r.id == reseller_id)
                .map(|r| r.name.clone()),
            revenue,
            sales: count,
        })
        .collect();
    top_resellers.sort_by(|a, b| {
        b.revenue
            .amount()
            .cmp(&a.revenue.amount())
            .then(a.reseller_id.cmp(&b.reseller_id))
    });
    top_resellers.truncate(TOP_RESELLERS);

    let low_stock = snapshot.inventory.iter().filter(|i| i.is_low_stock()).count();
    let inventory_value: Money = snapshot.inventory.iter().map(|i| i.stock_value()).sum();

    #[allow(clippy::cast_precision_loss)]
    let count = |n: usize| n as f64;

    Ok(DashboardMetrics {
        window,
        generated_at: now,
        total_revenue: Metric::compare(to_f64(current.revenue), to_f64(before.revenue)),
        sales_count: Metric::compare(count(current.sales), count(before.sales)),
        average_ticket: Metric::compare(current.average_ticket(), before.average_ticket()),
        conversion_rate: Metric::compare(
            ratio(current.revenue_sales, current.sales),
            ratio(before.revenue_sales, before.sales),
        ),
        active_resellers: Metric::compare(count(current.resellers), count(before.resellers)),
        unique_customers: Metric::compare(count(current.customers), count(before.customers)),
        new_customers: Metric::compare(count(current.new_customers), count(before.new_customers)),
        retention_rate: Metric::compare(current.retention, before.retention),
        customer_lifetime_value: Metric::compare(current.lifetime_value, before.lifetime_value),
        average_fulfillment_hours: Metric::compare(
            current.fulfillment_hours,
            before.fulfillment_hours,
        ),
        low_stock_items: Metric::current(count(low_stock)),
        inventory_value: Metric::current(to_f64(inventory_value.amount())),
        uptime: Metric::compare(uptime(window, started_at), uptime(previous, started_at)),
        revenue_by_day,
        top_resellers,
        sales_by_status,
    })
}

/// Cached dashboard metrics. Cheap to clone.
#[derive(Clone)]
pub struct AnalyticsService {
    data: DataStore,
    clock: SharedClock,
    started_at: DateTime<Utc>,
    timezone: FixedOffset,
    cache: Cache<String, Arc<DashboardMetrics>>,
}

impl std::fmt::Debug for AnalyticsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsService")
            .field("started_at", &self.started_at)
            .field("cached", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl AnalyticsService {
    /// Create the service. Uptime is measured from the clock's current time.
    #[must_use]
    pub fn new(data: DataStore, clock: SharedClock, settings: &ServiceSettings) -> Self {
        let cache = Cache::builder()
            .max_capacity(settings.analytics_cache_capacity)
            .time_to_live(settings.analytics_cache_ttl)
            .build();
        Self {
            data,
            started_at: clock.now(),
            clock,
            timezone: settings.timezone,
            cache,
        }
    }

    /// Cache entry lifetime.
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache.policy().time_to_live()
    }

    /// Dashboard bundle for `filters`, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ViewAnalytics`, or `Validation` for an
    /// inverted window.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn dashboard(
        &self,
        actor: &CurrentUser,
        filters: &AnalyticsFilters,
    ) -> ServiceResult<Arc<DashboardMetrics>> {
        require(actor, Permission::ViewAnalytics)?;

        let key = filters.cache_key();
        if let Some(cached) = self.cache.get(&key).await {
            debug!("Cache hit for dashboard metrics");
            return Ok(cached);
        }

        let snapshot = self.data.snapshot().await;
        let metrics = Arc::new(compute_dashboard(
            &snapshot,
            filters,
            self.clock.now(),
            self.started_at,
            self.timezone,
        )?);
        self.cache.insert(key, Arc::clone(&metrics)).await;
        debug!(sales = snapshot.sales.len(), "Computed dashboard metrics");
        Ok(metrics)
    }

    /// Drop every cached bundle.
    pub async fn invalidate_cache(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        tracing::info!("Analytics cache invalidated");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{InventoryItem, NewSale};
    use agencia_check_core::{Email, PaymentMethod, ProductId, SaleId, UserId, UserRole};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn admin() -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("admin@agencia.com.br").unwrap(),
            name: "Admin".into(),
            role: UserRole::Admin,
        }
    }

    fn sale(id: i32, cents: i64, days_ago: i64, status: SaleStatus, customer: &str) -> Sale {
        Sale {
            id: SaleId::new(id),
            value: Money::from_cents(cents),
            date: now() - chrono::Duration::days(days_ago),
            status,
            reseller_id: Some(ResellerId::new(id % 2 + 1)),
            customer: Some(customer.to_string()),
            product_id: None,
            quantity: 1,
            payment_method: PaymentMethod::Pix,
            delivered_at: None,
        }
    }

    fn tz() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    #[test]
    fn test_percent_change_zero_baseline() {
        assert_eq!(calculate_percent_change(10.0, 0.0), 100.0);
        assert_eq!(calculate_percent_change(0.0, 0.0), 0.0);
        assert_eq!(calculate_percent_change(-5.0, 0.0), 0.0);
    }

    #[test]
    fn test_percent_change_regular() {
        assert_eq!(calculate_percent_change(150.0, 100.0), 50.0);
        assert_eq!(calculate_percent_change(50.0, 100.0), -50.0);
        assert_eq!(calculate_percent_change(0.0, -10.0), 100.0);
    }

    #[test]
    fn test_metric_direction() {
        assert_eq!(Metric::compare(2.0, 1.0).direction, Direction::Up);
        assert_eq!(Metric::compare(1.0, 2.0).direction, Direction::Down);
        assert_eq!(Metric::compare(1.0, 1.0).direction, Direction::Stable);
        assert_eq!(Metric::current(7.0).direction, Direction::Stable);
    }

    #[test]
    fn test_previous_window_has_equal_length() {
        let window = Window {
            start: now() - chrono::Duration::days(30),
            end: now(),
        };
        let previous = window.previous();
        assert_eq!(previous.end, window.start);
        assert_eq!(previous.end - previous.start, window.end - window.start);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let filters = AnalyticsFilters {
            start: Some(now()),
            end: Some(now() - chrono::Duration::days(1)),
            ..AnalyticsFilters::default()
        };
        let result = compute_dashboard(&DataSnapshot::default(), &filters, now(), now(), tz());
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_dashboard_figures() {
        let snapshot = DataSnapshot {
            sales: vec![
                // Previous window.
                sale(1, 10_000, 40, SaleStatus::Paid, "a"),
                sale(2, 5_000, 45, SaleStatus::Cancelled, "b"),
                // Current window.
                sale(3, 20_000, 5, SaleStatus::Completed, "a"),
                sale(4, 10_000, 3, SaleStatus::Paid, "c"),
                sale(5, 7_000, 1, SaleStatus::Pending, "c"),
            ],
            resellers: vec![],
            inventory: vec![InventoryItem {
                id: ProductId::new(1),
                sku: "X".into(),
                name: "X".into(),
                quantity: 2,
                min_quantity: 5,
                unit_price: Money::from_cents(1000),
                unit_cost: Money::from_cents(400),
                updated_at: now(),
            }],
        };

        let started = now() - chrono::Duration::days(15);
        let m = compute_dashboard(&snapshot, &AnalyticsFilters::default(), now(), started, tz())
            .unwrap();

        assert_eq!(m.total_revenue.value, 300.0);
        assert_eq!(m.total_revenue.previous_value, 100.0);
        assert_eq!(m.total_revenue.percent_change, 200.0);
        assert_eq!(m.total_revenue.direction, Direction::Up);
        assert_eq!(m.sales_count.value, 3.0);
        assert_eq!(m.average_ticket.value, 150.0);
        assert!((m.conversion_rate.value - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.conversion_rate.previous_value, 50.0);
        assert_eq!(m.unique_customers.value, 2.0);
        assert_eq!(m.new_customers.value, 1.0);
        // Customer "a" bought in both windows; "b" did not come back.
        assert_eq!(m.retention_rate.value, 50.0);
        assert_eq!(m.customer_lifetime_value.value, 400.0 / 3.0);
        assert_eq!(m.low_stock_items.value, 1.0);
        assert_eq!(m.inventory_value.value, 8.0);
        assert_eq!(m.uptime.value, 50.0);
        assert_eq!(m.uptime.previous_value, 0.0);
        assert_eq!(m.sales_by_status.get("paid"), Some(&1));
        assert_eq!(m.sales_by_status.get("pending"), Some(&1));
        assert_eq!(m.revenue_by_day.len(), 2);
        assert_eq!(m.top_resellers.len(), 2);
        assert_eq!(m.top_resellers[0].revenue, Money::from_cents(20_000));
    }

    #[test]
    fn test_sale_at_window_end_counts_everywhere() {
        let snapshot = DataSnapshot {
            sales: vec![sale(1, 10_000, 0, SaleStatus::Paid, "a")],
            ..DataSnapshot::default()
        };
        let m = compute_dashboard(&snapshot, &AnalyticsFilters::default(), now(), now(), tz())
            .unwrap();
        assert_eq!(m.total_revenue.value, 100.0);
        assert_eq!(m.unique_customers.value, 1.0);
        assert_eq!(m.customer_lifetime_value.value, 100.0);
    }

    #[test]
    fn test_filters_narrow_sales() {
        let snapshot = DataSnapshot {
            sales: vec![
                sale(1, 10_000, 1, SaleStatus::Paid, "a"),
                sale(2, 10_000, 1, SaleStatus::Paid, "b"),
                sale(3, 10_000, 1, SaleStatus::Pending, "c"),
            ],
            ..DataSnapshot::default()
        };
        let filters = AnalyticsFilters {
            reseller_id: Some(ResellerId::new(2)),
            ..AnalyticsFilters::default()
        };
        let m = compute_dashboard(&snapshot, &filters, now(), now(), tz()).unwrap();
        assert_eq!(m.sales_count.value, 2.0);

        let filters = AnalyticsFilters {
            status: Some(SaleStatus::Pending),
            ..AnalyticsFilters::default()
        };
        let m = compute_dashboard(&snapshot, &filters, now(), now(), tz()).unwrap();
        assert_eq!(m.sales_count.value, 1.0);
        assert_eq!(m.total_revenue.value, 0.0);
    }

    #[tokio::test]
    async fn test_cache_serves_memoized_bundle_until_invalidated() {
        let clock = FixedClock::shared(now());
        let data = DataStore::new(clock.clone());
        let analytics = AnalyticsService::new(data.clone(), clock, &ServiceSettings::default());
        let filters = AnalyticsFilters::default();

        let first = analytics.dashboard(&admin(), &filters).await.unwrap();
        assert_eq!(first.sales_count.value, 0.0);

        data.create_sale(
            &admin(),
            NewSale {
                value: Money::from_cents(1000),
                date: None,
                status: SaleStatus::Paid,
                reseller_id: None,
                customer: None,
                product_id: None,
                quantity: None,
                payment_method: PaymentMethod::Pix,
            },
        )
        .await
        .unwrap();

        let second = analytics.dashboard(&admin(), &filters).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        analytics.invalidate_cache().await;
        let third = analytics.dashboard(&admin(), &filters).await.unwrap();
        assert_eq!(third.sales_count.value, 1.0);
    }

    #[tokio::test]
    async fn test_requires_view_analytics() {
        let clock = FixedClock::shared(now());
        let analytics = AnalyticsService::new(
            DataStore::new(clock.clone()),
            clock,
            &ServiceSettings::default(),
        );
        let sales = CurrentUser {
            role: UserRole::Sales,
            ..admin()
        };
        let result = analytics.dashboard(&sales, &AnalyticsFilters::default()).await;
        assert!(matches!(
            result,
            Err(ServiceError::Forbidden(Permission::ViewAnalytics))
        ));
    }
}
