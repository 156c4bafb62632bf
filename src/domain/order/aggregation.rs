use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::errors::AnalyticsFault;
use super::value_objects::{ItemRecord, Order};

// ============================================================================
// Aggregation Engine
// ============================================================================
//
// Total functions over an accepted order sequence, including the empty one.
//
// Key Rules:
// 1. Revenue is recomputed from items; the stored total is informational
// 2. A rejected item contributes zero but never excludes its order
// 3. Zero/negative quantities and prices are summed as given
// 4. Accumulation runs left-to-right in input order
// 5. Average is over accepted orders, including zero-revenue ones
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderTotals {
    pub total_revenue: f64,
    pub average_order_value: f64,
    pub total_items: f64,
    pub total_orders: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderStatistics {
    pub total_orders: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub total_revenue: f64,
    pub average_order_value: f64,
    pub total_items: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalculationBreakdown {
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub processed_orders: usize,
    pub skipped_orders: usize,
    pub warnings: Vec<String>,
}

/// Summary over stored totals rather than item subtotals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub total_amount: f64,
    pub average_amount: f64,
}

/// Maximum number of customers listed in `top_customers`
pub const TOP_CUSTOMER_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusBreakdown {
    pub status: String,
    pub count: usize,
    /// Share of accepted orders, 0-100
    pub percentage: f64,
    pub total_revenue: f64,
    pub average_order_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomerSummary {
    pub customer_id: String,
    pub order_count: usize,
    pub total_spent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtendedOrderStatistics {
    #[serde(flatten)]
    pub statistics: OrderStatistics,
    pub status_breakdown: Vec<StatusBreakdown>,
    pub top_customers: Vec<CustomerSummary>,
    /// Absent when no accepted order carries `created_at`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

/// An aggregate plus the item-level warnings raised while computing it
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
struct Accumulator {
    revenue: f64,
    items: f64,
    orders: usize,
    warnings: Vec<String>,
}

impl Accumulator {
    fn add_order(&mut self, order: &Order) -> Result<(), AnalyticsFault> {
        for record in &order.items {
            match record {
                ItemRecord::Valid(item) => {
                    self.revenue += item.subtotal();
                    self.items += item.quantity;
                    if !self.revenue.is_finite() {
                        return Err(AnalyticsFault::Overflow {
                            field: "revenue",
                            order_id: order.id.clone(),
                        });
                    }
                    if !self.items.is_finite() {
                        return Err(AnalyticsFault::Overflow {
                            field: "item count",
                            order_id: order.id.clone(),
                        });
                    }
                }
                ItemRecord::Rejected(item) => {
                    let detail = item
                        .errors
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; ");
                    self.warnings.push(format!(
                        "Invalid item {} in order {}, skipping: {}",
                        item.label(),
                        order.id,
                        detail
                    ));
                }
            }
        }
        self.orders += 1;
        Ok(())
    }

    fn average(&self) -> f64 {
        average(self.revenue, self.orders)
    }
}

fn average(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn accumulate(accepted: &[Order]) -> Result<Accumulator, AnalyticsFault> {
    let mut acc = Accumulator::default();
    for order in accepted {
        acc.add_order(order)?;
    }
    Ok(acc)
}

/// Number of items excluded from revenue across the sequence
pub fn skipped_items(accepted: &[Order]) -> usize {
    accepted.iter().map(|order| order.rejected_items().count()).sum()
}

pub fn totals(accepted: &[Order]) -> Result<Aggregation<OrderTotals>, AnalyticsFault> {
    let acc = accumulate(accepted)?;

    Ok(Aggregation {
        value: OrderTotals {
            total_revenue: acc.revenue,
            average_order_value: acc.average(),
            total_items: acc.items,
            total_orders: acc.orders,
        },
        warnings: acc.warnings,
    })
}

pub fn statistics(accepted: &[Order]) -> Result<Aggregation<OrderStatistics>, AnalyticsFault> {
    let acc = accumulate(accepted)?;
    let status_counts = count_by_status(accepted);

    let counted: usize = status_counts.values().sum();
    if counted != acc.orders {
        return Err(AnalyticsFault::InvariantViolated {
            operation: "statistics",
            detail: format!("status buckets hold {} orders, expected {}", counted, acc.orders),
        });
    }

    Ok(Aggregation {
        value: OrderStatistics {
            total_orders: acc.orders,
            status_counts,
            total_revenue: acc.revenue,
            average_order_value: acc.average(),
            total_items: acc.items,
        },
        warnings: acc.warnings,
    })
}

/// Totals over the stored `total_amount` of each order
pub fn stored_amount_stats(accepted: &[Order]) -> Result<OrderStats, AnalyticsFault> {
    let mut total_amount = 0.0;
    for order in accepted {
        total_amount += order.total_amount;
        if !total_amount.is_finite() {
            return Err(AnalyticsFault::Overflow {
                field: "total amount",
                order_id: order.id.clone(),
            });
        }
    }

    Ok(OrderStats {
        total: accepted.len(),
        by_status: count_by_status(accepted),
        total_amount,
        average_amount: average(total_amount, accepted.len()),
    })
}

/// Statistics plus per-status revenue, top customers and the creation
/// date range. Runs the same left-to-right pass as `statistics` first, so
/// any overflow there is reported before the grouping pass starts.
pub fn extended_statistics(accepted: &[Order]) -> Result<Aggregation<ExtendedOrderStatistics>, AnalyticsFault> {
    let Aggregation { value: statistics, warnings } = statistics(accepted)?;

    let mut by_status: BTreeMap<&'static str, (usize, f64)> = BTreeMap::new();
    let mut by_customer: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    let mut date_range: Option<DateRange> = None;

    for order in accepted {
        let revenue = order_revenue(order)?;

        let status = by_status.entry(order.status_label()).or_insert((0, 0.0));
        status.0 += 1;
        status.1 += revenue;

        let customer = by_customer.entry(order.customer_id.as_str()).or_insert((0, 0.0));
        customer.0 += 1;
        customer.1 += revenue;

        if !status.1.is_finite() || !customer.1.is_finite() {
            return Err(AnalyticsFault::Overflow {
                field: "revenue",
                order_id: order.id.clone(),
            });
        }

        if let Some(created) = order.created_at {
            date_range = Some(match date_range {
                None => DateRange { earliest: created, latest: created },
                Some(range) => DateRange {
                    earliest: range.earliest.min(created),
                    latest: range.latest.max(created),
                },
            });
        }
    }

    let total_orders = statistics.total_orders;
    let mut status_breakdown: Vec<StatusBreakdown> = by_status
        .into_iter()
        .map(|(status, (count, revenue))| StatusBreakdown {
            status: status.to_string(),
            count,
            percentage: average(count as f64 * 100.0, total_orders),
            total_revenue: revenue,
            average_order_value: average(revenue, count),
        })
        .collect();
    // buckets come out of the map sorted by name, so ties keep that order
    status_breakdown.sort_by(|a, b| b.count.cmp(&a.count));

    let mut top_customers: Vec<CustomerSummary> = by_customer
        .into_iter()
        .map(|(customer_id, (order_count, total_spent))| CustomerSummary {
            customer_id: customer_id.to_string(),
            order_count,
            total_spent,
        })
        .collect();
    top_customers.sort_by(|a, b| {
        b.total_spent
            .partial_cmp(&a.total_spent)
            .unwrap_or(Ordering::Equal)
            .then(b.order_count.cmp(&a.order_count))
    });
    top_customers.truncate(TOP_CUSTOMER_LIMIT);

    Ok(Aggregation {
        value: ExtendedOrderStatistics {
            statistics,
            status_breakdown,
            top_customers,
            date_range,
        },
        warnings,
    })
}

fn order_revenue(order: &Order) -> Result<f64, AnalyticsFault> {
    let mut revenue = 0.0;
    for item in order.valid_items() {
        revenue += item.subtotal();
        if !revenue.is_finite() {
            return Err(AnalyticsFault::Overflow {
                field: "revenue",
                order_id: order.id.clone(),
            });
        }
    }
    Ok(revenue)
}

fn count_by_status(accepted: &[Order]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for order in accepted {
        *counts.entry(order.status_label().to_string()).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// Unit Tests
// ============================================================================
