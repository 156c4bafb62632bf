// ============================================================================
// Order Domain - Validation and aggregation over untrusted order data
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (Order, OrderItem, OrderStatus, ItemRecord)
// - Errors (ValidationError, AnalyticsFault, RepositoryError)
// - Schema validator and record partitioner
// - Aggregation engine (totals, statistics, stored-amount stats)
// - Commands (CreateOrder, UpdateOrder)
// - Repository trait with in-memory and retrying implementations
// - Services (OrderAnalyticsService, OrdersService)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod validator;
pub mod partitioner;
pub mod aggregation;
pub mod commands;
pub mod repository;
pub mod analytics_service;
pub mod orders_service;

// Re-export for convenience
pub use value_objects::*;
pub use errors::*;
pub use validator::{IdFormat, LenientDefaults, SchemaValidator, ValidationRules, DEFAULT_MAX_TOTAL_AMOUNT};
pub use partitioner::{Partition, RecordPartitioner};
pub use aggregation::{
    CalculationBreakdown, CustomerSummary, DateRange, ExtendedOrderStatistics, OrderStatistics, OrderStats,
    OrderTotals, StatusBreakdown,
};
pub use commands::*;
pub use repository::{InMemoryOrderRepository, OrderQuery, OrderRepository, RetryingRepository};
pub use analytics_service::OrderAnalyticsService;
pub use orders_service::OrdersService;
