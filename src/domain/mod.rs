// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Everything that knows what an order is lives under `order`. Transport,
// configuration, and metrics sit outside and only call in.
//
// ============================================================================

pub mod order;
