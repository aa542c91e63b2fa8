//! Identifier helpers.

/// Human-facing order identifier derived from the internal row id.
/// Stable for the lifetime of the order; shown to clients and used as the
/// key for every order-level mutation.
pub fn readable_order_id(id: i64) -> String {
    format!("ORD-{id}")
}
