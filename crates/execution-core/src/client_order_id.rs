//! Client order IDs used to attribute stream events to submitted orders.

use uuid::Uuid;

/// Longest client order ID the exchange accepts.
pub const MAX_CLIENT_ORDER_ID_LEN: usize = 36;

/// Generate a unique client order ID with a prefix.
///
/// Format: `{prefix}_{uuid}` where uuid is a v4 UUID in simple format (no hyphens).
/// The prefix is truncated so the result stays within
/// [`MAX_CLIENT_ORDER_ID_LEN`].
pub fn generate_client_order_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4().as_simple().to_string();
    let max_prefix = MAX_CLIENT_ORDER_ID_LEN - uuid.len() - 1;
    let prefix: String = prefix
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(max_prefix)
        .collect();

    if prefix.is_empty() {
        uuid
    } else {
        format!("{}_{}", prefix, uuid)
    }
}
