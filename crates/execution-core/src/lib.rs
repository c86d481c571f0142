//! Core execution types and utilities.
//!
//! This crate provides the fundamental types for order execution:
//!
//! - **Order enums**: `OrderSide`, `OrderType`, `OrderStatus`, `ExecutionType`, `TimeInForce`
//! - **Intents and requests**: `OrderIntent` as entered by the user, `OrderRequest`
//!   as sent to the exchange
//! - **Execution reports**: `ExecutionReport` received from the user data stream
//! - **Client order IDs**: unique IDs used to attribute stream events to orders
//!
//! # Order Lifecycle
//!
//! 1. A command supplies an `OrderIntent`
//! 2. Exchange filters turn it into an `OrderRequest`
//! 3. A unique `client_order_id` is attached and the request is submitted via REST
//! 4. The REST response arrives (it may be beaten by the stream)
//! 5. `executionReport` events arrive with status updates
//! 6. Order reaches terminal state (Filled, Canceled, Rejected, Expired)

mod client_order_id;
mod execution;
mod order;
mod request;
mod user_data;

pub use client_order_id::{generate_client_order_id, MAX_CLIENT_ORDER_ID_LEN};
pub use execution::ExecutionReport;
pub use order::{ExecutionType, OrderSide, OrderStatus, OrderType, TimeInForce};
pub use request::{OrderIntent, OrderRequest, DEFAULT_RECV_WINDOW_MS};
pub use user_data::{AccountUpdate, BalanceUpdate, UserDataMessage};
