//! In-memory paper broker used by tests and the `--paper` CLI mode.
//!
//! Grounded on the teacher's `SimulatedExecutor` idiom (referenced from
//! `execution/mod.rs`'s module doc): accepts every order immediately and
//! fills it synchronously at the requested price, so callers can exercise
//! the full request→offset→dispatch→callback→ledger path without a real
//! exchange connection.

use crate::bridge::broker::{
    AccountInfo, BrokerAdapter, BrokerOrderStatus, OrderCallbackSink, OrderInfo, PositionInfo,
    UnifiedOrder,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub struct SimBroker {
    name: String,
    logged_in: AtomicBool,
    next_id: AtomicU64,
    sink: Mutex<Option<Arc<dyn OrderCallbackSink>>>,
    /// Reject every order for this symbol (test hook for the empty-id
    /// failure path in §4.3 step 4).
    fail_symbols: Mutex<Vec<String>>,
}

impl SimBroker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            logged_in: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            sink: Mutex::new(None),
            fail_symbols: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_next_for_symbol(&self, symbol: impl Into<String>) {
        self.fail_symbols.lock().push(symbol.into());
    }

    fn now_ns() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64
    }
}

impl BrokerAdapter for SimBroker {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self, _config_path: &str) -> bool {
        true
    }

    fn login(&mut self) -> bool {
        self.logged_in.store(true, Ordering::Release);
        true
    }

    fn logout(&mut self) {
        self.logged_in.store(false, Ordering::Release);
    }

    fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Acquire)
    }

    fn register_callbacks(&self, sink: Arc<dyn OrderCallbackSink>) {
        *self.sink.lock() = Some(sink);
    }

    fn send_order(&self, order: &UnifiedOrder) -> String {
        let mut fail_symbols = self.fail_symbols.lock();
        if let Some(pos) = fail_symbols.iter().position(|s| s == &order.symbol) {
            fail_symbols.remove(pos);
            return String::new();
        }
        drop(fail_symbols);

        let broker_order_id = self.next_id.fetch_add(1, Ordering::AcqRel).to_string();

        if let Some(sink) = self.sink.lock().clone() {
            sink.on_order(OrderInfo {
                broker_order_id: broker_order_id.clone(),
                status: BrokerOrderStatus::Accepted,
                volume: order.quantity,
                traded_volume: 0,
                price: 0.0,
                update_time_ns: Self::now_ns(),
                exec_id: String::new(),
            });
            sink.on_order(OrderInfo {
                broker_order_id: broker_order_id.clone(),
                status: BrokerOrderStatus::Filled,
                volume: order.quantity,
                traded_volume: order.quantity,
                price: order.price,
                update_time_ns: Self::now_ns(),
                exec_id: format!("sim-{broker_order_id}"),
            });
        }

        broker_order_id
    }

    fn cancel_order(&self, broker_order_id: &str) -> bool {
        if let Some(sink) = self.sink.lock().clone() {
            sink.on_order(OrderInfo {
                broker_order_id: broker_order_id.to_string(),
                status: BrokerOrderStatus::Canceled,
                volume: 0,
                traded_volume: 0,
                price: 0.0,
                update_time_ns: Self::now_ns(),
                exec_id: String::new(),
            });
        }
        true
    }

    fn query_positions(&self) -> HashMap<String, Vec<PositionInfo>> {
        HashMap::new()
    }

    fn query_account(&self) -> AccountInfo {
        AccountInfo {
            balance: 1_000_000.0,
            available: 1_000_000.0,
            margin: 0.0,
            commission: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::OffsetFlag;
    use crate::shm::Side;
    use std::sync::Mutex as StdMutex;

    struct CollectingSink {
        events: StdMutex<Vec<OrderInfo>>,
    }

    impl OrderCallbackSink for CollectingSink {
        fn on_order(&self, info: OrderInfo) {
            self.events.lock().unwrap().push(info);
        }
    }

    #[test]
    fn fills_order_immediately() {
        let broker = SimBroker::new("sim");
        let sink = Arc::new(CollectingSink {
            events: StdMutex::new(Vec::new()),
        });
        broker.register_callbacks(sink.clone());

        let order = UnifiedOrder {
            client_order_id: "1".to_string(),
            symbol: "ag2506".to_string(),
            exchange: "SHFE",
            side: Side::Buy,
            price: 7800.0,
            quantity: 3,
            price_type: crate::bridge::broker::PriceType::Limit,
            offset_flag: OffsetFlag::Open,
        };
        let id = broker.send_order(&order);
        assert!(!id.is_empty());

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, BrokerOrderStatus::Accepted);
        assert_eq!(events[1].status, BrokerOrderStatus::Filled);
        assert_eq!(events[1].traded_volume, 3);
    }

    #[test]
    fn can_be_made_to_fail_one_order() {
        let broker = SimBroker::new("sim");
        broker.fail_next_for_symbol("cu2508");
        let order = UnifiedOrder {
            client_order_id: "1".to_string(),
            symbol: "cu2508".to_string(),
            exchange: "SHFE",
            side: Side::Sell,
            price: 78000.0,
            quantity: 2,
            price_type: crate::bridge::broker::PriceType::Limit,
            offset_flag: OffsetFlag::CloseToday,
        };
        assert_eq!(broker.send_order(&order), "");
    }
}
