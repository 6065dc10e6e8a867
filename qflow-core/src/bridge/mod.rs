//! Order-routing bridge (§4.3): request consumer, offset decision,
//! broker dispatch, response producer.
//!
//! The consumer-loop shape (shutdown `Arc<AtomicBool>`, short sleep on
//! empty poll) follows the teacher's `Engine::run` discipline in
//! `engine/generic.rs`; the bounded-retry-then-drop-and-count failure
//! mode for a full response queue mirrors the `response_drops` style
//! counter family used throughout the teacher's stats structs.

pub mod broker;
pub mod sim_broker;

pub use broker::{AccountInfo, BrokerAdapter, OrderCallbackSink, PositionInfo, Side2, UnifiedOrder};
pub use sim_broker::SimBroker;

use crate::bridge::broker::{BrokerOrderStatus, OrderInfo};
use crate::ledger::{OffsetFlag, PositionLedger};
use crate::shm::records::{RequestMsg, ResponseMsg, ResponseType};
use crate::shm::{ShmQueue, Side};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Created on successful broker acknowledgement; consulted on every
/// broker callback; removed only on terminal status after ledger
/// adjustment (§3).
#[derive(Debug, Clone)]
pub struct OrderCacheEntry {
    pub order_id: u32,
    pub strategy_id: i32,
    pub symbol: String,
    pub side: Side,
    pub offset_flag: OffsetFlag,
}

#[derive(Debug, Default)]
pub struct BridgeStats {
    pub requests_handled: AtomicU64,
    pub responses_sent: AtomicU64,
    pub response_drops: AtomicU64,
    pub broker_errors: AtomicU64,
    pub no_broker_rejects: AtomicU64,
}

impl BridgeStats {
    pub fn log_status(&self) {
        info!(
            requests = self.requests_handled.load(Ordering::Relaxed),
            responses = self.responses_sent.load(Ordering::Relaxed),
            drops = self.response_drops.load(Ordering::Relaxed),
            broker_errors = self.broker_errors.load(Ordering::Relaxed),
            no_broker = self.no_broker_rejects.load(Ordering::Relaxed),
            "bridge stats"
        );
    }
}

const RESPONSE_ENQUEUE_MAX_ATTEMPTS: u32 = 10_000;
const REQUEST_POLL_IDLE_SLEEP: Duration = Duration::from_micros(100);

/// Request-consumer / response-producer bridge between the strategy-side
/// shm queues and a table of broker adapters.
pub struct OrderBridge {
    ledger: Arc<PositionLedger>,
    brokers: HashMap<String, Arc<dyn BrokerAdapter>>,
    symbol_broker: Mutex<HashMap<String, String>>,
    cache: Mutex<HashMap<String, OrderCacheEntry>>,
    request_queue: Arc<ShmQueue<RequestMsg>>,
    response_queue: Arc<ShmQueue<ResponseMsg>>,
    stats: Arc<BridgeStats>,
    shutdown: Arc<AtomicBool>,
}

impl OrderBridge {
    pub fn new(
        ledger: Arc<PositionLedger>,
        brokers: HashMap<String, Arc<dyn BrokerAdapter>>,
        request_queue: Arc<ShmQueue<RequestMsg>>,
        response_queue: Arc<ShmQueue<ResponseMsg>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            brokers,
            symbol_broker: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            request_queue,
            response_queue,
            stats: Arc::new(BridgeStats::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn stats(&self) -> Arc<BridgeStats> {
        self.stats.clone()
    }

    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Pin a symbol to a specific broker by name; otherwise the first
    /// logged-in adapter is used (§4.3 step 1).
    pub fn route_symbol(&self, symbol: impl Into<String>, broker_name: impl Into<String>) {
        self.symbol_broker
            .lock()
            .insert(symbol.into(), broker_name.into());
    }

    fn select_broker(&self, symbol: &str) -> Option<Arc<dyn BrokerAdapter>> {
        if let Some(name) = self.symbol_broker.lock().get(symbol) {
            if let Some(b) = self.brokers.get(name) {
                return Some(b.clone());
            }
        }
        self.brokers
            .values()
            .find(|b| b.is_logged_in())
            .cloned()
    }

    /// Runs the single-threaded request-poller loop until shutdown is
    /// signaled. Blocking: spawn on its own thread.
    pub fn run_request_loop(self: &Arc<Self>) {
        info!("order bridge request loop starting");
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.request_queue.try_dequeue() {
                Some(req) => self.handle_request(&req),
                None => std::thread::sleep(REQUEST_POLL_IDLE_SLEEP),
            }
        }
        info!("order bridge request loop stopped");
    }

    fn handle_request(&self, req: &RequestMsg) {
        self.stats.requests_handled.fetch_add(1, Ordering::Relaxed);
        let symbol = req.symbol_str().to_string();

        let broker = match self.select_broker(&symbol) {
            Some(b) => b,
            None => {
                self.stats.no_broker_rejects.fetch_add(1, Ordering::Relaxed);
                self.emit_response(
                    req.order_id,
                    req.strategy_id,
                    &symbol,
                    req.side(),
                    ResponseType::OrsReject,
                    req.quantity,
                    0.0,
                    BridgeErrorCode::NoBroker as i32,
                    "",
                    req.timestamp_ns,
                );
                return;
            }
        };

        let offset_flag =
            self.ledger
                .decide_offset(&symbol, req.side(), req.quantity, req.exchange());

        let unified = UnifiedOrder::from_request(
            req.order_id,
            &symbol,
            req.exchange(),
            req.side(),
            crate::shm::records::OrdType::from_u8(req.ord_type),
            req.price,
            req.quantity,
            offset_flag,
        );

        let broker_order_id = broker.send_order(&unified);
        if broker_order_id.is_empty() {
            self.stats.broker_errors.fetch_add(1, Ordering::Relaxed);
            self.ledger
                .restore(&symbol, req.side(), req.quantity, offset_flag);
            self.emit_response(
                req.order_id,
                req.strategy_id,
                &symbol,
                req.side(),
                ResponseType::OrderError,
                req.quantity,
                0.0,
                BridgeErrorCode::SendFailed as i32,
                "",
                req.timestamp_ns,
            );
            return;
        }

        self.cache.lock().insert(
            broker_order_id,
            OrderCacheEntry {
                order_id: req.order_id,
                strategy_id: req.strategy_id,
                symbol,
                side: req.side(),
                offset_flag,
            },
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_response(
        &self,
        order_id: u32,
        strategy_id: i32,
        symbol: &str,
        side: Side,
        response_type: ResponseType,
        quantity: i32,
        price: f64,
        error_code: i32,
        exec_id: &str,
        timestamp_ns: u64,
    ) {
        let resp = ResponseMsg::new(
            order_id,
            strategy_id,
            symbol,
            side,
            response_type,
            quantity,
            price,
            error_code,
            exec_id,
            timestamp_ns,
        );
        match self
            .response_queue
            .enqueue(resp, RESPONSE_ENQUEUE_MAX_ATTEMPTS)
        {
            Ok(()) => {
                self.stats.responses_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.response_drops.fetch_add(1, Ordering::Relaxed);
                warn!(order_id, "response queue full, dropping response");
            }
        }
    }

    fn status_to_response_type(status: BrokerOrderStatus) -> ResponseType {
        match status {
            BrokerOrderStatus::Accepted | BrokerOrderStatus::Submitted => {
                ResponseType::NewOrderConfirm
            }
            BrokerOrderStatus::PartialFilled | BrokerOrderStatus::Filled => {
                ResponseType::TradeConfirm
            }
            BrokerOrderStatus::Canceled => ResponseType::CancelOrderConfirm,
            BrokerOrderStatus::Rejected | BrokerOrderStatus::Error => ResponseType::OrderError,
        }
    }

    fn is_terminal(status: BrokerOrderStatus) -> bool {
        matches!(
            status,
            BrokerOrderStatus::Filled | BrokerOrderStatus::Canceled | BrokerOrderStatus::Rejected
        )
    }
}

#[repr(i32)]
enum BridgeErrorCode {
    NoBroker = 1,
    SendFailed = 2,
}

impl OrderCallbackSink for OrderBridge {
    fn on_order(&self, info: OrderInfo) {
        let entry = {
            let cache = self.cache.lock();
            match cache.get(&info.broker_order_id) {
                Some(e) => e.clone(),
                None => {
                    debug!(
                        broker_order_id = %info.broker_order_id,
                        "callback for unknown order id, discarding (likely post-restart)"
                    );
                    return;
                }
            }
        };

        let response_type = Self::status_to_response_type(info.status);
        let (quantity, price) = match info.status {
            BrokerOrderStatus::Accepted | BrokerOrderStatus::Submitted => (0, 0.0),
            BrokerOrderStatus::PartialFilled | BrokerOrderStatus::Filled => {
                (info.traded_volume, info.price)
            }
            BrokerOrderStatus::Canceled => (info.volume - info.traded_volume, 0.0),
            BrokerOrderStatus::Rejected | BrokerOrderStatus::Error => (info.volume, 0.0),
        };

        match info.status {
            BrokerOrderStatus::PartialFilled | BrokerOrderStatus::Filled => {
                self.ledger
                    .apply_fill(&entry.symbol, entry.side, entry.offset_flag, quantity);
            }
            BrokerOrderStatus::Canceled | BrokerOrderStatus::Rejected | BrokerOrderStatus::Error => {
                self.ledger.restore_unfilled(
                    &entry.symbol,
                    entry.side,
                    quantity,
                    entry.offset_flag,
                );
            }
            BrokerOrderStatus::Accepted | BrokerOrderStatus::Submitted => {}
        }

        self.emit_response(
            entry.order_id,
            entry.strategy_id,
            &entry.symbol,
            entry.side,
            response_type,
            quantity,
            price,
            0,
            &info.exec_id,
            info.update_time_ns,
        );

        if Self::is_terminal(info.status) {
            self.cache.lock().remove(&info.broker_order_id);
        }
    }

    fn on_error(&self, code: i32, msg: String) {
        self.stats.broker_errors.fetch_add(1, Ordering::Relaxed);
        warn!(code, msg, "broker reported an error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::sim_broker::SimBroker;
    use crate::shm::records::{ExchangeType, OrdType, RequestMsg, Side};
    use crate::shm::{keys, ShmQueue};

    fn test_bridge(key_salt: i32) -> (Arc<OrderBridge>, Arc<ShmQueue<RequestMsg>>, Arc<ShmQueue<ResponseMsg>>) {
        let salt = key_salt + (std::process::id() as i32 & 0xFF);
        let req_q = Arc::new(ShmQueue::<RequestMsg>::create(keys::REQUEST + 0x4000 + salt, 64).unwrap());
        let resp_q = Arc::new(ShmQueue::<ResponseMsg>::create(keys::RESPONSE + 0x4000 + salt, 64).unwrap());
        let ledger = Arc::new(PositionLedger::new());
        let broker: Arc<dyn BrokerAdapter> = Arc::new(SimBroker::new("sim"));

        let mut brokers = HashMap::new();
        brokers.insert("sim".to_string(), broker.clone());

        let bridge = OrderBridge::new(ledger, brokers, req_q.clone(), resp_q.clone());
        broker.register_callbacks(bridge.clone());
        (bridge, req_q, resp_q)
    }

    #[test]
    fn open_then_full_fill_produces_confirm_and_trade() {
        let (bridge, _req_q, resp_q) = test_bridge(1);
        let req = RequestMsg::new(
            1,
            7,
            "ag2506",
            ExchangeType::Shfe,
            Side::Buy,
            OrdType::Limit,
            7800.0,
            3,
            0,
        );
        bridge.handle_request(&req);

        let r1 = resp_q.dequeue(1000).unwrap();
        assert_eq!(r1.response_type(), ResponseType::NewOrderConfirm);
        let r2 = resp_q.dequeue(1000).unwrap();
        assert_eq!(r2.response_type(), ResponseType::TradeConfirm);
        assert_eq!(r2.quantity, 3);
        assert_eq!(r2.price, 7800.0);

        assert_eq!(bridge.ledger.buckets("ag2506").today_long, 3);
    }

    #[test]
    fn no_broker_rejects_with_ors_reject() {
        let salt = 2 + (std::process::id() as i32 & 0xFF);
        let req_q = Arc::new(ShmQueue::<RequestMsg>::create(keys::REQUEST + 0x5000 + salt, 64).unwrap());
        let resp_q = Arc::new(ShmQueue::<ResponseMsg>::create(keys::RESPONSE + 0x5000 + salt, 64).unwrap());
        let ledger = Arc::new(PositionLedger::new());
        let bridge = OrderBridge::new(ledger, HashMap::new(), req_q, resp_q.clone());

        let req = RequestMsg::new(1, 7, "ag2506", ExchangeType::Shfe, Side::Buy, OrdType::Limit, 7800.0, 3, 0);
        bridge.handle_request(&req);

        let resp = resp_q.dequeue(1000).unwrap();
        assert_eq!(resp.response_type(), ResponseType::OrsReject);
    }

    #[test]
    fn broker_send_failure_restores_reservation() {
        let salt = 3 + (std::process::id() as i32 & 0xFF);
        let req_q = Arc::new(ShmQueue::<RequestMsg>::create(keys::REQUEST + 0x6000 + salt, 64).unwrap());
        let resp_q = Arc::new(ShmQueue::<ResponseMsg>::create(keys::RESPONSE + 0x6000 + salt, 64).unwrap());
        let ledger = Arc::new(PositionLedger::new());
        ledger.set_buckets(
            "cu2508",
            crate::ledger::PositionBuckets {
                today_long: 4,
                ..Default::default()
            },
        );

        let failing = Arc::new(SimBroker::new("failing"));
        failing.fail_next_for_symbol("cu2508");
        let failing_dyn: Arc<dyn BrokerAdapter> = failing;
        let mut brokers = HashMap::new();
        brokers.insert("failing".to_string(), failing_dyn.clone());

        let bridge = OrderBridge::new(ledger.clone(), brokers, req_q, resp_q.clone());
        failing_dyn.register_callbacks(bridge.clone());

        let req = RequestMsg::new(1, 7, "cu2508", ExchangeType::Shfe, Side::Sell, OrdType::Limit, 78000.0, 2, 0);
        bridge.handle_request(&req);

        let resp = resp_q.dequeue(1000).unwrap();
        assert_eq!(resp.response_type(), ResponseType::OrderError);
        assert_eq!(ledger.buckets("cu2508").today_long, 4);
    }
}
