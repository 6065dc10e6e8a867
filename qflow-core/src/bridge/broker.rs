//! Uniform broker-adapter interface (§4.3, §6) and the order/position
//! types it moves across that boundary. Mirrors the shape of the
//! teacher's `Executor` trait (`execution/mod.rs`): a small capability
//! set, default methods where a sane fallback exists, object-safe so the
//! bridge can hold a table of adapters keyed by name (§9 design note on
//! dynamic polymorphism over broker plugins).

use crate::ledger::OffsetFlag;
use crate::shm::{ExchangeType, OrdType, Side};
use std::collections::HashMap;

/// Canonical exchange code string used on the broker-plugin boundary.
pub fn exchange_code(exchange: ExchangeType) -> &'static str {
    match exchange {
        ExchangeType::Shfe => "SHFE",
        ExchangeType::Cffex => "CFFEX",
        ExchangeType::Dce => "DCE",
        ExchangeType::Czce => "CZCE",
        ExchangeType::Gfex => "GFEX",
        ExchangeType::Ine => "INE",
        ExchangeType::Unknown => "UNKNOWN",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceType {
    Market,
    Limit,
}

impl From<OrdType> for PriceType {
    fn from(t: OrdType) -> Self {
        match t {
            OrdType::Market => Self::Market,
            OrdType::Limit => Self::Limit,
        }
    }
}

/// The order shape every broker plugin accepts, translated from a
/// `RequestMsg` plus the ledger's offset decision (§4.3 step 3).
#[derive(Debug, Clone)]
pub struct UnifiedOrder {
    pub client_order_id: String,
    pub symbol: String,
    pub exchange: &'static str,
    pub side: Side,
    pub price: f64,
    pub quantity: i32,
    pub price_type: PriceType,
    pub offset_flag: OffsetFlag,
}

impl UnifiedOrder {
    pub fn from_request(
        order_id: u32,
        symbol: &str,
        exchange: ExchangeType,
        side: Side,
        ord_type: OrdType,
        price: f64,
        quantity: i32,
        offset_flag: OffsetFlag,
    ) -> Self {
        Self {
            client_order_id: order_id.to_string(),
            symbol: symbol.to_string(),
            exchange: exchange_code(exchange),
            side,
            price,
            quantity,
            price_type: ord_type.into(),
            offset_flag,
        }
    }
}

/// Broker-plugin order status, mapped per the §4.3 status table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerOrderStatus {
    Accepted,
    Submitted,
    PartialFilled,
    Filled,
    Canceled,
    Rejected,
    Error,
}

/// A broker callback for one order event; `on_order` in §4.3.
#[derive(Debug, Clone)]
pub struct OrderInfo {
    pub broker_order_id: String,
    pub status: BrokerOrderStatus,
    /// Original requested volume.
    pub volume: i32,
    /// Cumulative traded volume so far (for `PARTIAL_FILLED`/`FILLED`,
    /// this fill's quantity; the bridge doesn't need to track deltas
    /// itself since each callback already carries the right number per
    /// the status table).
    pub traded_volume: i32,
    pub price: f64,
    pub update_time_ns: u64,
    pub exec_id: String,
}

#[derive(Debug, Clone)]
pub struct TradeInfo {
    pub broker_order_id: String,
    pub traded_volume: i32,
    pub price: f64,
    pub update_time_ns: u64,
    pub exec_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct PositionInfo {
    pub symbol: String,
    pub direction: Side2,
    pub volume: i64,
    pub today_volume: i64,
    pub yesterday_volume: i64,
    pub avg_price: f64,
    pub position_profit: f64,
    pub margin: f64,
}

/// Long/short direction for a broker-reported position (distinct from
/// order `Side` since a position has no notion of "the side that just
/// traded").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side2 {
    #[default]
    Long,
    Short,
}

#[derive(Debug, Clone, Default)]
pub struct AccountInfo {
    pub balance: f64,
    pub available: f64,
    pub margin: f64,
    pub commission: f64,
}

/// Callback sink a `BrokerAdapter` pushes events into. The bridge
/// implements this once and registers itself with every adapter it owns.
pub trait OrderCallbackSink: Send + Sync {
    fn on_order(&self, info: OrderInfo);
    fn on_trade(&self, info: TradeInfo) {
        // Default: most adapters fold trade ticks into `on_order` with
        // `status = PartialFilled/Filled`, so a plugin without a separate
        // trade feed need not implement this.
        let _ = info;
    }
    fn on_error(&self, code: i32, msg: String) {
        let _ = (code, msg);
    }
}

/// Uniform interface over broker plugins (CTP SDK, exchange simulators,
/// ...), treated as an external collaborator per spec §1 — this trait is
/// the seam, not an implementation of any particular wire protocol.
pub trait BrokerAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn initialize(&self, config_path: &str) -> bool;
    fn login(&mut self) -> bool;
    fn logout(&mut self);
    fn is_logged_in(&self) -> bool;

    fn register_callbacks(&self, sink: std::sync::Arc<dyn OrderCallbackSink>);

    /// Returns the broker-assigned order id, or an empty string on
    /// failure (§4.3 step 4).
    fn send_order(&self, order: &UnifiedOrder) -> String;
    fn cancel_order(&self, broker_order_id: &str) -> bool;

    fn query_positions(&self) -> HashMap<String, Vec<PositionInfo>>;
    fn query_account(&self) -> AccountInfo;
}
