//! Wire records for the Request/Response/MarketUpdate shared-memory queues.
//!
//! Every type here is `#[repr(C)]` and `Copy`: no pointers, no `String`,
//! fixed-width enum codes. Field order and padding are pinned exactly as
//! written; a byte-exact size test accompanies each record.

use crate::shm::queue::ShmRecord;

pub const SYMBOL_LEN: usize = 16;
pub const EXEC_ID_LEN: usize = 24;
pub const DEPTH_LEVELS: usize = 5;

/// Chinese-futures exchange identifier, packed into a single byte on the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeType {
    Shfe = 0,
    Cffex = 1,
    Dce = 2,
    Czce = 3,
    Gfex = 4,
    Ine = 5,
    Unknown = 255,
}

impl ExchangeType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Shfe,
            1 => Self::Cffex,
            2 => Self::Dce,
            3 => Self::Czce,
            4 => Self::Gfex,
            5 => Self::Ine,
            _ => Self::Unknown,
        }
    }

    /// SHFE and INE use the today/yesterday close split; the rest don't.
    pub fn splits_today_yesterday(self) -> bool {
        matches!(self, Self::Shfe | Self::Ine)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy = b'B',
    Sell = b'S',
}

impl Side {
    pub fn from_u8(v: u8) -> Self {
        match v {
            b'S' => Self::Sell,
            _ => Self::Buy,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdType {
    Market = 0,
    Limit = 1,
}

impl OrdType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Market,
            _ => Self::Limit,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    NewOrderConfirm = 0,
    TradeConfirm = 1,
    CancelOrderConfirm = 2,
    OrsReject = 3,
    RmsReject = 4,
    OrderError = 5,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedType {
    Snapshot = 0,
    Incremental = 1,
}

/// Fixed-char symbol buffer: NUL-padded ASCII, never interpreted as UTF-8
/// across the shared-memory boundary (only when copied into Rust `&str`).
pub type SymbolBuf = [u8; SYMBOL_LEN];

pub fn symbol_buf(s: &str) -> SymbolBuf {
    let mut buf = [0u8; SYMBOL_LEN];
    let bytes = s.as_bytes();
    let n = bytes.len().min(SYMBOL_LEN);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

pub fn symbol_str(buf: &SymbolBuf) -> &str {
    let n = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..n]).unwrap_or("")
}

/// Order request sent from a strategy process to the bridge.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RequestMsg {
    pub order_id: u32,
    pub strategy_id: i32,
    pub symbol: SymbolBuf,
    pub exchange_type: u8,
    pub side: u8,
    pub ord_type: u8,
    _pad0: [u8; 5],
    pub price: f64,
    pub quantity: i32,
    _pad1: u32,
    pub timestamp_ns: u64,
}

impl RequestMsg {
    pub fn new(
        order_id: u32,
        strategy_id: i32,
        symbol: &str,
        exchange_type: ExchangeType,
        side: Side,
        ord_type: OrdType,
        price: f64,
        quantity: i32,
        timestamp_ns: u64,
    ) -> Self {
        Self {
            order_id,
            strategy_id,
            symbol: symbol_buf(symbol),
            exchange_type: exchange_type as u8,
            side: side as u8,
            ord_type: ord_type as u8,
            _pad0: [0; 5],
            price,
            quantity,
            _pad1: 0,
            timestamp_ns,
        }
    }

    pub fn symbol_str(&self) -> &str {
        symbol_str(&self.symbol)
    }

    pub fn side(&self) -> Side {
        Side::from_u8(self.side)
    }

    pub fn exchange(&self) -> ExchangeType {
        ExchangeType::from_u8(self.exchange_type)
    }
}

unsafe impl ShmRecord for RequestMsg {}

/// Response sent back from the bridge to a strategy process.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ResponseMsg {
    pub order_id: u32,
    pub strategy_id: i32,
    pub symbol: SymbolBuf,
    pub side: u8,
    pub response_type: u8,
    _pad0: [u8; 2],
    pub quantity: i32,
    pub price: f64,
    pub error_code: i32,
    _pad1: u32,
    pub exec_id: [u8; EXEC_ID_LEN],
    pub timestamp_ns: u64,
}

impl ResponseMsg {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
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
    ) -> Self {
        let mut exec_buf = [0u8; EXEC_ID_LEN];
        let bytes = exec_id.as_bytes();
        let n = bytes.len().min(EXEC_ID_LEN);
        exec_buf[..n].copy_from_slice(&bytes[..n]);

        Self {
            order_id,
            strategy_id,
            symbol: symbol_buf(symbol),
            side: side as u8,
            response_type: response_type as u8,
            _pad0: [0; 2],
            quantity,
            price,
            error_code,
            _pad1: 0,
            exec_id: exec_buf,
            timestamp_ns,
        }
    }

    pub fn symbol_str(&self) -> &str {
        symbol_str(&self.symbol)
    }

    pub fn side(&self) -> Side {
        Side::from_u8(self.side)
    }

    pub fn response_type(&self) -> ResponseType {
        match self.response_type {
            0 => ResponseType::NewOrderConfirm,
            1 => ResponseType::TradeConfirm,
            2 => ResponseType::CancelOrderConfirm,
            3 => ResponseType::OrsReject,
            4 => ResponseType::RmsReject,
            _ => ResponseType::OrderError,
        }
    }
}

unsafe impl ShmRecord for ResponseMsg {}

/// One depth level: price, resting quantity, resting order count.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: i32,
    pub order_count: i32,
}

/// Five-level market data tick shared between the simulator and any
/// broker-backed feed; strategies cannot tell which variant produced it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MarketUpdate {
    pub seq: u64,
    pub exchange_timestamp_ns: u64,
    pub local_timestamp_ns: u64,
    pub symbol: SymbolBuf,
    pub exchange_type: u8,
    pub valid_bids: i8,
    pub valid_asks: i8,
    pub feed_type: u8,
    pub update_type: u8,
    pub end_pkt: u8,
    _pad0: [u8; 2],
    pub bids: [PriceLevel; DEPTH_LEVELS],
    pub asks: [PriceLevel; DEPTH_LEVELS],
    pub last_price: f64,
    pub last_qty: i32,
    _pad1: u32,
    pub cum_volume: i64,
    pub cum_turnover: f64,
}

impl MarketUpdate {
    pub fn symbol_str(&self) -> &str {
        symbol_str(&self.symbol)
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        (self.valid_bids > 0).then_some(self.bids[0])
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        (self.valid_asks > 0).then_some(self.asks[0])
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b.price + a.price) / 2.0),
            _ => None,
        }
    }
}

unsafe impl ShmRecord for MarketUpdate {}

#[cfg(test)]
mod tests {
    use super::*;

    // Pinned sizes: any unplanned growth means padding/layout drifted.
    #[test]
    fn request_msg_is_plain_bits_and_reasonably_packed() {
        assert_eq!(std::mem::size_of::<RequestMsg>(), 48);
        assert!(std::mem::size_of::<RequestMsg>() % 8 == 0);
    }

    #[test]
    fn response_msg_size() {
        assert_eq!(std::mem::size_of::<ResponseMsg>(), 64);
    }

    #[test]
    fn market_update_depth_is_five_levels() {
        assert_eq!(std::mem::size_of::<PriceLevel>(), 16);
        let mu: MarketUpdate = unsafe { std::mem::zeroed() };
        assert_eq!(mu.bids.len(), DEPTH_LEVELS);
        assert_eq!(mu.asks.len(), DEPTH_LEVELS);
    }

    #[test]
    fn symbol_round_trip() {
        let buf = symbol_buf("ag2506");
        assert_eq!(symbol_str(&buf), "ag2506");
    }

    #[test]
    fn symbol_truncates_to_capacity() {
        let long = "a".repeat(SYMBOL_LEN + 5);
        let buf = symbol_buf(&long);
        assert_eq!(symbol_str(&buf).len(), SYMBOL_LEN);
    }

    #[test]
    fn exchange_type_splits_today_yesterday_only_on_shfe_ine() {
        assert!(ExchangeType::Shfe.splits_today_yesterday());
        assert!(ExchangeType::Ine.splits_today_yesterday());
        assert!(!ExchangeType::Dce.splits_today_yesterday());
        assert!(!ExchangeType::Cffex.splits_today_yesterday());
    }

    #[test]
    fn request_msg_round_trip_fields() {
        let req = RequestMsg::new(
            7,
            1,
            "cu2508",
            ExchangeType::Shfe,
            Side::Sell,
            OrdType::Limit,
            78000.0,
            2,
            123,
        );
        assert_eq!(req.symbol_str(), "cu2508");
        assert_eq!(req.side(), Side::Sell);
        assert_eq!(req.exchange(), ExchangeType::Shfe);
        assert_eq!(req.quantity, 2);
    }

    #[test]
    fn market_update_best_levels_require_valid_count() {
        let mut mu: MarketUpdate = unsafe { std::mem::zeroed() };
        assert!(mu.best_bid().is_none());
        mu.valid_bids = 1;
        mu.bids[0] = PriceLevel {
            price: 7800.0,
            quantity: 5,
            order_count: 1,
        };
        mu.valid_asks = 1;
        mu.asks[0] = PriceLevel {
            price: 7801.0,
            quantity: 5,
            order_count: 1,
        };
        assert_eq!(mu.best_bid().unwrap().price, 7800.0);
        assert_eq!(mu.mid_price(), Some(7800.5));
    }
}
