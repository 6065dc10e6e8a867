//! Per-symbol position ledger and Chinese-futures open/close offset-flag
//! decision (§4.2).
//!
//! There is no teacher precedent for offset-flag bucket accounting — the
//! closest grounding is the general locked-state-machine discipline used
//! throughout this crate (a single struct, mutated under one lock,
//! exposing narrow update methods rather than public field mutation).
//! The bucket arithmetic itself follows spec §4.2 directly; no
//! partial-close splitting, as specified.

use crate::shm::records::Side;
use crate::shm::ExchangeType;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetFlag {
    Open,
    CloseToday,
    CloseYestd,
}

/// Four-bucket lots for one symbol: today/overnight crossed with long/short.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionBuckets {
    pub on_long: i64,
    pub today_long: i64,
    pub on_short: i64,
    pub today_short: i64,
}

impl PositionBuckets {
    pub fn net_long(&self) -> i64 {
        self.on_long + self.today_long
    }

    pub fn net_short(&self) -> i64 {
        self.on_short + self.today_short
    }

    pub fn net_qty(&self) -> i64 {
        self.net_long() - self.net_short()
    }
}

/// Per-symbol position ledger, guarded by a single mutex per §5 ("each
/// guarded by a single mutex; all reads/writes take the mutex").
pub struct PositionLedger {
    buckets: Mutex<HashMap<String, PositionBuckets>>,
}

impl Default for PositionLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionLedger {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn buckets(&self, symbol: &str) -> PositionBuckets {
        self.buckets.lock().get(symbol).copied().unwrap_or_default()
    }

    /// Seed a symbol's buckets wholesale (startup reconciliation, tests).
    pub fn set_buckets(&self, symbol: &str, buckets: PositionBuckets) {
        self.buckets.lock().insert(symbol.to_string(), buckets);
    }

    /// Decide and reserve the offset flag for a new order of `qty` on
    /// `side`. This decision is final for the order's lifetime (§4.2);
    /// close-offset orders deduct from their bucket immediately, open
    /// orders do not reserve.
    pub fn decide_offset(
        &self,
        symbol: &str,
        side: Side,
        qty: i32,
        exchange: ExchangeType,
    ) -> OffsetFlag {
        let qty = qty as i64;
        let mut guard = self.buckets.lock();
        let entry = guard.entry(symbol.to_string()).or_default();

        match side {
            Side::Buy => {
                if qty <= entry.today_short {
                    entry.today_short -= qty;
                    if exchange.splits_today_yesterday() {
                        OffsetFlag::CloseToday
                    } else {
                        OffsetFlag::CloseYestd
                    }
                } else if qty <= entry.on_short {
                    entry.on_short -= qty;
                    OffsetFlag::CloseYestd
                } else {
                    OffsetFlag::Open
                }
            }
            Side::Sell => {
                if qty <= entry.today_long {
                    entry.today_long -= qty;
                    if exchange.splits_today_yesterday() {
                        OffsetFlag::CloseToday
                    } else {
                        OffsetFlag::CloseYestd
                    }
                } else if qty <= entry.on_long {
                    entry.on_long -= qty;
                    OffsetFlag::CloseYestd
                } else {
                    OffsetFlag::Open
                }
            }
        }
    }

    /// Undo a close reservation entirely (broker-send failure, §4.3 step
    /// 4): restores the full `qty` to the bucket the offset decision
    /// drew from. No-op for `Open` (nothing was reserved).
    pub fn restore(&self, symbol: &str, side: Side, qty: i32, offset_flag: OffsetFlag) {
        self.restore_unfilled(symbol, side, qty, offset_flag);
    }

    /// A fill arrived. For an `Open` order, grows the long/today or
    /// short/today bucket by the traded quantity; for a `Close*` order,
    /// the reservation already accounted for it, so nothing changes.
    pub fn apply_fill(&self, symbol: &str, side: Side, offset_flag: OffsetFlag, traded_qty: i32) {
        if offset_flag != OffsetFlag::Open {
            return;
        }
        let qty = traded_qty as i64;
        let mut guard = self.buckets.lock();
        let entry = guard.entry(symbol.to_string()).or_default();
        match side {
            Side::Buy => entry.today_long += qty,
            Side::Sell => entry.today_short += qty,
        }
    }

    /// A terminal reject, error, or cancel arrived for `unfilled_qty`
    /// remaining. For `Close*` orders, restores that quantity to the
    /// bucket it was drawn from; `Open` orders never reserved, so there
    /// is nothing to restore.
    pub fn restore_unfilled(&self, symbol: &str, side: Side, unfilled_qty: i32, offset_flag: OffsetFlag) {
        if offset_flag == OffsetFlag::Open {
            return;
        }
        let qty = unfilled_qty as i64;
        let mut guard = self.buckets.lock();
        let entry = guard.entry(symbol.to_string()).or_default();

        match (side, offset_flag) {
            (Side::Buy, OffsetFlag::CloseToday) => entry.today_short += qty,
            (Side::Buy, OffsetFlag::CloseYestd) => entry.on_short += qty,
            (Side::Sell, OffsetFlag::CloseToday) => entry.today_long += qty,
            (Side::Sell, OffsetFlag::CloseYestd) => entry.on_long += qty,
            (_, OffsetFlag::Open) => {}
        }

        if entry.on_long < 0 || entry.today_long < 0 || entry.on_short < 0 || entry.today_short < 0 {
            warn!(symbol, ?entry, "position bucket went negative after restore");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::ExchangeType;

    #[test]
    fn open_then_full_fill() {
        let ledger = PositionLedger::new();
        let flag = ledger.decide_offset("ag2506", Side::Buy, 3, ExchangeType::Shfe);
        assert_eq!(flag, OffsetFlag::Open);
        ledger.apply_fill("ag2506", Side::Buy, flag, 3);
        assert_eq!(ledger.buckets("ag2506").today_long, 3);
    }

    #[test]
    fn close_today_preferred_on_shfe() {
        let ledger = PositionLedger::new();
        ledger.set_buckets(
            "ag2506",
            PositionBuckets {
                today_short: 5,
                on_short: 2,
                ..Default::default()
            },
        );
        let flag = ledger.decide_offset("ag2506", Side::Buy, 3, ExchangeType::Shfe);
        assert_eq!(flag, OffsetFlag::CloseToday);
        let b = ledger.buckets("ag2506");
        assert_eq!(b.today_short, 2);
        assert_eq!(b.on_short, 2);

        ledger.apply_fill("ag2506", Side::Buy, flag, 3);
        let b = ledger.buckets("ag2506");
        assert_eq!(b.today_short, 2);
        assert_eq!(b.on_short, 2);
    }

    #[test]
    fn non_shfe_close_always_uses_yesterday_flag() {
        let ledger = PositionLedger::new();
        ledger.set_buckets(
            "c",
            PositionBuckets {
                today_short: 5,
                ..Default::default()
            },
        );
        let flag = ledger.decide_offset("c", Side::Buy, 2, ExchangeType::Dce);
        assert_eq!(flag, OffsetFlag::CloseYestd);
        assert_eq!(ledger.buckets("c").today_short, 3);
    }

    #[test]
    fn reject_restores_reservation() {
        let ledger = PositionLedger::new();
        ledger.set_buckets(
            "cu2508",
            PositionBuckets {
                today_long: 4,
                ..Default::default()
            },
        );
        let flag = ledger.decide_offset("cu2508", Side::Sell, 2, ExchangeType::Shfe);
        assert_eq!(flag, OffsetFlag::CloseToday);
        assert_eq!(ledger.buckets("cu2508").today_long, 2);

        ledger.restore("cu2508", Side::Sell, 2, flag);
        assert_eq!(ledger.buckets("cu2508").today_long, 4);
    }

    #[test]
    fn no_single_bucket_covers_quantity_falls_back_to_open() {
        let ledger = PositionLedger::new();
        ledger.set_buckets(
            "x",
            PositionBuckets {
                today_short: 1,
                on_short: 1,
                ..Default::default()
            },
        );
        // qty=3 isn't covered by either bucket alone: no partial-close splitting.
        let flag = ledger.decide_offset("x", Side::Buy, 3, ExchangeType::Shfe);
        assert_eq!(flag, OffsetFlag::Open);
        let b = ledger.buckets("x");
        assert_eq!(b.today_short, 1);
        assert_eq!(b.on_short, 1);
    }

    #[test]
    fn cancel_restores_unfilled_quantity_only() {
        let ledger = PositionLedger::new();
        ledger.set_buckets(
            "ag2506",
            PositionBuckets {
                today_short: 5,
                ..Default::default()
            },
        );
        let flag = ledger.decide_offset("ag2506", Side::Buy, 5, ExchangeType::Shfe);
        assert_eq!(ledger.buckets("ag2506").today_short, 0);
        // Partially filled 3, 2 unfilled and canceled.
        ledger.restore_unfilled("ag2506", Side::Buy, 2, flag);
        assert_eq!(ledger.buckets("ag2506").today_short, 2);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::shm::ExchangeType;
    use proptest::prelude::*;

    fn exchange() -> impl Strategy<Value = ExchangeType> {
        prop_oneof![
            Just(ExchangeType::Shfe),
            Just(ExchangeType::Dce),
            Just(ExchangeType::Czce),
            Just(ExchangeType::Cffex),
        ]
    }

    fn side() -> impl Strategy<Value = Side> {
        prop_oneof![Just(Side::Buy), Just(Side::Sell)]
    }

    /// Property: no bucket ever goes negative, for any sequence of
    /// decide_offset + restore/restore_unfilled/apply_fill calls.
    #[test]
    fn prop_buckets_never_go_negative() {
        proptest!(|(
            seed in any::<PositionBuckets>().prop_filter("non-negative seed", |b|
                b.on_long >= 0 && b.today_long >= 0 && b.on_short >= 0 && b.today_short >= 0
            ),
            side in side(),
            qty in 1i32..1000,
            exchange in exchange(),
            undo in any::<bool>(),
        )| {
            let ledger = PositionLedger::new();
            ledger.set_buckets("x", seed);
            let flag = ledger.decide_offset("x", side, qty, exchange);
            let b = ledger.buckets("x");
            prop_assert!(b.on_long >= 0 && b.today_long >= 0 && b.on_short >= 0 && b.today_short >= 0);

            if undo {
                ledger.restore("x", side, qty, flag);
            } else {
                ledger.apply_fill("x", side, flag, qty);
            }
            let b = ledger.buckets("x");
            prop_assert!(b.on_long >= 0 && b.today_long >= 0 && b.on_short >= 0 && b.today_short >= 0);
        });
    }

    /// Property: restoring a reservation exactly undoes decide_offset's
    /// effect on the buckets, for any close-path decision.
    #[test]
    fn prop_restore_is_inverse_of_decide_offset_for_close(
    ) {
        proptest!(|(
            seed in any::<PositionBuckets>().prop_filter("non-negative seed", |b|
                b.on_long >= 0 && b.today_long >= 0 && b.on_short >= 0 && b.today_short >= 0
            ),
            side in side(),
            qty in 1i32..1000,
            exchange in exchange(),
        )| {
            let ledger = PositionLedger::new();
            ledger.set_buckets("x", seed);
            let flag = ledger.decide_offset("x", side, qty, exchange);
            ledger.restore("x", side, qty, flag);
            let restored = ledger.buckets("x");
            if flag == OffsetFlag::Open {
                // Open never reserves, so the buckets are untouched either way.
                prop_assert_eq!(restored, seed);
            } else {
                prop_assert_eq!(restored, seed);
            }
        });
    }

    /// Property: an Open decision never mutates any existing bucket.
    #[test]
    fn prop_open_decision_leaves_buckets_unchanged() {
        proptest!(|(
            side in side(),
            qty in 1i32..1000,
            exchange in exchange(),
        )| {
            let ledger = PositionLedger::new();
            // Empty buckets can never cover a close, so this always opens.
            let flag = ledger.decide_offset("x", side, qty, exchange);
            prop_assert_eq!(flag, OffsetFlag::Open);
            prop_assert_eq!(ledger.buckets("x"), PositionBuckets::default());
        });
    }

    /// Property: an Open fill increases exactly the today bucket on its
    /// side by the traded quantity, leaving the other three untouched.
    #[test]
    fn prop_open_fill_grows_only_its_own_today_bucket() {
        proptest!(|(side in side(), qty in 1i32..1000)| {
            let ledger = PositionLedger::new();
            ledger.apply_fill("x", side, OffsetFlag::Open, qty);
            let b = ledger.buckets("x");
            match side {
                Side::Buy => {
                    prop_assert_eq!(b.today_long, qty as i64);
                    prop_assert_eq!(b.today_short, 0);
                }
                Side::Sell => {
                    prop_assert_eq!(b.today_short, qty as i64);
                    prop_assert_eq!(b.today_long, 0);
                }
            }
            prop_assert_eq!(b.on_long, 0);
            prop_assert_eq!(b.on_short, 0);
        });
    }

    impl Arbitrary for PositionBuckets {
        type Parameters = ();
        type Strategy = BoxedStrategy<PositionBuckets>;

        fn arbitrary_with(_args: ()) -> Self::Strategy {
            (0i64..10_000, 0i64..10_000, 0i64..10_000, 0i64..10_000)
                .prop_map(|(on_long, today_long, on_short, today_short)| PositionBuckets {
                    on_long,
                    today_long,
                    on_short,
                    today_short,
                })
                .boxed()
        }
    }
}
