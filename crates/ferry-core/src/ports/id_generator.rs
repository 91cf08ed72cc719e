//! IdGenerator port - ID 生成の抽象化
//!
//! テスト容易性のために、trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::{EnvelopeId, ItemName};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は envelope と item の名前を生成
///
/// # ULID の特性
/// - 時刻でソート可能（reader の「名前順で最初」が到着順に近くなる）
/// - 分散環境で生成可能（調整不要）
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    /// Envelope ID を生成
    fn generate_envelope_id(&self) -> EnvelopeId;

    /// キュー内の item 名を生成
    fn generate_item_name(&self) -> ItemName;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_envelope_id(&self) -> EnvelopeId {
        EnvelopeId::from_ulid(self.next_ulid())
    }

    fn generate_item_name(&self) -> ItemName {
        ItemName::from_ulid(self.next_ulid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_envelope_id();
        let id2 = id_gen.generate_envelope_id();
        let id3 = id_gen.generate_envelope_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1: Ulid = id_gen.generate_envelope_id().as_str().parse().unwrap();
        let id2: Ulid = id_gen.generate_envelope_id().as_str().parse().unwrap();

        // ランダム部分があるので ID は異なる
        assert_ne!(id1, id2);

        // timestamp 部分は同じ
        assert_eq!(id1.timestamp_ms(), id2.timestamp_ms());
        assert_eq!(id1.timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }

    #[test]
    fn item_names_are_published_with_extension() {
        let id_gen = UlidGenerator::new(SystemClock);
        let name = id_gen.generate_item_name();
        assert!(name.as_str().ends_with(".msg"));
        assert!(!name.is_hidden());
    }
}
