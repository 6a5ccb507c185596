use chrono::{DateTime, Utc};

/// A fact recorded by an aggregate.
///
/// `event_type` is the stable name stored next to the JSON payload
/// (`"ledger.entry.posted"`); renaming one orphans every stored event of
/// that type. Bump `version` when the payload shape changes.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc>;
}
