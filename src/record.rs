//! The polymorphic value contract every cacheable type implements.

/// A value a chain can store, move between tiers, and test for "known
/// absent" (negative-cache) status.
///
/// Implementations carry their own serialization choice — this crate does
/// not force a single codec into the core. `deserialize` mutates the
/// receiver in place rather than returning `Self` so that callers can
/// reuse an allocation across repeated lookups (mirroring `make_empty`
/// factories used by the multi-key path).
///
/// Invariant: `let mut v2 = V::default(); v2.deserialize(&v.serialize()?)?;`
/// restores `v` under value equality for all non-transient fields.
pub trait Record: Send + Sync + Sized {
    /// Storage identity for this value.
    fn key(&self) -> String;

    /// Encode this value to bytes for a tier write.
    fn serialize(&self) -> crate::error::Result<Vec<u8>>;

    /// Decode `bytes` into `self`, replacing its contents.
    fn deserialize(&mut self, bytes: &[u8]) -> crate::error::Result<()>;

    /// True for a record representing "known absent" — a negative-cache
    /// entry. Such values are cached (with a short TTL) but never
    /// surfaced to callers as a hit.
    fn is_zero(&self) -> bool;
}


#[cfg(test)]
mod tests {
    use super::test_support::Widget;
    use super::Record;

    #[test]
    fn round_trip_preserves_equality() {
        let original = Widget::new("w1", "bolt");
        let bytes = original.serialize().unwrap();
        let mut restored = Widget::default();
        restored.deserialize(&bytes).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn zero_value_reports_is_zero() {
        let zero = Widget::zero_for("missing");
        assert!(zero.is_zero());
        assert!(!Widget::new("present", "x").is_zero());
    }
}
