// Identity types shared by the wire layer and the Remote Transaction
// Controller. The wire codec that actually marshals requests onto a
// transport is an external collaborator (out of scope here, see
// SPEC_FULL.md §1); this crate only owns the value types a session key is
// built from, the same way the original `NodeID` lived in the networking
// subsystem rather than in the transaction subsystem.

use serde::{Deserialize, Serialize};

/// Identifies the slave (or other remote participant) that opened a
/// session. Stable across the lifetime of one connection to the master.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct OriginId(pub u32);

/// A nonce chosen by the origin when it starts a new remote transaction.
/// Combined with [`OriginId`] and [`EventSeq`], uniquely names one remote
/// transaction even across master failover (though per SPEC_FULL.md §1,
/// a session started on one master does not survive failover to another).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct SessionNonce(pub u64);

/// Monotonically increasing per-origin event counter, distinguishing
/// successive requests issued under the same [`SessionNonce`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct EventSeq(pub u64);

/// Durable commit id assigned by a `DataSourceSet` log. Ordered and
/// monotone per resource (SPEC_FULL.md §8, invariant 5).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl TxId {
    pub fn next(self) -> TxId {
        TxId(self.0 + 1)
    }
}

/// Name of a registered append-only log (e.g. `"neostore"`). Resolved
/// through `DataSourceSet::by_name`.
pub type ResourceName = String;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txid_next_is_monotone() {
        let a = TxId(10);
        let b = a.next();
        assert!(b > a);
        assert_eq!(b, TxId(11));
    }

    #[test]
    fn identity_fields_are_value_equal() {
        let a = (OriginId(1), SessionNonce(2), EventSeq(3));
        let b = (OriginId(1), SessionNonce(2), EventSeq(3));
        assert_eq!(a, b);
    }
}
