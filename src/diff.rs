//! Dedup decision for one identity.
//!
//! Only the newest item is compared against the stored marker. If the feed
//! advanced by several posts between sweeps, only the newest one is notified.

use crate::types::{Decision, FetchedItem};

#[derive(Debug, Clone, Copy, Default)]
pub struct DiffPolicy {
    /// Notify for the first item seen after an identity is added.
    pub notify_on_first_poll: bool,
}

pub fn decide(stored_marker: &str, fetched: Option<&FetchedItem>, policy: DiffPolicy) -> Decision {
    let Some(item) = fetched else {
        return Decision::NoChange;
    };

    if stored_marker.is_empty() {
        return if policy.notify_on_first_poll {
            Decision::NotifyAndRecord(item.clone())
        } else {
            Decision::RecordOnly(item.id.clone())
        };
    }

    if item.id == stored_marker {
        Decision::NoChange
    } else {
        Decision::NotifyAndRecord(item.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fetch_is_no_change() {
        assert_eq!(decide("", None, DiffPolicy::default()), Decision::NoChange);
        assert_eq!(decide("T1", None, DiffPolicy::default()), Decision::NoChange);
    }

    #[test]
    fn first_poll_records_without_notifying() {
        let item = FetchedItem::new("T1");
        assert_eq!(
            decide("", Some(&item), DiffPolicy::default()),
            Decision::RecordOnly("T1".to_string())
        );
    }

    #[test]
    fn first_poll_notifies_when_enabled() {
        let item = FetchedItem::new("T1");
        let policy = DiffPolicy {
            notify_on_first_poll: true,
        };
        assert_eq!(
            decide("", Some(&item), policy),
            Decision::NotifyAndRecord(item.clone())
        );
    }

    #[test]
    fn same_id_is_no_change() {
        let item = FetchedItem::new("T2");
        assert_eq!(decide("T2", Some(&item), DiffPolicy::default()), Decision::NoChange);
    }

    #[test]
    fn different_id_notifies() {
        let item = FetchedItem::new("T2");
        assert_eq!(
            decide("T1", Some(&item), DiffPolicy::default()),
            Decision::NotifyAndRecord(item.clone())
        );
    }
}
