///
/// Virtual table attributes.
///
/// Tables declare a set of attribute flags at registration. A query is
/// event-based when any table it touches declares `EVENT_BASED`.
///

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TableAttributes: u32 {
        const NONE = 0;
        const EVENT_BASED = 1;
        const CACHEABLE = 1 << 1;
        const UTILITY = 1 << 2;
        const KERNEL_REQUIRED = 1 << 3;
        const USER_BASED = 1 << 4;
    }
}

impl TableAttributes {
    pub fn is_event_based(self) -> bool {
        self.contains(TableAttributes::EVENT_BASED)
    }

    /// Union of every attribute set in `attrs`.
    pub fn aggregate(attrs: impl IntoIterator<Item = TableAttributes>) -> TableAttributes {
        attrs
            .into_iter()
            .fold(TableAttributes::empty(), |acc, a| acc | a)
    }

    pub fn names(self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}
