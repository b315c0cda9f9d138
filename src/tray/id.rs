//! Arena indices.
//!
//! Modules and queues live in flat vectors owned by the `Tray`; these
//! newtypes are the only way to refer to them. Module `i`'s inbox is always
//! queue `i`, so a wired outbox and the downstream inbox share one id.

use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Index into `Tray::modules`, in insertion order.
    ModuleId,
    "module"
);

arena_id!(
    /// Index into `Tray::queues`.
    QueueId,
    "queue"
);
