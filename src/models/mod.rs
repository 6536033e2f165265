pub mod enums;
pub mod extraction;
pub mod inventory;
pub mod order;
pub mod queue_entry;

pub use enums::{ItemKind, OrderStatus, Role};
pub use extraction::{ExtractedLineItem, MatchResult, Shortage};
pub use inventory::{InventoryItem, NewInventoryItem};
pub use order::{Order, OrderItem, OrderReceipt};
pub use queue_entry::{QueueEntry, QueueItem, QueueListing};
