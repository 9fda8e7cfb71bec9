pub mod coordinator;

pub use coordinator::{BatchCoordinator, BatchReport, PublishUnpersisted};
