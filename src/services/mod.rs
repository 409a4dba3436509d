pub mod clock;
pub mod quota_tracker;
pub mod entitlement;
pub mod completion;
pub mod payments;
pub mod settlement;
pub mod metrics;

pub use clock::*;
pub use quota_tracker::*;
pub use entitlement::*;
pub use completion::*;
pub use payments::*;
pub use settlement::*;
pub use metrics::*;
