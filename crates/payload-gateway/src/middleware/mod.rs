//! Middleware stack for payload encryption.

pub mod encryption;
pub mod metrics;
pub mod policy;
pub mod session;

pub use encryption::{EncryptionLayer, EncryptionService};
pub use metrics::{EncryptionMetrics, MetricsSnapshot};
pub use policy::{InboundOutcome, OutboundOutcome, PolicyEngine};
pub use session::{
    resolve_session, RequestMetadata, ResolvedSession, ServerSession, SessionSource,
};
