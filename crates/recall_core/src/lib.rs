//! Recall watch core: pure change detection, routing and content rendering.
mod content;
mod diff;
mod filter;
mod fingerprint;
mod item;
mod recipient;
mod route;
mod run;

pub use content::{
    escape_html, truncate_text, ContentBuilder, ContentOptions, EmailContent, EmailMessage,
    DISTRIBUTEUR_LIMIT, MOTIF_LIMIT,
};
pub use diff::{detect_changes, ChangeSet};
pub use filter::{filter_by_distributeurs, matches_distributeurs};
pub use fingerprint::{fingerprint, Fingerprint};
pub use item::{split_distributeurs, DistributorInfo, FeedItem, Snapshot};
pub use recipient::{normalize_recipients, parse_address_list, RecipientConfig};
pub use route::{
    route, ContentSpec, EmailMode, RouteError, RoutePlan, RoutedRecipient, LATEST_COUNT,
};
pub use run::{
    Delivery, DeliveryMode, EnrichStats, FailureReason, RunCounts, RunError, RunResult,
    RunStage, SendPolicy,
};
