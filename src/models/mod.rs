pub mod pending_action;
pub mod route;
pub mod sync;

pub use pending_action::{ActionKind, Collection, PendingAction, PendingActionsQueue};
pub use route::{GeoPoint, LocationRef, OptimizeRouteRequest, OptimizeRouteResponse, Waypoint};
pub use sync::{DrainOutcome, DrainReport, SubmitOutcome, SyncSnapshot, SyncState};
