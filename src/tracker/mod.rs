//! Call, resource, and state recording with typed parameter capture.

pub mod state;
pub mod value;

pub use state::{
    ActiveResource, CallScope, MethodCall, ResourceEvent, ResourceEventKind, StateTracker,
    StateTransition, TrackerStatistics,
};
pub use value::{FromValue, Value};
