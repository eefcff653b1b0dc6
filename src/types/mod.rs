// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod colour;
mod group;
mod id;

pub use colour::{Colour, ParseColourError};
pub use group::{DeploymentGroup, DeploymentGroupError};
pub use id::{AppId, DeploymentId, Id, TaskId};
