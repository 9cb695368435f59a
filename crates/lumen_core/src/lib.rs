//! Core building blocks shared by every Lumen crate: identities, errors, the
//! event bus, log targets, lexical path handling and the consumed GPU surface.

pub mod errors;
pub mod event;
pub mod ids;
pub mod logging;
pub mod paths;
pub mod rhi;

pub use errors::{LumenError, Result, ResultExt};
pub use event::{Event, HandlerResult, SubscriptionToken, TypedEventCenter};
pub use ids::{GameObjectId, IdAllocator, SceneId, VIRTUAL_ROOT_ID, WorldId};
