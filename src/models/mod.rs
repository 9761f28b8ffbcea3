//! Domain models for the feed metadata layer.
//!
//! # Core Concepts
//!
//! - [`Node`]: An addressable entry in the metadata graph. Every entity (feed,
//!   category, SLA, ...) is a node of some [`NodeType`].
//! - [`Property`], [`Reference`], [`SetProperty`]: Typed property descriptors.
//!   Entity views declare their properties as constants of these types.
//! - [`FeedState`], [`ScheduleStrategy`]: Scalar feed settings.
//! - [`UserFieldDescriptor`]: Shape of the free-form user properties on a feed.
//!
//! The `Create*Input` types carry what is needed to provision each entity kind.

mod category;
mod datasource;
mod feed;
mod node;
mod sla;
mod user_field;

pub use category::*;
pub use datasource::*;
pub use feed::*;
pub use node::*;
pub use sla::*;
pub use user_field::*;
