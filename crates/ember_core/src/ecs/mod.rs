//! # Entity Component System
//!
//! A sparse-set ECS with two query mechanisms.
//!
//! ## Design Philosophy
//!
//! - Entity IDs are plain slot indices, recycled LIFO
//! - Every component type gets its own pool: a paged sparse set plus a
//!   dense value array kept in lockstep
//! - [`View`]s are rebuilt per call and drive iteration from the smallest pool
//! - Groups are cached; owning groups repartition their pools in place so
//!   iteration needs no per-element lookup

mod component;
mod entity;
mod group;
mod registry;
mod signal;
mod sparse_set;
mod storage;
mod view;

pub use component::{Component, ComponentId, ComponentIndex, ComponentInfo, ComponentSet};
pub use entity::{EntityId, EntityLike, Null};
pub use group::{GroupHandle, GroupSignature, GroupView};
pub use registry::Registry;
pub use signal::{ListenerId, Signal, SignalKind, Sink};
pub use sparse_set::{SparseSet, DEFAULT_PAGE_SIZE};
pub use storage::{AnyPool, Storage};
pub use view::View;
