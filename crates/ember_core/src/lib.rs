//! # EMBER Core Engine
//!
//! Sparse-set Entity Component System:
//! - O(1) membership through paged sparse sets
//! - O(1) swap-based removal from dense arrays
//! - Cached groups kept valid incrementally under component churn
//!
//! ## Architecture Rules
//!
//! 1. **Single-threaded** - one owner (the frame loop) drives the [`Registry`]
//! 2. **Data-oriented design** - components live in contiguous dense arrays
//! 3. **No references across mutation** - borrows of a pool never outlive a
//!    mutating registry call
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember_core::{Component, Registry};
//!
//! struct Position(f32, f32);
//! impl Component for Position {}
//!
//! let mut registry = Registry::new();
//! let entity = registry.create();
//! registry.emplace(entity, Position(1.0, 2.0))?;
//!
//! registry.view::<(Position,)>().each(|_, position| position.0 += 1.0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::RegistryConfig;
pub use ecs::{
    AnyPool, Component, ComponentId, ComponentIndex, ComponentInfo, ComponentSet, EntityId,
    EntityLike, GroupHandle, GroupSignature, GroupView, ListenerId, Null, Registry, Signal,
    SignalKind, Sink, SparseSet, Storage, View, DEFAULT_PAGE_SIZE,
};
pub use error::{EcsError, EcsResult};
