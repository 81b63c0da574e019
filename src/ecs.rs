//! Entity storage, tagging, physics bridging and the scene that drives systems over them.

pub mod physics;
pub mod store;
pub mod systems;
pub mod tags;
pub mod types;
pub mod world;

pub use physics::{ContactEvent, ContactKind, PhysicsWorld};
pub use store::{ComponentSet, ComponentStore};
pub use systems::{NativeScriptSystem, PhysicsSystem, RenderSystem, ScriptedObjectSystem, System, SystemRegistry};
pub use tags::TagIndex;
pub use types::*;
pub use world::{RemovalHook, Scene, SceneComponent, SceneWorld};
