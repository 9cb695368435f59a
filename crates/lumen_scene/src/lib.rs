//! Scene layer of the Lumen engine.
//!
//! - [`SceneGraph`]: id-keyed transform hierarchy with lazy dirty propagation
//! - [`Scene`] / [`GameObject`] / [`Component`]: entities and their behavior
//! - [`CameraManager`] / [`Camera`]: per-scene cameras with one active camera
//! - [`World`]: the scenes and the active one
//! - [`controllers`]: input-driven camera controllers

pub mod camera;
pub mod camera_manager;
pub mod component;
pub mod components;
pub mod controllers;
pub mod game_object;
pub mod graph;
pub mod input;
pub mod node;
pub mod scene;
pub mod tick;
pub mod transform;
pub mod world;

pub use camera::{Camera, OrthographicProjection, PerspectiveProjection, Projection};
pub use camera_manager::CameraManager;
pub use component::{Component, ComponentContext};
pub use components::{MeshRenderer, PbptLight, PbptMesh, PbptSpectrum, PbptSpectrumPoint, PointLight};
pub use game_object::GameObject;
pub use graph::{NodeSnapshot, SceneGraph, SceneGraphSnapshot};
pub use input::{InputState, Key, MouseButton, SharedInput};
pub use node::{NodeMut, NodeRef};
pub use scene::Scene;
pub use tick::{FixedTickContext, FrameTickContext};
pub use transform::LocalTransform;
pub use world::World;
