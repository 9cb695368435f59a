use glam::Vec4;
use lumen_core::errors::{LumenError, Result};
use lumen_resources::{MeshHandle, TextureHandle};

use crate::component::Component;

/// Draws a mesh with an optional albedo texture tinted by `base_color`.
#[derive(Clone, Debug)]
pub struct MeshRenderer {
    mesh: MeshHandle,
    albedo: Option<TextureHandle>,
    base_color: Vec4,
}

impl MeshRenderer {
    /// Fails if `mesh` is the invalid handle.
    pub fn new(mesh: MeshHandle, base_color: Vec4) -> Result<Self> {
        Self::check_mesh(mesh)?;
        Ok(Self {
            mesh,
            albedo: None,
            base_color,
        })
    }

    #[must_use]
    pub fn with_albedo(mut self, albedo: TextureHandle) -> Self {
        self.albedo = albedo.is_valid().then_some(albedo);
        self
    }

    fn check_mesh(mesh: MeshHandle) -> Result<()> {
        if mesh.is_valid() {
            Ok(())
        } else {
            Err(LumenError::invalid_argument("MeshRenderer mesh handle must be valid."))
        }
    }

    #[must_use]
    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    pub fn set_mesh(&mut self, mesh: MeshHandle) -> Result<()> {
        Self::check_mesh(mesh)?;
        self.mesh = mesh;
        Ok(())
    }

    #[must_use]
    pub fn albedo(&self) -> Option<TextureHandle> {
        self.albedo
    }

    pub fn set_albedo(&mut self, albedo: Option<TextureHandle>) {
        self.albedo = albedo.filter(|handle| handle.is_valid());
    }

    #[must_use]
    pub fn base_color(&self) -> Vec4 {
        self.base_color
    }

    pub fn set_base_color(&mut self, base_color: Vec4) {
        self.base_color = base_color;
    }
}

impl Component for MeshRenderer {}
