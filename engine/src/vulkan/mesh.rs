use std::mem::{offset_of, size_of};
use std::ptr::copy_nonoverlapping as memcpy;

use anyhow::{anyhow, Context, Result};
use thiserror::Error;
use vulkanalia::{
    vk::{self, DeviceV1_0, Handle, HasBuilder},
    Device, Instance,
};

use super::buffer::VulkanBuffer;
use crate::Mat4;

type Vec2 = nalgebra::Vector2<f32>;
type Vec3 = nalgebra::Vector3<f32>;

#[derive(Debug, Error)]
#[error("Model {0} does not exist.")]
pub struct ModelNotFound(pub usize);

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    pub pos: Vec3,
    pub col: Vec3,
    pub tex: Vec2,
}

impl Vertex {
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        let pos = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(offset_of!(Vertex, pos) as u32)
            .build();
        let col = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(1)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(offset_of!(Vertex, col) as u32)
            .build();
        let tex = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(2)
            .format(vk::Format::R32G32_SFLOAT)
            .offset(offset_of!(Vertex, tex) as u32)
            .build();
        [pos, col, tex]
    }
}

/// Geometry for one draw call, resident in device-local memory.
///
/// Buffers are created through a staged upload and released explicitly;
/// `destroy_buffers` nulls its handles so a repeated call is a no-op.
#[derive(Debug)]
pub struct Mesh {
    transform: Mat4,
    tex_id: usize,
    vertex_count: usize,
    index_count: usize,
    vertex_buffer: vk::Buffer,
    vertex_buffer_memory: vk::DeviceMemory,
    index_buffer: vk::Buffer,
    index_buffer_memory: vk::DeviceMemory,
}

impl Mesh {
    pub unsafe fn new(
        instance: &Instance,
        device: &Device,
        physical_device: vk::PhysicalDevice,
        transfer_queue: vk::Queue,
        transfer_command_pool: vk::CommandPool,
        vertices: &[Vertex],
        indices: &[u32],
        tex_id: usize,
    ) -> Result<Mesh> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(anyhow!("Mesh has no geometry."));
        }

        let (vertex_buffer, vertex_buffer_memory) = Mesh::create_device_local_buffer(
            instance,
            device,
            physical_device,
            transfer_queue,
            transfer_command_pool,
            vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let (index_buffer, index_buffer_memory) = Mesh::create_device_local_buffer(
            instance,
            device,
            physical_device,
            transfer_queue,
            transfer_command_pool,
            indices,
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        Ok(Mesh {
            transform: Mat4::identity(),
            tex_id,
            vertex_count: vertices.len(),
            index_count: indices.len(),
            vertex_buffer,
            vertex_buffer_memory,
            index_buffer,
            index_buffer_memory,
        })
    }

    /// Stages `data` through a host-visible buffer into a device-local one
    /// tagged with `usage`. Blocks until the copy has drained so the staging
    /// pair can be freed before returning.
    unsafe fn create_device_local_buffer<T>(
        instance: &Instance,
        device: &Device,
        physical_device: vk::PhysicalDevice,
        transfer_queue: vk::Queue,
        transfer_command_pool: vk::CommandPool,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        let size = (size_of::<T>() * data.len()) as vk::DeviceSize;

        let (staging_buffer, staging_buffer_memory) = VulkanBuffer::create_buffer(
            instance,
            device,
            physical_device,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        // Coherent memory needs no explicit flush after the copy.
        let memory =
            device.map_memory(staging_buffer_memory, 0, size, vk::MemoryMapFlags::empty())?;
        memcpy(data.as_ptr(), memory.cast(), data.len());
        device.unmap_memory(staging_buffer_memory);

        let (buffer, buffer_memory) = VulkanBuffer::create_buffer(
            instance,
            device,
            physical_device,
            size,
            vk::BufferUsageFlags::TRANSFER_DST | usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        VulkanBuffer::copy_buffer(
            device,
            transfer_command_pool,
            transfer_queue,
            staging_buffer,
            buffer,
            size,
        )?;

        device.destroy_buffer(staging_buffer, None);
        device.free_memory(staging_buffer_memory, None);

        Ok((buffer, buffer_memory))
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub fn tex_id(&self) -> usize {
        self.tex_id
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn index_count(&self) -> usize {
        self.index_count
    }

    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer
    }

    pub unsafe fn destroy_buffers(&mut self, device: &Device) {
        if self.vertex_buffer.is_null() && self.index_buffer.is_null() {
            return;
        }

        device.destroy_buffer(self.vertex_buffer, None);
        device.free_memory(self.vertex_buffer_memory, None);
        device.destroy_buffer(self.index_buffer, None);
        device.free_memory(self.index_buffer_memory, None);

        self.vertex_buffer = vk::Buffer::null();
        self.vertex_buffer_memory = vk::DeviceMemory::null();
        self.index_buffer = vk::Buffer::null();
        self.index_buffer_memory = vk::DeviceMemory::null();
    }
}

/// An ordered group of meshes sharing one transform, loaded from a single
/// model file and destroyed as a unit.
#[derive(Debug)]
pub struct MeshModel {
    meshes: Vec<Mesh>,
    transform: Mat4,
}

impl Default for MeshModel {
    fn default() -> Self {
        Self {
            meshes: Vec::new(),
            transform: Mat4::identity(),
        }
    }
}

impl MeshModel {
    pub fn new(meshes: Vec<Mesh>) -> Self {
        Self {
            meshes,
            transform: Mat4::identity(),
        }
    }

    pub fn load_obj(path: &str) -> Result<(Vec<tobj::Model>, Vec<tobj::Material>)> {
        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .with_context(|| format!("Failed to load model file {}", path))?;

        // A missing material table just means no textures to resolve.
        Ok((models, materials.unwrap_or_default()))
    }

    /// Diffuse texture file per material, stripped of directory prefixes.
    pub fn load_materials(materials: &[tobj::Material]) -> Vec<Option<String>> {
        materials
            .iter()
            .map(|m| texture_file_name(m.diffuse_texture.as_deref()))
            .collect()
    }

    pub unsafe fn load_meshes(
        instance: &Instance,
        device: &Device,
        physical_device: vk::PhysicalDevice,
        transfer_queue: vk::Queue,
        transfer_command_pool: vk::CommandPool,
        models: &[tobj::Model],
        mat_to_tex: &[usize],
    ) -> Result<Vec<Mesh>> {
        let mut meshes = Vec::with_capacity(models.len());
        for model in models {
            let vertices = flatten_vertices(&model.mesh.positions, &model.mesh.texcoords);
            let tex_id = resolve_texture_id(model.mesh.material_id, mat_to_tex);

            meshes.push(Mesh::new(
                instance,
                device,
                physical_device,
                transfer_queue,
                transfer_command_pool,
                &vertices,
                &model.mesh.indices,
                tex_id,
            )?);
        }

        Ok(meshes)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn mesh(&self, index: usize) -> Option<&Mesh> {
        self.meshes.get(index)
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        for mesh in &mut self.meshes {
            mesh.destroy_buffers(device);
        }
        self.meshes.clear();
    }
}

/// Positions come through as-is; texture coordinates default to the origin
/// when absent and are V-flipped for Vulkan; color is fixed white.
pub(crate) fn flatten_vertices(positions: &[f32], texcoords: &[f32]) -> Vec<Vertex> {
    let vertex_count = positions.len() / 3;
    let mut vertices = Vec::with_capacity(vertex_count);

    for i in 0..vertex_count {
        let pos = Vec3::new(positions[3 * i], positions[3 * i + 1], positions[3 * i + 2]);
        let tex = if texcoords.len() >= 2 * (i + 1) {
            Vec2::new(texcoords[2 * i], 1.0 - texcoords[2 * i + 1])
        } else {
            Vec2::new(0.0, 0.0)
        };

        vertices.push(Vertex {
            pos,
            col: Vec3::new(1.0, 1.0, 1.0),
            tex,
        });
    }

    vertices
}

/// Materials without a usable entry fall back to the default texture.
pub(crate) fn resolve_texture_id(material_id: Option<usize>, mat_to_tex: &[usize]) -> usize {
    material_id
        .and_then(|i| mat_to_tex.get(i).copied())
        .unwrap_or(0)
}

pub(crate) fn texture_file_name(diffuse_texture: Option<&str>) -> Option<String> {
    diffuse_texture
        .filter(|name| !name.is_empty())
        .map(|name| strip_directory(name).to_string())
}

pub(crate) fn strip_directory(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_attributes_cover_position_color_and_uv() {
        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, size_of::<Vec3>() as u32);
        assert_eq!(attributes[2].offset, (2 * size_of::<Vec3>()) as u32);
        assert_eq!(
            Vertex::binding_description().stride,
            size_of::<Vertex>() as u32
        );
    }

    #[test]
    fn flatten_preserves_vertex_count() {
        let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let texcoords = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        let vertices = flatten_vertices(&positions, &texcoords);
        assert_eq!(vertices.len(), 3);
        assert_eq!(vertices[1].pos, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(vertices[2].tex, Vec2::new(0.0, 0.0));
    }

    #[test]
    fn flatten_defaults_missing_uvs_and_fixes_color() {
        let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let vertices = flatten_vertices(&positions, &[]);
        for vertex in &vertices {
            assert_eq!(vertex.tex, Vec2::new(0.0, 0.0));
            assert_eq!(vertex.col, Vec3::new(1.0, 1.0, 1.0));
        }
    }

    #[test]
    fn untextured_materials_resolve_to_default_texture() {
        assert_eq!(resolve_texture_id(None, &[3, 4]), 0);
        assert_eq!(resolve_texture_id(Some(5), &[3, 4]), 0);
        assert_eq!(resolve_texture_id(Some(1), &[3, 4]), 4);
    }

    #[test]
    fn texture_file_names_lose_directory_prefixes() {
        assert_eq!(strip_directory("textures/brick.png"), "brick.png");
        assert_eq!(strip_directory(r"C:\assets\brick.png"), "brick.png");
        assert_eq!(strip_directory("brick.png"), "brick.png");

        assert_eq!(
            texture_file_name(Some("a/b/brick.png")),
            Some("brick.png".to_string())
        );
        assert_eq!(texture_file_name(Some("")), None);
        assert_eq!(texture_file_name(None), None);
    }

    #[test]
    fn model_transform_defaults_to_identity() {
        let model = MeshModel::default();
        assert_eq!(model.transform(), Mat4::identity());
        assert_eq!(model.mesh_count(), 0);
        assert!(model.mesh(0).is_none());
    }
}
