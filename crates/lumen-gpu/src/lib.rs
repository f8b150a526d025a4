//! Vulkan abstraction layer for the Lumen renderer.
//!
//! This crate provides:
//! - Vulkan instance and device management
//! - Memory allocation via gpu-allocator
//! - Swapchain handling
//! - Render passes with imageless framebuffers
//! - Graphics pipeline, descriptor, and command buffer management

pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use command::CommandPool;
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{DescriptorBinding, DescriptorSet, DescriptorSetAllocator};
pub use error::{GpuError, Result};
pub use instance::QueueFamilies;
pub use memory::{GpuAllocator, GpuBuffer};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig, VertexLayout};
pub use render_pass::{AttachmentDesc, RenderPass};
pub use shader::{read_spirv, shader_path, ShaderStage};
pub use swapchain::Swapchain;
pub use sync::{create_fence, create_semaphore, FrameSync, GPU_TIMEOUT_NS};
