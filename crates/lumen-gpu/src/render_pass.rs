//! Render pass and imageless framebuffer management.

use crate::error::Result;
use ash::vk;

/// Description of one color attachment.
///
/// `clear_value` is only consulted when `load_op` is `CLEAR`; attachments
/// without one contribute a default (zeroed) entry so clear-value indices
/// stay aligned with attachment indices.
#[derive(Clone, Copy)]
pub struct AttachmentDesc {
    pub format: vk::Format,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub clear_value: Option<vk::ClearValue>,
}

/// A render pass paired with an imageless framebuffer.
///
/// The framebuffer carries no image views; they are bound per recording
/// via `VkRenderPassAttachmentBeginInfo`, so a swapchain resize only
/// requires rebuilding this pair, never one framebuffer per image.
pub struct RenderPass {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    attachments: Vec<AttachmentDesc>,
}

impl RenderPass {
    /// Create the render pass and its imageless framebuffer.
    ///
    /// All attachments begin `UNDEFINED` and end `PRESENT_SRC_KHR`; the
    /// attachment targets are swapchain images.
    ///
    /// # Safety
    /// The device must be valid and imageless framebuffers enabled.
    pub unsafe fn new(
        device: &ash::Device,
        attachments: &[AttachmentDesc],
        extent: vk::Extent2D,
    ) -> Result<Self> {
        if attachments.is_empty() {
            return Err(crate::error::GpuError::InvalidState(
                "Render pass requires at least one attachment".to_string(),
            ));
        }

        let descriptions: Vec<vk::AttachmentDescription> = attachments
            .iter()
            .map(|a| {
                vk::AttachmentDescription::default()
                    .format(a.format)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(a.load_op)
                    .store_op(a.store_op)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            })
            .collect();

        let references: Vec<vk::AttachmentReference> = (0..attachments.len() as u32)
            .map(|i| {
                vk::AttachmentReference::default()
                    .attachment(i)
                    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            })
            .collect();

        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&references);

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&descriptions)
            .subpasses(std::slice::from_ref(&subpass));

        let render_pass = device.create_render_pass(&create_info, None)?;

        let framebuffer =
            match Self::create_framebuffer(device, render_pass, attachments, extent) {
                Ok(fb) => fb,
                Err(err) => {
                    device.destroy_render_pass(render_pass, None);
                    return Err(err);
                }
            };

        Ok(Self {
            render_pass,
            framebuffer,
            extent,
            attachments: attachments.to_vec(),
        })
    }

    unsafe fn create_framebuffer(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        attachments: &[AttachmentDesc],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let formats: Vec<[vk::Format; 1]> = attachments.iter().map(|a| [a.format]).collect();

        let image_infos: Vec<vk::FramebufferAttachmentImageInfo> = formats
            .iter()
            .map(|format| {
                vk::FramebufferAttachmentImageInfo::default()
                    .usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                    .width(extent.width)
                    .height(extent.height)
                    .layer_count(1)
                    .view_formats(format)
            })
            .collect();

        let mut attachments_info =
            vk::FramebufferAttachmentsCreateInfo::default().attachment_image_infos(&image_infos);

        let mut create_info = vk::FramebufferCreateInfo::default()
            .flags(vk::FramebufferCreateFlags::IMAGELESS)
            .render_pass(render_pass)
            .width(extent.width)
            .height(extent.height)
            .layers(1)
            .push_next(&mut attachments_info);
        // No view handles at creation time; only the count is declared.
        create_info.attachment_count = attachments.len() as u32;

        let framebuffer = device.create_framebuffer(&create_info, None)?;
        Ok(framebuffer)
    }

    /// Clear values in attachment order, defaulted where absent.
    pub fn clear_values(&self) -> Vec<vk::ClearValue> {
        self.attachments
            .iter()
            .map(|a| a.clear_value.unwrap_or_default())
            .collect()
    }

    /// Record a full pass: begin with the given image views bound, run `f`,
    /// end.
    ///
    /// `image_views` must match the attachment count and order.
    ///
    /// # Safety
    /// The device and command buffer must be valid and recording.
    pub unsafe fn execute<F>(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        image_views: &[vk::ImageView],
        f: F,
    ) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let clear_values = self.clear_values();

        let mut attachment_begin =
            vk::RenderPassAttachmentBeginInfo::default().attachments(image_views);

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .clear_values(&clear_values)
            .push_next(&mut attachment_begin);

        device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
        f(cmd);
        device.cmd_end_render_pass(cmd);

        Ok(())
    }

    /// Destroy the framebuffer and render pass.
    ///
    /// # Safety
    /// The device must be valid and no recording may reference this pass.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_framebuffer(self.framebuffer, None);
        device.destroy_render_pass(self.render_pass, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_values_align_with_attachments() {
        let clear = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.5, 0.7, 0.9, 1.0],
            },
        };
        let pass = RenderPass {
            render_pass: vk::RenderPass::null(),
            framebuffer: vk::Framebuffer::null(),
            extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            attachments: vec![
                AttachmentDesc {
                    format: vk::Format::B8G8R8A8_SRGB,
                    load_op: vk::AttachmentLoadOp::DONT_CARE,
                    store_op: vk::AttachmentStoreOp::STORE,
                    clear_value: None,
                },
                AttachmentDesc {
                    format: vk::Format::B8G8R8A8_SRGB,
                    load_op: vk::AttachmentLoadOp::CLEAR,
                    store_op: vk::AttachmentStoreOp::STORE,
                    clear_value: Some(clear),
                },
            ],
        };

        let values = pass.clear_values();
        assert_eq!(values.len(), 2);
        unsafe {
            assert_eq!(values[0].color.float32, [0.0; 4]);
            assert_eq!(values[1].color.float32, [0.5, 0.7, 0.9, 1.0]);
        }
    }
}
