/// GraphicsPipeline - rasterization pipeline bound to one render pass subpass

use std::sync::Arc;

use crate::descriptor::DescriptorLayoutCache;
use crate::device::{
    BlendMode, CullMode, DepthMode, DescriptorBinding, DeviceContext, FrontFace,
    GraphicsPipelineState, PipelineBindPoint, PolygonMode, PrimitiveTopology, ShaderStageFlags,
    VertexInputLayout,
};
use crate::error::{Error, Result};
use crate::pipeline::{build_native, NativePipeline, Pipeline, PipelineStage, PushConstants, ShaderSource};
use crate::render_graph::RenderPass;
use crate::{engine_contract, engine_warn};

/// Graphics pipeline description
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDesc {
    pub shaders: Vec<ShaderSource>,
    pub vertex_input: VertexInputLayout,
    pub topology: PrimitiveTopology,
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth: DepthMode,
    pub blend: BlendMode,
    /// Explicit set layouts indexed by set; empty = reflect from the shaders
    pub set_layouts: Vec<Vec<DescriptorBinding>>,
}

impl GraphicsPipelineDesc {
    /// Opaque, back-face culled triangle lists with depth read/write
    pub fn new(shaders: Vec<ShaderSource>) -> Self {
        Self {
            shaders,
            vertex_input: VertexInputLayout::default(),
            topology: PrimitiveTopology::TriangleList,
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            depth: DepthMode::ReadWrite,
            blend: BlendMode::Opaque,
            set_layouts: Vec::new(),
        }
    }
}

/// Graphics pipeline
pub struct GraphicsPipeline {
    stage: PipelineStage,
    desc: GraphicsPipelineDesc,
    push_constants: PushConstants,
    native: Option<NativePipeline>,
}

impl GraphicsPipeline {
    pub fn new(stage: PipelineStage, desc: GraphicsPipelineDesc) -> Self {
        Self {
            stage,
            desc,
            push_constants: PushConstants::new(),
            native: None,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn desc(&self) -> &GraphicsPipelineDesc {
        &self.desc
    }

    /// Declare a push constant block; only allowed before `initialize`
    pub fn add_push_constants(&mut self, binding: u32, size: u32, stages: ShaderStageFlags) -> Result<()> {
        if self.native.is_some() {
            return Err(engine_contract!(
                "Pipeline",
                "add_push_constants() after initialize(); the layout is frozen"
            ));
        }
        self.push_constants.add(binding, size, stages)
    }

    /// Create the native pipeline for `render_pass`, subpass `stage().subpass`
    pub fn initialize(
        &mut self,
        ctx: Arc<DeviceContext>,
        cache: &mut DescriptorLayoutCache,
        render_pass: &RenderPass,
    ) -> Result<()> {
        if self.native.is_some() {
            return Err(engine_contract!("Pipeline", "initialize() on an initialized pipeline"));
        }
        let subpass = self.stage.subpass;
        if subpass as usize >= render_pass.subpasses().len() {
            return Err(Error::contract(
                "Pipeline",
                format!(
                    "subpass {} out of range ({} subpasses)",
                    subpass,
                    render_pass.subpasses().len()
                ),
            ));
        }
        let render_pass_handle = render_pass.handle()?;

        let mut depth = self.desc.depth;
        if depth != DepthMode::None && !render_pass.subpass_has_depth(subpass) {
            engine_warn!(
                "galaxy3d::Pipeline",
                "Subpass {} has no depth attachment; depth {:?} disabled",
                subpass,
                depth
            );
            depth = DepthMode::None;
        }
        let color_attachment_count = render_pass.color_attachment_count(subpass);
        let desc = &self.desc;
        let device_ctx = ctx.clone();

        let native = build_native(
            ctx,
            cache,
            &desc.shaders,
            &desc.set_layouts,
            &self.push_constants,
            |stages, layout| {
                device_ctx.device().create_graphics_pipeline(&GraphicsPipelineState {
                    stages: stages.to_vec(),
                    vertex_input: desc.vertex_input.clone(),
                    topology: desc.topology,
                    polygon_mode: desc.polygon_mode,
                    cull_mode: desc.cull_mode,
                    front_face: desc.front_face,
                    depth,
                    blend: desc.blend,
                    samples: 1,
                    layout,
                    render_pass: render_pass_handle,
                    subpass,
                    color_attachment_count,
                })
            },
        )?;
        self.native = Some(native);
        Ok(())
    }

    /// Destroy the native objects; the description and push constants stay
    pub fn cleanup(&mut self) {
        self.native = None;
    }
}

impl Pipeline for GraphicsPipeline {
    fn bind_point(&self) -> PipelineBindPoint {
        PipelineBindPoint::Graphics
    }

    fn native(&self) -> Option<&NativePipeline> {
        self.native.as_ref()
    }

    fn push_constants(&self) -> &PushConstants {
        &self.push_constants
    }
}

#[cfg(test)]
#[path = "graphics_tests.rs"]
mod tests;
