/// Pipeline trait and the pieces shared by graphics and compute pipelines

use std::sync::Arc;

use crate::command::CommandBuffer;
use crate::descriptor::{DescriptorLayoutCache, DescriptorSet};
use crate::device::{
    DescriptorBinding, DescriptorSetLayoutHandle, DeviceContext, PipelineBindPoint, PipelineHandle,
    PipelineLayoutDesc, PipelineLayoutHandle, ShaderModuleHandle, ShaderReflection, ShaderStageDesc,
    ShaderStageFlags,
};
use crate::engine_debug;
use crate::error::{Error, Result};
use crate::pipeline::PushConstants;

/// Where a pipeline is used: render pass index (in the renderer) and subpass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineStage {
    pub render_pass: usize,
    pub subpass: u32,
}

impl PipelineStage {
    pub fn new(render_pass: usize, subpass: u32) -> Self {
        Self { render_pass, subpass }
    }
}

/// Compiled SPIR-V for one stage, handed over as opaque bytes
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSource {
    pub stage: ShaderStageFlags,
    pub code: Vec<u8>,
    pub entry_point: String,
}

impl ShaderSource {
    /// Stage with the `main` entry point
    pub fn new(stage: ShaderStageFlags, code: Vec<u8>) -> Self {
        Self {
            stage,
            code,
            entry_point: "main".to_string(),
        }
    }
}

/// Native layout and pipeline, destroyed together
pub struct NativePipeline {
    ctx: Arc<DeviceContext>,
    pub(crate) layout: PipelineLayoutHandle,
    pub(crate) pipeline: PipelineHandle,
    pub(crate) set_layouts: Vec<DescriptorSetLayoutHandle>,
}

impl NativePipeline {
    pub fn layout(&self) -> PipelineLayoutHandle {
        self.layout
    }

    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline
    }

    pub fn set_layouts(&self) -> &[DescriptorSetLayoutHandle] {
        &self.set_layouts
    }
}

impl Drop for NativePipeline {
    fn drop(&mut self) {
        self.ctx.device().destroy_pipeline(self.pipeline);
        self.ctx.device().destroy_pipeline_layout(self.layout);
    }
}

/// Shader modules alive only while a pipeline is being created
struct ShaderModules {
    ctx: Arc<DeviceContext>,
    modules: Vec<ShaderModuleHandle>,
}

impl Drop for ShaderModules {
    fn drop(&mut self) {
        for module in self.modules.drain(..) {
            self.ctx.device().destroy_shader_module(module);
        }
    }
}

/// Build a native pipeline: modules, set layouts, layout, then `create`
///
/// Set layouts come from `explicit_sets` when given, else from the shaders'
/// reflection. Either way they go through `cache`.
pub(crate) fn build_native(
    ctx: Arc<DeviceContext>,
    cache: &mut DescriptorLayoutCache,
    shaders: &[ShaderSource],
    explicit_sets: &[Vec<DescriptorBinding>],
    push_constants: &PushConstants,
    create: impl FnOnce(&[ShaderStageDesc], PipelineLayoutHandle) -> Result<PipelineHandle>,
) -> Result<NativePipeline> {
    let device = ctx.device();

    let mut modules = ShaderModules {
        ctx: ctx.clone(),
        modules: Vec::with_capacity(shaders.len()),
    };
    let mut stages = Vec::with_capacity(shaders.len());
    for shader in shaders {
        let module = device.create_shader_module(&shader.code)?;
        modules.modules.push(module);
        stages.push(ShaderStageDesc {
            stage: shader.stage,
            module,
            entry_point: shader.entry_point.clone(),
        });
    }

    let set_bindings: Vec<Vec<DescriptorBinding>> = if explicit_sets.is_empty() {
        let mut reflection = ShaderReflection::default();
        for shader in shaders {
            reflection.merge(&device.reflect_shader(&shader.code, shader.stage)?);
        }
        (0..reflection.set_count()).map(|set| reflection.set_bindings(set)).collect()
    } else {
        explicit_sets.to_vec()
    };
    let set_layouts = set_bindings
        .iter()
        .map(|bindings| cache.create_descriptor_layout(bindings))
        .collect::<Result<Vec<_>>>()?;

    let layout = device.create_pipeline_layout(&PipelineLayoutDesc {
        set_layouts: set_layouts.clone(),
        push_constant_ranges: push_constants.ranges(),
    })?;

    let pipeline = match create(&stages, layout) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            device.destroy_pipeline_layout(layout);
            return Err(e);
        }
    };

    engine_debug!(
        "galaxy3d::Pipeline",
        "Created pipeline {:?}: {} stages, {} sets, {} push constant bytes",
        pipeline,
        stages.len(),
        set_layouts.len(),
        push_constants.total_size()
    );

    Ok(NativePipeline {
        ctx,
        layout,
        pipeline,
        set_layouts,
    })
}

/// Behavior shared by graphics and compute pipelines
pub trait Pipeline {
    fn bind_point(&self) -> PipelineBindPoint;

    /// Native objects, `None` until initialized
    fn native(&self) -> Option<&NativePipeline>;

    fn push_constants(&self) -> &PushConstants;

    fn is_initialized(&self) -> bool {
        self.native().is_some()
    }

    /// Native objects or a contract violation naming `op`
    fn require_native(&self, op: &str) -> Result<&NativePipeline> {
        self.native()
            .ok_or_else(|| Error::contract("Pipeline", format!("{}() on an uninitialized pipeline", op)))
    }

    /// Layout of descriptor set `set`
    fn set_layout(&self, set: u32) -> Result<DescriptorSetLayoutHandle> {
        let native = self.require_native("set_layout")?;
        native.set_layouts.get(set as usize).copied().ok_or_else(|| {
            Error::contract(
                "Pipeline",
                format!("set {} out of range ({} sets)", set, native.set_layouts.len()),
            )
        })
    }

    fn bind(&self, cmd: &mut CommandBuffer) -> Result<()> {
        let native = self.require_native("bind")?;
        let handle = cmd.recording_handle("Pipeline::bind")?;
        cmd.ctx().device().cmd_bind_pipeline(handle, self.bind_point(), native.pipeline);
        Ok(())
    }

    fn bind_descriptor_set(&self, cmd: &mut CommandBuffer, set: u32, descriptor_set: &DescriptorSet) -> Result<()> {
        let expected = self.set_layout(set)?;
        if descriptor_set.layout() != expected {
            return Err(Error::contract(
                "Pipeline",
                format!("descriptor set layout does not match set {} of the pipeline", set),
            ));
        }
        let native = self.require_native("bind_descriptor_set")?;
        let handle = cmd.recording_handle("Pipeline::bind_descriptor_set")?;
        cmd.ctx().device().cmd_bind_descriptor_sets(
            handle,
            self.bind_point(),
            native.layout,
            set,
            &[descriptor_set.handle()],
        );
        Ok(())
    }

    /// Upload `data` into the push constant block declared with `binding`
    fn set_push_constants(&self, cmd: &mut CommandBuffer, binding: u32, data: &[u8]) -> Result<()> {
        let native = self.require_native("set_push_constants")?;
        let block = self.push_constants().block(binding)?;
        if data.len() as u32 != block.size {
            return Err(Error::contract(
                "Pipeline",
                format!(
                    "push constant binding {} expects {} bytes, got {}",
                    binding,
                    block.size,
                    data.len()
                ),
            ));
        }
        let handle = cmd.recording_handle("Pipeline::set_push_constants")?;
        cmd.ctx()
            .device()
            .cmd_push_constants(handle, native.layout, block.stages, block.offset, data);
        Ok(())
    }
}
