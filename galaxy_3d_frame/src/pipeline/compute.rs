/// ComputePipeline - single compute stage plus dispatch

use std::sync::Arc;

use crate::command::CommandBuffer;
use crate::descriptor::DescriptorLayoutCache;
use crate::device::{ComputePipelineState, DescriptorBinding, DeviceContext, PipelineBindPoint, ShaderStageFlags};
use crate::engine_contract;
use crate::error::Result;
use crate::pipeline::{build_native, NativePipeline, Pipeline, PushConstants, ShaderSource};

/// Compute pipeline
pub struct ComputePipeline {
    shader: ShaderSource,
    /// Explicit set layouts; empty = reflect from the shader
    set_layouts: Vec<Vec<DescriptorBinding>>,
    push_constants: PushConstants,
    native: Option<NativePipeline>,
}

impl ComputePipeline {
    pub fn new(shader: ShaderSource, set_layouts: Vec<Vec<DescriptorBinding>>) -> Self {
        Self {
            shader,
            set_layouts,
            push_constants: PushConstants::new(),
            native: None,
        }
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

    pub fn initialize(&mut self, ctx: Arc<DeviceContext>, cache: &mut DescriptorLayoutCache) -> Result<()> {
        if self.native.is_some() {
            return Err(engine_contract!("Pipeline", "initialize() on an initialized pipeline"));
        }
        let device_ctx = ctx.clone();
        let native = build_native(
            ctx,
            cache,
            std::slice::from_ref(&self.shader),
            &self.set_layouts,
            &self.push_constants,
            |stages, layout| {
                device_ctx.device().create_compute_pipeline(&ComputePipelineState {
                    stage: stages[0].clone(),
                    layout,
                })
            },
        )?;
        self.native = Some(native);
        Ok(())
    }

    /// Record a dispatch of `x * y * z` workgroups
    pub fn dispatch(&self, cmd: &mut CommandBuffer, x: u32, y: u32, z: u32) -> Result<()> {
        self.require_native("dispatch")?;
        cmd.dispatch(x, y, z)
    }

    pub fn cleanup(&mut self) {
        self.native = None;
    }
}

impl Pipeline for ComputePipeline {
    fn bind_point(&self) -> PipelineBindPoint {
        PipelineBindPoint::Compute
    }

    fn native(&self) -> Option<&NativePipeline> {
        self.native.as_ref()
    }

    fn push_constants(&self) -> &PushConstants {
        &self.push_constants
    }
}

#[cfg(test)]
#[path = "compute_tests.rs"]
mod tests;
