/// CommandBuffer - pooled native command buffer with an explicit state machine
///
/// `Idle -begin()-> Recording -end()-> Ended -submit()-> Submitted`
///
/// `begin()` and `end()` are no-ops when already in the matching state, so
/// callers may `submit()` unconditionally. `begin()` on an Ended or Submitted
/// buffer resets it and starts a new recording; the caller guarantees the
/// previous submission has completed (frame fence waited).

use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::device::{
    BufferHandle, CommandBufferHandle, CommandPoolHandle, DeviceContext, IndexType,
    PipelineStageFlags, QueueHandle, Rect2D, SemaphoreHandle, SubmitInfo, Viewport,
};
use crate::engine_contract;
use crate::error::Result;
use crate::resource::Buffer;
use crate::sync::{Fence, Semaphore};

/// Recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    Idle,
    Recording,
    Ended,
    Submitted,
}

/// Primary command buffer allocated from the owning thread's pool
pub struct CommandBuffer {
    ctx: Arc<DeviceContext>,
    pool: CommandPoolHandle,
    handle: CommandBufferHandle,
    queue: QueueHandle,
    state: CommandBufferState,
    owner: ThreadId,
}

impl CommandBuffer {
    /// Allocate a command buffer on the calling thread's pool
    ///
    /// # Arguments
    ///
    /// * `ctx` - Device context
    /// * `begin` - Start recording immediately
    pub fn new(ctx: Arc<DeviceContext>, begin: bool) -> Result<Self> {
        let pool = ctx.command_pool_for_current_thread()?;
        let handle = ctx.device().allocate_command_buffer(pool)?;
        let queue = ctx.graphics_queue();

        let mut cmd = Self {
            ctx,
            pool,
            handle,
            queue,
            state: CommandBufferState::Idle,
            owner: thread::current().id(),
        };
        if begin {
            cmd.begin()?;
        }
        Ok(cmd)
    }

    pub fn handle(&self) -> CommandBufferHandle {
        self.handle
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CommandBufferState::Recording
    }

    /// Start recording
    pub fn begin(&mut self) -> Result<()> {
        if thread::current().id() != self.owner {
            return Err(engine_contract!(
                "CommandBuffer",
                "begin() from a thread that does not own the command pool"
            ));
        }
        match self.state {
            CommandBufferState::Recording => return Ok(()),
            CommandBufferState::Idle => {}
            CommandBufferState::Ended | CommandBufferState::Submitted => {
                self.ctx.device().reset_command_buffer(self.handle)?;
            }
        }
        self.ctx.device().begin_command_buffer(self.handle)?;
        self.state = CommandBufferState::Recording;
        Ok(())
    }

    /// Stop recording
    pub fn end(&mut self) -> Result<()> {
        match self.state {
            CommandBufferState::Recording => {
                self.ctx.device().end_command_buffer(self.handle)?;
                self.state = CommandBufferState::Ended;
                Ok(())
            }
            CommandBufferState::Ended | CommandBufferState::Submitted => Ok(()),
            CommandBufferState::Idle => Err(engine_contract!(
                "CommandBuffer",
                "end() on a command buffer that was never begun"
            )),
        }
    }

    /// Submit to the graphics queue
    ///
    /// Ends recording if needed and resets `fence` before submission. The
    /// wait on `wait` happens at the color-attachment-output stage.
    pub fn submit(
        &mut self,
        fence: Option<&Fence>,
        wait: Option<&Semaphore>,
        signal: Option<&Semaphore>,
    ) -> Result<()> {
        match self.state {
            CommandBufferState::Recording if thread::current().id() != self.owner => {
                return Err(engine_contract!(
                    "CommandBuffer",
                    "submit() while still recording on another thread"
                ));
            }
            CommandBufferState::Idle => {
                return Err(engine_contract!("CommandBuffer", "submit() on a command buffer that was never begun"));
            }
            CommandBufferState::Submitted => {
                return Err(engine_contract!("CommandBuffer", "submit() twice without re-recording"));
            }
            CommandBufferState::Recording | CommandBufferState::Ended => {}
        }
        self.end()?;

        if let Some(fence) = fence {
            fence.reset()?;
        }

        let wait_semaphores: Vec<SemaphoreHandle> = wait.map(|s| s.handle()).into_iter().collect();
        let wait_stages = vec![PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semaphores.len()];
        let signal_semaphores: Vec<SemaphoreHandle> = signal.map(|s| s.handle()).into_iter().collect();

        self.ctx.device().queue_submit(
            self.queue,
            &SubmitInfo {
                command_buffers: &[self.handle],
                wait_semaphores: &wait_semaphores,
                wait_stages: &wait_stages,
                signal_semaphores: &signal_semaphores,
            },
            fence.map(|f| f.handle()),
        )?;

        self.state = CommandBufferState::Submitted;
        Ok(())
    }

    /// Submit and block until the queue drains
    ///
    /// For one-shot setup/upload work only; never on the per-frame path.
    pub fn submit_idle(&mut self) -> Result<()> {
        self.submit(None, None, None)?;
        self.ctx.device().queue_wait_idle(self.queue)?;
        self.state = CommandBufferState::Idle;
        self.ctx.device().reset_command_buffer(self.handle)
    }

    /// Handle of a buffer that is recording, or a contract violation naming `op`
    pub(crate) fn recording_handle(&self, op: &str) -> Result<CommandBufferHandle> {
        if self.state != CommandBufferState::Recording {
            return Err(engine_contract!(
                "CommandBuffer",
                "{}() while not recording (state {:?})",
                op,
                self.state
            ));
        }
        Ok(self.handle)
    }

    // ===== RECORDING HELPERS =====

    pub fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        let cmd = self.recording_handle("set_viewport")?;
        self.ctx.device().cmd_set_viewport(cmd, viewport);
        Ok(())
    }

    pub fn set_scissor(&mut self, scissor: &Rect2D) -> Result<()> {
        let cmd = self.recording_handle("set_scissor")?;
        self.ctx.device().cmd_set_scissor(cmd, scissor);
        Ok(())
    }

    pub fn bind_vertex_buffer(&mut self, binding: u32, buffer: &Buffer, offset: u64) -> Result<()> {
        let cmd = self.recording_handle("bind_vertex_buffer")?;
        let buffers: [BufferHandle; 1] = [buffer.handle()];
        self.ctx.device().cmd_bind_vertex_buffers(cmd, binding, &buffers, &[offset]);
        Ok(())
    }

    pub fn bind_index_buffer(&mut self, buffer: &Buffer, offset: u64, index_type: IndexType) -> Result<()> {
        let cmd = self.recording_handle("bind_index_buffer")?;
        self.ctx.device().cmd_bind_index_buffer(cmd, buffer.handle(), offset, index_type);
        Ok(())
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        let cmd = self.recording_handle("draw")?;
        self.ctx.device().cmd_draw(cmd, vertex_count, instance_count, first_vertex, first_instance);
        Ok(())
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        let cmd = self.recording_handle("draw_indexed")?;
        self.ctx.device().cmd_draw_indexed(cmd, index_count, instance_count, first_index, vertex_offset, first_instance);
        Ok(())
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        let cmd = self.recording_handle("dispatch")?;
        self.ctx.device().cmd_dispatch(cmd, x, y, z);
        Ok(())
    }

    /// Device context (for components recording through this buffer)
    pub(crate) fn ctx(&self) -> &Arc<DeviceContext> {
        &self.ctx
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        self.ctx.device().free_command_buffer(self.pool, self.handle);
    }
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;
