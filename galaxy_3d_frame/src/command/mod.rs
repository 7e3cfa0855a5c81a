/// Command module - command buffer recording and submission

pub mod command_buffer;

pub use command_buffer::*;
