//! Error types for the Galaxy3D frame core
//!
//! Every fallible operation in the crate returns [`Result`]. The variants follow
//! three families:
//! - fatal setup errors (device selection, extensions, shader modules, memory),
//! - transient frame errors that the core recovers from locally
//!   (descriptor pool exhaustion / fragmentation),
//! - programmer contract violations, tagged with the component that detected them.

use std::fmt;

/// Result type for Galaxy3D frame operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D frame core errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),

    /// Out of GPU or host memory
    OutOfMemory,

    /// Invalid resource (handle, buffer, image, ...)
    InvalidResource(String),

    /// Initialization failed (device, swapchain, subsystems)
    InitializationFailed(String),

    /// No physical device satisfies the renderer's requirements
    NoSuitableDevice(String),

    /// A required instance or device extension is not available
    MissingExtension(String),

    /// Shader module could not be created from the provided SPIR-V
    ShaderModuleCreation(String),

    /// The logical device was lost
    DeviceLost,

    /// Descriptor pool has no room left for the requested set
    OutOfPoolMemory,

    /// Descriptor pool has room but is too fragmented to satisfy the request
    FragmentedPool,

    /// Descriptor allocation failed again after rotating to a fresh pool
    DescriptorAllocationFailed(String),

    /// The descriptor allocator reached its configured pool cap
    DescriptorPoolLimit {
        /// Configured maximum number of pools
        max_pools: usize,
    },

    /// The calling layer broke an API contract (bug in the caller)
    ContractViolation {
        /// Component that detected the violation (e.g. "RenderPass")
        component: &'static str,
        /// Description of the violation
        message: String,
    },
}

impl Error {
    /// Build a contract violation error for `component`
    pub fn contract(component: &'static str, message: impl Into<String>) -> Self {
        Error::ContractViolation {
            component,
            message: message.into(),
        }
    }

    /// Transient errors are recovered locally (pool rotation) and never reach the frame loop caller
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::OutOfPoolMemory | Error::FragmentedPool)
    }

    /// Whether this error reports a bug in the calling layer
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::ContractViolation { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::NoSuitableDevice(msg) => write!(f, "No suitable device: {}", msg),
            Error::MissingExtension(name) => write!(f, "Missing required extension: {}", name),
            Error::ShaderModuleCreation(msg) => write!(f, "Shader module creation failed: {}", msg),
            Error::DeviceLost => write!(f, "Device lost"),
            Error::OutOfPoolMemory => write!(f, "Descriptor pool out of memory"),
            Error::FragmentedPool => write!(f, "Descriptor pool fragmented"),
            Error::DescriptorAllocationFailed(msg) => {
                write!(f, "Descriptor allocation failed after pool rotation: {}", msg)
            }
            Error::DescriptorPoolLimit { max_pools } => {
                write!(f, "Descriptor pool limit reached ({} pools)", max_pools)
            }
            Error::ContractViolation { component, message } => {
                write!(f, "[{}] {}", component, message)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
