//! Unit tests for error.rs
//!
//! Tests Error variants, their Display output and the taxonomy predicates.

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkQueueSubmit failed"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("surface lost".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Initialization failed"));
    assert!(display.contains("surface lost"));
}

#[test]
fn test_missing_extension_display() {
    let err = Error::MissingExtension("VK_KHR_swapchain".to_string());
    assert_eq!(format!("{}", err), "Missing required extension: VK_KHR_swapchain");
}

#[test]
fn test_contract_violation_is_component_tagged() {
    let err = Error::contract("RenderPass", "no attachment with binding 7");
    assert_eq!(format!("{}", err), "[RenderPass] no attachment with binding 7");
}

#[test]
fn test_descriptor_pool_limit_display() {
    let err = Error::DescriptorPoolLimit { max_pools: 4 };
    assert!(format!("{}", err).contains("4 pools"));
}

// ============================================================================
// TAXONOMY
// ============================================================================

#[test]
fn test_pool_errors_are_transient() {
    assert!(Error::OutOfPoolMemory.is_transient());
    assert!(Error::FragmentedPool.is_transient());
}

#[test]
fn test_escalated_and_fatal_errors_are_not_transient() {
    assert!(!Error::DescriptorAllocationFailed("x".to_string()).is_transient());
    assert!(!Error::DescriptorPoolLimit { max_pools: 1 }.is_transient());
    assert!(!Error::OutOfMemory.is_transient());
    assert!(!Error::DeviceLost.is_transient());
}

#[test]
fn test_contract_violation_predicate() {
    assert!(Error::contract("Pipeline", "not initialized").is_contract_violation());
    assert!(!Error::BackendError("x".to_string()).is_contract_violation());
}

// ============================================================================
// TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_clone_and_eq() {
    let err = Error::contract("Swapchain", "bad index");
    assert_eq!(err.clone(), err);
}

#[test]
fn test_result_question_mark_propagation() {
    fn inner() -> Result<u32> {
        Err(Error::FragmentedPool)
    }
    fn outer() -> Result<u32> {
        let value = inner()?;
        Ok(value + 1)
    }

    assert_eq!(outer(), Err(Error::FragmentedPool));
}
