//! Unit tests for vulkan_reflection.rs

use super::*;

/// Minimal compute shader without any resource: `void main() {}`
fn empty_compute_module() -> Vec<u8> {
    let words: [u32; 31] = [
        // Header: magic, version 1.0, generator, bound, schema
        0x0723_0203, 0x0001_0000, 0, 5, 0,
        // OpCapability Shader
        (2 << 16) | 17, 1,
        // OpMemoryModel Logical GLSL450
        (3 << 16) | 14, 0, 1,
        // OpEntryPoint GLCompute %1 "main"
        (5 << 16) | 15, 5, 1, 0x6e69_616d, 0,
        // OpExecutionMode %1 LocalSize 1 1 1
        (6 << 16) | 16, 1, 17, 1, 1, 1,
        // %2 = OpTypeVoid
        (2 << 16) | 19, 2,
        // %3 = OpTypeFunction %2
        (3 << 16) | 33, 3, 2,
        // %1 = OpFunction %2 None %3
        (5 << 16) | 54, 2, 1, 0, 3,
    ];
    let tail: [u32; 4] = [
        // %4 = OpLabel
        (2 << 16) | 248, 4,
        // OpReturn, OpFunctionEnd
        (1 << 16) | 253,
        (1 << 16) | 56,
    ];
    words.iter().chain(tail.iter()).flat_map(|w| w.to_le_bytes()).collect()
}

#[test]
fn test_spirv_words_rejects_misaligned_code() {
    assert!(spirv_words(&[0x03, 0x02, 0x23]).is_err());
}

#[test]
fn test_spirv_words_decodes_little_endian() {
    let module = empty_compute_module();
    let words = spirv_words(&module).unwrap();
    assert_eq!(words[0], 0x0723_0203);
    assert_eq!(words.len(), module.len() / 4);
}

#[test]
fn test_reflect_rejects_garbage() {
    let garbage = vec![0xAB_u8; 64];
    assert!(reflect_spirv(&garbage, ShaderStageFlags::VERTEX).is_err());
}

#[test]
fn test_reflect_module_without_resources() {
    let reflection = reflect_spirv(&empty_compute_module(), ShaderStageFlags::COMPUTE).unwrap();
    assert!(reflection.bindings.is_empty());
    assert!(reflection.push_constants.is_empty());
    assert_eq!(reflection.set_count(), 0);
}
