/// SPIR-V reflection through spirq
///
/// Extracts the descriptor bindings and push constant blocks of a shader
/// stage so pipelines can derive their layouts without explicit declarations.

use std::io::Cursor;

use galaxy_3d_frame::galaxy3d::device::{
    DescriptorBinding, DescriptorType, ReflectedBinding, ReflectedPushConstant, ShaderReflection,
    ShaderStageFlags,
};
use galaxy_3d_frame::galaxy3d::Result;
use galaxy_3d_frame::{engine_bail, engine_err, engine_trace};

/// Decode SPIR-V bytes into words, checking the magic number and alignment
pub(crate) fn spirv_words(code: &[u8]) -> Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(code))
        .map_err(|e| engine_err!("galaxy3d::vulkan", "Invalid SPIR-V bytecode: {}", e))
}

/// Reflect the resource interface of one shader stage
pub fn reflect_spirv(code: &[u8], stage: ShaderStageFlags) -> Result<ShaderReflection> {
    let words = spirv_words(code)?;
    let entry_points = spirq::ReflectConfig::new()
        .spv(words.as_slice())
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("galaxy3d::vulkan", "SPIR-V reflection failed: {:?}", e))?;

    let mut reflection = ShaderReflection::default();

    for entry_point in &entry_points {
        let mut stage_reflection = ShaderReflection::default();
        for var in entry_point.vars.iter() {
            match var {
                spirq::var::Variable::Descriptor { name, desc_bind, desc_ty, nbind, .. } => {
                    let descriptor_type = descriptor_type_from_spirq(desc_ty)?;
                    stage_reflection.bindings.push(ReflectedBinding {
                        set: desc_bind.set(),
                        name: name.clone().unwrap_or_default(),
                        binding: DescriptorBinding {
                            binding: desc_bind.bind(),
                            descriptor_type,
                            // Runtime-sized arrays report 0
                            count: (*nbind).max(1),
                            stages: stage,
                        },
                    });
                }
                spirq::var::Variable::PushConstant { name, ty } => {
                    let Some(size) = ty.nbyte() else {
                        engine_bail!("galaxy3d::vulkan",
                            "Push constant block '{}' has no static size",
                            name.clone().unwrap_or_default());
                    };
                    stage_reflection.push_constants.push(ReflectedPushConstant {
                        name: name.clone().unwrap_or_default(),
                        size: size as u32,
                        stages: stage,
                    });
                }
                _ => {}
            }
        }
        reflection.merge(&stage_reflection);
    }

    engine_trace!("galaxy3d::vulkan",
        "Reflected {:?}: {} binding(s), {} push constant block(s)",
        stage, reflection.bindings.len(), reflection.push_constants.len());

    Ok(reflection)
}

/// Map a spirq descriptor type onto the core's descriptor types
fn descriptor_type_from_spirq(desc_ty: &spirq::ty::DescriptorType) -> Result<DescriptorType> {
    use spirq::ty::DescriptorType as Spirq;
    match desc_ty {
        Spirq::Sampler() => Ok(DescriptorType::Sampler),
        Spirq::CombinedImageSampler() => Ok(DescriptorType::CombinedImageSampler),
        Spirq::SampledImage() => Ok(DescriptorType::SampledImage),
        Spirq::StorageImage(..) => Ok(DescriptorType::StorageImage),
        Spirq::UniformBuffer() => Ok(DescriptorType::UniformBuffer),
        Spirq::StorageBuffer(..) => Ok(DescriptorType::StorageBuffer),
        Spirq::InputAttachment(..) => Ok(DescriptorType::InputAttachment),
        other => {
            engine_bail!("galaxy3d::vulkan", "Unsupported SPIR-V descriptor type: {:?}", other);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_reflection_tests.rs"]
mod tests;
