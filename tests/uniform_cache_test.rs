use kiln_ngin::GpuDevice;
use kiln_ngin::gpu::ShaderSources;
use kiln_ngin::gpu::headless::{DeviceCall, HeadlessDevice};
use kiln_ngin::uniforms::{UniformCache, UniformUpload, UniformValue};

use crate::common::test_utils::{BASIC_FS, BASIC_VS};

mod common;

fn uploads(device: &HeadlessDevice) -> usize {
    device
        .calls()
        .iter()
        .filter(|call| matches!(call, DeviceCall::Uniform { .. }))
        .count()
}

#[test]
fn identical_values_are_uploaded_once() {
    let device = HeadlessDevice::new();
    let program = device
        .create_program(&ShaderSources::new(BASIC_VS, BASIC_FS), "basic")
        .unwrap();
    device.use_program(program);
    let mut cache = UniformCache::new();

    let time = UniformValue::Float(1.5);
    assert_eq!(cache.apply(&device, program, "u_time", &time), UniformUpload::Uploaded);
    assert_eq!(cache.apply(&device, program, "u_time", &time), UniformUpload::Unchanged);
    assert_eq!(uploads(&device), 1);

    let later = UniformValue::Float(2.5);
    assert_eq!(cache.apply(&device, program, "u_time", &later), UniformUpload::Uploaded);
    assert_eq!(uploads(&device), 2);
    assert_eq!(cache.cached(program, "u_time"), Some(&later));
    assert_eq!(cache.stats().uploads, 2);
    assert_eq!(cache.stats().skipped, 1);
}

#[test]
fn a_changed_variant_counts_as_a_change() {
    let device = HeadlessDevice::new();
    let program = device
        .create_program(&ShaderSources::new(BASIC_VS, BASIC_FS), "basic")
        .unwrap();
    device.use_program(program);
    let mut cache = UniformCache::new();

    cache.apply(&device, program, "u_color", &UniformValue::Vec4([1.0, 1.0, 1.0, 1.0]));
    let upload = cache.apply(&device, program, "u_color", &UniformValue::Vec3([1.0, 1.0, 1.0]));
    assert_eq!(upload, UniformUpload::Uploaded);
}

#[test]
fn unknown_names_are_skipped_silently() {
    let device = HeadlessDevice::new();
    let program = device
        .create_program(&ShaderSources::new(BASIC_VS, BASIC_FS), "basic")
        .unwrap();
    device.use_program(program);
    let mut cache = UniformCache::new();

    let value = UniformValue::Int(3);
    assert_eq!(cache.apply(&device, program, "u_missing", &value), UniformUpload::Absent);
    assert_eq!(cache.apply(&device, program, "u_missing", &value), UniformUpload::Absent);
    assert_eq!(uploads(&device), 0);
    assert_eq!(cache.cached(program, "u_missing"), None);
}

#[test]
fn values_are_tracked_per_program() {
    let device = HeadlessDevice::new();
    let sources = ShaderSources::new(BASIC_VS, BASIC_FS);
    let first = device.create_program(&sources, "first").unwrap();
    let second = device.create_program(&sources, "second").unwrap();
    let mut cache = UniformCache::new();
    let value = UniformValue::Float(1.0);

    device.use_program(first);
    cache.apply(&device, first, "u_time", &value);
    device.use_program(second);
    assert_eq!(cache.apply(&device, second, "u_time", &value), UniformUpload::Uploaded);
    assert_eq!(device.uniform_value(second, "u_time"), Some(value));
}

#[test]
fn invalidation_forces_the_next_upload() {
    let device = HeadlessDevice::new();
    let program = device
        .create_program(&ShaderSources::new(BASIC_VS, BASIC_FS), "basic")
        .unwrap();
    device.use_program(program);
    let mut cache = UniformCache::new();
    let value = UniformValue::IntArray(vec![0, 1]);

    cache.apply(&device, program, "u_time", &value);
    cache.invalidate(program);
    assert_eq!(cache.apply(&device, program, "u_time", &value), UniformUpload::Uploaded);

    cache.clear();
    assert_eq!(cache.cached(program, "u_time"), None);
}
