use kiln_ngin::components::material::SamplerBinding;
use kiln_ngin::components::{DrawContext, Material};
use kiln_ngin::uniforms::{UniformCache, UniformValue};
use kiln_ngin::{Color, GpuDevice};

use crate::common::test_utils::{Harness, MockFetcher};

mod common;

fn harness() -> Harness {
    Harness::new(
        MockFetcher::new()
            .with_shader("shaders/basic")
            .with_png("albedo.png", [10, 20, 30, 255])
            .with_png("normal.png", [128, 128, 255, 255]),
    )
}

#[test]
fn a_loading_texture_binds_its_fallback_colour() {
    let mut h = harness();
    let shader = h.shader("shaders/basic");
    let mut material = Material::new(shader.clone());
    material.set_texture_uniform("u_albedo", "albedo.png");
    material.set_fallback("u_albedo", Color::rgb(1.0, 0.0, 1.0));

    let mut uniforms = UniformCache::new();
    h.device.use_program(shader.id());
    let bindings = material.apply_to(&mut DrawContext {
        device: h.device.as_ref(),
        resources: &h.resources,
        uniforms: &mut uniforms,
    });

    let Some(SamplerBinding::Fallback { unit: 0, texture }) = bindings.binding("u_albedo") else {
        panic!("expected a fallback binding, got {bindings:?}");
    };
    assert_eq!(h.device.texture_pixels(texture), Some(vec![255, 0, 255, 255]));
    assert_eq!(h.device.bound_texture(0), Some(texture));
    assert_eq!(
        h.device.uniform_value(shader.id(), "u_albedo"),
        Some(UniformValue::Int(0))
    );
    // The same colour elsewhere reuses the texture.
    assert_eq!(
        h.resources.get_or_create_color_texture(Color::rgb(1.0, 0.0, 1.0)).unwrap(),
        texture
    );

    // The draw requested the load; once it ran the real texture is bound.
    h.pump();
    let bindings = material.apply_to(&mut DrawContext {
        device: h.device.as_ref(),
        resources: &h.resources,
        uniforms: &mut uniforms,
    });
    let loaded = h.resources.get_texture("albedo.png").unwrap();
    assert_eq!(
        bindings.binding("u_albedo"),
        Some(SamplerBinding::Texture {
            unit: 0,
            texture: loaded
        })
    );
    assert_eq!(h.fetcher.fetch_count("albedo.png"), 1);
}

#[test]
fn samplers_without_texture_or_fallback_read_an_empty_unit() {
    let mut h = harness();
    let shader = h.shader("shaders/basic");
    h.resources.request_texture("normal.png");
    h.pump();

    let mut material = Material::new(shader.clone());
    material.set_texture_uniform("u_albedo", "albedo.png");
    material.set_texture_uniform("u_normal", "normal.png");

    let mut uniforms = UniformCache::new();
    h.device.use_program(shader.id());
    let bindings = material.apply_to(&mut DrawContext {
        device: h.device.as_ref(),
        resources: &h.resources,
        uniforms: &mut uniforms,
    });

    assert_eq!(bindings.binding("u_albedo"), Some(SamplerBinding::Unbound));
    assert!(matches!(
        bindings.binding("u_normal"),
        Some(SamplerBinding::Texture { unit: 0, .. })
    ));
    assert_eq!(bindings.unbound(), 1);
    assert_eq!(bindings.textures(), 1);
    assert_eq!(
        h.device.uniform_value(shader.id(), "u_albedo"),
        Some(UniformValue::Int(1))
    );
    assert_eq!(h.device.bound_texture(1), None);
    assert_eq!(h.resources.color_texture_count(), 0);
}

#[test]
fn units_follow_declaration_order() {
    let mut h = harness();
    let shader = h.shader("shaders/basic");
    h.resources.request_texture("albedo.png");
    h.resources.request_texture("normal.png");
    h.pump();

    let mut material = Material::new(shader.clone());
    material.set_texture_uniform("u_normal", "normal.png");
    material.set_texture_uniform("u_albedo", "albedo.png");
    // Re-declaring keeps the position.
    material.set_texture_uniform("u_normal", "normal.png");

    let mut uniforms = UniformCache::new();
    h.device.use_program(shader.id());
    let bindings = material.apply_to(&mut DrawContext {
        device: h.device.as_ref(),
        resources: &h.resources,
        uniforms: &mut uniforms,
    });
    let names: Vec<&str> = bindings.samplers.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["u_normal", "u_albedo"]);
    assert!(matches!(
        bindings.binding("u_albedo"),
        Some(SamplerBinding::Texture { unit: 1, .. })
    ));
}

#[test]
fn uniforms_are_uploaded_through_the_cache() {
    let mut h = harness();
    let shader = h.shader("shaders/basic");
    let mut material = Material::new(shader.clone());
    material.set_uniform("u_color", UniformValue::Vec4([1.0, 0.5, 0.25, 1.0]));
    material.set_uniform("u_time", 2.0f32);
    material.set_uniform("u_unknown", UniformValue::Int(7));

    let mut uniforms = UniformCache::new();
    h.device.use_program(shader.id());
    let mut ctx = DrawContext {
        device: h.device.as_ref(),
        resources: &h.resources,
        uniforms: &mut uniforms,
    };
    let first = material.apply_to(&mut ctx);
    let second = material.apply_to(&mut ctx);

    assert_eq!((first.uploaded, first.unchanged), (2, 0));
    assert_eq!((second.uploaded, second.unchanged), (0, 2));
    assert_eq!(
        h.device.uniform_value(shader.id(), "u_time"),
        Some(UniformValue::Float(2.0))
    );
}

#[test]
fn signatures_ignore_values_but_not_names() {
    let mut h = harness();
    let shader = h.shader("shaders/basic");

    let mut a = Material::new(shader.clone());
    a.set_uniform("u_time", 1.0f32);
    a.set_uniform("u_color", [1.0f32, 0.0, 0.0, 1.0]);
    a.set_texture_uniform("u_albedo", "albedo.png");

    let mut b = Material::new(shader.clone());
    b.set_texture_uniform("u_albedo", "normal.png");
    b.set_uniform("u_color", [0.0f32, 1.0, 0.0, 1.0]);
    b.set_uniform("u_time", 5.0f32);
    assert_eq!(a.signature(), b.signature());

    b.set_uniform("u_extra", 1i32);
    assert_ne!(a.signature(), b.signature());
    b.remove_uniform("u_extra");
    b.set_texture_uniform("u_normal", "normal.png");
    assert_ne!(a.signature(), b.signature());
}
