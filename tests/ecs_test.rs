use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use kiln_ngin::ecs::{Component, ComponentKey, ComponentStore, EntityManager, System};
use kiln_ngin::gpu::headless::HeadlessDevice;
use kiln_ngin::resources::primitives;
use kiln_ngin::systems::Orbit;
use kiln_ngin::{Camera, GpuDevice, Light, LightKind, Mesh, Scene, Transform};


#[derive(Debug, PartialEq)]
struct Health(u32);

impl Component for Health {
    const KEY: ComponentKey = ComponentKey("test.health");
}

/// Fails to dispose, like a resource the device already lost.
struct Cursed;

impl Component for Cursed {
    const KEY: ComponentKey = ComponentKey("app.cursed");

    fn dispose(&mut self, _device: &dyn GpuDevice) -> anyhow::Result<()> {
        anyhow::bail!("cursed")
    }
}

#[test]
fn entity_ids_are_never_reused() {
    let mut entities = EntityManager::new();
    let a = entities.create();
    let b = entities.create();
    assert!(entities.destroy(a));
    assert!(!entities.destroy(a));
    let c = entities.create();
    assert!(c != a && c != b);
    assert!(c.id() > b.id());
    assert_eq!(entities.all().collect::<Vec<_>>(), vec![b, c]);
}

#[test]
fn one_component_per_type_and_entity() {
    let mut entities = EntityManager::new();
    let mut store = ComponentStore::new();
    let e = entities.create();

    assert_eq!(store.add(e, Health(10)), None);
    assert_eq!(store.add(e, Health(7)), Some(Health(10)));
    assert_eq!(store.get::<Health>(e), Some(&Health(7)));
    assert_eq!(store.len::<Health>(), 1);

    store.get_mut::<Health>(e).unwrap().0 -= 2;
    assert_eq!(store.remove::<Health>(e), Some(Health(5)));
    assert_eq!(store.remove::<Health>(e), None);
    assert!(!store.contains::<Health>(e));
}

#[test]
fn all_of_type_is_ordered_by_entity() {
    let mut entities = EntityManager::new();
    let mut store = ComponentStore::new();
    let ids: Vec<_> = (0..4).map(|_| entities.create()).collect();
    for (i, e) in ids.iter().enumerate().rev() {
        store.add(*e, Health(i as u32));
    }
    store.remove::<Health>(ids[1]);

    let all: Vec<_> = store
        .get_all_of_type::<Health>()
        .into_iter()
        .map(|(e, h)| (e, h.0))
        .collect();
    assert_eq!(all, vec![(ids[0], 0), (ids[2], 2), (ids[3], 3)]);
}

#[test]
fn systems_run_in_insertion_order() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let mut scene = Scene::new();
    for name in ["physics", "animation", "camera"] {
        let order = order.clone();
        scene.add_fn_system(move |_, _| order.borrow_mut().push(name));
    }

    scene.update(Duration::from_millis(16));
    scene.update(Duration::from_millis(16));
    assert_eq!(
        *order.borrow(),
        ["physics", "animation", "camera", "physics", "animation", "camera"]
    );
}

#[test]
fn scene_builders_attach_the_expected_components() {
    let device = HeadlessDevice::new();
    let mut scene = Scene::new();

    let plain = scene.create_entity();
    let camera = scene.create_camera();
    let light = scene.create_light(LightKind::Spot);
    let mesh = scene.create_mesh(primitives::quad(&device, 1.0).unwrap(), None);

    assert!(scene.get_component::<Transform>(plain).is_some());
    assert!(scene.get_component::<Camera>(camera).is_some());
    assert_eq!(scene.get_component::<Light>(light).unwrap().kind, LightKind::Spot);
    assert!(scene.get_component::<Mesh>(mesh).is_some());
    assert_eq!(scene.get_all_of_type::<Transform>().len(), 4);
    assert_eq!(scene.active_camera(), None);
}

#[test]
fn destroying_an_entity_disposes_every_component() {
    let device = HeadlessDevice::new();
    let mut scene = Scene::new();
    let geometry = primitives::cube(&device, 1.0).unwrap();
    let vertex_array = geometry.vertex_array.unwrap();
    let entity = scene.create_mesh(geometry, None);
    scene.add_component(entity, Cursed);
    scene.add_component(entity, Health(1));

    assert!(scene.destroy_entity(entity, &device));
    // The failing component does not stop the mesh from being released.
    assert!(!device.is_vertex_array_alive(vertex_array));
    assert!(scene.get_component::<Health>(entity).is_none());
    assert!(!scene.contains(entity));
    assert!(!scene.destroy_entity(entity, &device));
}

#[test]
fn shared_geometry_outlives_its_meshes() {
    let device = HeadlessDevice::new();
    let mut scene = Scene::new();
    let owned = primitives::quad(&device, 1.0).unwrap();
    let vertex_array = owned.vertex_array.unwrap();
    let shared = kiln_ngin::Geometry::shared(vertex_array, owned.count, owned.index_format);

    let entity = scene.create_mesh(shared, None);
    scene.destroy_entity(entity, &device);
    assert!(device.is_vertex_array_alive(vertex_array));
}

#[test]
fn destroying_the_active_camera_unsets_it() {
    let device = HeadlessDevice::new();
    let mut scene = Scene::new();
    let camera = scene.create_camera();
    scene.set_active_camera(camera);

    scene.destroy_entity(camera, &device);
    assert_eq!(scene.active_camera(), None);
}

#[test]
fn orbit_keeps_the_entity_facing_its_target() {
    let mut scene = Scene::new();
    let target = scene.create_entity();
    let camera = scene.create_camera();
    scene
        .get_component_mut::<Transform>(target)
        .unwrap()
        .set_position([0.0, 0.0, -10.0]);
    scene.add_system(Orbit::new(camera, target, 5.0, 45.0).with_elevation(30.0));

    for _ in 0..10 {
        scene.update(Duration::from_millis(100));
        let transform = scene.get_component::<Transform>(camera).unwrap();
        let target_position = cgmath::Vector3::new(0.0, 0.0, -10.0);
        let distance = cgmath::InnerSpace::magnitude(transform.position - target_position);
        assert!((distance - 5.0).abs() < 1e-4);
        // The view matrix maps the target onto the negative z axis.
        let seen = transform.view_matrix() * target_position.extend(1.0);
        assert!(seen.x.abs() < 1e-4 && seen.y.abs() < 1e-4 && seen.z < 0.0);
    }
}

#[test]
fn systems_can_be_structs() {
    struct Regenerate;
    impl System for Regenerate {
        fn update(&mut self, _dt: Duration, components: &mut ComponentStore) {
            let ids: Vec<_> = components
                .get_all_of_type::<Health>()
                .into_iter()
                .map(|(e, _)| e)
                .collect();
            for e in ids {
                if let Some(health) = components.get_mut::<Health>(e) {
                    health.0 += 1;
                }
            }
        }
    }

    let mut scene = Scene::new();
    let e = scene.create_entity();
    scene.add_component(e, Health(1));
    scene.add_system(Regenerate);
    scene.update(Duration::ZERO);
    assert_eq!(scene.get_component::<Health>(e), Some(&Health(2)));
}
