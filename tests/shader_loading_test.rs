use futures::FutureExt;
use kiln_ngin::LoadError;
use kiln_ngin::resources::LoadState;

use crate::common::test_utils::{BASIC_VS, Harness, MockFetcher};

mod common;

#[test]
fn trailing_slashes_name_the_same_folder() {
    let mut h = Harness::new(MockFetcher::new().with_shader("shaders/basic"));

    let a = h.resources.load_shader_program("shaders/basic/");
    let b = h.resources.load_shader_program("shaders/basic");
    assert!(a.ptr_eq(&b));

    let program = h.pool.run_until(a).unwrap();
    assert_eq!(program.name(), "shaders/basic");
    assert_eq!(h.fetcher.fetch_count("shaders/basic/basic.vs"), 1);
    assert_eq!(h.fetcher.fetch_count("shaders/basic/basic.fs"), 1);
    assert_eq!(h.resources.get_shader_program("shaders/basic//"), Some(program.clone()));
    assert_eq!(h.device.program_label(program.id()).as_deref(), Some("shaders/basic"));
}

#[test]
fn optional_stages_are_looked_up_but_not_required() {
    let mut h = Harness::new(MockFetcher::new().with_shader("shaders/basic"));
    h.shader("shaders/basic");
    assert_eq!(h.fetcher.fetch_count("shaders/basic/basic.gs"), 1);
    assert_eq!(h.fetcher.fetch_count("shaders/basic/basic.ts"), 1);
    assert_eq!(h.fetcher.fetch_count("shaders/basic/basic.tes"), 1);
}

#[test]
fn a_missing_fragment_stage_fails_the_load() {
    let mut h = Harness::new(MockFetcher::new().with_file("shaders/flat/flat.vs", BASIC_VS));

    let result = h.pool.run_until(h.resources.load_shader_program("shaders/flat"));
    assert_eq!(
        result,
        Err(LoadError::MissingStage {
            folder: "shaders/flat".to_owned(),
            stage: "fragment",
        })
    );
    assert!(matches!(
        h.resources.shader_state("shaders/flat"),
        Some(LoadState::Failed(_))
    ));
    assert_eq!(h.device.stats().programs_created, 0);
}

#[test]
fn programs_the_device_rejects_fail_with_a_device_error() {
    let mut h = Harness::new(
        MockFetcher::new()
            .with_file("shaders/empty/empty.vs", "")
            .with_file("shaders/empty/empty.fs", ""),
    );
    let result = h.pool.run_until(h.resources.load_shader_program("shaders/empty"));
    assert!(matches!(result, Err(LoadError::Device { .. })));
}

#[test]
fn deleting_a_program_releases_it() {
    let mut h = Harness::new(MockFetcher::new().with_shader("shaders/basic"));
    let program = h.shader("shaders/basic");

    assert_eq!(h.resources.delete_shader_program("shaders/basic/"), Some(program.id()));
    assert!(!h.device.is_program_alive(program.id()));
    assert_eq!(h.resources.get_shader_program("shaders/basic"), None);
    assert_eq!(h.resources.delete_shader_program("shaders/basic"), None);
}

#[test]
fn loading_programs_are_not_evicted() {
    let mut h = Harness::new(MockFetcher::new().with_shader("shaders/basic"));
    let load = h.resources.load_shader_program("shaders/basic");

    assert_eq!(h.resources.delete_shader_program("shaders/basic"), None);
    assert!(h.resources.clear_shader_programs().is_empty());

    h.pump();
    let program = load.now_or_never().unwrap().unwrap();
    assert_eq!(h.resources.clear_shader_programs(), vec![program.id()]);
}
