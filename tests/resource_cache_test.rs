use std::time::Duration;

use futures::FutureExt;
use kiln_ngin::resources::LoadState;
use kiln_ngin::{Color, LoadError};

use crate::common::test_utils::{Harness, MockFetcher, png};

mod common;

#[test]
fn concurrent_requests_share_one_load() {
    let mut h = Harness::new(MockFetcher::new().with_png("a.png", [255, 0, 0, 255]));

    let first = h.resources.load_texture("a.png");
    let second = h.resources.load_texture("a.png");
    assert!(first.ptr_eq(&second));
    assert_eq!(h.resources.texture_state("a.png"), Some(LoadState::Pending));

    h.pump();
    let a = first.now_or_never().unwrap().unwrap();
    let b = second.now_or_never().unwrap().unwrap();
    assert_eq!(a, b);
    assert_eq!(h.fetcher.fetch_count("a.png"), 1);
    assert_eq!(h.device.stats().textures_created, 1);
    assert_eq!(h.device.texture_pixels(a), Some(vec![255, 0, 0, 255]));
    assert_eq!(h.resources.stats().loads_started, 1);

    assert_eq!(h.resources.get_texture("a.png"), Some(a));
    let third = h.resources.load_texture("a.png").now_or_never();
    assert_eq!(third, Some(Ok(a)));
    assert_eq!(h.fetcher.fetch_count("a.png"), 1);
}

#[test]
fn ready_textures_resolve_without_fetching_again() {
    let mut h = Harness::new(MockFetcher::new().with_png("a.png", [0, 0, 255, 255]));
    let loaded = h.pool.run_until(h.resources.load_texture("a.png")).unwrap();

    let again = h.resources.load_texture("a.png").now_or_never();
    assert_eq!(again, Some(Ok(loaded)));
    assert_eq!(h.resources.get_texture("a.png"), Some(loaded));
    assert_eq!(h.fetcher.fetch_count("a.png"), 1);
}

#[test]
fn loads_only_complete_when_the_executor_runs() {
    let mut h = Harness::new(MockFetcher::new().with_png("a.png", [1, 2, 3, 4]));
    h.resources.request_texture("a.png");
    assert_eq!(h.resources.get_texture("a.png"), None);
    assert_eq!(h.fetcher.fetch_count("a.png"), 0);

    h.pump();
    assert!(h.resources.get_texture("a.png").is_some());
    assert_eq!(h.resources.texture_state("a.png"), Some(LoadState::Ready));
}

#[test]
fn failed_loads_are_retried_on_the_next_request() {
    let mut h = Harness::new(MockFetcher::new());

    let failed = h.pool.run_until(h.resources.load_texture("late.png"));
    assert!(matches!(failed, Err(LoadError::Fetch { ref url, .. }) if url == "late.png"));
    assert!(matches!(
        h.resources.texture_state("late.png"),
        Some(LoadState::Failed(LoadError::Fetch { .. }))
    ));
    assert_eq!(h.resources.get_texture("late.png"), None);
    assert_eq!(h.resources.stats().loads_failed, 1);

    h.fetcher.insert("late.png", png(1, 1, &[9, 9, 9, 255]));
    let retried = h.pool.run_until(h.resources.load_texture("late.png"));
    assert!(retried.is_ok());
    assert_eq!(h.fetcher.fetch_count("late.png"), 2);
    assert_eq!(h.resources.stats().loads_started, 2);
}

#[test]
fn undecodable_bytes_fail_with_a_decode_error() {
    let mut h = Harness::new(MockFetcher::new().with_file("broken.png", b"not an image".to_vec()));
    let result = h.pool.run_until(h.resources.load_texture("broken.png"));
    assert!(matches!(result, Err(LoadError::Decode { .. })));
    assert_eq!(h.device.stats().textures_created, 0);
}

#[test]
fn colour_textures_are_deduplicated_by_quantised_colour() {
    let h = Harness::new(MockFetcher::new());
    let red = h.resources.get_or_create_color_texture(Color::rgb(1.0, 0.0, 0.0)).unwrap();
    let again = h.resources.get_or_create_color_texture(Color::rgb(1.0, 0.0, 0.0)).unwrap();
    let close = h.resources.get_or_create_color_texture(Color::rgb(0.9999, 0.0, 0.0)).unwrap();
    let blue = h.resources.get_or_create_color_texture(Color::rgb(0.0, 0.0, 1.0)).unwrap();

    assert_eq!(red, again);
    assert_eq!(red, close);
    assert_ne!(red, blue);
    assert_eq!(h.device.texture_size(red), Some((1, 1)));
    assert_eq!(h.device.texture_pixels(blue), Some(vec![0, 0, 255, 255]));
    assert_eq!(h.resources.color_texture_count(), 2);
    assert_eq!(h.resources.stats().color_textures_created, 2);
}

#[test]
fn deleting_a_texture_releases_it_and_allows_a_reload() {
    let mut h = Harness::new(MockFetcher::new().with_png("a.png", [0, 0, 0, 255]));
    let texture = h.pool.run_until(h.resources.load_texture("a.png")).unwrap();

    assert!(h.resources.delete_texture("a.png"));
    assert!(!h.device.is_texture_alive(texture));
    assert_eq!(h.resources.get_texture("a.png"), None);
    assert!(!h.resources.delete_texture("a.png"));

    h.pool.run_until(h.resources.load_texture("a.png")).unwrap();
    assert_eq!(h.fetcher.fetch_count("a.png"), 2);
}

#[test]
fn pending_loads_survive_eviction() {
    let mut h = Harness::new(MockFetcher::new().with_png("a.png", [0, 0, 0, 255]));
    h.resources.request_texture("a.png");

    assert!(!h.resources.delete_texture("a.png"));
    h.resources.clear_textures();
    assert_eq!(h.resources.texture_state("a.png"), Some(LoadState::Pending));

    h.pump();
    assert!(h.resources.get_texture("a.png").is_some());
}

#[test]
fn clearing_releases_url_and_colour_textures() {
    let mut h = Harness::new(
        MockFetcher::new()
            .with_png("a.png", [0, 0, 0, 255])
            .with_png("b.png", [255, 255, 255, 255]),
    );
    h.resources.request_texture("a.png");
    h.resources.request_texture("b.png");
    h.pump();
    h.resources.get_or_create_color_texture(Color::WHITE).unwrap();
    assert_eq!(h.device.live_textures(), 3);

    h.resources.clear_textures();
    assert_eq!(h.device.live_textures(), 0);
    assert_eq!(h.resources.texture_count(), 0);
    assert_eq!(h.resources.color_texture_count(), 0);

    assert_eq!(h.resources.get_texture("a.png"), None);
    h.pool.run_until(h.resources.load_texture("a.png")).unwrap();
    assert_eq!(h.fetcher.fetch_count("a.png"), 2);
}

#[test]
fn stale_colour_textures_are_swept() {
    let h = Harness::new(MockFetcher::new());
    let white = h.resources.get_or_create_color_texture(Color::WHITE).unwrap();

    assert_eq!(h.resources.evict_stale_color_textures(Duration::from_secs(3600)), 0);
    assert!(h.device.is_texture_alive(white));

    let later = instant::Instant::now() + Duration::from_secs(1);
    assert_eq!(h.resources.evict_color_textures_unused_since(later), 1);
    assert!(!h.device.is_texture_alive(white));
    assert_eq!(h.resources.stats().color_textures_evicted, 1);

    let recreated = h.resources.get_or_create_color_texture(Color::WHITE).unwrap();
    assert_ne!(recreated, white);
}

#[test]
fn disposal_failures_still_remove_the_entry() {
    let mut h = Harness::new(MockFetcher::new().with_png("a.png", [0, 0, 0, 255]));
    h.pool.run_until(h.resources.load_texture("a.png")).unwrap();
    h.resources.get_or_create_color_texture(Color::BLACK).unwrap();

    h.device.fail_deletes(true);
    assert!(h.resources.delete_texture("a.png"));
    assert_eq!(h.resources.get_texture("a.png"), None);
    h.resources.clear_textures();
    assert_eq!(h.resources.color_texture_count(), 0);
}

#[test]
fn dropping_the_cache_releases_every_handle() {
    let mut h = Harness::new(
        MockFetcher::new()
            .with_png("a.png", [0, 0, 0, 255])
            .with_shader("shaders/basic"),
    );
    h.resources.request_texture("a.png");
    h.pump();
    let program = h.shader("shaders/basic");
    h.resources.get_or_create_color_texture(Color::WHITE).unwrap();

    let device = h.device.clone();
    drop(h);
    assert_eq!(device.live_textures(), 0);
    assert!(!device.is_program_alive(program.id()));
}

#[test]
fn loads_finishing_after_the_cache_is_gone_are_released() {
    let mut h = Harness::new(MockFetcher::new().with_png("a.png", [0, 0, 0, 255]));
    h.resources.request_texture("a.png");

    let device = h.device.clone();
    let mut pool = h.pool;
    drop(h.resources);
    pool.run_until_stalled();

    assert_eq!(device.stats().textures_created, 0);
    assert_eq!(device.live_textures(), 0);
}
