mod common;

use common::{descriptor, hero_doc, write_atlas, write_skel};
use marionette::assets::AssetPaths;
use marionette::commands::TriggerCommand;
use marionette::registry::UnitRegistry;
use marionette::Compositor;

fn hero_compositor() -> Compositor {
    let dir = tempfile::tempdir().expect("tempdir");
    let atlas = write_atlas(dir.path());
    let skel = write_skel(dir.path(), &hero_doc());
    let mut desc = descriptor("hero", &atlas, &skel);
    desc.default_anim = Some("idle".to_string());
    let registry = UnitRegistry::load(&[desc], &AssetPaths::default());
    assert_eq!(registry.len(), 1, "fixture unit must load");
    // A generous delta ceiling lets these tests step whole animations per call.
    Compositor::from_registry(registry, 10.0)
}

fn trigger(unit: &str, queue: &[&str], loop_last: bool) -> TriggerCommand {
    TriggerCommand {
        unit: unit.to_string(),
        track: 0,
        queue: queue.iter().map(|name| name.to_string()).collect(),
        loop_last,
    }
}

#[test]
fn queued_names_build_a_play_once_chain_with_looping_tail() {
    let mut compositor = hero_compositor();
    compositor.command_queue().submit(vec![trigger("hero", &["walk", "jump", "idle"], true)]);
    compositor.synchronize();
    compositor.advance(0.0);

    let unit = compositor.registry().find_by_name("hero").expect("hero");
    assert_eq!(unit.state.queued_len(0), 3);
    let first = unit.state.current(0).expect("first entry");
    assert_eq!(first.animation.name.as_ref(), "walk");
    assert!(!first.looping);

    // walk (1s) finishes, jump (0.5s) finishes, idle keeps looping.
    compositor.advance(1.0);
    let unit = compositor.registry().find_by_name("hero").expect("hero");
    assert_eq!(unit.state.current(0).expect("second entry").animation.name.as_ref(), "jump");
    compositor.advance(0.5);
    let unit = compositor.registry().find_by_name("hero").expect("hero");
    let tail = unit.state.current(0).expect("looping tail");
    assert_eq!(tail.animation.name.as_ref(), "idle");
    assert!(tail.looping);
    compositor.advance(10.0);
    let unit = compositor.registry().find_by_name("hero").expect("hero");
    assert!(unit.state.current(0).is_some(), "looping tail never expires");
}

#[test]
fn non_looping_tail_leaves_track_idle() {
    let mut compositor = hero_compositor();
    compositor.command_queue().submit(vec![trigger("hero", &["jump"], false)]);
    compositor.synchronize();
    compositor.advance(0.0);

    // 0.5s animation, 0.05 clamp: drain it over many frames.
    for _ in 0..20 {
        compositor.advance(0.05);
    }
    let unit = compositor.registry().find_by_name("hero").expect("hero");
    assert!(unit.state.current(0).is_none(), "track should be idle after the chain");
}

#[test]
fn unknown_unit_and_unknown_names_are_skipped_per_item() {
    let mut compositor = hero_compositor();
    compositor.command_queue().submit(vec![
        trigger("nobody", &["walk"], true),
        trigger("hero", &["does-not-exist"], true),
    ]);
    compositor.synchronize();
    compositor.advance(0.0);

    // The default animation is untouched by either command.
    let unit = compositor.registry().find_by_name("hero").expect("hero");
    let entry = unit.state.current(0).expect("default animation still playing");
    assert_eq!(entry.animation.name.as_ref(), "idle");
    assert!(entry.looping);
}

#[test]
fn unresolvable_names_inside_a_queue_do_not_abort_the_rest() {
    let mut compositor = hero_compositor();
    compositor.command_queue().submit(vec![trigger("hero", &["ghost", "walk", "phantom"], true)]);
    compositor.synchronize();
    compositor.advance(0.0);

    let unit = compositor.registry().find_by_name("hero").expect("hero");
    assert_eq!(unit.state.queued_len(0), 1);
    let entry = unit.state.current(0).expect("walk replaced the default");
    assert_eq!(entry.animation.name.as_ref(), "walk");
    // The listed tail never resolved, so nothing loops.
    assert!(!entry.looping);
}

#[test]
fn tracks_are_independent_channels() {
    let mut compositor = hero_compositor();
    let mut on_track_two = trigger("hero", &["walk"], true);
    on_track_two.track = 2;
    compositor.command_queue().submit(vec![on_track_two]);
    compositor.synchronize();
    compositor.advance(0.0);

    let unit = compositor.registry().find_by_name("hero").expect("hero");
    assert_eq!(unit.state.current(0).expect("track 0").animation.name.as_ref(), "idle");
    assert_eq!(unit.state.current(2).expect("track 2").animation.name.as_ref(), "walk");
}

#[test]
fn commands_apply_once_per_synchronize() {
    let mut compositor = hero_compositor();
    compositor.command_queue().submit(vec![trigger("hero", &["jump"], false)]);
    compositor.synchronize();
    compositor.advance(0.0);
    let unit = compositor.registry().find_by_name("hero").expect("hero");
    assert_eq!(unit.state.current(0).expect("jump playing").animation.name.as_ref(), "jump");

    // No resubmission: the next frame must not restart the animation.
    compositor.synchronize();
    compositor.advance(0.05);
    let unit = compositor.registry().find_by_name("hero").expect("hero");
    let entry = unit.state.current(0).expect("jump still playing");
    assert!(entry.time > 0.0);
}
