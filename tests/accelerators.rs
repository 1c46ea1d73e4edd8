//! Accelerator chords and the input quirks applied for X11 clients.

use sommelier::config::{parse_accelerators, Modifiers};
use sommelier::seat::{bump_axis_delta, matches_accelerator, PressedKeys, DISCRETE_SCROLL_UNIT};
use xkbcommon::xkb;

fn keysym(name: &str) -> xkb::Keysym {
    xkb::keysym_from_name(name, xkb::KEYSYM_CASE_INSENSITIVE)
}

#[test]
fn matching_chords_are_swallowed_regardless_of_case() {
    let accelerators = parse_accelerators("<Control><Alt>Delete,<Alt>F4").unwrap();

    assert!(matches_accelerator(
        &accelerators,
        Modifiers::CONTROL | Modifiers::ALT,
        keysym("Delete"),
    ));
    assert!(matches_accelerator(&accelerators, Modifiers::ALT, keysym("F4")));
    // Keysym comparison is lower-cased, the way xkb reports shifted keys.
    assert!(matches_accelerator(
        &accelerators,
        Modifiers::ALT,
        xkb::keysym_from_name("F4", xkb::KEYSYM_NO_FLAGS),
    ));

    // Wrong modifiers or keysym never match.
    assert!(!matches_accelerator(&accelerators, Modifiers::CONTROL, keysym("Delete")));
    assert!(!matches_accelerator(
        &accelerators,
        Modifiers::CONTROL | Modifiers::ALT,
        keysym("BackSpace"),
    ));
    assert!(!matches_accelerator(&accelerators, Modifiers::empty(), keysym("F4")));
}

#[test]
fn pressed_keys_deduplicate_presses_and_orphan_releases() {
    let mut keys = PressedKeys::default();
    assert!(keys.press(30));
    assert!(!keys.press(30), "second press of a held key is dropped");
    assert!(keys.release(30));
    assert!(!keys.release(30), "release of an unpressed key is dropped");

    keys.reset([1, 2, 3]);
    assert!(keys.contains(2));
    assert!(!keys.press(2));
    assert!(keys.release(2));
    assert!(!keys.contains(2));
}

#[test]
fn small_discrete_scrolls_are_bumped_for_x11() {
    // X toolkits only handle scrolls in multiples of 5 smooth-scroll
    // units; anything smaller would be discarded entirely.
    assert_eq!(bump_axis_delta(1.5, 1, true), DISCRETE_SCROLL_UNIT);
    assert_eq!(bump_axis_delta(-1.5, -1, true), -DISCRETE_SCROLL_UNIT);
    assert_eq!(bump_axis_delta(7.5, 1, true), 7.5);

    // Non-discrete (touchpad) scrolling keeps its precision.
    assert_eq!(bump_axis_delta(1.5, 0, true), 1.5);
    // Wayland-native clients handle small deltas correctly.
    assert_eq!(bump_axis_delta(1.5, 1, false), 1.5);
}
