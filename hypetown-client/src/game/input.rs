//! Tap input - mouse clicks and touches on the character

use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use hypetown::WorldPoint;

use super::{Character, FeedbackPresenter, TapFeedback, CHARACTER_SIZE};
use crate::network::{CoinsChanged, PlayerSession};

/// Whether `point` lands on a card centered at `center` with `size`,
/// scaled by `scale`.
pub fn hit_test(center: Vec2, size: Vec2, scale: f32, point: Vec2) -> bool {
    let half = size * scale / 2.0;
    let delta = (point - center).abs();
    delta.x <= half.x && delta.y <= half.y
}

/// Turn presses on the character into credited taps
pub fn detect_taps(
    mouse: Res<ButtonInput<MouseButton>>,
    touches: Res<Touches>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform)>,
    characters: Query<&Transform, With<Character>>,
    mut session: ResMut<PlayerSession>,
    mut feedback: EventWriter<TapFeedback>,
    mut coins_events: EventWriter<CoinsChanged>,
) {
    let Ok((camera, camera_transform)) = cameras.get_single() else {
        return;
    };
    let Ok(character) = characters.get_single() else {
        return;
    };

    // Screen positions pressed this frame
    let mut presses: Vec<Vec2> = touches.iter_just_pressed().map(|t| t.position()).collect();
    if mouse.just_pressed(MouseButton::Left) {
        if let Some(cursor) = windows.get_single().ok().and_then(|w| w.cursor_position()) {
            presses.push(cursor);
        }
    }
    if presses.is_empty() {
        return;
    }

    let center = character.translation.truncate();
    let scale = character.scale.x;
    let mut presenter = FeedbackPresenter::default();
    let PlayerSession { player, batcher, .. } = &mut *session;

    for screen in presses {
        let Ok(world) = camera.viewport_to_world_2d(camera_transform, screen) else {
            continue;
        };
        if !hit_test(center, CHARACTER_SIZE, scale, world) {
            continue;
        }
        batcher.record_tap(player, WorldPoint::new(world.x, world.y, 0.0), &mut presenter);
    }

    for reaction in presenter.reactions {
        feedback.send(TapFeedback(reaction));
    }
    if let Some(coins) = presenter.coins {
        coins_events.send(CoinsChanged(coins));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_test() {
        let size = Vec2::new(100.0, 200.0);
        assert!(hit_test(Vec2::ZERO, size, 1.0, Vec2::new(49.0, 99.0)));
        assert!(!hit_test(Vec2::ZERO, size, 1.0, Vec2::new(51.0, 0.0)));
        assert!(hit_test(Vec2::new(10.0, -40.0), size, 1.0, Vec2::new(10.0, -40.0)));
        assert!(!hit_test(Vec2::new(10.0, -40.0), size, 1.0, Vec2::new(10.0, 70.0)));
    }

    #[test]
    fn test_hit_test_follows_bounce_scale() {
        let size = Vec2::new(100.0, 100.0);
        assert!(!hit_test(Vec2::ZERO, size, 1.0, Vec2::new(55.0, 0.0)));
        assert!(hit_test(Vec2::ZERO, size, 1.12, Vec2::new(55.0, 0.0)));
    }
}
