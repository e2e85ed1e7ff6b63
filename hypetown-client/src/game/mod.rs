//! Game module - the tappable character
//!
//! A tap on the character is credited through the core batcher; the
//! reaction (bounce, particles, floating "+N") is played by the systems in
//! `character` and `effects`.

use bevy::prelude::*;

use hypetown::{TapPresenter, TapReaction};

use crate::AppState;

pub mod character;
pub mod effects;
pub mod input;

pub use character::*;
pub use effects::*;
pub use input::*;

// ============================================================================
// EVENTS
// ============================================================================

/// A tap was credited and should be played
#[derive(Event, Debug, Clone)]
pub struct TapFeedback(pub TapReaction);

/// Collects presentation requests from the batcher so they can be sent as
/// events once the session borrow ends.
#[derive(Default)]
pub struct FeedbackPresenter {
    pub reactions: Vec<TapReaction>,
    pub coins: Option<u64>,
}

impl TapPresenter for FeedbackPresenter {
    fn on_tap(&mut self, reaction: &TapReaction) {
        self.reactions.push(reaction.clone());
    }

    fn on_coins_changed(&mut self, coins: u64) {
        self.coins = Some(coins);
    }
}

// ============================================================================
// GAME PLUGIN
// ============================================================================

pub struct GamePlugin;

impl Plugin for GamePlugin {
    fn build(&self, app: &mut App) {
        app
            .add_event::<TapFeedback>()
            .add_systems(OnEnter(AppState::Playing), spawn_character)
            .add_systems(Update, (
                detect_taps,
                apply_character_model,
                play_tap_feedback,
                animate_bounce,
                update_particles,
                update_floating_text,
            ).chain().run_if(in_state(AppState::Playing)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypetown::WorldPoint;

    #[test]
    fn test_presenter_collects_reactions() {
        let mut presenter = FeedbackPresenter::default();
        let reaction = TapReaction { point: WorldPoint::new(1.0, 2.0, 0.0), reward: 3, coins: 30 };
        presenter.on_tap(&reaction);
        presenter.on_coins_changed(30);

        assert_eq!(presenter.reactions, vec![reaction]);
        assert_eq!(presenter.coins, Some(30));
    }
}
