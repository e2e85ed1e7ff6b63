//! UI module - loading screen and HUD

use bevy::prelude::*;

use hypetown::game::state::format_compact;

use crate::network::{CoinsChanged, PlayerSession};
use crate::AppState;

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app
            .add_systems(OnEnter(AppState::Loading), setup_loading_ui)
            .add_systems(OnExit(AppState::Loading), cleanup_loading_ui)
            .add_systems(OnEnter(AppState::Playing), setup_hud)
            .add_systems(Update, (
                update_coins,
                update_profile,
            ).run_if(in_state(AppState::Playing)));
    }
}

/// Marker for loading UI
#[derive(Component)]
struct LoadingUI;

/// Marker for coin balance text
#[derive(Component)]
struct CoinsText;

/// Marker for name/level text
#[derive(Component)]
struct ProfileText;

/// Marker for tap power and sync status text
#[derive(Component)]
struct TapPowerText;

/// Marker for the filled part of the XP bar
#[derive(Component)]
struct XpBarFill;

fn setup_loading_ui(mut commands: Commands) {
    commands.spawn((
        Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            flex_direction: FlexDirection::Column,
            justify_content: JustifyContent::Center,
            align_items: AlignItems::Center,
            ..default()
        },
        BackgroundColor(Color::srgba(0.07, 0.05, 0.12, 0.98)),
        LoadingUI,
    )).with_children(|parent| {
        parent.spawn((
            Text::new("HYPETOWN"),
            TextFont {
                font_size: 64.0,
                ..default()
            },
            TextColor(Color::srgb(1.0, 0.8, 0.3)),
            Node {
                margin: UiRect::bottom(Val::Px(16.0)),
                ..default()
            },
        ));
        parent.spawn((
            Text::new("Loading..."),
            TextFont {
                font_size: 24.0,
                ..default()
            },
            TextColor(Color::srgb(0.7, 0.7, 0.8)),
        ));
    });
}

fn cleanup_loading_ui(
    mut commands: Commands,
    query: Query<Entity, With<LoadingUI>>,
) {
    for entity in query.iter() {
        commands.entity(entity).despawn_recursive();
    }
}

fn setup_hud(mut commands: Commands, session: Res<PlayerSession>) {
    let player = &session.player;

    // Top bar: name/level, xp bar
    commands.spawn((
        Node {
            width: Val::Percent(100.0),
            position_type: PositionType::Absolute,
            top: Val::Px(0.0),
            left: Val::Px(0.0),
            padding: UiRect::all(Val::Px(14.0)),
            flex_direction: FlexDirection::Column,
            align_items: AlignItems::Center,
            ..default()
        },
        BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.5)),
    )).with_children(|parent| {
        parent.spawn((
            Text::new(profile_line(&session)),
            TextFont {
                font_size: 22.0,
                ..default()
            },
            TextColor(Color::WHITE),
            ProfileText,
        ));

        // XP bar
        parent.spawn((
            Node {
                width: Val::Px(260.0),
                height: Val::Px(10.0),
                margin: UiRect::top(Val::Px(8.0)),
                ..default()
            },
            BackgroundColor(Color::srgb(0.2, 0.2, 0.3)),
        )).with_children(|bar| {
            bar.spawn((
                Node {
                    width: Val::Percent(player.level_progress() * 100.0),
                    height: Val::Percent(100.0),
                    ..default()
                },
                BackgroundColor(Color::srgb(0.4, 0.9, 0.6)),
                XpBarFill,
            ));
        });

        parent.spawn((
            Text::new(format_compact(player.coins)),
            TextFont {
                font_size: 56.0,
                ..default()
            },
            TextColor(Color::srgb(1.0, 0.85, 0.3)),
            Node {
                margin: UiRect::top(Val::Px(18.0)),
                ..default()
            },
            CoinsText,
        ));
    });

    // Bottom: tap power
    commands.spawn((
        Node {
            width: Val::Percent(100.0),
            position_type: PositionType::Absolute,
            bottom: Val::Px(24.0),
            justify_content: JustifyContent::Center,
            ..default()
        },
    )).with_children(|parent| {
        parent.spawn((
            Text::new(tap_power_line(&session)),
            TextFont {
                font_size: 20.0,
                ..default()
            },
            TextColor(Color::srgb(0.7, 0.8, 1.0)),
            TapPowerText,
        ));
    });
}

fn profile_line(session: &PlayerSession) -> String {
    let player = &session.player;
    let name = if player.name.is_empty() { "Player" } else { player.name.as_str() };
    format!("{} {}  ·  Lv {}", player.avatar, name, player.level)
}

fn tap_power_line(session: &PlayerSession) -> String {
    let pending = session.batcher.pending();
    if pending > 0 {
        format!("+{} per tap  ·  {} syncing", session.player.tap_power, pending)
    } else {
        format!("+{} per tap", session.player.tap_power)
    }
}

/// Coin balance follows the presenter's coin updates
fn update_coins(
    mut events: EventReader<CoinsChanged>,
    mut query: Query<&mut Text, With<CoinsText>>,
) {
    let Some(CoinsChanged(coins)) = events.read().last() else {
        return;
    };
    if let Ok(mut text) = query.get_single_mut() {
        **text = format_compact(*coins);
    }
}

/// Name, level, xp and tap power follow the session
fn update_profile(
    session: Res<PlayerSession>,
    mut profile_text: Query<&mut Text, (With<ProfileText>, Without<TapPowerText>)>,
    mut power_text: Query<&mut Text, (With<TapPowerText>, Without<ProfileText>)>,
    mut xp_fill: Query<&mut Node, With<XpBarFill>>,
) {
    if !session.is_changed() {
        return;
    }

    if let Ok(mut text) = profile_text.get_single_mut() {
        **text = profile_line(&session);
    }
    if let Ok(mut text) = power_text.get_single_mut() {
        **text = tap_power_line(&session);
    }
    if let Ok(mut node) = xp_fill.get_single_mut() {
        node.width = Val::Percent(session.player.level_progress() * 100.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypetown::ClientConfig;

    #[test]
    fn test_hud_lines() {
        let mut session = PlayerSession::new(&ClientConfig::default());
        session.player.name = "Ada".into();
        session.player.avatar = "🎬".into();
        session.player.level = 3;
        session.player.tap_power = 4;

        assert_eq!(profile_line(&session), "🎬 Ada  ·  Lv 3");
        assert_eq!(tap_power_line(&session), "+4 per tap");

        let PlayerSession { player, batcher, .. } = &mut session;
        batcher.record_tap(player, hypetown::WorldPoint::default(), &mut ());
        assert_eq!(tap_power_line(&session), "+4 per tap  ·  1 syncing");
    }
}
