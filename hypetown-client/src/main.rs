//! HYPETOWN - Tap-to-Earn Mini App Client
//!
//! Tap the character to earn coins. Taps are credited on screen right away
//! and synced to the backend in batches.

mod game;
mod network;
mod ui;

use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::prelude::*;
use bevy::render::camera::ScalingMode;
use bevy::window::WindowMode;

use game::GamePlugin;
use network::SyncPlugin;
use ui::UiPlugin;

/// App states
#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum AppState {
    /// Waiting for the initial state load.
    #[default]
    Loading,
    /// Tapping.
    Playing,
}

fn main() {
    App::new()
        // Portrait window, like the Telegram webview
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "HYPETOWN".into(),
                resolution: (540., 960.).into(),
                mode: WindowMode::Windowed,
                ..default()
            }),
            ..default()
        }))
        // Async runtime for HTTP sync
        .add_plugins(bevy_tokio_tasks::TokioTasksPlugin::default())
        .init_state::<AppState>()
        .add_plugins((SyncPlugin, GamePlugin, UiPlugin))
        .add_systems(Startup, setup_2d_camera)
        .run();
}

fn setup_2d_camera(mut commands: Commands) {
    commands.spawn((
        Camera2d,
        Camera {
            clear_color: ClearColorConfig::Custom(Color::srgb(0.07, 0.05, 0.12)),
            ..default()
        },
        OrthographicProjection {
            scaling_mode: ScalingMode::FixedVertical { viewport_height: 960.0 },
            ..OrthographicProjection::default_2d()
        },
        Tonemapping::None,
    ));

    info!("HYPETOWN v{} initialized", hypetown::VERSION);
}
