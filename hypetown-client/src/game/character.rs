//! Character card and its bounce animation

use bevy::prelude::*;

use hypetown::{Archetype, CharacterModel};

use crate::network::{CharacterReady, PlayerSession};

/// Size of the character card in world units.
pub const CHARACTER_SIZE: Vec2 = Vec2::new(300.0, 420.0);

const BOUNCE_DURATION: f32 = 0.18;
const BOUNCE_SCALE: f32 = 0.12;

/// The tappable character
#[derive(Component)]
pub struct Character;

/// Label under the character showing the model source
#[derive(Component)]
pub struct ModelLabel;

/// Punch-scale animation, restarted on every tap
#[derive(Component, Default)]
pub struct Bounce {
    pub elapsed: f32,
    pub active: bool,
}

impl Bounce {
    pub fn restart(&mut self) {
        self.elapsed = 0.0;
        self.active = true;
    }

    /// Scale factor at the current point of the animation.
    pub fn scale(&self) -> f32 {
        if !self.active {
            return 1.0;
        }
        let t = (self.elapsed / BOUNCE_DURATION).clamp(0.0, 1.0);
        1.0 + BOUNCE_SCALE * (t * std::f32::consts::PI).sin()
    }
}

/// Card color per archetype
pub fn archetype_color(archetype: Archetype) -> Color {
    match archetype {
        Archetype::Director => Color::srgb(0.85, 0.25, 0.3),
        Archetype::Streamer => Color::srgb(0.55, 0.3, 0.95),
        Archetype::Producer => Color::srgb(0.2, 0.75, 0.6),
        Archetype::Magnate => Color::srgb(0.95, 0.7, 0.2),
        Archetype::Blogger => Color::srgb(0.95, 0.4, 0.7),
        Archetype::Journalist => Color::srgb(0.3, 0.55, 0.95),
    }
}

/// Spawn the character card; its look is filled in once the model resolves.
pub fn spawn_character(
    mut commands: Commands,
    session: Res<PlayerSession>,
    mut ready: EventWriter<CharacterReady>,
) {
    let archetype = session.player.archetype;

    commands.spawn((
        Character,
        Bounce::default(),
        Name::new("Character"),
        Sprite {
            color: archetype_color(archetype),
            custom_size: Some(CHARACTER_SIZE),
            ..default()
        },
        Transform::from_xyz(0.0, -40.0, 10.0),
    )).with_children(|parent| {
        parent.spawn((
            ModelLabel,
            Text2d::new(archetype.as_str().to_uppercase()),
            TextFont {
                font_size: 28.0,
                ..default()
            },
            TextColor(Color::WHITE),
            Transform::from_xyz(0.0, -CHARACTER_SIZE.y / 2.0 - 30.0, 1.0),
        ));
    });

    info!("Character spawned ({})", archetype);

    // The model may have resolved before the card existed.
    if let Some(model) = &session.character {
        ready.send(CharacterReady(model.clone()));
    }
}

/// Restyle the card when the character model resolves.
pub fn apply_character_model(
    mut events: EventReader<CharacterReady>,
    mut cards: Query<&mut Sprite, With<Character>>,
    mut labels: Query<&mut Text2d, With<ModelLabel>>,
) {
    for CharacterReady(model) in events.read() {
        let (color, label) = match model {
            CharacterModel::Remote { bytes, .. } => (
                Color::srgb(1.0, 0.85, 0.35),
                format!("CUSTOM ({} KB)", bytes.len() / 1024),
            ),
            CharacterModel::Default(archetype) => (
                archetype_color(*archetype),
                archetype.as_str().to_uppercase(),
            ),
        };

        for mut sprite in cards.iter_mut() {
            sprite.color = color;
        }
        for mut text in labels.iter_mut() {
            **text = label.clone();
        }
    }
}

/// Advance the bounce animation
pub fn animate_bounce(
    time: Res<Time>,
    mut query: Query<(&mut Bounce, &mut Transform), With<Character>>,
) {
    for (mut bounce, mut transform) in query.iter_mut() {
        if !bounce.active {
            continue;
        }
        bounce.elapsed += time.delta_secs();
        if bounce.elapsed >= BOUNCE_DURATION {
            bounce.active = false;
        }
        transform.scale = Vec3::splat(bounce.scale());
    }
}
