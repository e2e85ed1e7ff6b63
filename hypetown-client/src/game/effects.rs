//! Visual effects - tap particles and floating reward text

use bevy::prelude::*;

use super::{Bounce, Character, TapFeedback};

const PARTICLE_COUNT: usize = 6;
const PARTICLE_LIFETIME: f32 = 0.5;
const FLOAT_LIFETIME: f32 = 0.8;
const FLOAT_SPEED: f32 = 140.0;

/// Short-lived spark emitted by a tap
#[derive(Component)]
pub struct TapParticle {
    pub velocity: Vec2,
    pub lifetime: f32,
}

/// "+N" text rising from the tap point
#[derive(Component)]
pub struct FloatingText {
    pub lifetime: f32,
}

/// Play bounce, particles and floating text for each credited tap
pub fn play_tap_feedback(
    mut commands: Commands,
    mut events: EventReader<TapFeedback>,
    mut characters: Query<&mut Bounce, With<Character>>,
) {
    for TapFeedback(reaction) in events.read() {
        for mut bounce in characters.iter_mut() {
            bounce.restart();
        }

        let origin = Vec2::new(reaction.point.x, reaction.point.y);

        // Burst of particles
        for i in 0..PARTICLE_COUNT {
            let angle = (i as f32 / PARTICLE_COUNT as f32) * std::f32::consts::TAU
                + rand::random::<f32>() * 0.5;
            let speed = 160.0 + rand::random::<f32>() * 80.0;

            commands.spawn((
                TapParticle {
                    velocity: Vec2::new(angle.cos(), angle.sin()) * speed,
                    lifetime: PARTICLE_LIFETIME,
                },
                Sprite {
                    color: Color::srgb(1.0, 0.85, 0.3),
                    custom_size: Some(Vec2::splat(8.0 + rand::random::<f32>() * 6.0)),
                    ..default()
                },
                Transform::from_translation(origin.extend(20.0)),
            ));
        }

        commands.spawn((
            FloatingText { lifetime: FLOAT_LIFETIME },
            Text2d::new(reaction.floating_text()),
            TextFont {
                font_size: 40.0,
                ..default()
            },
            TextColor(Color::srgb(1.0, 0.9, 0.4)),
            Transform::from_translation((origin + Vec2::new(0.0, 30.0)).extend(30.0)),
        ));
    }
}

/// Move, fade and despawn particles
pub fn update_particles(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut TapParticle, &mut Transform, &mut Sprite)>,
) {
    let dt = time.delta_secs();

    for (entity, mut particle, mut transform, mut sprite) in query.iter_mut() {
        transform.translation += (particle.velocity * dt).extend(0.0);
        particle.velocity *= 0.92;
        particle.lifetime -= dt;

        if particle.lifetime <= 0.0 {
            commands.entity(entity).despawn();
            continue;
        }

        sprite.color = sprite.color.with_alpha(particle.lifetime / PARTICLE_LIFETIME);
    }
}

/// Rise, fade and despawn floating text
pub fn update_floating_text(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut FloatingText, &mut Transform, &mut TextColor)>,
) {
    let dt = time.delta_secs();

    for (entity, mut text, mut transform, mut color) in query.iter_mut() {
        transform.translation.y += FLOAT_SPEED * dt;
        text.lifetime -= dt;

        if text.lifetime <= 0.0 {
            commands.entity(entity).despawn();
            continue;
        }

        color.0 = color.0.with_alpha(text.lifetime / FLOAT_LIFETIME);
    }
}
