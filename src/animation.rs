// animation.rs
//! Frame-time integrated bouncing for the album art and artist portrait.
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::{FRAME_RATE_NORMALISER, MAX_FRAME_DT, SPRITE_INITIAL_VELOCITY, Z_SWAP_PROBABILITY};

/// A bitmap-sized box moving inside the screen.
/// Invariant: `0 <= position <= bounds - size` on both axes.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedSprite {
    pub position: (f64, f64),
    pub velocity: (f64, f64), // px per 1/60 s
    pub size: (u32, u32),
    pub bounds: (u32, u32),
}

impl AnimatedSprite {
    pub fn new(size: (u32, u32), bounds: (u32, u32), position: (f64, f64), velocity: (f64, f64)) -> Self {
        let mut sprite = Self { position, velocity, size, bounds };
        sprite.clamp();
        sprite
    }

    /// Largest legal position; zero when the sprite does not fit.
    pub fn max_position(&self) -> (f64, f64) {
        (
            self.bounds.0.saturating_sub(self.size.0) as f64,
            self.bounds.1.saturating_sub(self.size.1) as f64,
        )
    }

    /// Art arrived at a different size; keep the sprite inside the screen.
    pub fn resize(&mut self, size: (u32, u32)) {
        self.size = size;
        self.clamp();
    }

    pub fn set_bounds(&mut self, bounds: (u32, u32)) {
        self.bounds = bounds;
        self.clamp();
    }

    fn clamp(&mut self) {
        let (mx, my) = self.max_position();
        let fix = |p: f64, m: f64| if p.is_finite() { p.clamp(0.0, m) } else { 0.0 };
        self.position = (fix(self.position.0, mx), fix(self.position.1, my));
    }

    /// Integrate one frame. Returns true when either axis bounced.
    pub fn step(&mut self, dt: f64, speed: f64) -> bool {
        let dt = if dt.is_finite() { dt.clamp(0.0, MAX_FRAME_DT) } else { 0.0 };
        let scale = dt * FRAME_RATE_NORMALISER * speed;
        let (mx, my) = self.max_position();
        let bx = bounce_axis(&mut self.position.0, &mut self.velocity.0, mx, scale);
        let by = bounce_axis(&mut self.position.1, &mut self.velocity.1, my, scale);
        bx || by
    }

    pub fn top_left(&self) -> (i32, i32) {
        (self.position.0.round() as i32, self.position.1.round() as i32)
    }
}

// elastic, frictionless: reflect the velocity and clamp inside
fn bounce_axis(pos: &mut f64, vel: &mut f64, max: f64, scale: f64) -> bool {
    if max <= 0.0 {
        // no room on this axis, so nothing moves or bounces
        *pos = 0.0;
        return false;
    }
    *pos += *vel * scale;
    if !pos.is_finite() {
        *pos = 0.0;
    }
    if *pos < 0.0 {
        *pos = 0.0;
        *vel = vel.abs();
        true
    } else if *pos > max {
        *pos = max;
        *vel = -vel.abs();
        true
    } else {
        false
    }
}

/// The two bouncing icons and their stacking order.
#[derive(Debug, Clone, PartialEq)]
pub struct SpritePair {
    pub album: AnimatedSprite,
    pub portrait: AnimatedSprite,
    pub album_in_front: bool,
}

impl SpritePair {
    pub fn new(bounds: (u32, u32), album_size: (u32, u32), portrait_size: (u32, u32)) -> Self {
        let (vx, vy) = SPRITE_INITIAL_VELOCITY;
        let album = AnimatedSprite::new(album_size, bounds, (0.0, 0.0), (vx, vy));
        let (mx, my) = album.max_position();
        // start the portrait in the opposite corner heading the other way
        let portrait = AnimatedSprite::new(portrait_size, bounds, (mx, my), (-vx, -vy));
        Self { album, portrait, album_in_front: true }
    }
}

/// Drives sprite integration from wall-clock deltas.
pub struct AnimationEngine {
    rng: StdRng,
    speed: f64,
    last_tick: Option<Instant>,
}

impl AnimationEngine {
    pub fn new(speed: f64) -> Self {
        Self { rng: StdRng::from_os_rng(), speed, last_tick: None }
    }

    /// Deterministic coin flips for tests.
    pub fn with_seed(speed: f64, seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), speed, last_tick: None }
    }

    /// Seconds since the previous call; zero on the first.
    pub fn frame_dt(&mut self, now: Instant) -> f64 {
        let dt = self
            .last_tick
            .map(|t| now.saturating_duration_since(t).as_secs_f64())
            .unwrap_or(0.0);
        self.last_tick = Some(now);
        dt
    }

    /// Forget the last tick, e.g. after the screen slept.
    pub fn reset_clock(&mut self) {
        self.last_tick = None;
    }

    /// Move both sprites. Each bounce flips a coin to swap the z-order.
    /// Returns true when anything moved or swapped.
    pub fn step(&mut self, sprites: &mut SpritePair, dt: f64) -> bool {
        let before = (sprites.album.position, sprites.portrait.position);
        let bounces = [
            sprites.album.step(dt, self.speed),
            sprites.portrait.step(dt, self.speed),
        ];
        let mut swapped = false;
        for _ in bounces.iter().filter(|b| **b) {
            if self.rng.random_bool(Z_SWAP_PROBABILITY) {
                sprites.album_in_front = !sprites.album_in_front;
                swapped = true;
            }
        }
        swapped || before != (sprites.album.position, sprites.portrait.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn within(sprite: &AnimatedSprite) -> bool {
        let (mx, my) = sprite.max_position();
        (0.0..=mx).contains(&sprite.position.0) && (0.0..=my).contains(&sprite.position.1)
    }

    #[test]
    fn test_step_integrates_velocity() {
        let mut s = AnimatedSprite::new((10, 10), (100, 100), (20.0, 20.0), (1.0, -0.5));
        // one 60Hz frame at speed 1 moves by exactly the velocity
        assert!(!s.step(1.0 / 60.0, 1.0));
        assert!((s.position.0 - 21.0).abs() < 1e-9);
        assert!((s.position.1 - 19.5).abs() < 1e-9);
    }

    #[test]
    fn test_bounce_reflects_and_clamps() {
        let mut s = AnimatedSprite::new((10, 10), (100, 50), (89.0, 10.0), (3.0, 0.0));
        assert!(s.step(1.0 / 60.0, 1.0));
        assert_eq!(s.position.0, 90.0);
        assert_eq!(s.velocity.0, -3.0);
        assert!(within(&s));
    }

    #[test]
    fn test_bounds_hold_for_arbitrary_dt() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let bounds = (rng.random_range(1..400), rng.random_range(1..300));
            let size = (rng.random_range(1..200), rng.random_range(1..200));
            let mut s = AnimatedSprite::new(
                size,
                bounds,
                (rng.random_range(-50.0..500.0), rng.random_range(-50.0..500.0)),
                (rng.random_range(-20.0..20.0), rng.random_range(-20.0..20.0)),
            );
            assert!(within(&s));
            for _ in 0..500 {
                let dt = match rng.random_range(0..4) {
                    0 => 0.0,
                    1 => rng.random_range(0.0..0.1),
                    2 => rng.random_range(0.0..1000.0),
                    _ => -rng.random_range(0.0..1.0),
                };
                s.step(dt, rng.random_range(0.0..3.0));
                assert!(within(&s), "{s:?}");
            }
        }
    }

    #[test]
    fn test_oversized_sprite_pins_to_origin() {
        let mut s = AnimatedSprite::new((200, 200), (100, 100), (5.0, 5.0), (2.0, 2.0));
        assert_eq!(s.position, (0.0, 0.0));
        assert!(!s.step(0.1, 1.0));
        assert_eq!(s.position, (0.0, 0.0));
    }

    #[test]
    fn test_pinned_sprites_never_swap_z_order() {
        let mut engine = AnimationEngine::with_seed(1.0, 11);
        // both sprites fill the panel exactly
        let mut pair = SpritePair::new((32, 32), (32, 32), (40, 40));
        for _ in 0..500 {
            assert!(!engine.step(&mut pair, 1.0 / 30.0));
        }
        assert!(pair.album_in_front);
        assert_eq!(pair.album.position, (0.0, 0.0));
    }

    #[test]
    fn test_resize_keeps_sprite_inside() {
        let mut s = AnimatedSprite::new((10, 10), (100, 100), (90.0, 90.0), (0.0, 0.0));
        s.resize((40, 40));
        assert_eq!(s.position, (60.0, 60.0));
    }

    #[test]
    fn test_bounces_eventually_swap_z_order() {
        let mut engine = AnimationEngine::with_seed(1.0, 7);
        let mut pair = SpritePair::new((40, 30), (20, 20), (10, 10));
        let start = pair.album_in_front;
        let mut seen_swap = false;
        for _ in 0..2000 {
            engine.step(&mut pair, 1.0 / 30.0);
            if pair.album_in_front != start {
                seen_swap = true;
            }
            assert!(within(&pair.album) && within(&pair.portrait));
        }
        assert!(seen_swap);
    }

    #[test]
    fn test_frame_dt_starts_at_zero() {
        let mut engine = AnimationEngine::with_seed(1.0, 1);
        let t0 = Instant::now();
        assert_eq!(engine.frame_dt(t0), 0.0);
        let dt = engine.frame_dt(t0 + std::time::Duration::from_millis(50));
        assert!((dt - 0.05).abs() < 1e-9);
    }
}
