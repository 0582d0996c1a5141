// Small math helpers shared by motion and interpolation
use glam::Vec2;

/// Linear interpolation between two points
#[inline]
pub fn lerp(a: Vec2, b: Vec2, t: f32) -> Vec2 {
    a + (b - a) * t
}

/// Clamp a value between min and max
#[inline]
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

/// Milliseconds elapsed, saturating at zero for clocks that went backwards.
#[inline]
pub fn elapsed_ms(now: f64, since: f64) -> f64 {
    (now - since).max(0.0)
}
