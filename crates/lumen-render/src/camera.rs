//! Free-flying camera.

use glam::Vec3;

/// Pitch limit, just short of straight up/down so the look direction
/// never collapses onto the world-up axis.
const PITCH_LIMIT: f32 = 1.4923_f32; // 85.5 degrees

/// Movement commands the camera understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementDirection {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// Yaw/pitch fly camera.
///
/// Horizontal movement is decoupled from pitch: forward/backward travel
/// along the look direction projected onto the ground plane, and up/down
/// along world up.
#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub position: Vec3,
    yaw: f32,
    pitch: f32,
    mouse_sensitivity: f32,
    movement_speed: f32,
}

impl FlyCamera {
    pub fn new(position: Vec3, mouse_sensitivity: f32, movement_speed: f32) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            mouse_sensitivity,
            movement_speed,
        }
    }

    /// Unit look direction derived from yaw and pitch.
    pub fn look_dir(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
    }

    /// Apply a mouse delta, scaled by sensitivity, clamping pitch.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw -= dx * self.mouse_sensitivity;
        self.pitch = (self.pitch + dy * self.mouse_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Take one movement step in the given direction.
    pub fn advance(&mut self, direction: MovementDirection) {
        let dir = self.look_dir();
        let right = dir.cross(Vec3::Y).normalize();
        let forward = Vec3::new(dir.x, 0.0, dir.z).normalize();

        let step = match direction {
            MovementDirection::Forward => forward,
            MovementDirection::Backward => -forward,
            MovementDirection::Left => -right,
            MovementDirection::Right => right,
            MovementDirection::Up => Vec3::Y,
            MovementDirection::Down => -Vec3::Y,
        };

        self.position += step * self.movement_speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_orientation_looks_along_x() {
        let camera = FlyCamera::new(Vec3::ZERO, 0.01, 1.0);
        let dir = camera.look_dir();
        assert_relative_eq!(dir.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(dir.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(dir.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn look_dir_stays_normalized() {
        let mut camera = FlyCamera::new(Vec3::ZERO, 0.01, 1.0);
        camera.rotate(123.0, -45.0);
        assert_relative_eq!(camera.look_dir().length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn pitch_never_reaches_vertical() {
        let mut camera = FlyCamera::new(Vec3::ZERO, 1.0, 1.0);
        camera.rotate(0.0, 1000.0);
        assert!(camera.pitch < std::f32::consts::FRAC_PI_2);
        camera.rotate(0.0, -5000.0);
        assert!(camera.pitch > -std::f32::consts::FRAC_PI_2);
        // Look direction must keep a horizontal component at the limit.
        let dir = camera.look_dir();
        assert!(dir.x.hypot(dir.z) > 1e-3);
    }

    #[test]
    fn forward_motion_ignores_pitch() {
        let mut camera = FlyCamera::new(Vec3::ZERO, 1.0, 2.0);
        camera.rotate(0.0, 0.5);
        camera.advance(MovementDirection::Forward);
        assert_relative_eq!(camera.position.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(camera.position.length(), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn vertical_motion_uses_world_up() {
        let mut camera = FlyCamera::new(Vec3::ZERO, 1.0, 3.0);
        camera.rotate(1.0, 0.3);
        camera.advance(MovementDirection::Up);
        assert_relative_eq!(camera.position, Vec3::new(0.0, 3.0, 0.0), epsilon = 1e-6);
        camera.advance(MovementDirection::Down);
        assert_relative_eq!(camera.position, Vec3::ZERO, epsilon = 1e-6);
    }

    #[test]
    fn strafing_is_perpendicular_to_forward() {
        let mut camera = FlyCamera::new(Vec3::ZERO, 1.0, 1.0);
        camera.rotate(0.7, 0.0);
        camera.advance(MovementDirection::Right);
        let right_step = camera.position;
        let forward = {
            let dir = camera.look_dir();
            Vec3::new(dir.x, 0.0, dir.z).normalize()
        };
        assert_relative_eq!(right_step.dot(forward), 0.0, epsilon = 1e-5);
    }
}
