//! Keyboard and mouse state driving the fly camera.

use lumen_render::{FlyCamera, MovementDirection};
use std::collections::HashSet;
use winit::keyboard::KeyCode;

/// Movement command bound to a key, if any.
fn direction_for_key(key: KeyCode) -> Option<MovementDirection> {
    match key {
        KeyCode::KeyW => Some(MovementDirection::Forward),
        KeyCode::KeyS => Some(MovementDirection::Backward),
        KeyCode::KeyA => Some(MovementDirection::Left),
        KeyCode::KeyD => Some(MovementDirection::Right),
        KeyCode::Space => Some(MovementDirection::Up),
        KeyCode::ShiftLeft => Some(MovementDirection::Down),
        _ => None,
    }
}

/// Input state for the camera: held movement keys and the last cursor
/// position for delta computation.
pub struct CameraController {
    pub camera: FlyCamera,
    pressed: HashSet<KeyCode>,
    last_cursor: Option<(f64, f64)>,
}

impl CameraController {
    pub fn new(camera: FlyCamera) -> Self {
        Self {
            camera,
            pressed: HashSet::new(),
            last_cursor: None,
        }
    }

    /// Track a key transition. Keys without a movement binding are ignored.
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if direction_for_key(key).is_none() {
            return;
        }
        if pressed {
            self.pressed.insert(key);
        } else {
            self.pressed.remove(&key);
        }
    }

    /// Feed an absolute cursor position; the first sample only seeds the
    /// delta baseline.
    pub fn handle_cursor(&mut self, x: f64, y: f64) {
        if let Some((last_x, last_y)) = self.last_cursor {
            let dx = (x - last_x) as f32;
            let dy = (last_y - y) as f32;
            self.camera.rotate(dx, dy);
        }
        self.last_cursor = Some((x, y));
    }

    /// Step the camera once for every held movement key.
    pub fn apply_movement(&mut self) {
        let directions: Vec<MovementDirection> = self
            .pressed
            .iter()
            .filter_map(|&key| direction_for_key(key))
            .collect();
        for direction in directions {
            self.camera.advance(direction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn controller() -> CameraController {
        CameraController::new(FlyCamera::new(Vec3::ZERO, 0.01, 1.0))
    }

    #[test]
    fn held_key_moves_every_frame() {
        let mut ctl = controller();
        ctl.handle_key(KeyCode::Space, true);
        ctl.apply_movement();
        ctl.apply_movement();
        assert_eq!(ctl.camera.position.y, 2.0);

        ctl.handle_key(KeyCode::Space, false);
        ctl.apply_movement();
        assert_eq!(ctl.camera.position.y, 2.0);
    }

    #[test]
    fn unbound_keys_are_ignored() {
        let mut ctl = controller();
        ctl.handle_key(KeyCode::KeyQ, true);
        ctl.apply_movement();
        assert_eq!(ctl.camera.position, Vec3::ZERO);
    }

    #[test]
    fn first_cursor_sample_does_not_rotate() {
        let mut ctl = controller();
        let before = ctl.camera.look_dir();
        ctl.handle_cursor(400.0, 300.0);
        assert_eq!(ctl.camera.look_dir(), before);

        ctl.handle_cursor(410.0, 300.0);
        assert_ne!(ctl.camera.look_dir(), before);
    }

    #[test]
    fn opposing_keys_cancel_out() {
        let mut ctl = controller();
        ctl.handle_key(KeyCode::KeyW, true);
        ctl.handle_key(KeyCode::KeyS, true);
        ctl.apply_movement();
        assert!(ctl.camera.position.length() < 1e-6);
    }
}
