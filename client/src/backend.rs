//! macroquad implementation of [`Canvas`] plus key-name mapping for the window.

use crate::error::ClientError;
use crate::rendering::{Canvas, Rgba};
use macroquad::prelude::*;

/// Accumulated translate + rotate, mapping local coordinates to the screen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub tx: f32,
    pub ty: f32,
    pub angle: f32,
}

impl Transform {
    pub fn translate(&mut self, x: f32, y: f32) {
        let (sin, cos) = self.angle.sin_cos();
        self.tx += x * cos - y * sin;
        self.ty += x * sin + y * cos;
    }

    pub fn rotate(&mut self, radians: f32) {
        self.angle += radians;
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let (sin, cos) = self.angle.sin_cos();
        (self.tx + x * cos - y * sin, self.ty + x * sin + y * cos)
    }
}

#[derive(Default)]
pub struct MacroquadCanvas {
    current: Transform,
    stack: Vec<Transform>,
}

impl MacroquadCanvas {
    pub fn new() -> Self {
        Self::default()
    }
}

fn color(c: Rgba) -> Color {
    Color::from_rgba(c.r, c.g, c.b, c.a)
}

impl Canvas for MacroquadCanvas {
    type Image = Texture2D;

    fn size(&self) -> (f32, f32) {
        (screen_width(), screen_height())
    }

    fn save(&mut self) {
        self.stack.push(self.current);
    }

    fn restore(&mut self) {
        self.current = self.stack.pop().unwrap_or_default();
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.current.translate(x, y);
    }

    fn rotate(&mut self, radians: f32) {
        self.current.rotate(radians);
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, c: Rgba) {
        let (cx, cy) = self.current.apply(x + w / 2.0, y + h / 2.0);
        draw_rectangle_ex(
            cx,
            cy,
            w,
            h,
            DrawRectangleParams {
                offset: vec2(0.5, 0.5),
                rotation: self.current.angle,
                color: color(c),
            },
        );
    }

    fn draw_image(&mut self, image: &Texture2D, x: f32, y: f32, w: f32, h: f32) {
        let (cx, cy) = self.current.apply(x + w / 2.0, y + h / 2.0);
        draw_texture_ex(
            image,
            cx - w / 2.0,
            cy - h / 2.0,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(w, h)),
                rotation: self.current.angle,
                ..Default::default()
            },
        );
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, size: f32, c: Rgba) {
        let (sx, sy) = self.current.apply(x, y);
        draw_text(text, sx, sy, size, color(c));
    }

    fn decode_image(&self, bytes: &[u8]) -> Result<Texture2D, ClientError> {
        let image = Image::from_file_with_format(bytes, None).map_err(|e| ClientError::Asset {
            path: "<memory>".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Texture2D::from_image(&image))
    }
}

/// Lowercase name for a key the session understands.
pub fn key_name(key: KeyCode) -> Option<&'static str> {
    let name = match key {
        KeyCode::A => "a",
        KeyCode::B => "b",
        KeyCode::C => "c",
        KeyCode::D => "d",
        KeyCode::E => "e",
        KeyCode::F => "f",
        KeyCode::G => "g",
        KeyCode::H => "h",
        KeyCode::I => "i",
        KeyCode::J => "j",
        KeyCode::K => "k",
        KeyCode::L => "l",
        KeyCode::M => "m",
        KeyCode::N => "n",
        KeyCode::O => "o",
        KeyCode::P => "p",
        KeyCode::Q => "q",
        KeyCode::R => "r",
        KeyCode::S => "s",
        KeyCode::T => "t",
        KeyCode::U => "u",
        KeyCode::V => "v",
        KeyCode::W => "w",
        KeyCode::X => "x",
        KeyCode::Y => "y",
        KeyCode::Z => "z",
        KeyCode::Key0 => "0",
        KeyCode::Key1 => "1",
        KeyCode::Key2 => "2",
        KeyCode::Key3 => "3",
        KeyCode::Key4 => "4",
        KeyCode::Key5 => "5",
        KeyCode::Key6 => "6",
        KeyCode::Key7 => "7",
        KeyCode::Key8 => "8",
        KeyCode::Key9 => "9",
        KeyCode::Up => "arrowup",
        KeyCode::Down => "arrowdown",
        KeyCode::Left => "arrowleft",
        KeyCode::Right => "arrowright",
        KeyCode::Space => " ",
        _ => return None,
    };
    Some(name)
}
