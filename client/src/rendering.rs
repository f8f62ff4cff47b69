use crate::assets::{AssetCache, AssetKey, AssetLoader};
use crate::error::ClientError;
use shared::{
    PlayerState, RaceSnapshot, CAR_SPRITE_HEIGHT, CAR_SPRITE_WIDTH, DEFAULT_CAR_TYPE,
    KNOWN_CAR_TYPES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Parses `#rgb`, `#rrggbb` and a handful of CSS color names.
    pub fn parse(css: &str) -> Option<Self> {
        let css = css.trim();
        if let Some(hex) = css.strip_prefix('#') {
            let digits: Vec<u8> = hex
                .chars()
                .map(|c| c.to_digit(16).map(|d| d as u8))
                .collect::<Option<_>>()?;
            return match digits.as_slice() {
                [r, g, b] => Some(Self::rgb(r * 17, g * 17, b * 17)),
                [r1, r2, g1, g2, b1, b2] => {
                    Some(Self::rgb(r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2))
                }
                _ => None,
            };
        }
        match css.to_ascii_lowercase().as_str() {
            "black" => Some(Self::rgb(0, 0, 0)),
            "white" => Some(Self::rgb(255, 255, 255)),
            "red" => Some(Self::rgb(255, 0, 0)),
            "green" => Some(Self::rgb(0, 128, 0)),
            "blue" => Some(Self::rgb(0, 0, 255)),
            "yellow" => Some(Self::rgb(255, 255, 0)),
            "orange" => Some(Self::rgb(255, 165, 0)),
            "purple" => Some(Self::rgb(128, 0, 128)),
            "cyan" => Some(Self::rgb(0, 255, 255)),
            "magenta" => Some(Self::rgb(255, 0, 255)),
            "gray" | "grey" => Some(Self::rgb(128, 128, 128)),
            _ => None,
        }
    }
}

pub const BACKGROUND: Rgba = Rgba::rgb(0x27, 0xae, 0x60);
pub const TRACK_PLACEHOLDER: Rgba = Rgba::rgb(0x27, 0xae, 0x60);
pub const FALLBACK_CAR: Rgba = Rgba::rgb(0xe7, 0x4c, 0x3c);
pub const CABIN: Rgba = Rgba::rgb(0x33, 0x33, 0x33);
pub const WHEEL: Rgba = Rgba::rgb(0x22, 0x22, 0x22);

/// A 2D immediate-mode drawing surface with a save/restore transform stack.
pub trait Canvas {
    type Image;

    fn size(&self) -> (f32, f32);
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, x: f32, y: f32);
    fn rotate(&mut self, radians: f32);
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba);
    fn draw_image(&mut self, image: &Self::Image, x: f32, y: f32, w: f32, h: f32);
    fn fill_text(&mut self, text: &str, x: f32, y: f32, size: f32, color: Rgba);
    fn decode_image(&self, bytes: &[u8]) -> Result<Self::Image, ClientError>;
}

/// Paints the track and every car of a snapshot.
pub struct Renderer<I> {
    assets: AssetCache<I>,
    sprites: bool,
}

impl<I> Renderer<I> {
    pub fn new(sprites: bool) -> Self {
        Self {
            assets: AssetCache::new(),
            sprites,
        }
    }

    pub fn assets(&self) -> &AssetCache<I> {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut AssetCache<I> {
        &mut self.assets
    }

    /// Requests the track and the known car sprites up front.
    pub fn preload(&mut self, loader: &mut dyn AssetLoader) {
        if !self.sprites {
            return;
        }
        self.request_once(AssetKey::Track, loader);
        for car_type in KNOWN_CAR_TYPES {
            if let Some(key) = AssetKey::car(car_type) {
                self.request_once(key, loader);
            }
        }
    }

    fn request_once(&mut self, key: AssetKey, loader: &mut dyn AssetLoader) {
        if self.assets.begin_load(&key) {
            loader.request(&key);
        }
    }

    pub fn render<C>(
        &mut self,
        canvas: &mut C,
        snapshot: Option<&RaceSnapshot>,
        loader: &mut dyn AssetLoader,
    ) where
        C: Canvas<Image = I>,
    {
        let (width, height) = canvas.size();
        canvas.fill_rect(0.0, 0.0, width, height, BACKGROUND);

        self.draw_track(canvas, width, height);

        // BTreeMap order: ascending player id, so overlapping cars keep a
        // stable z-order between frames.
        if let Some(snapshot) = snapshot {
            for player in snapshot.players.values() {
                self.draw_vehicle(canvas, player, loader);
            }
        }
    }

    fn draw_track<C>(&self, canvas: &mut C, width: f32, height: f32)
    where
        C: Canvas<Image = I>,
    {
        match self.sprites.then(|| self.assets.get(&AssetKey::Track)).flatten() {
            Some(track) => canvas.draw_image(track, 0.0, 0.0, width, height),
            None => canvas.fill_rect(0.0, 0.0, width, height, TRACK_PLACEHOLDER),
        }
    }

    fn draw_vehicle<C>(&mut self, canvas: &mut C, player: &PlayerState, loader: &mut dyn AssetLoader)
    where
        C: Canvas<Image = I>,
    {
        canvas.save();
        canvas.translate(player.x, player.y);
        canvas.rotate(player.orientation.to_radians());

        let mut missing = None;
        match self.sprites.then(|| AssetKey::car(car_type(player))).flatten() {
            Some(key) => match self.assets.get(&key) {
                Some(sprite) => canvas.draw_image(
                    sprite,
                    -CAR_SPRITE_WIDTH / 2.0,
                    -CAR_SPRITE_HEIGHT / 2.0,
                    CAR_SPRITE_WIDTH,
                    CAR_SPRITE_HEIGHT,
                ),
                None => {
                    draw_procedural_car(canvas, player);
                    missing = Some(key);
                }
            },
            None => draw_procedural_car(canvas, player),
        }

        canvas.restore();

        if let Some(key) = missing {
            self.request_once(key, loader);
        }
    }
}

fn car_type(player: &PlayerState) -> &str {
    if player.car_type.trim().is_empty() {
        DEFAULT_CAR_TYPE
    } else {
        &player.car_type
    }
}

/// Body, two cabin panels and four wheels, drawn around the origin.
fn draw_procedural_car<C: Canvas>(canvas: &mut C, player: &PlayerState) {
    let body = Rgba::parse(&player.color).unwrap_or(FALLBACK_CAR);
    canvas.fill_rect(-15.0, -8.0, 30.0, 16.0, body);

    canvas.fill_rect(5.0, -6.0, 8.0, 12.0, CABIN);
    canvas.fill_rect(-13.0, -6.0, 8.0, 12.0, CABIN);

    for (x, y) in [(-12.0, -10.0), (-12.0, 6.0), (7.0, -10.0), (7.0, 6.0)] {
        canvas.fill_rect(x, y, 5.0, 4.0, WHEEL);
    }
}
