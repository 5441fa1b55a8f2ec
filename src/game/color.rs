use rand::Rng;

/// Bright `#rrggbb` color: random hue, full saturation, lightness 0.5..0.7,
/// every channel floored at 100 so snakes stay visible on a dark board.
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> String {
  let hue = rng.gen::<f64>() * 360.0;
  let lightness = 0.5 + rng.gen::<f64>() * 0.2;
  let (r, g, b) = hsl_to_rgb(hue, 1.0, lightness);
  format!("#{:02x}{:02x}{:02x}", r.max(100), g.max(100), b.max(100))
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> (u8, u8, u8) {
  let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
  let x = chroma * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
  let m = lightness - chroma / 2.0;
  let (r, g, b) = match hue {
    h if h < 60.0 => (chroma, x, 0.0),
    h if h < 120.0 => (x, chroma, 0.0),
    h if h < 180.0 => (0.0, chroma, x),
    h if h < 240.0 => (0.0, x, chroma),
    h if h < 300.0 => (x, 0.0, chroma),
    _ => (chroma, 0.0, x),
  };
  let channel = |value: f64| ((value + m) * 255.0).clamp(0.0, 255.0) as u8;
  (channel(r), channel(g), channel(b))
}
