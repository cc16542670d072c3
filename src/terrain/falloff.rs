use std::str::FromStr;

/// How the strength of an edit fades towards the edge of the brush.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Falloff {
    #[default]
    Constant,
    Linear,
    Sharp,
    Root,
    Sphere,
    Smooth,
}

impl Falloff {
    /// Scales `value` by the curve at `t`, where `t` is 1 at the brush center and 0 at its edge.
    pub fn apply(self, value: f32, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let factor = match self {
            Falloff::Constant => 1.0,
            Falloff::Linear => t,
            Falloff::Sharp => t * t,
            Falloff::Root => t.sqrt(),
            Falloff::Sphere => (2.0 * t - t * t).sqrt(),
            Falloff::Smooth => 3.0 * t * t - 2.0 * t * t * t,
        };
        value * factor
    }
}

impl FromStr for Falloff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "constant" => Ok(Falloff::Constant),
            "linear" => Ok(Falloff::Linear),
            "sharp" => Ok(Falloff::Sharp),
            "root" => Ok(Falloff::Root),
            "sphere" => Ok(Falloff::Sphere),
            "smooth" => Ok(Falloff::Smooth),
            _ => Err(format!("Unknown falloff {}", s)),
        }
    }
}
