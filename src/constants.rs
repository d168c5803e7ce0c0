//! Tuned constants shared by the pipeline, animation and render modules.
//! Values are visual tuning, keep them named rather than re-deriving them.

// background composite
/// Side of the swatch the art is squashed to before averaging.
pub const SWATCH_SIZE: u32 = 8;
/// Canvas fill is the swatch average darkened by this much.
pub const SWATCH_DARKEN: f32 = 0.30;
/// Gaussian sigma applied to the height-scaled art.
pub const BACKGROUND_BLUR_SIGMA: f32 = 10.0;
/// Brightness kept after blurring.
pub const BACKGROUND_DIM: f32 = 0.60;
/// Width in pixels of the horizontal fade on each side of the blurred art.
pub const FADE_WIDTH: u32 = 60;
/// Falloff exponent of the fade mask.
pub const FADE_EXPONENT: f32 = 0.7;
/// Base colour of the synthesized gradient when no art is available.
pub const GRADIENT_BASE: [u8; 3] = [36, 40, 58];
/// Bottom row brightness of the synthesized gradient.
pub const GRADIENT_FLOOR: f32 = 0.35;

// accent colours
/// Side of the downsampled square used for colour statistics.
pub const ACCENT_SAMPLE_SIZE: u32 = 50;
pub const ACCENT_SAT_BOOST: f32 = 0.3;
pub const ACCENT_SAT_MAX: f32 = 0.9;
/// Hue step from primary to secondary accent.
pub const ACCENT_SECONDARY_HUE_SHIFT: f32 = 0.12;
pub const ACCENT_SECONDARY_SAT_SCALE: f32 = 0.85;
pub const ACCENT_SECONDARY_VAL_SCALE: f32 = 0.9;

/// Deterministic stand-in when a transform fails.
pub const FALLBACK_COLOR: [u8; 3] = [24, 24, 24];
/// Drawn where an artifact has not arrived yet.
pub const PLACEHOLDER_COLOR: [u8; 3] = [48, 48, 48];
/// Default text colours when no accents are known.
pub const DEFAULT_PRIMARY_TEXT: [u8; 3] = [240, 240, 240];
pub const DEFAULT_SECONDARY_TEXT: [u8; 3] = [170, 170, 170];

// animation
/// Velocities are expressed per 1/60 s frame.
pub const FRAME_RATE_NORMALISER: f64 = 60.0;
/// Chance of swapping sprite z-order on a bounce.
pub const Z_SWAP_PROBABILITY: f64 = 0.5;
/// Upper bound on a single integration step, seconds.
pub const MAX_FRAME_DT: f64 = 0.25;
pub const SPRITE_INITIAL_VELOCITY: (f64, f64) = (1.0, 0.75);

// scrolling
/// Pixels advanced per scroll tick.
pub const SCROLL_STEP: u32 = 2;
/// Gap between the end of a looping ticker and its repeat.
pub const SCROLL_LOOP_GAP: u32 = 12;

// rate control
pub const MIN_FPS_FLOOR: u32 = 5;
/// Backoff exponent stops growing after this many doublings.
pub const BACKOFF_MAX_DOUBLINGS: u32 = 2;

// input
/// Minimum gap between accepted presses of the same control, ms.
pub const INPUT_DEBOUNCE_MS: u64 = 300;
