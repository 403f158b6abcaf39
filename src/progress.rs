use rand::Rng;

/// Computes the next progress increment for the synthetic fill curve.
///
/// The curve decelerates in stages so the bar approaches 100 without
/// reaching it on its own; only the `[99, 100)` stage closes the remaining
/// gap exactly, and anything at or past 100 stays put.
pub(crate) fn next_increment<R: Rng>(current: f64, rng: &mut R) -> f64 {
    if current >= 100.0 {
        0.0
    } else if current < 25.0 {
        rng.gen_range(3.0..6.0)
    } else if current < 65.0 {
        rng.gen_range(0.0..3.0)
    } else if current < 90.0 {
        rng.gen_range(0.0..2.0)
    } else if current < 99.0 {
        0.5
    } else {
        100.0 - current
    }
}
