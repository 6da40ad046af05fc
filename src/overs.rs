/// Deliveries in a full 20-over innings.
pub const BALLS_PER_INNINGS: u32 = 120;

/// Wickets available to a batting side.
pub const WICKETS_PER_INNINGS: u8 = 10;

/// Convert an overs value in whole.tenths notation into a ball count
/// (8.5 -> 53). The tenths digit is read directly as balls; a digit above 5
/// (e.g. 8.7) is not self-consistent with a 6-ball over but passes through
/// unchanged rather than erroring.
pub fn overs_to_balls(overs: f64) -> u32 {
    let overs = overs.max(0.0);
    let whole = overs.floor();
    let tenths = ((overs - whole) * 10.0).round() as u32;
    whole as u32 * 6 + tenths
}

/// Balls still to be bowled in the innings. Negative when the overs input is
/// past the 20-over limit; callers treat that as an input error.
pub fn balls_remaining(overs_done: f64) -> i64 {
    BALLS_PER_INNINGS as i64 - overs_to_balls(overs_done) as i64
}
