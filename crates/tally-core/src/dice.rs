use rand::{thread_rng, Rng};

/// Upper bound on dice per roll; larger requests are clamped, not rejected.
pub const MAX_DICE: u32 = 15;

/// A parsed `NdM` roll request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RollSpec {
    pub count: u32,
    pub sides: u32,
}

/// Parse `"2d20"`-style input. Returns None for anything that is not
/// `<count>d<sides>` with both parts positive integers.
pub fn parse_roll(raw: &str) -> Option<RollSpec> {
    let (count, sides) = raw.split_once('d')?;
    let count: u32 = count.trim().parse().ok()?;
    let sides: u32 = sides.trim().parse().ok()?;
    if count == 0 || sides == 0 {
        return None;
    }
    Some(RollSpec {
        count: count.min(MAX_DICE),
        sides,
    })
}

/// Roll the dice and render the result as `3+4+5 = 12`.
pub fn roll(spec: RollSpec) -> String {
    let mut rng = thread_rng();
    let rolls: Vec<u32> = (0..spec.count)
        .map(|_| rng.gen_range(1..=spec.sides))
        .collect();
    let total: u32 = rolls.iter().sum();

    let detail = rolls
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("+");
    format!("{detail} = {total}")
}
