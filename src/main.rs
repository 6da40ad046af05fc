use anyhow::{Context, Result, anyhow};

use t20_chase::features::MatchState;
use t20_chase::predictor::PredictorContext;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let ctx = PredictorContext::load().context("load model and vocabulary artifacts")?;

    if args.iter().any(|a| a == "--list") {
        println!("Teams:");
        for team in ctx.teams().values() {
            println!("  {team}");
        }
        println!("Cities:");
        for city in ctx.cities().values() {
            println!("  {city}");
        }
        return Ok(());
    }

    let state = parse_match_state(&args)?;
    warn_if_unlisted(&ctx, &state);

    let prediction = ctx.predict_live(&state)?;
    println!(
        "{} win probability: {:.1}%",
        state.batting_team,
        prediction.win_probability * 100.0
    );
    println!(
        "{} win probability: {:.1}%",
        state.bowling_team,
        prediction.loss_probability * 100.0
    );
    println!(
        "runs left {} | balls left {} | wickets left {} | crr {:.2} | rrr {:.2}",
        prediction.runs_left,
        prediction.balls_left,
        prediction.wickets_left,
        prediction.crr,
        prediction.rrr
    );
    Ok(())
}

fn warn_if_unlisted(ctx: &PredictorContext, state: &MatchState) {
    if !ctx.teams().contains(&state.batting_team) {
        eprintln!(
            "[WARN] batting team '{}' is not in the team list; using the unknown bucket",
            state.batting_team
        );
    }
    if !ctx.teams().contains(&state.bowling_team) {
        eprintln!(
            "[WARN] bowling team '{}' is not in the team list; using the unknown bucket",
            state.bowling_team
        );
    }
    if !ctx.cities().contains(&state.city) {
        eprintln!(
            "[WARN] city '{}' is not in the city list; using the unknown bucket",
            state.city
        );
    }
}

fn parse_match_state(args: &[String]) -> Result<MatchState> {
    let batting_team = required_arg(args, "--batting-team")?;
    let bowling_team = required_arg(args, "--bowling-team")?;
    let city = required_arg(args, "--city")?;
    let target = parse_u32(&required_arg(args, "--target")?, "--target")?;
    let current_score = parse_u32(&required_arg(args, "--score")?, "--score")?;
    let overs_done = parse_overs(&required_arg(args, "--overs")?)?;
    let wickets_fallen = parse_wickets(&required_arg(args, "--wickets")?)?;

    Ok(MatchState {
        batting_team,
        bowling_team,
        city,
        target,
        current_score,
        overs_done,
        wickets_fallen,
    })
}

fn arg_value(args: &[String], name: &str) -> Option<String> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}=")) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn required_arg(args: &[String], name: &str) -> Result<String> {
    arg_value(args, name).ok_or_else(|| anyhow!("missing required argument {name}"))
}

fn parse_u32(raw: &str, name: &str) -> Result<u32> {
    raw.parse::<u32>()
        .map_err(|_| anyhow!("{name} expects a non-negative integer, got '{raw}'"))
}

fn parse_overs(raw: &str) -> Result<f64> {
    let overs = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("--overs expects a whole.tenths value like 8.5, got '{raw}'"))?;
    if !overs.is_finite() || !(0.0..=20.0).contains(&overs) {
        return Err(anyhow!("--overs must be between 0.0 and 20.0, got '{raw}'"));
    }
    Ok(overs)
}

fn parse_wickets(raw: &str) -> Result<u8> {
    let wickets = raw
        .parse::<u8>()
        .map_err(|_| anyhow!("--wickets expects an integer 0-10, got '{raw}'"))?;
    if wickets > 10 {
        return Err(anyhow!("--wickets must be between 0 and 10, got '{raw}'"));
    }
    Ok(wickets)
}

fn print_usage() {
    println!("t20_chase - live chase win probability");
    println!();
    println!("usage:");
    println!("  t20_chase --batting-team <name> --bowling-team <name> --city <name> \\");
    println!("            --target <runs> --score <runs> --overs <w.b> --wickets <n>");
    println!();
    println!("  t20_chase --list    show the configured team and city lists");
    println!();
    println!("example:");
    println!("  t20_chase --batting-team 'Chennai Super Kings' --bowling-team 'Mumbai Indians' \\");
    println!("            --city Chennai --target 180 --score 92 --overs 11.3 --wickets 4");
}
