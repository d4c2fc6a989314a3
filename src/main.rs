//! Voidclash - Entry Point
//!
//! Runs a full game between in-process settler bots: generates a map from
//! the seed, drives the engine to completion, writes the replay artifact
//! and prints the standings.

use std::path::PathBuf;

use clap::Parser;

use voidclash::core::config::GameConstants;
use voidclash::core::error::Result;
use voidclash::engine::Game;
use voidclash::mapgen;
use voidclash::players::bots::SettlerController;
use voidclash::players::PlayerController;
use voidclash::replay::writer::write_replay;

/// Deterministic fleet-arena game server (local bots).
#[derive(Parser, Debug)]
#[command(name = "voidclash")]
#[command(about = "Run a deterministic fleet-arena game and write a replay")]
struct Args {
    /// Map width in world units
    #[arg(long, default_value_t = 240.0)]
    width: f64,

    /// Map height in world units
    #[arg(long, default_value_t = 160.0)]
    height: f64,

    /// Number of players
    #[arg(long, default_value_t = 2)]
    players: usize,

    /// Map generation seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Optional TOML file overriding game constants
    #[arg(long)]
    constants: Option<PathBuf>,

    /// Replay output path (defaults to replay-<seed>.json)
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Skip writing the replay artifact
    #[arg(long)]
    no_replay: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voidclash=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut constants = GameConstants::default();
    if let Some(path) = &args.constants {
        let text = std::fs::read_to_string(path)?;
        constants = GameConstants::from_toml_str(&text)?;
    }

    let generated = mapgen::solar_system(
        &constants,
        args.width,
        args.height,
        args.players,
        args.seed,
    );

    let controllers: Vec<Box<dyn PlayerController>> = (0..args.players)
        .map(|player| {
            Box::new(SettlerController::new(
                format!("settler-{player}"),
                constants.clone(),
            )) as Box<dyn PlayerController>
        })
        .collect();

    let mut game = Game::new(
        constants,
        generated.map,
        args.seed,
        generated.generator,
        generated.points_of_interest,
        controllers,
    )?;
    let stats = game.run()?;

    if !args.no_replay {
        let path = args
            .replay
            .unwrap_or_else(|| PathBuf::from(format!("replay-{}.json", args.seed)));
        write_replay(&path, &game.replay_header(), game.transcript(), &stats)?;
        println!("Replay written to {}", path.display());
    }

    println!("Seed: {}  Turns: {}", args.seed, game.turn_number());
    println!("--- Standings ---");
    let mut standings = stats.player_statistics.clone();
    standings.sort_by_key(|player| player.rank);
    for player in &standings {
        println!(
            "#{} {} - ships {}, damage {}{}",
            player.rank,
            game.player_names()[player.tag as usize],
            player.total_ship_count,
            player.damage_dealt,
            if stats.timeout_tags.contains(&player.tag) {
                " (timed out)"
            } else {
                ""
            },
        );
    }

    Ok(())
}
