use voidclash::core::config::GameConstants;
use voidclash::engine::Game;
use voidclash::mapgen;
use voidclash::players::bots::SettlerController;
use voidclash::players::PlayerController;

fn main() {
    for seed in [1u64, 2u64] {
        eprintln!("seed {seed}");
        let constants = GameConstants::default();
        let generated = mapgen::solar_system(&constants, 80.0, 60.0, 2, seed);
        let controllers: Vec<Box<dyn PlayerController>> = (0..2)
            .map(|player| {
                Box::new(SettlerController::new(format!("settler-{player}"), constants.clone()))
                    as Box<dyn PlayerController>
            })
            .collect();
        let mut game = Game::new(constants, generated.map, seed, generated.generator, generated.points_of_interest, controllers).unwrap();
        eprintln!("running seed {seed}");
        let stats = game.run().unwrap();
        eprintln!("done seed {seed} turns");
        let _ = stats;
    }
}
