#![deny(warnings)]

//! Headless CLI: builds a seeded demo galaxy, advances the trade
//! economy, and prints the resulting market prices.

use anyhow::Result;
use galaxy_core::{
    format_credits, validate_catalog, validate_galaxy, CommodityCatalog, EconomyIndex, Galaxy,
    JumpEdge, Planet, StarSystem, SystemId,
};
use galaxy_econ::EconConfig;
use galaxy_sim::{EconomySimulation, TIME_PER_TICK};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Demo commodity catalog. "Star Charts" is informational (base price
/// zero) and never simulates.
const DEMO_CATALOG: &str = r#"{
  "commodities": [
    { "name": "Food", "base_price": 20.0 },
    { "name": "Ore", "base_price": 60.0 },
    { "name": "Medicine", "base_price": 115.0 },
    { "name": "Industrial Goods", "base_price": 130.0 },
    { "name": "Luxury Goods", "base_price": 500.0 },
    { "name": "Star Charts", "base_price": 0.0 }
  ]
}"#;

fn parse_args() -> (usize, u64, u64) {
    let mut systems = 12usize;
    let mut seed = 42u64;
    let mut ticks = 24u64;
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--systems" => systems = it.next().and_then(|s| s.parse().ok()).unwrap_or(systems),
            "--seed" => seed = it.next().and_then(|s| s.parse().ok()).unwrap_or(seed),
            "--ticks" => ticks = it.next().and_then(|s| s.parse().ok()).unwrap_or(ticks),
            _ => {}
        }
    }
    (systems, seed, ticks)
}

/// A ring of systems with a few random chords, each hosting one planet
/// with seeded production leanings.
fn demo_galaxy(n: usize, n_goods: usize, seed: u64) -> Galaxy {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut systems: Vec<StarSystem> = (0..n)
        .map(|i| StarSystem {
            name: format!("System {i}"),
            planets: vec![Planet {
                name: format!("Planet {i}a"),
                prod_mods: (0..n_goods).map(|_| rng.gen_range(-10.0..10.0)).collect(),
            }],
            jumps: vec![
                JumpEdge {
                    target: SystemId((i + 1) % n),
                },
                JumpEdge {
                    target: SystemId((i + n - 1) % n),
                },
            ],
        })
        .collect();
    for _ in 0..n / 3 {
        let a = rng.gen_range(0..n);
        let b = rng.gen_range(0..n);
        if a != b {
            systems[a].jumps.push(JumpEdge { target: SystemId(b) });
            systems[b].jumps.push(JumpEdge { target: SystemId(a) });
        }
    }
    Galaxy { systems }
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let (n_systems, seed, ticks) = parse_args();
    info!(n_systems, seed, ticks, "starting demo economy");

    let catalog: CommodityCatalog = serde_json::from_str(DEMO_CATALOG)?;
    validate_catalog(&catalog)?;
    let index = EconomyIndex::from_catalog(&catalog);

    let galaxy = demo_galaxy(n_systems, index.len(), seed);
    validate_galaxy(&galaxy)?;

    let mut sim = EconomySimulation::new(index, EconConfig::default())?;
    sim.initialize(&galaxy)?;
    sim.advance(&galaxy, ticks * TIME_PER_TICK)?;

    let goods: Vec<String> = sim
        .index()
        .entries()
        .iter()
        .map(|e| e.name.clone())
        .collect();
    println!("{:<12} {:>10}  {}", "system", "credits", goods.join("  "));
    for (i, sys) in galaxy.systems.iter().enumerate() {
        let id = SystemId(i);
        let credits = format_credits(sim.credits(id)?.round() as i64, Some(2));
        let prices: Vec<String> = goods
            .iter()
            .map(|g| {
                sim.unit_price(g, id)
                    .map(|p| format!("{:>width$}", p, width = g.len()))
            })
            .collect::<Result<_, _>>()?;
        println!("{:<12} {:>10}  {}", sys.name, credits, prices.join("  "));
    }

    Ok(())
}
