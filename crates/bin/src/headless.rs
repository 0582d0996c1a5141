//! Chunkman headless - joins the chunked world and wanders the maze.

mod bot;
mod http;
mod settings;
mod socket;
mod store;

use std::path::Path;
use std::time::{Duration, Instant};

use client::network::{CachedDirectory, CachedMaps};
use client::{Backends, GameLoop, Identity};
use protocol::Color;
use tokio::time::MissedTickBehavior;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bot::Wanderer;
use http::{HttpDirectory, HttpMaps};
use socket::SocketTransport;
use store::FileStore;

const CONFIG_PATH: &str = "headless.toml";
const SESSION_PATH: &str = "headless-session.json";
const FRAME: Duration = Duration::from_millis(16);
const REPORT_EVERY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,client=debug")),
        )
        .init();

    info!("Chunkman headless client v{}", env!("CARGO_PKG_VERSION"));

    let config = settings::load(Path::new(CONFIG_PATH))?;
    info!("Loaded configuration");
    info!("  Directory: {}", config.network.directory_url);
    info!("  World: {}x{} chunks", config.world.extent_width, config.world.extent_height);
    info!("  Spawn chunk: {}", config.world.spawn_chunk);

    let backends = Backends {
        directory: Box::new(CachedDirectory::new(HttpDirectory::new(&config.network.directory_url))),
        maps: Box::new(CachedMaps::new(HttpMaps::new())),
        transport: Box::new(SocketTransport),
    };
    let identity = Identity {
        id: format!("bot-{:08x}", rand::random::<u32>()),
        color: Color::new(rand::random(), rand::random(), rand::random()),
    };
    let mut bot = Wanderer::new(rand::random());
    let mut game = GameLoop::new(config, backends, Box::new(FileStore::new(SESSION_PATH)), identity);

    let start = Instant::now();
    let mut last_report = start;
    let mut ticker = tokio::time::interval(FRAME);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stuck = game.player().is_some_and(|p| p.velocity.length_squared() == 0.0);
                bot.steer(game.input_mut(), stuck);
                game.tick(start.elapsed().as_secs_f64() * 1000.0);

                if game.is_over() {
                    info!("Game over");
                    break;
                }
                if last_report.elapsed() >= REPORT_EVERY {
                    last_report = Instant::now();
                    if let Some(player) = game.player() {
                        info!(
                            "Chunk {} at ({:.0}, {:.0}), score {}, lives {}, {} remote entities",
                            player.chunk,
                            player.position.x,
                            player.position.y,
                            player.score,
                            player.lives,
                            game.remotes().len()
                        );
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                game.shutdown();
                break;
            }
        }
    }

    // Give socket tasks a moment to flush the departure notice.
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}
