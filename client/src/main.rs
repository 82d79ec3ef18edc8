use clap::Parser;
use client::mesh::{OutputMode, VoiceEngine};
use client::network::Session;
use client::world::ClientWorld;
use client::VoiceError;
use log::{info, warn};
use serde_json::Value;
use shared::{sanitize_name, PlayerId, Vec3, DEFAULT_NAME, EYE_HEIGHT, SPAWN_Z_MIN};
use std::time::{Duration, Instant};
use tokio::time::interval;

/// Radius of the circle the bot walks, in world units
const WALK_RADIUS: f32 = 1.5;
/// Angular speed around the circle, radians per second
const WALK_RATE: f32 = 0.6;

/// Headless participant: joins the room, walks in a circle and attacks on a timer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket endpoint of the room server
    #[arg(short = 's', long, env = "HUDDLE_SERVER", default_value = "ws://127.0.0.1:8080/ws")]
    server: String,

    /// Display name shown to other participants
    #[arg(short = 'n', long, env = "HUDDLE_NAME", default_value = DEFAULT_NAME)]
    name: String,

    /// Update loop frequency in Hz
    #[arg(short = 't', long, default_value = "60")]
    tick_rate: u32,

    /// Seconds between scripted attacks (0 disables)
    #[arg(short = 'a', long, default_value = "0")]
    attack_every: f32,
}

/// There is no microphone in headless mode
struct NoAudioDevice;

impl VoiceEngine for NoAudioDevice {
    type Link = ();

    fn start_capture(&mut self) -> Result<(), VoiceError> {
        Err(VoiceError::PermissionDenied(
            "no capture device in headless mode".to_string(),
        ))
    }

    fn open_link(&mut self, peer: &PlayerId) -> Result<(), VoiceError> {
        Err(VoiceError::UnknownPeer(peer.clone()))
    }

    fn create_offer(&mut self, _link: &mut ()) -> Result<Value, VoiceError> {
        Err(VoiceError::Negotiation("audio unavailable".to_string()))
    }

    fn accept_offer(&mut self, _link: &mut (), _offer: Value) -> Result<Value, VoiceError> {
        Err(VoiceError::Negotiation("audio unavailable".to_string()))
    }

    fn accept_answer(&mut self, _link: &mut (), _answer: Value) -> Result<(), VoiceError> {
        Err(VoiceError::Negotiation("audio unavailable".to_string()))
    }

    fn add_ice_candidate(&mut self, _link: &mut (), _candidate: Value) -> Result<(), VoiceError> {
        Err(VoiceError::Negotiation("audio unavailable".to_string()))
    }

    fn place_source(&mut self, _link: &mut (), _position: Vec3) {}

    fn set_output_mode(&mut self, _link: &mut (), _mode: OutputMode) {}

    fn close_link(&mut self, _link: ()) {}
}

/// Position and facing on the walking circle after `elapsed` seconds
fn circle_pose(center: Vec3, elapsed: f32) -> (Vec3, Vec3) {
    let angle = elapsed * WALK_RATE;
    let position = Vec3::new(
        center.x + WALK_RADIUS * angle.cos(),
        EYE_HEIGHT,
        center.z + WALK_RADIUS * angle.sin(),
    );
    // Tangent direction, expressed as yaw with forward = (sin yaw, cos yaw)
    let (dx, dz) = (-angle.sin(), angle.cos());
    (position, Vec3::new(0.0, dx.atan2(dz), 0.0))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let name = sanitize_name(&args.name);
    let tick_rate = args.tick_rate.max(1);

    info!("Starting client '{}'", name);
    info!("Connecting to: {}", args.server);

    let mut session = Session::connect(&args.server).await?;
    let mut world = ClientWorld::new(NoAudioDevice);

    if let Err(e) = world.enable_voice() {
        warn!("Voice disabled: {}", e);
    }

    let center = Vec3::new(0.0, EYE_HEIGHT, SPAWN_Z_MIN + WALK_RADIUS);
    let (start, facing) = circle_pose(center, 0.0);
    let players = session.join(&name, start, facing).await?;
    info!("Joined as {} with {} others present", session.id(), players.len());

    let mut ticker = interval(Duration::from_secs_f32(1.0 / tick_rate as f32));
    let mut last_tick = Instant::now();
    let mut elapsed = 0.0f32;
    let mut since_attack = 0.0f32;

    loop {
        tokio::select! {
            message = session.recv() => match message {
                Some(message) => world.stage(message),
                None => {
                    warn!("Server closed the connection");
                    break;
                }
            },

            _ = ticker.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f32();
                last_tick = now;

                if world.local().alive {
                    elapsed += dt;
                    let (position, rotation) = circle_pose(center, elapsed);
                    world.move_local(position, rotation);

                    since_attack += dt;
                    if args.attack_every > 0.0 && since_attack >= args.attack_every {
                        since_attack = 0.0;
                        world.attack();
                    }
                } else {
                    world.request_respawn();
                }

                for outgoing in world.update(dt) {
                    session.send(outgoing)?;
                }
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, leaving");
                break;
            }
        }
    }

    world.leave();
    session.close().await;
    Ok(())
}
