//! Drive a Scape client with a synthetic camera and sensors and print results.
//!
//! Usage: SCAPE_API_KEY=... cargo run --example session [count]
//! Set SCAPE_DEBUG=1 to mock GPS at the Eiffel Tower.

use scapekit::{
    Client, ClientConfig, FnStateProvider, LatLng, LocationMeasurements, LumaFrame, MockEngine,
    MotionMeasurements, SessionCallbacks, SessionEvent,
};
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let count: u32 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    let config = match ClientConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to read config: {}", e);
            std::process::exit(1);
        }
    };
    let debug = config.debug;

    let engine =
        MockEngine::at(LatLng::new(51.5007, -0.1246), 90.0).with_delay(Duration::from_millis(50));
    let client = match Client::builder(config).engine(engine).build() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            std::process::exit(1);
        }
    };

    let (callbacks, events) = SessionCallbacks::channel(16);
    client.set_session_callbacks(callbacks);
    client.set_state_provider(FnStateProvider::new(MotionMeasurements::default, || {
        LocationMeasurements {
            lat_lng: LatLng::new(51.5, -0.12),
            altitude: 11.0,
            ..Default::default()
        }
    }));
    if debug {
        if let Some(session) = client.debug_session() {
            session.mock_gps_coordinates(48.8584, 2.2945);
        }
    }

    let (width, height) = (320u32, 240u32);
    let pixels = (0..width * height).map(|i| (i % 256) as u8).collect();
    client.set_frame(LumaFrame::new(width, height, pixels).ok());

    println!("Requesting {} measurements...", count);

    let start = Instant::now();
    let mut received = 0;
    client.request_measurements();

    while received < count {
        match events.recv_timeout(Duration::from_secs(2)) {
            Ok(SessionEvent::MeasurementsRequested(ts)) => {
                log::debug!("cycle started at {}", ts);
            }
            Ok(SessionEvent::MeasurementsUpdated(m)) => {
                received += 1;
                println!(
                    "ts={:<14.3}  lat={:+.6}  lng={:+.6}  heading={:6.2}  conf={:.1}  status={:?}",
                    m.timestamp,
                    m.lat_lng.latitude,
                    m.lat_lng.longitude,
                    m.heading,
                    m.confidence_score,
                    m.status,
                );
                client.request_measurements();
            }
            Ok(SessionEvent::SessionError(e)) => {
                eprintln!("Session error: {}", e);
                received += 1;
                client.request_measurements();
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    println!(
        "\nTotal: {} results in {:.1}s ({:.1} Hz)",
        received,
        elapsed,
        received as f64 / elapsed
    );
}
