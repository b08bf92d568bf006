use posture_studio::core::config::Config;
use posture_studio::core::overlay::BitmapSurface;
use posture_studio::core::scoring::HttpScoringClient;
use posture_studio::core::session::SessionCoordinator;
use posture_studio::platform::engine::NullPoseEngine;
use posture_studio::platform::synthetic::SyntheticProvider;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::load()?;
    log::info!("scoring service: {}", config.backend_url);

    let coordinator = SessionCoordinator::new(
        &config,
        Arc::new(SyntheticProvider::default()),
        Arc::new(NullPoseEngine::new(config.engine.clone())),
        Arc::new(HttpScoringClient::new(&config.backend_url)),
        Box::new(BitmapSurface::new(640, 480)),
    );
    log::info!("session {} ready", coordinator.session_id());

    // Short demonstration run against the synthetic camera.
    coordinator.start_recording().await?;
    coordinator.set_live_analysis(true).await;

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(config.sample_interval_ms)).await;
        match coordinator.current_feedback().await {
            Some(feedback) => println!(
                "{} (score: {})",
                feedback.status,
                feedback
                    .score
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string())
            ),
            None => println!("waiting for feedback..."),
        }
    }

    coordinator.shutdown().await;
    Ok(())
}
