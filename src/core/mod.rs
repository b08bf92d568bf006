pub mod capture_manager;
pub mod config;
pub mod overlay;
pub mod scoring;
pub mod session;
pub mod upload;

// Pose estimation and live scoring modules
pub mod live_feedback;
pub mod pose_estimator;
