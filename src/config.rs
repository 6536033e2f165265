use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Rxflow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory
/// ~/Rxflow/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Rxflow")
}

/// Get the pharmacy database path
pub fn db_path() -> PathBuf {
    app_data_dir().join("pharmacy.db")
}

/// Default tracing filter when RUST_LOG is not set
pub fn default_log_filter() -> String {
    format!("info,{}=debug", env!("CARGO_PKG_NAME"))
}
