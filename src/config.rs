use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Careflow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default bind address for the facility API server.
pub const DEFAULT_BIND: &str = "127.0.0.1:7470";

/// Get the application data directory
/// ~/Careflow/ on all platforms (user-visible, per ops requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Careflow")
}

/// Get the database directory
pub fn database_dir() -> PathBuf {
    app_data_dir().join("database")
}

/// Get the facility database path
pub fn database_path() -> PathBuf {
    database_dir().join("careflow.db")
}

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("info,{}=debug", env!("CARGO_PKG_NAME"))
}

/// Bind address, overridable via CAREFLOW_BIND.
pub fn bind_addr() -> SocketAddr {
    std::env::var("CAREFLOW_BIND")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| DEFAULT_BIND.parse().expect("default bind address is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Careflow"));
    }

    #[test]
    fn database_path_under_app_data() {
        let db = database_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("database/careflow.db"));
    }

    #[test]
    fn default_bind_parses() {
        let addr: SocketAddr = DEFAULT_BIND.parse().unwrap();
        assert_eq!(addr.port(), 7470);
    }

    #[test]
    fn default_filter_names_crate() {
        assert!(default_log_filter().contains("careflow=debug"));
    }
}
