use std::path::PathBuf;

pub const SESSION_TCP_PORT: u16 = 9887;
const SESSION_TCP_HOST: &str = "127.0.0.1";

pub fn session_address() -> String {
    format!("{}:{}", SESSION_TCP_HOST, SESSION_TCP_PORT)
}

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/fmtx/ (XDG standard)
    // instead of macOS Application Support for consistency
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join("fmtx")
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fmtx")
    }
}

pub fn config_dir() -> PathBuf {
    // On macOS and Linux, always use ~/.config/fmtx/
    // (avoid macOS Application Support folder for consistency)
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("fmtx")
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fmtx")
    }
}
