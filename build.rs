//! Build script to embed Windows resource metadata into executables
//! This sets the application name shown in Task Manager

fn main() {
    #[cfg(windows)]
    {
        // Get the binary name being built
        let target = std::env::var("CARGO_BIN_NAME").unwrap_or_default();

        let mut res = winresource::WindowsResource::new();

        // Set common metadata
        res.set("ProductName", "Game Overlay");
        res.set("CompanyName", "Game Overlay");
        res.set("ProductVersion", env!("CARGO_PKG_VERSION"));
        res.set("FileVersion", env!("CARGO_PKG_VERSION"));

        // Binary-specific metadata, shown in Task Manager
        match target.as_str() {
            "game_overlay" => {
                res.set("FileDescription", "GameOverlay.Shell");
                res.set("InternalName", "GameOverlay.Shell");
                res.set("OriginalFilename", "game_overlay.exe");
            }
            "game_overlay_ask" => {
                res.set("FileDescription", "GameOverlay.Ask");
                res.set("InternalName", "GameOverlay.Ask");
                res.set("OriginalFilename", "game_overlay_ask.exe");
            }
            _ => {
                res.set("FileDescription", "Game Overlay");
                res.set("InternalName", "GameOverlay");
            }
        }

        // Compile the resource
        if let Err(e) = res.compile() {
            eprintln!("Warning: Failed to compile Windows resources: {}", e);
        }
    }
}
