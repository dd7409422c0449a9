//! Console host: loads settings, wires the engine callbacks, installs the
//! keyboard hook and pumps messages until the process is killed.

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use curskey_core::{keyboard_hook, settings_path, Options, ENGINE};
    use tracing::{error, info};

    tracing_subscriber::fmt::init();

    let path = settings_path();
    let options = Options::load_or_default(&path);
    info!("Settings loaded from {}", path.display());

    {
        let mut engine = ENGINE.lock();
        engine.reload(options);
        engine.set_on_training_mistake(keyboard_hook::beep);
        engine.set_on_open_config(open_config_editor);
    }

    if let Err(err) = keyboard_hook::install_hook() {
        // Remapping stays off until the watchdog gets the hook registered.
        error!("Failed to install keyboard hook: {err}");
    }
    keyboard_hook::run_event_loop();
    keyboard_hook::uninstall_hook();
    Ok(())
}

/// Launches the configuration editor installed next to our own executable.
#[cfg(windows)]
fn open_config_editor() {
    let editor = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("curskey-config.exe")));
    match editor {
        Some(path) => {
            if let Err(err) = std::process::Command::new(&path).spawn() {
                tracing::error!("Could not launch {}: {err}", path.display());
            }
        }
        None => tracing::error!("Could not locate the configuration editor"),
    }
}

#[cfg(not(windows))]
fn main() {
    eprintln!("curskey relies on Windows low-level keyboard hooks and only runs there.");
    std::process::exit(1);
}
