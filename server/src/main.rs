use std::{
    process,
    sync::{atomic::Ordering, Arc},
};

use log::{error, info, LevelFilter};

use gantry_server::{
    handler::EchoHandler,
    settings::ServerSettings,
    supervisor::{Supervisor, EXIT_STARTUP_FAILURE},
    App, BUILD_NUMBER,
};

fn main() {
    let mut clog = colog::default_builder();

    #[cfg(debug_assertions)]
    clog.filter_level(LevelFilter::Debug);

    #[cfg(not(debug_assertions))]
    clog.filter_level(LevelFilter::Info);

    clog.init();

    info!(
        "gantry {} build {}",
        env!("CARGO_PKG_VERSION"),
        BUILD_NUMBER
    );

    // Merge configuration sources and deserialize the application settings
    let settings = match ServerSettings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {e}");
            process::exit(EXIT_STARTUP_FAILURE);
        }
    };

    let app = Arc::new(App::new(Arc::new(EchoHandler)));

    // Handle termination signals by setting the stop_signal boolean
    let stop_signal = app.stop_signal.clone();
    ctrlc::set_handler(move || stop_signal.store(true, Ordering::Relaxed)).unwrap();

    let supervisor = Supervisor::new(&app, &settings);
    match supervisor.start() {
        Ok(server) => {
            info!("Serving on {}", server.local_addr());
            let outcome = server.wait();
            process::exit(outcome.exit_code());
        }
        Err(e) => {
            error!("Failed to start: {e}");
            process::exit(EXIT_STARTUP_FAILURE);
        }
    }
}
