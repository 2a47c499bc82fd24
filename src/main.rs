use voxqueue::{
    EngineConfig,
    host::app::{App, print_events},
    util::{hook::set_panic_hook, log::initialize_logging},
};

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> color_eyre::Result<()> {
    setup()?;

    let config = EngineConfig::from_env();
    tracing::info!(?config, "voxqueue_started");

    let (mut app, events) = App::new(config)?;
    tokio::spawn(print_events(events));
    app.run().await
}

fn setup() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenv::dotenv().ok();
    set_panic_hook();
    initialize_logging()
}
