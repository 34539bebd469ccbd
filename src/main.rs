#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    // Set up logging; RUST_LOG=debug shows execution and decode traffic
    env_logger::init();

    flow_canvas::run_app()
}

// Browser builds start through `flow_canvas::start`.
#[cfg(target_arch = "wasm32")]
fn main() {}
