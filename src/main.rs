mod app;

use clap::Parser;

#[show_image::main]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let params = app::Params::parse();

    app::run(params)?;

    return Ok(());
}
