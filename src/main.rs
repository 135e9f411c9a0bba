mod app;
mod audio;
mod config;
mod input;
mod model;
mod render;
mod session;
mod sim;

use anyhow::Result;

fn main() -> Result<()> {
    app::run()
}
