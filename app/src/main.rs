use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    athlethia_app::init_tracing();
    athlethia_app::run(athlethia_app::cli::Args::parse()).await
}
