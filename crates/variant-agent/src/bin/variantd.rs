//! Main binary for the variant daemon (variantd)

use clap::Parser;
use variant_core::VariantConfig;

#[derive(Parser)]
#[command(name = "variantd")]
#[command(about = "Cloud Foundry metrics reconciliation controller")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Force verbose logging regardless of VARIANT_DEBUG
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = VariantConfig::load()?;
    if cli.debug {
        config.debug = true;
    }
    variant_agent::init_tracing(config.debug);

    variant_agent::run(config).await?;
    Ok(())
}
