use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = prism_api::Args::parse();

	prism_api::run(args).await
}
