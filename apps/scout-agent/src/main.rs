use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = scout_agent::Args::parse();
	scout_agent::run(args).await
}
