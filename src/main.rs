use clap::Parser as _;

use mirrorsync::{
    application::{Application, ApplicationError},
    cli::Cli,
};

#[compio::main]
#[snafu::report]
async fn main() -> Result<(), ApplicationError> {
    let cli_args = Cli::parse();

    Application::run(cli_args).await?;

    Ok(())
}
