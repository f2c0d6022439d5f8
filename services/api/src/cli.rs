use crate::demo::{run_demo, DemoArgs};
use crate::server;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use drivehub::error::AppError;
use drivehub::identity::NationalIdParser;

#[derive(Parser, Debug)]
#[command(
    name = "DriveHub Portal",
    about = "Run the DriveHub driving school portal or explore its rules from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Decode the birth date and age held in a South African identity number
    Identity(IdentityArgs),
    /// Walk a student from registration to vehicle booking against in-memory stores
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct IdentityArgs {
    /// 13-digit identity number
    pub(crate) id_number: String,
    /// Evaluate the age as of this date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Identity(args) => run_identity(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn run_identity(args: IdentityArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let identity = NationalIdParser::default().derive(args.id_number.trim(), today)?;

    println!("Identity number {}", args.id_number.trim());
    println!("- Birth date: {}", identity.birth_date);
    println!("- Age on {}: {}", today, identity.age);
    println!(
        "- Driver packages: {}",
        if identity.is_adult {
            "available"
        } else {
            "locked until 18"
        }
    );
    Ok(())
}
