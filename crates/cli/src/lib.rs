use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "carmatch")]
#[command(about = "CarMatch - vehicle listing and buyer requirement matching")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "carmatch.yaml")]
        output: PathBuf,
    },

    /// Validate configuration
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "master_config/carmatch.yaml")]
        config: PathBuf,
    },

    /// Post a vehicle and list the open requirements it matches
    MatchVehicle {
        #[command(flatten)]
        env: RunArgs,

        #[arg(long, value_enum)]
        vehicle_type: VehicleTypeArg,

        #[arg(long)]
        make: String,

        #[arg(long)]
        model: String,

        #[arg(long)]
        year: i32,

        /// Dismiss the resulting notification permanently
        #[arg(long)]
        dont_show_again: bool,
    },

    /// Post a requirement and list the active listings it matches
    MatchRequirement {
        #[command(flatten)]
        env: RunArgs,

        #[arg(long, value_enum)]
        vehicle_type: VehicleTypeArg,

        /// Substring of the make; omit for any make
        #[arg(long)]
        make: Option<String>,

        /// Substring of the model; omit for any model
        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        year_min: Option<i32>,

        #[arg(long)]
        year_max: Option<i32>,
    },

    /// Re-check the pending match as a landing page load would
    Recheck {
        #[command(flatten)]
        env: RunArgs,

        /// Skip the configured re-check delay
        #[arg(long)]
        now: bool,
    },
}

/// Options shared by the matching commands
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the configuration file
    #[arg(short, long, default_value = "master_config/carmatch.yaml")]
    pub config: PathBuf,

    /// YAML file with `listings` and `requirements` to load into the store
    #[arg(short, long)]
    pub seed: Option<PathBuf>,

    /// Id of the acting user
    #[arg(short, long, default_value = "cli-user")]
    pub user: String,

    /// Email of the acting user
    #[arg(long, default_value = "cli-user@localhost")]
    pub email: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VehicleTypeArg {
    Car,
    Bike,
}

impl VehicleTypeArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleTypeArg::Car => "car",
            VehicleTypeArg::Bike => "bike",
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
