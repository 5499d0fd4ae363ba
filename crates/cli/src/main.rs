use anyhow::Result;
use clap::{Parser, Subcommand};
use upgrade_harness::commands::{
    config_command, generate_command, inspect_command, resolve_slot_command, GenerateOverrides,
};
use upgrade_harness::init_tracing;
use upgrade_harness_core::config::{FuzzerSettings, Mode, DEFAULT_CAMPAIGN_LENGTH, DEFAULT_SEQ_LEN};

/// Differential fuzzing harness generator for upgradeable contracts.
///
/// This CLI is a thin wrapper around `upgrade-harness-core`. All substantive
/// logic lives in the library so it can be tested thoroughly and reused from
/// other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "upgrade-harness",
    version,
    about = "Differential fuzzing harness generator for upgradeable contracts",
    long_about = None
)]
struct Cli {
    /// Only log warnings and errors.
    #[arg(long, global = true, default_value_t = false)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a differential harness from a request file.
    ///
    /// This will write:
    /// - `<ContractName>.sol`, the harness.
    /// - `CryticConfig.yaml`, the fuzzer configuration.
    /// - `corpus/`, an empty corpus directory.
    /// - `run_metadata.json`, hashes, timestamps and gaps of the run.
    Generate {
        /// Request file (.yaml, .yml or .json).
        #[arg(long)]
        request: String,

        /// Output directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        out: String,

        /// Overwrite existing outputs.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Deployment topology (deploy or fork). Overrides the request.
        #[arg(long)]
        mode: Option<Mode>,

        /// Solidity version for the pragma. Overrides the request.
        #[arg(long)]
        solc_version: Option<String>,

        /// Name of the harness contract. Overrides the request.
        #[arg(long)]
        contract_name: Option<String>,

        /// Emit `upgradeV2()` and start V2's proxy pinned to V1.
        #[arg(long, default_value_t = false)]
        fuzz_upgrade: bool,

        /// Also wrap access-controlled functions.
        #[arg(long, default_value_t = false)]
        include_protected: bool,

        /// Pick V2-side calldata from the live implementation slot.
        #[arg(long, default_value_t = false)]
        live_dispatch: bool,
    },

    /// Discover the proxy's implementation slot.
    ResolveSlot {
        /// Request file with a proxy descriptor.
        #[arg(long)]
        request: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Write only the fuzzer configuration.
    Config {
        /// Output directory.
        #[arg(long, default_value = ".")]
        out: String,

        /// Maximum number of test sequences.
        #[arg(long, default_value_t = DEFAULT_CAMPAIGN_LENGTH)]
        campaign_length: u64,

        /// Calls per sequence.
        #[arg(long, default_value_t = DEFAULT_SEQ_LEN)]
        seq_len: u32,

        /// Address the harness is deployed at.
        #[arg(long)]
        contract_addr: Option<String>,

        /// Overwrite an existing config.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Show participants and the diff summary of a request.
    Inspect {
        /// Request file (.yaml, .yml or .json).
        #[arg(long)]
        request: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match cli.command {
        Command::Generate {
            request,
            out,
            force,
            mode,
            solc_version,
            contract_name,
            fuzz_upgrade,
            include_protected,
            live_dispatch,
        } => {
            let overrides = GenerateOverrides {
                mode,
                solc_version,
                contract_name,
                fuzz_upgrade,
                include_protected,
                live_dispatch,
            };
            generate_command(&request, &out, force, &overrides)?
        }
        Command::ResolveSlot { request, json } => resolve_slot_command(&request, json)?,
        Command::Config { out, campaign_length, seq_len, contract_addr, force } => {
            let settings =
                FuzzerSettings { campaign_length, seq_len, contract_addr, ..Default::default() };
            config_command(&out, &settings, force)?
        }
        Command::Inspect { request, json } => inspect_command(&request, json)?,
    }

    Ok(())
}
