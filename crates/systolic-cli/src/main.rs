// SPDX-License-Identifier: AGPL-3.0-only

//! `systolic` — host driver CLI for the systolic matrix-multiply accelerator.
//!
//! ```text
//! USAGE:
//!   systolic [run] [--sw] [--seed N] [--dim N]   One verified full pass
//!   systolic enumerate                           List candidate PCIe functions
//!   systolic scratch [value]                     Exercise the user register
//! ```
//!
//! Exit status: 0 on success, 2 device unavailable, 3 driver missing,
//! 4 register I/O fault, 5 verification mismatch, 64 invalid input,
//! 1 anything else.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use systolic_driver::{
    run_full_pass, select_backend, AccelError, AcceleratorId, BackendSelection, DeviceConfig,
    DeviceManager, RunConfig, RunReport, TileTransfer,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "systolic", about = "Systolic matrix-multiply accelerator CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Cmd>,

    /// Use the software model instead of hardware.
    #[arg(long, global = true)]
    sw: bool,

    /// Accelerator ID the card must report (UUID).
    #[arg(long, global = true, value_name = "UUID")]
    accelerator_id: Option<AcceleratorId>,

    /// Open this PCIe function (e.g. 0000:3b:00.0) instead of scanning.
    #[arg(long, global = true, value_name = "ADDR")]
    pcie_address: Option<String>,

    /// Debug logging, and print every compared element.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(clap::Args, Clone, Copy)]
struct RunArgs {
    /// Seed for operand generation (random if omitted).
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Side length of the square operands (multiple of 8).
    #[arg(long, global = true, default_value_t = systolic_driver::chip::FULL_DIM)]
    dim: usize,
}

#[derive(Subcommand)]
enum Cmd {
    /// Multiply random operands on the accelerator and verify (default).
    Run,
    /// List candidate FPGA functions on the PCIe bus.
    Enumerate,
    /// Read the user register, or write `value` and read it back.
    Scratch {
        /// Word to write (decimal or 0x-prefixed hex).
        #[arg(value_parser = parse_word)]
        value: Option<u64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .init();

    match dispatch(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn dispatch(cli: &Cli) -> Result<()> {
    match &cli.command {
        None | Some(Cmd::Run) => cmd_run(cli),
        Some(Cmd::Enumerate) => cmd_enumerate(&device_config(cli)),
        Some(Cmd::Scratch { value }) => cmd_scratch(cli, *value),
    }
}

/// Exit status for an error chain: the first driver error decides.
fn exit_code(e: &anyhow::Error) -> u8 {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<AccelError>())
        .map_or(1, |accel| accel.kind().exit_code())
}

fn device_config(cli: &Cli) -> DeviceConfig {
    let mut config = DeviceConfig::default();
    if let Some(id) = cli.accelerator_id {
        config.accelerator_id = id;
    }
    config.pcie_address.clone_from(&cli.pcie_address);
    config
}

fn selection(cli: &Cli) -> BackendSelection {
    if cli.sw {
        BackendSelection::Software
    } else {
        BackendSelection::Mmio
    }
}

fn cmd_run(cli: &Cli) -> Result<()> {
    let mut backend = select_backend(selection(cli), &device_config(cli))?;
    println!("Backend: {}", backend.backend_type());

    let config = RunConfig {
        dim: cli.run.dim,
        seed: cli.run.seed,
    };
    let report = run_full_pass(&mut backend, &config)?;

    if cli.verbose {
        print_elements(&report);
    }
    println!(
        "{0}×{0} product: {1} tiles, {2} compute passes, seed {3}",
        report.a.dim(),
        report.tiles,
        report.compute_passes,
        report.seed
    );
    println!("All tests passed. No errors detected.");
    Ok(())
}

fn print_elements(report: &RunReport) {
    let dim = report.c.dim();
    for row in 0..dim {
        for col in 0..dim {
            println!(
                "row: {row}, col: {col} | got: {}, expected {} [OK]",
                report.c[(row, col)],
                report.reference[(row, col)]
            );
        }
    }
}

fn cmd_enumerate(config: &DeviceConfig) -> Result<()> {
    let mgr = DeviceManager::discover_with(config)?;

    println!("Candidate functions: {}", mgr.device_count());
    println!();

    for info in mgr.devices() {
        let function = if info.is_virtual_function() { "VF" } else { "PF" };
        println!(
            "{}  {:04x}:{:04x}  {function}",
            info.pcie_address, info.vendor_id, info.device_id
        );
        println!("     {}", info.path.display());
    }
    println!();
    println!("Looking for accelerator {}", config.accelerator_id);

    Ok(())
}

fn cmd_scratch(cli: &Cli, value: Option<u64>) -> Result<()> {
    let mut backend = select_backend(selection(cli), &device_config(cli))?;
    let mut xfer = TileTransfer::new(&mut backend);

    if let Some(word) = value {
        xfer.write_user_register(word)?;
        println!("Wrote    {word:#018x}");
    }
    let read = xfer.read_user_register()?;
    println!("User reg {read:#018x}");

    if let Some(word) = value {
        anyhow::ensure!(
            read == word,
            "user register read back {read:#018x}, wrote {word:#018x}"
        );
    }
    Ok(())
}

fn parse_word(s: &str) -> Result<u64> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.with_context(|| format!("not a 64-bit word: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_runs_on_hardware() {
        let cli = Cli::parse_from(["systolic"]);
        assert!(cli.command.is_none());
        assert_eq!(selection(&cli), BackendSelection::Mmio);
        assert_eq!(cli.run.dim, systolic_driver::chip::FULL_DIM);
        assert!(cli.run.seed.is_none());
    }

    #[test]
    fn flags_after_subcommand() {
        let cli = Cli::parse_from(["systolic", "run", "--sw", "--seed", "7", "--dim", "32"]);
        assert!(matches!(cli.command, Some(Cmd::Run)));
        assert_eq!(selection(&cli), BackendSelection::Software);
        assert_eq!(cli.run.seed, Some(7));
        assert_eq!(cli.run.dim, 32);
    }

    #[test]
    fn scratch_value_accepts_hex() {
        let cli = Cli::parse_from(["systolic", "scratch", "0xdeadbeef"]);
        assert!(matches!(cli.command, Some(Cmd::Scratch { value: Some(0xdead_beef) })));
        assert!(Cli::try_parse_from(["systolic", "scratch", "0xzz"]).is_err());
    }

    #[test]
    fn accelerator_id_is_validated() {
        assert!(Cli::try_parse_from(["systolic", "--accelerator-id", "not-a-uuid"]).is_err());
        let cli = Cli::parse_from([
            "systolic",
            "--accelerator-id",
            "00000000-0000-0000-0000-000000000001",
        ]);
        assert_eq!(device_config(&cli).accelerator_id, AcceleratorId::from_words(0, 1));
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let mismatch = anyhow::Error::from(AccelError::Mismatch {
            row: 0,
            col: 1,
            got: 2,
            expected: 3,
        });
        assert_eq!(exit_code(&mismatch), 5);

        let wrapped = anyhow::Error::from(AccelError::device_not_found("x")).context("opening");
        assert_eq!(exit_code(&wrapped), 2);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn software_run_succeeds() {
        let cli = Cli::parse_from(["systolic", "--sw", "--seed", "3"]);
        dispatch(&cli).unwrap();
    }

    #[test]
    fn software_scratch_round_trips() {
        let cli = Cli::parse_from(["systolic", "--sw", "scratch", "42"]);
        dispatch(&cli).unwrap();
    }

    #[test]
    fn invalid_dim_maps_to_invalid_input() {
        for dim in ["12", "4294967296"] {
            let cli = Cli::parse_from(["systolic", "--sw", "--dim", dim]);
            let err = dispatch(&cli).unwrap_err();
            assert_eq!(exit_code(&err), 64, "--dim {dim}");
        }
    }
}
