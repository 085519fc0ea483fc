use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the glot workspace",
    long_about = "A unified CLI for CI checks and release packaging of the\n\
                  glot simulation client."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests, CLI smoke run)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build the glot binary and package it as a zip archive
    Dist {
        /// Compilation target triple
        #[arg(long, env = "GLOT_DIST_TARGET")]
        target: Option<String>,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Directory the zip is written to
        #[arg(long, default_value = "dist")]
        out_dir: String,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build the binary and run its help output
    Smoke,
    /// Run check + smoke
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_glot(target: Option<&str>, profile: BuildProfile, out_dir: &Path) {
    step("Build glot binary");

    let mut cargo_args = vec!["build", "-p", "glot_client", "--bin", "glot"];
    if let Some(target) = target {
        cargo_args.extend(["--target", target]);
    }
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package glot zip artifact");
    let mut target_dir = Path::new("target").to_path_buf();
    if let Some(target) = target {
        target_dir.push(target);
    }
    target_dir.push(profile.dir_name());
    fs::create_dir_all(out_dir).expect("failed to create dist directory");

    let triple = target.unwrap_or(std::env::consts::OS);
    let binary = binary_name("glot", triple);
    let zip_path = out_dir.join(format!("glot-{triple}.zip"));
    package_zip(&target_dir.join(&binary), &binary, &zip_path);

    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

fn package_zip(binary_path: &Path, entry_name: &str, zip_path: &Path) {
    if !binary_path.exists() {
        panic!("expected glot binary at '{}'", binary_path.display());
    }

    let binary = fs::read(binary_path).expect("failed to read glot binary");
    let file = fs::File::create(zip_path).expect("failed to create glot zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file(entry_name, options)
        .expect("failed to start binary entry in glot zip");
    zip.write_all(&binary).expect("failed to write binary entry");
    zip.finish().expect("failed to finish glot zip");
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test glot_core");
    run_cargo(&["test", "-p", "glot_core"]);

    step("Test glot_client");
    run_cargo(&["test", "-p", "glot_client"]);
}

fn ci_smoke() {
    step("Run glot --help");
    run_cargo(&["run", "-p", "glot_client", "--bin", "glot", "--", "--help"]);

    step("Run glot inspect --help");
    run_cargo(&[
        "run", "-p", "glot_client", "--bin", "glot", "--", "inspect", "--help",
    ]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Smoke => ci_smoke(),
                CiJob::All => {
                    ci_check();
                    ci_smoke();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::Dist {
            target,
            profile,
            out_dir,
        } => {
            package_glot(target.as_deref(), profile, Path::new(&out_dir));
        }
    }
}
