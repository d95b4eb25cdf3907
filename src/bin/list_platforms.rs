// list_platforms — print how many compute platforms are available.
//
// USAGE
//   list_platforms
//   list_platforms --verbose --backend vulkan
//
// Exit status: 0 if at least one platform was found, 255 otherwise.

use std::process::ExitCode;

use clap::Parser;

use gpu_grayscale::config::BackendChoice;
use gpu_grayscale::gpu::device::enumerate_platforms;
use gpu_grayscale::platforms;

#[derive(Parser)]
#[command(name = "list_platforms")]
#[command(about = "List available GPU compute platforms")]
#[command(version)]
struct Cli {
    /// Also list each platform's devices
    #[arg(short, long)]
    verbose: bool,

    /// Backends to enumerate
    #[arg(long, value_enum, default_value = "all")]
    backend: BackendChoice,
}

fn main() -> ExitCode {
    gpu_grayscale::init_tracing();
    let cli = Cli::parse();

    let found = enumerate_platforms(cli.backend.backends());
    tracing::debug!(platforms = found.len(), "enumeration finished");

    print!("{}", platforms::report(&found, cli.verbose));
    let status = platforms::exit_status(&found);
    if status != 0 {
        eprintln!("Failed to find any compute platform.");
    }
    ExitCode::from(status)
}
