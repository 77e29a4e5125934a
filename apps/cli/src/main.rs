//! nextboot CLI - reference consumer of the nextboot-core API.
//!
//! Plays the role the desktop frontends play around the core: it owns
//! the per-backend enable toggles (as flags), selects the escalation
//! front end, and turns the core's outputs into terminal output.

use clap::{Parser, Subcommand};
use nextboot_core::grub::GrubLoader;
use nextboot_core::{BootLoader, BootLoaderKind, BootLoaderToggles, ExecutionContext, Selector};
use tracing_subscriber::EnvFilter;

/// Choose the entry to boot into on the next reboot.
#[derive(Parser)]
#[command(name = "nextboot")]
#[command(about = "Choose the entry to boot into on the next reboot", long_about = None)]
struct Cli {
    /// Use sudo instead of pkexec for privileged commands.
    #[arg(long, global = true)]
    sudo: bool,

    /// Skip the UEFI boot manager backend.
    #[arg(long, global = true)]
    no_efibootmgr: bool,

    /// Skip the GRUB backend.
    #[arg(long, global = true)]
    no_grub: bool,

    /// Skip the systemd-boot backend.
    #[arg(long, global = true)]
    no_systemd_boot: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report which boot loader backend would be used.
    Detect,
    /// List the available boot entries and the default.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
    /// Set the entry to boot into on the next reboot.
    Set {
        /// Backend-specific entry id, as printed by `list`.
        id: String,
    },
    /// Manage the GRUB quick-reboot helper script.
    QuickReboot {
        #[command(subcommand)]
        action: QuickRebootAction,
    },
    /// Make the GRUB config world-readable (remediation when `list`
    /// fails with a permission error).
    FixPermissions,
}

#[derive(Subcommand)]
enum QuickRebootAction {
    /// Report whether the helper script is installed.
    Status,
    /// Install the helper script and regenerate the boot config.
    Enable,
    /// Remove the helper script and regenerate the boot config.
    Disable,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let ctx = if cli.sudo {
        ExecutionContext::with_sudo()
    } else {
        ExecutionContext::with_pkexec()
    };
    let toggles = BootLoaderToggles {
        use_efibootmgr: !cli.no_efibootmgr,
        use_grub: !cli.no_grub,
        use_systemd_boot: !cli.no_systemd_boot,
    };
    let selector = Selector::with_toggles(ctx.clone(), toggles);

    std::process::exit(run(cli.command, &selector, ctx).await);
}

async fn run(command: Commands, selector: &Selector, ctx: ExecutionContext) -> i32 {
    match command {
        Commands::Detect => {
            let kind = selector.usable_kind().await;
            println!("{kind}");
            i32::from(kind == BootLoaderKind::Unknown)
        }
        Commands::List { json } => {
            let Some(backend) = selector.usable_backend().await else {
                eprintln!("No usable boot loader backend found");
                return 1;
            };
            match backend.boot_options().await {
                Ok(set) => {
                    if json {
                        let payload = serde_json::json!({
                            "backend": backend.kind().to_string(),
                            "options": set.options(),
                            "default": set.resolved_default(),
                        });
                        println!("{payload:#}");
                    } else {
                        print_listing(backend.kind(), &set);
                    }
                    0
                }
                Err(e) => {
                    eprintln!("Failed to list boot entries: {e}");
                    if backend.kind() == BootLoaderKind::Grub {
                        eprintln!("If this is a permission problem, try `nextboot fix-permissions`");
                    }
                    1
                }
            }
        }
        Commands::Set { id } => {
            let Some(backend) = selector.usable_backend().await else {
                eprintln!("No usable boot loader backend found");
                return 1;
            };
            if backend.set_boot_option(&id).await {
                println!("Next boot set to '{id}'");
                0
            } else {
                eprintln!("Failed to set next boot entry");
                1
            }
        }
        Commands::QuickReboot { action } => {
            let Some(backend) = selector.usable_backend().await else {
                eprintln!("No usable boot loader backend found");
                return 1;
            };
            if !backend.can_quick_reboot() {
                eprintln!("{} does not support quick reboot", backend.kind());
                return 1;
            }
            match action {
                QuickRebootAction::Status => {
                    let enabled = backend.quick_reboot_enabled().await;
                    println!("{}", if enabled { "enabled" } else { "disabled" });
                    0
                }
                QuickRebootAction::Enable => {
                    if backend.enable_quick_reboot().await {
                        println!("Quick reboot enabled");
                        0
                    } else {
                        eprintln!("Failed to enable quick reboot");
                        1
                    }
                }
                QuickRebootAction::Disable => {
                    if backend.disable_quick_reboot().await {
                        println!("Quick reboot disabled");
                        0
                    } else {
                        eprintln!("Failed to disable quick reboot");
                        1
                    }
                }
            }
        }
        Commands::FixPermissions => {
            let grub = GrubLoader::new(ctx);
            if grub.set_readable().await {
                println!("GRUB config is now world-readable");
                0
            } else {
                eprintln!("Failed to change GRUB config permissions");
                1
            }
        }
    }
}

fn print_listing(kind: BootLoaderKind, set: &nextboot_core::BootOptionSet) {
    println!("Backend: {kind}");
    let default = set.resolved_default();
    for option in set.options() {
        let marker = if default == Some(option.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {}\t{}", option.id, option.title);
    }
}
