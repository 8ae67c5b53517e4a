use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod utils;

/// NSH service-chain forwarder command line interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Path to the forwarding-table configuration file
    #[clap(short, long, global = true, default_value = "nsh-tables.json")]
    config: PathBuf,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage NSH header entries
    Entry {
        #[clap(subcommand)]
        cmd: EntryCommands,
    },

    /// Manage NSH forwarding mappings
    Map {
        #[clap(subcommand)]
        cmd: MapCommands,
    },

    /// Manage NSH proxy sessions
    Proxy {
        #[clap(subcommand)]
        cmd: ProxyCommands,
    },

    /// Decode an NSH header from hex bytes
    Decode {
        /// Header bytes as a hex string
        hex: String,
    },

    /// Run packets through a node built from the configuration
    Run {
        /// Ingress mode: explicit, classified or proxied
        #[clap(short, long, default_value = "explicit")]
        mode: String,

        /// Arrival interface, keys proxied-ingress lookups
        #[clap(long, default_value = "0")]
        rx_interface: u32,

        /// Classifier key as "nsp,nsi", for classified ingress
        #[clap(short, long)]
        key: Option<String>,

        /// Print the post-rewrite header of every packet
        #[clap(short, long)]
        trace: bool,

        /// Packets as hex strings
        packets: Vec<String>,
    },

    /// Benchmark the rewrite loop with a synthetic swap chain
    Benchmark {
        /// Number of packets to process
        #[clap(long, default_value = "1000000")]
        count: usize,

        /// Packets per batch
        #[clap(short, long, default_value = "256")]
        batch_size: usize,
    },
}

/// Field values of an NSH header entry.
#[derive(Args)]
struct EntryFields {
    /// Network service path
    nsp: u32,

    /// Network service index
    nsi: u8,

    /// Network platform context word
    #[clap(long, default_value = "0")]
    c1: u32,

    /// Network shared context word
    #[clap(long, default_value = "0")]
    c2: u32,

    /// Service platform context word
    #[clap(long, default_value = "0")]
    c3: u32,

    /// Service shared context word
    #[clap(long, default_value = "0")]
    c4: u32,

    /// Header version (2 bits)
    #[clap(long, default_value = "0")]
    version: u8,

    /// Set the O (OAM) bit
    #[clap(long)]
    o_bit: bool,

    /// Set the C (context) bit
    #[clap(long)]
    c_bit: bool,

    /// Payload protocol: ip4, ip6 or ethernet
    #[clap(long, default_value = "ip4")]
    next_protocol: String,
}

#[derive(Subcommand)]
enum EntryCommands {
    /// Add a header entry
    Add {
        #[clap(flatten)]
        fields: EntryFields,
    },

    /// Remove a header entry
    Remove {
        /// Network service path
        nsp: u32,

        /// Network service index
        nsi: u8,
    },

    /// Show all header entries
    Show {
        /// Emit JSON instead of text
        #[clap(long)]
        json: bool,
    },

    /// Print the wire encoding of a header without storing it
    Encode {
        #[clap(flatten)]
        fields: EntryFields,
    },
}

#[derive(Subcommand)]
enum MapCommands {
    /// Add a forwarding mapping
    Add {
        /// Network service path the mapping matches
        nsp: u32,

        /// Network service index the mapping matches
        nsi: u8,

        /// Target entry NSP applied on swap/push
        #[clap(long)]
        mapped_nsp: u32,

        /// Target entry NSI applied on swap/push
        #[clap(long)]
        mapped_nsi: u8,

        /// Header action: swap, push or pop
        #[clap(long)]
        action: String,

        /// Egress by GRE through this interface
        #[clap(long)]
        encap_gre_intf: Option<u32>,

        /// Egress by VXLAN-GPE through this interface
        #[clap(long)]
        encap_vxlan_gpe_intf: Option<u32>,

        /// Egress by VXLAN over IPv4 through this interface
        #[clap(long)]
        encap_vxlan4_intf: Option<u32>,

        /// Egress by VXLAN over IPv6 through this interface
        #[clap(long)]
        encap_vxlan6_intf: Option<u32>,

        /// No encapsulation: route matching packets to drop
        #[clap(long)]
        encap_none: bool,
    },

    /// Remove a forwarding mapping
    Remove {
        /// Network service path
        nsp: u32,

        /// Network service index
        nsi: u8,
    },

    /// Show all forwarding mappings
    Show {
        /// Emit JSON instead of text
        #[clap(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProxyCommands {
    /// Remove a proxy session
    Remove {
        /// Transport of the session: vxlan4 or vxlan6
        transport: String,

        /// Ingress interface of the session
        sw_if_index: u32,
    },

    /// Show all proxy sessions
    Show {
        /// Emit JSON instead of text
        #[clap(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" },
    ))
    .init();

    // Execute the specified command
    match cli.command {
        Commands::Entry { cmd } => commands::entry::handle_command(&cli.config, cmd),
        Commands::Map { cmd } => commands::map::handle_command(&cli.config, cmd),
        Commands::Proxy { cmd } => commands::proxy::handle_command(&cli.config, cmd),
        Commands::Decode { hex } => commands::entry::decode(&hex),
        Commands::Run {
            mode,
            rx_interface,
            key,
            trace,
            packets,
        } => commands::run::run_packets(
            &cli.config,
            &mode,
            rx_interface,
            key.as_deref(),
            trace,
            &packets,
        ),
        Commands::Benchmark { count, batch_size } => {
            commands::benchmark::run_benchmark(count, batch_size)
        }
    }
}
