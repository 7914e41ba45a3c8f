// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn db_path_arg() -> Arg {
    Arg::new("db_path")
        .short('d')
        .long("db-path")
        .value_name("PATH")
        .default_value("/var/lib/migradir/migradir.db")
        .help("Database path")
}

fn base_arg() -> Arg {
    Arg::new("base")
        .short('b')
        .long("base")
        .value_name("DIR")
        .required(true)
        .help("Base directory containing per-schema script trees")
}

fn build_cli() -> Command {
    Command::new("migradir")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Migradir Contributors")
        .about("Directory-driven SQL schema migration engine")
        .subcommand_required(true)
        .subcommand(
            Command::new("migrate")
                .about("Migrate a schema to a target version")
                .arg(Arg::new("schema").required(true).help("Schema name"))
                .arg(base_arg())
                .arg(
                    Arg::new("to")
                        .long("to")
                        .value_name("VERSION")
                        .help("Target version (default: highest reachable version)"),
                )
                .arg(db_path_arg()),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove a schema")
                .arg(Arg::new("schema").required(true).help("Schema name"))
                .arg(base_arg())
                .arg(db_path_arg()),
        )
        .subcommand(
            Command::new("status")
                .about("Show the recorded version of one schema, or of all schemas")
                .arg(Arg::new("schema").help("Schema name (optional)"))
                .arg(db_path_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(clap::ArgAction::SetTrue)
                        .help("Emit JSON"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Compute a migration plan without executing it")
                .arg(Arg::new("schema").required(true).help("Schema name"))
                .arg(base_arg())
                .arg(
                    Arg::new("from")
                        .long("from")
                        .value_name("VERSION")
                        .help("Start version (default: the recorded current version)"),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .value_name("VERSION")
                        .help("Target version (default: highest reachable version)"),
                )
                .arg(db_path_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(clap::ArgAction::SetTrue)
                        .help("Emit JSON"),
                ),
        )
        .subcommand(
            Command::new("history")
                .about("Show the migration history")
                .arg(Arg::new("schema").help("Schema name (optional)"))
                .arg(db_path_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(clap::ArgAction::SetTrue)
                        .help("Emit JSON"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("migradir.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
