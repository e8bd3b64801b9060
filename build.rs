// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    let db_path_arg = || {
        Arg::new("database_url")
            .long("database-url")
            .value_name("URL")
            .help("Database connection URL")
    };

    Command::new("jetbase")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Jetbase Contributors")
        .about("Schema-migration engine for relational databases")
        .arg(db_path_arg())
        .arg(
            Arg::new("migrations_dir")
                .long("migrations-dir")
                .value_name("DIR")
                .help("Directory containing migration .sql files"),
        )
        .subcommand_required(true)
        .subcommand(Command::new("init").about("Scaffold the migrations directory"))
        .subcommand(
            Command::new("upgrade")
                .about("Apply every pending migration")
                .arg(
                    Arg::new("to_version")
                        .long("to-version")
                        .value_name("VERSION")
                        .conflicts_with("count"),
                )
                .arg(
                    Arg::new("count")
                        .long("count")
                        .value_name("N")
                        .conflicts_with("to_version"),
                )
                .arg(Arg::new("dry_run").long("dry-run").action(ArgAction::SetTrue))
                .arg(
                    Arg::new("skip_validation")
                        .long("skip-validation")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("skip_checksum_validation")
                        .long("skip-checksum-validation")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("skip_file_validation")
                        .long("skip-file-validation")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("rollback")
                .about("Roll back the latest applied versioned migration(s)")
                .arg(
                    Arg::new("to_version")
                        .long("to-version")
                        .value_name("VERSION")
                        .conflicts_with("count"),
                )
                .arg(
                    Arg::new("count")
                        .long("count")
                        .value_name("N")
                        .conflicts_with("to_version"),
                )
                .arg(Arg::new("dry_run").long("dry-run").action(ArgAction::SetTrue)),
        )
        .subcommand(Command::new("history").about("Show applied migration history"))
        .subcommand(Command::new("current").about("Show the most recently applied version"))
        .subcommand(Command::new("status").about("List versions pending application"))
        .subcommand(
            Command::new("validate-checksums")
                .about("Re-run the checksum-fidelity check")
                .arg(Arg::new("fix").long("fix").action(ArgAction::SetTrue)),
        )
        .subcommand(
            Command::new("validate-files")
                .about("Re-run the file-presence and order checks")
                .arg(Arg::new("fix").long("fix").action(ArgAction::SetTrue)),
        )
        .subcommand(Command::new("fix").about("Repair checksum drift and orphaned history rows"))
        .subcommand(
            Command::new("new")
                .about("Scaffold a new versioned migration file")
                .arg(Arg::new("description").required(true)),
        )
        .subcommand(Command::new("lock-status").about("Show the migration lock's state"))
        .subcommand(Command::new("unlock").about("Clear the migration lock"))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"]),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("failed to render man page");

    let man_path = man_dir.join("jetbase.1");
    fs::write(&man_path, buffer).expect("failed to write man page");

    println!("cargo:warning=man page generated at {}", man_path.display());
}
