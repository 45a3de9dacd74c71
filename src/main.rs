use std::path::{Path, PathBuf};

use clap::{arg, crate_version, Command};

use bunchiver::{archive, pretty_print_size, STDRESULT};

const RCH: &str = "unreachable was reached";

fn main() -> STDRESULT {
    env_logger::init();

    let long_help = "Examples:
---------
Bundle:        `bunchiver bundle --archive project.bnc src/main.rs src/lib.rs`
Unbundle:      `bunchiver unbundle --archive project.bnc src/main.rs`";

    let mut main_cmd = Command::new("bunchiver")
        .about("Bundle and unbundle files into a static-Huffman archive")
        .after_long_help(long_help)
        .version(crate_version!());

    main_cmd = main_cmd.subcommand(
        Command::new("bundle")
            .arg(arg!(-a --archive <PATH> "archive file to create").required(true))
            .arg(arg!(<FILE> ... "files to add to the archive"))
            .about("compress files into an archive"),
    );

    main_cmd = main_cmd.subcommand(
        Command::new("unbundle")
            .arg(arg!(-a --archive <PATH> "archive file to read").required(true))
            .arg(arg!([FILE] ... "member names to extract (default: all)"))
            .about("extract files from an archive"),
    );

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("bundle") {
        let archive_path = PathBuf::from(cmd.get_one::<String>("archive").expect(RCH));
        let inputs: Vec<PathBuf> = cmd
            .get_many::<String>("FILE")
            .expect(RCH)
            .map(PathBuf::from)
            .collect();

        match archive::bundle(&archive_path, &inputs) {
            Ok(members) => {
                for member in &members {
                    println!(
                        "File `{}` {} >> {}",
                        member.name,
                        pretty_print_size(member.size),
                        pretty_print_size(member.compressed_size)
                    );
                }
            }
            Err(e) => {
                if archive_path.exists() {
                    let _ = std::fs::remove_file(&archive_path);
                }
                return Err(Box::new(e));
            }
        }
    }

    if let Some(cmd) = matches.subcommand_matches("unbundle") {
        let archive_path = PathBuf::from(cmd.get_one::<String>("archive").expect(RCH));
        let names: Vec<String> = cmd
            .get_many::<String>("FILE")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        let members = archive::unbundle(&archive_path, &names, Path::new("."))?;
        for member in &members {
            println!(
                "File `{}` {} << {}",
                member.name,
                pretty_print_size(member.size),
                pretty_print_size(member.compressed_size)
            );
        }
    }

    Ok(())
}
