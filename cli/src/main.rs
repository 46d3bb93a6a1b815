// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

//! The main "mcal" command-line driver.

use anyhow::Error;
use clap::{crate_version, value_parser, Arg, ArgMatches, Command};
use std::path::PathBuf;
use std::process;

use mcal_core::notify::{self, ClapNotificationArgsExt, NotificationBackend};

use mcal::check::Tester;
use mcal::collate::Collator;

fn main() {
    let matches = Command::new("mcal")
        .version(crate_version!())
        .about("Collate metacalibration shear catalogs")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .mcal_notify_args()
        .subcommand(
            Command::new("collate")
                .about("Collate a directory of tile catalogs into one file")
                .arg(
                    Arg::new("input_dir")
                        .long("input-dir")
                        .short('i')
                        .value_name("DIR")
                        .help("The directory containing the tile files")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_name("PATH")
                        .help("The path of the collated output file to create")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Spot-check a collated file against its input tiles")
                .arg(
                    Arg::new("input_dir")
                        .long("input-dir")
                        .short('i')
                        .value_name("DIR")
                        .help("The directory containing the tile files")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("reference")
                        .long("reference")
                        .short('r')
                        .value_name("PATH")
                        .help("The collated file to check")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("ntest")
                        .long("ntest")
                        .short('n')
                        .value_name("COUNT")
                        .help("How many randomly chosen tiles to check")
                        .value_parser(value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .short('s')
                        .value_name("SEED")
                        .help("Seed the tile choice for reproducibility")
                        .value_parser(value_parser!(u64)),
                ),
        )
        .get_matches();

    process::exit(notify::run_with_notifications(matches, inner));
}

fn inner(matches: ArgMatches, nbe: &mut dyn NotificationBackend) -> Result<i32, Error> {
    match matches.subcommand() {
        Some(("collate", m)) => {
            let input_dir = m.get_one::<PathBuf>("input_dir").unwrap();
            let output = m.get_one::<PathBuf>("output").unwrap();
            Collator::new(input_dir, output).go(nbe)?;
        }

        Some(("check", m)) => {
            let input_dir = m.get_one::<PathBuf>("input_dir").unwrap();
            let reference = m.get_one::<PathBuf>("reference").unwrap();
            let n_test = *m.get_one::<usize>("ntest").unwrap();
            let seed = m.get_one::<u64>("seed").copied();
            Tester::new(input_dir, reference, n_test, seed).go(nbe)?;
        }

        _ => unreachable!(),
    }

    Ok(0)
}
