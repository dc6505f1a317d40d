//! Tests for probe, config and completions subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;

#[test]
fn cli_parse_probe() {
    match parse(&["rangeflow", "probe", "https://example.com/a", "-H", "Cookie: x=1"]) {
        CliCommand::Probe { url, headers } => {
            assert_eq!(url, "https://example.com/a");
            assert_eq!(headers, vec![("Cookie".to_string(), "x=1".to_string())]);
        }
        _ => panic!("expected Probe"),
    }
}

#[test]
fn cli_parse_config() {
    assert!(matches!(parse(&["rangeflow", "config"]), CliCommand::Config));
}

#[test]
fn cli_parse_completions() {
    match parse(&["rangeflow", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, Shell::Bash),
        _ => panic!("expected Completions"),
    }
}

#[test]
fn cli_unknown_subcommand_fails() {
    assert!(Cli::try_parse_from(["rangeflow", "add", "x"]).is_err());
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}
