//! gitree - print git object ids for a local directory tree

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gitree::ops::{ls_tree_recursive, mode_name};
use gitree::{open_root, Config, LinkPolicy};

#[derive(Parser)]
#[command(name = "gitree")]
#[command(about = "git object ids for a local directory tree, honoring .gitignore")]
#[command(version)]
struct Cli {
    /// directory to walk
    dir: PathBuf,

    /// policy for symlinks to files
    #[arg(long, value_enum)]
    links: Option<LinkPolicy>,

    /// policy for symlinks to directories
    #[arg(long, value_enum)]
    dir_links: Option<LinkPolicy>,

    /// do not apply ignore rules
    #[arg(long)]
    no_gitignore: bool,

    /// do not apply ignore rules found above DIR
    #[arg(long)]
    no_ancestor_ignore: bool,

    /// skip regular files larger than this (k, m, g suffixes)
    #[arg(long, value_parser = parse_size)]
    max_size: Option<u64>,

    /// config file
    #[arg(short, long, env = "GITREE_CONFIG")]
    config: Option<PathBuf>,

    /// print only the id of DIR
    #[arg(long)]
    hash_only: bool,

    /// debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("GITREE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> gitree::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(policy) = cli.links {
        config.file_links = policy;
    }
    if let Some(policy) = cli.dir_links {
        config.dir_links = policy;
    }
    if cli.no_gitignore {
        config.gitignore = false;
    }
    if cli.no_ancestor_ignore {
        config.ancestor_ignore = false;
    }
    if cli.max_size.is_some() {
        config.max_size = cli.max_size;
    }

    let (mut tree, root) = open_root(&cli.dir, config.to_options())?;

    if cli.hash_only {
        println!("{}", tree.get_hash(root)?);
        return Ok(());
    }

    for entry in ls_tree_recursive(&mut tree, root)? {
        let path = if entry.path.is_empty() { "." } else { &entry.path };
        println!(
            "{} {} {:>6} {}",
            entry.hash,
            mode_name(&entry.kind),
            human_size(entry.size),
            path
        );
    }

    Ok(())
}

fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, scale) = match s.chars().last().map(|c| c.to_ascii_lowercase()) {
        Some('k') => (&s[..s.len() - 1], 1u64 << 10),
        Some('m') => (&s[..s.len() - 1], 1 << 20),
        Some('g') => (&s[..s.len() - 1], 1 << 30),
        _ => (s, 1),
    };
    let n: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid size: {:?}", s))?;
    n.checked_mul(scale)
        .ok_or_else(|| format!("size too large: {:?}", s))
}

fn human_size(n: u64) -> String {
    const UNITS: [&str; 4] = ["K", "M", "G", "T"];
    if n < 1024 {
        return n.to_string();
    }
    let mut value = n as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("100").unwrap(), 100);
        assert_eq!(parse_size("4k").unwrap(), 4096);
        assert_eq!(parse_size("2M").unwrap(), 2 << 20);
        assert_eq!(parse_size("1g").unwrap(), 1 << 30);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0");
        assert_eq!(human_size(1023), "1023");
        assert_eq!(human_size(1536), "1.5K");
        assert_eq!(human_size(3 << 20), "3.0M");
    }
}
