//! Shell completion generation
//!
//! Generate shell completion scripts for bash, zsh, fish, and powershell.

use clap::CommandFactory;
use clap_complete::{Generator, Shell};

use super::Cli;
use crate::exit_code::ExitCode;

/// Arguments for the completions command
#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Generate shell completions and print to stdout
pub fn execute(args: CompletionsArgs) -> ExitCode {
    let mut cmd = Cli::command();
    write_completions(args.shell, &mut cmd, &mut std::io::stdout());
    ExitCode::Success
}

fn write_completions<G: Generator>(
    generator: G,
    cmd: &mut clap::Command,
    out: &mut dyn std::io::Write,
) {
    let name = cmd.get_name().to_string();
    clap_complete::generate(generator, cmd, name, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(shell: Shell) -> String {
        let mut cmd = Cli::command();
        let mut buf = Vec::new();
        write_completions(shell, &mut cmd, &mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_completions_bash() {
        let output = generate(Shell::Bash);
        assert!(output.contains("s3h"));
        assert!(output.contains("complete"));
        assert!(output.contains("share"));
    }

    #[test]
    fn test_completions_zsh() {
        let output = generate(Shell::Zsh);
        assert!(output.contains("compdef"));
        assert!(output.contains("--concurrency"));
    }

    #[test]
    fn test_completions_fish() {
        let output = generate(Shell::Fish);
        assert!(output.contains("complete -c s3h"));
    }

    #[test]
    fn test_completions_powershell() {
        let output = generate(Shell::PowerShell);
        assert!(output.contains("Register-ArgumentCompleter"));
    }
}
