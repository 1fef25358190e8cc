use clap::Parser;
use std::path::PathBuf;

/// Grade-tracking sidecar: JSON requests on stdin, one JSON reply per line on stdout.
#[derive(Debug, Parser)]
#[command(name = "gradebookd", version)]
pub struct Cli {
    /// Workspace directory to open at start-up.
    #[arg(long, env = "GRADEBOOKD_WORKSPACE")]
    pub workspace: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_is_optional() {
        let cli = Cli::try_parse_from(["gradebookd"]).unwrap();
        assert!(cli.workspace.is_none() || std::env::var_os("GRADEBOOKD_WORKSPACE").is_some());

        let cli = Cli::try_parse_from(["gradebookd", "--workspace", "/tmp/grades"]).unwrap();
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/grades")));
    }
}
