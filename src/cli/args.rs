use std::path::PathBuf;

use clap::Parser;

/// Remove `moved`, `import` and `removed` blocks that Terraform state already reflects.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory of Terraform configuration to clean
    pub dir: PathBuf,

    /// Terraform state location (s3://, http(s)://, file:// or a path).
    /// Detected from an S3 backend block when omitted.
    #[arg(long, env = "TFPRUNE_TFSTATE")]
    pub tfstate: Option<String>,

    /// Report what would be removed without touching any file
    #[arg(long)]
    pub dry_run: bool,
}

impl From<Cli> for tfprune::app::RunConfig {
    fn from(cli: Cli) -> Self {
        Self {
            dir: cli.dir,
            tfstate: cli.tfstate,
            dry_run: cli.dry_run,
        }
    }
}
