//! CLI command implementation.

pub mod parsers;

use clap::{ArgAction, Parser};
use rex::credential::DEFAULT_HOSTNAME;
use rex::{resolve, Credential, ExitStatus, Session, SessionConfig};
use std::ffi::OsString;
use tracing::debug;

const AFTER_HELP: &str = "\
Examples:
  rex 10.0.0.1 cat /etc/shadow
  rex 10.0.0.1 -u 1 id
  rex 10.0.0.1 -- ls -l
  rex 10.0.0.1 -p 32775 id

The target must run rexd (RPC program 100017). Check with:
  rpcinfo -p 10.0.0.1 | grep 100017";

/// Run a command on a remote host through rexd.
///
/// The command's standard output is copied to this process's standard
/// output, and rex exits with the command's exit status.
#[derive(Parser, Debug)]
#[command(name = "rex", version, disable_help_flag = true, after_help = AFTER_HELP)]
pub struct Cli {
    /// Remote service port (skips the portmapper lookup)
    #[arg(short = 'p', long, value_name = "PORT", value_parser = parsers::parse_service_port)]
    pub port: Option<u16>,

    /// User id to run the command as
    #[arg(short = 'u', long, default_value_t = 0, value_name = "UID")]
    pub uid: u32,

    /// Group id to run the command as
    #[arg(short = 'g', long, default_value_t = 0, value_name = "GID")]
    pub gid: u32,

    /// Machine name claimed in the credential
    #[arg(
        short = 'h',
        long,
        default_value = DEFAULT_HOSTNAME,
        value_name = "HOSTNAME",
        value_parser = parsers::parse_machine_name
    )]
    pub hostname: String,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Host running rexd
    #[arg(value_name = "TARGETHOST")]
    pub host: String,

    /// Command and arguments, passed to the remote host byte for byte
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<OsString>,
}

impl Cli {
    /// Resolve the target, run the command and return its exit status.
    pub fn run(self) -> rex::Result<ExitStatus> {
        let target = resolve(&self.host, self.port)?;
        let credential = Credential::new(self.uid, self.gid, self.hostname);
        debug!(host = %target.host, uid = credential.uid, gid = credential.gid, "running remote command");

        let command: Vec<Vec<u8>> = self.command.into_iter().map(parsers::arg_bytes).collect();
        let mut session = Session::connect(&target, credential, SessionConfig::default())?;
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        session.run(&target.host, &command, &mut out)
    }
}
