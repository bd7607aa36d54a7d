//! Static catalog of diagnostic tools
//!
//! Maps each inbound start request to the command line to run, the timeout
//! ceiling for that tool, the header/footer text framing the run, and the
//! policy for the process's stderr stream. Planning is pure: malformed
//! parameters are rejected here, before anything is spawned.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[cfg(test)]
mod tests;

/// Default packet count for ping when the client omits one
const DEFAULT_PING_COUNT: u32 = 10;
/// Upper bound on the ping packet count
const MAX_PING_COUNT: u32 = 1000;
/// Resolver used by dig when the client does not name one
const DEFAULT_DIG_SERVER: &str = "1.1.1.1";

/// The diagnostic tools the console can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Ping,
    Whois,
    Nslookup,
    Dig,
    Portscan,
    Host,
    Ipcalc,
}

impl ToolKind {
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Ping => "ping",
            ToolKind::Whois => "whois",
            ToolKind::Nslookup => "nslookup",
            ToolKind::Dig => "dig",
            ToolKind::Portscan => "portscan",
            ToolKind::Host => "host",
            ToolKind::Ipcalc => "ipcalc",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inbound request from the client, one variant per tool plus `stop`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientRequest {
    StartPing {
        target: String,
        count: Option<u32>,
    },
    StartWhois {
        domain: String,
    },
    StartNslookup {
        domain: String,
    },
    StartDig {
        domain: String,
        server: Option<String>,
    },
    StartPortscan {
        host: String,
        port: u16,
    },
    StartHost {
        target: String,
    },
    StartIpcalc {
        address: String,
    },
    Stop,
}

/// How the session treats a run's stderr stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrPolicy {
    /// Run stderr lines through the tool's classification rules. `nc`
    /// reports its results there, so the port scanner needs this.
    Classify,
    /// Surface stderr lines with the error color, unclassified.
    ErrorColor,
}

/// Executable, arguments, and timeout ceiling for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

/// Everything the session needs to run one tool invocation
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub tool: ToolKind,
    pub command: CommandSpec,
    pub header: String,
    pub footer: &'static str,
    pub stderr: StderrPolicy,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Build the run plan for a start request.
///
/// Pure and total over well-formed parameters; rejects malformed ones with
/// `InvalidParameters`. Calling this with `Stop` is a programming error and
/// also reports `InvalidParameters` rather than panicking.
pub fn plan(request: &ClientRequest) -> Result<RunPlan, CatalogError> {
    match request {
        ClientRequest::StartPing { target, count } => {
            let target = required("target", target)?;
            let count = count.unwrap_or(DEFAULT_PING_COUNT).clamp(1, MAX_PING_COUNT);
            Ok(RunPlan {
                tool: ToolKind::Ping,
                command: CommandSpec {
                    program: "ping".to_string(),
                    args: vec![
                        "-c".to_string(),
                        count.to_string(),
                        "-i".to_string(),
                        "1".to_string(),
                        target.to_string(),
                    ],
                    // one packet per second plus margin for slow resolvers
                    timeout: Duration::from_secs(u64::from(count) + 30),
                },
                header: format!("PING {target}:\n"),
                footer: "\n[Ping completed]\n",
                stderr: StderrPolicy::ErrorColor,
            })
        }
        ClientRequest::StartWhois { domain } => {
            let domain = required("domain", domain)?;
            Ok(lookup_plan(
                ToolKind::Whois,
                "whois",
                vec![domain.to_string()],
                format!("WHOIS {domain}\n\n"),
                "\n[End of whois data]\n",
            ))
        }
        ClientRequest::StartNslookup { domain } => {
            let domain = required("domain", domain)?;
            Ok(lookup_plan(
                ToolKind::Nslookup,
                "nslookup",
                vec![domain.to_string()],
                format!("NSLOOKUP {domain}\n\n"),
                "\n[End of nslookup]\n",
            ))
        }
        ClientRequest::StartDig { domain, server } => {
            let domain = required("domain", domain)?;
            let server = match server {
                Some(server) => required("server", server)?,
                None => DEFAULT_DIG_SERVER,
            };
            Ok(lookup_plan(
                ToolKind::Dig,
                "dig",
                vec![format!("@{server}"), domain.to_string()],
                format!("DIG @{server} {domain}\n\n"),
                "\n[End of dig]\n",
            ))
        }
        ClientRequest::StartPortscan { host, port } => {
            let host = required("host", host)?;
            Ok(RunPlan {
                tool: ToolKind::Portscan,
                command: CommandSpec {
                    program: "nc".to_string(),
                    args: vec![
                        "-vz".to_string(),
                        "-w".to_string(),
                        "5".to_string(),
                        host.to_string(),
                        port.to_string(),
                    ],
                    timeout: Duration::from_secs(15),
                },
                header: format!("PORT SCAN: {host}:{port}\n\n"),
                footer: "\n[Scan completed]\n",
                stderr: StderrPolicy::Classify,
            })
        }
        ClientRequest::StartHost { target } => {
            let target = required("target", target)?;
            Ok(lookup_plan(
                ToolKind::Host,
                "host",
                vec![target.to_string()],
                format!("HOST {target}\n\n"),
                "\n[End of host]\n",
            ))
        }
        ClientRequest::StartIpcalc { address } => {
            let address = required("address", address)?;
            Ok(RunPlan {
                tool: ToolKind::Ipcalc,
                command: CommandSpec {
                    program: "ipcalc".to_string(),
                    args: vec![address.to_string()],
                    timeout: Duration::from_secs(10),
                },
                header: format!("IPCALC {address}\n\n"),
                footer: "\n[IPCalc completed]\n",
                stderr: StderrPolicy::ErrorColor,
            })
        }
        ClientRequest::Stop => Err(CatalogError::InvalidParameters(
            "stop is not a start request".to_string(),
        )),
    }
}

/// Shared shape for the flat-ceiling lookup tools
fn lookup_plan(
    tool: ToolKind,
    program: &str,
    args: Vec<String>,
    header: String,
    footer: &'static str,
) -> RunPlan {
    RunPlan {
        tool,
        command: CommandSpec {
            program: program.to_string(),
            args,
            timeout: Duration::from_secs(30),
        },
        header,
        footer,
        stderr: StderrPolicy::ErrorColor,
    }
}

/// Validate a required string parameter.
///
/// Arguments are passed as argv entries (never through a shell), so shell
/// metacharacters are inert; only empty values and control characters can
/// corrupt a run and those are rejected here.
fn required<'a>(name: &str, value: &'a str) -> Result<&'a str, CatalogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::InvalidParameters(format!(
            "{name} must not be empty"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(CatalogError::InvalidParameters(format!(
            "{name} contains control characters"
        )));
    }
    Ok(value)
}
