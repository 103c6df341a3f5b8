//! Fake terminal.
//!
//! Commands never execute. Each input line is matched against an ordered
//! rule set: the exact-match table first, then prefix rules, then substring
//! rules, then the `command not found` fallback. Numeric fields in some
//! canned outputs are drawn at random per call.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of one simulated command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub output: String,
    pub exit_code: i32,
}

impl CommandOutput {
    fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit_code: 0,
        }
    }

    fn fail(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            output: output.into(),
            exit_code,
        }
    }
}

/// One command line as seen by the rules
struct Invocation<'a> {
    /// Trimmed input as typed
    raw: &'a str,
    /// Remainder after a matched prefix
    argument: &'a str,
    working_directory: &'a str,
}

type Responder = fn(&Invocation<'_>, &mut dyn rand::RngCore) -> CommandOutput;

enum Matcher {
    /// Case-insensitive match on the whole trimmed line
    Exact(&'static [&'static str]),
    /// Line starts with the prefix; the rest becomes the argument
    Prefix(&'static str),
    /// Line contains any of the needles
    Contains(&'static [&'static str]),
}

struct Rule {
    matcher: Matcher,
    respond: Responder,
}

const RULES: &[Rule] = &[
    Rule { matcher: Matcher::Exact(&["ls", "ls -la"]), respond: ls },
    Rule { matcher: Matcher::Exact(&["pwd"]), respond: pwd },
    Rule { matcher: Matcher::Exact(&["whoami"]), respond: whoami },
    Rule { matcher: Matcher::Exact(&["date"]), respond: date },
    Rule { matcher: Matcher::Exact(&["uptime"]), respond: uptime },
    Rule { matcher: Matcher::Exact(&["free -h"]), respond: free },
    Rule { matcher: Matcher::Exact(&["df -h"]), respond: df },
    Rule { matcher: Matcher::Exact(&["ps aux"]), respond: ps },
    Rule { matcher: Matcher::Exact(&["top"]), respond: top },
    Rule { matcher: Matcher::Exact(&["clear"]), respond: clear },
    Rule { matcher: Matcher::Exact(&["help"]), respond: help },
    Rule { matcher: Matcher::Prefix("cat "), respond: cat },
    Rule { matcher: Matcher::Prefix("echo "), respond: echo },
    Rule { matcher: Matcher::Prefix("mkdir "), respond: mkdir },
    Rule { matcher: Matcher::Prefix("touch "), respond: touch },
    Rule { matcher: Matcher::Contains(&["install", "update"]), respond: package },
];

pub const OS_RELEASE: &str = r#"NAME="Ubuntu"
VERSION="22.04.3 LTS (Jammy Jellyfish)"
ID=ubuntu
ID_LIKE=debian
PRETTY_NAME="Ubuntu 22.04.3 LTS"
VERSION_ID="22.04"
HOME_URL="https://www.ubuntu.com/"
SUPPORT_URL="https://help.ubuntu.com/"
BUG_REPORT_URL="https://bugs.launchpad.net/ubuntu/"
PRIVACY_POLICY_URL="https://www.ubuntu.com/legal/terms-and-policies/privacy-policy"
VERSION_CODENAME=jammy
UBUNTU_CODENAME=jammy"#;

const HELP: &str = "Available commands:
Basic: ls, pwd, whoami, date, uptime, clear
System: free -h, df -h, ps aux, top
Files: cat, touch, mkdir, rm, cp, mv
Network: ping, wget, curl
Package: apt update, apt install
Note: This is a simulated environment. Some commands may have limited functionality.";

/// Stateless command simulator
#[derive(Debug, Clone, Default)]
pub struct CommandSimulator;

impl CommandSimulator {
    pub fn new() -> Self {
        Self
    }

    /// Simulate `command` in the container identified by `container_ref`.
    pub fn execute(&self, container_ref: &str, command: &str, working_directory: &str) -> CommandOutput {
        self.execute_with_rng(container_ref, command, working_directory, &mut rand::thread_rng())
    }

    /// Same as [`execute`](Self::execute) with a caller-supplied RNG.
    pub fn execute_with_rng(
        &self,
        container_ref: &str,
        command: &str,
        working_directory: &str,
        rng: &mut dyn rand::RngCore,
    ) -> CommandOutput {
        debug!("Simulating command in {}: {}", container_ref, command);

        let raw = command.trim();
        if raw.is_empty() {
            return CommandOutput::ok("");
        }
        let normalized = raw.to_lowercase();

        for rule in RULES {
            let argument = match rule.matcher {
                Matcher::Exact(names) => names.contains(&normalized.as_str()).then_some(""),
                Matcher::Prefix(prefix) => raw.strip_prefix(prefix),
                Matcher::Contains(needles) => needles.iter().any(|n| raw.contains(n)).then_some(""),
            };

            if let Some(argument) = argument {
                let inv = Invocation {
                    raw,
                    argument,
                    working_directory,
                };
                return (rule.respond)(&inv, rng);
            }
        }

        CommandOutput::fail(format!("bash: {}: command not found", raw), 127)
    }
}

fn day_stamp() -> String {
    Utc::now().format("%a %b %d %Y").to_string()
}

fn ls(_: &Invocation<'_>, _: &mut dyn rand::RngCore) -> CommandOutput {
    let today = day_stamp();
    CommandOutput::ok(format!(
        "total 48
drwx------ 1 root root 4096 {today} .
drwxr-xr-x 1 root root 4096 {today} ..
-rw-r--r-- 1 root root  571 Apr 10  2021 .bashrc
-rw-r--r-- 1 root root  161 Jul  9  2019 .profile
drwxr-xr-x 2 root root 4096 {today} .ssh
-rw-r--r-- 1 root root 1024 {today} .vimrc"
    ))
}

fn pwd(inv: &Invocation<'_>, _: &mut dyn rand::RngCore) -> CommandOutput {
    CommandOutput::ok(inv.working_directory)
}

fn whoami(_: &Invocation<'_>, _: &mut dyn rand::RngCore) -> CommandOutput {
    CommandOutput::ok("root")
}

fn date(_: &Invocation<'_>, _: &mut dyn rand::RngCore) -> CommandOutput {
    CommandOutput::ok(Utc::now().format("%a %b %e %H:%M:%S UTC %Y").to_string())
}

fn uptime(_: &Invocation<'_>, rng: &mut dyn rand::RngCore) -> CommandOutput {
    let secs: u32 = rng.gen_range(0..86_400);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    CommandOutput::ok(format!(
        "{hours}:{minutes:02} up {hours}h {minutes}m, 1 user, load average: 0.{}, 0.{}, 0.{}",
        rng.gen_range(0..50),
        rng.gen_range(0..30),
        rng.gen_range(0..20)
    ))
}

fn free(_: &Invocation<'_>, rng: &mut dyn rand::RngCore) -> CommandOutput {
    CommandOutput::ok(format!(
        "              total        used        free      shared  buff/cache   available
Mem:           2.0G        {}M        1.{}G         12M        {}M        1.{}G
Swap:          1.0G          0B        1.0G",
        rng.gen_range(200..1000),
        rng.gen_range(0..5),
        rng.gen_range(200..600),
        rng.gen_range(0..5)
    ))
}

fn df(_: &Invocation<'_>, rng: &mut dyn rand::RngCore) -> CommandOutput {
    let used: u32 = rng.gen_range(2..12);
    let avail = 20 - used;
    let percent = used * 100 / 20;
    CommandOutput::ok(format!(
        "Filesystem      Size  Used Avail Use% Mounted on
/dev/sda1        20G  {used}.{}G   {avail}G  {percent}% /
tmpfs           1.0G     0  1.0G   0% /dev/shm
tmpfs           5.0M     0  5.0M   0% /run/lock",
        rng.gen_range(0..10)
    ))
}

fn ps(_: &Invocation<'_>, _: &mut dyn rand::RngCore) -> CommandOutput {
    let start = Utc::now().format("%H:%M").to_string();
    CommandOutput::ok(format!(
        "USER       PID %CPU %MEM    VSZ   RSS TTY      STAT START   TIME COMMAND
root         1  0.0  0.1  18236  3152 ?        Ss   {start}   0:00 /bin/bash
root        15  0.0  0.1  34400  2896 ?        R    {start}   0:00 ps aux"
    ))
}

fn top(_: &Invocation<'_>, rng: &mut dyn rand::RngCore) -> CommandOutput {
    let clock = Utc::now().format("%H:%M:%S").to_string();
    CommandOutput::ok(format!(
        "top - {clock} up  2:15,  1 user,  load average: 0.08, 0.03, 0.05
Tasks:   2 total,   1 running,   1 sleeping,   0 stopped,   0 zombie
%Cpu(s):  {}.0 us,  {}.0 sy,  0.0 ni, {}.0 id,  0.0 wa,  0.0 hi,  0.0 si,  0.0 st
MiB Mem :   2048.0 total,   {}.0 free,    {}.0 used,    {}.0 buff/cache
MiB Swap:   1024.0 total,   1024.0 free,      0.0 used.   {}.0 avail Mem

  PID USER      PR  NI    VIRT    RES    SHR S  %CPU  %MEM     TIME+ COMMAND
    1 root      20   0   18236   3152   2688 S   0.0   0.2   0:00.01 bash",
        rng.gen_range(0..20),
        rng.gen_range(0..10),
        rng.gen_range(70..90),
        rng.gen_range(1000..1800),
        rng.gen_range(200..600),
        rng.gen_range(200..600),
        rng.gen_range(1200..1800)
    ))
}

fn clear(_: &Invocation<'_>, _: &mut dyn rand::RngCore) -> CommandOutput {
    CommandOutput::ok("")
}

fn help(_: &Invocation<'_>, _: &mut dyn rand::RngCore) -> CommandOutput {
    CommandOutput::ok(HELP)
}

fn cat(inv: &Invocation<'_>, _: &mut dyn rand::RngCore) -> CommandOutput {
    let path = inv.argument.trim();
    if path == "/etc/os-release" {
        CommandOutput::ok(OS_RELEASE)
    } else {
        CommandOutput::fail(format!("cat: {}: No such file or directory", path), 1)
    }
}

fn echo(inv: &Invocation<'_>, _: &mut dyn rand::RngCore) -> CommandOutput {
    CommandOutput::ok(inv.argument)
}

fn mkdir(inv: &Invocation<'_>, _: &mut dyn rand::RngCore) -> CommandOutput {
    CommandOutput::ok(format!("Directory '{}' created", inv.argument.trim()))
}

fn touch(inv: &Invocation<'_>, _: &mut dyn rand::RngCore) -> CommandOutput {
    CommandOutput::ok(format!("File '{}' created", inv.argument.trim()))
}

fn package(inv: &Invocation<'_>, _: &mut dyn rand::RngCore) -> CommandOutput {
    CommandOutput::ok(format!(
        "Simulated package operation: {}\nThis is a demo environment. Package management is simulated.",
        inv.raw
    ))
}
