/*!
 * Base System
 * The small set of user programs the kernel binary boots with
 */

use super::{SimPlatform, UserEnv};
use crate::process::types::{wexitstatus, wifexited, wtermsig};
use tracing::{info, warn};

pub const INIT: &str = "/bin/init";
pub const ECHO: &str = "/bin/echo";
pub const TRUE: &str = "/bin/true";
pub const FALSE: &str = "/bin/false";

/// Exit code of a child whose exec failed, as shells report it
pub const EXEC_FAILED: i32 = 127;

/// Install init, echo, true and false
pub fn install_base_system(platform: &SimPlatform) {
    platform.install_program(INIT, init);
    platform.install_program(ECHO, echo);
    platform.install_program(TRUE, |_| 0);
    platform.install_program(FALSE, |_| 1);
}

/// Print the arguments separated by spaces
pub fn echo(env: &mut UserEnv<'_>) -> i32 {
    let args = env.args();
    println!("{}", args.get(1..).unwrap_or_default().join(" "));
    0
}

/// Run each job in a child and check its exit code
///
/// Returns the number of jobs that did not exit as expected.
pub fn init(env: &mut UserEnv<'_>) -> i32 {
    let pid = env.getpid();
    info!(pid = %pid, args = ?env.args(), "init running");

    let jobs: [(&'static [&'static str], i32); 3] = [
        (&[ECHO, "hello", "from", "init"], 0),
        (&[TRUE], 0),
        (&[FALSE], 1),
    ];

    let mut failures = 0;
    for (argv, expected) in jobs {
        let child = env.fork(move |child: &mut UserEnv<'_>| {
            let errno = child.execv(argv[0], argv);
            warn!(path = argv[0], %errno, "exec failed");
            EXEC_FAILED
        });

        let child = match child {
            Ok(child) => child,
            Err(errno) => {
                warn!(%errno, "fork failed");
                failures += 1;
                continue;
            }
        };

        match env.waitpid(child) {
            Ok(status) if wifexited(status) && wexitstatus(status) == expected => {
                info!(child = %child, path = argv[0], code = wexitstatus(status), "job finished");
            }
            Ok(status) if wifexited(status) => {
                warn!(child = %child, path = argv[0], code = wexitstatus(status), expected, "unexpected exit code");
                failures += 1;
            }
            Ok(status) => {
                warn!(child = %child, path = argv[0], signal = wtermsig(status), "job killed");
                failures += 1;
            }
            Err(errno) => {
                warn!(child = %child, %errno, "waitpid failed");
                failures += 1;
            }
        }
    }
    failures
}
