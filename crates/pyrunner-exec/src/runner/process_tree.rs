//! Kill the interpreter together with everything it started.
//!
//! Unix: the child leads its own process group and the group is signalled.
//! Windows: the child is assigned to a job object that is terminated.

use std::process::{Child, Command};

/// Put the child in its own process group before spawn.
#[cfg(unix)]
pub(super) fn prepare(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(windows)]
pub(super) fn prepare(_cmd: &mut Command) {}

/// Handle on the child's process tree.
pub(super) struct ProcessTree {
    #[cfg(windows)]
    job: Option<JobHandle>,
}

impl ProcessTree {
    #[cfg(unix)]
    pub(super) fn attach(_child: &Child) -> Self {
        Self {}
    }

    #[cfg(windows)]
    pub(super) fn attach(child: &Child) -> Self {
        let job = JobHandle::for_child(child);
        if job.is_none() {
            tracing::debug!("Job object unavailable, only the interpreter will be killed");
        }
        Self { job }
    }

    /// Kill every process in the tree. The direct child is always killed, even
    /// when the group signal fails.
    #[cfg(unix)]
    pub(super) fn kill(&self, child: &mut Child) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id()) {
            if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                tracing::debug!(pid, error = %e, "killpg failed");
            }
        }
        let _ = child.kill();
    }

    #[cfg(windows)]
    pub(super) fn kill(&self, child: &mut Child) {
        if let Some(job) = &self.job {
            job.terminate();
        }
        let _ = child.kill();
    }
}

#[cfg(windows)]
struct JobHandle(windows_sys::Win32::Foundation::HANDLE);

#[cfg(windows)]
impl JobHandle {
    fn for_child(child: &Child) -> Option<Self> {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::Foundation::HANDLE;
        use windows_sys::Win32::System::JobObjects::{AssignProcessToJobObject, CreateJobObjectW};

        let job = unsafe { CreateJobObjectW(std::ptr::null(), std::ptr::null()) };
        if job.is_null() {
            return None;
        }
        let job = Self(job);
        let assigned = unsafe { AssignProcessToJobObject(job.0, child.as_raw_handle() as HANDLE) };
        if assigned == 0 {
            return None;
        }
        Some(job)
    }

    fn terminate(&self) {
        use windows_sys::Win32::System::JobObjects::TerminateJobObject;
        unsafe {
            TerminateJobObject(self.0, 1);
        }
    }
}

#[cfg(windows)]
impl Drop for JobHandle {
    fn drop(&mut self) {
        unsafe {
            windows_sys::Win32::Foundation::CloseHandle(self.0);
        }
    }
}
