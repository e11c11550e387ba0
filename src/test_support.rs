use std::{
    env,
    ffi::OsString,
    path::Path,
    sync::{Mutex, MutexGuard},
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Points `XDG_CONFIG_HOME` at `path` until dropped. Hold `env_lock` meanwhile.
pub struct XdgOverride {
    previous: Option<OsString>,
}

impl XdgOverride {
    pub fn set(path: &Path) -> Self {
        let previous = env::var_os("XDG_CONFIG_HOME");
        // SAFETY: callers hold the process-wide env lock.
        unsafe { env::set_var("XDG_CONFIG_HOME", path) };
        Self { previous }
    }
}

impl Drop for XdgOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            // SAFETY: restoring env while the env lock is still held.
            Some(value) => unsafe { env::set_var("XDG_CONFIG_HOME", value) },
            // SAFETY: restoring env while the env lock is still held.
            None => unsafe { env::remove_var("XDG_CONFIG_HOME") },
        }
    }
}
