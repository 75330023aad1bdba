use std::path::PathBuf;

/// Read-only view of the process surroundings the bootstrap depends on.
pub trait Environment {
    fn home_dir(&self) -> Option<PathBuf>;

    fn var(&self, key: &str) -> Option<String>;

    /// All variables, in no particular order.
    fn vars(&self) -> Vec<(String, String)>;

    /// Like `var`, but treats an empty value as unset.
    fn non_empty_var(&self, key: &str) -> Option<String> {
        self.var(key).filter(|value| !value.is_empty())
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        // vars() panics on non-unicode entries; those can never be KDK keys anyway.
        std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use super::Environment;

    /// In-memory environment for driving the bootstrap without touching the real one.
    #[derive(Debug, Clone, Default)]
    pub struct FakeEnvironment {
        home: Option<PathBuf>,
        vars: HashMap<String, String>,
    }

    impl FakeEnvironment {
        pub fn with_home(home: &Path) -> Self {
            Self {
                home: Some(home.to_path_buf()),
                vars: HashMap::new(),
            }
        }

        pub fn homeless() -> Self {
            Self::default()
        }

        pub fn set(mut self, key: &str, value: &str) -> Self {
            self.vars.insert(key.to_string(), value.to_string());
            self
        }
    }

    impl Environment for FakeEnvironment {
        fn home_dir(&self) -> Option<PathBuf> {
            self.home.clone()
        }

        fn var(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }

        fn vars(&self) -> Vec<(String, String)> {
            self.vars
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        }
    }
}
