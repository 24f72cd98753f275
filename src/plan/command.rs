use serde::{Deserialize, Serialize};

/// A single instruction within a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Run a command directly.
    #[serde(rename_all = "camelCase")]
    Exec {
        cmd: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        custom_name: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        caches: Vec<String>,
    },

    /// Run a command through the shell.
    #[serde(rename_all = "camelCase")]
    ExecShell {
        cmd: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        custom_name: Option<String>,
    },

    /// Copy a path from the previous layer, the local context, or another image.
    #[serde(rename_all = "camelCase")]
    Copy {
        src: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        dest: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },

    /// Materialize a step asset as a file.
    #[serde(rename_all = "camelCase")]
    File {
        path: String,
        asset_key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mode: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        custom_name: Option<String>,
    },

    /// Prepend a directory to PATH.
    Path { value: String },

    /// Set an environment variable for this and subsequent commands.
    Variable { key: String, value: String },
}

impl Command {
    pub fn exec(cmd: impl Into<String>) -> Self {
        Command::Exec {
            cmd: cmd.into(),
            custom_name: None,
            caches: Vec::new(),
        }
    }

    pub fn exec_named(cmd: impl Into<String>, custom_name: impl Into<String>) -> Self {
        Command::Exec {
            cmd: cmd.into(),
            custom_name: Some(custom_name.into()),
            caches: Vec::new(),
        }
    }

    pub fn exec_with_caches(
        cmd: impl Into<String>,
        custom_name: Option<String>,
        caches: Vec<String>,
    ) -> Self {
        Command::Exec {
            cmd: cmd.into(),
            custom_name,
            caches,
        }
    }

    pub fn exec_shell(cmd: impl Into<String>) -> Self {
        Command::ExecShell {
            cmd: cmd.into(),
            custom_name: None,
        }
    }

    pub fn exec_shell_named(cmd: impl Into<String>, custom_name: impl Into<String>) -> Self {
        Command::ExecShell {
            cmd: cmd.into(),
            custom_name: Some(custom_name.into()),
        }
    }

    pub fn copy(src: impl Into<String>) -> Self {
        Command::Copy {
            src: src.into(),
            dest: None,
            image: None,
        }
    }

    pub fn copy_to(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Command::Copy {
            src: src.into(),
            dest: Some(dest.into()),
            image: None,
        }
    }

    pub fn copy_from_image(
        image: impl Into<String>,
        src: impl Into<String>,
        dest: impl Into<String>,
    ) -> Self {
        Command::Copy {
            src: src.into(),
            dest: Some(dest.into()),
            image: Some(image.into()),
        }
    }

    pub fn file(path: impl Into<String>, asset_key: impl Into<String>) -> Self {
        Command::File {
            path: path.into(),
            asset_key: asset_key.into(),
            mode: None,
            custom_name: None,
        }
    }

    pub fn file_named(
        path: impl Into<String>,
        asset_key: impl Into<String>,
        custom_name: impl Into<String>,
    ) -> Self {
        Command::File {
            path: path.into(),
            asset_key: asset_key.into(),
            mode: None,
            custom_name: Some(custom_name.into()),
        }
    }

    pub fn path(value: impl Into<String>) -> Self {
        Command::Path {
            value: value.into(),
        }
    }

    pub fn variable(key: impl Into<String>, value: impl Into<String>) -> Self {
        Command::Variable {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The asset this command references, if any.
    pub fn asset_key(&self) -> Option<&str> {
        match self {
            Command::File { asset_key, .. } => Some(asset_key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_serialization() {
        let cmd = Command::exec("cargo build --release");
        assert_eq!(
            serde_json::to_string(&cmd).unwrap(),
            r#"{"type":"exec","cmd":"cargo build --release"}"#
        );
    }

    #[test]
    fn test_exec_with_caches_serialization() {
        let cmd = Command::exec_with_caches(
            "npm ci",
            Some("install node modules".to_string()),
            vec!["npm".to_string()],
        );
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""customName":"install node modules""#));
        assert!(json.contains(r#""caches":["npm"]"#));
    }

    #[test]
    fn test_copy_variants() {
        let plain = Command::copy(".");
        assert_eq!(
            serde_json::to_string(&plain).unwrap(),
            r#"{"type":"copy","src":"."}"#
        );

        let from_image = Command::copy_from_image("composer:latest", "/usr/bin/composer", "/usr/bin/composer");
        let json = serde_json::to_string(&from_image).unwrap();
        assert!(json.contains(r#""image":"composer:latest""#));
    }

    #[test]
    fn test_round_trip_all_variants() {
        for cmd in [
            Command::exec("ls"),
            Command::exec_shell("echo hi"),
            Command::copy_to("Caddyfile", "/Caddyfile"),
            Command::file("/etc/mise/config.toml", "mise.toml"),
            Command::path("/mise/shims"),
            Command::variable("PORT", "8080"),
        ] {
            let json = serde_json::to_string(&cmd).unwrap();
            let back: Command = serde_json::from_str(&json).unwrap();
            assert_eq!(cmd, back);
        }
    }

    #[test]
    fn test_asset_key_accessor() {
        let file = Command::file("/Caddyfile", "Caddyfile");
        assert_eq!(file.asset_key(), Some("Caddyfile"));
        assert_eq!(Command::exec("ls").asset_key(), None);
    }
}
