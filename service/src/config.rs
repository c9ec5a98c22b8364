use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Which connections a gateway instance admits during the handshake.
/// `AnonymousOnly` and `AuthenticatedOnly` both extend `AnyUser`; every other
/// policy extends the one listed right before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionPolicy {
    Open,
    TokenRequired,
    AnyUser,
    AnonymousOnly,
    AuthenticatedOnly,
    StaffOnly,
    SuperuserOnly,
}

impl PermissionPolicy {
    pub const NAMES: [&'static str; 7] = [
        "open",
        "token-required",
        "any-user",
        "anonymous",
        "authenticated",
        "staff",
        "superuser",
    ];
}

#[derive(Debug, PartialEq, Eq)]
pub struct PermissionPolicyParseError;

impl FromStr for PermissionPolicy {
    type Err = PermissionPolicyParseError;
    fn from_str(policy: &str) -> Result<PermissionPolicy, Self::Err> {
        match policy.to_lowercase().as_str() {
            "open" => Ok(PermissionPolicy::Open),
            "token-required" => Ok(PermissionPolicy::TokenRequired),
            "any-user" => Ok(PermissionPolicy::AnyUser),
            "anonymous" => Ok(PermissionPolicy::AnonymousOnly),
            "authenticated" => Ok(PermissionPolicy::AuthenticatedOnly),
            "staff" => Ok(PermissionPolicy::StaffOnly),
            "superuser" => Ok(PermissionPolicy::SuperuserOnly),
            _ => Err(PermissionPolicyParseError),
        }
    }
}

impl fmt::Display for PermissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PermissionPolicy::Open => write!(f, "open"),
            PermissionPolicy::TokenRequired => write!(f, "token-required"),
            PermissionPolicy::AnyUser => write!(f, "any-user"),
            PermissionPolicy::AnonymousOnly => write!(f, "anonymous"),
            PermissionPolicy::AuthenticatedOnly => write!(f, "authenticated"),
            PermissionPolicy::StaffOnly => write!(f, "staff"),
            PermissionPolicy::SuperuserOnly => write!(f, "superuser"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: String,

    /// The TCP port of the data relay instance
    #[arg(short, long, env, default_value_t = 8090)]
    pub port: u16,

    /// The TCP port of the control instance. The control instance only runs when this is set.
    #[arg(long, env)]
    pub control_port: Option<u16>,

    /// Which connections the data relay instance admits
    #[arg(
        long,
        env,
        ignore_case = true,
        default_value_t = PermissionPolicy::Open,
        value_parser = clap::builder::PossibleValuesParser::new(PermissionPolicy::NAMES)
            .map(|s| s.parse::<PermissionPolicy>().unwrap()),
    )]
    pub relay_permission: PermissionPolicy,

    /// Which connections the control instance admits
    #[arg(
        long,
        env,
        ignore_case = true,
        default_value_t = PermissionPolicy::SuperuserOnly,
        value_parser = clap::builder::PossibleValuesParser::new(PermissionPolicy::NAMES)
            .map(|s| s.parse::<PermissionPolicy>().unwrap()),
    )]
    pub control_permission: PermissionPolicy,

    /// Name of the handshake query parameter carrying the session key
    #[arg(long, env, default_value = "token")]
    pub token_param: String,

    /// Seconds between keepalive pings on idle connections. 0 disables keepalive.
    #[arg(long, env, default_value_t = 20)]
    pub keepalive_interval_secs: u64,

    /// Upper bound in milliseconds on one wait for the next broadcast message
    #[arg(long, env, default_value_t = 1000)]
    pub poll_timeout_ms: u64,

    /// Per-topic buffer of the broadcast hub. Subscribers lagging further behind lose messages.
    #[arg(long, env, default_value_t = 1024)]
    pub broadcast_capacity: usize,

    /// JSON value sent to every client right after the handshake. Repeat for several, in order.
    #[arg(long = "hello-message")]
    hello_message: Vec<String>,

    /// JSON array of values sent after every --hello-message value
    #[arg(long, env)]
    hello_messages: Option<String>,

    /// JSON file mapping session keys to user records
    #[arg(long, env)]
    sessions_file: Option<PathBuf>,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn relay_address(&self) -> String {
        format!("{}:{}", self.interface, self.port)
    }

    pub fn control_address(&self) -> Option<String> {
        self.control_port
            .map(|port| format!("{}:{}", self.interface, port))
    }

    pub fn keepalive_interval(&self) -> Option<Duration> {
        match self.keepalive_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.max(1))
    }

    /// Parses every configured hello message as JSON: the repeated flag values
    /// first, then the elements of the array.
    pub fn hello_messages(&self) -> Result<Vec<Value>, serde_json::Error> {
        let mut hello = self
            .hello_message
            .iter()
            .map(|raw| serde_json::from_str(raw))
            .collect::<Result<Vec<Value>, _>>()?;

        if let Some(raw) = &self.hello_messages {
            hello.extend(serde_json::from_str::<Vec<Value>>(raw)?);
        }
        Ok(hello)
    }

    pub fn sessions_file(&self) -> Option<&Path> {
        self.sessions_file.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["pubsub_gateway"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_describe_an_open_relay_without_control_instance() {
        let config = parse(&[]);
        assert_eq!(config.relay_address(), "127.0.0.1:8090");
        assert_eq!(config.control_address(), None);
        assert_eq!(config.relay_permission, PermissionPolicy::Open);
        assert_eq!(config.control_permission, PermissionPolicy::SuperuserOnly);
        assert_eq!(config.token_param, "token");
        assert_eq!(config.keepalive_interval(), Some(Duration::from_secs(20)));
        assert_eq!(config.poll_timeout(), Duration::from_secs(1));
        assert!(config.hello_messages().unwrap().is_empty());
        assert!(config.sessions_file().is_none());
    }

    #[test]
    fn control_instance_and_policies_are_configurable() {
        let config = parse(&[
            "--control-port",
            "8091",
            "--relay-permission",
            "AUTHENTICATED",
            "--control-permission",
            "staff",
        ]);
        assert_eq!(config.control_address().as_deref(), Some("127.0.0.1:8091"));
        assert_eq!(config.relay_permission, PermissionPolicy::AuthenticatedOnly);
        assert_eq!(config.control_permission, PermissionPolicy::StaffOnly);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(Config::try_parse_from(["pubsub_gateway", "--relay-permission", "admins"]).is_err());
    }

    #[test]
    fn zero_keepalive_disables_pings() {
        let config = parse(&["--keepalive-interval-secs", "0"]);
        assert_eq!(config.keepalive_interval(), None);
    }

    #[test]
    fn hello_messages_keep_their_order() {
        let config = parse(&[
            "--hello-message",
            r#"{"hello":1}"#,
            "--hello-message",
            r#""plain""#,
        ]);
        let hello = config.hello_messages().unwrap();
        assert_eq!(hello.len(), 2);
        assert_eq!(hello[0]["hello"], 1);
        assert_eq!(hello[1], "plain");
    }

    #[test]
    fn hello_message_may_contain_semicolons() {
        let config = parse(&["--hello-message", r#"{"text":"a;b"}"#]);
        let hello = config.hello_messages().unwrap();
        assert_eq!(hello, vec![serde_json::json!({"text": "a;b"})]);
    }

    #[test]
    fn hello_message_array_follows_the_repeated_flag() {
        let config = parse(&[
            "--hello-message",
            r#""first""#,
            "--hello-messages",
            r#"[{"text":"x;y"}, 2]"#,
        ]);
        let hello = config.hello_messages().unwrap();
        assert_eq!(hello.len(), 3);
        assert_eq!(hello[0], "first");
        assert_eq!(hello[1]["text"], "x;y");
        assert_eq!(hello[2], 2);
    }

    #[test]
    fn hello_messages_must_be_an_array() {
        let config = parse(&["--hello-messages", r#"{"not":"an array"}"#]);
        assert!(config.hello_messages().is_err());
    }

    #[test]
    fn invalid_hello_message_is_reported() {
        let config = parse(&["--hello-message", "{nope"]);
        assert!(config.hello_messages().is_err());
    }

    #[test]
    fn permission_policy_round_trips_through_its_name() {
        for name in PermissionPolicy::NAMES {
            let policy: PermissionPolicy = name.parse().unwrap();
            assert_eq!(policy.to_string(), name);
        }
        assert_eq!(
            "root".parse::<PermissionPolicy>(),
            Err(PermissionPolicyParseError)
        );
    }
}
