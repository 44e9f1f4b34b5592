//! Application constants and configuration defaults
//!
//! Centralized location for magic numbers and default values

use std::time::Duration;

/// HTTP client configuration
pub mod http {
    use super::*;

    /// Connection timeout for HTTP requests
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Deadline for ordinary chat requests, measured over the whole stream
    pub const DEFAULT_CHAT_DEADLINE: Duration = Duration::from_secs(60);

    /// Deadline for latency-heavy model classes (reasoning models can think for minutes)
    pub const EXTENDED_CHAT_DEADLINE: Duration = Duration::from_secs(300);

    /// Model name fragments that select the extended deadline
    pub const EXTENDED_MODEL_MARKERS: &[&str] = &["o1", "o3", "reasoner", "r1", "thinking"];

    /// Default backend when no config or override is present
    pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

    /// Model used when the chat command is given none
    pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
}

/// Session pipeline configuration
pub mod pipeline {
    /// Marker appended to an artifact when the user stops a session
    pub const STOPPED_BY_USER: &str = "[stopped by user]";

    /// Capacity of the pipeline event bus before slow subscribers start lagging
    pub const EVENT_BUS_CAPACITY: usize = 256;
}

/// Live preview configuration
pub mod preview {
    use super::*;

    /// Quiet period before an edit burst is forwarded to the preview surface
    pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

    /// Document shown when nothing has been rendered yet
    pub const PLACEHOLDER_DOCUMENT: &str = "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Preview</title>\n</head>\n<body>\n<p class=\"forge-placeholder\">Start typing to see a live preview.</p>\n</body>\n</html>\n";
}

/// Filesystem layout
pub mod paths {
    /// Config directory name under the user's home
    pub const CONFIG_DIR_NAME: &str = ".forge";

    /// Config file name inside the config directory
    pub const CONFIG_FILE_NAME: &str = "config.toml";

    /// Log subdirectory name
    pub const LOGS_DIR_NAME: &str = "logs";
}
