// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "Ivy";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "ivy";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".ivy";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "ivy.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "IVY_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "IVY_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "IVY_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "IVY_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5480;

/// Max JSON body size for API requests (64KB)
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "IVY_DATA_DIR";

/// Environment variable to keep table state in memory only
pub const ENV_EPHEMERAL: &str = "IVY_EPHEMERAL";

/// File holding persisted table state inside the data directory
pub const STATE_FILE_NAME: &str = "state.json";

// =============================================================================
// Query Editor
// =============================================================================

/// Environment variable for the recent-queries cap
pub const ENV_MAX_RECENT_QUERIES: &str = "IVY_MAX_RECENT_QUERIES";

/// Default number of recent queries kept per table
pub const DEFAULT_MAX_RECENT_QUERIES: usize = 10;

/// Maximum accepted query text length in bytes
pub const MAX_QUERY_LENGTH: usize = 4096;

/// Storage key suffix for recent queries (`<table>.recent_queries`)
pub const KEY_RECENT_QUERIES: &str = "recent_queries";

/// Storage key suffix for saved filters (`<table>.saved_filters`)
pub const KEY_SAVED_FILTERS: &str = "saved_filters";

/// Storage key suffix for column order and visibility (`<table>.column_layout`)
pub const KEY_COLUMN_LAYOUT: &str = "column_layout";

// =============================================================================
// Query Correction Service
// =============================================================================

/// Environment variable to enable AI query correction
pub const ENV_AI_ENABLED: &str = "IVY_AI_ENABLED";

/// Environment variable for the correction service endpoint
pub const ENV_AI_URL: &str = "IVY_AI_URL";

/// Environment variable for the correction request timeout
pub const ENV_AI_TIMEOUT_SECS: &str = "IVY_AI_TIMEOUT_SECS";

/// Default correction request timeout
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Path Rewrite
// =============================================================================

/// Query parameter carrying the application identifier
pub const DEFAULT_REWRITE_PARAM: &str = "appId";

/// Path prefixes that are never rewritten
pub const DEFAULT_REWRITE_EXCLUDED_PREFIXES: &[&str] = &[
    "/ivy/",
    "/assets/",
    "/fonts/",
    "/api/",
    "/auth/",
    "/messages",
    "/webhook",
    "/.well-known/",
];

/// Static file extensions that are never rewritten
pub const DEFAULT_REWRITE_STATIC_EXTENSIONS: &[&str] = &[
    ".js", ".css", ".map", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".woff",
    ".woff2", ".ttf", ".eot", ".json", ".txt", ".html",
];

// =============================================================================
// Rows
// =============================================================================

/// Maximum rows returned by a single fetch
pub const MAX_FETCH_ROWS: usize = 1000;
