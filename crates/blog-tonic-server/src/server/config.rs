use anyhow::bail;
use blog_tonic_core::types::{
    DEFAULT_COLLECTION, DEFAULT_DATABASE, DEFAULT_MONGO_URI, DEFAULT_SERVER_ADDR,
};
use clap::{Parser, ValueEnum};

/// OTLP/gRPC collector used when `otel` or `metrics` is enabled.
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Which [`BlogStore`](crate::server::store::BlogStore) backs the service.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// MongoDB at `MONGO_URI`.
    Mongo,
    /// Process memory; contents are lost on exit.
    Memory,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mongo => "mongo",
            Self::Memory => "memory",
        }
    }
}

/// Runtime configuration for the `blog-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first). The defaults match a local MongoDB and the usual
/// gRPC port, so the server runs with no arguments at all.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "blog-tonic-server",
    version,
    about = "A gRPC service for creating, reading, updating, deleting and listing blogs"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/blog-uds.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from(DEFAULT_SERVER_ADDR))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Storage backend.
    ///
    /// Environment variable: `BLOG_STORE`
    #[arg(long, env = "BLOG_STORE", value_enum, default_value_t = StoreKind::Mongo)]
    pub store: StoreKind,

    /// MongoDB connection string.
    ///
    /// Environment variable: `MONGO_URI`
    #[arg(long, env = "MONGO_URI", default_value_t = String::from(DEFAULT_MONGO_URI))]
    pub mongo_uri: String,

    /// Database holding the blog collection.
    ///
    /// Environment variable: `MONGO_DATABASE`
    #[arg(long, env = "MONGO_DATABASE", default_value_t = String::from(DEFAULT_DATABASE))]
    pub database: String,

    /// Collection holding one document per blog.
    ///
    /// Environment variable: `MONGO_COLLECTION`
    #[arg(long, env = "MONGO_COLLECTION", default_value_t = String::from(DEFAULT_COLLECTION))]
    pub collection: String,

    /// Capacity of the buffer between the store cursor and the gRPC stream in
    /// `ListBlog`.
    ///
    /// This affects how many blogs can be decoded ahead of a slow client.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Seconds to wait for in-flight `ListBlog` streams during shutdown before
    /// cancelling them.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,

    /// OTLP/gRPC collector receiving spans and metrics. Only read when the
    /// server is built with the `otel` or `metrics` feature.
    ///
    /// Environment variable: `OTEL_EXPORTER_OTLP_ENDPOINT`
    #[arg(
        long,
        env = "OTEL_EXPORTER_OTLP_ENDPOINT",
        default_value_t = String::from(DEFAULT_OTLP_ENDPOINT)
    )]
    pub otlp_endpoint: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub store: StoreKind,
    pub mongo_uri: String,
    pub database: String,
    pub collection: String,
    pub stream_buffer_size: usize,
    pub shutdown_timeout: u64,
    pub otlp_endpoint: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            uds: false,
            store: StoreKind::Mongo,
            mongo_uri: DEFAULT_MONGO_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            stream_buffer_size: 8,
            shutdown_timeout: 3,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.store == StoreKind::Mongo {
            if args.database.trim().is_empty() {
                bail!("MONGO_DATABASE must not be empty");
            }
            if args.collection.trim().is_empty() {
                bail!("MONGO_COLLECTION must not be empty");
            }
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            store: args.store,
            mongo_uri: args.mongo_uri,
            database: args.database,
            collection: args.collection,
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout: args.shutdown_timeout,
            otlp_endpoint: args.otlp_endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let argv = std::iter::once("blog-tonic-server").chain(args.iter().copied());
        let args = CliArgs::try_parse_from(argv)?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn defaults_match_fixed_deployment() {
        let config = parse(&[
            "--server-addr",
            "0.0.0.0:50051",
            "--mongo-uri",
            "mongodb://localhost:27017",
            "--database",
            "mydb",
            "--collection",
            "blog",
        ])
        .unwrap();
        let defaults = ServerConfig::default();
        assert_eq!(config.server_addr, defaults.server_addr);
        assert_eq!(config.mongo_uri, defaults.mongo_uri);
        assert_eq!(config.database, "mydb");
        assert_eq!(config.collection, "blog");
        assert_eq!(config.otlp_endpoint, DEFAULT_OTLP_ENDPOINT);
    }

    #[test]
    fn store_kind_names_match_cli_values() {
        for kind in [StoreKind::Mongo, StoreKind::Memory] {
            let parsed = StoreKind::from_str(kind.as_str(), false).unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn parses_memory_store() {
        let config = parse(&["--store", "memory", "--stream-buffer-size", "2"]).unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.stream_buffer_size, 2);
    }

    #[test]
    fn rejects_zero_stream_buffer() {
        let err = parse(&["--stream-buffer-size", "0"]).unwrap_err();
        assert!(err.to_string().contains("STREAM_BUFFER_SIZE"));
    }

    #[test]
    fn rejects_empty_collection_for_mongo() {
        let err = parse(&["--store", "mongo", "--collection", " "]).unwrap_err();
        assert!(err.to_string().contains("MONGO_COLLECTION"));
    }
}
